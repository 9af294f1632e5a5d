//! Map views over the (filtered) buy recommendations.
//! Scatter points mirror the price-sized scatter map; clusters mirror the
//! marker-cluster density map with its popups.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::features::HouseRecord;
use crate::pricing::{Assessment, Pricing};
use crate::types::Property;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub id: u64,
    pub lat: f64,
    pub long: f64,
    pub price: f64,
    pub zipcode: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: u64,
    pub lat: f64,
    pub long: f64,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// Mean position of the markers in this grid cell.
    pub lat: f64,
    pub long: f64,
    pub count: usize,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLong {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMap {
    /// None when there is nothing to show.
    pub center: Option<LatLong>,
    pub precision: u32,
    pub clusters: Vec<Cluster>,
}

/// Records without usable coordinates are left off both maps.
fn located<'a>(records: &'a [HouseRecord], a: &Assessment) -> Option<&'a Property> {
    let p = &records.get(a.record)?.property;
    (p.lat.is_finite() && p.long.is_finite()).then_some(p)
}

pub fn scatter_points(records: &[HouseRecord], rows: &[&Assessment]) -> Vec<MapPoint> {
    rows.iter()
        .filter_map(|a| {
            let p = located(records, a)?;
            Some(MapPoint {
                id: a.id,
                lat: p.lat,
                long: p.long,
                price: a.price,
                zipcode: a.zipcode,
            })
        })
        .collect()
}

pub fn popup(property: &Property, price: f64, pricing: Option<&Pricing>) -> String {
    let (selling, profit) = pricing
        .map(|p| (format!("{:.2}", p.selling_price), format!("{:.2}", p.profit)))
        .unwrap_or_else(|| ("n/a".to_string(), "n/a".to_string()));
    format!(
        "Buy price US$ {price:.2} | Sell price US$ {selling} with profit of US$ {profit}. \
         Features: {} sqft, {} bedrooms, {} bathrooms, year built: {}",
        property.sqft_living, property.bedrooms, property.bathrooms, property.yr_built,
    )
}

/// Groups markers into grid cells of `precision` decimal degrees.
pub fn cluster_map(records: &[HouseRecord], rows: &[&Assessment], precision: u32) -> ClusterMap {
    let scale = 10f64.powi(precision as i32);
    let mut cells: BTreeMap<(i64, i64), Vec<Marker>> = BTreeMap::new();

    for a in rows {
        let Some(p) = located(records, a) else {
            continue;
        };
        let key = ((p.lat * scale).round() as i64, (p.long * scale).round() as i64);
        cells.entry(key).or_default().push(Marker {
            id: a.id,
            lat: p.lat,
            long: p.long,
            popup: popup(p, a.price, a.pricing.as_ref()),
        });
    }

    let clusters: Vec<Cluster> = cells
        .into_values()
        .map(|markers| {
            let (lat, long) = mean_position(&markers);
            Cluster {
                lat,
                long,
                count: markers.len(),
                markers,
            }
        })
        .collect();

    let all: Vec<&Marker> = clusters.iter().flat_map(|c| c.markers.iter()).collect();
    let center = if all.is_empty() {
        None
    } else {
        let n = all.len() as f64;
        Some(LatLong {
            lat: all.iter().map(|m| m.lat).sum::<f64>() / n,
            long: all.iter().map(|m| m.long).sum::<f64>() / n,
        })
    };

    ClusterMap {
        center,
        precision,
        clusters,
    }
}

fn mean_position(markers: &[Marker]) -> (f64, f64) {
    let n = markers.len().max(1) as f64;
    (
        markers.iter().map(|m| m.lat).sum::<f64>() / n,
        markers.iter().map(|m| m.long).sum::<f64>() / n,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::derive_all;
    use crate::features::tests::property;
    use crate::pricing::PricingReport;

    fn records() -> Vec<HouseRecord> {
        let mut a = property(1, 98001, 100.0, 3, 5);
        a.lat = 47.501;
        a.long = -122.201;
        let mut b = property(2, 98001, 110.0, 3, 5);
        b.lat = 47.502;
        b.long = -122.202;
        let mut c = property(3, 98001, 120.0, 3, 5);
        c.lat = 47.70;
        c.long = -122.30;
        let expensive = (4..8).map(|i| property(i, 98001, 1000.0, 3, 5));
        derive_all([a, b, c].into_iter().chain(expensive).collect())
    }

    #[test]
    fn clusters_group_nearby_markers() {
        let records = records();
        let report = PricingReport::compute(&records);
        let buys = report.buy_list();
        assert_eq!(buys.len(), 3);

        let map = cluster_map(&records, &buys, 2);
        assert_eq!(map.clusters.len(), 2);
        let counts: Vec<usize> = map.clusters.iter().map(|c| c.count).collect();
        assert_eq!(counts.iter().sum::<usize>(), 3);
        assert!(counts.contains(&2));

        let center = map.center.unwrap();
        assert!((center.lat - (47.501 + 47.502 + 47.70) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_selection_has_no_center() {
        let records = records();
        let map = cluster_map(&records, &[], 2);
        assert!(map.center.is_none());
        assert!(map.clusters.is_empty());
    }

    #[test]
    fn popup_mentions_prices_and_features() {
        let p = property(1, 98001, 100.0, 3, 5);
        let pricing = crate::pricing::classifier::price_for_sale(100.0, 200.0);
        let text = popup(&p, 100.0, Some(&pricing));
        assert!(text.contains("Buy price US$ 100.00"));
        assert!(text.contains("Sell price US$ 130.00"));
        assert!(text.contains("profit of US$ 30.00"));
        assert!(text.contains("1800 sqft, 3 bedrooms, 2 bathrooms, year built: 1970"));
    }

    #[test]
    fn unlocated_records_are_left_off() {
        let mut records = records();
        records[0].property.lat = f64::NAN;
        let report = PricingReport::compute(&records);
        let buys = report.buy_list();
        assert_eq!(buys.len(), 3);
        assert_eq!(scatter_points(&records, &buys).len(), 2);
        let map = cluster_map(&records, &buys, 2);
        assert_eq!(map.clusters.iter().map(|c| c.count).sum::<usize>(), 2);
    }

    #[test]
    fn scatter_points_carry_price_and_zipcode() {
        let records = records();
        let report = PricingReport::compute(&records);
        let points = scatter_points(&records, &report.buy_list());
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.zipcode == 98001));
        assert_eq!(points[0].price, 100.0);
    }
}
