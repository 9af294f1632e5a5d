use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{markup, MIN_BUY_CONDITION};
use crate::features::HouseRecord;
use crate::types::{ConditionLabel, Season, Status};

/// Suggested resale for a buy recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pricing {
    pub price_median_season: f64,
    pub selling_price: f64,
    pub profit: f64,
}

/// Classification result for one record with a usable price and condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    /// Index into the snapshot's record list.
    #[serde(skip)]
    pub record: usize,
    pub id: u64,
    pub zipcode: u32,
    pub price: f64,
    pub condition: f64,
    pub condition_label: ConditionLabel,
    pub season: Season,
    pub price_median: f64,
    pub status: Status,
    /// Present only when `status` is buy.
    pub pricing: Option<Pricing>,
}

#[derive(Debug, Clone, Default)]
pub struct PricingReport {
    /// zipcode → median price over every record with a valid price.
    pub zip_medians: BTreeMap<u32, f64>,
    /// (zipcode, season) → median price over buy recommendations.
    pub season_medians: BTreeMap<(u32, Season), f64>,
    /// Classified records, in record order.
    pub assessments: Vec<Assessment>,
    /// Records skipped for a missing/NaN price or condition.
    pub excluded: usize,
}

/// Median with the even-length convention of averaging the two middle values.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Buy iff strictly under the zipcode median and at least in median condition.
pub fn classify_status(price: f64, zip_median: f64, condition: f64) -> Status {
    if price < zip_median && condition >= MIN_BUY_CONDITION {
        Status::Buy
    } else {
        Status::NotBuy
    }
}

/// Two-tier markup. A price equal to the season median takes the higher tier.
pub fn price_for_sale(price: f64, price_median_season: f64) -> Pricing {
    let factor = if price <= price_median_season {
        markup::AT_OR_BELOW_MEDIAN
    } else {
        markup::ABOVE_MEDIAN
    };
    let selling_price = price * factor;
    Pricing {
        price_median_season,
        selling_price,
        profit: selling_price - price,
    }
}

fn medians_by<K: Ord>(groups: BTreeMap<K, Vec<f64>>) -> BTreeMap<K, f64> {
    groups
        .into_iter()
        .filter_map(|(k, mut prices)| median(&mut prices).map(|m| (k, m)))
        .collect()
}

impl PricingReport {
    pub fn compute(records: &[HouseRecord]) -> Self {
        // a. zipcode medians
        let mut by_zip: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        for r in records {
            if let Some(price) = r.property.valid_price() {
                by_zip.entry(r.property.zipcode).or_default().push(price);
            }
        }
        let zip_medians = medians_by(by_zip);

        // b. status
        let mut excluded = 0usize;
        let mut assessments = Vec::with_capacity(records.len());
        for (idx, r) in records.iter().enumerate() {
            let (Some(price), Some(condition), Some(label)) = (
                r.property.valid_price(),
                r.property.condition,
                r.features.condition_label,
            ) else {
                excluded += 1;
                continue;
            };
            let Some(&price_median) = zip_medians.get(&r.property.zipcode) else {
                excluded += 1;
                continue;
            };
            assessments.push(Assessment {
                record: idx,
                id: r.property.id,
                zipcode: r.property.zipcode,
                price,
                condition,
                condition_label: label,
                season: r.features.season,
                price_median,
                status: classify_status(price, price_median, condition),
                pricing: None,
            });
        }

        // c. season medians among buys
        let mut by_zip_season: BTreeMap<(u32, Season), Vec<f64>> = BTreeMap::new();
        for a in assessments.iter().filter(|a| a.status == Status::Buy) {
            by_zip_season
                .entry((a.zipcode, a.season))
                .or_default()
                .push(a.price);
        }
        let season_medians = medians_by(by_zip_season);

        // d/e. selling price and profit
        for a in assessments.iter_mut().filter(|a| a.status == Status::Buy) {
            if let Some(&season_median) = season_medians.get(&(a.zipcode, a.season)) {
                a.pricing = Some(price_for_sale(a.price, season_median));
            }
        }

        Self {
            zip_medians,
            season_medians,
            assessments,
            excluded,
        }
    }

    /// Buy recommendations in display order: condition label text, then price.
    pub fn buy_list(&self) -> Vec<&Assessment> {
        let mut buys: Vec<&Assessment> = self
            .assessments
            .iter()
            .filter(|a| a.status == Status::Buy)
            .collect();
        buys.sort_by(|a, b| display_order(a, b));
        buys
    }

    pub fn buy_count(&self) -> usize {
        self.assessments
            .iter()
            .filter(|a| a.status == Status::Buy)
            .count()
    }

    pub fn total_profit(&self) -> f64 {
        self.assessments
            .iter()
            .filter_map(|a| a.pricing.map(|p| p.profit))
            .sum()
    }
}

fn display_order(a: &Assessment, b: &Assessment) -> Ordering {
    a.condition_label
        .as_str()
        .cmp(b.condition_label.as_str())
        .then_with(|| a.price.total_cmp(&b.price))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::derive_all;
    use crate::features::tests::property;

    fn assessment(report: &PricingReport, id: u64) -> &Assessment {
        report
            .assessments
            .iter()
            .find(|a| a.id == id)
            .expect("assessment present")
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&mut [300.0, 100.0, 200.0]), Some(200.0));
        assert_eq!(median(&mut [400.0, 100.0, 200.0, 300.0]), Some(250.0));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn below_median_in_good_condition_is_buy() {
        // Zipcode prices [100, 150, 200, 250, 300] → median 200.
        let records = derive_all(vec![
            property(1, 98001, 100.0, 2, 5),
            property(2, 98001, 150.0, 4, 5),
            property(3, 98001, 200.0, 3, 5),
            property(4, 98001, 250.0, 5, 5),
            property(5, 98001, 300.0, 3, 5),
        ]);
        let report = PricingReport::compute(&records);

        assert_eq!(report.zip_medians.get(&98001), Some(&200.0));
        assert_eq!(assessment(&report, 2).status, Status::Buy);
        // Above median despite excellent condition.
        assert_eq!(assessment(&report, 4).status, Status::NotBuy);
        // Below median but bad condition.
        assert_eq!(assessment(&report, 1).status, Status::NotBuy);
        // Equal to median is not strictly below.
        assert_eq!(assessment(&report, 3).status, Status::NotBuy);
    }

    #[test]
    fn fractional_condition_is_compared_unrounded() {
        let mut half = property(1, 98001, 100.0, 3, 5);
        half.condition = Some(2.5);
        let records = derive_all(vec![
            half,
            property(2, 98001, 300.0, 3, 5),
            property(3, 98001, 500.0, 3, 5),
        ]);
        let report = PricingReport::compute(&records);
        let a = assessment(&report, 1);
        assert_eq!(a.status, Status::NotBuy);
        assert_eq!(a.condition_label, ConditionLabel::Excellent);
        assert_eq!(classify_status(100.0, 300.0, 3.0), Status::Buy);
    }

    #[test]
    fn medians_are_per_zipcode() {
        let records = derive_all(vec![
            property(1, 98001, 100.0, 3, 5),
            property(2, 98001, 300.0, 3, 5),
            property(3, 98002, 1000.0, 3, 5),
        ]);
        let report = PricingReport::compute(&records);
        assert_eq!(report.zip_medians.get(&98001), Some(&200.0));
        assert_eq!(report.zip_medians.get(&98002), Some(&1000.0));
        assert_eq!(assessment(&report, 3).status, Status::NotBuy);
    }

    #[test]
    fn price_equal_to_season_median_gets_higher_markup() {
        let p = price_for_sale(200.0, 200.0);
        assert!((p.selling_price - 260.0).abs() < 1e-9);
        assert!((p.profit - 60.0).abs() < 1e-9);

        let above = price_for_sale(210.0, 200.0);
        assert!((above.selling_price - 231.0).abs() < 1e-9);

        let below = price_for_sale(100.0, 200.0);
        assert!((below.selling_price - 130.0).abs() < 1e-9);
    }

    #[test]
    fn season_medians_use_buy_records_only() {
        // Zip median = 300. Buys: 100, 200 (summer), 250 (winter).
        let records = derive_all(vec![
            property(1, 98001, 100.0, 3, 7),
            property(2, 98001, 200.0, 4, 7),
            property(3, 98001, 250.0, 3, 1),
            property(4, 98001, 300.0, 3, 7),
            property(5, 98001, 400.0, 3, 7),
            property(6, 98001, 500.0, 3, 7),
            property(7, 98001, 600.0, 3, 7),
        ]);
        let report = PricingReport::compute(&records);
        assert_eq!(report.zip_medians.get(&98001), Some(&300.0));
        assert_eq!(report.season_medians.get(&(98001, Season::Summer)), Some(&150.0));
        assert_eq!(report.season_medians.get(&(98001, Season::Winter)), Some(&250.0));

        let cheap = assessment(&report, 1).pricing.unwrap();
        assert!((cheap.selling_price - 130.0).abs() < 1e-9);
        let pricier = assessment(&report, 2).pricing.unwrap();
        assert!((pricier.selling_price - 220.0).abs() < 1e-9);
        // Only buy in its season: equal to its own median.
        let winter = assessment(&report, 3).pricing.unwrap();
        assert!((winter.selling_price - 325.0).abs() < 1e-9);

        assert!(assessment(&report, 5).pricing.is_none());
    }

    #[test]
    fn profit_is_selling_minus_price_for_every_buy() {
        let records = derive_all(
            (0..20)
                .map(|i| property(i, 98000 + (i % 3) as u32, 100.0 + i as f64 * 37.0, 3 + (i % 3) as u8, 1 + (i % 12) as u32))
                .collect(),
        );
        let report = PricingReport::compute(&records);
        for a in &report.assessments {
            match (a.status, a.pricing) {
                (Status::Buy, Some(p)) => assert!((p.profit - (p.selling_price - a.price)).abs() < 1e-9),
                (Status::Buy, None) => panic!("buy {} without pricing", a.id),
                (Status::NotBuy, p) => assert!(p.is_none()),
            }
        }
    }

    #[test]
    fn missing_price_or_condition_is_excluded() {
        let mut no_price = property(1, 98001, 0.0, 3, 5);
        no_price.price = None;
        let mut nan_price = property(2, 98001, 0.0, 3, 5);
        nan_price.price = Some(f64::NAN);
        let mut no_condition = property(3, 98001, 50.0, 3, 5);
        no_condition.condition = None;

        let records = derive_all(vec![
            no_price,
            nan_price,
            no_condition,
            property(4, 98001, 100.0, 3, 5),
            property(5, 98001, 300.0, 3, 5),
        ]);
        let report = PricingReport::compute(&records);

        assert_eq!(report.excluded, 3);
        assert_eq!(report.assessments.len(), 2);
        // The priced record without a condition still counts toward the median.
        assert_eq!(report.zip_medians.get(&98001), Some(&100.0));
    }

    #[test]
    fn buy_list_sorts_by_label_text_then_price() {
        let records = derive_all(vec![
            property(1, 98001, 120.0, 3, 5), // median
            property(2, 98001, 110.0, 4, 5), // good
            property(3, 98001, 130.0, 5, 5), // excellent
            property(4, 98001, 100.0, 4, 5), // good
            property(5, 98001, 900.0, 3, 5),
            property(6, 98001, 900.0, 3, 5),
            property(7, 98001, 900.0, 3, 5),
            property(8, 98001, 900.0, 3, 5),
        ]);
        let report = PricingReport::compute(&records);
        let ids: Vec<u64> = report.buy_list().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3, 4, 2, 1]);
        assert_eq!(report.buy_count(), 4);
    }
}
