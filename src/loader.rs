use std::path::Path;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::config::{feature_thresholds, INVALID_BEDROOMS};
use crate::error::{AppError, Result};
use crate::types::Property;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub rows_read: usize,
    pub dropped_invalid_bedrooms: usize,
    pub retained: usize,
}

/// Raw CSV row. Columns not listed here (sqft_above, sqft_living15, ...) are ignored.
///
/// Only `id`, `date` and `zipcode` must parse. Every other numeric cell is read
/// leniently: blank or unparseable cells become `None`, and float text such as
/// `2170.0` is accepted for integer columns.
#[derive(Debug, Deserialize)]
struct PropertyRow {
    id: u64,
    date: String,
    #[serde(default, deserialize_with = "lenient")]
    price: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    bedrooms: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    bathrooms: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    sqft_living: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    sqft_lot: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    floors: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    waterfront: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    view: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    condition: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    grade: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    sqft_basement: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    yr_built: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    yr_renovated: Option<f64>,
    #[serde(deserialize_with = "whole_number")]
    zipcode: u32,
    #[serde(default, deserialize_with = "lenient")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    long: Option<f64>,
}

fn lenient<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite()))
}

fn whole_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
        .map(|v| v as u32)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid zipcode {raw:?}")))
}

impl PropertyRow {
    fn into_property(self) -> Result<Property> {
        let date = parse_date(&self.date).ok_or_else(|| AppError::Date {
            id: self.id,
            value: self.date.clone(),
        })?;

        // Missing counts, areas and flags read as zero: no basement, no
        // renovation, not waterfront. Float-to-int casts saturate.
        let zero = |v: Option<f64>| v.unwrap_or(0.0);
        Ok(Property {
            id: self.id,
            date,
            price: self.price,
            bedrooms: zero(self.bedrooms) as u32,
            bathrooms: zero(self.bathrooms),
            sqft_living: zero(self.sqft_living) as u32,
            sqft_lot: zero(self.sqft_lot) as u32,
            floors: zero(self.floors),
            waterfront: zero(self.waterfront) as u8,
            view: zero(self.view) as u8,
            condition: self.condition,
            grade: zero(self.grade) as u8,
            sqft_basement: zero(self.sqft_basement) as u32,
            // A missing build year lands in the newer era, like a failed `< 1955` test.
            yr_built: self.yr_built.map_or(feature_thresholds::CONSTRUCTION_YEAR, |y| y as i32),
            yr_renovated: zero(self.yr_renovated) as i32,
            zipcode: self.zipcode,
            lat: self.lat.unwrap_or(f64::NAN),
            long: self.long.unwrap_or(f64::NAN),
        })
    }
}

/// Accepts ISO dates (`2014-10-13`) and the dataset's native `20141013T000000`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S")
                .ok()
                .map(|dt| dt.date())
        })
}

pub fn read_properties<R: std::io::Read>(reader: R) -> Result<Vec<Property>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut properties = Vec::new();
    for row in rdr.deserialize::<PropertyRow>() {
        properties.push(row?.into_property()?);
    }
    Ok(properties)
}

pub fn load_properties(path: impl AsRef<Path>) -> Result<Vec<Property>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let properties = read_properties(std::io::BufReader::new(file))?;
    debug!("Read {} rows from {}", properties.len(), path.display());
    Ok(properties)
}

/// Drops the known bedroom typo. Every other row is kept as-is.
pub fn clean(properties: Vec<Property>) -> (Vec<Property>, LoadStats) {
    let rows_read = properties.len();
    let retained: Vec<Property> = properties
        .into_iter()
        .filter(|p| p.bedrooms != INVALID_BEDROOMS)
        .collect();
    let stats = LoadStats {
        rows_read,
        dropped_invalid_bedrooms: rows_read - retained.len(),
        retained: retained.len(),
    };
    (retained, stats)
}

// ---------------------------------------------------------------------------
// Geofile
// ---------------------------------------------------------------------------

/// What we keep of the boundary file: it is read, counted and otherwise unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoSummary {
    pub url: String,
    pub feature_count: usize,
}

pub fn summarize_geojson(url: &str, value: &serde_json::Value) -> Result<GeoSummary> {
    let kind = value.get("type").and_then(|t| t.as_str()).unwrap_or("");
    if kind != "FeatureCollection" {
        return Err(AppError::Geofile(format!(
            "expected a FeatureCollection, got {kind:?}"
        )));
    }
    let feature_count = value
        .get("features")
        .and_then(|f| f.as_array())
        .map(|f| f.len())
        .ok_or_else(|| AppError::Geofile("FeatureCollection has no features array".to_string()))?;
    Ok(GeoSummary {
        url: url.to_string(),
        feature_count,
    })
}

pub async fn fetch_geofile(url: &str) -> Result<GeoSummary> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let resp: serde_json::Value = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let summary = summarize_geojson(url, &resp)?;
    info!("Geofile loaded: {} features from {url}", summary.feature_count);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "id,date,price,bedrooms,bathrooms,sqft_living,sqft_lot,floors,waterfront,view,condition,grade,sqft_above,sqft_basement,yr_built,yr_renovated,zipcode,lat,long,sqft_living15,sqft_lot15";

    fn csv_with(rows: &[&str]) -> String {
        let mut s = HEADER.to_string();
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s
    }

    #[test]
    fn reads_native_dataset_rows() {
        let data = csv_with(&[
            "7129300520,20141013T000000,221900,3,1,1180,5650,1,0,0,3,7,1180,0,1955,0,98178,47.5112,-122.257,1340,5650",
        ]);
        let props = read_properties(data.as_bytes()).unwrap();
        assert_eq!(props.len(), 1);
        let p = &props[0];
        assert_eq!(p.id, 7129300520);
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2014, 10, 13).unwrap());
        assert_eq!(p.price, Some(221900.0));
        assert_eq!(p.condition, Some(3.0));
        assert_eq!(p.zipcode, 98178);
    }

    #[test]
    fn missing_price_and_condition_are_kept_as_none() {
        let data = csv_with(&[
            "1,2015-02-25,,2,1,770,10000,1,0,0,,6,770,0,1933,0,98028,47.7379,-122.233,2720,8062",
        ]);
        let props = read_properties(data.as_bytes()).unwrap();
        assert_eq!(props[0].price, None);
        assert_eq!(props[0].condition, None);
    }

    #[test]
    fn nan_price_is_not_a_valid_price() {
        let data = csv_with(&[
            "1,2015-02-25,NaN,2,1,770,10000,1,0,0,NaN,6,770,0,1933,0,98028,47.7379,-122.233,2720,8062",
        ]);
        let props = read_properties(data.as_bytes()).unwrap();
        assert!(props[0].valid_price().is_none());
        assert_eq!(props[0].condition, None);
    }

    #[test]
    fn fractional_condition_is_not_rounded() {
        let data = csv_with(&[
            "1,2014-05-02,100,3,1,1180,5650,1,0,0,2.5,7,1180,0,1955,0,98001,47.5,-122.2,1340,5650",
            "2,2014-05-02,300,3,1,1180,5650,1,0,0,3,7,1180,0,1955,0,98001,47.5,-122.2,1340,5650",
            "3,2014-05-02,500,3,1,1180,5650,1,0,0,3,7,1180,0,1955,0,98001,47.5,-122.2,1340,5650",
        ]);
        let props = read_properties(data.as_bytes()).unwrap();
        assert_eq!(props[0].condition, Some(2.5));

        let records = crate::features::derive_all(props);
        let report = crate::pricing::PricingReport::compute(&records);
        let first = &report.assessments[0];
        assert_eq!(first.id, 1);
        assert_eq!(first.status, crate::types::Status::NotBuy);
        assert_eq!(first.condition_label, crate::types::ConditionLabel::Excellent);
    }

    #[test]
    fn blank_feature_columns_keep_the_row() {
        let data = csv_with(&[
            "5,2014-05-02,221900,3,1,2170.0,5650,1,,0,3,7,1180,,1955,,98178,47.5112,-122.257,1340,5650",
        ]);
        let props = read_properties(data.as_bytes()).unwrap();
        assert_eq!(props.len(), 1);
        let p = &props[0];
        assert_eq!(p.sqft_living, 2170);
        assert_eq!(p.sqft_basement, 0);
        assert_eq!(p.yr_renovated, 0);
        assert_eq!(p.waterfront, 0);
        assert_eq!(p.price, Some(221900.0));
    }

    #[test]
    fn missing_coordinates_and_build_year() {
        let data = csv_with(&[
            "6,2014-05-02,221900,3,1,1180,5650,1,0,0,3,7,1180,0,,0,98178,,,1340,5650",
        ]);
        let p = &read_properties(data.as_bytes()).unwrap()[0];
        assert!(p.lat.is_nan() && p.long.is_nan());
        assert_eq!(p.yr_built, feature_thresholds::CONSTRUCTION_YEAR);
    }

    #[test]
    fn unparseable_zipcode_fails_the_load() {
        let data = csv_with(&[
            "7,2014-05-02,221900,3,1,1180,5650,1,0,0,3,7,1180,0,1955,0,seattle,47.5,-122.2,1340,5650",
        ]);
        assert!(matches!(read_properties(data.as_bytes()), Err(AppError::Csv(_))));
    }

    #[test]
    fn malformed_date_fails_the_load() {
        let data = csv_with(&[
            "42,13/10/2014,221900,3,1,1180,5650,1,0,0,3,7,1180,0,1955,0,98178,47.5112,-122.257,1340,5650",
        ]);
        match read_properties(data.as_bytes()) {
            Err(AppError::Date { id, .. }) => assert_eq!(id, 42),
            other => panic!("expected date error, got {other:?}"),
        }
    }

    #[test]
    fn clean_only_drops_thirty_three_bedrooms() {
        let mut props = Vec::new();
        for (id, bedrooms) in [(1, 3), (2, 33), (3, 0), (4, 34)] {
            let mut p = crate::features::tests::property(id, 98001, 100.0, 3, 5);
            p.bedrooms = bedrooms;
            props.push(p);
        }
        let (kept, stats) = clean(props);
        let ids: Vec<u64> = kept.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(stats.dropped_invalid_bedrooms, 1);
        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.retained, 3);
    }

    #[test]
    fn geojson_summary_counts_features() {
        let value = serde_json::json!({
            "type": "FeatureCollection",
            "features": [{"type": "Feature"}, {"type": "Feature"}]
        });
        let summary = summarize_geojson("http://example", &value).unwrap();
        assert_eq!(summary.feature_count, 2);

        let bad = serde_json::json!({"type": "Feature"});
        assert!(matches!(summarize_geojson("x", &bad), Err(AppError::Geofile(_))));
    }
}
