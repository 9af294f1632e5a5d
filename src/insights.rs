use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;

use crate::features::HouseRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Mean sale price (US$).
    Price,
    /// Mean lot area (sqft).
    LotArea,
}

impl Metric {
    fn value(&self, r: &HouseRecord) -> Option<f64> {
        match self {
            Metric::Price => r.property.valid_price(),
            Metric::LotArea => Some(r.property.sqft_lot as f64),
        }
    }
}

/// A business hypothesis and the change it claims, in percent from the
/// baseline group to the compared group.
#[derive(Debug, Clone, Copy)]
pub struct Claim {
    pub id: &'static str,
    pub statement: &'static str,
    pub category: &'static str,
    pub metric: Metric,
    pub expected_pct: f64,
}

pub const CLAIMS: [Claim; 8] = [
    Claim {
        id: "H1",
        statement: "Waterfront properties are 30% more expensive on average.",
        category: "Water view",
        metric: Metric::Price,
        expected_pct: 30.0,
    },
    Claim {
        id: "H2",
        statement: "Properties built before 1955 are 50% cheaper on average.",
        category: "Construction year",
        metric: Metric::Price,
        expected_pct: -50.0,
    },
    Claim {
        id: "H3",
        statement: "Properties without a basement have 40% more total lot area.",
        category: "Basement",
        metric: Metric::LotArea,
        expected_pct: 40.0,
    },
    Claim {
        id: "H4",
        statement: "Property prices grow 10% year over year.",
        category: "Sale year",
        metric: Metric::Price,
        expected_pct: 10.0,
    },
    Claim {
        id: "H5",
        statement: "Properties with higher design grade are more expensive on average.",
        category: "Level of design and construction",
        metric: Metric::Price,
        expected_pct: 0.0,
    },
    Claim {
        id: "H6",
        statement: "Properties with 3 or more views are 50% more expensive on average.",
        category: "View quality",
        metric: Metric::Price,
        expected_pct: 50.0,
    },
    Claim {
        id: "H7",
        statement: "Properties with 2 or more floors are 25% more expensive on average.",
        category: "Number of floors",
        metric: Metric::Price,
        expected_pct: 25.0,
    },
    Claim {
        id: "H8",
        statement: "Renovated properties are 25% more expensive on average.",
        category: "Renovated",
        metric: Metric::Price,
        expected_pct: 25.0,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub mean: f64,
    pub count: usize,
    /// Change from the previous bar, in percent. None for the first bar.
    pub pct_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hypothesis {
    pub id: &'static str,
    pub statement: &'static str,
    pub category: &'static str,
    pub metric: Metric,
    pub expected_pct: f64,
    pub bars: Vec<Bar>,
    /// Mean of the consecutive changes between bars.
    pub observed_pct: Option<f64>,
    /// None when the data has fewer than two groups.
    pub holds: Option<bool>,
}

/// Percentage change of each mean from the one before it.
pub fn pct_changes(means: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(means.len());
    for (i, m) in means.iter().enumerate() {
        let change = match i.checked_sub(1).map(|prev| means[prev]) {
            Some(prev) if prev != 0.0 => Some((m - prev) / prev * 100.0),
            _ => None,
        };
        out.push(change);
    }
    out
}

/// An increase claim holds when the observed change is positive and at
/// least as large. A decrease claim holds when it is at least as negative.
pub fn claim_holds(observed_pct: f64, expected_pct: f64) -> bool {
    if expected_pct < 0.0 {
        observed_pct <= expected_pct
    } else {
        observed_pct > 0.0 && observed_pct >= expected_pct
    }
}

fn grouped<K, F>(records: &[HouseRecord], key: F, metric: Metric) -> Vec<Bar>
where
    K: Ord + Display,
    F: Fn(&HouseRecord) -> K,
{
    let mut groups: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for r in records {
        if let Some(v) = metric.value(r) {
            let slot = groups.entry(key(r)).or_insert((0.0, 0));
            slot.0 += v;
            slot.1 += 1;
        }
    }

    let means: Vec<(String, f64, usize)> = groups
        .into_iter()
        .map(|(k, (sum, count))| (k.to_string(), sum / count as f64, count))
        .collect();
    let changes = pct_changes(&means.iter().map(|m| m.1).collect::<Vec<_>>());

    means
        .into_iter()
        .zip(changes)
        .map(|((label, mean, count), pct_change)| Bar {
            label,
            mean,
            count,
            pct_change,
        })
        .collect()
}

fn assess(claim: &Claim, bars: Vec<Bar>) -> Hypothesis {
    let changes: Vec<f64> = bars.iter().filter_map(|b| b.pct_change).collect();
    let observed_pct = if changes.is_empty() {
        None
    } else {
        Some(changes.iter().sum::<f64>() / changes.len() as f64)
    };
    Hypothesis {
        id: claim.id,
        statement: claim.statement,
        category: claim.category,
        metric: claim.metric,
        expected_pct: claim.expected_pct,
        bars,
        observed_pct,
        holds: observed_pct.map(|o| claim_holds(o, claim.expected_pct)),
    }
}

pub fn evaluate(records: &[HouseRecord]) -> Vec<Hypothesis> {
    let [h1, h2, h3, h4, h5, h6, h7, h8] = &CLAIMS;
    vec![
        assess(h1, grouped(records, |r| r.features.waterfront, h1.metric)),
        assess(h2, grouped(records, |r| r.features.era, h2.metric)),
        assess(h3, grouped(records, |r| r.features.basement, h3.metric)),
        assess(h4, grouped(records, |r| r.features.sale_year, h4.metric)),
        assess(h5, grouped(records, |r| r.features.design, h5.metric)),
        assess(h6, grouped(records, |r| r.features.view, h6.metric)),
        assess(h7, grouped(records, |r| r.features.floors, h7.metric)),
        assess(h8, grouped(records, |r| r.features.renovation, h8.metric)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::derive_all;
    use crate::features::tests::property;
    use chrono::NaiveDate;

    fn hypothesis<'a>(all: &'a [Hypothesis], id: &str) -> &'a Hypothesis {
        all.iter().find(|h| h.id == id).expect("hypothesis present")
    }

    #[test]
    fn pct_changes_match_consecutive_ratio() {
        let changes = pct_changes(&[100.0, 150.0, 75.0]);
        assert_eq!(changes[0], None);
        assert!((changes[1].unwrap() - 50.0).abs() < 1e-9);
        assert!((changes[2].unwrap() + 50.0).abs() < 1e-9);
        assert_eq!(pct_changes(&[0.0, 10.0]), vec![None, None]);
    }

    #[test]
    fn claims_in_both_directions() {
        assert!(claim_holds(212.64, 30.0));
        assert!(!claim_holds(0.52, 10.0));
        assert!(claim_holds(-60.0, -50.0));
        assert!(!claim_holds(0.79, -50.0));
        // "more expensive" with no threshold needs any increase.
        assert!(claim_holds(0.1, 0.0));
        assert!(!claim_holds(0.0, 0.0));
    }

    #[test]
    fn waterfront_hypothesis_compares_no_then_yes() {
        let mut water = property(1, 98001, 300.0, 3, 5);
        water.waterfront = 1;
        let records = derive_all(vec![
            property(2, 98001, 100.0, 3, 5),
            property(3, 98001, 100.0, 3, 5),
            water,
        ]);
        let all = evaluate(&records);
        assert_eq!(all.len(), 8);

        let h1 = hypothesis(&all, "H1");
        let labels: Vec<&str> = h1.bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["No", "Yes"]);
        assert_eq!(h1.bars[0].count, 2);
        assert!((h1.observed_pct.unwrap() - 200.0).abs() < 1e-9);
        assert_eq!(h1.holds, Some(true));
    }

    #[test]
    fn single_group_has_no_verdict() {
        let records = derive_all(vec![property(1, 98001, 100.0, 3, 5)]);
        let h8 = hypothesis(&evaluate(&records), "H8").clone();
        assert_eq!(h8.bars.len(), 1);
        assert_eq!(h8.observed_pct, None);
        assert_eq!(h8.holds, None);
    }

    #[test]
    fn lot_area_and_year_groupings() {
        let mut with_basement = property(1, 98001, 100.0, 3, 5);
        with_basement.sqft_basement = 500;
        with_basement.sqft_lot = 4000;
        let mut without = property(2, 98001, 110.0, 3, 5);
        without.sqft_lot = 6000;
        without.date = NaiveDate::from_ymd_opt(2015, 3, 1).unwrap();
        let records = derive_all(vec![with_basement, without]);
        let all = evaluate(&records);

        let h3 = hypothesis(&all, "H3");
        assert_eq!(h3.bars[0].label, "with basement");
        assert!((h3.observed_pct.unwrap() - 50.0).abs() < 1e-9);
        assert_eq!(h3.holds, Some(true));

        let h4 = hypothesis(&all, "H4");
        let years: Vec<&str> = h4.bars.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(years, vec!["2014", "2015"]);
        assert!((h4.observed_pct.unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn missing_prices_are_skipped_in_means() {
        let mut unpriced = property(1, 98001, 0.0, 3, 5);
        unpriced.price = None;
        let records = derive_all(vec![unpriced, property(2, 98001, 100.0, 3, 5)]);
        let h1 = hypothesis(&evaluate(&records), "H1").clone();
        assert_eq!(h1.bars[0].count, 1);
        assert_eq!(h1.bars[0].mean, 100.0);
    }
}
