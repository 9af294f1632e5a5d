use std::collections::BTreeSet;

use crate::error::{AppError, Result};
use crate::pricing::classifier::Assessment;
use crate::types::ConditionLabel;

/// Sidebar multi-select filters. An empty set does not restrict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub conditions: BTreeSet<ConditionLabel>,
    pub zipcodes: BTreeSet<u32>,
}

impl Selection {
    /// Parse comma-separated query values, e.g. `good,excellent` and `98001,98002`.
    pub fn parse(conditions: Option<&str>, zipcodes: Option<&str>) -> Result<Self> {
        let conditions = split(conditions)
            .map(|c| c.parse::<ConditionLabel>().map_err(AppError::Filter))
            .collect::<Result<BTreeSet<_>>>()?;
        let zipcodes = split(zipcodes)
            .map(|z| {
                z.parse::<u32>()
                    .map_err(|_| AppError::Filter(format!("invalid zipcode {z:?}")))
            })
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self { conditions, zipcodes })
    }

    pub fn matches(&self, a: &Assessment) -> bool {
        (self.conditions.is_empty() || self.conditions.contains(&a.condition_label))
            && (self.zipcodes.is_empty() || self.zipcodes.contains(&a.zipcode))
    }

    pub fn apply<'a>(&self, rows: Vec<&'a Assessment>) -> Vec<&'a Assessment> {
        rows.into_iter().filter(|a| self.matches(a)).collect()
    }
}

fn split(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Season, Status};

    fn row(id: u64, zipcode: u32, label: ConditionLabel) -> Assessment {
        Assessment {
            record: 0,
            id,
            zipcode,
            price: 100.0,
            condition: 3.0,
            condition_label: label,
            season: Season::Spring,
            price_median: 200.0,
            status: Status::Buy,
            pricing: None,
        }
    }

    fn ids(sel: &Selection, rows: &[Assessment]) -> Vec<u64> {
        sel.apply(rows.iter().collect()).iter().map(|a| a.id).collect()
    }

    #[test]
    fn empty_selection_keeps_everything() {
        let rows = vec![row(1, 98001, ConditionLabel::Good), row(2, 98002, ConditionLabel::Median)];
        assert_eq!(ids(&Selection::default(), &rows), vec![1, 2]);
    }

    #[test]
    fn condition_and_zipcode_intersect() {
        let rows = vec![
            row(1, 98001, ConditionLabel::Good),
            row(2, 98002, ConditionLabel::Good),
            row(3, 98001, ConditionLabel::Median),
        ];
        let only_zip = Selection::parse(None, Some("98001")).unwrap();
        assert_eq!(ids(&only_zip, &rows), vec![1, 3]);

        let only_cond = Selection::parse(Some("good"), None).unwrap();
        assert_eq!(ids(&only_cond, &rows), vec![1, 2]);

        let both = Selection::parse(Some("good"), Some("98001")).unwrap();
        assert_eq!(ids(&both, &rows), vec![1]);
    }

    #[test]
    fn parse_rejects_bad_values() {
        assert!(matches!(Selection::parse(Some("great"), None), Err(AppError::Filter(_))));
        assert!(matches!(Selection::parse(None, Some("98x01")), Err(AppError::Filter(_))));
        let sel = Selection::parse(Some(" too bad , excellent,"), Some("")).unwrap();
        assert_eq!(sel.conditions.len(), 2);
        assert!(sel.zipcodes.is_empty());
    }
}
