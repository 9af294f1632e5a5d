use chrono::Datelike;
use serde::Serialize;

use crate::types::{
    Basement, ConditionLabel, ConstructionEra, DesignGrade, FloorsBucket, Property, Renovation,
    Season, ViewBucket, Waterfront,
};

/// Categorical attributes derived once per load from a raw property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Features {
    pub basement: Basement,
    pub renovation: Renovation,
    /// None when the condition score is missing.
    pub condition_label: Option<ConditionLabel>,
    pub era: ConstructionEra,
    pub season: Season,
    /// Calendar year of the transaction.
    pub sale_year: i32,
    pub design: DesignGrade,
    pub view: ViewBucket,
    pub floors: FloorsBucket,
    pub waterfront: Waterfront,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseRecord {
    pub property: Property,
    pub features: Features,
}

pub fn derive(property: &Property) -> Features {
    Features {
        basement: Basement::from_sqft(property.sqft_basement),
        renovation: Renovation::from_year(property.yr_renovated),
        condition_label: property.condition.map(ConditionLabel::from_condition),
        era: ConstructionEra::from_year_built(property.yr_built),
        season: Season::from_date(property.date),
        sale_year: property.date.year(),
        design: DesignGrade::from_grade(property.grade),
        view: ViewBucket::from_views(property.view),
        floors: FloorsBucket::from_floors(property.floors),
        waterfront: Waterfront::from_flag(property.waterfront),
    }
}

pub fn derive_all(properties: Vec<Property>) -> Vec<HouseRecord> {
    properties
        .into_iter()
        .map(|property| {
            let features = derive(&property);
            HouseRecord { property, features }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;

    pub(crate) fn property(id: u64, zipcode: u32, price: f64, condition: u8, month: u32) -> Property {
        Property {
            id,
            date: NaiveDate::from_ymd_opt(2014, month, 15).unwrap(),
            price: Some(price),
            bedrooms: 3,
            bathrooms: 2.0,
            sqft_living: 1800,
            sqft_lot: 5000,
            floors: 1.0,
            waterfront: 0,
            view: 0,
            condition: Some(condition as f64),
            grade: 7,
            sqft_basement: 0,
            yr_built: 1970,
            yr_renovated: 0,
            zipcode,
            lat: 47.5,
            long: -122.2,
        }
    }

    #[test]
    fn condition_labels_cover_all_scores() {
        assert_eq!(ConditionLabel::from_condition(1.0), ConditionLabel::TooBad);
        assert_eq!(ConditionLabel::from_condition(2.0), ConditionLabel::Bad);
        assert_eq!(ConditionLabel::from_condition(3.0), ConditionLabel::Median);
        assert_eq!(ConditionLabel::from_condition(4.0), ConditionLabel::Good);
        assert_eq!(ConditionLabel::from_condition(5.0), ConditionLabel::Excellent);
        // Anything unexpected falls through to the last branch.
        assert_eq!(ConditionLabel::from_condition(0.0), ConditionLabel::Excellent);
        assert_eq!(ConditionLabel::from_condition(2.5), ConditionLabel::Excellent);
    }

    #[test]
    fn condition_label_parses_display_and_snake_forms() {
        assert_eq!("too bad".parse::<ConditionLabel>(), Ok(ConditionLabel::TooBad));
        assert_eq!("too_bad".parse::<ConditionLabel>(), Ok(ConditionLabel::TooBad));
        assert_eq!(" Good ".parse::<ConditionLabel>(), Ok(ConditionLabel::Good));
        assert!("great".parse::<ConditionLabel>().is_err());
    }

    #[test]
    fn seasons_follow_calendar_buckets() {
        let expected = [
            (1, Season::Winter),
            (2, Season::Winter),
            (3, Season::Spring),
            (5, Season::Spring),
            (6, Season::Summer),
            (8, Season::Summer),
            (9, Season::Fall),
            (11, Season::Fall),
            (12, Season::Winter),
        ];
        for (month, season) in expected {
            assert_eq!(Season::from_month(month), season, "month {month}");
        }
    }

    #[test]
    fn binary_thresholds() {
        assert_eq!(Basement::from_sqft(0), Basement::WithoutBasement);
        assert_eq!(Basement::from_sqft(1), Basement::WithBasement);
        assert_eq!(Renovation::from_year(0), Renovation::No);
        assert_eq!(Renovation::from_year(1991), Renovation::Yes);
        assert_eq!(ConstructionEra::from_year_built(1954), ConstructionEra::Before1955);
        assert_eq!(ConstructionEra::from_year_built(1955), ConstructionEra::Since1955);
        assert_eq!(DesignGrade::from_grade(10), DesignGrade::AverageOrLow);
        assert_eq!(DesignGrade::from_grade(11), DesignGrade::High);
        assert_eq!(ViewBucket::from_views(2), ViewBucket::LessThanThree);
        assert_eq!(ViewBucket::from_views(3), ViewBucket::ThreeOrMore);
        assert_eq!(FloorsBucket::from_floors(1.5), FloorsBucket::LessThanTwo);
        assert_eq!(FloorsBucket::from_floors(2.0), FloorsBucket::TwoOrMore);
        assert_eq!(Waterfront::from_flag(1), Waterfront::Yes);
    }

    #[test]
    fn derive_reads_date_and_missing_condition() {
        let mut p = property(1, 98001, 100.0, 4, 7);
        p.condition = None;
        let f = derive(&p);
        assert_eq!(f.season, Season::Summer);
        assert_eq!(f.sale_year, 2014);
        assert!(f.condition_label.is_none());
    }
}
