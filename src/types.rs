use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::feature_thresholds;

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// One cleaned row of the property dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub id: u64,
    pub date: NaiveDate,
    /// Absent or NaN in the input keeps the row but excludes it from pricing.
    pub price: Option<f64>,
    pub bedrooms: u32,
    pub bathrooms: f64,
    pub sqft_living: u32,
    pub sqft_lot: u32,
    pub floors: f64,
    pub waterfront: u8,
    pub view: u8,
    /// Raw score as read; fractional scores are kept so the buy rule sees them unrounded.
    pub condition: Option<f64>,
    pub grade: u8,
    pub sqft_basement: u32,
    pub yr_built: i32,
    pub yr_renovated: i32,
    pub zipcode: u32,
    pub lat: f64,
    pub long: f64,
}

impl Property {
    /// Price usable for medians and averages.
    pub fn valid_price(&self) -> Option<f64> {
        self.price.filter(|p| p.is_finite())
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionLabel {
    #[serde(rename = "too bad")]
    TooBad,
    #[serde(rename = "bad")]
    Bad,
    #[serde(rename = "median")]
    Median,
    #[serde(rename = "good")]
    Good,
    #[serde(rename = "excellent")]
    Excellent,
}

impl ConditionLabel {
    pub const ALL: [ConditionLabel; 5] = [
        ConditionLabel::TooBad,
        ConditionLabel::Bad,
        ConditionLabel::Median,
        ConditionLabel::Good,
        ConditionLabel::Excellent,
    ];

    /// Only the exact scores 1 to 4 get their own label; anything else,
    /// fractional scores included, falls through to `Excellent`.
    pub fn from_condition(condition: f64) -> Self {
        if condition == 1.0 {
            ConditionLabel::TooBad
        } else if condition == 2.0 {
            ConditionLabel::Bad
        } else if condition == 3.0 {
            ConditionLabel::Median
        } else if condition == 4.0 {
            ConditionLabel::Good
        } else {
            ConditionLabel::Excellent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionLabel::TooBad => "too bad",
            ConditionLabel::Bad => "bad",
            ConditionLabel::Median => "median",
            ConditionLabel::Good => "good",
            ConditionLabel::Excellent => "excellent",
        }
    }
}

impl std::fmt::Display for ConditionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConditionLabel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        ConditionLabel::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown condition label {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// Season
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_month(date.month())
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
            Season::Winter => "Winter",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Binary features
//
// Variant order is the chart order: baseline bar first.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basement {
    WithBasement,
    WithoutBasement,
}

impl Basement {
    pub fn from_sqft(sqft_basement: u32) -> Self {
        if sqft_basement > 0 {
            Basement::WithBasement
        } else {
            Basement::WithoutBasement
        }
    }
}

impl std::fmt::Display for Basement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Basement::WithBasement => write!(f, "with basement"),
            Basement::WithoutBasement => write!(f, "without basement"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Renovation {
    No,
    Yes,
}

impl Renovation {
    /// `yr_renovated == 0` means never renovated.
    pub fn from_year(yr_renovated: i32) -> Self {
        if yr_renovated == 0 {
            Renovation::No
        } else {
            Renovation::Yes
        }
    }
}

impl std::fmt::Display for Renovation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Renovation::No => write!(f, "no"),
            Renovation::Yes => write!(f, "yes"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waterfront {
    No,
    Yes,
}

impl Waterfront {
    pub fn from_flag(waterfront: u8) -> Self {
        if waterfront == 0 {
            Waterfront::No
        } else {
            Waterfront::Yes
        }
    }
}

impl std::fmt::Display for Waterfront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Waterfront::No => write!(f, "No"),
            Waterfront::Yes => write!(f, "Yes"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionEra {
    /// Built in or after the cut-off year.
    Since1955,
    Before1955,
}

impl ConstructionEra {
    pub fn from_year_built(yr_built: i32) -> Self {
        if yr_built < feature_thresholds::CONSTRUCTION_YEAR {
            ConstructionEra::Before1955
        } else {
            ConstructionEra::Since1955
        }
    }
}

impl std::fmt::Display for ConstructionEra {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstructionEra::Since1955 => write!(f, "> 1955"),
            ConstructionEra::Before1955 => write!(f, "< 1955"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignGrade {
    AverageOrLow,
    High,
}

impl DesignGrade {
    pub fn from_grade(grade: u8) -> Self {
        if grade > feature_thresholds::HIGH_GRADE {
            DesignGrade::High
        } else {
            DesignGrade::AverageOrLow
        }
    }
}

impl std::fmt::Display for DesignGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesignGrade::AverageOrLow => write!(f, "Average or low"),
            DesignGrade::High => write!(f, "High"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewBucket {
    LessThanThree,
    ThreeOrMore,
}

impl ViewBucket {
    pub fn from_views(view: u8) -> Self {
        if view >= feature_thresholds::MIN_VIEWS {
            ViewBucket::ThreeOrMore
        } else {
            ViewBucket::LessThanThree
        }
    }
}

impl std::fmt::Display for ViewBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewBucket::LessThanThree => write!(f, "less than 3"),
            ViewBucket::ThreeOrMore => write!(f, "3 or more"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorsBucket {
    LessThanTwo,
    TwoOrMore,
}

impl FloorsBucket {
    pub fn from_floors(floors: f64) -> Self {
        if floors >= feature_thresholds::MIN_FLOORS {
            FloorsBucket::TwoOrMore
        } else {
            FloorsBucket::LessThanTwo
        }
    }
}

impl std::fmt::Display for FloorsBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FloorsBucket::LessThanTwo => write!(f, "less than 2"),
            FloorsBucket::TwoOrMore => write!(f, "2 or more"),
        }
    }
}

// ---------------------------------------------------------------------------
// Recommendation status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "buy")]
    Buy,
    #[serde(rename = "not buy")]
    NotBuy,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Buy => write!(f, "buy"),
            Status::NotBuy => write!(f, "not buy"),
        }
    }
}
