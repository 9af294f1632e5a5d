pub mod classifier;
pub mod selection;

pub use classifier::{Assessment, Pricing, PricingReport};
pub use selection::Selection;
