pub mod store;

pub use store::{DataStore, FilterOptions, Snapshot};
