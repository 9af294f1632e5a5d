//! Payload for the /health endpoint, read from the data store.

use serde::Serialize;

use crate::loader::{GeoSummary, LoadStats};
use crate::state::DataStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub load: LoadStats,
    pub classified: usize,
    pub excluded: usize,
    pub buy_count: usize,
    pub zipcodes: usize,
    /// Nanosecond timestamp of the current snapshot.
    pub loaded_at_ns: u64,
    /// Snapshot swaps since startup.
    pub reloads: u64,
    pub geofile: Option<GeoSummary>,
}

impl HealthResponse {
    pub fn collect(store: &DataStore) -> Self {
        let snap = store.snapshot();
        Self {
            status: "ok",
            load: snap.load_stats,
            classified: snap.report.assessments.len(),
            excluded: snap.report.excluded,
            buy_count: snap.report.buy_count(),
            zipcodes: snap.report.zip_medians.len(),
            loaded_at_ns: snap.loaded_at_ns,
            reloads: store.reload_count(),
            geofile: store.geofile().cloned(),
        }
    }
}
