use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::info;

use crate::error::{AppError, Result};
use crate::features::{derive_all, HouseRecord};
use crate::insights::{self, Hypothesis};
use crate::loader::{self, GeoSummary, LoadStats};
use crate::pricing::PricingReport;
use crate::types::{ConditionLabel, Property};

/// Distinct values offered by the sidebar filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub conditions: Vec<ConditionLabel>,
    pub zipcodes: Vec<u32>,
}

/// Everything derived from one load of the dataset. Immutable once built;
/// a new record set means a new snapshot.
#[derive(Debug)]
pub struct Snapshot {
    pub records: Vec<HouseRecord>,
    pub report: PricingReport,
    pub insights: Vec<Hypothesis>,
    pub filters: FilterOptions,
    pub load_stats: LoadStats,
    pub loaded_at_ns: u64,
}

impl Snapshot {
    pub fn build(properties: Vec<Property>, load_stats: LoadStats) -> Self {
        let records = derive_all(properties);
        let report = PricingReport::compute(&records);
        let insights = insights::evaluate(&records);

        let conditions: BTreeSet<ConditionLabel> = records
            .iter()
            .filter_map(|r| r.features.condition_label)
            .collect();
        let zipcodes: BTreeSet<u32> = records.iter().map(|r| r.property.zipcode).collect();

        Self {
            records,
            report,
            insights,
            filters: FilterOptions {
                conditions: conditions.into_iter().collect(),
                zipcodes: zipcodes.into_iter().collect(),
            },
            load_stats,
            loaded_at_ns: now_ns(),
        }
    }
}

/// Explicitly initialized holder of the current snapshot, shared by handlers.
pub struct DataStore {
    data_path: Option<PathBuf>,
    geofile: Option<GeoSummary>,
    current: RwLock<Arc<Snapshot>>,
    reloads: AtomicU64,
}

impl DataStore {
    /// Read, clean and classify the CSV at `data_path`.
    pub fn load(data_path: impl Into<PathBuf>, geofile: Option<GeoSummary>) -> Result<Arc<Self>> {
        let data_path = data_path.into();
        let properties = loader::load_properties(&data_path)?;
        let (cleaned, stats) = loader::clean(properties);
        let snapshot = Snapshot::build(cleaned, stats);
        log_loaded(&snapshot, &data_path);
        Ok(Arc::new(Self {
            data_path: Some(data_path),
            geofile,
            current: RwLock::new(Arc::new(snapshot)),
            reloads: AtomicU64::new(0),
        }))
    }

    /// Store over already-read properties. Cleaning still applies.
    pub fn from_properties(properties: Vec<Property>) -> Arc<Self> {
        let (cleaned, stats) = loader::clean(properties);
        Arc::new(Self {
            data_path: None,
            geofile: None,
            current: RwLock::new(Arc::new(Snapshot::build(cleaned, stats))),
            reloads: AtomicU64::new(0),
        })
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a new record set; every derived view is rebuilt.
    pub fn replace(&self, properties: Vec<Property>) -> Arc<Snapshot> {
        let (cleaned, stats) = loader::clean(properties);
        self.install(Snapshot::build(cleaned, stats))
    }

    /// Re-read the CSV. On error the current snapshot stays in place.
    pub fn reload(&self) -> Result<Arc<Snapshot>> {
        let path = self
            .data_path
            .as_ref()
            .ok_or_else(|| AppError::Config("store has no data path to reload from".to_string()))?;
        let properties = loader::load_properties(path)?;
        let snapshot = self.replace(properties);
        log_loaded(&snapshot, path);
        Ok(snapshot)
    }

    pub fn geofile(&self) -> Option<&GeoSummary> {
        self.geofile.as_ref()
    }

    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    fn install(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&snapshot);
        self.reloads.fetch_add(1, Ordering::Relaxed);
        snapshot
    }
}

fn log_loaded(snapshot: &Snapshot, path: &Path) {
    let stats = snapshot.load_stats;
    info!(
        rows = stats.rows_read,
        dropped = stats.dropped_invalid_bedrooms,
        buy = snapshot.report.buy_count(),
        excluded = snapshot.report.excluded,
        "Loaded {} properties from {} ({} buy recommendations, total profit US$ {:.2})",
        stats.retained,
        path.display(),
        snapshot.report.buy_count(),
        snapshot.report.total_profit(),
    );
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
