mod api;
mod config;
mod error;
mod features;
mod insights;
mod loader;
mod map;
mod pricing;
mod state;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::insights::Hypothesis;
use crate::loader::fetch_geofile;
use crate::state::DataStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Boundary file (read, otherwise unused) ---
    let geofile = if cfg.geofile_url.is_empty() {
        warn!("GEOFILE_URL is empty, skipping boundary file");
        None
    } else {
        Some(fetch_geofile(&cfg.geofile_url).await?)
    };

    // --- Dataset: load once, classify, hold for the session ---
    let data_path = cfg.data_path.clone();
    let store = tokio::task::spawn_blocking(move || DataStore::load(data_path, geofile)).await??;

    let snap = store.snapshot();
    info!(
        "Ready: {} buy recommendations across {} zipcodes ({} excluded for missing price/condition)",
        snap.report.buy_count(),
        snap.report.zip_medians.len(),
        snap.report.excluded,
    );
    for h in &snap.insights {
        log_hypothesis(h);
    }
    drop(snap);

    // --- HTTP API server ---
    let api_state = ApiState {
        store,
        latency: Arc::new(LatencyStats::new()),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_hypothesis(h: &Hypothesis) {
    let observed = h
        .observed_pct
        .map(|p| format!("{p:+.2}%"))
        .unwrap_or_else(|| "n/a".to_string());
    let verdict = match h.holds {
        Some(true) => "TRUE",
        Some(false) => "FALSE",
        None => "UNDECIDED",
    };
    info!(
        event = "HYPOTHESIS",
        id = h.id,
        expected_pct = h.expected_pct,
        "{} | {} | observed: {} | {}",
        h.id, verdict, observed, h.statement,
    );
}
