use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::api::health::HealthResponse;
use crate::api::latency::{LatencyResponse, LatencyStats};
use crate::config::{CLUSTER_PRECISION, MAX_CLUSTER_PRECISION};
use crate::error::{AppError, Result};
use crate::insights::Hypothesis;
use crate::map::{self, ClusterMap, MapPoint};
use crate::pricing::{Assessment, Selection};
use crate::state::{DataStore, FilterOptions, Snapshot};
use crate::types::{ConditionLabel, Season, Status};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<DataStore>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/filters", get(get_filters))
        .route("/properties/buy", get(get_buy_table))
        .route("/properties/pricing", get(get_pricing_table))
        .route("/map/points", get(get_map_points))
        .route("/map/clusters", get(get_map_clusters))
        .route("/insights", get(get_insights))
        .route("/stats/latency", get(get_stats_latency))
        .route("/reload", post(post_reload))
        .layer(middleware::from_fn_with_state(state.clone(), track_latency))
        .with_state(state)
}

async fn track_latency(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    let elapsed = started.elapsed();
    state.latency.record(elapsed);
    debug!(path = %path, status = response.status().as_u16(), elapsed_us = elapsed.as_micros() as u64, "request");
    response
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

/// Comma-separated multi-select values: `?condition=good,excellent&zipcode=98001`.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub condition: Option<String>,
    pub zipcode: Option<String>,
}

impl FilterQuery {
    fn selection(&self) -> Result<Selection> {
        Selection::parse(self.condition.as_deref(), self.zipcode.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClusterQuery {
    #[serde(flatten)]
    pub filter: FilterQuery,
    /// Parsed from text because flattened query values all arrive as strings.
    #[serde(default, deserialize_with = "optional_u32")]
    pub precision: Option<u32>,
}

fn optional_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct BuyRow {
    pub id: u64,
    pub zipcode: u32,
    pub price: f64,
    pub price_median: f64,
    pub condition: ConditionLabel,
    pub status: Status,
}

#[derive(Debug, Serialize)]
pub struct BuyTableResponse {
    pub count: usize,
    pub rows: Vec<BuyRow>,
}

#[derive(Debug, Serialize)]
pub struct PricingRow {
    pub id: u64,
    pub zipcode: u32,
    pub price: f64,
    pub season: Season,
    pub price_median_season: f64,
    pub condition: ConditionLabel,
    pub selling_price: f64,
    pub profit: f64,
}

#[derive(Debug, Serialize)]
pub struct PricingTableResponse {
    pub count: usize,
    /// Rounded to cents.
    pub total_profit: f64,
    pub rows: Vec<PricingRow>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub records: usize,
    pub buy_count: usize,
    pub reloads: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn selected_buys<'a>(snap: &'a Snapshot, selection: &Selection) -> Vec<&'a Assessment> {
    selection.apply(snap.report.buy_list())
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse::collect(&state.store))
}

async fn get_filters(State(state): State<ApiState>) -> Json<FilterOptions> {
    Json(state.store.snapshot().filters.clone())
}

async fn get_buy_table(
    State(state): State<ApiState>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<BuyTableResponse>> {
    let selection = params.selection()?;
    let snap = state.store.snapshot();

    let rows: Vec<BuyRow> = selected_buys(&snap, &selection)
        .into_iter()
        .map(|a| BuyRow {
            id: a.id,
            zipcode: a.zipcode,
            price: a.price,
            price_median: a.price_median,
            condition: a.condition_label,
            status: a.status,
        })
        .collect();

    Ok(Json(BuyTableResponse {
        count: rows.len(),
        rows,
    }))
}

async fn get_pricing_table(
    State(state): State<ApiState>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<PricingTableResponse>> {
    let selection = params.selection()?;
    let snap = state.store.snapshot();

    let rows: Vec<PricingRow> = selected_buys(&snap, &selection)
        .into_iter()
        .filter_map(|a| {
            let p = a.pricing?;
            Some(PricingRow {
                id: a.id,
                zipcode: a.zipcode,
                price: a.price,
                season: a.season,
                price_median_season: p.price_median_season,
                condition: a.condition_label,
                selling_price: p.selling_price,
                profit: p.profit,
            })
        })
        .collect();

    let total_profit: f64 = rows.iter().map(|r| r.profit).sum();
    Ok(Json(PricingTableResponse {
        count: rows.len(),
        total_profit: (total_profit * 100.0).round() / 100.0,
        rows,
    }))
}

async fn get_map_points(
    State(state): State<ApiState>,
    Query(params): Query<FilterQuery>,
) -> Result<Json<Vec<MapPoint>>> {
    let selection = params.selection()?;
    let snap = state.store.snapshot();
    let rows = selected_buys(&snap, &selection);
    Ok(Json(map::scatter_points(&snap.records, &rows)))
}

async fn get_map_clusters(
    State(state): State<ApiState>,
    Query(params): Query<ClusterQuery>,
) -> Result<Json<ClusterMap>> {
    let selection = params.filter.selection()?;
    let precision = params.precision.unwrap_or(CLUSTER_PRECISION);
    if precision > MAX_CLUSTER_PRECISION {
        return Err(AppError::Filter(format!(
            "precision must be at most {MAX_CLUSTER_PRECISION}"
        )));
    }
    let snap = state.store.snapshot();
    let rows = selected_buys(&snap, &selection);
    Ok(Json(map::cluster_map(&snap.records, &rows, precision)))
}

async fn get_insights(State(state): State<ApiState>) -> Json<Vec<Hypothesis>> {
    Json(state.store.snapshot().insights.clone())
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(state.latency.report())
}

async fn post_reload(State(state): State<ApiState>) -> Result<Json<ReloadResponse>> {
    let store = Arc::clone(&state.store);
    let snap = match tokio::task::spawn_blocking(move || store.reload()).await? {
        Ok(s) => s,
        Err(e) => {
            warn!("Reload failed, keeping previous snapshot: {e}");
            return Err(e);
        }
    };
    info!("Reloaded {} records", snap.records.len());
    Ok(Json(ReloadResponse {
        records: snap.records.len(),
        buy_count: snap.report.buy_count(),
        reloads: state.store.reload_count(),
    }))
}
