use std::collections::BTreeSet;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FilterOptions {
    pub conditions: Vec<String>,
    pub zipcodes: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct BuyRow {
    pub id: u64,
    pub zipcode: u32,
    pub price: f64,
    pub price_median: f64,
    pub condition: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BuyTableResponse {
    pub count: usize,
    pub rows: Vec<BuyRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct PricingRow {
    pub id: u64,
    pub zipcode: u32,
    pub price: f64,
    pub season: String,
    pub price_median_season: f64,
    pub condition: String,
    pub selling_price: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PricingTableResponse {
    pub count: usize,
    pub total_profit: f64,
    pub rows: Vec<PricingRow>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct MapPoint {
    pub id: u64,
    pub lat: f64,
    pub long: f64,
    pub price: f64,
    pub zipcode: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct Marker {
    pub id: u64,
    pub lat: f64,
    pub long: f64,
    pub popup: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cluster {
    pub lat: f64,
    pub long: f64,
    pub count: usize,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLong {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ClusterMap {
    pub center: Option<LatLong>,
    pub precision: u32,
    pub clusters: Vec<Cluster>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct Bar {
    pub label: String,
    pub mean: f64,
    pub count: usize,
    pub pct_change: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct Hypothesis {
    pub id: String,
    pub statement: String,
    pub category: String,
    pub metric: String,
    pub expected_pct: f64,
    pub bars: Vec<Bar>,
    pub observed_pct: Option<f64>,
    pub holds: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub buy_count: Option<usize>,
    pub classified: Option<usize>,
    pub excluded: Option<usize>,
    pub zipcodes: Option<usize>,
    pub reloads: Option<u64>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Buy,
    Pricing,
    Map,
    Clusters,
    Insights,
}

impl View {
    pub const ALL: [View; 5] = [
        View::Buy,
        View::Pricing,
        View::Map,
        View::Clusters,
        View::Insights,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            View::Buy => "Buy",
            View::Pricing => "Pricing",
            View::Map => "Map",
            View::Clusters => "Clusters",
            View::Insights => "Insights",
        }
    }

    pub fn next(self) -> Self {
        let idx = View::ALL.iter().position(|v| *v == self).unwrap_or(0);
        View::ALL[(idx + 1) % View::ALL.len()]
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub view: View,
    pub options: FilterOptions,
    /// Selected condition labels; empty shows every condition.
    pub conditions: BTreeSet<String>,
    /// Index into `options.conditions` that space toggles.
    pub condition_cursor: usize,
    pub zipcodes: Vec<u32>,
    /// Digits typed after pressing `z`, until Enter/Esc.
    pub zip_input: Option<String>,
    pub buy: BuyTableResponse,
    pub pricing: PricingTableResponse,
    pub points: Vec<MapPoint>,
    pub clusters: ClusterMap,
    pub cluster_index: usize,
    pub marker_index: usize,
    pub insights: Vec<Hypothesis>,
    pub insight_index: usize,
    pub health: HealthResponse,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            view: View::Buy,
            options: FilterOptions::default(),
            conditions: BTreeSet::new(),
            condition_cursor: 0,
            zipcodes: Vec::new(),
            zip_input: None,
            buy: BuyTableResponse::default(),
            pricing: PricingTableResponse::default(),
            points: Vec::new(),
            clusters: ClusterMap::default(),
            cluster_index: 0,
            marker_index: 0,
            insights: Vec::new(),
            insight_index: 0,
            health: HealthResponse::default(),
            base_url,
        }
    }

    /// Comma-joined multi-select parameters for the current selection.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.conditions.is_empty() {
            let labels: Vec<&str> = self.conditions.iter().map(String::as_str).collect();
            params.push(("condition", labels.join(",")));
        }
        if !self.zipcodes.is_empty() {
            let zips: Vec<String> = self.zipcodes.iter().map(|z| z.to_string()).collect();
            params.push(("zipcode", zips.join(",")));
        }
        params
    }

    /// Label under the condition cursor, if any labels are loaded.
    pub fn cursor_condition(&self) -> Option<&str> {
        self.options
            .conditions
            .get(self.condition_cursor)
            .map(String::as_str)
    }

    pub fn next_condition(&mut self) {
        let n = self.options.conditions.len();
        if n > 0 {
            self.condition_cursor = (self.condition_cursor + 1) % n;
        }
    }

    /// Add or remove the label under the cursor. Returns true if the selection changed.
    pub fn toggle_condition(&mut self) -> bool {
        let Some(label) = self.cursor_condition().map(str::to_string) else {
            return false;
        };
        if !self.conditions.remove(&label) {
            self.conditions.insert(label);
        }
        true
    }

    pub fn start_zip_input(&mut self) {
        self.zip_input = Some(String::new());
    }

    pub fn push_zip_char(&mut self, c: char) {
        if let Some(input) = self.zip_input.as_mut() {
            if c.is_ascii_digit() && input.len() < 5 {
                input.push(c);
            }
        }
    }

    pub fn pop_zip_char(&mut self) {
        if let Some(input) = self.zip_input.as_mut() {
            input.pop();
        }
    }

    /// Add the typed zipcode to the selection. Returns true if it changed.
    pub fn commit_zip_input(&mut self) -> bool {
        let Some(input) = self.zip_input.take() else {
            return false;
        };
        match input.parse::<u32>() {
            Ok(zip) if !self.zipcodes.contains(&zip) => {
                self.zipcodes.push(zip);
                self.zipcodes.sort_unstable();
                true
            }
            _ => false,
        }
    }

    pub fn cancel_zip_input(&mut self) {
        self.zip_input = None;
    }

    pub fn clear_filters(&mut self) {
        self.conditions.clear();
        self.zipcodes.clear();
    }

    pub fn selected_cluster(&self) -> Option<&Cluster> {
        self.clusters.clusters.get(self.cluster_index)
    }

    pub fn selected_marker(&self) -> Option<&Marker> {
        self.selected_cluster()?.markers.get(self.marker_index)
    }

    pub fn next_cluster(&mut self) {
        let n = self.clusters.clusters.len();
        if n > 0 {
            self.cluster_index = (self.cluster_index + 1) % n;
            self.marker_index = 0;
        }
    }

    pub fn prev_cluster(&mut self) {
        let n = self.clusters.clusters.len();
        if n > 0 {
            self.cluster_index = (self.cluster_index + n - 1) % n;
            self.marker_index = 0;
        }
    }

    pub fn next_marker(&mut self) {
        let n = self.selected_cluster().map_or(0, |c| c.markers.len());
        if n > 0 {
            self.marker_index = (self.marker_index + 1) % n;
        }
    }

    pub fn prev_marker(&mut self) {
        let n = self.selected_cluster().map_or(0, |c| c.markers.len());
        if n > 0 {
            self.marker_index = (self.marker_index + n - 1) % n;
        }
    }

    /// Keep the cluster and marker selection inside freshly fetched data.
    fn clamp_cluster_selection(&mut self) {
        if self.cluster_index >= self.clusters.clusters.len() {
            self.cluster_index = 0;
            self.marker_index = 0;
        }
        let markers = self.selected_cluster().map_or(0, |c| c.markers.len());
        if self.marker_index >= markers {
            self.marker_index = 0;
        }
    }

    pub fn next_insight(&mut self) {
        if !self.insights.is_empty() {
            self.insight_index = (self.insight_index + 1) % self.insights.len();
        }
    }

    pub fn prev_insight(&mut self) {
        if !self.insights.is_empty() {
            self.insight_index =
                (self.insight_index + self.insights.len() - 1) % self.insights.len();
        }
    }

    pub fn current_insight(&self) -> Option<&Hypothesis> {
        self.insights.get(self.insight_index)
    }

    /// Rows in the table of the active view.
    pub fn row_count(&self) -> usize {
        match self.view {
            View::Buy => self.buy.rows.len(),
            View::Pricing => self.pricing.rows.len(),
            View::Map | View::Clusters | View::Insights => 0,
        }
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let params = self.query_params();
        let buy_url = format!("{}/properties/buy", self.base_url);
        let pricing_url = format!("{}/properties/pricing", self.base_url);
        let points_url = format!("{}/map/points", self.base_url);
        let clusters_url = format!("{}/map/clusters", self.base_url);
        let filters_url = format!("{}/filters", self.base_url);
        let insights_url = format!("{}/insights", self.base_url);
        let health_url = format!("{}/health", self.base_url);

        let (buy_res, pricing_res, points_res, clusters_res, filters_res, insights_res, health_res) = tokio::join!(
            fetch::<BuyTableResponse>(client, &buy_url, &params),
            fetch::<PricingTableResponse>(client, &pricing_url, &params),
            fetch::<Vec<MapPoint>>(client, &points_url, &params),
            fetch::<ClusterMap>(client, &clusters_url, &params),
            fetch::<FilterOptions>(client, &filters_url, &[]),
            fetch::<Vec<Hypothesis>>(client, &insights_url, &[]),
            fetch::<HealthResponse>(client, &health_url, &[]),
        );

        match (buy_res, pricing_res, points_res, clusters_res) {
            (Ok(b), Ok(p), Ok(m), Ok(c)) => {
                self.buy = b;
                self.pricing = p;
                self.points = m;
                self.clusters = c;
                self.clamp_cluster_selection();
                self.status = ConnectionStatus::Connected;
            }
            (Err(e), _, _, _) | (_, Err(e), _, _) | (_, _, Err(e), _) | (_, _, _, Err(e)) => {
                self.status = ConnectionStatus::Error(e);
                return;
            }
        }

        if let Ok(f) = filters_res {
            self.options = f;
            if self.condition_cursor >= self.options.conditions.len() {
                self.condition_cursor = 0;
            }
        }
        if let Ok(i) = insights_res {
            self.insights = i;
            if self.insight_index >= self.insights.len() {
                self.insight_index = 0;
            }
        }
        if let Ok(h) = health_res {
            self.health = h;
        }
    }
}

async fn fetch<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    params: &[(&str, String)],
) -> Result<T, String> {
    let resp = client
        .get(url)
        .query(params)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(format!("{status}: {}", truncate(&body, 60)));
    }
    resp.json::<T>().await.map_err(|e| format!("parse error: {e}"))
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `1234567.891` → `$1,234,567.89`
pub fn format_money(v: f64) -> String {
    let cents = (v.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if v < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

pub fn format_pct(v: Option<f64>) -> String {
    match v {
        Some(p) => format!("{p:+.2}%"),
        None => "—".to_string(),
    }
}

pub fn format_verdict(holds: Option<bool>) -> &'static str {
    match holds {
        Some(true) => "TRUE",
        Some(false) => "FALSE",
        None => "—",
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
