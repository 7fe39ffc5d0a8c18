//! HTTP API for WiFi quality collection.
//!
//! Lets a dashboard start and stop collection runs, poll their status, and
//! read the stored history. Core failures never become 5xx responses: they
//! come back as status values or empty results. A 500 means a handler task
//! itself died.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use log::{error, info};
use serde::{Deserialize, Serialize};

use wifimon_core::{
    CollectionController, Dimension, FilterOptions, GroupSummary, Location, LocationSummary,
    Metric, RowFilter, SampleRow, StartStatus, StopStatus, load_all, location_summary,
    next_run_number, read_recent, series,
};

const DEFAULT_RECENT: usize = 20;
const MAX_RECENT: usize = 1000;

/// Shared server state.
pub struct AppState {
    controller: CollectionController,
    /// Used when a start request names no locations.
    default_locations: Vec<Location>,
}

impl AppState {
    pub fn new(controller: CollectionController, default_locations: Vec<Location>) -> Self {
        Self {
            controller,
            default_locations,
        }
    }

    pub fn controller(&self) -> &CollectionController {
        &self.controller
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StartRequest {
    locations: Vec<Location>,
}

#[derive(Serialize)]
struct StartResponse {
    status: &'static str,
    run_no: Option<u32>,
    message: String,
}

impl From<StartStatus> for StartResponse {
    fn from(status: StartStatus) -> Self {
        Self {
            status: status.label(),
            run_no: status.run_no(),
            message: status.to_string(),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct StopParams {
    /// Block until the worker exits (bounded by the stop timeout).
    wait: bool,
}

#[derive(Serialize)]
struct StopResponse {
    status: &'static str,
    run_no: Option<u32>,
    message: String,
    /// Set when the request asked to wait: whether the worker has exited.
    #[serde(skip_serializing_if = "Option::is_none")]
    finished: Option<bool>,
}

#[derive(Serialize)]
struct StatusResponse {
    running: bool,
    run_no: Option<u32>,
}

#[derive(Deserialize)]
struct RecentParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct RecentResponse {
    samples: Vec<SampleRow>,
    total: usize,
}

#[derive(Deserialize)]
struct SummaryParams {
    by: Option<String>,
    #[serde(flatten)]
    filter: RowFilter,
}

#[derive(Serialize)]
struct SummaryResponse {
    dimension: Dimension,
    filter: RowFilter,
    groups: Vec<GroupSummary>,
}

#[derive(Serialize)]
struct LocationsResponse {
    locations: Vec<LocationSummary>,
}

#[derive(Deserialize)]
struct SeriesParams {
    metric: Option<String>,
    #[serde(flatten)]
    filter: RowFilter,
}

#[derive(Serialize)]
struct SeriesPoint {
    timestamp: String,
    value: f64,
}

#[derive(Serialize)]
struct SeriesResponse {
    metric: Metric,
    label: &'static str,
    points: Vec<SeriesPoint>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Run blocking core work (file I/O, thread joins) off the async executor.
///
/// Only a panicked or cancelled task fails here; that is a server fault.
async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&AppState) -> T + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("blocking task failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "request could not be completed".to_string(),
                }),
            )
        })
}

async fn handle_start(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<StartResponse>, ApiError> {
    let request: StartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid body: {e}")))?
    };

    let locations = if request.locations.is_empty() {
        state.default_locations.clone()
    } else {
        request.locations
    };
    if locations.is_empty() {
        return Err(bad_request(
            "no locations given and no default locations configured",
        ));
    }

    let status = blocking(&state, move |s| s.controller.start(locations)).await?;
    info!("start request: {status}");
    Ok(Json(status.into()))
}

async fn handle_stop(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StopParams>,
) -> Result<Json<StopResponse>, ApiError> {
    let (status, finished): (StopStatus, Option<bool>) = if params.wait {
        blocking(&state, |s| {
            let (status, done) = s.controller.stop_and_wait(s.controller.config().stop_timeout);
            (status, Some(done))
        })
        .await?
    } else {
        (state.controller.stop(), None)
    };
    info!("stop request: {status}");
    Ok(Json(StopResponse {
        status: status.label(),
        run_no: status.run_no(),
        message: status.to_string(),
        finished,
    }))
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.controller.status(),
        run_no: state.controller.current_run(),
    })
}

async fn handle_recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentParams>,
) -> Result<Json<RecentResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT).clamp(1, MAX_RECENT);
    let samples = blocking(&state, move |s| {
        read_recent(s.controller.store().as_ref(), limit)
    })
    .await?;
    let total = samples.len();
    Ok(Json(RecentResponse { samples, total }))
}

async fn handle_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let dimension = match params.by.as_deref() {
        None => Dimension::Location,
        Some(by) => by.parse::<Dimension>().map_err(bad_request)?,
    };
    let filter = params.filter;
    let groups = {
        let filter = filter.clone();
        blocking(&state, move |s| {
            let rows = filter.apply(&load_all(s.controller.store().as_ref()));
            wifimon_core::group_by(&rows, dimension)
        })
        .await?
    };
    Ok(Json(SummaryResponse {
        dimension,
        filter,
        groups,
    }))
}

async fn handle_locations(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RowFilter>,
) -> Result<Json<LocationsResponse>, ApiError> {
    let locations = blocking(&state, move |s| {
        location_summary(&filter.apply(&load_all(s.controller.store().as_ref())))
    })
    .await?;
    Ok(Json(LocationsResponse { locations }))
}

async fn handle_series(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SeriesParams>,
) -> Result<Json<SeriesResponse>, ApiError> {
    let metric = match params.metric.as_deref() {
        None => Metric::DownloadSpeed,
        Some(m) => m.parse::<Metric>().map_err(bad_request)?,
    };
    let filter = params.filter;
    let points = blocking(&state, move |s| {
        let rows = filter.apply(&load_all(s.controller.store().as_ref()));
        series(&rows, metric)
    })
    .await?;
    Ok(Json(SeriesResponse {
        metric,
        label: metric.label(),
        points: points
            .into_iter()
            .map(|(ts, value)| SeriesPoint {
                timestamp: ts.format(wifimon_core::model::TIMESTAMP_FORMAT).to_string(),
                value,
            })
            .collect(),
    }))
}

async fn handle_filters(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FilterOptions>, ApiError> {
    let options = blocking(&state, |s| {
        FilterOptions::from_rows(&load_all(s.controller.store().as_ref()))
    })
    .await?;
    Ok(Json(options))
}

async fn handle_next_run(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let next = blocking(&state, |s| next_run_number(s.controller.store().as_ref())).await?;
    Ok(Json(match next {
        Ok(run_no) => serde_json::json!({ "run_no": run_no }),
        Err(e) => serde_json::json!({ "run_no": null, "error": e.to_string() }),
    }))
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let probes: Vec<&str> = state
        .controller
        .sensors()
        .infos()
        .iter()
        .map(|i| i.name)
        .collect();

    Json(serde_json::json!({
        "name": "wifimon",
        "version": wifimon_core::VERSION,
        "probes": probes,
        "default_locations": state.default_locations,
        "endpoints": {
            "/": "This API index",
            "/collection/start": {
                "method": "POST",
                "description": "Start a collection run",
                "body": "{\"locations\": [{\"name\": \"ECC\", \"x\": 67.12, \"y\": -43.45}]} (empty: configured defaults)",
            },
            "/collection/stop": {
                "method": "POST",
                "description": "Stop the active run",
                "params": { "wait": "Block until the worker exits (default: false)" },
            },
            "/collection/status": "Whether a run is active, and its number",
            "/samples/recent": {
                "method": "GET",
                "params": { "limit": format!("Number of samples (1-{MAX_RECENT}, default: {DEFAULT_RECENT})") },
            },
            "/samples/summary": {
                "method": "GET",
                "params": {
                    "by": "location (default), date, hour, run",
                    "location": "Only this location",
                    "date": "Only this date (YYYY-MM-DD)",
                    "hour": "Only this hour (HH:00)",
                },
            },
            "/samples/locations": "Per-location means and marker sizes (same filters as summary)",
            "/samples/series": "One metric over time (?metric=download_speed plus summary filters)",
            "/samples/filters": "Distinct locations, dates and hours",
            "/runs/next": "Run number the next start would use",
        },
    }))
}

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/collection/start", post(handle_start))
        .route("/collection/stop", post(handle_stop))
        .route("/collection/status", get(handle_status))
        .route("/samples/recent", get(handle_recent))
        .route("/samples/summary", get(handle_summary))
        .route("/samples/locations", get(handle_locations))
        .route("/samples/series", get(handle_series))
        .route("/samples/filters", get(handle_filters))
        .route("/runs/next", get(handle_next_run))
        .with_state(state)
}

/// Run the HTTP API until Ctrl+C, then stop any active run.
pub async fn run_server(state: Arc<AppState>, host: &str, port: u16) -> std::io::Result<()> {
    let app = build_router(Arc::clone(&state));
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("could not listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let timeout = state.controller.config().stop_timeout;
    let (status, finished) = tokio::task::spawn_blocking(move || {
        state.controller.stop_and_wait(timeout)
    })
    .await
    .map_err(std::io::Error::other)?;
    if let StopStatus::Stopped { run_no } = status {
        info!("run {run_no} stopped on shutdown (worker exited: {finished})");
    }
    Ok(())
}
