//! REST API for the layout service.
//!
//! Provides HTTP endpoints for the 3D scene and chart panels.
//! Uses Axum as the web framework and supports CORS.

use std::convert::Infallible;
use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};

use crate::charts::{ChartKind, ChartOptions, ChartSeries, ChartSlice, LabelMode, build_series};
use crate::color::ColorSource;
use crate::config::ApiConfig;
use crate::height::{DateRuler, RulerTick, TimeAxis};
use crate::layout::{self, LaneSummary, LayoutConfig, LayoutResult, SkippedArea};
use crate::model::{BlockRecord, BlockTag, Ingested, Placement, RejectedRecord, ingest};
use crate::session::{ChartSnapshot, SessionError, SessionHandle};
use crate::types::{Footprint, GroundPoint, Vec3};
use crate::workarea::WorkAreaRegistry;

/// Shared state of all handlers.
#[derive(Clone)]
pub struct ApiState {
    pub layout: LayoutConfig,
    pub chart_options: ChartOptions,
    pub registry: Arc<WorkAreaRegistry>,
    pub colors: Arc<dyn ColorSource>,
    pub session: SessionHandle,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>blockviz layout API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Geometry of one work area as drawn by the scene.
#[derive(Serialize, ToSchema)]
pub struct WorkAreaView {
    pub id: i32,
    pub title: String,
    pub center: GroundPoint,
    pub size: Footprint,
    pub frame: Vec<Vec3>,
    pub label_anchor: Vec3,
}

#[derive(Serialize, ToSchema)]
pub struct WorkAreasResponse {
    pub areas: Vec<WorkAreaView>,
    #[schema(nullable = true)]
    pub site_center: Option<GroundPoint>,
}

#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "blocks": [
            {
                "name": "P1 (hull)",
                "start": "2025-01-01T00:00:00",
                "end": "2025-01-10T00:00:00",
                "work_area": 1,
                "length": 10.0,
                "breadth": 2.0,
                "height": 3.0
            }
        ],
        "at": "2025-01-05T00:00:00"
    })
)]
pub struct SnapshotRequest {
    pub blocks: Vec<BlockRecord>,
    pub at: NaiveDateTime,
}

#[derive(Deserialize, ToSchema)]
pub struct ScheduleRequest {
    pub blocks: Vec<BlockRecord>,
    pub now: NaiveDateTime,
}

#[derive(Deserialize, ToSchema)]
pub struct ChartsRequest {
    pub blocks: Vec<BlockRecord>,
    pub now: NaiveDateTime,
    #[serde(default)]
    #[schema(nullable = true)]
    pub options: Option<ChartOptions>,
}

#[derive(Deserialize, ToSchema)]
pub struct SessionBlocksRequest {
    pub blocks: Vec<BlockRecord>,
}

#[derive(Deserialize, ToSchema)]
pub struct SessionTimeRequest {
    pub now: NaiveDateTime,
}

/// Layout of one pass. Placement tags are indices into the request's `blocks`.
#[derive(Serialize, ToSchema)]
pub struct LayoutResponse {
    pub layout: LayoutResult,
    pub rejected: Vec<RejectedRecord>,
}

#[derive(Serialize, ToSchema)]
pub struct ChartsResponse {
    pub series: Vec<ChartSeries>,
    pub rejected: Vec<RejectedRecord>,
}

/// Acknowledges a session update; charts follow after the debounce window.
#[derive(Serialize, ToSchema)]
pub struct SessionAck {
    pub accepted: usize,
    pub rejected: Vec<RejectedRecord>,
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn chart_options_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid chart options",
        details,
    )
}

fn session_error(err: SessionError) -> Response {
    match err {
        SessionError::InvalidOptions(err) => chart_options_error(err.to_string()),
        SessionError::Closed => {
            error!("chart session is not running");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Chart session unavailable",
                err.to_string(),
            )
        }
    }
}

fn parse_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    payload.map(|Json(value)| value).map_err(json_deserialize_error)
}

/// Points placement tags back at the records they came from.
fn retag(mut layout: LayoutResult, ingested: &Ingested) -> LayoutResult {
    for placement in &mut layout.placements {
        if let Some(index) = ingested.source_index(placement.tag) {
            placement.tag = BlockTag(index);
        }
    }
    layout
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_work_areas,
        handle_snapshot,
        handle_schedule,
        handle_charts,
        handle_session_blocks,
        handle_session_options,
        handle_session_time,
        handle_session_charts,
        handle_session_stream
    ),
    components(
        schemas(
            WorkAreaView,
            WorkAreasResponse,
            SnapshotRequest,
            ScheduleRequest,
            ChartsRequest,
            SessionBlocksRequest,
            SessionTimeRequest,
            LayoutResponse,
            ChartsResponse,
            SessionAck,
            ErrorResponse,
            BlockRecord,
            RejectedRecord,
            LayoutResult,
            Placement,
            LaneSummary,
            SkippedArea,
            TimeAxis,
            DateRuler,
            RulerTick,
            ChartOptions,
            LabelMode,
            ChartKind,
            ChartSeries,
            ChartSlice,
            ChartSnapshot
        )
    ),
    tags(
        (name = "layout", description = "Block placement for the 3D views"),
        (name = "charts", description = "Work distribution per work area"),
        (name = "session", description = "Debounced live chart session")
    )
)]
struct ApiDoc;

/// Assembles all routes with CORS and request tracing.
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/work-areas", get(handle_work_areas))
        .route("/layout/snapshot", post(handle_snapshot))
        .route("/layout/schedule", post(handle_schedule))
        .route("/charts", post(handle_charts))
        .route("/session/blocks", put(handle_session_blocks))
        .route("/session/options", put(handle_session_options))
        .route("/session/time", put(handle_session_time))
        .route("/session/charts", get(handle_session_charts))
        .route("/session/stream", get(handle_session_stream))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Binds the configured address and serves until the server stops.
pub async fn start_api_server(config: ApiConfig, state: ApiState) -> std::io::Result<()> {
    let app = build_router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        info!("Local access: http://localhost:{}", config.port());
    }
    info!("Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for GET /work-areas.
#[utoipa::path(
    get,
    path = "/work-areas",
    responses(
        (status = 200, description = "Registered work areas with outline geometry", body = WorkAreasResponse)
    ),
    tag = "layout"
)]
async fn handle_work_areas(State(state): State<ApiState>) -> Json<WorkAreasResponse> {
    let areas = state
        .registry
        .iter()
        .map(|area| WorkAreaView {
            id: area.id,
            title: area.title(),
            center: area.center,
            size: area.size,
            frame: area.frame_corners().to_vec(),
            label_anchor: area.label_anchor(),
        })
        .collect();

    Json(WorkAreasResponse {
        areas,
        site_center: state.registry.site_center(),
    })
}

/// Handler for POST /layout/snapshot.
///
/// Places the blocks live at `at` on fixed lanes. Invalid records are
/// dropped and listed in `rejected`.
#[utoipa::path(
    post,
    path = "/layout/snapshot",
    request_body = SnapshotRequest,
    responses(
        (status = 200, description = "Placements of the live blocks", body = LayoutResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Malformed request", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_snapshot(
    State(state): State<ApiState>,
    payload: Result<Json<SnapshotRequest>, JsonRejection>,
) -> Response {
    let request = match parse_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let ingested = ingest(request.blocks);
    info!(
        blocks = ingested.blocks.len(),
        rejected = ingested.rejected.len(),
        at = %request.at,
        "snapshot layout request"
    );
    let layout = layout::snapshot(
        &ingested.blocks,
        request.at,
        &state.registry,
        &state.layout,
        state.colors.as_ref(),
    );

    Json(LayoutResponse {
        layout: retag(layout, &ingested),
        rejected: ingested.rejected,
    })
    .into_response()
}

/// Handler for POST /layout/schedule.
///
/// Places every block on the shared time axis as seen at `now`.
#[utoipa::path(
    post,
    path = "/layout/schedule",
    request_body = ScheduleRequest,
    responses(
        (status = 200, description = "Placements, time axis and date rulers", body = LayoutResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Malformed request", body = ErrorResponse)
    ),
    tag = "layout"
)]
async fn handle_schedule(
    State(state): State<ApiState>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Response {
    let request = match parse_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let ingested = ingest(request.blocks);
    info!(
        blocks = ingested.blocks.len(),
        rejected = ingested.rejected.len(),
        now = %request.now,
        "schedule layout request"
    );
    let layout = layout::schedule(
        &ingested.blocks,
        request.now,
        &state.registry,
        &state.layout,
        state.colors.as_ref(),
    );

    Json(LayoutResponse {
        layout: retag(layout, &ingested),
        rejected: ingested.rejected,
    })
    .into_response()
}

/// Handler for POST /charts.
///
/// One-shot chart computation. Missing options fall back to the service defaults.
#[utoipa::path(
    post,
    path = "/charts",
    request_body = ChartsRequest,
    responses(
        (status = 200, description = "One series per registered work area", body = ChartsResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Malformed request or invalid options", body = ErrorResponse)
    ),
    tag = "charts"
)]
async fn handle_charts(
    State(state): State<ApiState>,
    payload: Result<Json<ChartsRequest>, JsonRejection>,
) -> Response {
    let request = match parse_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let options = request.options.unwrap_or(state.chart_options);
    if let Err(err) = options.validate() {
        warn!("rejecting chart options: {err}");
        return chart_options_error(err.to_string());
    }

    let ingested = ingest(request.blocks);
    let series = build_series(
        &ingested.blocks,
        &state.registry,
        request.now,
        &options,
        state.colors.as_ref(),
    );

    Json(ChartsResponse {
        series,
        rejected: ingested.rejected,
    })
    .into_response()
}

/// Handler for PUT /session/blocks.
#[utoipa::path(
    put,
    path = "/session/blocks",
    request_body = SessionBlocksRequest,
    responses(
        (status = 200, description = "Block set replaced", body = SessionAck),
        (status = UNPROCESSABLE_ENTITY, description = "Malformed request", body = ErrorResponse),
        (status = SERVICE_UNAVAILABLE, description = "Session stopped", body = ErrorResponse)
    ),
    tag = "session"
)]
async fn handle_session_blocks(
    State(state): State<ApiState>,
    payload: Result<Json<SessionBlocksRequest>, JsonRejection>,
) -> Response {
    let request = match parse_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let ingested = ingest(request.blocks);
    let accepted = ingested.blocks.len();
    if let Err(err) = state.session.set_blocks(ingested.blocks).await {
        return session_error(err);
    }

    Json(SessionAck {
        accepted,
        rejected: ingested.rejected,
    })
    .into_response()
}

/// Handler for PUT /session/options.
#[utoipa::path(
    put,
    path = "/session/options",
    request_body = ChartOptions,
    responses(
        (status = 200, description = "Options replaced", body = SessionAck),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid options", body = ErrorResponse),
        (status = SERVICE_UNAVAILABLE, description = "Session stopped", body = ErrorResponse)
    ),
    tag = "session"
)]
async fn handle_session_options(
    State(state): State<ApiState>,
    payload: Result<Json<ChartOptions>, JsonRejection>,
) -> Response {
    let options = match parse_payload(payload) {
        Ok(options) => options,
        Err(response) => return response,
    };

    match state.session.set_options(options).await {
        Ok(()) => Json(SessionAck {
            accepted: 1,
            rejected: Vec::new(),
        })
        .into_response(),
        Err(err) => session_error(err),
    }
}

/// Handler for PUT /session/time.
#[utoipa::path(
    put,
    path = "/session/time",
    request_body = SessionTimeRequest,
    responses(
        (status = 200, description = "Simulated time moved", body = SessionAck),
        (status = UNPROCESSABLE_ENTITY, description = "Malformed request", body = ErrorResponse),
        (status = SERVICE_UNAVAILABLE, description = "Session stopped", body = ErrorResponse)
    ),
    tag = "session"
)]
async fn handle_session_time(
    State(state): State<ApiState>,
    payload: Result<Json<SessionTimeRequest>, JsonRejection>,
) -> Response {
    let request = match parse_payload(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.session.set_time(request.now).await {
        Ok(()) => Json(SessionAck {
            accepted: 1,
            rejected: Vec::new(),
        })
        .into_response(),
        Err(err) => session_error(err),
    }
}

/// Handler for GET /session/charts.
///
/// Forces a recompute so the answer reflects every change made so far.
#[utoipa::path(
    get,
    path = "/session/charts",
    responses(
        (status = 200, description = "Current chart snapshot", body = ChartSnapshot),
        (status = SERVICE_UNAVAILABLE, description = "Session stopped", body = ErrorResponse)
    ),
    tag = "session"
)]
async fn handle_session_charts(State(state): State<ApiState>) -> Response {
    match state.session.refresh().await {
        Ok(snapshot) => Json(snapshot.as_ref()).into_response(),
        Err(err) => session_error(err),
    }
}

/// Handler for GET /session/stream (SSE).
///
/// Sends the current snapshot, then every newly published one.
#[utoipa::path(
    get,
    path = "/session/stream",
    responses(
        (
            status = 200,
            description = "Streams chart snapshots as they are published",
            content_type = "text/event-stream",
            body = String
        )
    ),
    tag = "session"
)]
async fn handle_session_stream(State(state): State<ApiState>) -> Response {
    let stream = WatchStream::new(state.session.subscribe()).filter_map(|snapshot| {
        match serde_json::to_string(snapshot.as_ref()) {
            Ok(json) => Some(Ok::<_, Infallible>(
                Event::default().event("charts").data(json),
            )),
            Err(err) => {
                warn!(revision = snapshot.revision, "could not encode snapshot: {err}");
                None
            }
        }
    });

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::NamePalette;
    use crate::config::SessionConfig;
    use crate::session::spawn_session;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn test_state() -> ApiState {
        let registry = Arc::new(WorkAreaRegistry::reference().clone());
        let colors: Arc<dyn ColorSource> = Arc::new(NamePalette::default());
        let (session, _task) = spawn_session(
            registry.clone(),
            colors.clone(),
            ChartOptions::default(),
            day(1),
            SessionConfig::with_debounce(Duration::from_millis(100)),
        );
        ApiState {
            layout: LayoutConfig::default(),
            chart_options: ChartOptions::default(),
            registry,
            colors,
            session,
        }
    }

    async fn send(method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = build_router(test_state())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in [
            "/work-areas",
            "/layout/snapshot",
            "/layout/schedule",
            "/charts",
            "/session/blocks",
            "/session/options",
            "/session/time",
            "/session/charts",
            "/session/stream",
        ] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {} path",
                path
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        for name in ["SnapshotRequest", "LayoutResponse", "ChartSeries", "ErrorResponse"] {
            assert!(
                components.schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[tokio::test]
    async fn work_areas_lists_reference_registry() {
        let (status, body) = send("GET", "/work-areas", None).await;
        assert_eq!(status, StatusCode::OK);
        let areas = body["areas"].as_array().unwrap();
        assert_eq!(areas.len(), 6);
        assert_eq!(areas[0]["title"], "Work area 1");
        assert_eq!(areas[0]["frame"].as_array().unwrap().len(), 4);
        assert!(body["site_center"].is_object());
    }

    #[tokio::test]
    async fn snapshot_reports_rejected_records_in_band() {
        let (status, body) = send(
            "POST",
            "/layout/snapshot",
            Some(json!({
                "blocks": [
                    {"name": "bad", "start": "2025-01-05T00:00:00", "end": "2025-01-01T00:00:00",
                     "work_area": 1, "length": 10.0, "breadth": 2.0, "height": 3.0},
                    {"name": "P1", "start": "2025-01-01T00:00:00", "end": "2025-01-10T00:00:00",
                     "work_area": 1, "length": 10.0, "breadth": 2.0, "height": 3.0}
                ],
                "at": "2025-01-05T00:00:00"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let placements = body["layout"]["placements"].as_array().unwrap();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0]["tag"], 1);
        assert_eq!(placements[0]["color"], "#FF0000");
        assert_eq!(body["rejected"][0]["index"], 0);
        assert_eq!(body["rejected"][0]["reason_code"], "invalid_interval");
    }

    #[tokio::test]
    async fn schedule_returns_rulers() {
        let (status, body) = send(
            "POST",
            "/layout/schedule",
            Some(json!({
                "blocks": [
                    {"name": "P1", "start": "2025-01-01T00:00:00", "end": "2025-01-21T00:00:00",
                     "work_area": 2, "length": 10.0, "breadth": 2.0, "height": 3.0}
                ],
                "now": "2025-01-11T00:00:00"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["layout"]["rulers"].as_array().unwrap().len(), 2);
        assert_eq!(body["layout"]["time_axis"]["start"], "2025-01-01T00:00:00");
        assert_eq!(body["layout"]["placements"][0]["vertical_baseline"], 0.0);
    }

    #[tokio::test]
    async fn charts_reject_invalid_options() {
        let (status, body) = send(
            "POST",
            "/charts",
            Some(json!({
                "blocks": [],
                "now": "2025-01-11T00:00:00",
                "options": {"small_slice_threshold": 1.5}
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Invalid chart options");
    }

    #[tokio::test]
    async fn charts_return_one_series_per_area() {
        let (status, body) = send(
            "POST",
            "/charts",
            Some(json!({
                "blocks": [
                    {"name": "P1", "start": "2025-01-01T00:00:00", "end": "2025-01-03T00:00:00",
                     "work_area": 3, "length": 1.0, "breadth": 1.0, "height": 1.0}
                ],
                "now": "2025-01-11T00:00:00",
                "options": {"use_bar_chart": true}
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let series = body["series"].as_array().unwrap();
        assert_eq!(series.len(), 6);
        assert_eq!(series[2]["kind"], "bar");
        assert_eq!(series[2]["total"], 48.0);
        assert_eq!(series[2]["slices"][0]["label"], "P1");
    }

    #[tokio::test]
    async fn malformed_json_is_unprocessable() {
        let (status, body) = send("POST", "/layout/snapshot", Some(json!({"blocks": 3}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Invalid JSON data");
    }

    #[tokio::test]
    async fn session_read_after_write_is_current() {
        let state = test_state();
        let app = build_router(state);

        let put = Request::builder()
            .method("PUT")
            .uri("/session/blocks")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "blocks": [
                        {"name": "P1", "start": "2025-01-01T00:00:00", "end": "2025-01-02T00:00:00",
                         "work_area": 1, "length": 1.0, "breadth": 1.0, "height": 1.0}
                    ]
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let get = Request::builder()
            .uri("/session/charts")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(get).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["block_count"], 1);
        assert!(body["revision"].as_u64().unwrap() >= 1);
    }
}
