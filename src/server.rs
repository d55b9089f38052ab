use crate::app::ports::UpstreamPort;
use crate::config::Config;
use crate::constants::STREAM_BUFFER;
use crate::domain::{FeedPayload, LocationQuery};
use crate::error::{FeedError, Result};
use crate::metrics::FeedMetrics;
use crate::pipeline::{AcquisitionPipeline, NormalizationEngine};
use crate::stream::StreamDeliveryLoop;
use axum::{
    body::StreamBody,
    extract::Query,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use futures::StreamExt;
use hyper::Server;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared by every request: configuration and one upstream client.
/// Pipelines are never shared; each request or stream builds its own.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: Arc<dyn UpstreamPort>,
}

impl AppState {
    pub fn new(config: Config, upstream: Arc<dyn UpstreamPort>) -> Self {
        Self {
            config: Arc::new(config),
            upstream,
        }
    }

    pub fn pipeline_for(&self, params: &LocationParams) -> Result<AcquisitionPipeline> {
        let query = match params.query() {
            Some(query) => query?,
            None => self.config.default_query()?,
        };
        let engine = NormalizationEngine::new(self.config.smoothing_factor)?;
        Ok(AcquisitionPipeline::with_engine(self.upstream.clone(), query, engine))
    }
}

/// Optional location override from the query string.
///
/// Kept as raw strings so that blank and malformed values are handled here
/// rather than rejected by the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl LocationParams {
    /// `None` unless one form is complete; partial or blank input falls back to the default location.
    pub fn query(&self) -> Option<Result<LocationQuery>> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let (Some(lat), Some(lon)) = (present(&self.lat), present(&self.lon)) {
            let query = parse_coordinate("lat", &lat).and_then(|latitude| {
                let longitude = parse_coordinate("lon", &lon)?;
                LocationQuery::from_parts(None, None, Some(latitude), Some(longitude))
            });
            return Some(query);
        }
        if let (Some(city), Some(country)) = (present(&self.city), present(&self.country)) {
            return Some(LocationQuery::from_parts(Some(&city), Some(&country), None, None));
        }
        None
    }
}

fn parse_coordinate(name: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| FeedError::InvalidQuery(format!("{} is not a number: '{}'", name, value)))
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let status = match &self {
            FeedError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            FeedError::LocationNotFound | FeedError::NoDataAvailable { .. } => StatusCode::NOT_FOUND,
            FeedError::UpstreamFailure { .. } | FeedError::Http(_) | FeedError::Json(_) => {
                StatusCode::BAD_GATEWAY
            }
            FeedError::InvalidConfig(_) | FeedError::Toml(_) | FeedError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "aq_feed",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// One-shot snapshot with sensor positions
async fn airquality(
    Extension(state): Extension<AppState>,
    Query(params): Query<LocationParams>,
) -> std::result::Result<Json<FeedPayload>, FeedError> {
    let mut pipeline = state.pipeline_for(&params)?;
    match pipeline.fetch_snapshot_with_sensors().await {
        Ok(payload) => Ok(Json(payload)),
        Err(e) => {
            warn!(error = %e, kind = e.kind(), "Snapshot request failed");
            FeedMetrics::record_fetch_error(e.kind());
            Err(e)
        }
    }
}

/// Server-sent event stream; one pipeline and one delivery loop per connection
async fn airquality_stream(
    Extension(state): Extension<AppState>,
    Query(params): Query<LocationParams>,
) -> std::result::Result<Response, FeedError> {
    let pipeline = state.pipeline_for(&params)?;
    let delivery = StreamDeliveryLoop::new(pipeline, state.config.poll_interval())?;
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);

    // The tasks exit on their own once the client disconnects and `rx` is dropped.
    let _handle = delivery.spawn(tx);

    let frames = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(event.to_sse_frame()));
    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        StreamBody::new(frames),
    )
        .into_response())
}

async fn metrics_handler() -> Response {
    match crate::metrics::render() {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/airquality", get(airquality))
        .route("/api/airquality/stream", get(airquality_stream))
        .route("/metrics", get(metrics_handler))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}

/// Start the HTTP server on the specified port; returns on Ctrl-C.
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{}", port);
    info!("Snapshot: http://localhost:{}/api/airquality", port);
    info!("Stream:   http://localhost:{}/api/airquality/stream", port);

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
