use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use snipsync_core::sync::{PingResponse, PullRequest, PullResponse, PushRequest, PushResponse};
use snipsync_core::SyncService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{extract_api_key, ApiKeyVerifier, AuthenticatedClient};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::metrics::{SyncMetrics, SyncMetricsSnapshot};
use crate::rate_limit::{EndpointRateLimiter, ProtectedEndpoint, RateLimitMetricsSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    sync: SyncService,
    api_keys: Arc<ApiKeyVerifier>,
    endpoint_rate_limiter: Arc<EndpointRateLimiter>,
    metrics: Arc<SyncMetrics>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, sync: SyncService) -> Result<Self, AppError> {
        Ok(Self {
            sync,
            api_keys: Arc::new(ApiKeyVerifier::new(&config.api_keys)?),
            endpoint_rate_limiter: Arc::new(EndpointRateLimiter::from_config(config.as_ref())),
            metrics: Arc::new(SyncMetrics::default()),
            config,
        })
    }
}

pub fn app_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/ping", get(ping).post(ping))
        .route("/push", post(push))
        .route("/pull", post(pull))
        .route("/full", get(full).post(full))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/sync", protected_routes)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
    sync: SyncMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().timestamp(),
        rate_limit: state.endpoint_rate_limiter.metrics_snapshot(),
        sync: state.metrics.snapshot(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = extract_api_key(request.headers())?;
    let client = state.api_keys.verify(key)?;
    request.extensions_mut().insert(client);
    Ok(next.run(request).await)
}

async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    Json(state.sync.ping())
}

async fn push(
    State(state): State<AppState>,
    Extension(client): Extension<AuthenticatedClient>,
    payload: Result<Json<PushRequest>, JsonRejection>,
) -> Result<Json<PushResponse>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Push, client.key_fingerprint)
        .await?;

    let Json(request) = payload.inspect_err(|_| state.metrics.record_rejected_push())?;
    let items = request.item_count();
    let outcome = state.sync.push(request).await.inspect_err(|error| {
        state.metrics.record_rejected_push();
        tracing::warn!(
            endpoint = "push",
            client = client.key_fingerprint,
            items,
            "Push rejected: {error}"
        );
    })?;

    state.metrics.record_push(&outcome.report);
    tracing::info!(
        endpoint = "push",
        client = client.key_fingerprint,
        items,
        new_records = outcome.response.id_mappings.len(),
        "Push accepted"
    );
    Ok(Json(outcome.response))
}

async fn pull(
    State(state): State<AppState>,
    Extension(client): Extension<AuthenticatedClient>,
    payload: Result<Json<PullRequest>, JsonRejection>,
) -> Result<Json<PullResponse>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Pull, client.key_fingerprint)
        .await?;

    let Json(request) = payload?;
    let response = state.sync.pull(request).await?;
    state.metrics.record_pull();
    Ok(Json(response))
}

async fn full(
    State(state): State<AppState>,
    Extension(client): Extension<AuthenticatedClient>,
) -> Result<Json<PullResponse>, AppError> {
    state
        .endpoint_rate_limiter
        .check(ProtectedEndpoint::Pull, client.key_fingerprint)
        .await?;

    let response = state.sync.full().await?;
    state.metrics.record_full_sync();
    tracing::info!(
        endpoint = "full",
        client = client.key_fingerprint,
        records = response.changes.len(),
        "Full sync served"
    );
    Ok(Json(response))
}
