//! HTTP request handlers for the sweep service.
//!
//! Implements the sweep trigger, health check and liveness endpoints using axum.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router as AxumRouter,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use sweepline_domain::TreeStore;
use sweepline_janitor::{JanitorError, JanitorMetrics, SweepOutcome, Sweeper};

/// Alternative header carrying the shared secret
pub const SWEEP_TOKEN_HEADER: &str = "x-sweep-token";

/// Shared application state
pub struct AppState<S> {
    /// Sweeper over every configured store
    pub sweeper: Arc<Sweeper<S>>,
    /// Route the trigger is served on
    pub trigger_path: Arc<str>,
    /// Shared secret required on trigger requests
    pub auth_token: Option<Arc<str>>,
    /// Bound on a triggered sweep
    pub sweep_timeout: Option<Duration>,
}

// Manual impl: the store itself does not need to be Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            sweeper: self.sweeper.clone(),
            trigger_path: self.trigger_path.clone(),
            auth_token: self.auth_token.clone(),
            sweep_timeout: self.sweep_timeout,
        }
    }
}

impl<S> AppState<S> {
    /// State serving the trigger on `trigger_path`, without auth or timeout
    pub fn new(sweeper: Arc<Sweeper<S>>, trigger_path: impl Into<String>) -> Self {
        Self {
            sweeper,
            trigger_path: Arc::from(trigger_path.into()),
            auth_token: None,
            sweep_timeout: None,
        }
    }

    /// Require a shared secret on trigger requests
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.map(Arc::from);
        self
    }

    /// Bound triggered sweeps
    pub fn with_sweep_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.sweep_timeout = timeout;
        self
    }
}

/// Successful trigger response
#[derive(Debug, Serialize)]
pub struct SweepResponse {
    /// Always true
    pub ok: bool,
    /// HTTP method that triggered the sweep
    pub via: String,
    /// Trigger route
    pub path: String,
    /// Per-root reports and totals
    #[serde(flatten)]
    pub outcome: SweepOutcome,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    /// Every store is reachable
    pub ok: bool,
    /// Readiness per store instance
    pub stores: BTreeMap<String, bool>,
    /// Cumulative sweep metrics
    pub stats: JanitorMetrics,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always false
    pub ok: bool,
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Missing or wrong shared secret
    Unauthorized,
    /// Another sweep is running
    AlreadyRunning,
    /// Sweep did not finish in time
    Timeout(Duration),
    /// Sweep failed
    Sweep(JanitorError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            AppError::AlreadyRunning => (StatusCode::CONFLICT, JanitorError::AlreadyRunning.to_string()),
            AppError::Timeout(limit) => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("sweep did not finish within {}s", limit.as_secs()),
            ),
            AppError::Sweep(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = Json(ErrorResponse { ok: false, error: message });
        (status, body).into_response()
    }
}

impl From<JanitorError> for AppError {
    fn from(e: JanitorError) -> Self {
        match e {
            JanitorError::AlreadyRunning => AppError::AlreadyRunning,
            other => AppError::Sweep(other),
        }
    }
}

/// Check the shared secret, if one is configured
///
/// Accepts `Authorization: Bearer <token>` or `x-sweep-token: <token>`.
fn authorize<S>(state: &AppState<S>, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.auth_token.as_deref() else {
        return Ok(());
    };

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| headers.get(SWEEP_TOKEN_HEADER).and_then(|v| v.to_str().ok()));

    match provided {
        Some(token) if bool::from(token.trim().as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => {
            tracing::warn!("Rejected sweep trigger with missing or invalid token");
            Err(AppError::Unauthorized)
        }
    }
}

/// GET|POST {trigger_path} - Run one sweep over every store
async fn trigger_sweep<S: TreeStore + 'static>(
    State(state): State<AppState<S>>,
    method: Method,
    headers: HeaderMap,
) -> Result<Json<SweepResponse>, AppError> {
    authorize(&state, &headers)?;

    let outcome = match state.sweep_timeout {
        Some(limit) => match tokio::time::timeout(limit, state.sweeper.trigger()).await {
            Ok(result) => result?,
            Err(_) => {
                state.sweeper.record_failure();
                tracing::error!("Sweep abandoned after {:?}", limit);
                return Err(AppError::Timeout(limit));
            }
        },
        None => state.sweeper.trigger().await?,
    };

    Ok(Json(SweepResponse {
        ok: true,
        via: method.to_string(),
        path: state.trigger_path.to_string(),
        outcome,
    }))
}

/// GET /healthz - Store readiness and sweep metrics
async fn health_check<S: TreeStore + 'static>(State(state): State<AppState<S>>) -> (StatusCode, Json<HealthCheckResponse>) {
    let stores: BTreeMap<String, bool> = state.sweeper.readiness().await.into_iter().collect();
    let ok = stores.values().all(|ready| *ready);

    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthCheckResponse {
            ok,
            stores,
            stats: state.sweeper.metrics(),
        }),
    )
}

/// GET / - Liveness
async fn index() -> &'static str {
    "Service is up"
}

/// Create the axum router with all routes
pub fn create_router<S: TreeStore + 'static>(state: AppState<S>) -> AxumRouter {
    let trigger_path = state.trigger_path.to_string();

    AxumRouter::new()
        .route("/", get(index))
        .route("/healthz", get(health_check::<S>))
        .route(&trigger_path, get(trigger_sweep::<S>).post(trigger_sweep::<S>))
        .with_state(state)
}
