//! HTTP surface: the two workflow webhooks and the portal's JSON endpoints.

mod appointments;
mod error;
mod portal;
mod reservations;

pub use error::ApiError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRequestParts, MatchedPath, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderName, Method, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use ulid::Ulid;

use crate::accounts::Account;
use crate::auth::{self, CredentialSource};
use crate::engine::Engine;
use crate::limits::MAX_REQUEST_BODY_BYTES;
use crate::observability;
use crate::schedule::SchedulePolicy;
use crate::tenant::TenantManager;

#[derive(Clone)]
pub struct AppState {
    pub tenants: Arc<TenantManager>,
    pub credentials: Arc<dyn CredentialSource>,
    pub policy: SchedulePolicy,
    pub webhook_secret: Option<Arc<str>>,
    /// Bounds concurrently served requests.
    pub limiter: Arc<Semaphore>,
}

impl AppState {
    pub fn engine_for(&self, account: &Account) -> Result<Arc<Engine>, ApiError> {
        self.tenants.get_or_create(&account.id).map_err(|e| {
            error!(account = %account.id, "cannot load account engine: {e}");
            ApiError::Internal(format!("cannot load account: {e}"))
        })
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-n8n-signature"),
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/webhooks/reservations", post(reservations::webhook))
        .route("/webhooks/appointments", post(appointments::webhook))
        .route("/reservations", get(reservations::list))
        .route("/reservations/{id}", patch(reservations::update))
        .route("/availability", get(reservations::availability))
        .route("/staff", get(portal::list_staff).post(portal::add_staff))
        .route("/staff/{id}", patch(portal::update_staff))
        .route("/products", get(portal::list_products).post(portal::add_product))
        .route(
            "/contacts",
            get(portal::list_contacts).delete(portal::clear_contacts),
        )
        .route("/contacts/import", post(portal::import_contacts))
        .route("/revenue", get(portal::revenue))
        .route("/notifications", get(portal::notifications))
        .route("/events", get(portal::events))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_request))
        .route("/health", get(portal::health))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then finish in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Concurrency limit plus RED metrics, per matched route.
async fn track_request(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let Ok(permit) = state.limiter.clone().try_acquire_owned() else {
        warn!(route = %route, "request limit reached, rejecting");
        metrics::counter!(observability::REQUESTS_REJECTED_TOTAL).increment(1);
        return ApiError::Unavailable.into_response();
    };
    req.extensions_mut().insert(RequestPermit {
        _held: Arc::new(permit),
    });

    metrics::gauge!(observability::REQUESTS_IN_FLIGHT).increment(1.0);
    let start = Instant::now();
    let response = next.run(req).await;
    metrics::gauge!(observability::REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16().to_string();
    metrics::counter!(observability::REQUESTS_TOTAL, "route" => route.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "route" => route)
        .record(start.elapsed().as_secs_f64());
    response
}

/// The request's slot in the limiter. Streaming handlers keep a clone
/// alive for as long as their stream runs.
#[derive(Clone)]
pub struct RequestPermit {
    _held: Arc<OwnedSemaphorePermit>,
}

/// The caller's account, authenticated by `x-api-key`, and its engine.
pub struct Tenant {
    pub account: Account,
    pub engine: Arc<Engine>,
}

impl FromRequestParts<AppState> for Tenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok());
        let account = auth::authenticate(state.credentials.as_ref(), api_key).await?;
        let engine = state.engine_for(&account)?;
        Ok(Tenant { account, engine })
    }
}

/// Decode a JSON body, reporting failures as validation errors.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Validation(format!("Invalid JSON body: {e}")))
}

pub(crate) fn parse_id(raw: &str) -> Result<Ulid, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid id: {raw}")))
}

/// Tells an absent field (`None`) from an explicit `null` (`Some(None)`).
/// Use with `#[serde(default)]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Accepts a number or a numeric string, as workflow tools send either.
pub(crate) fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(u32),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not a number: {s}"))),
    }
}
