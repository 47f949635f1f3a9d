// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, FromRequest, Query, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::sse::{Event, Sse};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::Stream;
use loop_kernel::event::format_timestamp;
use loop_kernel::types::{HandshakeAck, Match, Material, NodeDescriptor, Offer, Transfer};
use loop_kernel::RelayEnvelope;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::api::*;
use crate::config::{AuthConfig, NodeConfig};
use crate::errors::LoopError;
use crate::events::LedgerWriter;
use crate::federation::{ForwardQueue, FederationRelay, NodeRegistry};
use crate::rate_limit::{rate_limit, RateLimiter};
use crate::store::LoopStore;
use crate::stream::DistributionHub;

const X_API_KEY: &str = "x-api-key";
const X_REQUEST_ID: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub ledger: LedgerWriter,
    pub relay: FederationRelay,
    pub hub: Arc<DistributionHub>,
    pub auth: Arc<AuthConfig>,
    pub started: Instant,
}

impl AppState {
    /// Wire hub, ledger and registry from configuration.
    pub fn new(cfg: &NodeConfig, store: LoopStore, forward: Option<ForwardQueue>) -> Self {
        let hub = DistributionHub::new(cfg.hub.clone());
        let mut ledger = LedgerWriter::new(store, Arc::clone(&hub));
        if let Some(queue) = forward {
            ledger = ledger.with_forwarding(queue);
        }
        let registry = Arc::new(NodeRegistry::new(cfg.node.clone()));

        Self {
            relay: FederationRelay::new(ledger.clone(), registry),
            ledger,
            hub,
            auth: Arc::new(cfg.auth.clone()),
            started: Instant::now(),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        self.relay.registry()
    }
}

/// JSON body extractor whose rejections use the node's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(LoopError))]
pub struct LoopJson<T>(pub T);

pub fn build_router(state: AppState, cfg: &NodeConfig) -> Router {
    let read_limiter = RateLimiter::new(cfg.rate_limit.read_max, cfg.rate_limit.window);
    let write_limiter = RateLimiter::new(cfg.rate_limit.write_max, cfg.rate_limit.window);

    let writes = Router::new()
        .route("/api/loop/materials", post(create_material))
        .route("/api/loop/offers", post(create_offer))
        .route("/api/loop/matches", post(create_match))
        .route("/api/loop/transfers", post(create_transfer))
        .route("/api/loop/relay", post(relay_event))
        .route("/api/federation/handshake", post(handshake))
        .route_layer(from_fn_with_state(state.clone(), auth_guard))
        .route_layer(from_fn_with_state(write_limiter, rate_limit));

    let reads = Router::new()
        .route("/api/loop/events", get(list_events))
        .route("/api/loop/stream", get(stream_events))
        .route("/api/federation/nodes", get(list_nodes))
        .route_layer(from_fn_with_state(read_limiter, rate_limit));

    if state.auth.enabled {
        if state.auth.api_key.is_some() {
            tracing::info!("Auth Enabled: API key required on write endpoints");
        } else {
            tracing::error!("Auth Enabled but no API key configured: write endpoints will answer 503");
        }
    } else {
        tracing::warn!("Auth Disabled: write endpoints are open");
    }

    Router::new()
        .merge(writes)
        .merge(reads)
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(cfg.body_limit))
        .layer(cors_layer(&cfg.allowed_origins))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, HeaderName::from_static(X_API_KEY)])
        .allow_credentials(true)
        .expose_headers([HeaderName::from_static(X_REQUEST_ID)])
}

async fn auth_guard(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, LoopError> {
    if !state.auth.enabled {
        return Ok(next.run(req).await);
    }

    let expected = state.auth.api_key.as_deref().ok_or(LoopError::NotConfigured)?;
    let authorized = matches!(
        provided_api_key(req.headers()),
        Some(provided) if keys_match(provided.as_bytes(), expected.as_bytes())
    );
    if !authorized {
        tracing::warn!(path = %req.uri().path(), "Rejected write without a valid API key");
        return Err(LoopError::Unauthorized);
    }
    Ok(next.run(req).await)
}

/// `x-api-key` wins; otherwise a case-insensitive `Bearer` token.
fn provided_api_key(headers: &HeaderMap) -> Option<&str> {
    let direct = headers
        .get(X_API_KEY)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if direct.is_some() {
        return direct;
    }

    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = auth.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Constant-time over equal-length inputs.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

async fn create_material(
    State(state): State<AppState>,
    LoopJson(payload): LoopJson<Material>,
) -> Result<(StatusCode, Json<CreatedResponse>), LoopError> {
    let created = state.ledger.record_material(payload).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn create_offer(
    State(state): State<AppState>,
    LoopJson(payload): LoopJson<Offer>,
) -> Result<(StatusCode, Json<CreatedResponse>), LoopError> {
    let created = state.ledger.record_offer(payload).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn create_match(
    State(state): State<AppState>,
    LoopJson(payload): LoopJson<Match>,
) -> Result<(StatusCode, Json<CreatedResponse>), LoopError> {
    let created = state.ledger.record_match(payload).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn create_transfer(
    State(state): State<AppState>,
    LoopJson(payload): LoopJson<Transfer>,
) -> Result<(StatusCode, Json<CreatedResponse>), LoopError> {
    let created = state.ledger.record_transfer(payload).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn relay_event(
    State(state): State<AppState>,
    LoopJson(envelope): LoopJson<RelayEnvelope>,
) -> Result<(StatusCode, Json<RelayAccepted>), LoopError> {
    let event = state.relay.relay(envelope).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RelayAccepted {
            status: "accepted",
            id: event.id,
        }),
    ))
}

async fn handshake(
    State(state): State<AppState>,
    LoopJson(remote): LoopJson<NodeDescriptor>,
) -> Result<(StatusCode, Json<HandshakeAck>), LoopError> {
    let ack = state.relay.handshake(remote)?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

async fn list_events(
    State(state): State<AppState>,
    params: Option<Query<EventListParams>>,
) -> Result<Json<EventListResponse>, LoopError> {
    let limit = params.map(|Query(p)| p.effective_limit()).unwrap_or(DEFAULT_EVENT_LIMIT);
    let results = state.ledger.list_events(limit).await?;
    Ok(Json(EventListResponse { results }))
}

async fn list_nodes(State(state): State<AppState>) -> Json<NodeListResponse> {
    Json(NodeListResponse {
        lab_only: true,
        updated_at: format_timestamp(&Utc::now()),
        nodes: state.registry().list(),
    })
}

async fn stream_events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, LoopError> {
    let subscription = state.hub.subscribe()?;
    Ok(Sse::new(subscription.into_sse()))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        time: format_timestamp(&Utc::now()),
        uptime_seconds: state.started.elapsed().as_secs(),
    })
}

async fn metrics_handler() -> String {
    crate::telemetry::render_metrics()
}

async fn not_found() -> LoopError {
    LoopError::NotFound
}
