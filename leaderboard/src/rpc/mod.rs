//! HTTP gateway for the leaderboard
//!
//! Routes:
//! - `POST /results` - submit `{name, score}`; the score is added to the total
//! - `GET /results` - every `{name, score}` pair, unsorted
//! - `GET /isOwner?address=0x..` - NFT balance of an address as `{ownerItems}`
//! - `GET /health`, `GET /metrics` - observability

pub mod metrics;
pub mod rate_limit;

pub use metrics::{check_health, GatewayMetrics, HealthResponse};
pub use rate_limit::{RateLimitInfo, RateLimiter};

use anyhow::Result;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::{
    body::{Bytes, Incoming},
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Method, Request, Response, StatusCode,
};
use hyper_util::{rt::TokioIo, server::graceful::GracefulShutdown};
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    future::Future,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::service::{LedgerError, LedgerService};
use crate::store::PlayerScore;

/// Largest request body accepted
const MAX_BODY_BYTES: usize = 16 * 1024;

/// How long shutdown waits for open connections to finish
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// How often idle rate-limit windows are dropped
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(120);

/// Acknowledgement text for an accepted submission
pub const SUBMIT_OK_MESSAGE: &str = "Result updated/saved successfully";

/// `POST /results` body
#[derive(Debug, Deserialize)]
pub struct SubmitResultRequest {
    /// Player identity (account address)
    pub name: String,
    /// Points to add to the player's total
    pub score: i64,
}

/// `GET /isOwner` query string
#[derive(Debug, Deserialize)]
pub struct IsOwnerQuery {
    pub address: String,
}

/// `POST /results` success body
#[derive(Debug, Serialize)]
pub struct SubmitResultResponse {
    pub message: &'static str,
    /// Identity the score was credited to
    pub data: String,
}

/// One row of `GET /results`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub name: String,
    pub score: u64,
}

impl From<PlayerScore> for ResultEntry {
    fn from(record: PlayerScore) -> Self {
        Self {
            name: record.identity,
            score: record.score,
        }
    }
}

/// `GET /isOwner` success body
#[derive(Debug, Serialize)]
pub struct OwnershipResponse {
    #[serde(rename = "ownerItems")]
    pub owner_items: u64,
}

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Shared gateway state
pub struct GatewayState {
    pub service: Arc<LedgerService>,
    /// Allowed CORS origins (e.g., ["http://localhost", "http://127.0.0.1"])
    /// If contains "*", all origins are allowed
    pub cors_origins: Vec<String>,
    /// Per-client rate limiter
    pub rate_limiter: Arc<RateLimiter>,
    /// Prometheus metrics
    pub metrics: Arc<GatewayMetrics>,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(service: Arc<LedgerService>, cors_origins: Vec<String>, rate_limit_per_minute: u32) -> Self {
        Self {
            service,
            cors_origins,
            rate_limiter: Arc::new(RateLimiter::new(rate_limit_per_minute)),
            metrics: Arc::new(GatewayMetrics::new()),
            start_time: Instant::now(),
        }
    }
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn start_gateway<F>(addr: SocketAddr, state: Arc<GatewayState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state, shutdown).await
}

/// Serve connections from `listener` until `shutdown` resolves.
///
/// On shutdown the listener is closed, idle keep-alive connections are
/// closed and requests in flight get up to [`SHUTDOWN_GRACE`] to complete.
pub async fn serve<F>(listener: TcpListener, state: Arc<GatewayState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!("HTTP gateway listening on {}", listener.local_addr()?);

    let cleanup = state.rate_limiter.is_enabled().then(|| {
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        })
    });

    tokio::pin!(shutdown);
    let graceful = GracefulShutdown::new();

    loop {
        let (stream, remote) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("HTTP gateway shutting down");
                break;
            }
        };

        let io = TokioIo::new(stream);
        let state = state.clone();
        let service = service_fn(move |req| handle_request(req, remote, state.clone()));
        let conn = graceful.watch(http1::Builder::new().serve_connection(io, service));

        tokio::spawn(async move {
            if let Err(err) = conn.await {
                debug!("Error serving connection from {}: {:?}", remote, err);
            }
        });
    }

    drop(listener);
    if let Some(task) = cleanup {
        task.abort();
    }

    tokio::select! {
        _ = graceful.shutdown() => debug!("All connections closed"),
        _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
            warn!("Connections still open after {:?}, not waiting", SHUTDOWN_GRACE);
        }
    }

    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    remote: SocketAddr,
    state: Arc<GatewayState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    // Extract Origin header for CORS checking
    let request_origin = req
        .headers()
        .get("Origin")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());

    let allowed_origin = check_cors_origin(request_origin.as_deref(), &state.cors_origins);
    let allowed_origin_ref = allowed_origin.as_deref();

    // Handle CORS preflight (don't rate limit preflight requests)
    if req.method() == Method::OPTIONS {
        return Ok(cors_response(
            Response::new(Full::new(Bytes::new())),
            allowed_origin_ref,
        ));
    }

    let rate_limit_info = state.rate_limiter.check(remote.ip());
    if !rate_limit_info.allowed {
        debug!(
            "Rate limit exceeded for {} (limit: {}/min)",
            remote.ip(),
            rate_limit_info.limit
        );
        return Ok(rate_limit_response(&rate_limit_info, allowed_origin_ref));
    }

    let (route, response) = route_request(req, &state).await;

    state.metrics.record_request(route);
    if response.status().is_client_error() || response.status().is_server_error() {
        state.metrics.record_error(route);
    }

    let response = cors_response(response, allowed_origin_ref);
    Ok(if state.rate_limiter.is_enabled() {
        add_rate_limit_headers(response, &rate_limit_info)
    } else {
        response
    })
}

/// Dispatch to a handler; returns the metrics label with the response
async fn route_request(
    req: Request<Incoming>,
    state: &GatewayState,
) -> (&'static str, Response<Full<Bytes>>) {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        (Method::POST, "/results") => ("submit_result", handle_submit_result(req, state).await),
        (Method::GET, "/results") => ("list_results", handle_list_results(state).await),
        (Method::GET, "/isOwner") => {
            let query = req.uri().query().unwrap_or("");
            ("is_owner", handle_is_owner(query, state).await)
        }
        (Method::GET, "/health") => (
            "health",
            json_response(StatusCode::OK, &check_health(state.start_time)),
        ),
        (Method::GET, "/metrics") => ("metrics", metrics_response(state)),
        (_, "/results") | (_, "/isOwner") | (_, "/health") | (_, "/metrics") => (
            "method_not_allowed",
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
        ),
        _ => ("not_found", error_response(StatusCode::NOT_FOUND, "Not found")),
    }
}

async fn handle_submit_result(req: Request<Incoming>, state: &GatewayState) -> Response<Full<Bytes>> {
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        }
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Failed to read body");
        }
    };

    let submission: SubmitResultRequest = match serde_json::from_slice(&body) {
        Ok(submission) => submission,
        Err(e) => {
            debug!("Malformed score submission: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", e));
        }
    };

    match state.service.submit_score(&submission.name, submission.score).await {
        Ok(record) => {
            state.metrics.record_points(submission.score.unsigned_abs());
            json_response(
                StatusCode::OK,
                &SubmitResultResponse {
                    message: SUBMIT_OK_MESSAGE,
                    data: record.identity,
                },
            )
        }
        Err(e) => ledger_error_response(&e),
    }
}

async fn handle_list_results(state: &GatewayState) -> Response<Full<Bytes>> {
    match state.service.list_scores().await {
        Ok(records) => {
            let entries: Vec<ResultEntry> = records.into_iter().map(ResultEntry::from).collect();
            json_response(StatusCode::OK, &entries)
        }
        Err(e) => ledger_error_response(&e),
    }
}

async fn handle_is_owner(query: &str, state: &GatewayState) -> Response<Full<Bytes>> {
    let address = match parse_is_owner_query(query) {
        Ok(params) => params.address,
        Err(e) => {
            debug!("Bad isOwner query {:?}: {}", query, e);
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid address query parameter: {}", e),
            );
        }
    };

    let started = Instant::now();
    let result = state.service.check_ownership(&address).await;
    state.metrics.observe_chain_query(started);

    match result {
        Ok(balance) => json_response(StatusCode::OK, &OwnershipResponse { owner_items: balance }),
        Err(e) => ledger_error_response(&e),
    }
}

fn metrics_response(state: &GatewayState) -> Response<Full<Bytes>> {
    match state.metrics.encode() {
        Ok(text) => {
            let mut response = Response::new(Full::new(Bytes::from(text)));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            response
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}

/// Decode the percent-encoded `/isOwner` query string
fn parse_is_owner_query(query: &str) -> Result<IsOwnerQuery, serde_urlencoded::de::Error> {
    serde_urlencoded::from_str(query)
}

/// Map a service error onto a status code: caller errors are 400,
/// store and chain failures are 500.
fn ledger_error_response(e: &LedgerError) -> Response<Full<Bytes>> {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    error_response(status, &e.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        &ErrorResponse {
            message: message.to_string(),
        },
    )
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, body) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"message":"Internal error"}"#.to_vec(),
            )
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Check if the given origin is allowed based on the CORS configuration.
/// Returns the origin to echo back if allowed, or None if denied.
fn check_cors_origin(request_origin: Option<&str>, allowed_origins: &[String]) -> Option<String> {
    let origin = request_origin?;

    if allowed_origins.iter().any(|o| o == "*") {
        return Some(origin.to_string());
    }

    for allowed in allowed_origins {
        if origin == allowed {
            return Some(origin.to_string());
        }
        // Allow localhost with any port (e.g., "http://localhost" matches "http://localhost:3000")
        if origin.starts_with(allowed.as_str())
            && (allowed.ends_with("localhost") || allowed.ends_with("127.0.0.1"))
        {
            let suffix = &origin[allowed.len()..];
            if suffix.is_empty() || suffix.starts_with(':') {
                return Some(origin.to_string());
            }
        }
    }

    None
}

fn cors_response(
    mut response: Response<Full<Bytes>>,
    allowed_origin: Option<&str>,
) -> Response<Full<Bytes>> {
    // If no allowed origin, we don't set CORS headers - browser will block the request
    let Some(origin) = allowed_origin.and_then(|o| HeaderValue::from_str(o).ok()) else {
        return response;
    };

    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", origin);
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert("Vary", HeaderValue::from_static("Origin"));

    response
}

/// Add X-RateLimit-* headers to a response.
fn add_rate_limit_headers(
    mut response: Response<Full<Bytes>>,
    rate_limit: &RateLimitInfo,
) -> Response<Full<Bytes>> {
    let headers = response.headers_mut();

    headers.insert("X-RateLimit-Limit", HeaderValue::from(rate_limit.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(rate_limit.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(rate_limit.reset));

    response
}

/// Create a 429 Too Many Requests response with rate limit headers.
fn rate_limit_response(
    rate_limit: &RateLimitInfo,
    allowed_origin: Option<&str>,
) -> Response<Full<Bytes>> {
    let retry_after = rate_limit.retry_after.unwrap_or(60);

    let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
    response
        .headers_mut()
        .insert("Retry-After", HeaderValue::from(retry_after));

    add_rate_limit_headers(cors_response(response, allowed_origin), rate_limit)
}
