//! HTTP API for listing and removing jails.
//!
//! ## Endpoints
//!
//! - `GET /api/v1/jails` - Running jails
//! - `DELETE /api/v1/jails` - Remove every running jail
//! - `GET /api/v1/jails/:id` - One running jail
//! - `DELETE /api/v1/jails/:id` - Remove one jail
//! - `GET /health` - Health check
//!
//! Any failure in island-core is logged and answered with a bare 500; the
//! tool output never reaches the client.

use crate::server::IslandServer;
use crate::types::{
    DeletedAllResponse, DeletedResponse, DetailsResponse, ErrorResponse, JailsResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use island_core::CoreError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Error returned by the API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// The jail id in the path is not a number.
    BadRequest,
    /// island-core failed.
    Core(CoreError),
    /// Some jails could not be removed by a kill-all request.
    PartialKill,
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Core(e) => {
                if e.is_invocation() {
                    tracing::error!(error = %e, "External tool failed");
                } else {
                    tracing::warn!(error = %e, "Request failed");
                }
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::PartialKill => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the HTTP router.
///
/// The returned router can be served directly with axum or composed
/// into a larger application.
pub fn build_router(server: IslandServer) -> Router {
    tracing::debug!("Building HTTP router");

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/jails", get(list_jails).delete(kill_all_jails))
        .route("/api/v1/jails/:id", get(jail_details).delete(kill_jail))
        .with_state(server)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    tracing::debug!("HTTP router built with routes: /health, /api/v1/jails, /api/v1/jails/:id");
    router
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    tracing::trace!("Health check request");
    Json(serde_json::json!({
        "status": "healthy",
        "service": "island-api"
    }))
}

fn parse_jid(id: &str) -> Result<u32, ApiError> {
    id.parse().map_err(|_| {
        tracing::debug!(id = %id, "Rejected non-numeric jail id");
        ApiError::BadRequest
    })
}

async fn list_jails(State(server): State<IslandServer>) -> Result<Json<JailsResponse>, ApiError> {
    let jails = server.jails().list_running().await?;
    Ok(Json(JailsResponse { jails }))
}

async fn jail_details(
    State(server): State<IslandServer>,
    Path(id): Path<String>,
) -> Result<Json<DetailsResponse>, ApiError> {
    let jid = parse_jid(&id)?;
    let details = server.jails().details(jid).await?;
    Ok(Json(DetailsResponse { details }))
}

async fn kill_jail(
    State(server): State<IslandServer>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let jid = parse_jid(&id)?;
    server.jails().kill(jid).await?;
    Ok(Json(DeletedResponse { deleted: jid }))
}

async fn kill_all_jails(
    State(server): State<IslandServer>,
) -> Result<Json<DeletedAllResponse>, ApiError> {
    let report = server.jails().kill_all().await?;
    if !report.is_complete() {
        for failure in &report.failures {
            tracing::error!(jid = failure.jid, error = %failure.error, "Jail not removed");
        }
        tracing::error!(
            attempted = report.attempted(),
            failed = report.failures.len(),
            "Kill-all finished with failures"
        );
        return Err(ApiError::PartialKill);
    }
    Ok(Json(DeletedAllResponse {
        deleted: report.killed,
    }))
}

/// Start the HTTP server.
///
/// This function runs until the server is shut down via the provided
/// shutdown signal.
pub async fn serve(
    server: IslandServer,
    addr: std::net::SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let router = build_router(server);

    tracing::info!(%addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::debug!(%addr, "TCP listener bound");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IslandConfig;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use island_core::CommandRunner;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    const LISTING: &str = "\
jid name host.hostname path ip4.addr
1 web1 web1.local /zroot/jails/web1 10.0.0.1
2 db1 db1.local /zroot/jails/db1 -
";

    /// Answers `jls` with a fixed listing and `jail -r` with success unless
    /// the jid is in `failing`.
    struct FakeHost {
        listing: String,
        failing: HashSet<String>,
        kills: Mutex<Vec<String>>,
    }

    impl FakeHost {
        fn new(listing: &str, failing: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                listing: listing.to_string(),
                failing: failing.iter().map(|s| s.to_string()).collect(),
                kills: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for FakeHost {
        async fn run(&self, program: &std::path::Path, args: &[&str]) -> island_core::Result<String> {
            if program == std::path::Path::new("jls") {
                return Ok(self.listing.clone());
            }
            let jid = args.last().copied().unwrap_or_default().to_string();
            self.kills.lock().unwrap().push(jid.clone());
            if self.failing.contains(&jid) {
                return Err(CoreError::Invocation {
                    command: format!("jail -r {jid}"),
                    code: Some(1),
                    message: format!("jail: {jid}: not found"),
                });
            }
            Ok(String::new())
        }
    }

    fn router(host: Arc<FakeHost>) -> Router {
        build_router(IslandServer::with_runner(IslandConfig::default(), host))
    }

    async fn send(router: Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_build_router() {
        let _router = router(FakeHost::new("", &[]));
        // Router builds without panic
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(router(FakeHost::new("", &[])), Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_list_jails() {
        let (status, body) =
            send(router(FakeHost::new(LISTING, &[])), Method::GET, "/api/v1/jails").await;
        assert_eq!(status, StatusCode::OK);
        let jails = body["jails"].as_array().unwrap();
        assert_eq!(jails.len(), 2);
        assert_eq!(jails[0]["name"], "web1");
        assert_eq!(jails[1]["jid"], 2);
    }

    #[tokio::test]
    async fn test_list_jails_parse_failure_is_500() {
        let (status, body) = send(
            router(FakeHost::new("not a jls listing\n", &[])),
            Method::GET,
            "/api/v1/jails",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_jail_details() {
        let (status, body) =
            send(router(FakeHost::new(LISTING, &[])), Method::GET, "/api/v1/jails/2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["details"]["name"], "db1");
    }

    #[tokio::test]
    async fn test_jail_details_not_found_is_500() {
        let (status, body) =
            send(router(FakeHost::new(LISTING, &[])), Method::GET, "/api/v1/jails/9").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_non_numeric_id_is_400() {
        let (status, body) =
            send(router(FakeHost::new(LISTING, &[])), Method::DELETE, "/api/v1/jails/web1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Bad Request");
    }

    #[tokio::test]
    async fn test_kill_jail() {
        let host = FakeHost::new(LISTING, &[]);
        let (status, body) = send(router(host.clone()), Method::DELETE, "/api/v1/jails/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 1);
        assert_eq!(*host.kills.lock().unwrap(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_kill_jail_failure_is_500() {
        let (status, _) = send(
            router(FakeHost::new(LISTING, &["1"])),
            Method::DELETE,
            "/api/v1/jails/1",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_kill_all() {
        let host = FakeHost::new(LISTING, &[]);
        let (status, body) = send(router(host.clone()), Method::DELETE, "/api/v1/jails").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn test_kill_all_partial_failure_attempts_every_jail() {
        let host = FakeHost::new(LISTING, &["1"]);
        let (status, body) = send(router(host.clone()), Method::DELETE, "/api/v1/jails").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(*host.kills.lock().unwrap(), vec!["1", "2"]);
    }
}
