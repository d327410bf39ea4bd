//! REST + WebSocket thin view over a kernel session (spec §4.Q), grounded
//! in `ui/server.py`'s FastAPI router and `examples/aptos-labs-aptos-core`'s
//! `axum`-based API crate for the framework idiom — no teacher crate
//! depends on `axum`, but the rest of this workspace's typed-handler,
//! `Arc<AppState>`-threaded style carries over unchanged.
//!
//! Every handler is a thin adapter: it locks the session table, calls into
//! `kernel-session`, and serializes the result. No kernel logic lives here.

#![deny(missing_docs)]

mod error;
mod handlers;
mod ratelimit;
mod state;
mod ws;

pub use error::ApiError;
pub use handlers::{Server, SharedServer};
pub use ratelimit::RateLimiter;
pub use state::AppState;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full router over `app`, wiring every endpoint in spec §6's
/// list plus `/metrics` and the `/sessions/:id/ws` WebSocket stream.
#[must_use]
pub fn build_router(app: AppState) -> Router {
    let server: SharedServer =
        Arc::new(Server { app, tool_limiter: RateLimiter::new(30, Duration::from_secs(60)) });

    Router::new()
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/:id", get(handlers::get_session).delete(handlers::delete_session))
        .route("/sessions/:id/chat", post(handlers::chat))
        .route("/sessions/:id/goal", post(handlers::run_goal))
        .route("/sessions/:id/ledger", get(handlers::ledger_tail))
        .route("/sessions/:id/ledger/verify", get(handlers::ledger_verify))
        .route("/sessions/:id/tools", get(handlers::list_tools))
        .route("/sessions/:id/tools/run", post(handlers::run_tool))
        .route("/sessions/:id/permissions/grant", post(handlers::grant_permission))
        .route("/sessions/:id/permissions/revoke", post(handlers::revoke_permission))
        .route("/sessions/:id/memory/search", get(handlers::memory_search))
        .route("/sessions/:id/memory/:key", get(handlers::memory_get))
        .route("/sessions/:id/fs", get(handlers::fs_list))
        .route("/sessions/:id/fs/read", get(handlers::fs_read))
        .route("/sessions/:id/replay/export", get(handlers::replay_export))
        .route("/sessions/:id/replay/import", post(handlers::replay_import))
        .route("/sessions/:id/replay/clear", delete(handlers::replay_clear))
        .route("/sessions/:id/mode", get(handlers::get_mode).post(handlers::set_mode))
        .route("/sessions/:id/budgets", get(handlers::get_budgets))
        .route("/sessions/:id/world", get(handlers::get_world))
        .route("/sessions/:id/ws", get(ws::session_ws))
        .route("/metrics", get(handlers::metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> Router {
        let dir = tempfile::tempdir().unwrap().into_path();
        build_router(AppState::new(dir, false))
    }

    #[tokio::test]
    async fn unknown_session_returns_404_for_get() {
        let response = router().oneshot(Request::get("/sessions/ghost").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_creates_the_session_and_replies() {
        let body = serde_json::json!({"text": "hello"}).to_string();
        let response = router()
            .oneshot(Request::post("/sessions/s1/chat").header("content-type", "application/json").body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_is_reachable_and_empty_with_no_sessions() {
        let response = router().oneshot(Request::get("/metrics").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_sessions_starts_empty() {
        let response = router().oneshot(Request::get("/sessions").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let ids: Vec<String> = serde_json::from_slice(&bytes).unwrap();
        assert!(ids.is_empty());
    }
}
