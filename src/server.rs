//! HTTP status surface.
//!
//! `GET /` liveness text, `GET /health` JSON probe, `GET /status` the latest
//! [`ProcessStatus`](crate::status::ProcessStatus) and, when enabled,
//! `POST /verify` to queue an immediate cycle through the scheduler.

use crate::config::ServerConfig;
use crate::error::{Result, WatchError};
use crate::scheduler::{TriggerHandle, TriggerOutcome};
use crate::status::StatusReader;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct ServerState {
    status: StatusReader,
    trigger: Option<TriggerHandle>,
    trigger_token: Option<String>,
}

/// Build the router. `trigger` is `None` when manual runs are disabled.
pub fn router(
    status: StatusReader,
    trigger: Option<TriggerHandle>,
    trigger_token: Option<String>,
) -> Router {
    let manual = trigger.is_some();
    let state = ServerState {
        status,
        trigger,
        trigger_token,
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status_snapshot));
    let app = if manual {
        app.route("/verify", post(verify))
    } else {
        app
    };
    app.with_state(state)
}

/// Bind the configured address and serve until `cancel` fires.
///
/// # Errors
///
/// Returns [`WatchError::Server`] if the address cannot be bound or the
/// server stops abnormally, and [`WatchError::Config`] if the trigger token
/// cannot be resolved.
pub async fn run_server(
    config: &ServerConfig,
    status: StatusReader,
    trigger: Option<TriggerHandle>,
    cancel: CancellationToken,
) -> Result<()> {
    let trigger = if config.allow_manual_trigger {
        trigger
    } else {
        None
    };
    let trigger_token = config
        .trigger_token
        .resolve()?
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| WatchError::Server(format!("cannot bind {addr}: {e}")))?;
    serve(listener, router(status, trigger, trigger_token), cancel).await
}

/// Serve `app` on an already-bound listener until `cancel` fires.
///
/// # Errors
///
/// Returns [`WatchError::Server`] if the server stops abnormally.
pub async fn serve(listener: TcpListener, app: Router, cancel: CancellationToken) -> Result<()> {
    let local_addr = listener.local_addr()?;
    tracing::info!("status server listening on http://{local_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| WatchError::Server(e.to_string()))?;
    tracing::info!("status server stopped");
    Ok(())
}

async fn root() -> &'static str {
    "✅ sbs-watch activo"
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

async fn status_snapshot(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.status.snapshot())
}

fn bearer_is_valid(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected_token) = expected else {
        return true;
    };
    let candidate = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .trim();
    constant_time_eq(candidate.as_bytes(), expected_token.as_bytes())
}

/// Byte comparison whose running time does not depend on where the inputs
/// first differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn verify(State(state): State<ServerState>, headers: HeaderMap) -> impl IntoResponse {
    if !bearer_is_valid(&headers, state.trigger_token.as_deref()) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "unauthorized"})),
        );
    }

    let Some(trigger) = &state.trigger else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "manual runs disabled"})),
        );
    };

    match trigger.request_run() {
        TriggerOutcome::Queued => {
            tracing::info!("manual cycle requested");
            (
                StatusCode::ACCEPTED,
                Json(serde_json::json!({"status": "queued"})),
            )
        }
        TriggerOutcome::AlreadyPending => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"status": "already_pending"})),
        ),
        TriggerOutcome::Stopped => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "scheduler stopped"})),
        ),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::cycle::CycleResult;
    use crate::scheduler::{CycleRunner, Scheduler};
    use crate::status::StatusBoard;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoopRunner;

    #[async_trait]
    impl CycleRunner for NoopRunner {
        async fn run_once(&self) -> crate::error::Result<CycleResult> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CycleResult::new(Utc::now()))
        }
    }

    async fn spawn_app(app: Router) -> (SocketAddr, CancellationToken) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(serve(listener, app, cancel.clone()));
        (addr, cancel)
    }

    #[test]
    fn token_comparison_requires_exact_match() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cre"));
        assert!(!constant_time_eq(b"", b"x"));
    }

    #[test]
    fn bearer_check_uses_authorization_header() {
        let mut headers = HeaderMap::new();
        assert!(bearer_is_valid(&headers, None));
        assert!(!bearer_is_valid(&headers, Some("s3cret")));

        headers.insert(header::AUTHORIZATION, "Bearer wrong!".parse().unwrap());
        assert!(!bearer_is_valid(&headers, Some("s3cret")));

        headers.insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());
        assert!(bearer_is_valid(&headers, Some("s3cret")));
    }

    #[tokio::test]
    async fn root_and_health_respond() {
        let board = StatusBoard::new();
        let (addr, cancel) = spawn_app(router(board.reader(), None, None)).await;

        let root = reqwest::get(format!("http://{addr}/")).await.unwrap();
        assert_eq!(root.status(), 200);
        assert!(root.text().await.unwrap().contains("activo"));

        let health: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
        cancel.cancel();
    }

    #[tokio::test]
    async fn status_reports_placeholder_then_cycle() {
        let board = StatusBoard::new();
        let (addr, cancel) = spawn_app(router(board.reader(), None, None)).await;
        let url = format!("http://{addr}/status");

        let before: serde_json::Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
        assert!(before["last_run"].is_null());
        assert_eq!(before["cycles_completed"], 0);

        let mut result = CycleResult::new(Utc::now());
        result
            .dates
            .insert("BANCOS".to_owned(), "29/02/2024".to_owned());
        result.notifications_sent = 1;
        board.record_cycle(&result);

        let after: serde_json::Value = reqwest::get(&url).await.unwrap().json().await.unwrap();
        assert!(after["last_run"].is_string());
        assert_eq!(after["dates"]["BANCOS"], "29/02/2024");
        assert_eq!(after["notifications_sent"], 1);
        cancel.cancel();
    }

    #[tokio::test]
    async fn verify_is_absent_when_disabled() {
        let board = StatusBoard::new();
        let (addr, cancel) = spawn_app(router(board.reader(), None, None)).await;

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/verify"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
        cancel.cancel();
    }

    #[tokio::test]
    async fn verify_queues_once_then_conflicts() {
        let board = StatusBoard::new();
        let scheduler_cancel = CancellationToken::new();
        let handle = Scheduler::new(Arc::new(NoopRunner), Duration::from_secs(3600))
            .with_run_on_start(false)
            .run(scheduler_cancel.clone());

        // Occupy the loop so the next trigger stays queued.
        assert_eq!(handle.trigger().request_run(), TriggerOutcome::Queued);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (addr, cancel) =
            spawn_app(router(board.reader(), Some(handle.trigger()), None)).await;
        let client = reqwest::Client::new();
        let url = format!("http://{addr}/verify");

        let first = client.post(&url).send().await.unwrap();
        assert_eq!(first.status(), 202);
        let second = client.post(&url).send().await.unwrap();
        assert_eq!(second.status(), 409);

        cancel.cancel();
        scheduler_cancel.cancel();
    }

    #[tokio::test]
    async fn verify_requires_bearer_when_configured() {
        let board = StatusBoard::new();
        let handle = Scheduler::new(Arc::new(NoopRunner), Duration::from_secs(3600))
            .with_run_on_start(false)
            .run(CancellationToken::new());
        let (addr, cancel) = spawn_app(router(
            board.reader(),
            Some(handle.trigger()),
            Some("s3cret".to_owned()),
        ))
        .await;
        let client = reqwest::Client::new();
        let url = format!("http://{addr}/verify");

        let denied = client.post(&url).send().await.unwrap();
        assert_eq!(denied.status(), 401);

        let allowed = client
            .post(&url)
            .bearer_auth("s3cret")
            .send()
            .await
            .unwrap();
        assert_eq!(allowed.status(), 202);
        cancel.cancel();
    }
}
