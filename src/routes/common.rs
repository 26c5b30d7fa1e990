//! Service checks: liveness, readiness of the shared database handle and upload
//! directory, and build info.

use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
}

/// Readiness report. Only the database decides the status code; the upload
/// directory is reported so a missing bundle is visible before the first upload.
#[derive(Serialize)]
struct Readiness {
    status: &'static str,
    database: &'static str,
    uploads: &'static str,
}

#[derive(Serialize)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
}

async fn health() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}

async fn database_reachable(state: &AppState) -> bool {
    match state.database.connect_to().await {
        Ok(conn) => sqlx::query("SELECT 1").execute(conn.pool()).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness: database unavailable");
            false
        }
    }
}

fn uploads_state(state: &AppState) -> &'static str {
    match state.config.upload() {
        Ok(cfg) if cfg.directory.is_dir() => "ok",
        Ok(_) => "pending",
        Err(_) => "unconfigured",
    }
}

async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let db_ok = database_reachable(&state).await;
    let report = Readiness {
        status: if db_ok { "ok" } else { "degraded" },
        database: if db_ok { "ok" } else { "unavailable" },
        uploads: uploads_state(&state),
    };
    let code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

async fn version() -> Json<BuildInfo> {
    Json(BuildInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health, GET /ready, GET /version. Readiness opens the shared connection
/// on first call.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(dir.path().join("config"), dir.path().join("staging"));
        (dir, state)
    }

    async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
        let res = common_routes(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (_dir, state) = state();
        let (status, body) = get_json(state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn ready_without_config_is_degraded() {
        let (_dir, state) = state();
        let (status, body) = get_json(state, "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["database"], "unavailable");
        assert_eq!(body["uploads"], "unconfigured");
    }

    #[tokio::test]
    async fn version_reports_package() {
        let (_dir, state) = state();
        let (status, body) = get_json(state, "/version").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "crud-kit");
    }

    #[tokio::test]
    async fn info_alias_is_not_routed() {
        let (_dir, state) = state();
        let res = common_routes(state)
            .oneshot(Request::builder().uri("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
