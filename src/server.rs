use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, extract::Request};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{self, AppState, SharedState};
use crate::auth::AuthSettings;
use crate::config::ProdyoToml;
use crate::store::{Db, DbHandle};

/// Configuration for the HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub cors_permissive: bool,
    pub auth: AuthSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_toml(&ProdyoToml::default())
    }
}

impl ServerConfig {
    pub fn from_toml(config: &ProdyoToml) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            db_path: config.database.path.clone(),
            cors_permissive: config.server.cors_permissive,
            auth: config.auth_settings(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Full application router: API plus request tracing and optional CORS.
pub fn build_router(state: SharedState, cors_permissive: bool) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request| {
        tracing::info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            user_id = tracing::field::Empty,
        )
    });

    let mut app = api::api_router(&state).with_state(state).layer(trace);
    if cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

/// Open (or create) the database at `path`, creating parent directories.
pub fn open_db(path: &std::path::Path) -> Result<Db> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
    }
    Db::new(path).with_context(|| format!("Failed to open database at {}", path.display()))
}

pub async fn start_server(config: ServerConfig) -> Result<()> {
    let db = open_db(&config.db_path)?;
    let purged = db.delete_expired_sessions(chrono::Utc::now())?;
    if purged > 0 {
        tracing::info!(purged, "expired sessions removed at startup");
    }
    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        auth: config.auth,
    });

    let app = build_router(state, config.cors_permissive);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        db = %config.db_path.display(),
        cors_permissive = config.cors_permissive,
        "prodyo listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router(cors_permissive: bool) -> Router {
        let state = Arc::new(AppState {
            db: DbHandle::new(Db::new_in_memory().unwrap()),
            auth: AuthSettings {
                session_ttl: chrono::Duration::hours(1),
                bcrypt_cost: 4,
            },
        });
        build_router(state, cors_permissive)
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let app = test_router(false);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = test_router(false);
        let req = Request::builder()
            .uri("/api/v2/projects")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_only_when_permissive() {
        for (permissive, expected) in [(true, true), (false, false)] {
            let app = test_router(permissive);
            let req = Request::builder()
                .uri("/health")
                .header("origin", "http://localhost:5173")
                .body(Body::empty())
                .unwrap();
            let resp = app.oneshot(req).await.unwrap();
            assert_eq!(
                resp.headers().contains_key("access-control-allow-origin"),
                expected
            );
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.db_path, PathBuf::from("prodyo.db"));
        assert!(!config.cors_permissive);
        assert_eq!(config.auth.session_ttl, chrono::Duration::hours(24));
    }

    #[test]
    fn test_open_db_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/prodyo.db");
        open_db(&path).unwrap();
        assert!(path.exists());
    }
}
