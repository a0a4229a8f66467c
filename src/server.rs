//!
//! menagerie HTTP server
//! ---------------------
//! This module defines the Axum-based HTTP API for the animal records.
//!
//! Responsibilities:
//! - Session login/logout backed by the `identity` module, carried in a cookie.
//! - An auth gate in front of every mutating request.
//! - Preloading the addressed animal before entity handlers run.
//! - Animal, vaccination and image endpoints delegating to the repository and
//!   the attachment manager.
//! - Background session sweeping, store snapshots and graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, FromRequest, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::attachments::AttachmentManager;
use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{AuthProvider, LocalAuthProvider, LoginRequest, MemorySessionStore, SharedSessionStore};
use crate::repository::{AnimalRepository, DocumentAnimalRepository, DocumentUserRepository, UserRepository};
use crate::security;
use crate::storage::{MemoryStore, SharedDocumentStore};

pub mod access_log;
pub mod animals;
pub mod auth_gate;
pub mod images;
pub mod preload;

pub use auth_gate::{parse_cookie, SESSION_COOKIE};
pub use preload::Preloaded;

/// Request-level knobs the handlers need at runtime.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub preload_timeout: Duration,
    pub cookie_secure: bool,
    pub max_upload_bytes: u64,
}

impl Default for HttpSettings {
    fn default() -> Self { Self::from(&ServerConfig::default()) }
}

impl From<&ServerConfig> for HttpSettings {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            preload_timeout: cfg.preload_timeout,
            cookie_secure: cfg.cookie_secure,
            max_upload_bytes: cfg.max_upload_bytes,
        }
    }
}

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub animals: Arc<dyn AnimalRepository>,
    pub auth: Arc<dyn AuthProvider>,
    pub sessions: SharedSessionStore,
    pub attachments: Arc<AttachmentManager>,
    pub settings: HttpSettings,
}

impl AppState {
    /// Wire repositories, the auth provider and the attachment manager over one store.
    pub fn new<P: Into<PathBuf>>(
        store: SharedDocumentStore,
        users: Arc<dyn UserRepository>,
        sessions: SharedSessionStore,
        images_dir: P,
        settings: HttpSettings,
    ) -> Self {
        let animals: Arc<dyn AnimalRepository> = Arc::new(DocumentAnimalRepository::new(store));
        let auth: Arc<dyn AuthProvider> = Arc::new(LocalAuthProvider::new(users, sessions.clone()));
        let attachments = Arc::new(
            AttachmentManager::new(images_dir, animals.clone()).with_max_bytes(settings.max_upload_bytes),
        );
        Self { animals, auth, sessions, attachments, settings }
    }
}

/// `axum::Json` with its rejection folded into `AppError`, so malformed bodies
/// come back as 400 with the usual error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Build the full route table over `state`.
pub fn router(state: AppState) -> Router {
    let gate = middleware::from_fn_with_state(state.clone(), auth_gate::require_session);
    // Whole-body cap for uploads; the attachment manager enforces the file cap itself.
    let upload_limit = usize::try_from(state.settings.max_upload_bytes).unwrap_or(usize::MAX);

    let auth = Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout).route_layer(gate.clone()));

    let api = Router::new()
        .route("/animal", post(animals::create_animal))
        .route(
            "/animal/{id}",
            get(animals::get_animal).put(animals::update_animal).delete(animals::delete_animal),
        )
        .route("/animal/{id}/vaccinations/add", post(animals::add_vaccinations))
        .route("/animal/{id}/vaccinations/delete", post(animals::delete_vaccination))
        .route("/image/{id}", post(images::upload_image).layer(DefaultBodyLimit::max(upload_limit)))
        .route("/{category}", get(animals::list_category))
        .route_layer(gate);

    Router::new()
        .route("/health", get(|| async { "menagerie ok" }))
        .nest("/auth", auth)
        .nest("/api", api)
        .route("/images/{file}", get(images::serve_image))
        .layer(middleware::from_fn(access_log::log_requests))
        .with_state(state)
}

fn session_cookie(session_id: &str, max_age: Duration, expires: chrono::DateTime<chrono::Utc>, secure: bool) -> AppResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}; Expires={}",
        SESSION_COOKIE,
        session_id,
        max_age.as_secs(),
        expires.format("%a, %d %b %Y %H:%M:%S GMT"),
    );
    if secure { cookie.push_str("; Secure"); }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::internal("cookie_encoding", e.to_string()))
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session_token=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; HttpOnly; SameSite=Lax; Path=/")
}

async fn login(State(state): State<AppState>, JsonBody(payload): JsonBody<LoginRequest>) -> AppResult<impl IntoResponse> {
    let resp = state.auth.login(&payload).await?;
    let session = resp.session;
    let cookie = session_cookie(&session.session_id, state.sessions.ttl(), session.expires_at, state.settings.cookie_secure)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((StatusCode::OK, headers, Json(json!({"sessionId": session.session_id}))))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(sid) = auth_gate::session_token(&headers) {
        state.auth.logout(&sid);
    }
    let mut h = HeaderMap::new();
    h.insert(SET_COOKIE, clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

/// Periodically evict expired sessions. A zero interval disables the sweeper.
pub fn spawn_session_sweeper(sessions: SharedSessionStore, interval: Duration) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        info!("session_sweeper" = false, "background session sweep disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = sessions.sweep_expired();
            if removed > 0 { debug!(removed = removed, "session_sweep"); }
        }
    }))
}

fn log_startup(cfg: &ServerConfig) {
    let cwd = std::env::current_dir().ok();
    info!(
        target: "startup",
        "menagerie starting. cwd={:?}, data_dir={:?}, images_dir={:?}, environment={:?}",
        cwd, cfg.data_dir, cfg.images_dir, cfg.environment
    );
    info!(
        target: "startup",
        "Path existence: data_dir_exists={}, images_dir_exists={}",
        cfg.data_dir.exists(), cfg.images_dir.exists()
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("ctrl-c handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                warn!("SIGTERM handler failed: {}", e);
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
    info!("shutdown signal received");
}

/// Start the menagerie HTTP server.
///
/// This opens the store snapshot, ensures the admin user exists, starts the
/// session sweeper and snapshot loop, and serves until ctrl-c or SIGTERM. The
/// store is written out once more after the listener drains.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    log_startup(&config);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create or access data dir: {}", config.data_dir.display()))?;
    std::fs::create_dir_all(&config.images_dir)
        .with_context(|| format!("Failed to create or access images dir: {}", config.images_dir.display()))?;

    let snapshot = config.snapshot_path();
    let store = Arc::new(
        MemoryStore::open(&snapshot)
            .with_context(|| format!("While opening store snapshot: {}", snapshot.display()))?,
    );
    let shared: SharedDocumentStore = store.clone();

    let users: Arc<dyn UserRepository> = Arc::new(DocumentUserRepository::new(shared.clone()));
    security::ensure_default_admin(users.as_ref(), config.admin_password.as_deref())
        .await
        .context("While ensuring the admin user")?;

    let sessions: SharedSessionStore = Arc::new(MemorySessionStore::new(config.session_ttl));
    let sweeper = spawn_session_sweeper(sessions.clone(), config.session_sweep_interval);
    let persistence = store.spawn_persistence(config.snapshot_interval);

    let state = AppState::new(shared, users, sessions, config.images_dir.clone(), HttpSettings::from(&config));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    for handle in [sweeper, persistence].into_iter().flatten() {
        handle.abort();
    }
    store.save_snapshot().await.context("While writing the final store snapshot")?;
    info!("server stopped");
    Ok(())
}
