//! Runtime configuration.
//!
//! Values come from environment variables with defaults; the server binary lets
//! command-line flags override them. The administrator password is read from a
//! docker secret file when one is mounted, falling back to `ADMIN_PASSWORD`.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::attachments::MAX_UPLOAD_BYTES;
use crate::identity::DEFAULT_SESSION_TTL;

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_PRELOAD_TIMEOUT: Duration = Duration::from_secs(5);
pub const SECRETS_DIR: &str = "/run/secrets";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Production,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Dev,
        }
    }
}

#[derive(Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    /// Directory holding the store snapshot.
    pub data_dir: PathBuf,
    /// Directory holding uploaded images, served under `/images`.
    pub images_dir: PathBuf,
    pub admin_password: Option<String>,
    pub session_ttl: Duration,
    /// Interval of the expired-session sweep; zero disables it.
    pub session_sweep_interval: Duration,
    pub preload_timeout: Duration,
    /// Interval between store snapshots; zero disables periodic snapshots.
    pub snapshot_interval: Duration,
    pub cookie_secure: bool,
    pub max_upload_bytes: u64,
    pub environment: Environment,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_port", &self.http_port)
            .field("data_dir", &self.data_dir)
            .field("images_dir", &self.images_dir)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "<redacted>"))
            .field("session_ttl", &self.session_ttl)
            .field("session_sweep_interval", &self.session_sweep_interval)
            .field("preload_timeout", &self.preload_timeout)
            .field("snapshot_interval", &self.snapshot_interval)
            .field("cookie_secure", &self.cookie_secure)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("environment", &self.environment)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            data_dir: PathBuf::from("data"),
            images_dir: PathBuf::from("images"),
            admin_password: None,
            session_ttl: DEFAULT_SESSION_TTL,
            session_sweep_interval: Duration::from_secs(300),
            preload_timeout: DEFAULT_PRELOAD_TIMEOUT,
            snapshot_interval: Duration::from_secs(5),
            cookie_secure: false,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            environment: Environment::Dev,
        }
    }
}

pub fn parse_port_env(name: &str) -> Option<u16> {
    match env::var(name) {
        Ok(val) => val.trim().parse::<u16>().ok(),
        Err(_) => None,
    }
}

pub fn parse_bool_env(name: &str) -> Option<bool> {
    match env::var(name) {
        Ok(v) => parse_bool(&v),
        Err(_) => None,
    }
}

pub fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u64_env(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

/// Read a docker secret from `dir/<name>`, trimmed. Empty files count as absent.
pub fn read_secret(dir: &Path, name: &str) -> Option<String> {
    let raw = std::fs::read_to_string(dir.join(name)).ok()?;
    let s = raw.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        let admin_password = read_secret(Path::new(SECRETS_DIR), "admin_password")
            .or_else(|| env::var("ADMIN_PASSWORD").ok().filter(|s| !s.is_empty()));
        Self {
            http_port: parse_port_env("MENAGERIE_HTTP_PORT").unwrap_or(d.http_port),
            data_dir: env::var("MENAGERIE_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            images_dir: env::var("MENAGERIE_IMAGES_DIR").map(PathBuf::from).unwrap_or(d.images_dir),
            admin_password,
            session_ttl: parse_u64_env("MENAGERIE_SESSION_TTL_SECS").map(Duration::from_secs).unwrap_or(d.session_ttl),
            session_sweep_interval: parse_u64_env("MENAGERIE_SESSION_SWEEP_SECS").map(Duration::from_secs).unwrap_or(d.session_sweep_interval),
            preload_timeout: parse_u64_env("MENAGERIE_PRELOAD_TIMEOUT_MS").map(Duration::from_millis).unwrap_or(d.preload_timeout),
            snapshot_interval: parse_u64_env("MENAGERIE_SNAPSHOT_INTERVAL_SECS").map(Duration::from_secs).unwrap_or(d.snapshot_interval),
            cookie_secure: parse_bool_env("MENAGERIE_COOKIE_SECURE").unwrap_or(d.cookie_secure),
            max_upload_bytes: d.max_upload_bytes,
            environment: env::var("ENV").map(|v| Environment::parse(&v)).unwrap_or(d.environment),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf { self.data_dir.join("store.json") }
}
