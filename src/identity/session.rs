use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::principal::Principal;
use crate::error::{AppError, AppResult};

pub type SessionToken = String;

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self { Self { now: Mutex::new(start) } }

    pub fn advance(&self, by: Duration) {
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *self.now.lock() += delta;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self { Self::new(Utc::now()) }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> { *self.now.lock() }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionToken,
    pub principal: Principal,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { now >= self.expires_at }
}

/// Server-side registry of login sessions.
///
/// Implementations must be safe to call from many requests at once.
pub trait SessionStore: Send + Sync {
    /// Create a session for `principal` that expires one TTL from now.
    fn issue(&self, principal: Principal) -> AppResult<Session>;
    /// Principal of a live session. An expired session is evicted and reported absent.
    fn validate(&self, token: &str) -> Option<Principal>;
    /// Forget a session. Returns whether it existed; calling twice is harmless.
    fn revoke(&self, token: &str) -> bool;
    /// Evict every expired session, returning how many went.
    fn sweep_expired(&self) -> usize;
    fn ttl(&self) -> Duration;
}

pub type SharedSessionStore = Arc<dyn SessionStore>;

fn gen_token() -> AppResult<SessionToken> {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AppError::internal("rng_unavailable", e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// `SessionStore` over a single mutex-guarded map. Expiry is lazy: entries are
/// checked when looked up, and only `sweep_expired` removes untouched ones.
pub struct MemorySessionStore {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<SessionToken, Session>>,
}

impl Default for MemorySessionStore {
    fn default() -> Self { Self::new(DEFAULT_SESSION_TTL) }
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self { Self::with_clock(ttl, Arc::new(SystemClock)) }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, clock, sessions: Mutex::new(HashMap::new()) }
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize { self.sessions.lock().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl SessionStore for MemorySessionStore {
    fn issue(&self, principal: Principal) -> AppResult<Session> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(self.ttl).map_err(|e| AppError::internal("invalid_ttl", e.to_string()))?;
        let session = Session {
            session_id: gen_token()?,
            principal,
            issued_at: now,
            expires_at: now + ttl,
        };
        self.sessions.lock().insert(session.session_id.clone(), session.clone());
        debug!(user = %session.principal.username, ttl_secs = self.ttl.as_secs(), "session issued");
        Ok(session)
    }

    fn validate(&self, token: &str) -> Option<Principal> {
        let now = self.clock.now();
        let mut map = self.sessions.lock();
        let expired = match map.get(token) {
            None => return None,
            Some(s) => s.is_expired_at(now),
        };
        if expired {
            map.remove(token);
            debug!("expired session evicted on access");
            return None;
        }
        map.get(token).map(|s| s.principal.clone())
    }

    fn revoke(&self, token: &str) -> bool {
        self.sessions.lock().remove(token).is_some()
    }

    fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut map = self.sessions.lock();
        let before = map.len();
        map.retain(|_, s| !s.is_expired_at(now));
        before - map.len()
    }

    fn ttl(&self) -> Duration { self.ttl }
}
