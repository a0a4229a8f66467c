//! Login and session management for the single administrator account.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;

pub use principal::Principal;
pub use session::{Clock, ManualClock, MemorySessionStore, Session, SessionStore, SessionToken, SharedSessionStore, SystemClock, DEFAULT_SESSION_TTL};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse};
