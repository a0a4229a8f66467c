use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::principal::Principal;
use super::session::{Session, SharedSessionStore};
use crate::error::{AppError, AppResult};
use crate::repository::UserRepository;
use crate::security::{verify_password, ADMIN_USERNAME};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub session: Session,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
    /// End a session; unknown tokens are ignored.
    fn logout(&self, token: &str);
}

/// Checks credentials against the stored administrator and issues sessions.
pub struct LocalAuthProvider {
    users: Arc<dyn UserRepository>,
    sessions: SharedSessionStore,
}

impl LocalAuthProvider {
    pub fn new(users: Arc<dyn UserRepository>, sessions: SharedSessionStore) -> Self { Self { users, sessions } }
}

fn invalid_credentials() -> AppError { AppError::auth("invalid_credentials", "invalid username or password") }

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        if req.username != ADMIN_USERNAME {
            warn!(user = %req.username, "login rejected: unknown user");
            return Err(invalid_credentials());
        }
        let Some(admin) = self.users.get_user(ADMIN_USERNAME).await? else {
            warn!("login rejected: no admin user stored");
            return Err(invalid_credentials());
        };
        // Argon2 is deliberately slow; keep it off the async workers.
        let password = req.password.clone();
        let ok = tokio::task::spawn_blocking(move || verify_password(&admin.password, &password))
            .await
            .map_err(|e| AppError::internal("verify_join", e.to_string()))?;
        if !ok {
            warn!(user = %req.username, "login rejected: bad password");
            return Err(invalid_credentials());
        }
        let session = self.sessions.issue(Principal::new(ADMIN_USERNAME))?;
        info!(user = ADMIN_USERNAME, "login");
        Ok(LoginResponse { session })
    }

    fn logout(&self, token: &str) {
        if self.sessions.revoke(token) { info!("logout"); }
    }
}
