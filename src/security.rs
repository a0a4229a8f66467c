use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::repository::{User, UserRepository};

/// The one account allowed to log in.
pub const ADMIN_USERNAME: &str = "admin";

pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AppError::internal("rng_unavailable", e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::internal("password_hash", e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal("password_hash", e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Make sure exactly one user, the administrator, exists.
///
/// One stored user is left alone. Zero users, or more than one, end with the
/// collection wiped and a fresh `admin` created from `password`, which is then
/// required.
pub async fn ensure_default_admin(users: &dyn UserRepository, password: Option<&str>) -> AppResult<()> {
    let existing = users.list_users().await?;
    if existing.len() == 1 { return Ok(()); }
    if existing.len() > 1 {
        let removed = users.delete_all_users().await?;
        warn!(removed, "more than one user stored; resetting to a single admin");
    }
    let Some(password) = password.filter(|p| !p.is_empty()) else {
        return Err(AppError::internal("admin_password_missing", "no admin user stored and no admin password configured"));
    };
    let phc = hash_password(password)?;
    users.insert_user(User { username: ADMIN_USERNAME.to_string(), password: phc }).await?;
    info!(user = ADMIN_USERNAME, "admin user created");
    Ok(())
}
