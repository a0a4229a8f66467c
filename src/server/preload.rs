use std::time::Duration;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;
use tracing::warn;

use super::AppState;
use crate::domain::Animal;
use crate::error::{AppError, AppResult};
use crate::repository::AnimalRepository;
use crate::storage::StoreError;

/// The animal named by the `{id}` path segment, fetched before the handler runs.
///
/// A malformed id rejects with 400, a missing animal with 404, and a lookup
/// that outlives the preload timeout with 500.
#[derive(Debug, Clone)]
pub struct Preloaded(pub Animal);

impl FromRequestParts<AppState> for Preloaded {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state).await?;
        let animal = preload(state.animals.as_ref(), &id, state.settings.preload_timeout).await?;
        Ok(Preloaded(animal))
    }
}

pub async fn preload(animals: &dyn AnimalRepository, id: &str, timeout: Duration) -> AppResult<Animal> {
    match tokio::time::timeout(timeout, animals.get_by_id(id)).await {
        Ok(found) => found,
        Err(_) => {
            warn!(id, timeout_ms = timeout.as_millis() as u64, "animal preload timed out");
            Err(StoreError::Timeout(timeout).into())
        }
    }
}
