//! Animal and vaccination endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use super::{AppState, JsonBody, Preloaded};
use crate::domain::{Animal, AnimalType, Vaccination};
use crate::error::{AppError, AppResult};

fn ok() -> Json<Value> { Json(json!({"status":"ok"})) }

pub async fn list_category(State(state): State<AppState>, Path(category): Path<String>) -> AppResult<Json<Vec<Animal>>> {
    let Some(kind) = AnimalType::from_category(&category) else {
        return Err(AppError::not_found("unknown_category", format!("no such category '{}'", category)));
    };
    let animals = state.animals.list_by_category(kind).await?;
    Ok(Json(animals))
}

pub async fn create_animal(State(state): State<AppState>, JsonBody(animal): JsonBody<Animal>) -> AppResult<Json<Animal>> {
    let created = state.animals.insert(animal).await?;
    info!(id = %created.id_string(), name = %created.name, "animal created");
    Ok(Json(created))
}

pub async fn get_animal(Preloaded(animal): Preloaded) -> Json<Animal> { Json(animal) }

/// Full replace of the preloaded animal. The stored id always wins over the
/// body, and `imageUrl` may be kept or cleared but never redirected.
pub async fn update_animal(
    State(state): State<AppState>,
    Preloaded(current): Preloaded,
    JsonBody(mut next): JsonBody<Animal>,
) -> AppResult<Json<Value>> {
    if next.has_image() && next.image_url != current.image_url {
        return Err(AppError::user("image_url_immutable", "imageUrl can only be set by uploading an image"));
    }
    let id = current.id_string();
    next.id = current.id;
    state.animals.update(&id, next.clone()).await?;
    if current.has_image() && !next.has_image() {
        state.attachments.discard(&current.image_url).await;
    }
    info!(id = %id, "animal updated");
    Ok(ok())
}

pub async fn delete_animal(State(state): State<AppState>, Preloaded(animal): Preloaded) -> AppResult<Json<Value>> {
    let id = animal.id_string();
    state.animals.delete(&id).await?;
    state.attachments.discard(&animal.image_url).await;
    info!(id = %id, "animal deleted");
    Ok(ok())
}

pub async fn add_vaccinations(
    State(state): State<AppState>,
    Preloaded(animal): Preloaded,
    JsonBody(vaccinations): JsonBody<Vec<Vaccination>>,
) -> AppResult<Json<Value>> {
    let count = vaccinations.len();
    state.animals.append_vaccinations(&animal.id_string(), vaccinations).await?;
    info!(id = %animal.id_string(), count, "vaccinations added");
    Ok(ok())
}

pub async fn delete_vaccination(
    State(state): State<AppState>,
    Preloaded(animal): Preloaded,
    JsonBody(vaccination): JsonBody<Vaccination>,
) -> AppResult<Json<Value>> {
    state.animals.remove_vaccination(&animal.id_string(), &vaccination).await?;
    info!(id = %animal.id_string(), vaccination = %vaccination.name, "vaccination removed");
    Ok(ok())
}
