use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::storage::{Filter, SharedDocumentStore, StoreError, ID_FIELD};

use super::UserRepository;

pub const USERS_COLLECTION: &str = "users";

/// Stored administrator account. `password` holds an argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct DocumentUserRepository {
    store: SharedDocumentStore,
}

impl DocumentUserRepository {
    pub fn new(store: SharedDocumentStore) -> Self { Self { store } }
}

fn decode(mut doc: crate::storage::Document) -> AppResult<User> {
    doc.remove(ID_FIELD);
    Ok(serde_json::from_value(Value::Object(doc)).map_err(StoreError::from)?)
}

#[async_trait]
impl UserRepository for DocumentUserRepository {
    async fn get_user(&self, username: &str) -> AppResult<Option<User>> {
        let docs = self.store.find(USERS_COLLECTION, &Filter::all().eq("username", username)).await?;
        docs.into_iter().next().map(decode).transpose()
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let docs = self.store.find(USERS_COLLECTION, &Filter::all()).await?;
        docs.into_iter().map(decode).collect()
    }

    async fn insert_user(&self, user: User) -> AppResult<()> {
        let doc = match serde_json::to_value(&user).map_err(StoreError::from)? {
            Value::Object(m) => m,
            _ => return Err(AppError::internal("internal", "user did not encode as an object")),
        };
        self.store.insert(USERS_COLLECTION, doc).await?;
        Ok(())
    }

    async fn delete_all_users(&self) -> AppResult<u64> {
        Ok(self.store.delete_many(USERS_COLLECTION, &Filter::all()).await?)
    }
}
