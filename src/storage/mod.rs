//!
//! menagerie storage module
//! ------------------------
//! Collection-addressed document storage. Documents are JSON objects keyed by a
//! UUID stored under `_id`. The `DocumentStore` trait is the persistence boundary
//! used by the repositories; it supports equality filters, whole-document
//! replacement and field-level updates in the `$set` / `$push` / `$pull` style.
//!
//! `memory::MemoryStore` is the in-process implementation, with periodic JSON
//! snapshots to disk.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

pub mod memory;

pub use memory::MemoryStore;

/// Name of the identifier field carried by every stored document.
pub const ID_FIELD: &str = "_id";

pub type Document = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("malformed identifier '{0}'")]
    InvalidId(String),
    #[error("document {id} not found in {collection}")]
    NotFound { collection: String, id: Uuid },
    #[error("field '{0}' is not an array")]
    NotAnArray(String),
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Parse a textual identifier into the store's native key type.
pub fn parse_id(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw.trim()).map_err(|_| StoreError::InvalidId(raw.to_string()))
}

/// Equality filter over top-level fields. An empty filter matches every document.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    fields: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self { Self::default() }

    pub fn eq<F: Into<String>, V: Into<Value>>(mut self, field: F, value: V) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.fields.iter().all(|(k, v)| doc.get(k) == Some(v))
    }
}

/// Field-level mutation applied atomically to a single document.
#[derive(Debug, Clone)]
pub enum Update {
    /// Overwrite one field, leaving the rest of the document untouched.
    Set { field: String, value: Value },
    /// Append every value to an array field, creating it when absent.
    PushEach { field: String, values: Vec<Value> },
    /// Remove every array element whose fields equal all fields of `matching`.
    Pull { field: String, matching: Document },
}

impl Update {
    pub fn set<F: Into<String>>(field: F, value: Value) -> Self { Update::Set { field: field.into(), value } }
    pub fn push_each<F: Into<String>>(field: F, values: Vec<Value>) -> Self { Update::PushEach { field: field.into(), values } }
    pub fn pull<F: Into<String>>(field: F, matching: Document) -> Self { Update::Pull { field: field.into(), matching } }

    pub fn apply(&self, doc: &mut Document) -> Result<(), StoreError> {
        match self {
            Update::Set { field, value } => {
                doc.insert(field.clone(), value.clone());
            }
            Update::PushEach { field, values } => {
                let slot = doc.entry(field.clone()).or_insert_with(|| Value::Array(Vec::new()));
                if slot.is_null() { *slot = Value::Array(Vec::new()); }
                let Value::Array(items) = slot else { return Err(StoreError::NotAnArray(field.clone())); };
                items.extend(values.iter().cloned());
            }
            Update::Pull { field, matching } => {
                match doc.get_mut(field) {
                    None | Some(Value::Null) => {}
                    Some(Value::Array(items)) => items.retain(|item| !element_matches(item, matching)),
                    Some(_) => return Err(StoreError::NotAnArray(field.clone())),
                }
            }
        }
        Ok(())
    }
}

fn element_matches(item: &Value, matching: &Document) -> bool {
    match item {
        Value::Object(obj) => matching.iter().all(|(k, v)| obj.get(k) == Some(v)),
        _ => false,
    }
}

/// Persistence boundary for JSON documents grouped in named collections.
///
/// Mutating calls return whether a document with the given id existed, so callers
/// can tell "nothing matched" apart from a failure.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError>;
    async fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError>;
    /// Insert a new document, assigning and returning its identifier.
    async fn insert(&self, collection: &str, doc: Document) -> Result<Uuid, StoreError>;
    async fn replace_by_id(&self, collection: &str, id: Uuid, doc: Document) -> Result<bool, StoreError>;
    async fn update_by_id(&self, collection: &str, id: Uuid, update: Update) -> Result<bool, StoreError>;
    async fn delete_by_id(&self, collection: &str, id: Uuid) -> Result<bool, StoreError>;
    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;
}

pub type SharedDocumentStore = Arc<dyn DocumentStore>;
