use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Animal, AnimalType, Vaccination};
use crate::error::{AppError, AppResult};
use crate::storage::{parse_id, Document, Filter, SharedDocumentStore, StoreError, Update, ID_FIELD};

use super::AnimalRepository;

pub const ANIMALS_COLLECTION: &str = "animals";

/// `AnimalRepository` over any `DocumentStore`.
#[derive(Clone)]
pub struct DocumentAnimalRepository {
    store: SharedDocumentStore,
    collection: String,
}

impl DocumentAnimalRepository {
    pub fn new(store: SharedDocumentStore) -> Self {
        Self::with_collection(store, ANIMALS_COLLECTION)
    }

    pub fn with_collection<S: Into<String>>(store: SharedDocumentStore, collection: S) -> Self {
        Self { store, collection: collection.into() }
    }

    fn not_found(&self, id: Uuid) -> AppError {
        StoreError::NotFound { collection: self.collection.clone(), id }.into()
    }

    /// Require that a mutation matched a document.
    fn matched(&self, id: Uuid, matched: bool) -> AppResult<()> {
        if matched { Ok(()) } else { Err(self.not_found(id)) }
    }
}

fn to_document<T: serde::Serialize>(value: &T) -> AppResult<Document> {
    match serde_json::to_value(value).map_err(StoreError::from)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        _ => Err(StoreError::NotAnObject.into()),
    }
}

fn from_document(mut doc: Document) -> AppResult<Animal> {
    if let Some(id) = doc.remove(ID_FIELD) {
        doc.insert("id".to_string(), id);
    }
    Ok(serde_json::from_value(Value::Object(doc)).map_err(StoreError::from)?)
}

fn vaccination_values(vaccinations: &[Vaccination]) -> AppResult<Vec<Value>> {
    vaccinations
        .iter()
        .map(|v| serde_json::to_value(v).map_err(|e| AppError::from(StoreError::from(e))))
        .collect()
}

#[async_trait]
impl AnimalRepository for DocumentAnimalRepository {
    async fn list_by_category(&self, kind: AnimalType) -> AppResult<Vec<Animal>> {
        let filter = Filter::all().eq("type", u8::from(kind));
        let docs = self.store.find(&self.collection, &filter).await?;
        docs.into_iter().map(from_document).collect()
    }

    async fn get_by_id(&self, id: &str) -> AppResult<Animal> {
        let oid = parse_id(id)?;
        match self.store.find_by_id(&self.collection, oid).await? {
            Some(doc) => from_document(doc),
            None => Err(self.not_found(oid)),
        }
    }

    async fn insert(&self, mut animal: Animal) -> AppResult<Animal> {
        animal.id = None;
        animal.image_url.clear();
        let id = self.store.insert(&self.collection, to_document(&animal)?).await?;
        animal.id = Some(id);
        debug!(%id, kind = animal.kind.category(), "animal inserted");
        Ok(animal)
    }

    async fn update(&self, id: &str, animal: Animal) -> AppResult<()> {
        let oid = parse_id(id)?;
        let matched = self.store.replace_by_id(&self.collection, oid, to_document(&animal)?).await?;
        self.matched(oid, matched)
    }

    async fn append_vaccinations(&self, id: &str, vaccinations: Vec<Vaccination>) -> AppResult<()> {
        let oid = parse_id(id)?;
        let update = Update::push_each("vaccinations", vaccination_values(&vaccinations)?);
        let matched = self.store.update_by_id(&self.collection, oid, update).await?;
        self.matched(oid, matched)
    }

    async fn remove_vaccination(&self, id: &str, vaccination: &Vaccination) -> AppResult<()> {
        let oid = parse_id(id)?;
        let update = Update::pull("vaccinations", to_document(vaccination)?);
        let matched = self.store.update_by_id(&self.collection, oid, update).await?;
        self.matched(oid, matched)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let oid = parse_id(id)?;
        let matched = self.store.delete_by_id(&self.collection, oid).await?;
        self.matched(oid, matched)
    }

    async fn set_image_url(&self, id: &str, image_url: &str) -> AppResult<()> {
        let oid = parse_id(id)?;
        let update = Update::set("imageUrl", Value::String(image_url.to_string()));
        let matched = self.store.update_by_id(&self.collection, oid, update).await?;
        self.matched(oid, matched)
    }
}
