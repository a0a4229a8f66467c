//! Repository trait definitions for data access abstraction.
//!
//! Every operation that addresses a single animal takes the identifier as the
//! raw string from the route. A string that does not parse into the store's key
//! type is a client error (`invalid_id`); a well-formed identifier with no
//! document behind it is `not_found`.

use async_trait::async_trait;

use crate::domain::{Animal, AnimalType, Vaccination};
use crate::error::AppResult;

mod animal;
mod user;

pub use animal::{DocumentAnimalRepository, ANIMALS_COLLECTION};
pub use user::{DocumentUserRepository, User, USERS_COLLECTION};

#[async_trait]
pub trait AnimalRepository: Send + Sync {
    /// Every animal of one type, in the store's natural order.
    async fn list_by_category(&self, kind: AnimalType) -> AppResult<Vec<Animal>>;

    async fn get_by_id(&self, id: &str) -> AppResult<Animal>;

    /// Store a new animal and return it with its assigned identifier.
    /// The image pointer is never set here.
    async fn insert(&self, animal: Animal) -> AppResult<Animal>;

    /// Replace the whole stored document. Fields missing from `animal` are lost.
    async fn update(&self, id: &str, animal: Animal) -> AppResult<()>;

    async fn append_vaccinations(&self, id: &str, vaccinations: Vec<Vaccination>) -> AppResult<()>;

    /// Remove every vaccination equal to `vaccination`. No match is not an error.
    async fn remove_vaccination(&self, id: &str, vaccination: &Vaccination) -> AppResult<()>;

    /// Remove the document only; attachment files are the caller's business.
    async fn delete(&self, id: &str) -> AppResult<()>;

    /// Set `imageUrl` alone, leaving every other field untouched.
    async fn set_image_url(&self, id: &str, image_url: &str) -> AppResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, username: &str) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn insert_user(&self, user: User) -> AppResult<()>;
    async fn delete_all_users(&self) -> AppResult<u64>;
}
