//! Persistence. Every read and write on tags, ingredients and recipes takes the
//! owning user id; rows owned by anyone else are indistinguishable from missing ones.

#[cfg(test)]
mod memory;
mod models;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[cfg(test)]
pub use memory::MemoryStore;
pub use models::{NamedKind, NamedRow, NewUser, ProfileUpdate, Recipe, RecipeFields, User};
pub use postgres::{connect_with_retry, PgStore};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint on the named column was violated.
    #[error("unique constraint violated on {0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Deduplicated and ascending: the order relation ids are always returned in.
fn sorted_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Writes every mutable column of `user` back.
    async fn update_user(&self, user: &User) -> Result<User, StoreError>;
    /// Writes only the supplied profile columns. `None` if the user is gone.
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<User>, StoreError>;
    /// Deletes the user and everything they own. Returns false if there was no such user.
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Ordered by name, descending.
    async fn list_named(&self, kind: NamedKind, owner: Uuid) -> Result<Vec<NamedRow>, StoreError>;
    async fn insert_named(
        &self,
        kind: NamedKind,
        owner: Uuid,
        name: &str,
    ) -> Result<NamedRow, StoreError>;
    /// Only the rows among `ids` that belong to `owner`, ordered by name descending.
    async fn find_named(
        &self,
        kind: NamedKind,
        owner: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<NamedRow>, StoreError>;

    /// Insertion order.
    async fn list_recipes(&self, owner: Uuid) -> Result<Vec<Recipe>, StoreError>;
    async fn find_recipe(&self, owner: Uuid, id: Uuid) -> Result<Option<Recipe>, StoreError>;
    /// Relation ids come back sorted ascending, here and on every read.
    async fn insert_recipe(&self, owner: Uuid, fields: RecipeFields) -> Result<Recipe, StoreError>;
    async fn update_recipe(
        &self,
        owner: Uuid,
        id: Uuid,
        fields: RecipeFields,
    ) -> Result<Option<Recipe>, StoreError>;
    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: Uuid,
        image: Option<&str>,
    ) -> Result<Option<Recipe>, StoreError>;
}
