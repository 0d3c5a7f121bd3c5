use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string, never rendered
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: OffsetDateTime,
}

/// Everything needed to insert a user; the email is expected to be normalised already.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Columns a user may change on their own profile. `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password_hash: Option<String>,
}

/// The two "owned named resource" tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKind {
    Tag,
    Ingredient,
}

impl NamedKind {
    pub fn table(self) -> &'static str {
        match self {
            NamedKind::Tag => "tags",
            NamedKind::Ingredient => "ingredients",
        }
    }
}

/// Row shape shared by tags and ingredients.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct NamedRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub image: Option<String>,
    /// Sorted ascending, as every store returns them.
    #[sqlx(skip)]
    pub tag_ids: Vec<Uuid>,
    #[sqlx(skip)]
    pub ingredient_ids: Vec<Uuid>,
}

impl Recipe {
    /// The writable part of the recipe, as a starting point for an update.
    pub fn fields(&self) -> RecipeFields {
        RecipeFields {
            title: self.title.clone(),
            time_minutes: self.time_minutes,
            price: self.price,
            link: self.link.clone(),
            tag_ids: self.tag_ids.clone(),
            ingredient_ids: self.ingredient_ids.clone(),
        }
    }
}

/// Full set of writable recipe columns plus relations. Stores replace all of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFields {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tag_ids: Vec<Uuid>,
    pub ingredient_ids: Vec<Uuid>,
}
