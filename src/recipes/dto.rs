use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::{NamedRow, Recipe},
    validation,
};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TagDto {
    pub id: Uuid,
    pub name: String,
}

impl From<NamedRow> for TagDto {
    fn from(row: NamedRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngredientDto {
    pub id: Uuid,
    pub name: String,
}

impl From<NamedRow> for IngredientDto {
    fn from(row: NamedRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

/// Create body for tags and ingredients. Anything besides `name` is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct NamedRequest {
    #[serde(default, deserialize_with = "validation::present")]
    pub name: Option<Value>,
}

/// Create/update body for recipes. Every field stays untyped here so that bad
/// values become field errors instead of a rejected body; `None` means the key
/// was absent, `Some(Value::Null)` an explicit null.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeRequest {
    #[serde(default, deserialize_with = "validation::present")]
    pub title: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub time_minutes: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub price: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub link: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub tags: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub ingredients: Option<Value>,
}

/// Recipe with relations as id lists; used for list, create and update.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeDto {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
}

impl From<&Recipe> for RecipeDto {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title.clone(),
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link.clone(),
            tags: recipe.tag_ids.clone(),
            ingredients: recipe.ingredient_ids.clone(),
        }
    }
}

/// Recipe with relations nested as `{id, name}` objects; used for retrieve.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecipeDetailDto {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tags: Vec<TagDto>,
    pub ingredients: Vec<IngredientDto>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecipeImageDto {
    pub id: Uuid,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RecipeRepr {
    Write(RecipeDto),
    Detail(RecipeDetailDto),
    Image(RecipeImageDto),
}
