mod dto;
pub mod handlers;
pub mod owned;

use axum::Router;

use self::dto::{IngredientDto, TagDto};
use crate::state::AppState;

pub fn router(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .merge(owned::routes::<TagDto>("/recipe/tags"))
        .merge(owned::routes::<IngredientDto>("/recipe/ingredients"))
        .merge(handlers::recipe_routes(upload_limit))
}
