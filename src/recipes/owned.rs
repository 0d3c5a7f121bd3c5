//! Tags and ingredients: two distinct resource types that share one
//! owner-scoped list/create implementation.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::{info, instrument};

use super::dto::{IngredientDto, NamedRequest, TagDto};
use crate::{
    auth::AuthUser,
    db::{NamedKind, NamedRow},
    error::{AppError, FieldErrors},
    extract::Payload,
    state::AppState,
    validation,
};

/// A user-owned resource that is nothing but a name.
pub trait OwnedNamed: Serialize + From<NamedRow> + Send + Sync + 'static {
    const KIND: NamedKind;
}

impl OwnedNamed for TagDto {
    const KIND: NamedKind = NamedKind::Tag;
}

impl OwnedNamed for IngredientDto {
    const KIND: NamedKind = NamedKind::Ingredient;
}

pub fn routes<T: OwnedNamed>(path: &str) -> Router<AppState> {
    Router::new().route(path, get(list_owned::<T>).post(create_owned::<T>))
}

#[instrument(skip_all, fields(kind = ?T::KIND, user_id = %user.id))]
pub async fn list_owned<T: OwnedNamed>(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<T>>, AppError> {
    let rows = state.store.list_named(T::KIND, user.id).await?;
    Ok(Json(rows.into_iter().map(T::from).collect()))
}

#[instrument(skip_all, fields(kind = ?T::KIND, user_id = %user.id))]
pub async fn create_owned<T: OwnedNamed>(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(payload): Payload<NamedRequest>,
) -> Result<(StatusCode, Json<T>), AppError> {
    let mut errors = FieldErrors::new();
    let Some(name) = validation::text(&mut errors, "name", payload.name.as_ref()) else {
        return Err(AppError::Validation(errors));
    };

    let row = state.store.insert_named(T::KIND, user.id, &name).await?;
    info!(id = %row.id, "created");
    Ok((StatusCode::CREATED, Json(T::from(row))))
}
