use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    IngredientDto, RecipeDetailDto, RecipeDto, RecipeImageDto, RecipeRepr, RecipeRequest, TagDto,
};
use crate::{
    auth::AuthUser,
    db::{NamedKind, Recipe, RecipeFields, Store},
    error::{AppError, FieldErrors},
    extract::Payload,
    images,
    state::AppState,
    validation,
};

pub const NO_FILE: &str = "No file was submitted.";
pub const EMPTY_FILE: &str = "The submitted file is empty.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

pub fn recipe_routes(upload_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/recipe/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipe/recipes/:id",
            get(retrieve_recipe)
                .put(update_recipe)
                .patch(partial_update_recipe),
        )
        .route(
            "/recipe/recipes/:id/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
}

/// What the caller asked for. Decides which representation the response uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeAction {
    List,
    Create,
    Retrieve,
    Update,
    PartialUpdate,
    UploadImage,
}

/// Retrieve gets nested tags and ingredients, upload gets `{id, image}`, the
/// rest get id lists.
pub async fn render(
    store: &dyn Store,
    owner: Uuid,
    action: RecipeAction,
    recipe: &Recipe,
) -> Result<RecipeRepr, AppError> {
    debug_assert_eq!(recipe.user_id, owner, "rendering someone else's recipe");
    let repr = match action {
        RecipeAction::Retrieve => {
            let tags = store
                .find_named(NamedKind::Tag, owner, &recipe.tag_ids)
                .await?;
            let ingredients = store
                .find_named(NamedKind::Ingredient, owner, &recipe.ingredient_ids)
                .await?;
            RecipeRepr::Detail(RecipeDetailDto {
                id: recipe.id,
                title: recipe.title.clone(),
                time_minutes: recipe.time_minutes,
                price: recipe.price,
                link: recipe.link.clone(),
                tags: tags.into_iter().map(TagDto::from).collect(),
                ingredients: ingredients.into_iter().map(IngredientDto::from).collect(),
            })
        }
        RecipeAction::UploadImage => RecipeRepr::Image(RecipeImageDto {
            id: recipe.id,
            image: recipe.image.clone(),
        }),
        RecipeAction::List
        | RecipeAction::Create
        | RecipeAction::Update
        | RecipeAction::PartialUpdate => RecipeRepr::Write(RecipeDto::from(recipe)),
    };
    Ok(repr)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Replace,
    Partial,
}

/// Validates a write body into a full field set. `Partial` falls back to
/// `current` for every omitted key; `Create` and `Replace` treat omitted
/// relations and link as empty.
async fn resolve_fields(
    store: &dyn Store,
    owner: Uuid,
    mode: WriteMode,
    req: RecipeRequest,
    current: Option<RecipeFields>,
) -> Result<RecipeFields, AppError> {
    let keep = match mode {
        WriteMode::Partial => current,
        WriteMode::Create | WriteMode::Replace => None,
    };
    let keep = keep.as_ref();
    let mut errors = FieldErrors::new();

    let title = match (keep, req.title.as_ref()) {
        (Some(k), None) => Some(k.title.clone()),
        (_, title) => validation::text(&mut errors, "title", title),
    };
    let time_minutes = match (keep, req.time_minutes.as_ref()) {
        (Some(k), None) => Some(k.time_minutes),
        (_, value) => validation::minutes(&mut errors, "time_minutes", value),
    };
    let price = match (keep, req.price.as_ref()) {
        (Some(k), None) => Some(k.price),
        (_, value) => validation::price(&mut errors, "price", value),
    };
    let link = match (keep, req.link.as_ref()) {
        (Some(k), None) => k.link.clone(),
        (_, value) => validation::optional_link(&mut errors, "link", value),
    };
    let tag_ids = match (keep, req.tags.as_ref()) {
        (Some(k), None) => Some(k.tag_ids.clone()),
        (_, None) => Some(Vec::new()),
        (_, Some(raw)) => match validation::list(&mut errors, "tags", raw) {
            Some(items) => {
                resolve_ids(store, owner, NamedKind::Tag, "tags", items, &mut errors).await?
            }
            None => None,
        },
    };
    let ingredient_ids = match (keep, req.ingredients.as_ref()) {
        (Some(k), None) => Some(k.ingredient_ids.clone()),
        (_, None) => Some(Vec::new()),
        (_, Some(raw)) => match validation::list(&mut errors, "ingredients", raw) {
            Some(items) => {
                resolve_ids(store, owner, NamedKind::Ingredient, "ingredients", items, &mut errors)
                    .await?
            }
            None => None,
        },
    };

    let (Some(title), Some(time_minutes), Some(price), Some(tag_ids), Some(ingredient_ids)) =
        (title, time_minutes, price, tag_ids, ingredient_ids)
    else {
        return Err(AppError::Validation(errors));
    };
    errors.into_result()?;

    Ok(RecipeFields {
        title,
        time_minutes,
        price,
        link,
        tag_ids,
        ingredient_ids,
    })
}

/// Turns submitted relation ids into the caller's own rows. Ids that are not
/// the caller's are reported exactly like ids that do not exist.
async fn resolve_ids(
    store: &dyn Store,
    owner: Uuid,
    kind: NamedKind,
    field: &str,
    raw: &[Value],
    errors: &mut FieldErrors,
) -> Result<Option<Vec<Uuid>>, AppError> {
    let mut ids = Vec::with_capacity(raw.len());
    let mut ok = true;
    for value in raw {
        let parsed = match value {
            Value::String(s) => match Uuid::parse_str(s.trim()) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add(field, does_not_exist(s));
                    None
                }
            },
            other => {
                errors.add(
                    field,
                    format!(
                        "Incorrect type. Expected pk value, received {}.",
                        validation::json_type(other)
                    ),
                );
                None
            }
        };
        match parsed {
            Some(id) if !ids.contains(&id) => ids.push(id),
            Some(_) => {}
            None => ok = false,
        }
    }

    let found = store.find_named(kind, owner, &ids).await?;
    for id in &ids {
        if !found.iter().any(|row| row.id == *id && row.user_id == owner) {
            errors.add(field, does_not_exist(id));
            ok = false;
        }
    }

    Ok(ok.then_some(ids))
}

fn does_not_exist(pk: impl std::fmt::Display) -> String {
    format!("Invalid pk \"{pk}\" - object does not exist.")
}

fn not_found() -> AppError {
    AppError::NotFound("Not found.".into())
}

/// Malformed ids cannot name a recipe, so they 404 like foreign ones.
fn recipe_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| not_found())
}

async fn owned_recipe(state: &AppState, owner: Uuid, raw_id: &str) -> Result<Recipe, AppError> {
    let id = recipe_id(raw_id)?;
    state
        .store
        .find_recipe(owner, id)
        .await?
        .ok_or_else(not_found)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<RecipeRepr>>, AppError> {
    let recipes = state.store.list_recipes(user.id).await?;
    let mut out = Vec::with_capacity(recipes.len());
    for recipe in &recipes {
        out.push(render(state.store.as_ref(), user.id, RecipeAction::List, recipe).await?);
    }
    Ok(Json(out))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(payload): Payload<RecipeRequest>,
) -> Result<(StatusCode, Json<RecipeRepr>), AppError> {
    let store = state.store.as_ref();
    let fields = resolve_fields(store, user.id, WriteMode::Create, payload, None).await?;
    let recipe = store.insert_recipe(user.id, fields).await?;
    info!(recipe_id = %recipe.id, "recipe created");

    let repr = render(store, user.id, RecipeAction::Create, &recipe).await?;
    Ok((StatusCode::CREATED, Json(repr)))
}

#[instrument(skip_all, fields(user_id = %user.id, recipe_id = %id))]
pub async fn retrieve_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RecipeRepr>, AppError> {
    let recipe = owned_recipe(&state, user.id, &id).await?;
    let repr = render(state.store.as_ref(), user.id, RecipeAction::Retrieve, &recipe).await?;
    Ok(Json(repr))
}

#[instrument(skip_all, fields(user_id = %user.id, recipe_id = %id))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Payload(payload): Payload<RecipeRequest>,
) -> Result<Json<RecipeRepr>, AppError> {
    write_existing(&state, user.id, &id, WriteMode::Replace, payload).await
}

#[instrument(skip_all, fields(user_id = %user.id, recipe_id = %id))]
pub async fn partial_update_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Payload(payload): Payload<RecipeRequest>,
) -> Result<Json<RecipeRepr>, AppError> {
    write_existing(&state, user.id, &id, WriteMode::Partial, payload).await
}

async fn write_existing(
    state: &AppState,
    owner: Uuid,
    raw_id: &str,
    mode: WriteMode,
    payload: RecipeRequest,
) -> Result<Json<RecipeRepr>, AppError> {
    let store = state.store.as_ref();
    let current = owned_recipe(state, owner, raw_id).await?;
    let fields = resolve_fields(store, owner, mode, payload, Some(current.fields())).await?;
    let recipe = store
        .update_recipe(owner, current.id, fields)
        .await?
        .ok_or_else(not_found)?;
    info!(recipe_id = %recipe.id, ?mode, "recipe updated");

    let action = match mode {
        WriteMode::Partial => RecipeAction::PartialUpdate,
        WriteMode::Create | WriteMode::Replace => RecipeAction::Update,
    };
    Ok(Json(render(store, owner, action, &recipe).await?))
}

struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

/// Keeps 413 for bodies over the upload limit; everything else is a 400.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// First multipart part named `image`, if any.
async fn read_image_field(mut mp: Multipart) -> Result<Option<Upload>, AppError> {
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok(Some(Upload {
            file_name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

/// POST /recipe/recipes/:id/upload-image (multipart, field `image`)
#[instrument(skip_all, fields(user_id = %user.id, recipe_id = %id))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecipeRepr>, AppError> {
    let recipe = owned_recipe(&state, user.id, &id).await?;
    let mp = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let Some(upload) = read_image_field(mp).await? else {
        return Err(AppError::Validation(FieldErrors::single("image", NO_FILE)));
    };
    if upload.data.is_empty() {
        return Err(AppError::Validation(FieldErrors::single("image", EMPTY_FILE)));
    }
    let Some(format) = images::detect_image(&upload.data) else {
        warn!(size = upload.data.len(), "rejected non-image upload");
        return Err(AppError::Validation(FieldErrors::single("image", INVALID_IMAGE)));
    };

    let key = images::recipe_image_key(upload.file_name.as_deref(), format);
    let content_type = upload
        .content_type
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or_else(|| format.to_mime_type().to_string());
    state
        .storage
        .put_object(&key, upload.data, &content_type)
        .await?;

    let Some(updated) = state
        .store
        .set_recipe_image(user.id, recipe.id, Some(&key))
        .await?
    else {
        // recipe vanished between the lookup and the write
        if let Err(e) = state.storage.delete_object(&key).await {
            warn!(error = %e, %key, "failed to remove orphaned image");
        }
        return Err(not_found());
    };
    info!(%key, "recipe image stored");

    if let Some(old) = recipe.image.as_deref().filter(|old| *old != key) {
        if let Err(e) = state.storage.delete_object(old).await {
            warn!(error = %e, key = %old, "failed to remove previous image");
        }
    }

    let repr = render(state.store.as_ref(), user.id, RecipeAction::UploadImage, &updated).await?;
    Ok(Json(repr))
}
