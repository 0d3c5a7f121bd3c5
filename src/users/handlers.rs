use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{CreateUserRequest, PublicUser, TokenRequest, TokenResponse, UpdateUserRequest},
    manager::{self, UserExtra},
};
use crate::{
    auth::{password::hash_password, AuthUser, JwtKeys},
    db::ProfileUpdate,
    error::{AppError, FieldErrors, NON_FIELD_ERRORS},
    extract::Payload,
    state::AppState,
    validation,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/create", post(create_user))
        .route("/user/token", post(create_token))
        .route("/user/me", get(get_me).patch(update_me))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Payload(payload): Payload<CreateUserRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AppError> {
    let mut errors = FieldErrors::new();
    let email = validation::email(&mut errors, "email", payload.email.as_ref());
    let password = validation::password(&mut errors, "password", payload.password.as_ref());
    let name = validation::text(&mut errors, "name", payload.name.as_ref());
    let (Some(email), Some(password), Some(name)) = (email, password, name) else {
        return Err(AppError::Validation(errors));
    };

    let extra = UserExtra {
        name,
        ..UserExtra::default()
    };
    let user = manager::create_user(state.store.as_ref(), &email, &password, extra).await?;
    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

#[instrument(skip(state, payload))]
pub async fn create_token(
    State(state): State<AppState>,
    Payload(payload): Payload<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let mut errors = FieldErrors::new();
    let email = validation::text(&mut errors, "email", payload.email.as_ref());
    let password = match validation::string(&mut errors, "password", payload.password.as_ref()) {
        Some("") => {
            errors.add("password", validation::BLANK);
            None
        }
        other => other,
    };
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::Validation(errors));
    };

    let Some(user) = manager::authenticate(state.store.as_ref(), &email, password).await? else {
        return Err(AppError::Validation(FieldErrors::single(
            NON_FIELD_ERRORS,
            "Unable to authenticate with provided credentials.",
        )));
    };

    let token = JwtKeys::from_ref(&state).sign(user.id)?;
    info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(PublicUser::from(&user))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Payload(payload): Payload<UpdateUserRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let mut errors = FieldErrors::new();
    let email = payload
        .email
        .as_ref()
        .and_then(|e| validation::email(&mut errors, "email", Some(e)));
    let name = payload
        .name
        .as_ref()
        .and_then(|n| validation::text(&mut errors, "name", Some(n)));
    let password = payload
        .password
        .as_ref()
        .and_then(|p| validation::password(&mut errors, "password", Some(p)));
    errors.into_result()?;

    let update = ProfileUpdate {
        email: email.as_deref().map(manager::normalize_email),
        name,
        password_hash: password.as_deref().map(hash_password).transpose()?,
    };
    let Some(user) = state
        .store
        .update_profile(user.id, update)
        .await
        .map_err(manager::conflict_to_field)?
    else {
        return Err(AppError::Unauthorized("User inactive or deleted.".into()));
    };
    info!(user_id = %user.id, "profile updated");
    Ok(Json(PublicUser::from(&user)))
}
