//! Account creation and credential checks.

use tracing::{info, warn};

use crate::{
    auth::password::{hash_password, verify_password},
    db::{NewUser, Store, StoreError, User},
    error::{AppError, FieldErrors},
};

pub const DUPLICATE_EMAIL: &str = "user with this email already exists.";

/// Optional attributes for [`create_user`].
#[derive(Debug, Clone, Default)]
pub struct UserExtra {
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Trims the address and lower-cases its domain part. The local part is kept as is.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub fn conflict_to_field(err: StoreError) -> AppError {
    match err {
        StoreError::Conflict(field) => AppError::Validation(FieldErrors::single(
            field,
            if field == "email" {
                DUPLICATE_EMAIL.to_string()
            } else {
                format!("{field} must be unique.")
            },
        )),
        other => AppError::Store(other),
    }
}

pub async fn create_user(
    store: &dyn Store,
    email: &str,
    password: &str,
    extra: UserExtra,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::Validation(FieldErrors::single(
            "email",
            "Users must have an email address.",
        )));
    }

    let password_hash = hash_password(password)?;
    let user = store
        .insert_user(NewUser {
            email,
            name: extra.name,
            password_hash,
            is_staff: extra.is_staff,
            is_superuser: extra.is_superuser,
        })
        .await
        .map_err(conflict_to_field)?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn create_superuser(
    store: &dyn Store,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let mut user = create_user(store, email, password, UserExtra::default()).await?;
    user.is_staff = true;
    user.is_superuser = true;
    let user = store.update_user(&user).await?;
    info!(user_id = %user.id, "user promoted to superuser");
    Ok(user)
}

/// `Ok(None)` for an unknown email, an inactive account or a wrong password.
pub async fn authenticate(
    store: &dyn Store,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let email = normalize_email(email);
    let Some(user) = store.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Ok(None);
    };
    if !user.is_active {
        warn!(user_id = %user.id, "login inactive user");
        return Ok(None);
    }
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Ok(None);
    }
    Ok(Some(user))
}
