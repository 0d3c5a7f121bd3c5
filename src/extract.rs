use axum::extract::FromRequest;

use crate::error::AppError;

/// `axum::Json`, but malformed bodies come back as a 400 `AppError`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Payload<T>(pub T);
