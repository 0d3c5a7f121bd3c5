use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{db::User, validation};

/// Request body for account creation. Fields are untyped so that a wrong type
/// is reported against its field.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default, deserialize_with = "validation::present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub password: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub name: Option<Value>,
}

/// Request body for a profile update; every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default, deserialize_with = "validation::present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub password: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub name: Option<Value>,
}

/// Request body for exchanging credentials for a token.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default, deserialize_with = "validation::present")]
    pub email: Option<Value>,
    #[serde(default, deserialize_with = "validation::present")]
    pub password: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Public part of the user returned to the client. Never carries the password.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PublicUser {
    pub email: String,
    pub name: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}
