//! Drives the real router against the in-memory store and fake object storage.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    auth::JwtKeys,
    db::{NamedKind, NamedRow, Recipe, RecipeFields, User},
    state::{fake::FakeStorage, AppState},
    users::manager::{self, UserExtra},
};

const BOUNDARY: &str = "recipe-api-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub storage: Arc<FakeStorage>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::fake_with_storage(storage.clone());
        let router = build_app(state.clone());
        Self {
            state,
            storage,
            router,
        }
    }

    /// Creates an active user named "Test User" and signs a token for them.
    pub async fn user(&self, email: &str, password: &str) -> (User, String) {
        let extra = UserExtra {
            name: "Test User".into(),
            ..UserExtra::default()
        };
        let user = manager::create_user(self.state.store.as_ref(), email, password, extra)
            .await
            .unwrap();
        let token = JwtKeys::from_ref(&self.state).sign(user.id).unwrap();
        (user, token)
    }

    pub async fn named(&self, kind: NamedKind, owner: Uuid, name: &str) -> NamedRow {
        self.state
            .store
            .insert_named(kind, owner, name)
            .await
            .unwrap()
    }

    pub async fn recipe(&self, owner: Uuid, fields: RecipeFields) -> Recipe {
        self.state.store.insert_recipe(owner, fields).await.unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(json) => Body::from(json.to_string()),
            None => Body::empty(),
        };
        self.dispatch(method, uri, token, "application/json", body)
            .await
    }

    /// Sends `raw` as-is with a JSON content type.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        raw: &str,
    ) -> (StatusCode, Value) {
        self.dispatch(method, uri, token, "application/json", Body::from(raw.to_string()))
            .await
    }

    /// POSTs a single-part multipart form.
    pub async fn send_multipart(
        &self,
        uri: &str,
        token: &str,
        field: &str,
        file_name: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
        self.dispatch(Method::POST, uri, Some(token), &content_type, Body::from(body))
            .await
    }

    async fn dispatch(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        content_type: &str,
        body: Body,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let res = self
            .router
            .clone()
            .oneshot(req.body(body).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }
}
