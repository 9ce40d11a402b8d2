//! Playground server
//!
//! Routes:
//! - POST /api/register - guarded registration endpoint
//! - GET /health - liveness check

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use precog_core::schema::{FieldRule, Refinement, RuleSchema};
use precog_core::ValidatorAdapter;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::guard::{PrecognitiveHandler, RequestEvent};
use crate::headers::{PRECOGNITIVE, PRECOGNITIVE_KEYS, PRECOGNITIVE_SUCCESS};

/// Registration form schema, shared with the client form
pub fn register_schema() -> RuleSchema {
    RuleSchema::new()
        .field(FieldRule::new("username").string().min_length(3))
        .field(FieldRule::new("email").string().email())
        .field(FieldRule::new("password").string().min_length(8))
        .field(FieldRule::new("passwordConfirmation").string().min_length(8))
        .refine(Refinement::new(
            "passwordConfirmation",
            "Passwords do not match",
            |data| data.get("password") == data.get("passwordConfirmation"),
        ))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn register(event: RequestEvent) -> Response {
    let request: RegisterRequest = match event.json() {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    let user = RegisterResponse {
        id: Uuid::new_v4(),
        username: request.username,
        email: request.email,
        created_at: Utc::now(),
    };
    tracing::info!(user_id = %user.id, username = %user.username, "User registered");

    (StatusCode::CREATED, Json(user)).into_response()
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the playground router
pub fn router(config: &ServerConfig) -> Router {
    let register = PrecognitiveHandler::new(register)
        .with_body_limit(config.body_limit)
        .validate_json(ValidatorAdapter::from_schema(register_schema()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([PRECOGNITIVE, PRECOGNITIVE_KEYS, PRECOGNITIVE_SUCCESS]);

    Router::new()
        .route("/api/register", post(register.into_handler()))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
