//! Router-level tests for the precognitive guard and the playground

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use http_body_util::BodyExt;
use precog_core::schema::{FieldRule, RuleSchema};
use precog_core::{Issue, JsonSchema, ValidatorAdapter};
use precog_server::{
    playground, FailureBody, HookError, PrecognitiveHandler, RequestEvent, ServerConfig,
    PRECOGNITIVE, PRECOGNITIVE_KEYS, PRECOGNITIVE_SUCCESS,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

fn person_schema() -> RuleSchema {
    RuleSchema::new()
        .field(FieldRule::new("name").string().min_length(3))
        .field(FieldRule::new("age").number().min(18.0))
        .field(FieldRule::new("email").optional().string().email())
        .field(FieldRule::new("hobbies").optional().array())
        .field(FieldRule::new("hobbies.*").string())
}

fn failing_person() -> Value {
    json!({
        "name": "Jo",
        "age": 10,
        "email": "jo@example.com",
        "hobbies": ["chess", "climbing", "cooking"],
    })
}

fn person_router(calls: Arc<AtomicUsize>) -> Router {
    let guard = PrecognitiveHandler::new(move |event: RequestEvent| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            let person: Value = event.json().unwrap_or_default();
            (StatusCode::OK, axum::Json(person))
        }
    })
    .validate_json(ValidatorAdapter::from_schema(person_schema()));

    Router::new().route("/people", post(guard.into_handler()))
}

fn request(uri: &str, body: &Value, precognitive: bool, keys: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if precognitive {
        builder = builder.header("Precognitive", "true");
    }
    if let Some(keys) = keys {
        builder = builder.header("Precognitive-Keys", keys);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn failure_body(response: Response) -> FailureBody {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_plain_request_gets_every_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let response = person_router(Arc::clone(&calls))
        .oneshot(request("/people", &failing_person(), false, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert!(!response.headers().contains_key(PRECOGNITIVE));

    let body = failure_body(response).await;
    assert_eq!(body.error, "String must contain at least 3 character(s)");
    assert_eq!(body.errors.keys().collect::<Vec<_>>(), vec!["name", "age"]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_precognitive_without_keys_fails_everything() {
    let calls = Arc::new(AtomicUsize::new(0));
    let response = person_router(Arc::clone(&calls))
        .oneshot(request("/people", &failing_person(), true, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()[PRECOGNITIVE], "true");
    assert_eq!(response.headers()[PRECOGNITIVE_SUCCESS], "false");

    let body = failure_body(response).await;
    assert_eq!(body.errors.len(), 2);
}

#[tokio::test]
async fn test_precognitive_keys_scope_the_errors() {
    let calls = Arc::new(AtomicUsize::new(0));
    let response = person_router(Arc::clone(&calls))
        .oneshot(request("/people", &failing_person(), true, Some("name")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()[PRECOGNITIVE_SUCCESS], "false");
    assert_eq!(response.headers()[PRECOGNITIVE_KEYS], "name");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let body = failure_body(response).await;
    assert!(body.errors.contains_key("name"));
    assert!(!body.errors.contains_key("age"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_precognitive_keys_that_passed_short_circuit() {
    for keys in ["email", "hobbies.1", "email,hobbies.2"] {
        let calls = Arc::new(AtomicUsize::new(0));
        let response = person_router(Arc::clone(&calls))
            .oneshot(request("/people", &failing_person(), true, Some(keys)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT, "keys = {keys}");
        assert_eq!(response.headers()[PRECOGNITIVE], "true");
        assert_eq!(response.headers()[PRECOGNITIVE_SUCCESS], "true");
        assert_eq!(response.headers()[PRECOGNITIVE_KEYS], keys);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "handler ran for keys = {keys}");
    }
}

#[tokio::test]
async fn test_valid_request_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let person = json!({ "name": "Joanna", "age": 30 });
    let response = person_router(Arc::clone(&calls))
        .oneshot(request("/people", &person, false, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let echoed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(echoed, person);
}

#[tokio::test]
async fn test_valid_precognitive_request_skips_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let person = json!({ "name": "Joanna", "age": 30 });
    let response = person_router(Arc::clone(&calls))
        .oneshot(request("/people", &person, true, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[PRECOGNITIVE_SUCCESS], "true");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_required_property_fails_its_key() {
    let schema = JsonSchema::compile(&json!({
        "type": "object",
        "properties": { "age": { "type": "number", "minimum": 18 } },
        "required": ["age"]
    }))
    .unwrap();
    let guard = PrecognitiveHandler::new(|_event: RequestEvent| async { StatusCode::OK })
        .validate_json(ValidatorAdapter::from_schema(schema));
    let router = Router::new().route("/people", post(guard.into_handler()));

    let response = router
        .clone()
        .oneshot(request("/people", &json!({}), true, Some("age")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()[PRECOGNITIVE_SUCCESS], "false");
    let body = failure_body(response).await;
    assert_eq!(body.errors.keys().collect::<Vec<_>>(), vec!["age"]);

    let response = router
        .oneshot(request("/people", &json!({}), false, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = failure_body(response).await;
    assert!(body.errors.contains_key("age"));
    assert!(!body.errors.contains_key(""));
}

#[tokio::test]
async fn test_comma_only_keys_validate_everything() {
    let calls = Arc::new(AtomicUsize::new(0));
    let response = person_router(Arc::clone(&calls))
        .oneshot(request("/people", &failing_person(), true, Some(",")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()[PRECOGNITIVE_SUCCESS], "false");
    let body = failure_body(response).await;
    assert_eq!(body.errors.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let router = person_router(Arc::new(AtomicUsize::new(0)));
    let request = Request::builder()
        .method("POST")
        .uri("/people")
        .body(Body::from("{not json"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_hooks_run_in_order_and_rejections_pass_through() {
    let guard = PrecognitiveHandler::new(|_event: RequestEvent| async { StatusCode::OK })
        .on_request(|event: &mut RequestEvent| {
            if event.headers().contains_key("x-blocked") {
                return Err(HookError::reject(StatusCode::FORBIDDEN));
            }
            Ok(())
        })
        .on_request(|_event: &mut RequestEvent| -> Result<(), HookError> {
            Err(HookError::Validation(vec![Issue::at("token", "Required")]))
        })
        .on_before_response(|response: &mut Response| {
            response
                .headers_mut()
                .insert("x-guarded", axum::http::HeaderValue::from_static("yes"));
        });
    let router = Router::new().route("/", post(guard.into_handler()));

    let blocked = Request::builder()
        .method("POST")
        .uri("/")
        .header("x-blocked", "1")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(blocked).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .clone()
        .oneshot(request("/", &json!({}), false, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!response.headers().contains_key("x-guarded"));

    let response = router
        .oneshot(request("/", &json!({}), true, Some("other")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()["x-guarded"], "yes");
}

#[tokio::test]
async fn test_playground_register() {
    let router = playground::router(&ServerConfig::default());
    let user = json!({
        "username": "ada",
        "email": "ada@example.com",
        "password": "hunter22",
        "passwordConfirmation": "hunter22",
    });

    let response = router
        .clone()
        .oneshot(request("/api/register", &user, false, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let created: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(created["username"], "ada");

    let mismatched = json!({
        "username": "ada",
        "email": "ada@example.com",
        "password": "hunter22",
        "passwordConfirmation": "hunter23",
    });
    let response = router
        .clone()
        .oneshot(request("/api/register", &mismatched, true, Some("passwordConfirmation")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = failure_body(response).await;
    assert_eq!(body.error, "Passwords do not match");

    let partial = json!({ "username": "ad" });
    let response = router
        .oneshot(request("/api/register", &partial, true, Some("email")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = failure_body(response).await;
    assert_eq!(body.errors.keys().collect::<Vec<_>>(), vec!["email"]);
}

#[tokio::test]
async fn test_playground_health() {
    let response = playground::router(&ServerConfig::default())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rejected_response_from_handler_error_type() {
    let response = precog_server::ServerError::BadRequest("nope".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
