//! End-to-end pipeline tests
//!
//! These tests drive full HTTP requests through the adapter — envelope
//! parsing, routing, middleware, schema validation and codec negotiation —
//! without a listener, using in-memory request bodies.

use bytes::Bytes;
use duck_rpc::prelude::*;
use duck_rpc::{codec, ResponseFormat};
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use serde::Deserialize;
use serde_json::{json, Value};

// =============================================================================
// Test Context and Router
// =============================================================================

#[derive(Clone)]
struct TestContext {
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelloInput {
    name: String,
}

async fn require_user(ctx: TestContext, next: Next<TestContext>) -> MiddlewareResult {
    if ctx.user.is_none() {
        return Err(RpcError::unauthorized("Missing user"));
    }
    next.run(ctx).await
}

fn test_router() -> Router<TestContext> {
    let hello = ProcedureBuilder::new()
        .input(object().field("name", string()))
        .query(|_ctx: TestContext, input: HelloInput| async move {
            Envelope::ok(json!({ "greeting": format!("Hello {}", input.name) }))
        });

    let profile = ProcedureBuilder::new().query(|_ctx: TestContext, _input: Value| async move {
        Envelope::ok(json!({ "name": "John" }))
    });

    let whoami = ProcedureBuilder::new()
        .use_middleware(require_user)
        .query(|ctx: TestContext, _input: Value| async move {
            Envelope::ok(json!({ "user": ctx.user }))
        });

    let rename = ProcedureBuilder::new()
        .input(object().field("name", string()))
        .mutation(|_ctx: TestContext, input: HelloInput| async move {
            Envelope::ok_with(json!({ "renamed": input.name }), RpcCode::Created)
        });

    let explode = ProcedureBuilder::new()
        .query(|_ctx: TestContext, _input: Value| async move { panic!("resolver blew up") });

    Router::builder()
        .procedure("hello", hello)
        .procedure("whoami", whoami)
        .procedure("rename", rename)
        .procedure("explode", explode)
        .nest(
            "user",
            Router::builder().procedure("profile", profile).build(),
        )
        .build()
}

fn test_service() -> RpcService<TestContext> {
    RpcService::builder(test_router(), |parts| async move {
        let user = parts
            .headers
            .get("x-user")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        Ok(TestContext { user })
    })
    .build()
    .expect("valid config")
}

fn post(uri: &str, body: Value) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(
            serde_json::to_vec(&body).expect("body"),
        )))
        .expect("request")
}

async fn read_json(response: Response<Full<Bytes>>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = serde_json::from_slice(&bytes).expect("json body");
    (status, body)
}

// =============================================================================
// End-to-End Scenarios
// =============================================================================

#[tokio::test]
async fn test_happy_query() {
    let service = test_service();
    let request = post("/rpc/hello", json!({"type": "query", "input": {"name": "World"}}));
    let (status, body) = read_json(service.handle(request).await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"ok": true, "data": {"greeting": "Hello World"}, "code": "RPC_OK"})
    );
}

#[tokio::test]
async fn test_validation_failure_reports_issue_path() {
    let service = test_service();
    let request = post("/rpc/hello", json!({"type": "query", "input": {"name": 123}}));
    let (status, body) = read_json(service.handle(request).await).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["code"], json!("RPC_BAD_REQUEST"));
    assert_eq!(body["error"]["message"], json!("Validation failed"));
    assert_eq!(body["error"]["issues"][0]["path"], json!(["name"]));
}

#[tokio::test]
async fn test_nested_lookup() {
    let service = test_service();
    let request = post("/rpc/user.profile", json!({"type": "query", "input": {}}));
    let (status, body) = read_json(service.handle(request).await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("John"));
}

#[tokio::test]
async fn test_auth_middleware_short_circuit() {
    let service = test_service();

    let request = post("/rpc/whoami", json!({"type": "query", "input": null}));
    let (status, body) = read_json(service.handle(request).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!("RPC_UNAUTHORIZED"));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/rpc/whoami")
        .header(CONTENT_TYPE, "application/json")
        .header("x-user", "alice")
        .body(Full::new(Bytes::from(
            serde_json::to_vec(&json!({"type": "query", "input": null})).unwrap(),
        )))
        .unwrap();
    let (status, body) = read_json(service.handle(request).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"], json!("alice"));
}

#[tokio::test]
async fn test_procedure_type_mismatch() {
    let service = test_service();
    let request = post("/rpc/rename", json!({"type": "query", "input": {"name": "x"}}));
    let (status, body) = read_json(service.handle(request).await).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("RPC_BAD_REQUEST"));
    let message = body["error"]["message"].as_str().expect("message");
    assert!(message.contains("type mismatch"), "message: {}", message);
}

#[tokio::test]
async fn test_cbor_negotiation_on_get() {
    let service = test_service();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/rpc/hello?type=query&input=%7B%22name%22%3A%22X%22%7D")
        .header(ACCEPT, "application/cbor")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = service.handle(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/cbor"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let envelope = codec::decode_envelope(&bytes, ResponseFormat::Cbor).expect("cbor envelope");
    assert_eq!(envelope.code(), RpcCode::Ok);
    let Envelope::Success { data, .. } = envelope else {
        panic!("expected success");
    };
    assert_eq!(data["greeting"], json!("Hello X"));
}

// =============================================================================
// Boundary Behaviors
// =============================================================================

#[tokio::test]
async fn test_unknown_dotted_path_is_404() {
    let service = test_service();
    let request = post("/rpc/user.missing", json!({"type": "query", "input": {}}));
    let (status, body) = read_json(service.handle(request).await).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!("RPC_NOT_FOUND"));
}

#[tokio::test]
async fn test_unsupported_method_is_400() {
    let service = test_service();
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/rpc/hello")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let (status, body) = read_json(service.handle(request).await).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], json!("RPC_BAD_REQUEST"));
}

#[tokio::test]
async fn test_invalid_json_body_names_the_format() {
    let service = test_service();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/rpc/hello")
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from_static(b"{not json")))
        .unwrap();
    let (status, body) = read_json(service.handle(request).await).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"]["message"].as_str().expect("message");
    assert!(message.contains("JSON"), "message: {}", message);
}

#[tokio::test]
async fn test_invalid_cbor_body_names_the_format() {
    let service = test_service();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/rpc/hello")
        .header(CONTENT_TYPE, "application/cbor")
        .body(Full::new(Bytes::from_static(&[0xff, 0x00])))
        .unwrap();
    let response = service.handle(request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let envelope = codec::decode_envelope(&bytes, ResponseFormat::Cbor).expect("cbor envelope");
    let Envelope::Error { error, .. } = envelope else {
        panic!("expected failure");
    };
    assert!(error.message.contains("CBOR"), "message: {}", error.message);
}

#[tokio::test]
async fn test_panicking_resolver_is_500_with_message_preserved() {
    let service = test_service();
    let request = post("/rpc/explode", json!({"type": "query", "input": null}));
    let (status, body) = read_json(service.handle(request).await).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], json!("RPC_INTERNAL_SERVER_ERROR"));
    assert_eq!(body["error"]["message"], json!("resolver blew up"));
}

#[tokio::test]
async fn test_cbor_request_body_round_trip() {
    let service = test_service();
    let mut buffer = Vec::new();
    ciborium_body(&json!({"type": "query", "input": {"name": "Binary"}}), &mut buffer);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/rpc/hello")
        .header(CONTENT_TYPE, "application/cbor")
        .body(Full::new(Bytes::from(buffer)))
        .unwrap();
    let response = service.handle(request).await;

    // CBOR content type also selects the CBOR response format.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/cbor"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let envelope = codec::decode_envelope(&bytes, ResponseFormat::Cbor).expect("cbor envelope");
    let Envelope::Success { data, .. } = envelope else {
        panic!("expected success");
    };
    assert_eq!(data["greeting"], json!("Hello Binary"));
}

#[tokio::test]
async fn test_mutation_reports_created_status() {
    let service = test_service();
    let request = post(
        "/rpc/rename",
        json!({"type": "mutation", "input": {"name": "Duck"}}),
    );
    let (status, body) = read_json(service.handle(request).await).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["code"], json!("RPC_CREATED"));
    assert_eq!(body["data"]["renamed"], json!("Duck"));
}

#[tokio::test]
async fn test_exactly_one_well_formed_response_for_every_request() {
    let service = test_service();
    let requests = vec![
        post("/rpc/hello", json!({"type": "query", "input": {"name": "a"}})),
        post("/rpc/hello", json!({"type": "query", "input": {"name": 1}})),
        post("/rpc/hello", json!({"wrong": "shape"})),
        post("/rpc/nowhere", json!({"type": "query", "input": null})),
        post("/rpc/explode", json!({"type": "query", "input": null})),
    ];
    for request in requests {
        let (_, body) = read_json(service.handle(request).await).await;
        let ok = body["ok"].as_bool().expect("ok flag");
        if ok {
            assert!(body.get("data").is_some());
            assert!(body.get("error").is_none());
        } else {
            assert!(body.get("error").is_some());
            assert!(body.get("data").is_none());
        }
    }
}

fn ciborium_body(value: &Value, buffer: &mut Vec<u8>) {
    ciborium::ser::into_writer(value, buffer).expect("cbor encode");
}
