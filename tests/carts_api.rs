use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use sockshop_carts::{
    routes::create_app,
    state::AppState,
    store::{Backend, InMemoryCartRepository},
};
use tower::ServiceExt;

fn app() -> Router {
    create_app(AppState::new(
        Arc::new(InMemoryCartRepository::new()),
        Backend::Memory,
    ))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&body).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn get_cart_creates_an_empty_cart() {
    let app = app();

    let (status, body) = send(&app, "GET", "/carts/alice", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["customerId"], "alice");
    assert_eq!(body["data"]["items"], json!([]));
}

#[tokio::test]
async fn adding_the_same_item_twice_increments_quantity() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/carts/alice/items",
        Some(json!({ "itemId": "sku1", "quantity": 2, "unitPrice": 12.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["quantity"], 2);

    let (_, body) = send(
        &app,
        "POST",
        "/carts/alice/items",
        Some(json!({ "itemId": "sku1", "quantity": 3, "unitPrice": 12.5 })),
    )
    .await;
    assert_eq!(body["data"]["quantity"], 5);

    let (status, body) = send(&app, "GET", "/carts/alice/items/sku1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], 5);
    assert_eq!(body["data"]["unitPrice"], 12.5);
}

#[tokio::test]
async fn patch_replaces_quantity() {
    let app = app();
    send(
        &app,
        "POST",
        "/carts/alice/items",
        Some(json!({ "itemId": "sku1", "quantity": 4 })),
    )
    .await;

    let (status, body) = send(
        &app,
        "PATCH",
        "/carts/alice/items",
        Some(json!({ "itemId": "sku1", "quantity": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["quantity"], 1);
}

#[tokio::test]
async fn zero_quantity_is_rejected() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/carts/alice/items",
        Some(json!({ "itemId": "sku1", "quantity": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["error"].as_str().unwrap().contains("quantity"));
}

#[tokio::test]
async fn quantity_past_i32_max_is_rejected() {
    let app = app();
    let item = json!({ "itemId": "sku1", "quantity": i32::MAX });

    let (status, _) = send(&app, "POST", "/carts/alice/items", Some(item.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", "/carts/alice/items", Some(item)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["error"].as_str().unwrap().contains("sku1"));

    let (_, body) = send(&app, "GET", "/carts/alice/items/sku1", None).await;
    assert_eq!(body["data"]["quantity"], i32::MAX);
}

#[tokio::test]
async fn overflowing_merge_is_rejected() {
    let app = app();
    send(
        &app,
        "POST",
        "/carts/bob/items",
        Some(json!({ "itemId": "sku1", "quantity": i32::MAX })),
    )
    .await;
    send(
        &app,
        "POST",
        "/carts/session1/items",
        Some(json!({ "itemId": "sku1", "quantity": 1 })),
    )
    .await;

    let (status, _) = send(&app, "GET", "/carts/bob/merge?sessionId=session1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/carts/session1/items", None).await;
    assert_eq!(body["meta"]["total"], 1);
}

#[tokio::test]
async fn malformed_item_body_gets_the_error_envelope() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/carts/alice/items",
        Some(json!({ "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"]["error"].as_str().unwrap().contains("itemId"));

    let (status, body) = send(
        &app,
        "PATCH",
        "/carts/alice/items",
        Some(json!({ "itemId": "sku1", "quantity": "many" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Bad Request"));
}

#[tokio::test]
async fn item_listing_and_deletion() {
    let app = app();
    for id in ["sku2", "sku1"] {
        send(
            &app,
            "POST",
            "/carts/alice/items",
            Some(json!({ "itemId": id, "quantity": 1, "unitPrice": 1 })),
        )
        .await;
    }

    let (status, body) = send(&app, "GET", "/carts/alice/items", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["data"][0]["itemId"], "sku1");

    let (status, _) = send(&app, "DELETE", "/carts/alice/items/sku1", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&app, "DELETE", "/carts/alice/items/sku1", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = send(&app, "GET", "/carts/alice/items/sku1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_cart_answers_404_once_gone() {
    let app = app();
    send(&app, "GET", "/carts/alice", None).await;

    let (status, _) = send(&app, "DELETE", "/carts/alice", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&app, "DELETE", "/carts/alice", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not Found");
}

#[tokio::test]
async fn merge_moves_session_cart_into_customer_cart() {
    let app = app();
    send(
        &app,
        "POST",
        "/carts/session42/items",
        Some(json!({ "itemId": "sku7", "quantity": 1, "unitPrice": 3 })),
    )
    .await;
    send(&app, "GET", "/carts/bob", None).await;

    let (status, _) = send(&app, "GET", "/carts/bob/merge?sessionId=session42", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, body) = send(&app, "GET", "/carts/bob", None).await;
    assert_eq!(body["data"]["items"][0]["itemId"], "sku7");
    assert_eq!(body["data"]["items"][0]["quantity"], 1);

    let (_, body) = send(&app, "GET", "/carts/session42", None).await;
    assert_eq!(body["data"]["items"], json!([]));
}

#[tokio::test]
async fn merge_of_unknown_session_is_404() {
    let app = app();

    let (status, _) = send(&app, "GET", "/carts/bob/merge?sessionId=nobody", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/carts/bob/merge", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unknown_path_is_404() {
    let (status, body) = send(&app(), "GET", "/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["path"], "/nope");
}
