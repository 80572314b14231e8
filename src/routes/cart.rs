use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::cart::{ItemList, MergeQuery},
    error::AppResult,
    models::{Cart, Item},
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{customer_id}", get(get_cart).delete(delete_cart))
        .route("/{customer_id}/merge", get(merge_carts))
        .route(
            "/{customer_id}/items",
            get(list_items).post(add_item).patch(update_item),
        )
        .route(
            "/{customer_id}/items/{item_id}",
            get(get_item).delete(delete_item),
        )
}

#[utoipa::path(
    get,
    path = "/carts/{customer_id}",
    params(
        ("customer_id" = String, Path, description = "Customer identifier")
    ),
    responses(
        (status = 200, description = "Customer's shopping cart, created if missing", body = ApiResponse<Cart>)
    ),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let response = cart_service::get_cart(&state, &customer_id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/carts/{customer_id}",
    params(
        ("customer_id" = String, Path, description = "Customer identifier")
    ),
    responses(
        (status = 202, description = "Shopping cart deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Shopping cart doesn't exist")
    ),
    tag = "Carts"
)]
pub async fn delete_cart(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> AppResult<(StatusCode, Json<ApiResponse<serde_json::Value>>)> {
    let response = cart_service::delete_cart(&state, &customer_id).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Merge an anonymous session cart into the customer's cart.
#[utoipa::path(
    get,
    path = "/carts/{customer_id}/merge",
    params(
        ("customer_id" = String, Path, description = "Customer identifier"),
        MergeQuery
    ),
    responses(
        (status = 202, description = "Shopping carts merged", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Missing sessionId"),
        (status = 404, description = "Session shopping cart doesn't exist")
    ),
    tag = "Carts"
)]
pub async fn merge_carts(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Query(query): Query<MergeQuery>,
) -> AppResult<(StatusCode, Json<ApiResponse<serde_json::Value>>)> {
    let response =
        cart_service::merge_carts(&state, &customer_id, query.session_id.as_deref()).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/carts/{customer_id}/items",
    params(
        ("customer_id" = String, Path, description = "Customer identifier")
    ),
    responses(
        (status = 200, description = "Items in the cart", body = ApiResponse<ItemList>)
    ),
    tag = "Items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> AppResult<Json<ApiResponse<ItemList>>> {
    let response = cart_service::list_items(&state, &customer_id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/carts/{customer_id}/items",
    params(
        ("customer_id" = String, Path, description = "Customer identifier")
    ),
    request_body = Item,
    responses(
        (status = 201, description = "Item added, or its quantity incremented", body = ApiResponse<Item>),
        (status = 400, description = "Bad request")
    ),
    tag = "Items"
)]
pub async fn add_item(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    payload: Result<Json<Item>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<Item>>)> {
    let Json(payload) = payload?;
    let response = cart_service::add_item(&state, &customer_id, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    patch,
    path = "/carts/{customer_id}/items",
    params(
        ("customer_id" = String, Path, description = "Customer identifier")
    ),
    request_body = Item,
    responses(
        (status = 202, description = "Item quantity replaced, or item added", body = ApiResponse<Item>),
        (status = 400, description = "Bad request")
    ),
    tag = "Items"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    payload: Result<Json<Item>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<Item>>)> {
    let Json(payload) = payload?;
    let response = cart_service::update_item(&state, &customer_id, payload).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/carts/{customer_id}/items/{item_id}",
    params(
        ("customer_id" = String, Path, description = "Customer identifier"),
        ("item_id" = String, Path, description = "Item identifier")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<Item>),
        (status = 404, description = "Item not in cart")
    ),
    tag = "Items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path((customer_id, item_id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<Item>>> {
    let response = cart_service::get_item(&state, &customer_id, &item_id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/carts/{customer_id}/items/{item_id}",
    params(
        ("customer_id" = String, Path, description = "Customer identifier"),
        ("item_id" = String, Path, description = "Item identifier")
    ),
    responses(
        (status = 202, description = "Item removed (or was not present)", body = ApiResponse<serde_json::Value>)
    ),
    tag = "Items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    Path((customer_id, item_id)): Path<(String, String)>,
) -> AppResult<(StatusCode, Json<ApiResponse<serde_json::Value>>)> {
    let response = cart_service::delete_item(&state, &customer_id, &item_id).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}
