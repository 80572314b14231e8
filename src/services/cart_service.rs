use rust_decimal::Decimal;

use crate::{
    dto::cart::ItemList,
    error::{AppError, AppResult},
    models::{Cart, Item},
    response::{ApiResponse, Meta},
    state::AppState,
};

fn validate_item(item: &Item) -> AppResult<()> {
    if item.item_id.trim().is_empty() {
        return Err(AppError::BadRequest("itemId must not be empty".to_string()));
    }
    if item.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    if item.unit_price < Decimal::ZERO {
        return Err(AppError::BadRequest(
            "unitPrice must not be negative".to_string(),
        ));
    }
    Ok(())
}

pub async fn get_cart(state: &AppState, customer_id: &str) -> AppResult<ApiResponse<Cart>> {
    let cart = state.carts.get_or_create_cart(customer_id).await?;
    let meta = Meta::with_total(cart.items.len());
    Ok(ApiResponse::success("OK", cart, Some(meta)))
}

pub async fn delete_cart(
    state: &AppState,
    customer_id: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if !state.carts.delete_cart(customer_id).await? {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Cart deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn merge_carts(
    state: &AppState,
    customer_id: &str,
    session_id: Option<&str>,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let session_id = session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("sessionId is required".to_string()))?;

    if !state.carts.merge_carts(customer_id, session_id).await? {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Carts merged",
        serde_json::json!({ "customerId": customer_id, "sessionId": session_id }),
        Some(Meta::empty()),
    ))
}

pub async fn list_items(state: &AppState, cart_id: &str) -> AppResult<ApiResponse<ItemList>> {
    let items = state.carts.get_items(cart_id).await?;
    let meta = Meta::with_total(items.len());
    Ok(ApiResponse::success("OK", ItemList { items }, Some(meta)))
}

pub async fn get_item(
    state: &AppState,
    cart_id: &str,
    item_id: &str,
) -> AppResult<ApiResponse<Item>> {
    let item = state
        .carts
        .get_item(cart_id, item_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", item, Some(Meta::empty())))
}

pub async fn add_item(state: &AppState, cart_id: &str, item: Item) -> AppResult<ApiResponse<Item>> {
    validate_item(&item)?;
    let stored = state.carts.add_item(cart_id, item).await?;
    Ok(ApiResponse::success("Item added", stored, None))
}

pub async fn update_item(
    state: &AppState,
    cart_id: &str,
    item: Item,
) -> AppResult<ApiResponse<Item>> {
    validate_item(&item)?;
    let stored = state.carts.update_item(cart_id, item).await?;
    Ok(ApiResponse::success("Item updated", stored, None))
}

pub async fn delete_item(
    state: &AppState,
    cart_id: &str,
    item_id: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    state.carts.delete_item(cart_id, item_id).await?;
    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
