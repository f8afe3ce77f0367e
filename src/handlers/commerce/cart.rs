use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::SessionId,
    cart::{AddOutcome, CartItem, CartItemPatch},
    errors::ServiceError,
    events::Event,
    metrics::STORE_METRICS,
    services::commerce::profile_gate,
    ApiResponse, ApiResult, AppState,
};

/// Cart contents plus everything the storefront derives from them
#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartItem>,
    /// Integer Kwanza sum of all line prices
    pub total_price: i64,
    pub item_count: usize,
    /// Whether checking this cart out will demand a contact profile
    pub requires_contact_profile: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddItemResponse {
    pub item_id: String,
    /// True when the line replaced an existing one instead of appending
    pub merged: bool,
    pub cart: CartView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemoveItemResponse {
    /// False when no line carried the id; removal is idempotent
    pub removed: bool,
    pub cart: CartView,
}

async fn view(state: &AppState, session_id: &str) -> CartView {
    let cart = state.services.carts.cart(session_id).await;
    let guard = cart.lock().await;
    let items = guard.snapshot();
    CartView {
        total_price: guard.total_price(),
        item_count: guard.item_count(),
        requires_contact_profile: profile_gate::requires_profile(&items),
        items,
    }
}

/// Get the session's cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    summary = "Get cart",
    params(("x-session-id" = String, Header, description = "Browser session id")),
    responses(
        (status = 200, description = "Current cart contents", body = ApiResponse<CartView>),
        (status = 400, description = "Missing or invalid session id"),
    )
)]
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
) -> ApiResult<CartView> {
    Ok(Json(ApiResponse::success(view(&state, &session_id).await)))
}

/// Add an item to the cart, merging on (type, name)
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    summary = "Add cart item",
    request_body = CartItem,
    responses(
        (status = 200, description = "Item added or merged", body = ApiResponse<AddItemResponse>),
        (status = 400, description = "Item shape is invalid"),
    )
)]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
    Json(item): Json<CartItem>,
) -> ApiResult<AddItemResponse> {
    let cart = state.services.carts.cart(&session_id).await;
    let AddOutcome { item_id, merged } = cart.lock().await.add_item(item).await?;
    STORE_METRICS.cart_items_added.inc();
    state
        .event_sender
        .send_or_log(Event::CartItemAdded {
            session_id: session_id.clone(),
            item_id: item_id.clone(),
            merged,
        })
        .await;
    Ok(Json(ApiResponse::success(AddItemResponse {
        item_id,
        merged,
        cart: view(&state, &session_id).await,
    })))
}

/// Patch fields of one cart line
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{id}",
    summary = "Update cart item",
    params(("id" = String, Path, description = "Cart line id")),
    request_body = CartItemPatch,
    responses(
        (status = 200, description = "Updated cart", body = ApiResponse<CartView>),
        (status = 404, description = "No line with this id"),
    )
)]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
    Path(id): Path<String>,
    Json(patch): Json<CartItemPatch>,
) -> ApiResult<CartView> {
    let cart = state.services.carts.cart(&session_id).await;
    let updated = cart.lock().await.update_item(&id, &patch).await?;
    if !updated {
        return Err(ServiceError::NotFound(format!(
            "No cart item with id {}",
            id
        )));
    }
    state
        .event_sender
        .send_or_log(Event::CartItemUpdated {
            session_id: session_id.clone(),
            item_id: id,
        })
        .await;
    Ok(Json(ApiResponse::success(view(&state, &session_id).await)))
}

/// Remove one cart line. Removing an absent id is not an error.
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
    Path(id): Path<String>,
) -> ApiResult<RemoveItemResponse> {
    let cart = state.services.carts.cart(&session_id).await;
    let removed = cart.lock().await.remove_item(&id).await;
    if removed {
        state
            .event_sender
            .send_or_log(Event::CartItemRemoved {
                session_id: session_id.clone(),
                item_id: id,
            })
            .await;
    }
    Ok(Json(ApiResponse::success(RemoveItemResponse {
        removed,
        cart: view(&state, &session_id).await,
    })))
}

/// Empty the cart
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
) -> ApiResult<CartView> {
    let cart = state.services.carts.cart(&session_id).await;
    cart.lock().await.clear().await;
    state
        .event_sender
        .send_or_log(Event::CartCleared {
            session_id: session_id.clone(),
        })
        .await;
    Ok(Json(ApiResponse::success(view(&state, &session_id).await)))
}
