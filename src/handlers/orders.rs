use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    auth::RequireCustomer,
    entities::{domain, hosting_service, order},
    services::orders::OrderDetail,
    ApiResponse, ApiResult, AppState,
};

/// List the caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    responses(
        (status = 200, description = "Orders for the signed-in customer", body = ApiResponse<Vec<order::Model>>),
        (status = 401, description = "Not signed in"),
    )
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
) -> ApiResult<Vec<order::Model>> {
    let orders = state.services.orders.list_orders(caller.customer_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Get one order with its lines and invoice
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<OrderDetail>),
        (status = 404, description = "No such order for this customer"),
    )
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state
        .services
        .orders
        .get_order(caller.customer_id, id)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Look an order up by payment reference, as carried by the success view
pub async fn get_order_by_reference(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
    Path(reference): Path<String>,
) -> ApiResult<OrderDetail> {
    let detail = state
        .services
        .orders
        .get_order_by_reference(caller.customer_id, &reference)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

pub async fn list_domains(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
) -> ApiResult<Vec<domain::Model>> {
    let domains = state
        .services
        .orders
        .list_domains(caller.customer_id)
        .await?;
    Ok(Json(ApiResponse::success(domains)))
}

pub async fn list_hosting(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
) -> ApiResult<Vec<hosting_service::Model>> {
    let services = state
        .services
        .orders
        .list_hosting(caller.customer_id)
        .await?;
    Ok(Json(ApiResponse::success(services)))
}
