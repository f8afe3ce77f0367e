use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    auth::{RequireCustomer, SessionId},
    errors::ServiceError,
    services::commerce::{
        CallbackParams, MethodSelection, PaymentMethod, PaymentOutcome, PaymentState,
        PaymentStatus,
    },
    ApiResponse, ApiResult, AppState,
};

const CALLBACK_CLAIM_TTL_SECS: usize = 60;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectMethodRequest {
    pub reference: String,
    pub method: PaymentMethod,
}

/// Snapshot of the session's live payment attempt
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentInfoView {
    pub reference: String,
    pub amount: i64,
    pub description: String,
    pub status: PaymentStatus,
    pub state: PaymentState,
    pub method: Option<PaymentMethod>,
    pub transaction_id: Option<String>,
}

/// Get the session's current payment attempt
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
    RequireCustomer(caller): RequireCustomer,
) -> ApiResult<PaymentInfoView> {
    let flow = state
        .services
        .payments
        .flow_for_session(&session_id)
        .filter(|flow| flow.customer_id == caller.customer_id)
        .ok_or_else(|| ServiceError::NotFound("No active payment attempt".to_string()))?;

    Ok(Json(ApiResponse::success(PaymentInfoView {
        reference: flow.reference.clone(),
        amount: flow.amount,
        description: flow.description.clone(),
        status: flow.status(),
        state: flow.state,
        method: flow.method,
        transaction_id: flow.transaction_id.clone(),
    })))
}

/// Choose how to pay
#[utoipa::path(
    post,
    path = "/api/v1/checkout/payment/method",
    summary = "Select payment method",
    request_body = SelectMethodRequest,
    responses(
        (status = 200, description = "Redirect URL or transfer instructions", body = ApiResponse<MethodSelection>),
        (status = 400, description = "Method cannot be chosen in the current state"),
        (status = 404, description = "Unknown payment reference"),
    )
)]
pub async fn select_method(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
    Json(payload): Json<SelectMethodRequest>,
) -> ApiResult<MethodSelection> {
    let selection = state
        .services
        .payments
        .select_method(caller.customer_id, &payload.reference, payload.method)
        .await?;
    Ok(Json(ApiResponse::success(selection)))
}

/// Gateway return callback. The browser lands here after the gateway
/// round trip; query params may be incomplete. A short-lived claim keyed
/// on the reference keeps concurrent duplicates from racing each other.
#[utoipa::path(
    get,
    path = "/api/v1/checkout/payment/callback",
    summary = "Payment callback",
    params(
        ("reference" = String, Query, description = "Payment reference"),
        ("status" = Option<String>, Query, description = "Gateway-reported status"),
        ("transactionId" = Option<String>, Query, description = "Gateway transaction id"),
    ),
    responses(
        (status = 200, description = "Terminal payment outcome", body = ApiResponse<PaymentOutcome>),
        (status = 404, description = "Unknown payment reference"),
        (status = 409, description = "A callback for this reference is already being processed"),
        (status = 502, description = "Gateway verification unavailable, retry later"),
    )
)]
pub async fn payment_callback(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ServiceError> {
    let reference = params.reference.clone();
    let claim_key = format!("payment:callback:{}", reference);

    match try_claim(&state.redis, &claim_key).await {
        Some(true) | None => {}
        Some(false) => {
            return Ok((
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "A callback for this payment is already being processed",
                    "reference": reference,
                })),
            )
                .into_response());
        }
    }

    let result = state
        .services
        .payments
        .ingest_callback(caller.customer_id, params)
        .await;
    release_claim(&state.redis, &claim_key).await;

    let outcome = result?;
    Ok(Json(ApiResponse::success(outcome)).into_response())
}

/// Claims the callback key. None means redis was unavailable and the
/// claim is skipped; the payment service stays idempotent by reference.
async fn try_claim(redis: &redis::Client, key: &str) -> Option<bool> {
    let mut conn = match redis.get_async_connection().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("Callback claim skipped, redis unavailable: {}", e);
            return None;
        }
    };
    match conn.set_nx::<_, _, bool>(key, "1").await {
        Ok(true) => {
            let _: Result<(), _> = conn.expire(key, CALLBACK_CLAIM_TTL_SECS).await;
            Some(true)
        }
        Ok(false) => Some(false),
        Err(e) => {
            warn!("Callback claim skipped, SETNX failed: {}", e);
            None
        }
    }
}

async fn release_claim(redis: &redis::Client, key: &str) {
    if let Ok(mut conn) = redis.get_async_connection().await {
        let _: Result<(), redis::RedisError> = conn.del(key).await;
    }
}
