use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{OptionalCustomer, RequireCustomer, SessionId},
    services::commerce::{CheckoutError, PaymentHandoff},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StartCheckoutRequest {
    /// Contact profile to attach when the cart demands one
    pub profile_id: Option<Uuid>,
    /// Where to resume after sign-in if the visitor is anonymous
    pub resume_path: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResumePathResponse {
    pub path: Option<String>,
}

/// Start checkout for the session's cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    summary = "Start checkout",
    request_body = StartCheckoutRequest,
    responses(
        (status = 200, description = "Checkout opened, ready for payment", body = ApiResponse<PaymentHandoff>),
        (status = 400, description = "Cart is empty (code EMPTY_CART)"),
        (status = 401, description = "Sign-in required (code NOT_AUTHENTICATED)"),
        (status = 409, description = "Contact profile required (code MISSING_CONTACT_PROFILE)"),
    )
)]
pub async fn start_checkout(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
    OptionalCustomer(caller): OptionalCustomer,
    payload: Option<Json<StartCheckoutRequest>>,
) -> Result<Json<ApiResponse<PaymentHandoff>>, CheckoutError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let handoff = state
        .services
        .checkout
        .initiate(
            &session_id,
            caller.as_ref(),
            payload.profile_id,
            payload.resume_path,
        )
        .await?;
    Ok(Json(ApiResponse::success(handoff)))
}

/// Consume the resume path recorded for this session, if any
pub async fn take_resume_path(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
) -> ApiResult<ResumePathResponse> {
    let path = state.services.checkout.take_resume_path(&session_id);
    Ok(Json(ApiResponse::success(ResumePathResponse { path })))
}

/// Abandon the session's live payment attempt
#[utoipa::path(
    post,
    path = "/api/v1/checkout/abandon",
    summary = "Abandon checkout",
    responses(
        (status = 200, description = "Attempt dropped; the cart is untouched"),
        (status = 401, description = "Not signed in"),
    )
)]
pub async fn abandon_checkout(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
    RequireCustomer(caller): RequireCustomer,
) -> ApiResult<serde_json::Value> {
    state
        .services
        .payments
        .abandon(caller.customer_id, &session_id)
        .await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "abandoned": true
    }))))
}
