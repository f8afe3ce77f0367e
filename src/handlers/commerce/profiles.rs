use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::RequireCustomer,
    entities::contact_profile,
    errors::ServiceError,
    services::commerce::{CreateContactProfileInput, UpdateContactProfileInput},
    ApiResponse, ApiResult, AppState,
};

/// List the caller's contact profiles
#[utoipa::path(
    get,
    path = "/api/v1/profiles",
    summary = "List contact profiles",
    responses(
        (status = 200, description = "Profiles in creation order", body = ApiResponse<Vec<contact_profile::Model>>),
        (status = 401, description = "Not signed in"),
    )
)]
pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
) -> ApiResult<Vec<contact_profile::Model>> {
    let profiles = state
        .services
        .profiles
        .list_profiles(caller.customer_id)
        .await?;
    Ok(Json(ApiResponse::success(profiles)))
}

/// Create a contact profile
#[utoipa::path(
    post,
    path = "/api/v1/profiles",
    summary = "Create contact profile",
    request_body = CreateContactProfileInput,
    responses(
        (status = 201, description = "Profile created", body = ApiResponse<contact_profile::Model>),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not signed in"),
    )
)]
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
    Json(input): Json<CreateContactProfileInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.services.profiles.create_profile(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(profile))))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
    Path(id): Path<Uuid>,
) -> ApiResult<contact_profile::Model> {
    let profile = state
        .services
        .profiles
        .get_profile(caller.customer_id, id)
        .await?;
    Ok(Json(ApiResponse::success(profile)))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateContactProfileInput>,
) -> ApiResult<contact_profile::Model> {
    let profile = state
        .services
        .profiles
        .update_profile(caller.customer_id, id, input)
        .await?;
    Ok(Json(ApiResponse::success(profile)))
}

pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    RequireCustomer(caller): RequireCustomer,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state
        .services
        .profiles
        .delete_profile(caller.customer_id, id)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": true }))))
}
