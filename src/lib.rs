//! AngoHost Storefront API Library
//!
//! This crate provides the cart-to-paid-order pipeline for the AngoHost
//! storefront: session carts, .ao domain and hosting price quotes, checkout
//! orchestration, the payment lifecycle against the EMIS gateway, and the
//! committed orders customers see afterwards.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod cart;
pub mod config;
pub mod currency;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod openapi;
pub mod rate_limiter;
pub mod services;
pub mod tracing;

use axum::{
    http::HeaderValue,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: Arc<events::EventSender>,
    pub services: services::AppServices,
    pub redis: Arc<redis::Client>,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// The versioned storefront API surface
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    // Session cart; session identity comes from the x-session-id header
    let cart = Router::new()
        .route("/cart", get(handlers::commerce::cart::get_cart))
        .route("/cart/items", post(handlers::commerce::cart::add_item))
        .route(
            "/cart/items/:id",
            axum::routing::put(handlers::commerce::cart::update_item)
                .delete(handlers::commerce::cart::remove_item),
        )
        .route("/cart/clear", post(handlers::commerce::cart::clear_cart));

    // Price quotes, no auth required
    let pricing = Router::new()
        .route(
            "/pricing/domains",
            get(handlers::commerce::pricing::quote_domain),
        )
        .route(
            "/pricing/term",
            get(handlers::commerce::pricing::quote_term),
        );

    // Checkout orchestration and the payment lifecycle hanging off it
    let checkout = Router::new()
        .route("/checkout", post(handlers::commerce::checkout::start_checkout))
        .route(
            "/checkout/resume-path",
            get(handlers::commerce::checkout::take_resume_path),
        )
        .route(
            "/checkout/abandon",
            post(handlers::commerce::checkout::abandon_checkout),
        )
        .route(
            "/checkout/payment",
            get(handlers::commerce::payment::get_payment),
        )
        .route(
            "/checkout/payment/method",
            post(handlers::commerce::payment::select_method),
        )
        .route(
            "/checkout/payment/callback",
            get(handlers::commerce::payment::payment_callback),
        );

    // Billing contact profiles
    let profiles = Router::new()
        .route(
            "/profiles",
            get(handlers::commerce::profiles::list_profiles)
                .post(handlers::commerce::profiles::create_profile),
        )
        .route(
            "/profiles/:id",
            get(handlers::commerce::profiles::get_profile)
                .put(handlers::commerce::profiles::update_profile)
                .delete(handlers::commerce::profiles::delete_profile),
        );

    // Order history and provisioned services
    let orders = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/by-reference/:reference",
            get(handlers::orders::get_order_by_reference),
        )
        .route("/services/domains", get(handlers::orders::list_domains))
        .route("/services/hosting", get(handlers::orders::list_hosting));

    Router::new()
        .route("/status", get(api_status))
        .merge(cart)
        .merge(pricing)
        .merge(checkout)
        .merge(profiles)
        .merge(orders)
}

/// Assembles the full application router with middleware. The rate limit
/// layer is applied separately by the binary so tests exercise the stack
/// without tripping request quotas.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(|| async { "angohost-api up" }))
        .nest("/api/v1", api_v1_routes())
        .nest("/health", handlers::health::health_routes())
        .nest("/metrics", metrics::metrics_routes())
        .merge(openapi::swagger_ui())
        .layer(TraceLayer::new_for_http().make_span_with(tracing::RequestSpanMaker))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(axum::middleware::from_fn(metrics::track_metrics))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ))
        .layer(axum::middleware::from_fn(tracing::request_id_middleware))
        .with_state(state)
}

/// Builds the CORS layer from configuration. Config validation has already
/// rejected the production-without-origins case, so a missing origin list
/// here always means the permissive fallback is allowed.
fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let configured_origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    if configured_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(configured_origins)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(config.cors_allow_credentials)
    }
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "service": "angohost-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

pub mod prelude {
    pub use crate::cart::*;
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::metrics::*;
    pub use crate::services::*;
    pub use crate::tracing::*;
}
