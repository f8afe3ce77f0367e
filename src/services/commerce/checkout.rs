use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthCustomer,
    cart::CartSessions,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::STORE_METRICS,
    services::commerce::{
        contact_profiles::ContactProfileService,
        payment::{PaymentFlow, PaymentService},
        profile_gate,
    },
};

/// Where an unauthenticated visitor should land after signing in
const DEFAULT_RESUME_PATH: &str = "/checkout";

const DESCRIPTION_MAX: usize = 140;

/// A checkout attempt that cannot start yet. Each variant carries a
/// stable machine-readable code so the storefront can route the customer
/// to the right remediation step.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Sign in to continue to payment")]
    NotAuthenticated,
    #[error("A contact profile is required for this purchase")]
    MissingContactProfile,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl CheckoutError {
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "EMPTY_CART",
            CheckoutError::NotAuthenticated => "NOT_AUTHENTICATED",
            CheckoutError::MissingContactProfile => "MISSING_CONTACT_PROFILE",
            CheckoutError::Service(_) => "SERVICE_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
            CheckoutError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            CheckoutError::MissingContactProfile => StatusCode::CONFLICT,
            CheckoutError::Service(e) => e.status_code(),
        }
    }
}

impl IntoResponse for CheckoutError {
    fn into_response(self) -> Response {
        if let CheckoutError::Service(e) = self {
            return e.into_response();
        }
        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

/// Everything the payment step needs to start charging
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentHandoff {
    /// Integer Kwanza total for the whole cart
    pub amount: i64,
    /// Unique reference tying gateway traffic back to this attempt
    pub reference: String,
    /// Human-readable summary of what is being bought
    pub description: String,
}

/// Runs the checkout preconditions in a fixed order and, once they all
/// hold, opens a payment flow over a snapshot of the cart.
pub struct CheckoutService {
    carts: Arc<CartSessions>,
    profiles: Arc<ContactProfileService>,
    payments: Arc<PaymentService>,
    event_sender: Arc<EventSender>,
    resume_paths: DashMap<String, String>,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<CartSessions>,
        profiles: Arc<ContactProfileService>,
        payments: Arc<PaymentService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            carts,
            profiles,
            payments,
            event_sender,
            resume_paths: DashMap::new(),
        }
    }

    /// Starts checkout for a session. Preconditions are checked in a
    /// fixed order so the storefront always gets the most actionable
    /// signal first: an empty cart reads as empty even when the visitor
    /// is also signed out.
    #[instrument(skip(self, caller, resume_path))]
    pub async fn initiate(
        &self,
        session_id: &str,
        caller: Option<&AuthCustomer>,
        profile_id: Option<Uuid>,
        resume_path: Option<String>,
    ) -> Result<PaymentHandoff, CheckoutError> {
        let cart = self.carts.cart(session_id).await;
        let (items, amount) = {
            let guard = cart.lock().await;
            (guard.snapshot(), guard.total_price())
        };

        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let Some(caller) = caller else {
            let path = resume_path.unwrap_or_else(|| DEFAULT_RESUME_PATH.to_string());
            self.resume_paths.insert(session_id.to_string(), path);
            return Err(CheckoutError::NotAuthenticated);
        };

        self.profiles
            .ensure_customer(caller)
            .await
            .map_err(CheckoutError::Service)?;

        if profile_gate::requires_profile(&items) {
            let Some(profile_id) = profile_id else {
                return Err(CheckoutError::MissingContactProfile);
            };
            self.profiles
                .get_profile(caller.customer_id, profile_id)
                .await
                .map_err(|e| match e {
                    ServiceError::NotFound(_) => CheckoutError::MissingContactProfile,
                    other => CheckoutError::Service(other),
                })?;
        }

        let description = describe_items(&items);
        let reference = self.unique_reference();
        let flow = PaymentFlow::begin(
            session_id.to_string(),
            caller.customer_id,
            reference.clone(),
            description.clone(),
            items,
        );
        self.payments.begin(flow);

        info!(reference, amount, "Checkout started");
        STORE_METRICS.checkouts_started.inc();
        self.event_sender
            .send_or_log(Event::CheckoutStarted {
                session_id: session_id.to_string(),
                customer_id: caller.customer_id,
                reference: reference.clone(),
                amount,
            })
            .await;

        Ok(PaymentHandoff {
            amount,
            reference,
            description,
        })
    }

    /// Consumes the resume path recorded when an unauthenticated visitor
    /// tried to check out, if any.
    pub fn take_resume_path(&self, session_id: &str) -> Option<String> {
        self.resume_paths
            .remove(session_id)
            .map(|(_, path)| path)
    }

    fn unique_reference(&self) -> String {
        loop {
            let candidate = generate_reference();
            if self.payments.flow_by_reference(&candidate).is_none() {
                return candidate;
            }
        }
    }
}

fn generate_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(char::from)
        .collect();
    format!(
        "AH-{}-{}",
        Utc::now().timestamp_millis(),
        suffix.to_uppercase()
    )
}

fn describe_items(items: &[crate::cart::CartItem]) -> String {
    let mut description = String::new();
    for item in items {
        if !description.is_empty() {
            description.push_str(", ");
        }
        if description.len() + item.name.len() > DESCRIPTION_MAX {
            description.push_str("...");
            break;
        }
        description.push_str(&item.name);
    }
    description
}
