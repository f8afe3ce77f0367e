use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    cart::{CartItem, CartSessions, ProductKind},
    config::AppConfig,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::STORE_METRICS,
    services::commerce::commit::{CommitReceipt, OrderCommitService},
};

/// Guidance surfaced on the success view when the order registered a domain
pub const DNS_HINT: &str = "Aponte o seu domínio para ns1.angohost.ao e ns2.angohost.ao";
/// Guidance surfaced on the success view when the order included email plans
pub const MAIL_HINT: &str = "Configure o seu cliente de email com mail.angohost.ao (IMAP e SMTP)";

// ==================== State machine ====================

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    Emis,
    BankTransfer,
}

/// Coarse status exposed to views, derived from the machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// The authoritative current state of one payment attempt. Views render
/// from this value; they never drive transitions themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentState {
    SelectingMethod,
    GatewayRedirect,
    AwaitingCallback,
    /// Bank transfer chosen: reference and amount were surfaced for a
    /// manual transfer, reconciliation happens outside this system
    InstructionsIssued,
    Verifying,
    Committed,
    Failed,
}

impl PaymentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentState::Committed | PaymentState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    Choose(PaymentMethod),
    CallbackReceived,
    VerificationStarted,
    VerificationSucceeded,
    VerificationFailed,
}

/// Pure transition function; every state change in a payment's life goes
/// through here so invalid sequences are impossible to reach.
pub fn next(state: PaymentState, event: PaymentEvent) -> Result<PaymentState, ServiceError> {
    use PaymentEvent::*;
    use PaymentState::*;

    let to = match (state, event) {
        (SelectingMethod, Choose(PaymentMethod::Emis)) => GatewayRedirect,
        (SelectingMethod, Choose(PaymentMethod::BankTransfer)) => InstructionsIssued,
        (GatewayRedirect, CallbackReceived) => AwaitingCallback,
        (AwaitingCallback, VerificationStarted) => Verifying,
        (Verifying, VerificationSucceeded) => Committed,
        (Verifying, VerificationFailed) => Failed,
        (from, event) => {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment in state {} cannot accept {:?}",
                from, event
            )))
        }
    };
    Ok(to)
}

// ==================== Flow data ====================

/// One checkout attempt's payment, from method selection to a terminal
/// state. Nothing durable exists until the commit inside `Committed`.
#[derive(Debug, Clone)]
pub struct PaymentFlow {
    pub session_id: String,
    pub customer_id: Uuid,
    pub state: PaymentState,
    pub method: Option<PaymentMethod>,
    pub reference: String,
    pub amount: i64,
    pub description: String,
    pub transaction_id: Option<String>,
    pub has_domain: bool,
    pub has_email: bool,
    pub cart_snapshot: Vec<CartItem>,
    pub receipt: Option<CommitReceipt>,
    pub created_at: DateTime<Utc>,
}

impl PaymentFlow {
    pub fn begin(
        session_id: String,
        customer_id: Uuid,
        reference: String,
        description: String,
        cart_snapshot: Vec<CartItem>,
    ) -> Self {
        let amount = cart_snapshot.iter().map(|item| item.price).sum();
        let has_domain = cart_snapshot
            .iter()
            .any(|item| item.kind == ProductKind::Domain);
        let has_email = cart_snapshot
            .iter()
            .any(|item| item.kind == ProductKind::Email);

        Self {
            session_id,
            customer_id,
            state: PaymentState::SelectingMethod,
            method: None,
            reference,
            amount,
            description,
            transaction_id: None,
            has_domain,
            has_email,
            cart_snapshot,
            receipt: None,
            created_at: Utc::now(),
        }
    }

    pub fn status(&self) -> PaymentStatus {
        match self.state {
            PaymentState::Committed => PaymentStatus::Completed,
            PaymentState::Failed => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

// ==================== Gateway ====================

/// External payment gateway, consumed as "redirect the customer to a URL,
/// later confirm whether a reference was actually paid".
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_redirect(
        &self,
        reference: &str,
        amount: i64,
        description: &str,
        callback_url: &str,
    ) -> Result<String, ServiceError>;

    /// Authoritative paid-or-not check for a reference. Callback payloads
    /// are attacker-influenceable redirect data and are never trusted
    /// without this.
    async fn verify_payment(&self, reference: &str) -> Result<bool, ServiceError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameTokenRequest<'a> {
    reference: &'a str,
    amount: i64,
    token: &'a str,
    callback_url: &'a str,
    description: &'a str,
}

#[derive(Deserialize)]
struct FrameTokenResponse {
    id: String,
}

#[derive(Deserialize)]
struct ReferenceStatusResponse {
    status: String,
}

/// Client for the EMIS multicaixa online payment gateway
pub struct EmisGatewayClient {
    http: reqwest::Client,
    base_url: String,
    frame_token: String,
    secret: Option<String>,
}

impl EmisGatewayClient {
    pub fn new(base_url: String, frame_token: String, secret: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            frame_token,
            secret,
        }
    }

    fn signature(&self, body: &str) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for EmisGatewayClient {
    #[instrument(skip(self, description, callback_url))]
    async fn create_redirect(
        &self,
        reference: &str,
        amount: i64,
        description: &str,
        callback_url: &str,
    ) -> Result<String, ServiceError> {
        let request = FrameTokenRequest {
            reference,
            amount,
            token: &self.frame_token,
            callback_url,
            description,
        };
        let body = serde_json::to_string(&request).map_err(|e| {
            ServiceError::InternalError(format!("Failed to encode gateway request: {}", e))
        })?;

        let mut http_request = self
            .http
            .post(format!("{}/portal/frameToken", self.base_url))
            .header("content-type", "application/json")
            .body(body.clone());
        if let Some(signature) = self.signature(&body) {
            http_request = http_request.header("x-signature", signature);
        }

        let response = http_request.send().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Payment gateway unreachable: {}", e))
        })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "Payment gateway rejected frame token request: {}",
                response.status()
            )));
        }

        let frame: FrameTokenResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Invalid gateway response: {}", e))
        })?;

        Ok(format!(
            "{}/portal/frame?token={}",
            self.base_url, frame.id
        ))
    }

    #[instrument(skip(self))]
    async fn verify_payment(&self, reference: &str) -> Result<bool, ServiceError> {
        let response = self
            .http
            .get(format!(
                "{}/portal/references/{}",
                self.base_url, reference
            ))
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("Payment gateway unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "Payment gateway verification failed: {}",
                response.status()
            )));
        }

        let status: ReferenceStatusResponse = response.json().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("Invalid gateway response: {}", e))
        })?;

        Ok(matches!(
            status.status.to_ascii_uppercase().as_str(),
            "ACCEPTED" | "SUCCESS" | "PAID"
        ))
    }
}

/// Gateway stand-in for environments without EMIS credentials. The
/// redirect jumps straight to the callback URL with a synthetic approved
/// payment, and every verification passes.
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_redirect(
        &self,
        reference: &str,
        _amount: i64,
        _description: &str,
        callback_url: &str,
    ) -> Result<String, ServiceError> {
        Ok(format!(
            "{}?status=SUCCESS&transactionId=SIM-{}&reference={}",
            callback_url,
            Utc::now().timestamp_millis(),
            reference
        ))
    }

    async fn verify_payment(&self, _reference: &str) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

// ==================== Service ====================

/// Callback query data as received from the gateway redirect. Only the
/// reference is guaranteed; the rest may be missing in degraded mode.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CallbackParams {
    pub status: Option<String>,
    #[serde(rename = "transactionId")]
    pub transaction_id: Option<String>,
    pub reference: String,
}

/// What the customer sees after choosing a payment method
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MethodSelection {
    /// Send the customer to the gateway
    Redirect { url: String },
    /// Surface the manual transfer data
    Instructions {
        iban: String,
        amount: i64,
        /// Formatted for the transfer slip, e.g. `25.000 Kz`
        display_amount: String,
        reference: String,
        description: String,
    },
}

/// Terminal result of callback processing
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Committed {
        reference: String,
        transaction_id: String,
        order_id: Uuid,
        invoice_number: String,
        total_amount: i64,
        warnings: Vec<String>,
        dns_hint: Option<String>,
        mail_hint: Option<String>,
    },
    Failed {
        reference: String,
        reason: String,
    },
}

/// Drives payment attempts through the state machine, owns the in-memory
/// flow registry, and invokes the order commit on verified success.
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    commit: Arc<OrderCommitService>,
    carts: Arc<CartSessions>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
    flows: DashMap<String, PaymentFlow>,
    session_refs: DashMap<String, String>,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        commit: Arc<OrderCommitService>,
        carts: Arc<CartSessions>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            gateway,
            commit,
            carts,
            event_sender,
            config,
            flows: DashMap::new(),
            session_refs: DashMap::new(),
        }
    }

    /// Registers a fresh flow produced by checkout. A session holds at
    /// most one live attempt; an older uncommitted attempt is dropped.
    pub fn begin(&self, flow: PaymentFlow) {
        if let Some(previous) = self.session_refs.get(&flow.session_id) {
            let stale = previous.value().clone();
            drop(previous);
            if let Some(old) = self.flows.get(&stale) {
                if !matches!(old.state, PaymentState::Committed) {
                    drop(old);
                    self.flows.remove(&stale);
                }
            }
        }
        self.session_refs
            .insert(flow.session_id.clone(), flow.reference.clone());
        self.flows.insert(flow.reference.clone(), flow);
    }

    pub fn flow_by_reference(&self, reference: &str) -> Option<PaymentFlow> {
        self.flows.get(reference).map(|f| f.clone())
    }

    pub fn flow_for_session(&self, session_id: &str) -> Option<PaymentFlow> {
        let reference = self.session_refs.get(session_id)?.value().clone();
        self.flow_by_reference(&reference)
    }

    fn require_flow(
        &self,
        reference: &str,
        customer_id: Uuid,
    ) -> Result<PaymentFlow, ServiceError> {
        let flow = self.flow_by_reference(reference).ok_or_else(|| {
            ServiceError::NotFound(format!("No payment attempt for reference {}", reference))
        })?;
        if flow.customer_id != customer_id {
            return Err(ServiceError::Forbidden(
                "Payment attempt belongs to another customer".to_string(),
            ));
        }
        Ok(flow)
    }

    fn store_flow(&self, flow: PaymentFlow) {
        self.flows.insert(flow.reference.clone(), flow);
    }

    /// Applies the customer's method choice and produces either a gateway
    /// redirect or bank transfer instructions.
    #[instrument(skip(self))]
    pub async fn select_method(
        &self,
        customer_id: Uuid,
        reference: &str,
        method: PaymentMethod,
    ) -> Result<MethodSelection, ServiceError> {
        let mut flow = self.require_flow(reference, customer_id)?;
        let chosen = next(flow.state, PaymentEvent::Choose(method))?;
        flow.method = Some(method);

        self.event_sender
            .send_or_log(Event::PaymentMethodSelected {
                reference: reference.to_string(),
                method: method.to_string(),
            })
            .await;

        match method {
            PaymentMethod::Emis => {
                let url = match self
                    .gateway
                    .create_redirect(
                        reference,
                        flow.amount,
                        &flow.description,
                        &self.config.payment_callback_url(),
                    )
                    .await
                {
                    Ok(url) => url,
                    // Choice not consumed: the customer can pick again
                    Err(e) => {
                        warn!(reference, "Gateway redirect unavailable: {}", e);
                        return Err(e);
                    }
                };

                flow.state = chosen;
                self.store_flow(flow);
                self.event_sender
                    .send_or_log(Event::GatewayRedirectIssued {
                        reference: reference.to_string(),
                    })
                    .await;
                Ok(MethodSelection::Redirect { url })
            }
            PaymentMethod::BankTransfer => {
                let iban = self.config.bank_transfer_iban.clone().ok_or_else(|| {
                    ServiceError::InvalidOperation(
                        "Bank transfer is not available at the moment".to_string(),
                    )
                })?;

                flow.state = chosen;
                let selection = MethodSelection::Instructions {
                    iban,
                    amount: flow.amount,
                    display_amount: crate::currency::format_kwanza(flow.amount),
                    reference: flow.reference.clone(),
                    description: flow.description.clone(),
                };
                self.store_flow(flow);
                self.event_sender
                    .send_or_log(Event::BankTransferInstructionsIssued {
                        reference: reference.to_string(),
                    })
                    .await;
                Ok(selection)
            }
        }
    }

    /// Ingests the gateway's return callback, verifies the payment server
    /// side and commits the order on confirmed success.
    ///
    /// A callback carrying only the reference is accepted provisionally
    /// with synthesized defaults: blocking a paying customer on a
    /// malformed callback is judged worse than the misclassification
    /// risk, and server-side verification still has the final word.
    #[instrument(skip(self, params), fields(reference = %params.reference))]
    pub async fn ingest_callback(
        &self,
        customer_id: Uuid,
        params: CallbackParams,
    ) -> Result<PaymentOutcome, ServiceError> {
        let reference = params.reference.clone();
        let flow = self.require_flow(&reference, customer_id)?;

        // Duplicate callback after success: reproduce the original outcome
        if flow.state == PaymentState::Committed {
            if let (Some(receipt), Some(transaction_id)) =
                (flow.receipt.clone(), flow.transaction_id.clone())
            {
                return Ok(self.committed_outcome(&flow, receipt, transaction_id));
            }
        }

        let degraded = params.status.is_none() || params.transaction_id.is_none();
        let status = params.status.unwrap_or_else(|| "SUCCESS".to_string());
        let transaction_id = params
            .transaction_id
            .unwrap_or_else(|| format!("DIRECT-{}", Utc::now().timestamp_millis()));
        if degraded {
            warn!(
                reference,
                "Callback arrived with partial data, proceeding with synthesized defaults"
            );
        }
        self.event_sender
            .send_or_log(Event::PaymentCallbackReceived {
                reference: reference.clone(),
                degraded,
            })
            .await;

        let mut flow = flow;
        flow.state = next(flow.state, PaymentEvent::CallbackReceived)?;

        if !status.eq_ignore_ascii_case("SUCCESS") {
            flow.state = next(flow.state, PaymentEvent::VerificationStarted)?;
            flow.state = next(flow.state, PaymentEvent::VerificationFailed)?;
            self.store_flow(flow);
            STORE_METRICS.payments_failed.inc();
            let reason = format!("Gateway reported status {}", status);
            self.event_sender
                .send_or_log(Event::PaymentFailed {
                    reference: reference.clone(),
                    reason: reason.clone(),
                })
                .await;
            return Ok(PaymentOutcome::Failed { reference, reason });
        }

        flow.state = next(flow.state, PaymentEvent::VerificationStarted)?;
        self.store_flow(flow.clone());

        let confirmed = match self.gateway.verify_payment(&reference).await {
            Ok(confirmed) => confirmed,
            // Transient verification failure: rewind so a retry with the
            // same reference can verify again without double-charging
            Err(e) => {
                flow.state = PaymentState::AwaitingCallback;
                self.store_flow(flow);
                return Err(e);
            }
        };

        if !confirmed {
            flow.state = next(flow.state, PaymentEvent::VerificationFailed)?;
            self.store_flow(flow);
            STORE_METRICS.payments_failed.inc();
            let reason = "Gateway did not confirm this reference as paid".to_string();
            self.event_sender
                .send_or_log(Event::PaymentFailed {
                    reference: reference.clone(),
                    reason: reason.clone(),
                })
                .await;
            return Ok(PaymentOutcome::Failed { reference, reason });
        }

        self.event_sender
            .send_or_log(Event::PaymentVerified {
                reference: reference.clone(),
                transaction_id: transaction_id.clone(),
            })
            .await;

        let method = flow
            .method
            .map(|m| m.to_string())
            .unwrap_or_else(|| PaymentMethod::Emis.to_string());
        let receipt = match self
            .commit
            .commit(
                flow.customer_id,
                &reference,
                &transaction_id,
                &method,
                &flow.cart_snapshot,
            )
            .await
        {
            Ok(receipt) => receipt,
            // The payment went through but no order exists yet; rewind so
            // the attempt can be retried rather than stranding the money
            Err(e) => {
                flow.state = PaymentState::AwaitingCallback;
                self.store_flow(flow);
                return Err(e);
            }
        };

        flow.state = next(flow.state, PaymentEvent::VerificationSucceeded)?;
        flow.transaction_id = Some(transaction_id.clone());
        flow.receipt = Some(receipt.clone());
        STORE_METRICS.record_commit(flow.amount);
        let outcome = self.committed_outcome(&flow, receipt, transaction_id);
        let session_id = flow.session_id.clone();
        self.store_flow(flow);

        // Only now is it safe to drop the cart
        let cart = self.carts.cart(&session_id).await;
        cart.lock().await.clear().await;
        self.event_sender
            .send_or_log(Event::CartCleared { session_id })
            .await;

        Ok(outcome)
    }

    fn committed_outcome(
        &self,
        flow: &PaymentFlow,
        receipt: CommitReceipt,
        transaction_id: String,
    ) -> PaymentOutcome {
        PaymentOutcome::Committed {
            reference: receipt.reference.clone(),
            transaction_id,
            order_id: receipt.order_id,
            invoice_number: receipt.invoice_number,
            total_amount: receipt.total_amount,
            warnings: receipt.warnings,
            dns_hint: flow.has_domain.then(|| DNS_HINT.to_string()),
            mail_hint: flow.has_email.then(|| MAIL_HINT.to_string()),
        }
    }

    /// Abandons the session's live attempt. Nothing durable was written
    /// before commit, so dropping the flow is the whole cleanup; the cart
    /// is left untouched.
    #[instrument(skip(self))]
    pub async fn abandon(&self, customer_id: Uuid, session_id: &str) -> Result<(), ServiceError> {
        let Some(reference) = self.session_refs.get(session_id).map(|r| r.value().clone())
        else {
            return Ok(());
        };
        let flow = self.require_flow(&reference, customer_id)?;
        if flow.state == PaymentState::Committed {
            return Err(ServiceError::InvalidOperation(
                "Payment already committed".to_string(),
            ));
        }

        self.flows.remove(&reference);
        self.session_refs.remove(session_id);
        info!(reference, "Checkout abandoned");
        self.event_sender
            .send_or_log(Event::CheckoutAbandoned { reference })
            .await;
        Ok(())
    }
}
