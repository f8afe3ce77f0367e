use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the processing loop
    /// is gone. Domain operations never abort because of event delivery.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            error!("Event delivery failed: {}", e);
        }
    }
}

// The events that can occur across the cart-to-paid-order pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        session_id: String,
        item_id: String,
        merged: bool,
    },
    CartItemRemoved {
        session_id: String,
        item_id: String,
    },
    CartItemUpdated {
        session_id: String,
        item_id: String,
    },
    CartCleared {
        session_id: String,
    },

    // Contact profile events
    ContactProfileSaved(Uuid),

    // Checkout events
    CheckoutStarted {
        session_id: String,
        customer_id: Uuid,
        reference: String,
        amount: i64,
    },
    CheckoutAbandoned {
        reference: String,
    },

    // Payment lifecycle events
    PaymentMethodSelected {
        reference: String,
        method: String,
    },
    GatewayRedirectIssued {
        reference: String,
    },
    BankTransferInstructionsIssued {
        reference: String,
    },
    PaymentCallbackReceived {
        reference: String,
        degraded: bool,
    },
    PaymentVerified {
        reference: String,
        transaction_id: String,
    },
    PaymentFailed {
        reference: String,
        reason: String,
    },

    // Order commit events
    OrderCommitted {
        order_id: Uuid,
        reference: String,
        total_amount: i64,
    },
    CommitFollowUpSkipped {
        reference: String,
        step: String,
    },
}

// Processes incoming events. Everything here is observational: the domain
// services have already made their state changes before emitting.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::CartItemAdded {
                ref session_id,
                ref item_id,
                merged,
            } => {
                if merged {
                    info!(session_id, item_id, "Cart item replaced existing entry");
                } else {
                    info!(session_id, item_id, "Cart item added");
                }
            }
            Event::CartCleared { ref session_id } => {
                info!(session_id, "Cart cleared");
            }
            Event::CheckoutStarted {
                ref session_id,
                customer_id,
                ref reference,
                amount,
            } => {
                info!(
                    session_id,
                    %customer_id,
                    reference,
                    amount,
                    "Checkout started"
                );
            }
            Event::PaymentCallbackReceived {
                ref reference,
                degraded,
            } => {
                if degraded {
                    warn!(reference, "Accepted reference-only payment callback");
                } else {
                    info!(reference, "Payment callback received");
                }
            }
            Event::PaymentFailed {
                ref reference,
                ref reason,
            } => {
                warn!(reference, reason, "Payment failed");
            }
            Event::OrderCommitted {
                order_id,
                ref reference,
                total_amount,
            } => {
                info!(%order_id, reference, total_amount, "Order committed");
            }
            Event::CommitFollowUpSkipped {
                ref reference,
                ref step,
            } => {
                warn!(reference, step, "Commit follow-up step skipped");
            }
            other => {
                info!("Event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}
