use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    cart::{CartSessions, CartStorage},
    config::AppConfig,
    events::EventSender,
    services::commerce::{
        CheckoutService, ContactProfileService, OrderCommitService, PaymentGateway,
        PaymentService,
    },
};

// Storefront pipeline services
pub mod commerce;

// Post-purchase read-back
pub mod orders;

// Fixtures shared by unit tests and the integration suite
pub mod test_support;

/// All service instances wired to their shared dependencies. Built once
/// at startup and handed to the router inside the application state.
#[derive(Clone)]
pub struct AppServices {
    pub carts: Arc<CartSessions>,
    pub profiles: Arc<ContactProfileService>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentService>,
    pub orders: Arc<orders::OrderService>,
}

impl AppServices {
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        event_sender: Arc<EventSender>,
        cart_storage: Arc<dyn CartStorage>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let carts = Arc::new(CartSessions::new(cart_storage));
        let profiles = Arc::new(ContactProfileService::new(db.clone(), event_sender.clone()));
        let commit = Arc::new(OrderCommitService::new(
            db.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let payments = Arc::new(PaymentService::new(
            gateway,
            commit,
            carts.clone(),
            event_sender.clone(),
            config,
        ));
        let checkout = Arc::new(CheckoutService::new(
            carts.clone(),
            profiles.clone(),
            payments.clone(),
            event_sender,
        ));
        let orders = Arc::new(orders::OrderService::new(db));

        Self {
            carts,
            profiles,
            checkout,
            payments,
            orders,
        }
    }
}
