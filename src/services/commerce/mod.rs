/// Commerce services - cart-to-paid-order pipeline
pub mod checkout;
pub mod commit;
pub mod contact_profiles;
pub mod payment;
pub mod pricing;
pub mod profile_gate;

// Re-export services for convenience
pub use checkout::{CheckoutError, CheckoutService, PaymentHandoff};
pub use commit::{CommitReceipt, OrderCommitService};
pub use contact_profiles::{
    ContactProfileService, CreateContactProfileInput, UpdateContactProfileInput,
};
pub use payment::{
    CallbackParams, EmisGatewayClient, MethodSelection, PaymentFlow, PaymentGateway,
    PaymentMethod, PaymentOutcome, PaymentService, PaymentState, PaymentStatus, SimulatedGateway,
};
