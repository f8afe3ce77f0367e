/// Storefront API handlers
pub mod cart;
pub mod checkout;
pub mod payment;
pub mod pricing;
pub mod profiles;
