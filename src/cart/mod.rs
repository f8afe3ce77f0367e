//! Session shopping cart: typed line items, the mutable store that owns
//! them, and the persistence layer that survives page reloads.

pub mod item;
pub mod storage;
pub mod store;

pub use item::{
    BillingPeriod, CartItem, CartItemPatch, DomainDetails, HostingDetails, ItemDetails, ProductKind,
};
pub use storage::{CartStorage, FileCartStorage, InMemoryCartStorage, CART_STORAGE_KEY};
pub use store::{AddOutcome, CartSessions, CartStore};
