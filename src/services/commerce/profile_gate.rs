//! Contact profile gate.
//!
//! Domain registry rules require registrant identity data before a domain
//! purchase can be submitted, so checkout is blocked until a profile is
//! selected. Both inputs (cart contents, selection) change independently,
//! so callers re-evaluate on every change instead of caching the result.

use uuid::Uuid;

use crate::cart::{CartItem, ProductKind};

/// True when the cart needs a contact profile: it holds at least one
/// domain registration, and is not the single exception of exactly one
/// hosting line bound to a domain the customer already owns.
pub fn requires_profile(items: &[CartItem]) -> bool {
    let has_domain = items.iter().any(|item| item.kind == ProductKind::Domain);

    let sole_existing_domain_hosting = items.len() == 1
        && items[0].kind == ProductKind::Hosting
        && items[0].details.is_existing_domain();

    has_domain && !sole_existing_domain_hosting
}

/// True when checkout may proceed past the gate
pub fn is_satisfied(items: &[CartItem], selected_profile: Option<Uuid>) -> bool {
    !requires_profile(items) || selected_profile.is_some()
}
