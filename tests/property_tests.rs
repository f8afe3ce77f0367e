//! Property-based tests for the pure pricing, parsing and gating logic.
//!
//! These tests use proptest to verify invariants across a wide range of
//! inputs, helping to catch edge cases that the unit tests in each module
//! do not enumerate.

use proptest::prelude::*;
use proptest::sample::select;

use angohost_api::cart::{
    BillingPeriod, CartItem, DomainDetails, HostingDetails, ItemDetails, ProductKind,
};
use angohost_api::errors::ServiceError;
use angohost_api::services::commerce::payment::{next, PaymentEvent, PaymentMethod, PaymentState};
use angohost_api::services::commerce::pricing::{
    domain_annual_rate, domain_price, is_valid_domain_label, parse_domain, term_price,
    SUPPORTED_EXTENSIONS,
};
use angohost_api::services::commerce::profile_gate::{is_satisfied, requires_profile};

// Strategies for generating test data

fn rate_strategy() -> impl Strategy<Value = i64> {
    0i64..100_000_000
}

/// Registrable labels that the registry accepts: lowercase alphanumerics
/// with interior hyphens only.
fn label_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,12}(-[a-z0-9]{1,8}){0,2}".prop_map(|s| s)
}

fn extension_strategy() -> impl Strategy<Value = &'static str> {
    select(SUPPORTED_EXTENSIONS.to_vec())
}

fn period_strategy() -> impl Strategy<Value = BillingPeriod> {
    prop_oneof![Just(BillingPeriod::Monthly), Just(BillingPeriod::Yearly)]
}

fn domain_item_strategy() -> impl Strategy<Value = CartItem> {
    (
        label_strategy(),
        extension_strategy(),
        any::<bool>(),
        0i64..1_000_000_000,
    )
        .prop_map(|(label, extension, requires_titularity, price)| {
            let name = format!("{}.{}", label, extension);
            CartItem {
                id: format!("domain-{}", name),
                kind: ProductKind::Domain,
                name: name.clone(),
                price,
                period: BillingPeriod::Yearly,
                details: ItemDetails::Domain(DomainDetails {
                    domain_name: name,
                    requires_titularity,
                }),
            }
        })
}

fn hosting_item_strategy() -> impl Strategy<Value = CartItem> {
    (
        "Plano [SML]",
        any::<bool>(),
        0i64..1_000_000_000,
        period_strategy(),
    )
        .prop_map(|(name, existing_domain, price, period)| CartItem {
            id: format!("hosting-{}", name.to_lowercase().replace(' ', "-")),
            kind: ProductKind::Hosting,
            name,
            price,
            period,
            details: ItemDetails::Hosting(HostingDetails { existing_domain }),
        })
}

/// VPS and email lines carry free-form details. Keys stay lowercase so
/// they can never be mistaken for a known camelCase payload shape.
fn plain_item_strategy() -> impl Strategy<Value = CartItem> {
    (
        prop_oneof![Just(ProductKind::Vps), Just(ProductKind::Email)],
        "[a-z][a-z0-9 ]{2,14}",
        prop::collection::btree_map("[a-z]{3,10}", "[a-z0-9 ]{0,12}", 0..4),
        0i64..1_000_000_000,
        period_strategy(),
    )
        .prop_map(|(kind, name, extra, price, period)| {
            let mut details = serde_json::Map::new();
            for (key, value) in extra {
                details.insert(key, serde_json::Value::String(value));
            }
            CartItem {
                id: format!("{}-{}", kind, name.replace(' ', "-")),
                kind,
                name,
                price,
                period,
                details: ItemDetails::Other(details),
            }
        })
}

fn cart_item_strategy() -> impl Strategy<Value = CartItem> {
    prop_oneof![
        domain_item_strategy(),
        hosting_item_strategy(),
        plain_item_strategy(),
    ]
}

fn non_domain_item_strategy() -> impl Strategy<Value = CartItem> {
    prop_oneof![hosting_item_strategy(), plain_item_strategy()]
}

/// A cart that is guaranteed to hold at least one domain registration,
/// placed at an arbitrary position between other lines.
fn domain_cart_strategy() -> impl Strategy<Value = Vec<CartItem>> {
    (
        prop::collection::vec(cart_item_strategy(), 0..3),
        domain_item_strategy(),
        prop::collection::vec(cart_item_strategy(), 0..3),
    )
        .prop_map(|(mut items, domain, tail)| {
            items.push(domain);
            items.extend(tail);
            items
        })
}

fn payment_state_strategy() -> impl Strategy<Value = PaymentState> {
    prop_oneof![
        Just(PaymentState::SelectingMethod),
        Just(PaymentState::GatewayRedirect),
        Just(PaymentState::AwaitingCallback),
        Just(PaymentState::InstructionsIssued),
        Just(PaymentState::Verifying),
        Just(PaymentState::Committed),
        Just(PaymentState::Failed),
    ]
}

fn payment_event_strategy() -> impl Strategy<Value = PaymentEvent> {
    prop_oneof![
        Just(PaymentEvent::Choose(PaymentMethod::Emis)),
        Just(PaymentEvent::Choose(PaymentMethod::BankTransfer)),
        Just(PaymentEvent::CallbackReceived),
        Just(PaymentEvent::VerificationStarted),
        Just(PaymentEvent::VerificationSucceeded),
        Just(PaymentEvent::VerificationFailed),
    ]
}

// Property: commitment pricing follows the published discount tiers exactly
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn one_year_terms_pay_the_full_rate(rate in rate_strategy()) {
        prop_assert_eq!(term_price(rate, 1), rate);
    }

    #[test]
    fn two_year_terms_pay_ninety_percent(rate in rate_strategy()) {
        // rate * 2 * 0.9 == rate * 18 / 10, rounded half away from zero
        let expected = (rate * 18 + 5) / 10;
        prop_assert_eq!(term_price(rate, 2), expected);
    }

    #[test]
    fn three_year_terms_pay_eighty_percent(rate in rate_strategy()) {
        let expected = (rate * 24 + 5) / 10;
        prop_assert_eq!(term_price(rate, 3), expected);
    }

    #[test]
    fn terms_outside_the_tiers_scale_linearly(
        rate in rate_strategy(),
        years in prop_oneof![Just(1u32), 4u32..=10],
    ) {
        prop_assert_eq!(term_price(rate, years), rate * i64::from(years));
    }

    #[test]
    fn longer_terms_never_cost_less_in_total(rate in rate_strategy(), years in 1u32..=4) {
        prop_assert!(
            term_price(rate, years + 1) >= term_price(rate, years),
            "adding a year lowered the total for rate {}",
            rate
        );
    }

    #[test]
    fn totals_never_exceed_the_undiscounted_gross(rate in rate_strategy(), years in 1u32..=10) {
        prop_assert!(term_price(rate, years) <= rate * i64::from(years));
    }
}

// Property: domain registration prices come straight off the rate table
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn every_supported_extension_prices_every_valid_name(
        label in label_strategy(),
        extension in extension_strategy(),
    ) {
        prop_assert!(
            domain_annual_rate(&label, extension).is_some(),
            "no rate for {}.{}",
            label,
            extension
        );
    }

    #[test]
    fn registration_years_multiply_the_rate_with_no_discount(
        label in label_strategy(),
        extension in extension_strategy(),
        years in 1u32..=5,
    ) {
        let rate = domain_annual_rate(&label, extension);
        prop_assert!(rate.is_some());
        let rate = rate.unwrap();
        prop_assert_eq!(domain_price(&label, extension, years), Some(rate * i64::from(years)));
    }

    #[test]
    fn adding_characters_never_raises_the_rate(
        label in label_strategy(),
        extension in extension_strategy(),
    ) {
        let longer = format!("{}a", label);
        prop_assert!(
            domain_annual_rate(&label, extension) >= domain_annual_rate(&longer, extension)
        );
    }

    #[test]
    fn unsupported_extensions_price_nothing(
        label in label_strategy(),
        tld in "[a-z]{2,6}",
    ) {
        prop_assume!(!SUPPORTED_EXTENSIONS.contains(&tld.as_str()));
        prop_assert_eq!(domain_annual_rate(&label, &tld), None);
        prop_assert_eq!(domain_price(&label, &tld, 1), None);
    }
}

// Property: domain parsing accepts exactly what the registry accepts
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn well_formed_domains_round_trip(
        label in label_strategy(),
        extension in extension_strategy(),
    ) {
        let full = format!("{}.{}", label, extension);
        prop_assert_eq!(parse_domain(&full), Some((label, extension.to_string())));
    }

    #[test]
    fn parsing_ignores_case_and_edge_whitespace(
        label in label_strategy(),
        extension in extension_strategy(),
    ) {
        let noisy = format!("  {}.{} ", label.to_ascii_uppercase(), extension.to_ascii_uppercase());
        prop_assert_eq!(parse_domain(&noisy), Some((label, extension.to_string())));
    }

    #[test]
    fn edge_hyphens_never_parse(label in label_strategy(), extension in extension_strategy()) {
        prop_assert_eq!(parse_domain(&format!("-{}.{}", label, extension)), None);
        prop_assert_eq!(parse_domain(&format!("{}-.{}", label, extension)), None);
    }

    #[test]
    fn labels_beyond_the_registry_limit_never_parse(
        len in 64usize..100,
        extension in extension_strategy(),
    ) {
        let label = "a".repeat(len);
        prop_assert!(!is_valid_domain_label(&label));
        prop_assert_eq!(parse_domain(&format!("{}.{}", label, extension)), None);
    }

    #[test]
    fn parsed_output_is_always_registry_valid(input in ".*") {
        if let Some((label, extension)) = parse_domain(&input) {
            prop_assert!(is_valid_domain_label(&label), "invalid label {:?} from {:?}", label, input);
            prop_assert!(SUPPORTED_EXTENSIONS.contains(&extension.as_str()));
        }
    }
}

// Property: cart snapshots rehydrate faithfully or fall back to empty
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn snapshots_rehydrate_to_the_same_lines(
        items in prop::collection::vec(cart_item_strategy(), 0..8),
    ) {
        // The details payload is persisted untagged, so the variant must be
        // recovered purely from its shape on the way back in
        let snapshot = serde_json::to_string(&items);
        prop_assert!(snapshot.is_ok());
        let rehydrated: Result<Vec<CartItem>, _> = serde_json::from_str(&snapshot.unwrap());
        prop_assert!(rehydrated.is_ok());
        prop_assert_eq!(rehydrated.unwrap(), items);
    }

    #[test]
    fn unknown_fields_do_not_break_rehydration(
        items in prop::collection::vec(cart_item_strategy(), 1..5),
        extra_key in "zz[a-z]{3,8}",
    ) {
        let mut snapshot = serde_json::to_value(&items);
        prop_assert!(snapshot.is_ok());
        if let Ok(serde_json::Value::Array(lines)) = snapshot.as_mut() {
            for line in lines {
                if let serde_json::Value::Object(object) = line {
                    object.insert(extra_key.clone(), serde_json::Value::from(42));
                }
            }
        }
        let rehydrated: Result<Vec<CartItem>, _> =
            serde_json::from_value(snapshot.unwrap());
        prop_assert!(rehydrated.is_ok());
        prop_assert_eq!(rehydrated.unwrap(), items);
    }

    #[test]
    fn snapshots_without_an_array_rehydrate_empty(junk in "[^\\[]{0,60}") {
        let rehydrated =
            serde_json::from_str::<Vec<CartItem>>(&junk).unwrap_or_default();
        prop_assert!(rehydrated.is_empty());
    }
}

// Property: the contact profile gate depends only on what the cart holds
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn carts_holding_a_domain_always_require_a_profile(cart in domain_cart_strategy()) {
        prop_assert!(requires_profile(&cart));
        prop_assert!(!is_satisfied(&cart, None));
    }

    #[test]
    fn domainless_carts_never_require_a_profile(
        cart in prop::collection::vec(non_domain_item_strategy(), 0..6),
    ) {
        prop_assert!(!requires_profile(&cart));
        prop_assert!(is_satisfied(&cart, None));
    }

    #[test]
    fn a_selected_profile_satisfies_any_cart(
        cart in prop::collection::vec(cart_item_strategy(), 0..6),
    ) {
        prop_assert!(is_satisfied(&cart, Some(uuid::Uuid::new_v4())));
    }

    #[test]
    fn line_order_never_changes_the_gate(
        cart in prop::collection::vec(cart_item_strategy(), 0..6),
        shift in 0usize..6,
    ) {
        let mut rotated = cart.clone();
        if !rotated.is_empty() {
            let len = rotated.len();
            rotated.rotate_left(shift % len);
        }
        prop_assert_eq!(requires_profile(&rotated), requires_profile(&cart));
    }
}

// Property: the payment machine only ever moves forward
proptest! {
    #[test]
    fn terminal_states_accept_no_further_events(
        state in prop_oneof![Just(PaymentState::Committed), Just(PaymentState::Failed)],
        event in payment_event_strategy(),
    ) {
        prop_assert!(next(state, event).is_err());
    }

    #[test]
    fn transitions_move_forward_or_reject_cleanly(
        state in payment_state_strategy(),
        event in payment_event_strategy(),
    ) {
        match next(state, event) {
            Ok(to) => {
                prop_assert_ne!(to, state, "transition must change the state");
                prop_assert_ne!(to, PaymentState::SelectingMethod,
                    "no event may reopen method selection");
            }
            Err(ServiceError::InvalidOperation(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error kind: {:?}", other),
        }
    }
}
