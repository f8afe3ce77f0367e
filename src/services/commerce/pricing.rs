//! Price computation for cart lines.
//!
//! Everything here is pure: cart totals must stay deterministic and
//! testable without any service wiring. All amounts are integer Kwanza.
//!
//! Two distinct axes exist and must not be conflated. Hosting, VPS and
//! email plans are priced per commitment period with multi-year discount
//! tiers. Domain registrations are priced from a rate table keyed by name
//! length and extension, multiplied by the registration length with no
//! discount tier.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Price for committing to a plan for `years` years.
///
/// Two-year commitments earn 10% off, three-year 20%. The discounted
/// product is rounded half away from zero to the nearest Kwanza right
/// away so no fractional money survives.
pub fn term_price(base_annual_rate: i64, years: u32) -> i64 {
    let discount = match years {
        2 => dec!(0.10),
        3 => dec!(0.20),
        _ => Decimal::ZERO,
    };

    let gross = Decimal::from(base_annual_rate) * Decimal::from(years) * (Decimal::ONE - discount);
    gross
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Extensions sold by the storefront, longest first so that
/// `parse_domain` matches `co.ao` before `ao`.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["co.ao", "org.ao", "edu.ao", "it.ao", "ao"];

/// Annual registration rates, indexed by [`LengthClass`]
static DOMAIN_ANNUAL_RATES: Lazy<HashMap<&'static str, [i64; 3]>> = Lazy::new(|| {
    HashMap::from([
        ("ao", [300_000, 70_000, 25_000]),
        ("co.ao", [150_000, 35_000, 5_000]),
        ("org.ao", [150_000, 35_000, 5_000]),
        ("edu.ao", [150_000, 35_000, 5_000]),
        ("it.ao", [150_000, 35_000, 5_000]),
    ])
});

/// Registrable-name length classes with distinct registry pricing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthClass {
    /// 1 or 2 characters
    Short,
    /// Exactly 3 characters
    Medium,
    /// 4 characters or more
    Standard,
}

impl LengthClass {
    pub fn of(name: &str) -> Self {
        match name.chars().count() {
            0..=2 => LengthClass::Short,
            3 => LengthClass::Medium,
            _ => LengthClass::Standard,
        }
    }

    fn rate_index(self) -> usize {
        match self {
            LengthClass::Short => 0,
            LengthClass::Medium => 1,
            LengthClass::Standard => 2,
        }
    }
}

static DOMAIN_LABEL: Lazy<Regex> = Lazy::new(|| {
    // Lowercase label per registry rules, no leading or trailing hyphen
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap()
});

pub fn is_valid_domain_label(label: &str) -> bool {
    label.len() <= 63 && DOMAIN_LABEL.is_match(label)
}

/// Splits `exemplo.co.ao` into `("exemplo", "co.ao")`. Returns `None` for
/// unsupported extensions or labels the registry would reject.
pub fn parse_domain(full: &str) -> Option<(String, String)> {
    let lowered = full.trim().to_ascii_lowercase();
    for extension in SUPPORTED_EXTENSIONS {
        if let Some(label) = lowered.strip_suffix(&format!(".{}", extension)) {
            if is_valid_domain_label(label) {
                return Some((label.to_string(), extension.to_string()));
            }
            return None;
        }
    }
    None
}

/// Annual rate for a registrable name under an extension, `None` when the
/// extension is not sold here
pub fn domain_annual_rate(name: &str, extension: &str) -> Option<i64> {
    DOMAIN_ANNUAL_RATES
        .get(extension)
        .map(|rates| rates[LengthClass::of(name).rate_index()])
}

/// Registration price for `years` years. Registration length multiplies
/// the annual rate directly; the commitment-period discount tiers do not
/// apply to domains.
pub fn domain_price(name: &str, extension: &str, years: u32) -> Option<i64> {
    domain_annual_rate(name, extension).map(|rate| rate.saturating_mul(i64::from(years)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Term Price Tests ====================

    #[test]
    fn one_year_has_no_discount() {
        assert_eq!(term_price(10000, 1), 10000);
        assert_eq!(term_price(25000, 1), 25000);
    }

    #[test]
    fn two_years_earn_ten_percent() {
        assert_eq!(term_price(10000, 2), 18000);
    }

    #[test]
    fn three_years_earn_twenty_percent() {
        assert_eq!(term_price(10000, 3), 24000);
    }

    #[test]
    fn fractional_results_round_to_nearest_kwanza() {
        // 1234 * 2 * 0.9 = 2221.2
        assert_eq!(term_price(1234, 2), 2221);
        // 1111 * 3 * 0.8 = 2666.4
        assert_eq!(term_price(1111, 3), 2666);
        // 1039 * 2 * 0.9 = 1870.2
        assert_eq!(term_price(1039, 2), 1870);
    }

    #[test]
    fn zero_rate_is_zero_for_any_term() {
        assert_eq!(term_price(0, 1), 0);
        assert_eq!(term_price(0, 3), 0);
    }

    // ==================== Domain Rate Tests ====================

    #[test]
    fn standard_ao_name_matches_storefront_rate() {
        assert_eq!(domain_annual_rate("exemplo", "ao"), Some(25000));
        assert_eq!(domain_price("exemplo", "ao", 1), Some(25000));
    }

    #[test]
    fn short_names_carry_premium_rates() {
        assert_eq!(domain_annual_rate("ab", "ao"), Some(300000));
        assert_eq!(domain_annual_rate("abc", "ao"), Some(70000));
        assert_eq!(domain_annual_rate("abcd", "ao"), Some(25000));
    }

    #[test]
    fn registration_length_multiplies_without_discount() {
        // Contrast with term_price: no tier applies to domains
        assert_eq!(domain_price("exemplo", "ao", 2), Some(50000));
        assert_eq!(domain_price("exemplo", "ao", 3), Some(75000));
        assert_ne!(domain_price("exemplo", "ao", 2), Some(term_price(25000, 2)));
    }

    #[test]
    fn unknown_extension_has_no_rate() {
        assert_eq!(domain_annual_rate("exemplo", "com"), None);
        assert_eq!(domain_price("exemplo", "com", 1), None);
    }

    // ==================== Domain Parsing Tests ====================

    #[test]
    fn parse_matches_longest_extension_first() {
        assert_eq!(
            parse_domain("exemplo.co.ao"),
            Some(("exemplo".to_string(), "co.ao".to_string()))
        );
        assert_eq!(
            parse_domain("exemplo.ao"),
            Some(("exemplo".to_string(), "ao".to_string()))
        );
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        assert_eq!(
            parse_domain("  Exemplo.AO "),
            Some(("exemplo".to_string(), "ao".to_string()))
        );
    }

    #[test]
    fn parse_rejects_invalid_labels() {
        assert_eq!(parse_domain("-mal.ao"), None);
        assert_eq!(parse_domain("mal-.ao"), None);
        assert_eq!(parse_domain(".ao"), None);
        assert_eq!(parse_domain("com espaço.ao"), None);
        assert_eq!(parse_domain("exemplo.com"), None);
    }

    #[test]
    fn hyphenated_interior_labels_are_valid() {
        assert_eq!(
            parse_domain("minha-loja.co.ao"),
            Some(("minha-loja".to_string(), "co.ao".to_string()))
        );
    }
}
