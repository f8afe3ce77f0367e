//! Kwanza display formatting.
//!
//! All amounts in this system are minor-unit-free AOA integers; display
//! formatting groups thousands with `.` (pt-AO convention) and appends the
//! `Kz` symbol. No arithmetic happens here.

/// Formats an integer AOA amount for display, e.g. `25000` -> `"25.000 Kz"`.
pub fn format_kwanza(amount: i64) -> String {
    format!("{} Kz", group_thousands(amount))
}

/// Groups an integer's digits in threes with `.` separators.
pub fn group_thousands(amount: i64) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    let offset = digits.len() % 3;
    for (i, ch) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - offset) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
