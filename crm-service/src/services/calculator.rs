//! Invoice totals: discount, then GST, then balance after payment.
//!
//! All arithmetic runs on scaled integers (cents and basis points). A rate
//! applied to a cent value is divided back by 10 000 and rounded half away
//! from zero, so the same stored inputs always give the same totals.

use crate::models::{MonetaryInput, MonetaryResult, ScaledAmounts, ScaledTotals};

/// Basis points in 100 %.
const BPS_DIVISOR: i128 = 10_000;

/// Compute totals from plain numbers. NaN, infinite and negative inputs
/// count as 0.
pub fn compute(
    amount: f64,
    discount_percent: f64,
    gst_rate: f64,
    paid_amount: f64,
) -> MonetaryResult {
    let amounts = ScaledAmounts::from_f64(amount, discount_percent, gst_rate, paid_amount);
    compute_scaled(&amounts).to_result()
}

/// Scale form input and compute its totals. Returns both so callers can
/// persist the scaled inputs next to the result.
pub fn compute_input(input: &MonetaryInput) -> (ScaledAmounts, ScaledTotals) {
    let amounts = ScaledAmounts::from_input(input);
    (amounts, compute_scaled(&amounts))
}

pub fn compute_scaled(input: &ScaledAmounts) -> ScaledTotals {
    let amount = i128::from(input.amount_cents);
    let discounted = amount - apply_rate(amount, input.discount_bps);
    let total_with_gst = discounted + apply_rate(discounted, input.gst_bps);
    let remaining = total_with_gst - i128::from(input.paid_cents);

    ScaledTotals {
        total_without_gst_cents: narrow(discounted),
        total_with_gst_cents: narrow(total_with_gst),
        remaining_cents: narrow(remaining),
    }
}

fn apply_rate(cents: i128, bps: i64) -> i128 {
    div_round(cents.saturating_mul(i128::from(bps)), BPS_DIVISOR)
}

fn div_round(numerator: i128, divisor: i128) -> i128 {
    let half = divisor / 2;
    if numerator >= 0 {
        (numerator + half) / divisor
    } else {
        (numerator - half) / divisor
    }
}

fn narrow(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}
