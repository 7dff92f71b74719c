//! Monetary fields of an invoice in raw and scaled-integer form.
//!
//! Money is scaled to cents and percentages to basis points before any
//! arithmetic, so an invoice stores only integers and recomputing totals from
//! stored values is exact.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Factor applied to currency units (-> cents) and percentages (-> basis points).
pub const SCALE: i64 = 100;

/// Monetary fields as submitted by a form.
///
/// Every field is lenient: JSON numbers and numeric strings are accepted,
/// anything else (null, empty, `"NaN"`, objects) reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonetaryInput {
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub discount_percent: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal", alias = "gstRate")]
    pub gst_percent: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub paid_amount: Option<Decimal>,
}

impl MonetaryInput {
    pub fn new(amount: Decimal) -> Self {
        Self {
            amount: Some(amount),
            ..Default::default()
        }
    }

    pub fn with_discount(mut self, percent: Decimal) -> Self {
        self.discount_percent = Some(percent);
        self
    }

    pub fn with_gst(mut self, percent: Decimal) -> Self {
        self.gst_percent = Some(percent);
        self
    }

    pub fn with_paid(mut self, amount: Decimal) -> Self {
        self.paid_amount = Some(amount);
        self
    }
}

/// Invoice inputs in scaled-integer form. This is what gets persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledAmounts {
    pub amount_cents: i64,
    pub discount_bps: i64,
    pub gst_bps: i64,
    pub paid_cents: i64,
}

impl ScaledAmounts {
    /// Scale raw input. Absent, malformed and negative values become 0.
    pub fn from_input(input: &MonetaryInput) -> Self {
        Self {
            amount_cents: scale(input.amount),
            discount_bps: scale(input.discount_percent),
            gst_bps: scale(input.gst_percent),
            paid_cents: scale(input.paid_amount),
        }
    }

    pub fn from_f64(amount: f64, discount_percent: f64, gst_rate: f64, paid_amount: f64) -> Self {
        Self {
            amount_cents: scale(decimal_from_f64(amount)),
            discount_bps: scale(decimal_from_f64(discount_percent)),
            gst_bps: scale(decimal_from_f64(gst_rate)),
            paid_cents: scale(decimal_from_f64(paid_amount)),
        }
    }

    /// Overlay the fields present in `patch`; absent fields keep their value.
    pub fn merge(&self, patch: &MonetaryInput) -> Self {
        Self {
            amount_cents: patch.amount.map_or(self.amount_cents, |v| scale(Some(v))),
            discount_bps: patch
                .discount_percent
                .map_or(self.discount_bps, |v| scale(Some(v))),
            gst_bps: patch.gst_percent.map_or(self.gst_bps, |v| scale(Some(v))),
            paid_cents: patch.paid_amount.map_or(self.paid_cents, |v| scale(Some(v))),
        }
    }

    /// Back to currency units and percentages.
    pub fn to_input(&self) -> MonetaryInput {
        MonetaryInput {
            amount: Some(unscale(self.amount_cents)),
            discount_percent: Some(unscale(self.discount_bps)),
            gst_percent: Some(unscale(self.gst_bps)),
            paid_amount: Some(unscale(self.paid_cents)),
        }
    }
}

/// Computed totals in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledTotals {
    pub total_without_gst_cents: i64,
    pub total_with_gst_cents: i64,
    pub remaining_cents: i64,
}

impl ScaledTotals {
    pub fn to_result(&self) -> MonetaryResult {
        MonetaryResult {
            total_without_gst: unscale(self.total_without_gst_cents),
            total_with_gst: unscale(self.total_with_gst_cents),
            remaining_amount: unscale(self.remaining_cents),
        }
    }
}

/// Totals in currency units, two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonetaryResult {
    pub total_without_gst: Decimal,
    pub total_with_gst: Decimal,
    pub remaining_amount: Decimal,
}

pub(crate) fn unscale(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

/// Absent, malformed and negative values are 0. Values too large for i64
/// saturate at `i64::MAX`.
fn scale(value: Option<Decimal>) -> i64 {
    match value {
        Some(v) if !v.is_sign_negative() => checked_scale(v).unwrap_or(i64::MAX),
        _ => 0,
    }
}

/// Scale to cents (or basis points), `None` when the result does not fit.
pub(crate) fn checked_scale(value: Decimal) -> Option<i64> {
    value
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|v| v.to_i64())
}

// f64 Display is the shortest round-trip form, so 1.005 stays "1.005".
fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => parse_decimal(&n.to_string()),
        serde_json::Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    })
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}
