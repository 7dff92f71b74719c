//! Invoice model for crm-service.

use crate::models::money::checked_scale;
use crate::models::{MonetaryInput, MonetaryResult, ScaledAmounts, ScaledTotals};
use crate::services::calculator;
use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::{chrono_datetime_as_bson_datetime, uuid_1_as_binary};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Paid,
    Unpaid,
    Pending,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::Pending => "pending",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => InvoiceStatus::Paid,
            "pending" => InvoiceStatus::Pending,
            _ => InvoiceStatus::Unpaid,
        }
    }
}

/// Invoice document.
///
/// Inputs and totals are both kept in scaled-integer form; `totals` is always
/// `calculator::compute_scaled(&amounts)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id", with = "uuid_1_as_binary")]
    pub invoice_id: Uuid,
    #[serde(with = "uuid_1_as_binary")]
    pub tenant_id: Uuid,
    pub invoice_number: Option<String>,
    pub customer_name: String,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub currency: String,
    pub amounts: ScaledAmounts,
    pub totals: ScaledTotals,
    pub status: InvoiceStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn new(tenant_id: Uuid, input: CreateInvoice) -> Self {
        let (amounts, totals) = calculator::compute_input(&input.amounts);
        let now = Utc::now();

        Self {
            invoice_id: Uuid::new_v4(),
            tenant_id,
            invoice_number: input.invoice_number,
            customer_name: input.customer_name,
            company_name: input.company_name,
            email: input.email,
            phone: input.phone,
            currency: input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            amounts,
            totals,
            status: input.status.unwrap_or(InvoiceStatus::Unpaid),
            due_date: input.due_date,
            notes: input.notes,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Apply an update and recompute totals from the merged inputs.
    pub fn apply(&mut self, update: UpdateInvoice) {
        if let Some(customer_name) = update.customer_name {
            self.customer_name = customer_name;
        }
        if update.company_name.is_some() {
            self.company_name = update.company_name;
        }
        if update.email.is_some() {
            self.email = update.email;
        }
        if update.phone.is_some() {
            self.phone = update.phone;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = due_date;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if update.notes.is_some() {
            self.notes = update.notes;
        }

        self.amounts = self.amounts.merge(&update.amounts);
        self.recompute();
    }

    pub fn recompute(&mut self) {
        self.totals = calculator::compute_scaled(&self.amounts);
        self.updated_utc = Utc::now();
    }

    /// Add a payment. Settles to Paid once nothing remains, Pending otherwise.
    /// The invoice is left untouched when the amount is rejected.
    pub fn record_payment(&mut self, amount: Decimal) -> Result<(), AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let paid_cents = checked_scale(amount)
            .and_then(|cents| self.amounts.paid_cents.checked_add(cents))
            .ok_or_else(|| {
                AppError::BadRequest(anyhow::anyhow!(
                    "Payment amount {} is out of range",
                    amount
                ))
            })?;

        self.amounts.paid_cents = paid_cents;
        self.recompute();

        self.status = if self.totals.remaining_cents <= 0 {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Pending
        };
        Ok(())
    }

    /// Customer name, with the company in parentheses when one is set.
    pub fn display_name(&self) -> String {
        match self.company_name.as_deref().map(str::trim) {
            Some(company) if !company.is_empty() => {
                format!("{} ({})", self.customer_name, company)
            }
            _ => self.customer_name.clone(),
        }
    }

    pub fn result(&self) -> MonetaryResult {
        self.totals.to_result()
    }

    pub fn remaining_amount(&self) -> Decimal {
        self.result().remaining_amount
    }
}

pub const DEFAULT_CURRENCY: &str = "INR";

/// Input for creating an invoice.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoice {
    pub invoice_number: Option<String>,
    #[validate(length(min = 1, max = 200, message = "customer name is required"))]
    pub customer_name: String,
    #[validate(length(max = 200))]
    pub company_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[serde(flatten)]
    pub amounts: MonetaryInput,
    pub status: Option<InvoiceStatus>,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Input for updating an invoice. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoice {
    #[validate(length(min = 1, max = 200))]
    pub customer_name: Option<String>,
    #[validate(length(max = 200))]
    pub company_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub amounts: MonetaryInput,
    pub status: Option<InvoiceStatus>,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl UpdateInvoice {
    pub fn amounts(amounts: MonetaryInput) -> Self {
        Self {
            amounts,
            ..Default::default()
        }
    }
}
