use crate::models::{CreateInvoice, Invoice, UpdateInvoice};
use crate::services::store::RecordStore;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Invoice lifecycle. Every change recomputes totals from the stored
/// scaled inputs before persisting.
#[derive(Clone)]
pub struct InvoiceService {
    store: Arc<dyn RecordStore>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        input: CreateInvoice,
    ) -> Result<Invoice, AppError> {
        input.validate()?;

        let invoice = Invoice::new(tenant_id, input);
        self.store.insert_invoice(&invoice).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            invoice_id = %invoice.invoice_id,
            total_with_gst = %invoice.result().total_with_gst,
            due_date = %invoice.due_date,
            "Invoice created"
        );

        Ok(invoice)
    }

    pub async fn get(&self, tenant_id: Uuid, invoice_id: Uuid) -> Result<Invoice, AppError> {
        self.store
            .find_invoice(tenant_id, invoice_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Invoice {} not found", invoice_id))
            })
    }

    pub async fn update(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        update: UpdateInvoice,
    ) -> Result<Invoice, AppError> {
        update.validate()?;

        let mut invoice = self.get(tenant_id, invoice_id).await?;
        invoice.apply(update);
        self.store.replace_invoice(&invoice).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            invoice_id = %invoice_id,
            total_with_gst = %invoice.result().total_with_gst,
            remaining = %invoice.remaining_amount(),
            "Invoice updated"
        );

        Ok(invoice)
    }

    pub async fn record_payment(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
        amount: Decimal,
    ) -> Result<Invoice, AppError> {
        let mut invoice = self.get(tenant_id, invoice_id).await?;
        invoice.record_payment(amount)?;
        self.store.replace_invoice(&invoice).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            invoice_id = %invoice_id,
            amount = %amount,
            status = invoice.status.as_str(),
            "Payment recorded"
        );

        Ok(invoice)
    }
}
