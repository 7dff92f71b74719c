//! On-demand invoice reminders sent by e-mail and WhatsApp.
//!
//! Separate from the scheduled sweep: nothing is persisted and nothing is
//! pushed live. Provider failures come back as `success: false`.

use crate::models::{Invoice, ReminderContent};
use crate::services::metrics::record_provider_call;
use crate::services::providers::{
    MailMessage, MailSender, ProviderError, ProviderResponse, WhatsAppMessage, WhatsAppSender,
};
use serde::Serialize;
use std::sync::Arc;

/// `{success, providerResponse}` or `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendOutcome {
    fn from_result(result: Result<ProviderResponse, ProviderError>) -> Self {
        match result {
            Ok(response) => Self {
                success: response.success,
                provider_response: response.provider_id.or(response.message),
                error: None,
            },
            Err(e) => Self {
                success: false,
                provider_response: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Per-channel results. A channel is `None` when the invoice has no
/// address for it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderDelivery {
    pub email: Option<SendOutcome>,
    pub whatsapp: Option<SendOutcome>,
}

impl ReminderDelivery {
    pub fn any_sent(&self) -> bool {
        [&self.email, &self.whatsapp]
            .into_iter()
            .flatten()
            .any(|outcome| outcome.success)
    }
}

#[derive(Clone)]
pub struct ManualReminderService {
    mailer: Arc<dyn MailSender>,
    whatsapp: Arc<dyn WhatsAppSender>,
}

impl ManualReminderService {
    pub fn new(mailer: Arc<dyn MailSender>, whatsapp: Arc<dyn WhatsAppSender>) -> Self {
        Self { mailer, whatsapp }
    }

    pub async fn remind_invoice(&self, invoice: &Invoice) -> ReminderDelivery {
        let content = ReminderContent::for_record(invoice);

        let email = match non_blank(invoice.email.as_deref()) {
            Some(to) => {
                let mail = MailMessage {
                    to: to.to_string(),
                    subject: content.title.clone(),
                    body: content.message.clone(),
                };
                let result = self.mailer.send(&mail).await;
                record_provider_call("email", result.is_ok());
                Some(SendOutcome::from_result(result))
            }
            None => None,
        };

        let whatsapp = match non_blank(invoice.phone.as_deref()) {
            Some(to) => {
                let message = WhatsAppMessage {
                    to: to.to_string(),
                    body: content.message.clone(),
                };
                let result = self.whatsapp.send(&message).await;
                record_provider_call("whatsapp", result.is_ok());
                Some(SendOutcome::from_result(result))
            }
            None => None,
        };

        let delivery = ReminderDelivery { email, whatsapp };

        if delivery.any_sent() {
            tracing::info!(
                tenant_id = %invoice.tenant_id,
                invoice_id = %invoice.invoice_id,
                "Manual invoice reminder sent"
            );
        } else {
            tracing::warn!(
                tenant_id = %invoice.tenant_id,
                invoice_id = %invoice.invoice_id,
                delivery = ?delivery,
                "Manual invoice reminder was not delivered"
            );
        }

        delivery
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
