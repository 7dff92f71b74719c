pub mod email;
pub mod whatsapp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use email::{MockMailer, SmtpMailer};
pub use whatsapp::{CloudApiWhatsApp, MockWhatsApp};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider_id: Option<String>,
    pub success: bool,
    pub message: Option<String>,
}

impl ProviderResponse {
    pub fn success(provider_id: Option<String>) -> Self {
        Self {
            provider_id,
            success: true,
            message: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct WhatsAppMessage {
    pub to: String,
    pub body: String,
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &MailMessage) -> Result<ProviderResponse, ProviderError>;
    fn is_enabled(&self) -> bool;
}

#[async_trait]
pub trait WhatsAppSender: Send + Sync {
    async fn send(&self, message: &WhatsAppMessage) -> Result<ProviderResponse, ProviderError>;
    fn is_enabled(&self) -> bool;
}
