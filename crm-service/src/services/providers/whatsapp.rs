use super::{ProviderError, ProviderResponse, WhatsAppMessage, WhatsAppSender};
use crate::config::WhatsAppConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// WhatsApp Business Cloud API sender (text messages only).
pub struct CloudApiWhatsApp {
    config: WhatsAppConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CloudApiRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: CloudApiText<'a>,
}

#[derive(Debug, Serialize)]
struct CloudApiText<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct CloudApiResponse {
    #[serde(default)]
    messages: Vec<CloudApiMessageId>,
}

#[derive(Debug, Deserialize)]
struct CloudApiMessageId {
    id: String,
}

impl CloudApiWhatsApp {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/{}/messages",
            self.config.api_base.trim_end_matches('/'),
            self.config.phone_number_id
        )
    }
}

/// Digits only, as the Cloud API expects (country code included, no `+`).
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[async_trait]
impl WhatsAppSender for CloudApiWhatsApp {
    async fn send(&self, message: &WhatsAppMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::NotEnabled(
                "WhatsApp provider is not enabled".to_string(),
            ));
        }

        let to = normalize_phone(&message.to);
        if to.is_empty() {
            return Err(ProviderError::InvalidRecipient(
                "Phone number is empty".to_string(),
            ));
        }

        let request = CloudApiRequest {
            messaging_product: "whatsapp",
            to: &to,
            message_type: "text",
            text: CloudApiText {
                body: &message.body,
            },
        };

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ProviderError::Connection(format!("Failed to connect to WhatsApp API: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed(format!(
                "WhatsApp API returned error status {}: {}",
                status, body
            )));
        }

        let parsed: CloudApiResponse = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse WhatsApp response: {}", e))
        })?;

        tracing::info!(to = %to, "WhatsApp message sent successfully");

        Ok(ProviderResponse::success(
            parsed.messages.into_iter().next().map(|m| m.id),
        ))
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Mock WhatsApp sender for testing
pub struct MockWhatsApp {
    enabled: bool,
    send_count: AtomicU64,
}

impl MockWhatsApp {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            send_count: AtomicU64::new(0),
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WhatsAppSender for MockWhatsApp {
    async fn send(&self, message: &WhatsAppMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "Mock WhatsApp sender is not enabled".to_string(),
            ));
        }

        let count = self.send_count.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::info!(
            to = %message.to,
            body_length = message.body.len(),
            "[MOCK] WhatsApp message would be sent"
        );

        Ok(ProviderResponse::success(Some(format!(
            "mock-whatsapp-{}",
            count
        ))))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
