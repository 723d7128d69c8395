use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::WhatsAppConfig;
use crate::paypal::read_json;

const GRAPH_API_VERSION: &str = "v18.0";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("WhatsApp request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("WhatsApp API returned status {status}")]
    Rejected { status: u16, details: Value },
}

/// Message handed to a sender. `order_id` is echoed back for correlation.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub to: String,
    pub body: String,
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent { message_id: Option<String> },
    Logged,
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<Delivery, NotifyError>;

    fn is_live(&self) -> bool;
}

#[derive(Serialize)]
struct GraphText<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct GraphMessage<'a> {
    messaging_product: &'static str,
    to: &'a str,
    text: GraphText<'a>,
}

/// Sends through the WhatsApp Business Cloud API.
pub struct LiveSender {
    http: Client,
    config: WhatsAppConfig,
}

impl LiveSender {
    pub fn new(http: Client, config: WhatsAppConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl MessageSender for LiveSender {
    async fn send(&self, message: &OutboundMessage) -> Result<Delivery, NotifyError> {
        let url = format!(
            "{}/{}/{}/messages",
            self.config.graph_url, GRAPH_API_VERSION, self.config.phone_number_id
        );
        let payload = GraphMessage {
            messaging_product: "whatsapp",
            to: &message.to,
            text: GraphText { body: &message.body },
        };
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await?;
        let (status, body) = read_json(response).await?;
        if !(200..300).contains(&status) {
            warn!(status, to = %message.to, details = %body, "WhatsApp API rejected message");
            return Err(NotifyError::Rejected { status, details: body });
        }
        let message_id = body
            .pointer("/messages/0/id")
            .and_then(Value::as_str)
            .map(str::to_string);
        info!(to = %message.to, order_id = ?message.order_id, ?message_id, "WhatsApp message sent");
        Ok(Delivery::Sent { message_id })
    }

    fn is_live(&self) -> bool {
        true
    }
}

/// Development fallback used when no WhatsApp credentials are configured.
pub struct LogOnlySender;

#[async_trait]
impl MessageSender for LogOnlySender {
    async fn send(&self, message: &OutboundMessage) -> Result<Delivery, NotifyError> {
        info!(
            to = %message.to,
            order_id = ?message.order_id,
            body = %message.body,
            "WhatsApp message would be sent"
        );
        Ok(Delivery::Logged)
    }

    fn is_live(&self) -> bool {
        false
    }
}

pub fn sender_from_config(http: Client, config: Option<&WhatsAppConfig>) -> Arc<dyn MessageSender> {
    match config {
        Some(whatsapp) => Arc::new(LiveSender::new(http, whatsapp.clone())),
        None => Arc::new(LogOnlySender),
    }
}

impl Delivery {
    /// Response body for the send-message endpoint.
    pub fn to_json(&self, message: &OutboundMessage) -> Value {
        match self {
            Delivery::Sent { message_id } => json!({
                "success": true,
                "messageId": message_id,
                "to": message.to,
                "orderId": message.order_id,
            }),
            Delivery::Logged => json!({
                "success": true,
                "message": "Message logged (WhatsApp API not configured)",
                "to": message.to,
                "orderId": message.order_id,
            }),
        }
    }
}
