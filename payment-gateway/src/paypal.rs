use common_money::Amount;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::PayPalConfig;

const DEFAULT_CURRENCY: &str = "USD";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum PayPalError {
    #[error("PayPal request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("PayPal token exchange returned status {status}")]
    Auth { status: u16, details: Value },
    #[error("PayPal token response carried no access_token")]
    MissingToken,
    #[error("PayPal API returned status {status}")]
    Api { status: u16, details: Value },
}

/// Order creation input as posted by the checkout front end.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub intent: Option<String>,
    pub purchase_units: Vec<PurchaseUnitInput>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PurchaseUnitInput {
    #[serde(default)]
    pub reference_id: Option<String>,
    pub amount: UnitAmountInput,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Option<Vec<ItemInput>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnitAmountInput {
    #[serde(default)]
    pub currency_code: Option<String>,
    pub value: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemInput {
    pub name: String,
    pub quantity: Value,
    pub unit_amount: ItemAmountInput,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemAmountInput {
    pub value: Amount,
}

#[derive(Debug, Serialize)]
pub struct OrderRequest {
    pub intent: String,
    pub purchase_units: Vec<PurchaseUnit>,
    pub application_context: ApplicationContext,
}

#[derive(Debug, Serialize)]
pub struct PurchaseUnit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub amount: UnitAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
}

#[derive(Debug, Serialize)]
pub struct UnitAmount {
    pub currency_code: String,
    pub value: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
}

#[derive(Debug, Serialize)]
pub struct Breakdown {
    pub item_total: Money,
}

#[derive(Debug, Serialize)]
pub struct Money {
    pub currency_code: String,
    pub value: Amount,
}

#[derive(Debug, Serialize)]
pub struct Item {
    pub name: String,
    pub quantity: String,
    pub unit_amount: Money,
}

#[derive(Debug, Serialize)]
pub struct ApplicationContext {
    pub return_url: String,
    pub cancel_url: String,
    pub brand_name: String,
    pub landing_page: &'static str,
    pub user_action: &'static str,
}

impl OrderRequest {
    /// Map checkout input onto the Orders v2 payload. Each unit's currency
    /// (default USD) is applied to its items and breakdown.
    pub fn from_input(input: CreateOrderRequest, config: &PayPalConfig, site_url: &str) -> OrderRequest {
        let purchase_units = input
            .purchase_units
            .into_iter()
            .map(|unit| {
                let currency = unit
                    .amount
                    .currency_code
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
                let breakdown = unit
                    .amount
                    .breakdown
                    .filter(|b| !b.is_null())
                    .map(|_| Breakdown {
                        item_total: Money { currency_code: currency.clone(), value: unit.amount.value.clone() },
                    });
                let items = unit.items.map(|items| {
                    items
                        .into_iter()
                        .map(|item| Item {
                            name: item.name,
                            quantity: quantity_text(&item.quantity),
                            unit_amount: Money { currency_code: currency.clone(), value: item.unit_amount.value },
                        })
                        .collect()
                });
                PurchaseUnit {
                    reference_id: unit.reference_id,
                    amount: UnitAmount { currency_code: currency, value: unit.amount.value, breakdown },
                    description: unit.description,
                    items,
                }
            })
            .collect();

        OrderRequest {
            intent: input
                .intent
                .filter(|i| !i.trim().is_empty())
                .unwrap_or_else(|| "CAPTURE".to_string()),
            purchase_units,
            application_context: ApplicationContext {
                return_url: format!("{site_url}/payment-success"),
                cancel_url: format!("{site_url}/payment-cancelled"),
                brand_name: config.brand_name.clone(),
                landing_page: "NO_PREFERENCE",
                user_action: "PAY_NOW",
            },
        }
    }
}

fn quantity_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Client-credential authenticated relay to the PayPal Orders API.
#[derive(Clone)]
pub struct PayPalClient {
    http: Client,
    config: PayPalConfig,
    token: Arc<RwLock<Option<CachedToken>>>,
}

impl PayPalClient {
    pub fn new(http: Client, config: PayPalConfig) -> Self {
        Self { http, config, token: Arc::new(RwLock::new(None)) }
    }

    pub fn config(&self) -> &PayPalConfig {
        &self.config
    }

    /// Bearer token, reused until shortly before it expires.
    pub async fn access_token(&self) -> Result<String, PayPalError> {
        {
            let guard = self.token.read().await;
            if let Some(cached) = guard.as_ref() {
                if cached.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                    return Ok(cached.token.clone());
                }
            }
        }

        let mut guard = self.token.write().await;
        // another request may have refreshed while we waited for the lock
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(cached.token.clone());
            }
        }

        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.config.base_url))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;
        let (status, body) = read_json(response).await?;
        if !(200..300).contains(&status) {
            warn!(status, "PayPal token exchange failed");
            return Err(PayPalError::Auth { status, details: body });
        }
        let parsed: TokenResponse = serde_json::from_value(body).map_err(|_| PayPalError::MissingToken)?;
        let token = parsed.access_token.filter(|t| !t.is_empty()).ok_or(PayPalError::MissingToken)?;
        let ttl = Duration::from_secs(parsed.expires_in.unwrap_or(0));
        debug!(ttl_secs = ttl.as_secs(), "Obtained PayPal access token");
        *guard = match Instant::now().checked_add(ttl) {
            Some(expires_at) => Some(CachedToken { token: token.clone(), expires_at }),
            None => {
                warn!(ttl_secs = ttl.as_secs(), "PayPal token lifetime out of range; not caching");
                None
            }
        };
        Ok(token)
    }

    pub async fn create_order(&self, order: &OrderRequest) -> Result<Value, PayPalError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.config.base_url))
            .bearer_auth(token)
            .json(order)
            .send()
            .await?;
        relay(response).await
    }

    pub async fn capture_order(&self, order_id: &str) -> Result<Value, PayPalError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!("{}/v2/checkout/orders/{}/capture", self.config.base_url, order_id))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;
        relay(response).await
    }
}

async fn relay(response: Response) -> Result<Value, PayPalError> {
    let (status, body) = read_json(response).await?;
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(PayPalError::Api { status, details: body })
    }
}

/// Status plus JSON body; non-JSON bodies are kept as a string value.
pub(crate) async fn read_json(response: Response) -> Result<(u16, Value), reqwest::Error> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    let body = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    Ok((status, body))
}
