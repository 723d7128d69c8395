//! Order-level helpers tying the three providers together: turning a cart
//! into Paynow or PayPal requests, composing the WhatsApp confirmation, and
//! reacting to the outcome of a background status poll.

use async_trait::async_trait;
use common_money::Amount;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::notifier::{MessageSender, OutboundMessage};
use crate::paypal::{CreateOrderRequest, ItemAmountInput, ItemInput, PurchaseUnitInput, UnitAmountInput};
use crate::poller::{PaymentObserver, PollFailure, PollState, StatusUpdate};
use crate::signing::PaynowMethod;
use crate::signing::PaynowPaymentData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMethod {
    Paypal,
    Ecocash,
    Onemoney,
    Telecash,
}

impl CheckoutMethod {
    /// Wallet to charge through Paynow; `None` for PayPal.
    pub fn paynow_method(self) -> Option<PaynowMethod> {
        match self {
            CheckoutMethod::Paypal => None,
            CheckoutMethod::Ecocash => Some(PaynowMethod::Ecocash),
            CheckoutMethod::Onemoney => Some(PaynowMethod::Onemoney),
            CheckoutMethod::Telecash => Some(PaynowMethod::Telecash),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub price: Amount,
}

impl LineItem {
    pub fn line_total(&self) -> Amount {
        self.price.times(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub id: String,
    pub amount: Amount,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub description: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl PaymentOrder {
    pub fn paynow_data(&self, method: PaynowMethod, origin: &str) -> PaynowPaymentData {
        let origin = origin.trim_end_matches('/');
        PaynowPaymentData {
            reference: self.id.clone(),
            amount: self.amount.clone(),
            email: self.customer_email.clone(),
            phone: self.customer_phone.clone().filter(|p| !p.trim().is_empty()),
            method,
            return_url: format!("{origin}/payment-success"),
            result_url: format!("{origin}/api/paynow/result"),
        }
    }

    pub fn paypal_order(&self) -> CreateOrderRequest {
        let items = self
            .items
            .iter()
            .map(|item| ItemInput {
                name: item.name.clone(),
                quantity: serde_json::Value::String(item.quantity.to_string()),
                unit_amount: ItemAmountInput { value: item.price.clone() },
            })
            .collect::<Vec<_>>();
        CreateOrderRequest {
            intent: Some("CAPTURE".to_string()),
            purchase_units: vec![PurchaseUnitInput {
                reference_id: Some(self.id.clone()),
                amount: UnitAmountInput {
                    currency_code: Some(self.currency.clone()),
                    value: self.amount.clone(),
                    breakdown: None,
                },
                description: Some(self.description.clone()).filter(|d| !d.is_empty()),
                items: Some(items).filter(|i| !i.is_empty()),
            }],
        }
    }
}

pub fn order_message(order: &PaymentOrder) -> String {
    let items = order
        .items
        .iter()
        .map(|item| format!("• {} ({}x) - ${}", item.name, item.quantity, item.line_total()))
        .collect::<Vec<_>>()
        .join("\n");
    let phone = order
        .customer_phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("*Phone:* {p}"))
        .unwrap_or_default();

    format!(
        "🛍️ *New Order Confirmation*\n\n\
         *Order ID:* {id}\n\
         *Total Amount:* ${total}\n\n\
         *Items:*\n{items}\n\n\
         *Customer Email:* {email}\n\
         {phone}\n\n\
         🌍 *Serving Zimbabweans Worldwide* 🇿🇼\n\
         Thank you for your order! We'll process it shortly.\n\n\
         For any inquiries, please reply to this message.",
        id = order.id,
        total = order.amount,
        email = order.customer_email,
    )
}

pub fn payment_link(origin: &str, order_id: &str, amount: &Amount) -> String {
    format!("{}/checkout/{}?amount={}", origin.trim_end_matches('/'), order_id, amount)
}

/// Click-to-chat link with the message prefilled.
pub fn whatsapp_chat_link(phone: &str, message: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let query = serde_urlencoded::to_string([("text", message)]).unwrap_or_default();
    format!("https://wa.me/{digits}?{query}")
}

/// Sends the order confirmation once a background poll sees the payment land.
pub struct CheckoutObserver {
    order: PaymentOrder,
    sender: Arc<dyn MessageSender>,
}

impl CheckoutObserver {
    pub fn new(order: PaymentOrder, sender: Arc<dyn MessageSender>) -> Self {
        Self { order, sender }
    }
}

#[async_trait]
impl PaymentObserver for CheckoutObserver {
    async fn on_state(&self, state: PollState) {
        tracing::debug!(order_id = %self.order.id, ?state, "Checkout poll state");
    }

    async fn on_success(&self, update: &StatusUpdate) {
        let Some(phone) = self.order.customer_phone.clone().filter(|p| !p.trim().is_empty()) else {
            info!(order_id = %self.order.id, "Payment confirmed; no phone on order, skipping confirmation");
            return;
        };
        info!(order_id = %self.order.id, paynow_reference = ?update.paynow_reference, "Payment confirmed");
        let message = OutboundMessage {
            to: phone,
            body: order_message(&self.order),
            order_id: Some(self.order.id.clone()),
        };
        if let Err(err) = self.sender.send(&message).await {
            warn!(order_id = %self.order.id, error = %err, "Order confirmation could not be delivered");
        }
    }

    async fn on_failure(&self, failure: &PollFailure) {
        warn!(
            order_id = %self.order.id,
            state = ?failure.terminal_state(),
            ?failure,
            "Payment was not completed"
        );
    }
}
