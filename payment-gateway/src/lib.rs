pub mod app_state;
pub mod checkout;
pub mod checkout_handlers;
pub mod config;
pub mod metrics;
pub mod notifier;
pub mod paynow;
pub mod paynow_handlers;
pub mod paypal;
pub mod paypal_handlers;
pub mod poller;
pub mod reply;
pub mod signing;
pub mod whatsapp_handlers;

// Re-export key types for tests
pub use crate::app_state::{build_router, AppState};
pub use crate::config::GatewayConfig;
pub use crate::metrics::GatewayMetrics;
pub use crate::poller::{PollOutcome, PollPolicy, StatusPoller};
pub use crate::reply::{PaymentStatus, ProviderReply};
pub use crate::signing::{paynow_hash, InitiateRequest, PaynowMethod, PaynowPaymentData};
