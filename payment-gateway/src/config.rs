use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::poller::PollPolicy;

pub const PAYNOW_LIVE_URL: &str = "https://www.paynow.co.zw";
pub const PAYPAL_LIVE_URL: &str = "https://api-m.paypal.com";
pub const PAYPAL_SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";
pub const WHATSAPP_GRAPH_URL: &str = "https://graph.facebook.com";

#[derive(Debug, Clone)]
pub struct PaynowConfig {
    pub integration_id: String,
    pub integration_key: String,
    pub base_url: String,
    pub return_url: String,
    pub result_url: String,
}

#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub brand_name: String,
}

#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub access_token: String,
    pub phone_number_id: String,
    pub graph_url: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Storefront origin for browser return and result URLs.
    pub site_url: String,
    pub paynow: PaynowConfig,
    pub paypal: PayPalConfig,
    /// `None` selects the log-only message sender.
    pub whatsapp: Option<WhatsAppConfig>,
    pub poll_policy: PollPolicy,
    pub upstream_timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8888".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let paynow = PaynowConfig {
            integration_id: env::var("PAYNOW_INTEGRATION_ID").unwrap_or_default(),
            integration_key: env::var("PAYNOW_INTEGRATION_KEY").unwrap_or_default(),
            base_url: trim_base(env::var("PAYNOW_BASE_URL").unwrap_or_else(|_| PAYNOW_LIVE_URL.to_string())),
            return_url: env::var("PAYNOW_RETURN_URL")
                .unwrap_or_else(|_| "https://www.paynow.co.zw/return/".to_string()),
            result_url: env::var("PAYNOW_RESULT_URL")
                .unwrap_or_else(|_| "https://www.paynow.co.zw/result/".to_string()),
        };

        let site_url = trim_base(env::var("SITE_URL").unwrap_or_else(|_| "http://localhost:5173".to_string()));

        let production = env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let paypal_default = if production { PAYPAL_LIVE_URL } else { PAYPAL_SANDBOX_URL };
        let paypal = PayPalConfig {
            client_id: env::var("PAYPAL_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("PAYPAL_CLIENT_SECRET").unwrap_or_default(),
            base_url: trim_base(env::var("PAYPAL_BASE_URL").unwrap_or_else(|_| paypal_default.to_string())),
            brand_name: env::var("PAYPAL_BRAND_NAME")
                .unwrap_or_else(|_| "Zimbabwe E-commerce Platform".to_string()),
        };

        let whatsapp = match (
            non_empty_var("WHATSAPP_ACCESS_TOKEN"),
            non_empty_var("WHATSAPP_PHONE_NUMBER_ID"),
        ) {
            (Some(access_token), Some(phone_number_id)) => Some(WhatsAppConfig {
                access_token,
                phone_number_id,
                graph_url: trim_base(
                    env::var("WHATSAPP_GRAPH_URL").unwrap_or_else(|_| WHATSAPP_GRAPH_URL.to_string()),
                ),
            }),
            _ => None,
        };

        let defaults = PollPolicy::default();
        let poll_policy = PollPolicy {
            initial_delay: secs_var("PAYNOW_POLL_INITIAL_DELAY_SECONDS").unwrap_or(defaults.initial_delay),
            interval: secs_var("PAYNOW_POLL_INTERVAL_SECONDS").unwrap_or(defaults.interval),
            error_backoff: secs_var("PAYNOW_POLL_ERROR_BACKOFF_SECONDS").unwrap_or(defaults.error_backoff),
            max_backoff: secs_var("PAYNOW_POLL_MAX_BACKOFF_SECONDS").unwrap_or(defaults.max_backoff),
            max_attempts: env::var("PAYNOW_POLL_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_attempts)
                .max(1),
            max_consecutive_errors: env::var("PAYNOW_POLL_MAX_CONSECUTIVE_ERRORS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_consecutive_errors)
                .max(1),
            timeout: secs_var("PAYNOW_POLL_TIMEOUT_SECONDS").unwrap_or(defaults.timeout),
        };

        let upstream_timeout = secs_var("UPSTREAM_TIMEOUT_SECONDS").unwrap_or(Duration::from_secs(15));

        Ok(Self {
            host,
            port,
            site_url,
            paynow,
            paypal,
            whatsapp,
            poll_policy,
            upstream_timeout,
        })
    }

    /// Configuration pointing every provider at one base URL; used by tests
    /// that stand up a mock upstream.
    pub fn for_upstream(base_url: &str) -> Self {
        let base = trim_base(base_url.to_string());
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            site_url: "https://shop.example".into(),
            paynow: PaynowConfig {
                integration_id: "1201".into(),
                integration_key: "integration-key".into(),
                base_url: base.clone(),
                return_url: format!("{base}/return"),
                result_url: format!("{base}/result"),
            },
            paypal: PayPalConfig {
                client_id: "client".into(),
                client_secret: "secret".into(),
                base_url: base.clone(),
                brand_name: "Zimbabwe E-commerce Platform".into(),
            },
            whatsapp: None,
            poll_policy: PollPolicy::default(),
            upstream_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_whatsapp(mut self, whatsapp: WhatsAppConfig) -> Self {
        self.whatsapp = Some(whatsapp);
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }
}

fn trim_base(value: String) -> String {
    value.trim_end_matches('/').to_string()
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn secs_var(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
