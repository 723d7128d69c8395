use async_trait::async_trait;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PaynowConfig;
use crate::poller::{StatusSource, StatusUpdate};
use crate::reply::ProviderReply;
use crate::signing::{InitiateRequest, PaynowPaymentData};

const INITIATE_PATH: &str = "/interface/initiatetransaction";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider unavailable: {0}")]
    Upstream(String),
    #[error("poll url '{0}' is not a Paynow url")]
    ForeignPollUrl(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::ForeignPollUrl(_))
    }
}

/// Thin client for the Paynow form interface.
#[derive(Clone)]
pub struct PaynowClient {
    http: Client,
    config: PaynowConfig,
}

impl PaynowClient {
    pub fn new(http: Client, config: PaynowConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &PaynowConfig {
        &self.config
    }

    pub fn sign(&self, data: &PaynowPaymentData) -> InitiateRequest {
        InitiateRequest::build(&self.config.integration_id, data, &self.config.integration_key)
    }

    /// Send a signed initiate request and decode whatever Paynow answers.
    pub async fn initiate(&self, data: &PaynowPaymentData) -> Result<ProviderReply, ProviderError> {
        let request = self.sign(data);
        let url = format!("{}{}", self.config.base_url, INITIATE_PATH);
        debug!(reference = %data.reference, method = %data.method, "Sending Paynow initiate request");
        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(request.to_form_body())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(%status, reference = %data.reference, "Paynow initiate returned non-success HTTP status");
        }
        Ok(ProviderReply::parse(&body))
    }

    /// Only URLs on the configured Paynow host may be polled.
    pub fn validate_poll_url(&self, poll_url: &str) -> Result<Url, ProviderError> {
        let foreign = || ProviderError::ForeignPollUrl(poll_url.to_string());
        let url = Url::parse(poll_url).map_err(|_| foreign())?;
        let base = Url::parse(&self.config.base_url).map_err(|_| foreign())?;
        let same_origin = matches!(url.scheme(), "http" | "https")
            && url.scheme() == base.scheme()
            && url.host_str() == base.host_str()
            && url.port_or_known_default() == base.port_or_known_default();
        if same_origin {
            Ok(url)
        } else {
            Err(foreign())
        }
    }

    pub async fn poll(&self, poll_url: &str) -> Result<ProviderReply, ProviderError> {
        let url = self.validate_poll_url(poll_url)?;
        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE)
            .send()
            .await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(ProviderError::Upstream(format!("HTTP {status}")));
        }
        let body = response.text().await?;
        Ok(ProviderReply::parse(&body))
    }
}

#[async_trait]
impl StatusSource for PaynowClient {
    async fn check_status(&self, poll_url: &str) -> Result<StatusUpdate, ProviderError> {
        let reply = self.poll(poll_url).await?;
        Ok(StatusUpdate::from_reply(&reply, &self.config.integration_key))
    }
}
