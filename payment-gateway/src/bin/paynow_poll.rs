use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use payment_gateway::config::GatewayConfig;
use payment_gateway::paynow::PaynowClient;
use payment_gateway::poller::{PaymentObserver, PollFailure, PollOutcome, PollState, StatusPoller, StatusUpdate};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Poll a Paynow transaction until it settles", long_about = None)]
struct Options {
    /// Poll URL returned by the initiate call
    poll_url: String,

    /// Seconds between status checks (overrides PAYNOW_POLL_INTERVAL_SECONDS)
    #[arg(long = "interval", value_name = "SECONDS")]
    interval: Option<u64>,

    /// Give up after this many checks
    #[arg(long = "max-attempts")]
    max_attempts: Option<u32>,

    /// Check immediately instead of waiting the initial delay
    #[arg(long = "now")]
    now: bool,
}

struct Printer;

#[async_trait]
impl PaymentObserver for Printer {
    async fn on_state(&self, state: PollState) {
        println!("state: {}", serde_json::to_string(&state).unwrap_or_default().trim_matches('"'));
    }

    async fn on_success(&self, update: &StatusUpdate) {
        println!(
            "paid: reference={} paynowreference={} amount={} hash_valid={}",
            update.reference.as_deref().unwrap_or("-"),
            update.paynow_reference.as_deref().unwrap_or("-"),
            update.amount.as_deref().unwrap_or("-"),
            update.hash_valid
        );
    }

    async fn on_failure(&self, failure: &PollFailure) {
        println!("not paid: {failure:?}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
    let opts = Options::parse();

    let config = GatewayConfig::from_env()?;
    let mut policy = config.poll_policy;
    if let Some(secs) = opts.interval {
        policy.interval = Duration::from_secs(secs);
    }
    if let Some(max) = opts.max_attempts {
        if max == 0 {
            return Err(anyhow!("--max-attempts must be positive"));
        }
        policy.max_attempts = max;
    }
    if opts.now {
        policy.initial_delay = Duration::ZERO;
    }

    let http = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .context("failed to build HTTP client")?;
    let client = PaynowClient::new(http, config.paynow.clone());
    client.validate_poll_url(&opts.poll_url)?;

    let poller = StatusPoller::new(Arc::new(client), policy);
    match poller.run(&opts.poll_url, &Printer).await {
        PollOutcome::Paid(_) => Ok(()),
        PollOutcome::Failed(failure) => Err(anyhow!("payment ended as {:?}", failure.terminal_state())),
    }
}
