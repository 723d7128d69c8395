//! Paynow request construction and the SHA-512 integrity hash that guards it.
//!
//! The hash covers `id, reference, amount, email, phone, method, returnurl,
//! resulturl` in exactly that order, concatenated without separators and
//! followed by the integration key. Paynow recomputes it on its side, so the
//! field order is part of the wire contract. The amount is formatted to two
//! decimals before it is hashed.

use common_money::Amount;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("Unsupported payment method '{0}'")]
    InvalidMethod(String),
    #[error("Amount must be greater than zero")]
    NonPositiveAmount,
}

impl SigningError {
    pub fn code(&self) -> &'static str {
        match self {
            SigningError::MissingFields(_) => "missing_fields",
            SigningError::InvalidMethod(_) => "invalid_method",
            SigningError::NonPositiveAmount => "invalid_amount",
        }
    }
}

/// Mobile-money wallets Paynow can charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaynowMethod {
    Ecocash,
    Onemoney,
    Telecash,
}

impl PaynowMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaynowMethod::Ecocash => "ecocash",
            PaynowMethod::Onemoney => "onemoney",
            PaynowMethod::Telecash => "telecash",
        }
    }
}

impl FromStr for PaynowMethod {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ecocash" => Ok(PaynowMethod::Ecocash),
            "onemoney" => Ok(PaynowMethod::Onemoney),
            "telecash" => Ok(PaynowMethod::Telecash),
            other => Err(SigningError::InvalidMethod(other.to_string())),
        }
    }
}

impl fmt::Display for PaynowMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mobile-money attempt for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaynowPaymentData {
    pub reference: String,
    pub amount: Amount,
    pub email: String,
    pub phone: Option<String>,
    pub method: PaynowMethod,
    pub return_url: String,
    pub result_url: String,
}

/// Initiate payload as posted by the checkout front end. Every field is
/// optional here so that absence can be reported by name.
#[derive(Debug, Default, Deserialize)]
pub struct InitiatePayload {
    pub reference: Option<String>,
    pub amount: Option<Amount>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub method: Option<String>,
    pub return_url: Option<String>,
    pub result_url: Option<String>,
}

impl InitiatePayload {
    pub fn validate(self, default_return_url: &str, default_result_url: &str) -> Result<PaynowPaymentData, SigningError> {
        let reference = present(self.reference);
        let email = present(self.email);
        let method = present(self.method);

        let mut missing = Vec::new();
        if reference.is_none() {
            missing.push("reference");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        if email.is_none() {
            missing.push("email");
        }
        if method.is_none() {
            missing.push("method");
        }

        let (Some(reference), Some(amount), Some(email), Some(method)) = (reference, self.amount, email, method) else {
            return Err(SigningError::MissingFields(missing));
        };
        if !amount.is_positive() {
            return Err(SigningError::NonPositiveAmount);
        }
        let method = method.parse::<PaynowMethod>()?;

        Ok(PaynowPaymentData {
            reference,
            amount,
            email,
            phone: present(self.phone),
            method,
            return_url: present(self.return_url).unwrap_or_else(|| default_return_url.to_string()),
            result_url: present(self.result_url).unwrap_or_else(|| default_result_url.to_string()),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Signed, ready-to-send initiate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRequest {
    fields: Vec<(&'static str, String)>,
    hash: String,
}

impl InitiateRequest {
    pub fn build(integration_id: &str, data: &PaynowPaymentData, integration_key: &str) -> InitiateRequest {
        let fields = vec![
            ("id", integration_id.to_string()),
            ("reference", data.reference.clone()),
            ("amount", data.amount.to_fixed()),
            ("email", data.email.clone()),
            ("phone", data.phone.clone().unwrap_or_default()),
            ("method", data.method.as_str().to_string()),
            ("returnurl", data.return_url.clone()),
            ("resulturl", data.result_url.clone()),
        ];
        let hash = paynow_hash(fields.iter().map(|(_, v)| v.as_str()), integration_key);
        InitiateRequest { fields, hash }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// `application/x-www-form-urlencoded` body, hash last.
    pub fn to_form_body(&self) -> String {
        let mut pairs: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        pairs.push(("hash", self.hash.as_str()));
        // string pairs always serialize
        serde_urlencoded::to_string(&pairs).unwrap_or_default()
    }
}

/// Uppercase hex SHA-512 of the values in order followed by the key.
pub fn paynow_hash<I, S>(values: I, integration_key: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha512::new();
    for value in values {
        hasher.update(value.as_ref().as_bytes());
    }
    hasher.update(integration_key.as_bytes());
    hex::encode_upper(hasher.finalize())
}
