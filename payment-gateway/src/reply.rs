//! Decoder for Paynow's line-delimited `key=value` reply bodies.

use std::fmt;

use crate::signing;

/// Status values Paynow reports for initiate and poll replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Ok,
    Paid,
    Cancelled,
    Failed,
    Pending,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> PaymentStatus {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ok" => PaymentStatus::Ok,
            "paid" => PaymentStatus::Paid,
            "cancelled" => PaymentStatus::Cancelled,
            "failed" => PaymentStatus::Failed,
            "pending" => PaymentStatus::Pending,
            _ => PaymentStatus::Other(raw.trim().to_string()),
        }
    }

    /// Paid, Cancelled and Failed end a poll sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Cancelled | PaymentStatus::Failed)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Ok => f.write_str("Ok"),
            PaymentStatus::Paid => f.write_str("Paid"),
            PaymentStatus::Cancelled => f.write_str("Cancelled"),
            PaymentStatus::Failed => f.write_str("Failed"),
            PaymentStatus::Pending => f.write_str("Pending"),
            PaymentStatus::Other(raw) => f.write_str(raw),
        }
    }
}

/// Parsed provider reply. Keys are lower-cased, values kept verbatim, and
/// the received line order is retained for hash verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderReply {
    entries: Vec<(String, String)>,
}

impl ProviderReply {
    /// Lines that do not split into a non-empty key and value are skipped.
    /// Only the first `=` separates, so URLs with query strings survive.
    pub fn parse(body: &str) -> ProviderReply {
        let mut reply = ProviderReply::default();
        for line in body.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                continue;
            }
            reply.insert(key.to_ascii_lowercase(), value.to_string());
        }
        reply
    }

    /// Build from already-decoded pairs (form callbacks); same filtering rules.
    pub fn from_pairs<I>(pairs: I) -> ProviderReply
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut reply = ProviderReply::default();
        for (key, value) in pairs {
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                continue;
            }
            reply.insert(key.to_ascii_lowercase(), value.to_string());
        }
        reply
    }

    fn insert(&mut self, key: String, value: String) {
        // last occurrence wins but keeps the first position
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    /// `None` when the reply carried no status line at all.
    pub fn status(&self) -> Option<PaymentStatus> {
        self.get("status").map(PaymentStatus::parse)
    }

    /// Check the reply's `hash` field against the digest of every other value
    /// in received order followed by the integration key. A reply without a
    /// hash does not verify.
    pub fn verify_hash(&self, integration_key: &str) -> bool {
        let Some(provided) = self.get("hash") else {
            return false;
        };
        let values = self
            .entries
            .iter()
            .filter(|(k, _)| k != "hash")
            .map(|(_, v)| v.as_str());
        let expected = signing::paynow_hash(values, integration_key);
        expected.eq_ignore_ascii_case(provided)
    }
}
