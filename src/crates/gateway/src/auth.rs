//! Caller authentication and monthly quotas.
//!
//! Keys are never stored in clear: the configuration carries the SHA-256
//! hex digest of each key, and presented keys are hashed before lookup.
//! Usage is counted per key name and calendar month (UTC).

use crate::config::ApiKeyEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Header carrying the caller's key.
pub const API_KEY_HEADER: &str = "api-key";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed { key_name: String },
    UnknownKey,
    RateLimited { limit: u64 },
}

#[async_trait]
pub trait ApiKeyValidator: Send + Sync {
    /// Check a presented key and count the request against its quota.
    async fn validate(&self, key: &str) -> AuthDecision;
}

/// Hex-encoded SHA-256 of a key.
pub fn digest_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validator over the keys listed in the gateway configuration.
pub struct StaticKeyValidator {
    keys: HashMap<String, ApiKeyEntry>,
    usage: Mutex<HashMap<(String, String), u64>>,
}

impl StaticKeyValidator {
    pub fn new(entries: impl IntoIterator<Item = ApiKeyEntry>) -> Self {
        let keys = entries
            .into_iter()
            .map(|entry| (entry.sha256.to_ascii_lowercase(), entry))
            .collect();
        Self {
            keys,
            usage: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Requests counted for a key name in the month of `at`.
    pub fn usage(&self, key_name: &str, at: DateTime<Utc>) -> u64 {
        self.usage
            .lock()
            .get(&(key_name.to_string(), month_of(at)))
            .copied()
            .unwrap_or(0)
    }

    pub fn validate_at(&self, key: &str, at: DateTime<Utc>) -> AuthDecision {
        let Some(entry) = self.keys.get(&digest_key(key)) else {
            debug!("Rejected unknown api key");
            return AuthDecision::UnknownKey;
        };

        let mut usage = self.usage.lock();
        let count = usage
            .entry((entry.name.clone(), month_of(at)))
            .or_insert(0);
        *count += 1;

        match entry.monthly_limit {
            Some(limit) if *count > limit => {
                warn!(key = %entry.name, limit, "Monthly rate limit exhausted");
                AuthDecision::RateLimited { limit }
            }
            _ => AuthDecision::Allowed {
                key_name: entry.name.clone(),
            },
        }
    }
}

#[async_trait]
impl ApiKeyValidator for StaticKeyValidator {
    async fn validate(&self, key: &str) -> AuthDecision {
        self.validate_at(key, Utc::now())
    }
}

fn month_of(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}
