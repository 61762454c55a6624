//! Named rate limit policies for API call sites.
//!
//! Each endpoint checks the shared limiter with its own token and limit. A
//! policy table names those pairs so they can be tuned from configuration
//! instead of being scattered through request handlers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::key::TokenKey;
use crate::error::{LimiterError, Result};

/// Whether a policy's budget is shared or per client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// One budget shared by every caller
    #[default]
    Global,
    /// A separate budget per client identity
    PerClient,
}

/// Token and limit used by one call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Bucket name the counter is kept under
    pub token: String,
    /// Requests per window at which checks start rejecting
    pub limit: u32,
    /// Budget scope
    #[serde(default)]
    pub scope: Scope,
    /// Message returned to rejected clients
    #[serde(default)]
    pub message: Option<String>,
}

impl Policy {
    /// Create a global policy.
    pub fn global(token: impl Into<String>, limit: u32) -> Self {
        Self {
            token: token.into(),
            limit,
            scope: Scope::Global,
            message: None,
        }
    }

    /// Create a per-client policy.
    pub fn per_client(token: impl Into<String>, limit: u32) -> Self {
        Self {
            scope: Scope::PerClient,
            ..Self::global(token, limit)
        }
    }

    /// Resolve the token key for a request.
    ///
    /// Global policies ignore the client. Per-client policies require one.
    pub fn key(&self, client: Option<&str>) -> Result<TokenKey> {
        match (self.scope, client) {
            (Scope::Global, _) => Ok(TokenKey::global(&self.token)),
            (Scope::PerClient, Some(client)) if !client.is_empty() => {
                Ok(TokenKey::per_client(&self.token, client))
            }
            (Scope::PerClient, _) => Err(LimiterError::InvalidArgument(format!(
                "policy for token {} is per client but no client was given",
                self.token
            ))),
        }
    }

    /// Message for a rejected request under a limiter with the given window.
    pub fn rejection_message(&self, window: Duration) -> String {
        if let Some(ref message) = self.message {
            return message.clone();
        }

        let per = if window == Duration::from_secs(60) {
            "minute".to_string()
        } else {
            format!("{} seconds", window.as_secs_f64())
        };
        format!(
            "Too many requests. Rate Limit exceeded. {} requests per {} allowed.",
            self.limit, per
        )
    }
}

/// Policies indexed by call-site name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyTable {
    policies: BTreeMap<String, Policy>,
}

impl PolicyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The policies used by the catalog API endpoints.
    pub fn site_defaults() -> Self {
        let mut table = Self::new();
        table.insert("search", Policy::global("CACHE_TOKEN", 100));
        table.insert("courses", Policy::global("DEFAULT_CACHE_TOKEN", 10));
        table.insert("course_lookup", Policy::global("GLOBAL_CACHE_TOKEN", 50));
        table.insert("department", Policy::global("CACHE_TOKEN", 10));
        table
    }

    /// Load a table from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a table from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let table: PolicyTable = serde_yaml::from_str(yaml).map_err(|e| {
            LimiterError::Config(format!("Failed to parse rate limit policies: {}", e))
        })?;
        table.validate()?;
        Ok(table)
    }

    /// Reject policies that could never be checked.
    pub fn validate(&self) -> Result<()> {
        for (name, policy) in &self.policies {
            if policy.token.is_empty() {
                return Err(LimiterError::Config(format!(
                    "policy {} has an empty token",
                    name
                )));
            }
            if policy.limit == 0 {
                return Err(LimiterError::Config(format!(
                    "policy {} has a zero limit",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Add or replace a policy.
    pub fn insert(&mut self, name: impl Into<String>, policy: Policy) {
        self.policies.insert(name.into(), policy);
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    /// Policy names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
