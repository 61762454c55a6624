//! Token key construction.

use std::fmt;

/// Identity under which requests are counted.
///
/// A global key shares one budget across every caller; a per-client key
/// gives each client its own budget inside the same bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    /// The budget this key draws from
    pub bucket: String,
    /// Client identity, such as a remote address
    pub client: Option<String>,
}

impl TokenKey {
    /// A key shared by all callers of `bucket`.
    pub fn global(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            client: None,
        }
    }

    /// A key scoped to a single client within `bucket`.
    pub fn per_client(bucket: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            client: Some(client.into()),
        }
    }

    /// The string the counter store is keyed by.
    pub fn to_token(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.client {
            Some(client) => write!(f, "{}:{}", self.bucket, client),
            None => write!(f, "{}", self.bucket),
        }
    }
}
