//! Replay of request lines through the limiter.
//!
//! Each input line names a policy and, optionally, a client: `search 10.0.0.1`.
//! The result of every check is rendered as one JSON line so limits and
//! capacities can be tuned against recorded traffic.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::ratelimit::{AdmissionBackend, Outcome, PolicyTable, RejectionBody};

/// Output for a line that was checked.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayRecord {
    /// Policy named on the input line
    pub policy: String,
    /// Token the request was counted under
    pub token: String,
    /// The decision
    pub outcome: Outcome,
    /// Limit applied by the policy
    pub limit: u32,
    /// Remaining quota after this request
    pub remaining: u32,
    /// Rate limit response headers
    pub headers: BTreeMap<&'static str, String>,
    /// Envelope a rejected client would receive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionBody>,
}

/// Output for a line that could not be checked.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayError {
    /// The offending input line
    pub line: String,
    /// Why it could not be checked
    pub error: String,
}

/// Result of replaying one line.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReplayOutput {
    Checked(ReplayRecord),
    Failed(ReplayError),
}

/// Replays request lines against a backend under a policy table.
pub struct Replayer<'a> {
    backend: &'a dyn AdmissionBackend,
    policies: &'a PolicyTable,
    window: std::time::Duration,
}

impl<'a> Replayer<'a> {
    /// Create a replayer.
    pub fn new(
        backend: &'a dyn AdmissionBackend,
        policies: &'a PolicyTable,
        window: std::time::Duration,
    ) -> Self {
        Self {
            backend,
            policies,
            window,
        }
    }

    /// Check one input line.
    ///
    /// Blank lines and `#` comments yield `None`.
    pub async fn replay_line(&self, line: &str) -> Option<ReplayOutput> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let mut parts = line.split_whitespace();
        let name = parts.next()?;
        let client = parts.next();

        let Some(policy) = self.policies.get(name) else {
            warn!(policy = %name, "Unknown policy in replay input");
            return Some(Self::failed(line, format!("unknown policy {}", name)));
        };

        let key = match policy.key(client) {
            Ok(key) => key,
            Err(e) => return Some(Self::failed(line, e.to_string())),
        };
        let token = key.to_token();

        let admission = match self.backend.check(&token, policy.limit).await {
            Ok(admission) => admission,
            Err(e) => return Some(Self::failed(line, e.to_string())),
        };

        let rejection = (!admission.is_admitted())
            .then(|| RejectionBody::new(policy.rejection_message(self.window)));

        Some(ReplayOutput::Checked(ReplayRecord {
            policy: name.to_string(),
            token,
            outcome: admission.outcome,
            limit: admission.limit,
            remaining: admission.remaining,
            headers: admission.headers().into_iter().collect(),
            rejection,
        }))
    }

    fn failed(line: &str, error: String) -> ReplayOutput {
        ReplayOutput::Failed(ReplayError {
            line: line.to_string(),
            error,
        })
    }
}
