//! Admission decisions and the response metadata derived from them.

use serde::Serialize;

/// Response header carrying the limit that was applied.
pub const LIMIT_HEADER: &str = "X-RateLimit-Limit";
/// Response header carrying the remaining quota.
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";

/// Error code reported in the rejection envelope.
pub const RATE_LIMITED_CODE: &str = "rate_limited";

/// Whether a request may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The request is within the limit
    Admitted,
    /// The caller must reject the request
    RateLimited,
}

/// Result of a single admission check.
///
/// Both outcomes carry the applied limit and remaining quota so the caller
/// can attach them to its response whether or not the request proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    /// The decision
    pub outcome: Outcome,
    /// The limit applied to this check
    pub limit: u32,
    /// Remaining quota; zero when rate limited
    pub remaining: u32,
    /// The token's count after this check
    pub count: u64,
}

impl Admission {
    /// Build the decision for a counter that has just been incremented to `count`.
    ///
    /// A count equal to the limit is already rejected, so a limit of N admits
    /// N - 1 requests per window.
    pub fn evaluate(count: u64, limit: u32) -> Self {
        if count >= u64::from(limit) {
            Self {
                outcome: Outcome::RateLimited,
                limit,
                remaining: 0,
                count,
            }
        } else {
            // count < limit, so the difference fits in u32
            Self {
                outcome: Outcome::Admitted,
                limit,
                remaining: limit - count as u32,
                count,
            }
        }
    }

    /// Whether the request may proceed.
    pub fn is_admitted(&self) -> bool {
        self.outcome == Outcome::Admitted
    }

    /// Split into `Ok` when admitted and `Err` when rate limited.
    pub fn into_result(self) -> std::result::Result<Admission, Admission> {
        if self.is_admitted() {
            Ok(self)
        } else {
            Err(self)
        }
    }

    /// Header name/value pairs describing the quota.
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            (LIMIT_HEADER, self.limit.to_string()),
            (REMAINING_HEADER, self.remaining.to_string()),
        ]
    }
}

/// Error detail within a [`RejectionBody`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionError {
    /// Human-readable reason shown to the client
    pub message: String,
    /// Machine-readable error code
    pub code: String,
}

/// JSON envelope returned alongside a "too many requests" status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionBody {
    /// Always false for a rejection
    pub success: bool,
    /// Always null for a rejection
    pub data: Option<()>,
    /// What went wrong
    pub error: RejectionError,
}

impl RejectionBody {
    /// Create a rejection envelope with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: RejectionError {
                message: message.into(),
                code: RATE_LIMITED_CODE.to_string(),
            },
        }
    }
}
