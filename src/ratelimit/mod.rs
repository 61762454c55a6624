//! Rate limiting logic and state management.

mod backend;
mod clock;
mod decision;
mod key;
mod limiter;
mod policy;
mod store;

pub use backend::AdmissionBackend;
pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{
    Admission, Outcome, RejectionBody, RejectionError, LIMIT_HEADER, RATE_LIMITED_CODE,
    REMAINING_HEADER,
};
pub use key::TokenKey;
pub use limiter::{LimiterConfig, RateLimiter};
pub use policy::{Policy, PolicyTable, Scope};
pub use store::{TokenCounter, TokenStore};
