//! Resilience patterns for fault tolerance and error handling
//!
//! Currently just retry logic with configurable backoff and jitter; the
//! dispatcher's outbox retry loop and the reconciler's gateway calls both
//! build on this.

pub mod retry;

pub use retry::{
    policies, retry, retry_with_policy, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder,
    RetryContext, RetryDecision, RetryError, RetryExecutor, RetryOutcome, RetryPolicy, RetryResult,
};
