//! Testing utilities and helpers
//!
//! This module provides comprehensive testing utilities including:
//! - **[`async_utils`]**: Async test utilities and helpers
//! - **[`builders`]**: Test data builders with fluent API
//! - **[`fixtures`]**: Test fixture generators (with deterministic seeded
//!   variants)
//! - **[`temp`]**: Temporary file/directory helpers
//! - **[`time`]**: Time mocking utilities
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "runtime")]
//! # {
//! use forgesheet_common::testing::MockClock;
//!
//! // In your tests:
//! fn test_with_mock_time() {
//!     let clock = MockClock::new();
//!     clock.advance(std::time::Duration::from_secs(5));
//!     // ... test with controlled time
//! }
//! # }
//! ```

pub mod async_utils;
pub mod builders;
pub mod fixtures;
pub mod temp;
pub mod time;

// Re-export commonly used items
pub use async_utils::{poll_until, retry_async, timeout_ok};
pub use builders::{StringBuilder, TestBuilder};
pub use fixtures::{random_email, random_string, random_u64};
pub use temp::{TempDir, TempFile};
pub use time::{Clock, MockClock, SystemClock};
