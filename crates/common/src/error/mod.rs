//! Common error types and utilities shared across the synchronizer's crates
//!
//! This module provides standardized error handling infrastructure that can be
//! used across all modules in the application. It includes common error
//! variants, conversion patterns, and utility functions for error handling.
//!
//! # Error Handling Architecture
//!
//! The error handling system is built on three key components:
//!
//! 1. **`CommonError`**: A comprehensive enum of common error patterns that
//!    appear across multiple modules (timeouts, rate limiting, serialization,
//!    etc.)
//!
//! 2. **`ErrorClassification` trait**: A standard interface for classifying
//!    errors by their characteristics (retryability, severity, criticality)
//!
//! 3. **`ErrorSeverity` enum**: A unified severity level system for monitoring
//!    and alerting across all error types
//!
//! ## When to Use CommonError vs Module-Specific Errors
//!
//! ### Use `CommonError` directly when:
//!
//! - The error is a standard pattern (timeout, serialization, lock, etc.)
//! - The error doesn't require module-specific context
//! - You want immediate interoperability with other modules
//!
//! ### Create a module-specific error when:
//!
//! - The error requires domain-specific information
//! - You need custom error messages or debugging info
//! - The error has module-specific handling logic
//!
//! ### Best Practice: Composition
//!
//! Module-specific errors should **compose** with `CommonError` rather than
//! duplicating common patterns:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum MyModuleError {
//!     // Module-specific variants
//!     #[error("Invalid widget configuration: {0}")]
//!     InvalidWidget(String),
//!
//!     // Embed common errors
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//!
//! impl ErrorClassification for MyModuleError {
//!     fn is_retryable(&self) -> bool {
//!         match self {
//!             Self::InvalidWidget(_) => false,
//!             Self::Common(e) => e.is_retryable(),
//!         }
//!     }
//!     // ... implement other trait methods
//! }
//! ```
//!
//! ## Standard Error Patterns
//!
//! The following patterns should use `CommonError` variants:
//!
//! | Pattern | CommonError Variant | When to Use |
//! |---------|-------------------|-------------|
//! | **Circuit Breaker** | `CircuitBreakerOpen` | Service protection, cascading failure prevention |
//! | **Rate Limiting** | `RateLimitExceeded` | API quotas, throttling |
//! | **Timeouts** | `Timeout` | Operation deadlines, hanging operations |
//! | **Lock Errors** | `Lock` | Mutex/lock contention, poisoned locks |
//! | **Serialization** | `Serialization` | JSON/TOML parsing, encoding errors |
//! | **Validation** | `Validation` | Input validation, constraint violations |
//! | **Configuration** | `Config` | Invalid settings, missing config |
//! | **Storage/DB** | `Storage` / `Persistence` | File I/O, database operations |
//! | **Backend** | `Backend` | External service failures |
//! | **Authorization** | `Unauthorized` | Permission denied, auth failures |
//! | **Not Found** | `NotFound` | Missing resources |
//! | **Internal** | `Internal` | Bugs, invariant violations |
//!
//! ## ErrorClassification Trait
//!
//! All error types in the system should implement `ErrorClassification` to
//! provide:
//!
//! - **`is_retryable()`**: Can this operation be retried?
//! - **`severity()`**: How serious is this error? (Info/Warning/Error/Critical)
//! - **`is_critical()`**: Does this require immediate attention?
//! - **`retry_after()`**: Suggested retry delay (if applicable)
//!
//! These methods enable:
//! - Consistent retry logic across all modules
//! - Unified monitoring and alerting
//! - Better error reporting and debugging
//!
//! ## ErrorSeverity Levels
//!
//! | Level | Use Case | Examples |
//! |-------|----------|----------|
//! | **Info** | Informational, expected conditions | Resource not found, empty results |
//! | **Warning** | Degraded but operational | Rate limiting, lock contention, transient failures |
//! | **Error** | Failure requiring attention | Network errors, invalid input, config errors |
//! | **Critical** | System integrity at risk | Data corruption, encryption failures, internal errors |
//!
//! ## Examples
//!
//! ### Using CommonError directly
//!
//! ```rust,ignore
//! use crate::error::{CommonError, CommonResult};
//!
//! fn load_config() -> CommonResult<Config> {
//!     let data = std::fs::read_to_string("config.toml")
//!         .map_err(|e| CommonError::persistence(e.to_string()))?;
//!
//!     toml::from_str(&data)
//!         .map_err(|e| CommonError::serialization_format("TOML", e.to_string()))
//! }
//! ```
//!
//! ### Creating a module-specific error
//!
//! ```rust,ignore
//! use crate::error::{CommonError, ErrorClassification, ErrorSeverity};
//! use thiserror::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum WidgetError {
//!     #[error("Widget not found: {0}")]
//!     NotFound(String),
//!
//!     #[error("Widget validation failed: {0}")]
//!     Invalid(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//!
//! impl ErrorClassification for WidgetError {
//!     fn is_retryable(&self) -> bool {
//!         match self {
//!             Self::NotFound(_) | Self::Invalid(_) => false,
//!             Self::Common(e) => e.is_retryable(),
//!         }
//!     }
//!
//!     fn severity(&self) -> ErrorSeverity {
//!         match self {
//!             Self::NotFound(_) => ErrorSeverity::Info,
//!             Self::Invalid(_) => ErrorSeverity::Error,
//!             Self::Common(e) => e.severity(),
//!         }
//!     }
//!
//!     fn is_critical(&self) -> bool {
//!         match self {
//!             Self::Common(e) => e.is_critical(),
//!             _ => false,
//!         }
//!     }
//!
//!     fn retry_after(&self) -> Option<Duration> {
//!         match self {
//!             Self::Common(e) => e.retry_after(),
//!             _ => None,
//!         }
//!     }
//! }
//! ```
//!
//! ### Using ErrorClassification for retry logic
//!
//! ```rust,ignore
//! use crate::error::ErrorClassification;
//!
//! async fn with_retry<F, T, E>(mut operation: F) -> Result<T, E>
//! where
//!     F: FnMut() -> Result<T, E>,
//!     E: ErrorClassification,
//! {
//!     for attempt in 1..=3 {
//!         match operation() {
//!             Ok(result) => return Ok(result),
//!             Err(e) if e.is_retryable() => {
//!                 if let Some(delay) = e.retry_after() {
//!                     tokio::time::sleep(delay).await;
//!                 }
//!                 continue;
//!             }
//!             Err(e) => return Err(e),
//!         }
//!     }
//!     unreachable!()
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple modules
///
/// This enum provides standardized error types that can be embedded in
/// module-specific error enums to ensure consistency across the application.
#[derive(Debug, Clone)]
pub enum CommonError {
    /// Configuration-related errors
    Config { message: String, field: Option<String> },

    /// Lock acquisition or concurrency errors
    Lock { message: String, resource: Option<String> },

    /// Circuit breaker is open, preventing operations
    CircuitBreakerOpen { service: String, retry_after: Option<Duration> },

    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// Data persistence errors (file I/O, database, etc.)
    Persistence { message: String, operation: Option<String> },

    /// Rate limiting errors
    RateLimitExceeded {
        limit: Option<u32>,
        window: Option<Duration>,
        retry_after: Option<Duration>,
    },

    /// Timeout errors
    Timeout { operation: String, duration: Duration },

    /// Network or backend connectivity errors
    Backend { service: String, message: String, is_retryable: bool },

    /// Validation errors
    Validation { field: String, message: String, value: Option<String> },

    /// Resource not found errors
    NotFound { resource_type: String, identifier: Option<String> },

    /// Permission or authorization errors
    Unauthorized { operation: String, required_permission: Option<String> },

    /// Internal errors that shouldn't normally occur
    Internal { message: String, context: Option<String> },

    /// Storage/database errors
    Storage { message: String, operation: Option<String> },

    /// Detailed error with severity and context
    Detailed { message: String, severity: ErrorSeverity, context: Option<String> },

    /// Task cancellation (async)
    TaskCancelled { task_id: String, reason: Option<String> },

    /// Async operation timeout
    AsyncTimeout { future_name: String, duration: Duration },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { message, field } => {
                if let Some(field) = field {
                    write!(f, "Configuration error in field '{}': {}", field, message)
                } else {
                    write!(f, "Configuration error: {}", message)
                }
            }
            Self::Lock { message, resource } => {
                if let Some(resource) = resource {
                    write!(f, "Lock error for '{}': {}", resource, message)
                } else {
                    write!(f, "Lock error: {}", message)
                }
            }
            Self::CircuitBreakerOpen { service, retry_after } => {
                if let Some(retry) = retry_after {
                    write!(f, "Circuit breaker open for '{}' (retry in {:?})", service, retry)
                } else {
                    write!(f, "Circuit breaker open for '{}'", service)
                }
            }
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "Serialization error ({}): {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Persistence { message, operation } => {
                if let Some(op) = operation {
                    write!(f, "Persistence error during '{}': {}", op, message)
                } else {
                    write!(f, "Persistence error: {}", message)
                }
            }
            Self::RateLimitExceeded { limit, window, retry_after } => {
                let mut msg = "Rate limit exceeded".to_string();
                if let (Some(limit), Some(window)) = (limit, window) {
                    msg.push_str(&format!(": {} requests per {:?}", limit, window));
                }
                if let Some(retry) = retry_after {
                    msg.push_str(&format!(" (retry in {:?})", retry));
                }
                write!(f, "{}", msg)
            }
            Self::Timeout { operation, duration } => {
                write!(f, "Operation '{}' timed out after {:?}", operation, duration)
            }
            Self::Backend { service, message, .. } => {
                write!(f, "Backend error from '{}': {}", service, message)
            }
            Self::Validation { field, message, value } => {
                if let Some(value) = value {
                    write!(
                        f,
                        "Validation error for field '{}' (value: '{}'): {}",
                        field, value, message
                    )
                } else {
                    write!(f, "Validation error for field '{}': {}", field, message)
                }
            }
            Self::NotFound { resource_type, identifier } => {
                if let Some(id) = identifier {
                    write!(f, "{} not found: '{}'", resource_type, id)
                } else {
                    write!(f, "{} not found", resource_type)
                }
            }
            Self::Unauthorized { operation, required_permission } => {
                if let Some(perm) = required_permission {
                    write!(f, "Unauthorized to perform '{}' (requires: {})", operation, perm)
                } else {
                    write!(f, "Unauthorized to perform '{}'", operation)
                }
            }
            Self::Internal { message, context } => {
                if let Some(ctx) = context {
                    write!(f, "Internal error in '{}': {}", ctx, message)
                } else {
                    write!(f, "Internal error: {}", message)
                }
            }
            Self::Storage { message, operation } => {
                if let Some(op) = operation {
                    write!(f, "Storage error during '{}': {}", op, message)
                } else {
                    write!(f, "Storage error: {}", message)
                }
            }
            Self::Detailed { message, severity, .. } => {
                write!(f, "[{}] {}", severity, message)
            }
            Self::TaskCancelled { task_id, reason } => {
                if let Some(reason) = reason {
                    write!(f, "Task '{}' cancelled: {}", task_id, reason)
                } else {
                    write!(f, "Task '{}' cancelled", task_id)
                }
            }
            Self::AsyncTimeout { future_name, duration } => {
                write!(f, "Async operation '{}' timed out after {:?}", future_name, duration)
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    /// Check if this error is retryable
    fn is_retryable(&self) -> bool {
        match self {
            Self::CircuitBreakerOpen { .. } => true,
            Self::RateLimitExceeded { .. } => true,
            Self::Timeout { .. } => true,
            Self::Backend { is_retryable, .. } => *is_retryable,
            Self::Lock { .. } => true,
            Self::AsyncTimeout { .. } => true,
            _ => false,
        }
    }

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } => ErrorSeverity::Error,
            Self::Lock { .. } => ErrorSeverity::Warning,
            Self::CircuitBreakerOpen { .. } => ErrorSeverity::Warning,
            Self::Serialization { .. } => ErrorSeverity::Error,
            Self::Persistence { .. } => ErrorSeverity::Error,
            Self::RateLimitExceeded { .. } => ErrorSeverity::Warning,
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Backend { .. } => ErrorSeverity::Error,
            Self::Validation { .. } => ErrorSeverity::Error,
            Self::NotFound { .. } => ErrorSeverity::Info,
            Self::Unauthorized { .. } => ErrorSeverity::Warning,
            Self::Internal { .. } => ErrorSeverity::Critical,
            Self::Storage { .. } => ErrorSeverity::Error,
            Self::Detailed { severity, .. } => *severity,
            Self::TaskCancelled { .. } => ErrorSeverity::Info,
            Self::AsyncTimeout { .. } => ErrorSeverity::Warning,
        }
    }

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitBreakerOpen { retry_after, .. } => *retry_after,
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error for a specific field
    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a simple lock error
    pub fn lock<S: Into<String>>(message: S) -> Self {
        Self::Lock { message: message.into(), resource: None }
    }

    /// Create a lock error for a specific resource
    pub fn lock_resource<S: Into<String>, R: Into<String>>(resource: R, message: S) -> Self {
        Self::Lock { message: message.into(), resource: Some(resource.into()) }
    }

    /// Create a circuit breaker error
    pub fn circuit_breaker<S: Into<String>>(service: S) -> Self {
        Self::CircuitBreakerOpen { service: service.into(), retry_after: None }
    }

    /// Create a circuit breaker error with retry timing
    pub fn circuit_breaker_with_retry<S: Into<String>>(service: S, retry_after: Duration) -> Self {
        Self::CircuitBreakerOpen { service: service.into(), retry_after: Some(retry_after) }
    }

    /// Create a simple serialization error
    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization { message: message.into(), format: None }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<S: Into<String>, F: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a simple persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// Create a persistence error for a specific operation
    pub fn persistence_op<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    /// Create a simple rate limit error
    pub fn rate_limit() -> Self {
        Self::RateLimitExceeded { limit: None, window: None, retry_after: None }
    }

    /// Create a rate limit error with details
    pub fn rate_limit_detailed(
        limit: u32,
        window: Duration,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::RateLimitExceeded { limit: Some(limit), window: Some(window), retry_after }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a backend error
    pub fn backend<S: Into<String>, M: Into<String>>(
        service: S,
        message: M,
        is_retryable: bool,
    ) -> Self {
        Self::Backend { service: service.into(), message: message.into(), is_retryable }
    }

    /// Create a validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: None }
    }

    /// Create a validation error with the invalid value
    pub fn validation_with_value<F: Into<String>, M: Into<String>, V: Into<String>>(
        field: F,
        message: M,
        value: V,
    ) -> Self {
        Self::Validation { field: field.into(), message: message.into(), value: Some(value.into()) }
    }

    /// Create a not found error
    pub fn not_found<T: Into<String>>(resource_type: T) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: None }
    }

    /// Create a not found error with identifier
    pub fn not_found_with_id<T: Into<String>, I: Into<String>>(
        resource_type: T,
        identifier: I,
    ) -> Self {
        Self::NotFound { resource_type: resource_type.into(), identifier: Some(identifier.into()) }
    }

    /// Create an unauthorized error
    pub fn unauthorized<O: Into<String>>(operation: O) -> Self {
        Self::Unauthorized { operation: operation.into(), required_permission: None }
    }

    /// Create an unauthorized error with required permission
    pub fn unauthorized_with_perm<O: Into<String>, P: Into<String>>(
        operation: O,
        permission: P,
    ) -> Self {
        Self::Unauthorized {
            operation: operation.into(),
            required_permission: Some(permission.into()),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), context: None }
    }

    /// Create an internal error with context
    pub fn internal_with_context<S: Into<String>, C: Into<String>>(message: S, context: C) -> Self {
        Self::Internal { message: message.into(), context: Some(context.into()) }
    }

    /// Create a task cancellation error
    pub fn task_cancelled<S: Into<String>>(task_id: S) -> Self {
        Self::TaskCancelled { task_id: task_id.into(), reason: None }
    }

    /// Create a task cancellation error with reason
    pub fn task_cancelled_with_reason<S: Into<String>, R: Into<String>>(
        task_id: S,
        reason: R,
    ) -> Self {
        Self::TaskCancelled { task_id: task_id.into(), reason: Some(reason.into()) }
    }

    /// Create an async timeout error
    pub fn async_timeout<S: Into<String>>(future_name: S, duration: Duration) -> Self {
        Self::AsyncTimeout { future_name: future_name.into(), duration }
    }

    /// Add context to this error (fluent API)
    ///
    /// This allows chaining additional context onto an error:
    ///
    /// ```rust,ignore
    /// CommonError::timeout("operation", dur)
    ///     .with_additional_context("retry_attempt", "3")
    /// ```
    pub fn with_additional_context<K: Into<String>, V: Into<String>>(
        self,
        _key: K,
        _value: V,
    ) -> Self {
        // For now, we store the original error
        // Future: could extend to store key-value pairs in a map
        self
    }

    /// Convert error to structured logging fields
    ///
    /// Returns a vector of key-value pairs suitable for structured logging.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use tracing::error;
    ///
    /// let err = CommonError::timeout("database_query", Duration::from_secs(5));
    /// let fields = err.as_tracing_fields();
    /// error!(
    ///     error_type = fields[0].1,
    ///     operation = fields[1].1,
    ///     "Operation failed"
    /// );
    /// ```
    pub fn as_tracing_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("error_type", self.error_type_name().to_string())];

        match self {
            Self::Config { message, field } => {
                fields.push(("message", message.clone()));
                if let Some(field) = field {
                    fields.push(("field", field.clone()));
                }
            }
            Self::Lock { message, resource } => {
                fields.push(("message", message.clone()));
                if let Some(resource) = resource {
                    fields.push(("resource", resource.clone()));
                }
            }
            Self::CircuitBreakerOpen { service, retry_after } => {
                fields.push(("service", service.clone()));
                if let Some(retry) = retry_after {
                    fields.push(("retry_after_ms", retry.as_millis().to_string()));
                }
            }
            Self::Serialization { message, format } => {
                fields.push(("message", message.clone()));
                if let Some(format) = format {
                    fields.push(("format", format.clone()));
                }
            }
            Self::Persistence { message, operation } => {
                fields.push(("message", message.clone()));
                if let Some(op) = operation {
                    fields.push(("operation", op.clone()));
                }
            }
            Self::RateLimitExceeded { limit, window, retry_after } => {
                if let Some(limit) = limit {
                    fields.push(("limit", limit.to_string()));
                }
                if let Some(window) = window {
                    fields.push(("window_ms", window.as_millis().to_string()));
                }
                if let Some(retry) = retry_after {
                    fields.push(("retry_after_ms", retry.as_millis().to_string()));
                }
            }
            Self::Timeout { operation, duration } => {
                fields.push(("operation", operation.clone()));
                fields.push(("duration_ms", duration.as_millis().to_string()));
            }
            Self::Backend { service, message, is_retryable } => {
                fields.push(("service", service.clone()));
                fields.push(("message", message.clone()));
                fields.push(("is_retryable", is_retryable.to_string()));
            }
            Self::Validation { field, message, value } => {
                fields.push(("field", field.clone()));
                fields.push(("message", message.clone()));
                if let Some(value) = value {
                    fields.push(("value", value.clone()));
                }
            }
            Self::NotFound { resource_type, identifier } => {
                fields.push(("resource_type", resource_type.clone()));
                if let Some(id) = identifier {
                    fields.push(("identifier", id.clone()));
                }
            }
            Self::Unauthorized { operation, required_permission } => {
                fields.push(("operation", operation.clone()));
                if let Some(perm) = required_permission {
                    fields.push(("required_permission", perm.clone()));
                }
            }
            Self::Internal { message, context } => {
                fields.push(("message", message.clone()));
                if let Some(ctx) = context {
                    fields.push(("context", ctx.clone()));
                }
            }
            Self::Storage { message, operation } => {
                fields.push(("message", message.clone()));
                if let Some(op) = operation {
                    fields.push(("operation", op.clone()));
                }
            }
            Self::Detailed { message, severity, context } => {
                fields.push(("message", message.clone()));
                fields.push(("severity", format!("{}", severity)));
                if let Some(ctx) = context {
                    fields.push(("context", ctx.clone()));
                }
            }
            Self::TaskCancelled { task_id, reason } => {
                fields.push(("task_id", task_id.clone()));
                if let Some(reason) = reason {
                    fields.push(("reason", reason.clone()));
                }
            }
            Self::AsyncTimeout { future_name, duration } => {
                fields.push(("future_name", future_name.clone()));
                fields.push(("duration_ms", duration.as_millis().to_string()));
            }
        }

        fields
    }

    /// Get the error type name for categorization
    fn error_type_name(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Lock { .. } => "lock",
            Self::CircuitBreakerOpen { .. } => "circuit_breaker_open",
            Self::Serialization { .. } => "serialization",
            Self::Persistence { .. } => "persistence",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
            Self::Timeout { .. } => "timeout",
            Self::Backend { .. } => "backend",
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Internal { .. } => "internal",
            Self::Storage { .. } => "storage",
            Self::Detailed { .. } => "detailed",
            Self::TaskCancelled { .. } => "task_cancelled",
            Self::AsyncTimeout { .. } => "async_timeout",
        }
    }
}

/// Error classification trait for consistent error handling across modules
///
/// This trait provides a standard interface for classifying errors by their
/// characteristics, enabling consistent retry logic, monitoring, and alerting
/// across the entire application.
///
/// # Example
///
/// ```rust,ignore
/// use crate::error::{ErrorClassification, ErrorSeverity};
///
/// impl ErrorClassification for MyError {
///     fn is_retryable(&self) -> bool {
///         match self {
///             Self::Transient(_) => true,
///             Self::Permanent(_) => false,
///             Self::Common(e) => e.is_retryable(),
///         }
///     }
///
///     fn severity(&self) -> ErrorSeverity {
///         match self {
///             Self::Transient(_) => ErrorSeverity::Warning,
///             Self::Permanent(_) => ErrorSeverity::Error,
///             Self::Common(e) => e.severity(),
///         }
///     }
///
///     fn is_critical(&self) -> bool {
///         self.severity() == ErrorSeverity::Critical
///     }
///
///     fn retry_after(&self) -> Option<Duration> {
///         match self {
///             Self::Common(e) => e.retry_after(),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are typically transient issues that may succeed if
    /// attempted again, such as:
    /// - Network timeouts
    /// - Rate limiting
    /// - Lock contention
    /// - Circuit breaker open states
    /// - Temporary service unavailability
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for monitoring, alerting, and logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    ///
    /// Critical errors typically indicate:
    /// - Data corruption
    /// - Security issues
    /// - Internal invariant violations
    /// - System integrity problems
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` for retryable errors when a specific retry
    /// delay is recommended (e.g., from a Retry-After header), or `None`
    /// if no specific delay is suggested.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// Standard conversions from common error types
impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

#[cfg(feature = "foundation")]
impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

#[cfg(feature = "foundation")]
impl From<toml::ser::Error> for CommonError {
    fn from(err: toml::ser::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

/// Trait for module-specific errors to embed common error variants
///
/// This trait allows module-specific error enums to convert common errors
/// into their own error types, providing a consistent interface.
pub trait ErrorContext {
    /// Convert a CommonError into this error type
    fn from_common(err: CommonError) -> Self;

    /// Create a context-specific error message
    fn with_context<S: Into<String>>(self, context: S) -> Self
    where
        Self: Sized;
}

/// Utility macro for creating error conversions from std types
///
/// This macro helps create standard error conversions for module-specific error
/// enums. Note: `From<CommonError>` is typically handled by `#[from]` attribute
/// on the variant.
///
/// # Basic Usage
///
/// ```rust,ignore
/// #[derive(Debug, thiserror::Error)]
/// pub enum MyError {
///     #[error(transparent)]
///     Common(#[from] CommonError),  // #[from] handles From<CommonError>
/// }
///
/// impl_error_conversion!(MyError, Common);
/// ```
///
/// This generates:
/// - `From<serde_json::Error> for MyError` (via CommonError)
/// - `From<std::io::Error> for MyError` (via CommonError)
///
/// If you need `From<CommonError>` and can't use `#[from]`, use the
/// `with_common` variant:
///
/// ```rust,ignore
/// impl_error_conversion!(MyError, Common, with_common);
/// ```
#[macro_export]
macro_rules! impl_error_conversion {
    // Standard variant - assumes #[from] is used for CommonError
    ($error_type:ty, $variant:ident) => {
        impl From<serde_json::Error> for $error_type {
            fn from(err: serde_json::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }

        impl From<std::io::Error> for $error_type {
            fn from(err: std::io::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }
    };

    // Variant that includes From<CommonError> (for cases without #[from])
    ($error_type:ty, $variant:ident, with_common) => {
        impl From<$crate::error::CommonError> for $error_type {
            fn from(err: $crate::error::CommonError) -> Self {
                Self::$variant(err)
            }
        }

        impl From<serde_json::Error> for $error_type {
            fn from(err: serde_json::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }

        impl From<std::io::Error> for $error_type {
            fn from(err: std::io::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }
    };
}

/// Macro to implement ErrorClassification by delegating to CommonError
///
/// This macro simplifies implementing `ErrorClassification` for module-specific
/// errors that embed `CommonError` and want to delegate classification logic.
///
/// # Usage
///
/// ```rust,ignore
/// #[derive(Debug, thiserror::Error)]
/// pub enum MyError {
///     #[error("Module-specific error: {0}")]
///     Specific(String),
///
///     #[error(transparent)]
///     Common(#[from] CommonError),
/// }
///
/// impl_error_classification!(MyError, Common,
///     Specific(_) => {
///         retryable: false,
///         severity: ErrorSeverity::Error,
///         critical: false,
///     }
/// );
/// ```
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_retryable(),
                    $(
                        $variant => $retryable,
                    )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => e.severity(),
                    $(
                        $variant => $severity,
                    )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_critical(),
                    $(
                        $variant => $critical,
                    )*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => e.retry_after(),
                    $(
                        $(
                            $variant => $retry_after,
                        )?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}

// Helper macro to implement `From<ModuleError> for CommonError`
//
// This is the manual implementation part of bidirectional conversion.
// `From<CommonError> for ModuleError` is typically handled by `#[from]`.
//
// # Usage
//
// ```rust,ignore
// impl From<MyError> for CommonError {
//     fn from(err: MyError) -> Self {
//         match err {
//             MyError::Common(e) => e,
//             MyError::Config(msg) => CommonError::config(msg),
//             MyError::InvalidOp(msg) => CommonError::validation("operation", msg),
//         }
//     }
// }
// ```
//
// Note: This macro is provided for documentation purposes. In practice,
// implement `From<ModuleError> for CommonError` manually for clarity.
