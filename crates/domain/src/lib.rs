//! # Forge/Sheet Sync Domain
//!
//! Business domain types and models for the forge/sheet task synchronizer.
//!
//! This crate contains:
//! - Domain entity types (Member, Task, Mapping, OutboxEvent, ...)
//! - The status lattice shared by both sync directions
//! - Domain error types and the `Result` alias
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other workspace crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
