//! # Forge/Sheet Infrastructure
//!
//! Concrete adapters for the ports `forgesheet_core` defines:
//! - `database` — the SQLite `Store`/`StoreTx` implementation
//! - `gateway` — the forge REST client and the sheet JSON-RPC client
//! - `identity` — the read-through `CachingIdentityResolver`
//! - `sync` — the `OutboxDispatcher` worker loop and per-source `Reconciler`
//! - `config` — environment-based `Config` loading
//!
//! ## Architecture
//! - Implements traits defined in `forgesheet-core`
//! - Depends on `forgesheet-common` and `forgesheet-domain`
//! - All I/O (SQLite, HTTP, subprocess) lives here; `forgesheet-core` stays pure

pub mod config;
pub mod database;
pub mod gateway;
pub mod identity;
pub mod sync;

pub use config::load;
pub use database::{open_pool, SqliteStore, SqlitePool};
pub use gateway::{ChildProcessTransport, JsonRpcSheetGateway, JsonRpcTransport, ReqwestForgeGateway};
pub use identity::CachingIdentityResolver;
pub use sync::{DispatcherConfig, OutboxDispatcher, Reconciler};
