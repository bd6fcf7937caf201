//! SQLite adapter: connection pool, schema, and one repository module per
//! `forgesheet_core::store` port, plus the `Store`/`StoreTx` facade tying
//! them together.

mod audit;
mod cursors;
mod mappings;
mod members;
mod outbox;
pub mod pool;
mod registry;
mod store;
mod support;
mod tasks;

pub use audit::SqliteAuditRepository;
pub use cursors::SqliteCursorRepository;
pub use mappings::SqliteMappingRepository;
pub use members::SqliteMemberRepository;
pub use outbox::SqliteOutboxRepository;
pub use pool::{open_pool, SqlitePool};
pub use registry::SqliteSheetTableRegistryRepository;
pub use store::SqliteStore;
pub use tasks::SqliteTaskRepository;
