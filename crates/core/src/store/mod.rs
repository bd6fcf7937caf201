//! Store ports — the repository interfaces the rest of the workspace is
//! written against. No implementation lives here; `forgesheet_infra::database`
//! provides the SQLite adapter.

mod ports;
mod tx;

pub use ports::{
    AuditRepository, CursorRepository, MappingRepository, MemberRepository, OutboxRepository,
    SheetTableRegistryRepository, TaskRepository,
};
pub use tx::{
    AuditRepositoryTx, CursorRepositoryTx, MappingRepositoryTx, MemberRepositoryTx,
    OutboxRepositoryTx, SheetTableRegistryRepositoryTx, Store, StoreTx, TaskRepositoryTx,
};
