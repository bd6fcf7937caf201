//! Concrete adapters for `forgesheet_core::gateway`'s ports.

mod forge;
mod http;
mod sheet;

pub use forge::ReqwestForgeGateway;
pub use sheet::{ChildProcessTransport, JsonRpcSheetGateway, JsonRpcTransport};
