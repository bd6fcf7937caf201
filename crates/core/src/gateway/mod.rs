//! Gateway ports — the external-system boundary. `forgesheet_infra::gateway`
//! provides the concrete `reqwest`/subprocess adapters.

mod error;
mod forge;
mod sheet;

pub use error::GatewayError;
pub use forge::{ForgeGateway, ForgeIssue};
pub use sheet::{SheetGateway, SheetRecord};
