//! Application layer: keeper, block driver, lifecycle service, genesis and queries.

pub mod driver;
pub mod genesis;
pub mod keeper;
pub mod querier;
pub mod service;

pub use driver::BlockDriver;
pub use genesis::{bootstrap, BootstrapError};
pub use keeper::StateHashKeeper;
pub use querier::handle_query;
pub use service::{BlockContext, BlockHeader, EndBlockOutcome, ExecutionLayerService, GenesisState};
