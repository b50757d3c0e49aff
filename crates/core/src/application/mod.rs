// Application Layer - coordination services

pub mod compensable;
pub mod manager;
pub mod recovery;
pub mod registry;
pub mod terminator;

pub use compensable::{CompensableDefinition, CompensableExecutor, DelayCancelPredicate};
pub use manager::{TransactionManager, TransactionScope};
pub use recovery::{RecoveryConfig, RecoveryService};
pub use registry::{CompensableHandler, HandlerFuture, HandlerRegistry};
pub use terminator::Terminator;
