// Port Layer - Interfaces for external dependencies

pub mod dispatcher;
pub mod id_provider; // For deterministic testing
pub mod time_provider;
pub mod transaction_repository;

// Re-exports
pub use dispatcher::{DispatchTask, TaskDispatcher, TokioDispatcher};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
pub use transaction_repository::{memory::MemoryTransactionRepository, TransactionRepository};
