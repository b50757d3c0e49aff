// Domain Layer - TCC transaction model

pub mod context;
pub mod error;
pub mod invocation;
pub mod participant;
pub mod propagation;
pub mod transaction;

pub use context::{ContextEditorKind, TransactionContext};
pub use error::DomainError;
pub use invocation::{InvocationDescriptor, TRANSACTION_CONTEXT_TYPE};
pub use participant::Participant;
pub use propagation::{classify, is_legal_context, MethodRole, Propagation};
pub use transaction::{Transaction, TransactionId, TransactionPhase, TransactionRole};
