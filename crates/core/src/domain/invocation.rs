// Invocation Descriptor - serializable deferred call

use serde::{Deserialize, Serialize};

/// Declared parameter type marking the argument slot that receives the
/// transaction context on confirm/cancel invocation
pub const TRANSACTION_CONTEXT_TYPE: &str = "TransactionContext";

/// Serializable description of a deferred confirm/cancel call.
///
/// Carries no live handles: the target is a registry key resolved to a
/// handler at invocation time, so the descriptor can be persisted and
/// replayed after a process restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationDescriptor {
    pub target_type: String,
    pub method_name: String,
    pub parameter_types: Vec<String>,
    pub args: Vec<serde_json::Value>,
}

impl InvocationDescriptor {
    pub fn new(
        target_type: impl Into<String>,
        method_name: impl Into<String>,
        parameter_types: Vec<String>,
        args: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            target_type: target_type.into(),
            method_name: method_name.into(),
            parameter_types,
            args,
        }
    }

    /// Position of the transaction-context parameter, if declared
    pub fn context_param_position(&self) -> Option<usize> {
        self.parameter_types
            .iter()
            .position(|parameter| parameter == TRANSACTION_CONTEXT_TYPE)
    }
}
