// Transaction Context - wire value + context-injection capability

use crate::domain::invocation::TRANSACTION_CONTEXT_TYPE;
use crate::domain::transaction::{TransactionId, TransactionPhase};
use serde::{Deserialize, Serialize};

/// Wire-transportable transaction identity: {id, phase code}.
///
/// The phase travels as its integer code (1=TRYING, 2=CONFIRMING,
/// 3=CANCELLING) so the shape stays stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionContext {
    id: TransactionId,
    phase: i32,
}

impl TransactionContext {
    pub fn new(id: TransactionId, phase: TransactionPhase) -> Self {
        Self {
            id,
            phase: phase.code(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn phase(&self) -> TransactionPhase {
        TransactionPhase::from_code(self.phase)
    }

    pub fn phase_code(&self) -> i32 {
        self.phase
    }
}

/// Context-injection capability, selected per compensable declaration.
///
/// Serializable so a persisted Participant replays its confirm/cancel with
/// the capability it was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextEditorKind {
    /// Place the context into the argument slot declared with the
    /// `TransactionContext` parameter type
    ArgumentScan,
    /// Leave arguments untouched; the transport carries context out of band
    OutOfBand,
}

impl ContextEditorKind {
    /// Read a context back out of call arguments, if one is present
    pub fn extract(
        &self,
        parameter_types: &[String],
        args: &[serde_json::Value],
    ) -> Option<TransactionContext> {
        match self {
            ContextEditorKind::OutOfBand => None,
            ContextEditorKind::ArgumentScan => {
                let position = parameter_types
                    .iter()
                    .position(|parameter| parameter == TRANSACTION_CONTEXT_TYPE)?;
                args.get(position)
                    .and_then(|value| serde_json::from_value(value.clone()).ok())
            }
        }
    }

    /// Write the context into the matching argument slot
    pub fn inject(
        &self,
        context: &TransactionContext,
        parameter_types: &[String],
        args: &mut [serde_json::Value],
    ) -> Result<(), serde_json::Error> {
        match self {
            ContextEditorKind::OutOfBand => Ok(()),
            ContextEditorKind::ArgumentScan => {
                let position = parameter_types
                    .iter()
                    .position(|parameter| parameter == TRANSACTION_CONTEXT_TYPE);
                if let Some(position) = position {
                    if let Some(slot) = args.get_mut(position) {
                        *slot = serde_json::to_value(context)?;
                    }
                }
                Ok(())
            }
        }
    }
}
