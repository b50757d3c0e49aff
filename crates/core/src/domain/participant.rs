// Participant - one enlisted unit of compensable work

use crate::domain::context::ContextEditorKind;
use crate::domain::invocation::InvocationDescriptor;
use crate::domain::transaction::TransactionId;
use serde::{Deserialize, Serialize};

/// Binds a transaction id to a confirm descriptor and a cancel descriptor.
///
/// The transaction id may be assigned after construction when the participant
/// is built before its owning transaction exists; enlistment binds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    transaction_id: Option<TransactionId>,
    confirm: InvocationDescriptor,
    cancel: InvocationDescriptor,
    context_editor: ContextEditorKind,
}

impl Participant {
    /// Participant not yet bound to a transaction
    pub fn new(
        confirm: InvocationDescriptor,
        cancel: InvocationDescriptor,
        context_editor: ContextEditorKind,
    ) -> Self {
        Self {
            transaction_id: None,
            confirm,
            cancel,
            context_editor,
        }
    }

    /// Participant bound at construction time
    pub fn bound(
        transaction_id: TransactionId,
        confirm: InvocationDescriptor,
        cancel: InvocationDescriptor,
        context_editor: ContextEditorKind,
    ) -> Self {
        Self {
            transaction_id: Some(transaction_id),
            confirm,
            cancel,
            context_editor,
        }
    }

    pub fn bind(&mut self, transaction_id: TransactionId) {
        self.transaction_id = Some(transaction_id);
    }

    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.transaction_id
    }

    pub fn confirm_invocation(&self) -> &InvocationDescriptor {
        &self.confirm
    }

    pub fn cancel_invocation(&self) -> &InvocationDescriptor {
        &self.cancel
    }

    pub fn context_editor(&self) -> ContextEditorKind {
        self.context_editor
    }
}
