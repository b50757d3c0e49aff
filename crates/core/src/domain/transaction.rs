// Transaction Aggregate - id, phase machine, participants, version

use crate::domain::context::TransactionContext;
use crate::domain::error::{DomainError, Result};
use crate::domain::participant::Participant;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Global transaction identifier.
///
/// A branch transaction reuses the id of the root it belongs to; the id is
/// the correlation key confirm/cancel redeliveries use to find the branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Transaction phase (wire codes 1/2/3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionPhase {
    Trying,
    Confirming,
    Cancelling,
}

impl TransactionPhase {
    pub const fn code(self) -> i32 {
        match self {
            TransactionPhase::Trying => 1,
            TransactionPhase::Confirming => 2,
            TransactionPhase::Cancelling => 3,
        }
    }

    /// Decode a wire phase code. Unrecognized codes fall back to Cancelling:
    /// for a compensation protocol the safe action on a context we cannot
    /// interpret is to cancel, never to confirm.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => TransactionPhase::Trying,
            2 => TransactionPhase::Confirming,
            _ => TransactionPhase::Cancelling,
        }
    }
}

impl std::fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionPhase::Trying => write!(f, "TRYING"),
            TransactionPhase::Confirming => write!(f, "CONFIRMING"),
            TransactionPhase::Cancelling => write!(f, "CANCELLING"),
        }
    }
}

/// Whether this record originated the transaction or joined an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionRole {
    Root,
    Branch,
}

impl std::fmt::Display for TransactionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionRole::Root => write!(f, "ROOT"),
            TransactionRole::Branch => write!(f, "BRANCH"),
        }
    }
}

/// Transaction Entity
///
/// Successful completion is represented by the row's absence from the
/// repository; there is no terminal phase value. `version` is incremented by
/// the repository on every successful update (optimistic concurrency).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    phase: TransactionPhase,
    pub role: TransactionRole,
    pub participants: Vec<Participant>,
    pub retry_count: i32,
    pub created_at: i64, // epoch ms
    pub last_updated_at: i64,
    pub version: i64,
    pub attachments: BTreeMap<String, serde_json::Value>,
}

impl Transaction {
    /// Create a new root transaction in the Trying phase
    pub fn new_root(id: TransactionId, now_millis: i64) -> Self {
        Self::with_role(id, TransactionRole::Root, now_millis)
    }

    /// Create a branch transaction joining the incoming context's id
    pub fn new_branch(context: &TransactionContext, now_millis: i64) -> Self {
        Self::with_role(context.id(), TransactionRole::Branch, now_millis)
    }

    fn with_role(id: TransactionId, role: TransactionRole, now_millis: i64) -> Self {
        Self {
            id,
            phase: TransactionPhase::Trying,
            role,
            participants: Vec::new(),
            retry_count: 0,
            created_at: now_millis,
            last_updated_at: now_millis,
            version: 1,
            attachments: BTreeMap::new(),
        }
    }

    /// Rehydrate a transaction from its persisted representation.
    /// Repository adapters only; bypasses the phase machine.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: TransactionId,
        phase: TransactionPhase,
        role: TransactionRole,
        participants: Vec<Participant>,
        retry_count: i32,
        created_at: i64,
        last_updated_at: i64,
        version: i64,
        attachments: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id,
            phase,
            role,
            participants,
            retry_count,
            created_at,
            last_updated_at,
            version,
            attachments,
        }
    }

    pub fn phase(&self) -> TransactionPhase {
        self.phase
    }

    /// Advance the phase. Transitions are forward-only: Trying may enter
    /// Confirming or Cancelling, a phase may re-enter itself (idempotent
    /// redelivery), and nothing else is legal.
    pub fn enter_phase(&mut self, next: TransactionPhase) -> Result<()> {
        let legal = self.phase == next
            || (self.phase == TransactionPhase::Trying && next != TransactionPhase::Trying);

        if !legal {
            return Err(DomainError::InvalidPhaseTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }

        self.phase = next;
        Ok(())
    }

    /// Append a participant, binding it to this transaction's id if it was
    /// built before the transaction existed
    pub fn enlist(&mut self, mut participant: Participant) {
        if participant.transaction_id().is_none() {
            participant.bind(self.id);
        }
        self.participants.push(participant);
    }

    pub fn add_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Refresh the last-updated timestamp (repository adapters)
    pub fn touch(&mut self, now_millis: i64) {
        self.last_updated_at = now_millis;
    }
}
