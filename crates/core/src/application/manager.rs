// Transaction Manager - begin/propagate/commit/rollback over the call-scoped stack

use crate::application::terminator::Terminator;
use crate::domain::{
    DomainError, Participant, Transaction, TransactionContext, TransactionId, TransactionPhase,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TaskDispatcher, TimeProvider, TransactionRepository};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Call-scoped stack of active transactions.
///
/// A cheaply cloneable handle: clones share one stack, so business logic can
/// carry the scope into its closures and enlist against the same chain. One
/// scope per logical call chain, never shared across concurrent requests;
/// the inner lock only provides interior mutability for the handle, it is
/// uncontended by construction. REQUIRES_NEW stacks a new transaction on top
/// without removing the outer one; the outer resumes by becoming top again
/// after `clean_after_completion`.
#[derive(Clone, Default)]
pub struct TransactionScope {
    stack: Arc<Mutex<Vec<Transaction>>>,
}

impl TransactionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current (top-of-stack) transaction
    pub fn current(&self) -> Option<Transaction> {
        self.stack.lock().unwrap().last().cloned()
    }

    pub fn is_active(&self) -> bool {
        !self.stack.lock().unwrap().is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().unwrap().len()
    }

    fn push(&self, transaction: Transaction) {
        self.stack.lock().unwrap().push(transaction);
    }

    fn pop(&self) -> Option<Transaction> {
        self.stack.lock().unwrap().pop()
    }

    /// Write a mutated snapshot back over the top-of-stack element
    fn replace_top(&self, transaction: Transaction) {
        let mut stack = self.stack.lock().unwrap();
        if let Some(top) = stack.last_mut() {
            *top = transaction;
        }
    }
}

/// Orchestrates the TCC lifecycle: creates and registers transactions,
/// persists every phase change before driving participants, and drives
/// confirm/cancel inline or through the async dispatcher.
#[derive(Clone)]
pub struct TransactionManager {
    repository: Arc<dyn TransactionRepository>,
    dispatcher: Arc<dyn TaskDispatcher>,
    terminator: Arc<Terminator>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl TransactionManager {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        dispatcher: Arc<dyn TaskDispatcher>,
        terminator: Arc<Terminator>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            terminator,
            id_provider,
            time_provider,
        }
    }

    /// Start a root transaction: fresh id, phase Trying, persisted before it
    /// becomes current
    pub async fn begin(&self, scope: &TransactionScope) -> Result<TransactionId> {
        let id = self.id_provider.next_id();
        let transaction = Transaction::new_root(id, self.time_provider.now_millis());
        self.repository.create(&transaction).await?;
        scope.push(transaction);

        debug!(transaction_id = %id, "root transaction started");
        Ok(id)
    }

    /// Start a branch transaction joining the incoming context's id.
    /// Used when a provider call arrives during the Trying phase.
    pub async fn propagate_new_begin(
        &self,
        scope: &TransactionScope,
        context: &TransactionContext,
    ) -> Result<TransactionId> {
        let transaction = Transaction::new_branch(context, self.time_provider.now_millis());
        self.repository.create(&transaction).await?;
        let id = transaction.id;
        scope.push(transaction);

        debug!(transaction_id = %id, "branch transaction started");
        Ok(id)
    }

    /// Re-acquire a branch transaction for a confirm/cancel delivery.
    ///
    /// "No such transaction" is expected and recoverable: the branch was
    /// already completed by an earlier attempt and its row removed.
    pub async fn propagate_existing_begin(
        &self,
        scope: &TransactionScope,
        context: &TransactionContext,
    ) -> Result<TransactionId> {
        let mut transaction = self
            .repository
            .find_by_id(context.id())
            .await?
            .ok_or(AppError::NoSuchTransaction(context.id()))?;

        transaction.enter_phase(context.phase())?;
        let id = transaction.id;
        scope.push(transaction);

        debug!(transaction_id = %id, phase = %context.phase(), "existing transaction joined");
        Ok(id)
    }

    /// Confirm the current transaction. The phase change is persisted before
    /// any participant is invoked; a crash between persist and drive is
    /// recoverable by a later sweep. With `async_confirm`, the drive runs on
    /// the dispatcher and only a scheduling failure is surfaced here.
    pub async fn commit(&self, scope: &TransactionScope, async_confirm: bool) -> Result<()> {
        let mut transaction = scope.current().ok_or_else(|| Self::no_active("commit"))?;
        transaction.enter_phase(TransactionPhase::Confirming)?;
        self.repository.update(&mut transaction).await?;
        scope.replace_top(transaction.clone());

        if async_confirm {
            let manager = self.clone();
            self.dispatcher
                .submit(Box::pin(async move {
                    if let Err(error) = manager.finish_confirm(&transaction).await {
                        warn!(
                            transaction_id = %transaction.id,
                            error = %error,
                            "async confirm failed, row left for recovery"
                        );
                    }
                }))
                .map_err(|error| AppError::ConfirmFailed(Box::new(error)))
        } else {
            self.finish_confirm(&transaction).await
        }
    }

    /// Cancel the current transaction; symmetric to `commit`
    pub async fn rollback(&self, scope: &TransactionScope, async_cancel: bool) -> Result<()> {
        let mut transaction = scope.current().ok_or_else(|| Self::no_active("rollback"))?;
        transaction.enter_phase(TransactionPhase::Cancelling)?;
        self.repository.update(&mut transaction).await?;
        scope.replace_top(transaction.clone());

        if async_cancel {
            let manager = self.clone();
            self.dispatcher
                .submit(Box::pin(async move {
                    if let Err(error) = manager.finish_cancel(&transaction).await {
                        warn!(
                            transaction_id = %transaction.id,
                            error = %error,
                            "async cancel failed, row left for recovery"
                        );
                    }
                }))
                .map_err(|error| AppError::CancelFailed(Box::new(error)))
        } else {
            self.finish_cancel(&transaction).await
        }
    }

    /// Persist the current transaction without changing phase. Used when a
    /// trying-phase failure is ambiguous (delay-cancel) and the confirm/
    /// cancel decision is deferred to recovery.
    pub async fn sync_transaction(&self, scope: &TransactionScope) -> Result<()> {
        let mut transaction = scope.current().ok_or_else(|| Self::no_active("sync"))?;
        self.repository.update(&mut transaction).await?;
        scope.replace_top(transaction);
        Ok(())
    }

    /// Pop the completed transaction off the scope. LIFO discipline: the
    /// popped element must be the given transaction, anything else is a fatal
    /// internal-consistency violation. `None` is a no-op (a redelivery that
    /// never registered a transaction).
    pub fn clean_after_completion(
        &self,
        scope: &TransactionScope,
        transaction_id: Option<TransactionId>,
    ) -> Result<()> {
        let Some(id) = transaction_id else {
            return Ok(());
        };

        match scope.pop() {
            Some(transaction) if transaction.id == id => Ok(()),
            Some(transaction) => Err(DomainError::IllegalScopeState(format!(
                "expected transaction {} on top of the scope, found {}",
                id, transaction.id
            ))
            .into()),
            None => Err(DomainError::IllegalScopeState(format!(
                "scope is empty while cleaning transaction {}",
                id
            ))
            .into()),
        }
    }

    /// Append a participant to the current transaction and persist it.
    /// Binds the participant to the transaction id if it was built unbound.
    pub async fn enlist_participant(
        &self,
        scope: &TransactionScope,
        participant: Participant,
    ) -> Result<()> {
        let mut transaction = scope
            .current()
            .ok_or_else(|| Self::no_active("enlist participant"))?;
        transaction.enlist(participant);
        self.repository.update(&mut transaction).await?;

        debug!(
            transaction_id = %transaction.id,
            participants = transaction.participants.len(),
            "participant enlisted"
        );
        scope.replace_top(transaction);
        Ok(())
    }

    pub fn current_transaction(&self, scope: &TransactionScope) -> Option<Transaction> {
        scope.current()
    }

    pub fn is_transaction_active(&self, scope: &TransactionScope) -> bool {
        scope.is_active()
    }

    async fn finish_confirm(&self, transaction: &Transaction) -> Result<()> {
        for participant in &transaction.participants {
            let context = TransactionContext::new(transaction.id, TransactionPhase::Confirming);
            self.terminator
                .invoke(&context, participant.confirm_invocation(), participant.context_editor())
                .await
                .map_err(|error| AppError::ConfirmFailed(Box::new(error)))?;
        }
        self.repository
            .delete(transaction)
            .await
            .map_err(|error| AppError::ConfirmFailed(Box::new(error)))?;

        debug!(transaction_id = %transaction.id, "transaction confirmed");
        Ok(())
    }

    async fn finish_cancel(&self, transaction: &Transaction) -> Result<()> {
        for participant in &transaction.participants {
            let context = TransactionContext::new(transaction.id, TransactionPhase::Cancelling);
            self.terminator
                .invoke(&context, participant.cancel_invocation(), participant.context_editor())
                .await
                .map_err(|error| AppError::CancelFailed(Box::new(error)))?;
        }
        self.repository
            .delete(transaction)
            .await
            .map_err(|error| AppError::CancelFailed(Box::new(error)))?;

        debug!(transaction_id = %transaction.id, "transaction cancelled");
        Ok(())
    }

    fn no_active(operation: &str) -> AppError {
        DomainError::IllegalScopeState(format!("no active transaction for {}", operation)).into()
    }
}
