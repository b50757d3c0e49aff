// Compensable Executor - root/provider/normal flow around business logic
//
// The interception mechanism (aspect, decorator, RPC server glue) is
// external; it extracts the incoming context, builds the try closure, and
// hands both to this executor together with the method's declaration.

use crate::application::manager::{TransactionManager, TransactionScope};
use crate::domain::{
    classify, is_legal_context, ContextEditorKind, DomainError, MethodRole, Propagation,
    TransactionContext, TransactionPhase,
};
use crate::error::{AppError, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-method compensable declaration: propagation level, confirm/cancel
/// method names, context-injection capability, async flags
#[derive(Debug, Clone)]
pub struct CompensableDefinition {
    pub propagation: Propagation,
    pub confirm_method: String,
    pub cancel_method: String,
    pub context_editor: ContextEditorKind,
    pub async_confirm: bool,
    pub async_cancel: bool,
}

impl CompensableDefinition {
    pub fn new(confirm_method: impl Into<String>, cancel_method: impl Into<String>) -> Self {
        Self {
            propagation: Propagation::Required,
            confirm_method: confirm_method.into(),
            cancel_method: cancel_method.into(),
            context_editor: ContextEditorKind::ArgumentScan,
            async_confirm: false,
            async_cancel: false,
        }
    }

    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn with_context_editor(mut self, context_editor: ContextEditorKind) -> Self {
        self.context_editor = context_editor;
        self
    }

    pub fn with_async_confirm(mut self, async_confirm: bool) -> Self {
        self.async_confirm = async_confirm;
        self
    }

    pub fn with_async_cancel(mut self, async_cancel: bool) -> Self {
        self.async_cancel = async_cancel;
        self
    }
}

/// Decides whether a trying-phase failure defers its confirm/cancel decision
/// to recovery instead of cancelling immediately
pub type DelayCancelPredicate = Arc<dyn Fn(&AppError) -> bool + Send + Sync>;

/// Runs an intercepted compensable call through the TCC lifecycle.
///
/// The business closure captures its own clone of the `TransactionScope` to
/// enlist participants against the transaction this executor registers.
///
/// Callers observe their original return value or original business error;
/// an infrastructure error is substituted only when the infrastructure
/// action itself (persist, drive, dispatch) fails.
pub struct CompensableExecutor {
    manager: TransactionManager,
    delay_cancel: DelayCancelPredicate,
}

impl CompensableExecutor {
    pub fn new(manager: TransactionManager) -> Self {
        Self {
            manager,
            delay_cancel: Arc::new(|_| false),
        }
    }

    /// Configure which errors are ambiguous enough to delay cancellation
    /// (e.g. transport timeouts where the remote try may have landed)
    pub fn with_delay_cancel(mut self, predicate: DelayCancelPredicate) -> Self {
        self.delay_cancel = predicate;
        self
    }

    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    /// Execute a compensable method. Returns `Some(value)` for root, normal
    /// and trying-phase provider calls; `None` for confirm/cancel
    /// redeliveries, which carry no business return value.
    pub async fn execute<T, F, Fut>(
        &self,
        scope: &TransactionScope,
        definition: &CompensableDefinition,
        incoming: Option<&TransactionContext>,
        try_logic: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let transaction_active = scope.is_active();
        if !is_legal_context(definition.propagation, transaction_active, incoming.is_some()) {
            return Err(DomainError::MandatoryPropagation.into());
        }

        match classify(definition.propagation, transaction_active, incoming.is_some()) {
            MethodRole::Root => self
                .root_proceed(scope, definition, try_logic)
                .await
                .map(Some),
            MethodRole::Provider => {
                let Some(context) = incoming else {
                    return Err(AppError::Internal(
                        "provider classification without transaction context".into(),
                    ));
                };
                self.provider_proceed(scope, definition, context, try_logic)
                    .await
            }
            MethodRole::Normal => try_logic().await.map(Some),
        }
    }

    async fn root_proceed<T, F, Fut>(
        &self,
        scope: &TransactionScope,
        definition: &CompensableDefinition,
        try_logic: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let id = self.manager.begin(scope).await?;

        let outcome = match try_logic().await {
            Ok(value) => self
                .manager
                .commit(scope, definition.async_confirm)
                .await
                .map(|_| value),
            Err(trying_error) => {
                let handled = if (self.delay_cancel)(&trying_error) {
                    debug!(
                        transaction_id = %id,
                        error = %trying_error,
                        "ambiguous trying failure, deferring cancel decision to recovery"
                    );
                    self.manager.sync_transaction(scope).await
                } else {
                    warn!(
                        transaction_id = %id,
                        error = %trying_error,
                        "trying phase failed, cancelling"
                    );
                    self.manager.rollback(scope, definition.async_cancel).await
                };
                match handled {
                    Ok(()) => Err(trying_error),
                    Err(infrastructure_error) => Err(infrastructure_error),
                }
            }
        };

        self.manager.clean_after_completion(scope, Some(id))?;
        outcome
    }

    async fn provider_proceed<T, F, Fut>(
        &self,
        scope: &TransactionScope,
        definition: &CompensableDefinition,
        context: &TransactionContext,
        try_logic: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match context.phase() {
            TransactionPhase::Trying => {
                let id = self.manager.propagate_new_begin(scope, context).await?;
                let tried = try_logic().await;
                self.manager.clean_after_completion(scope, Some(id))?;
                tried.map(Some)
            }
            TransactionPhase::Confirming => {
                let (registered, outcome) =
                    match self.manager.propagate_existing_begin(scope, context).await {
                        Ok(id) => (
                            Some(id),
                            self.manager.commit(scope, definition.async_confirm).await,
                        ),
                        Err(AppError::NoSuchTransaction(id)) => {
                            debug!(
                                transaction_id = %id,
                                "branch already confirmed, ignoring redelivery"
                            );
                            (None, Ok(()))
                        }
                        Err(error) => (None, Err(error)),
                    };
                self.manager.clean_after_completion(scope, registered)?;
                outcome.map(|_| None)
            }
            TransactionPhase::Cancelling => {
                let (registered, outcome) =
                    match self.manager.propagate_existing_begin(scope, context).await {
                        Ok(id) => (
                            Some(id),
                            self.manager.rollback(scope, definition.async_cancel).await,
                        ),
                        Err(AppError::NoSuchTransaction(id)) => {
                            debug!(
                                transaction_id = %id,
                                "branch already cancelled, ignoring redelivery"
                            );
                            (None, Ok(()))
                        }
                        Err(error) => (None, Err(error)),
                    };
                self.manager.clean_after_completion(scope, registered)?;
                outcome.map(|_| None)
            }
        }
    }
}
