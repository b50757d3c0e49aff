// Terminator - performs a deferred confirm/cancel invocation

use crate::application::registry::HandlerRegistry;
use crate::domain::{ContextEditorKind, InvocationDescriptor, TransactionContext};
use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

/// Resolves an invocation descriptor against the handler registry, injects
/// the transaction context into the declared argument slot, and invokes.
///
/// Errors raised by the invoked confirm/cancel logic propagate unmodified so
/// the caller can apply delay/retry policy based on the real cause.
pub struct Terminator {
    registry: Arc<HandlerRegistry>,
}

impl Terminator {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub async fn invoke(
        &self,
        context: &TransactionContext,
        invocation: &InvocationDescriptor,
        editor: ContextEditorKind,
    ) -> Result<serde_json::Value> {
        let handler = self.registry.resolve(invocation)?;

        let mut args = invocation.args.clone();
        editor.inject(context, &invocation.parameter_types, &mut args)?;

        debug!(
            transaction_id = %context.id(),
            phase = %context.phase(),
            target = %invocation.target_type,
            method = %invocation.method_name,
            "invoking participant endpoint"
        );

        handler.call(args).await
    }
}
