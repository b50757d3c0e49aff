// Handler Registry - startup-built map from invocation target to handler
//
// Replaces runtime reflection: "target type -> live instance" and
// "method name -> callable" are resolved through this registry, so a
// persisted InvocationDescriptor can be replayed after a restart.

use crate::domain::InvocationDescriptor;
use crate::error::{AppError, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

pub type HandlerFuture = BoxFuture<'static, Result<serde_json::Value>>;

/// A confirm/cancel endpoint. Arguments arrive as the descriptor's argument
/// list with the transaction context already injected.
pub trait CompensableHandler: Send + Sync {
    fn call(&self, args: Vec<serde_json::Value>) -> HandlerFuture;
}

impl<F> CompensableHandler for F
where
    F: Fn(Vec<serde_json::Value>) -> HandlerFuture + Send + Sync,
{
    fn call(&self, args: Vec<serde_json::Value>) -> HandlerFuture {
        self(args)
    }
}

struct HandlerEntry {
    parameter_types: Vec<String>,
    handler: Arc<dyn CompensableHandler>,
}

/// Registry assembled once at startup, before any transaction runs
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), HandlerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `target::method` with its declared signature
    pub fn register(
        &mut self,
        target: impl Into<String>,
        method: impl Into<String>,
        parameter_types: Vec<String>,
        handler: Arc<dyn CompensableHandler>,
    ) -> &mut Self {
        self.handlers.insert(
            (target.into(), method.into()),
            HandlerEntry {
                parameter_types,
                handler,
            },
        );
        self
    }

    /// Convenience registration from an async closure
    pub fn register_fn<F, Fut>(
        &mut self,
        target: impl Into<String>,
        method: impl Into<String>,
        parameter_types: Vec<String>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Vec<serde_json::Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let boxed = move |args: Vec<serde_json::Value>| -> HandlerFuture {
            Box::pin(handler(args))
        };
        self.register(target, method, parameter_types, Arc::new(boxed))
    }

    /// Resolve a descriptor to its handler, checking the parameter-type
    /// signature against the registered one
    pub fn resolve(&self, invocation: &InvocationDescriptor) -> Result<Arc<dyn CompensableHandler>> {
        let key = (
            invocation.target_type.clone(),
            invocation.method_name.clone(),
        );
        let entry = self
            .handlers
            .get(&key)
            .ok_or_else(|| AppError::HandlerNotFound {
                target: invocation.target_type.clone(),
                method: invocation.method_name.clone(),
            })?;

        if entry.parameter_types != invocation.parameter_types {
            return Err(AppError::HandlerSignatureMismatch {
                target: invocation.target_type.clone(),
                method: invocation.method_name.clone(),
            });
        }

        Ok(Arc::clone(&entry.handler))
    }
}
