//! End-to-end TCC lifecycle through the compensable executor
//! (memory repository, single process)

use compensa_core::application::{
    CompensableDefinition, CompensableExecutor, HandlerRegistry, Terminator, TransactionManager,
    TransactionScope,
};
use compensa_core::domain::{
    ContextEditorKind, InvocationDescriptor, Participant, Propagation, TransactionId,
    TransactionPhase,
};
use compensa_core::error::AppError;
use compensa_core::port::dispatcher::mocks::ManualDispatcher;
use compensa_core::port::id_provider::SequentialIdProvider;
use compensa_core::port::time_provider::FixedTimeProvider;
use compensa_core::port::transaction_repository::memory::MemoryTransactionRepository;
use compensa_core::port::TransactionRepository;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Harness {
    executor: CompensableExecutor,
    manager: TransactionManager,
    repository: Arc<MemoryTransactionRepository>,
    dispatcher: Arc<ManualDispatcher>,
    confirmed: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let clock = Arc::new(FixedTimeProvider::new(1_000_000));
    let repository = Arc::new(MemoryTransactionRepository::new(clock.clone()));
    let dispatcher = Arc::new(ManualDispatcher::new());

    let confirmed = Arc::new(AtomicUsize::new(0));
    let cancelled = Arc::new(AtomicUsize::new(0));

    let mut registry = HandlerRegistry::new();
    let confirms = confirmed.clone();
    registry.register_fn("account", "confirm_debit", vec![], move |_| {
        let confirms = confirms.clone();
        async move {
            confirms.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::Value::Null)
        }
    });
    let cancels = cancelled.clone();
    registry.register_fn("account", "cancel_debit", vec![], move |_| {
        let cancels = cancels.clone();
        async move {
            cancels.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::Value::Null)
        }
    });

    let manager = TransactionManager::new(
        repository.clone(),
        dispatcher.clone(),
        Arc::new(Terminator::new(Arc::new(registry))),
        Arc::new(SequentialIdProvider::new()),
        clock,
    );

    Harness {
        executor: CompensableExecutor::new(manager.clone()),
        manager,
        repository,
        dispatcher,
        confirmed,
        cancelled,
    }
}

fn debit_participant() -> Participant {
    Participant::new(
        InvocationDescriptor::new("account", "confirm_debit", vec![], vec![]),
        InvocationDescriptor::new("account", "cancel_debit", vec![], vec![]),
        ContextEditorKind::OutOfBand,
    )
}

fn definition() -> CompensableDefinition {
    CompensableDefinition::new("confirm_debit", "cancel_debit")
}

#[tokio::test]
async fn successful_root_confirms_once_and_removes_row() {
    let h = harness();
    let scope = TransactionScope::new();
    let manager = h.manager.clone();
    let business_scope = scope.clone();

    let value = h
        .executor
        .execute(&scope, &definition(), None, || async move {
            manager
                .enlist_participant(&business_scope, debit_participant())
                .await?;
            Ok("transfer booked")
        })
        .await
        .unwrap();

    assert_eq!(value, Some("transfer booked"));
    assert_eq!(h.confirmed.load(Ordering::SeqCst), 1);
    assert_eq!(h.cancelled.load(Ordering::SeqCst), 0);

    // completion is the row's absence
    let id = TransactionId::from_uuid(uuid::Uuid::from_u128(1));
    assert!(h.repository.find_by_id(id).await.unwrap().is_none());
    assert!(!scope.is_active());
}

#[tokio::test]
async fn failing_root_cancels_and_caller_sees_original_error() {
    let h = harness();
    let scope = TransactionScope::new();
    let manager = h.manager.clone();
    let business_scope = scope.clone();

    let result: Result<Option<()>, AppError> = h
        .executor
        .execute(&scope, &definition(), None, || async move {
            manager
                .enlist_participant(&business_scope, debit_participant())
                .await?;
            Err(AppError::Participant("insufficient funds".into()))
        })
        .await;

    // the original business error, not a wrapped one
    let err = result.unwrap_err();
    assert!(matches!(err, AppError::Participant(message) if message == "insufficient funds"));

    assert_eq!(h.cancelled.load(Ordering::SeqCst), 1);
    assert_eq!(h.confirmed.load(Ordering::SeqCst), 0);
    assert!(h.repository.is_empty());
}

#[tokio::test]
async fn delay_cancel_error_keeps_row_in_trying() {
    let h = harness();
    let executor = CompensableExecutor::new(h.manager.clone()).with_delay_cancel(Arc::new(
        |error| matches!(error, AppError::DispatchFailed(_)),
    ));
    let scope = TransactionScope::new();
    let manager = h.manager.clone();
    let business_scope = scope.clone();

    let result: Result<Option<()>, AppError> = executor
        .execute(&scope, &definition(), None, || async move {
            manager
                .enlist_participant(&business_scope, debit_participant())
                .await?;
            // ambiguous: the remote try may or may not have landed
            Err(AppError::DispatchFailed("downstream timed out".into()))
        })
        .await;

    assert!(matches!(result.unwrap_err(), AppError::DispatchFailed(_)));
    assert_eq!(h.cancelled.load(Ordering::SeqCst), 0);
    assert_eq!(h.confirmed.load(Ordering::SeqCst), 0);

    let id = TransactionId::from_uuid(uuid::Uuid::from_u128(1));
    let stored = h.repository.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.phase(), TransactionPhase::Trying);
    assert_eq!(stored.participants.len(), 1);
}

#[tokio::test]
async fn requires_new_nests_to_depth_two_and_restores_outer() {
    let h = harness();
    let scope = TransactionScope::new();
    let outer = h.manager.begin(&scope).await.unwrap();

    let inner_definition = definition().with_propagation(Propagation::RequiresNew);
    let probe_scope = scope.clone();
    let value = h
        .executor
        .execute(&scope, &inner_definition, None, || async move {
            assert_eq!(probe_scope.depth(), 2);
            Ok(17)
        })
        .await
        .unwrap();

    assert_eq!(value, Some(17));
    // inner committed and popped; outer untouched
    assert_eq!(scope.depth(), 1);
    let resumed = scope.current().unwrap();
    assert_eq!(resumed.id, outer);
    assert_eq!(resumed.phase(), TransactionPhase::Trying);
    assert!(h.repository.find_by_id(outer).await.unwrap().is_some());
}

#[tokio::test]
async fn async_confirm_defers_drive_to_dispatcher() {
    let h = harness();
    let scope = TransactionScope::new();
    let manager = h.manager.clone();
    let business_scope = scope.clone();

    let definition = definition().with_async_confirm(true);
    let value = h
        .executor
        .execute(&scope, &definition, None, || async move {
            manager
                .enlist_participant(&business_scope, debit_participant())
                .await?;
            Ok(1)
        })
        .await
        .unwrap();
    assert_eq!(value, Some(1));

    // foreground returned after the phase persist; drive still queued
    let id = TransactionId::from_uuid(uuid::Uuid::from_u128(1));
    let stored = h.repository.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.phase(), TransactionPhase::Confirming);
    assert_eq!(h.confirmed.load(Ordering::SeqCst), 0);

    for task in h.dispatcher.drain() {
        task.await;
    }
    assert_eq!(h.confirmed.load(Ordering::SeqCst), 1);
    assert!(h.repository.find_by_id(id).await.unwrap().is_none());
}
