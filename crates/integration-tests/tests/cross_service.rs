//! Two services coordinating a TCC transaction: an order service (root) and
//! an inventory service (provider branch), each with its own transaction
//! store. The root's participant handlers play the transport stub: they carry
//! the injected context across the "wire" and redeliver it to the
//! provider-side executor. Root and branch share one transaction id, which is
//! the correlation key confirm/cancel use to find the branch.

use compensa_core::application::{
    CompensableDefinition, CompensableExecutor, HandlerRegistry, Terminator, TransactionManager,
    TransactionScope,
};
use compensa_core::domain::{
    ContextEditorKind, InvocationDescriptor, Participant, TransactionContext, TransactionId,
    TransactionPhase, TRANSACTION_CONTEXT_TYPE,
};
use compensa_core::error::AppError;
use compensa_core::port::dispatcher::mocks::ManualDispatcher;
use compensa_core::port::id_provider::SequentialIdProvider;
use compensa_core::port::time_provider::FixedTimeProvider;
use compensa_core::port::transaction_repository::memory::MemoryTransactionRepository;
use compensa_core::port::{TimeProvider, TransactionRepository};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct World {
    order_executor: CompensableExecutor,
    order_manager: TransactionManager,
    order_repository: Arc<MemoryTransactionRepository>,
    inventory_executor: Arc<CompensableExecutor>,
    inventory_manager: TransactionManager,
    inventory_repository: Arc<MemoryTransactionRepository>,
    tried: Arc<AtomicUsize>,
    confirmed: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

fn provider_definition() -> CompensableDefinition {
    CompensableDefinition::new("confirm_reserve", "cancel_reserve")
}

fn root_definition() -> CompensableDefinition {
    CompensableDefinition::new("confirm", "cancel")
}

fn world() -> World {
    let clock: Arc<dyn TimeProvider> = Arc::new(FixedTimeProvider::new(5_000_000));
    // each service owns its transaction store
    let order_repository = Arc::new(MemoryTransactionRepository::new(clock.clone()));
    let inventory_repository = Arc::new(MemoryTransactionRepository::new(clock.clone()));

    let tried = Arc::new(AtomicUsize::new(0));
    let confirmed = Arc::new(AtomicUsize::new(0));
    let cancelled = Arc::new(AtomicUsize::new(0));

    // inventory service: the real compensable endpoints
    let mut inventory_registry = HandlerRegistry::new();
    let confirms = confirmed.clone();
    inventory_registry.register_fn("inventory", "confirm_reserve", vec![], move |_| {
        let confirms = confirms.clone();
        async move {
            confirms.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::Value::Null)
        }
    });
    let cancels = cancelled.clone();
    inventory_registry.register_fn("inventory", "cancel_reserve", vec![], move |_| {
        let cancels = cancels.clone();
        async move {
            cancels.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::Value::Null)
        }
    });

    let inventory_manager = TransactionManager::new(
        inventory_repository.clone(),
        Arc::new(ManualDispatcher::new()),
        Arc::new(Terminator::new(Arc::new(inventory_registry))),
        Arc::new(SequentialIdProvider::new()),
        clock.clone(),
    );
    let inventory_executor = Arc::new(CompensableExecutor::new(inventory_manager.clone()));

    // order service: its participant handlers are transport stubs that
    // redeliver the context to the inventory executor
    let mut order_registry = HandlerRegistry::new();
    let stub = inventory_executor.clone();
    order_registry.register_fn(
        "inventory-client",
        "confirm",
        vec![TRANSACTION_CONTEXT_TYPE.to_string()],
        move |args| {
            let stub = stub.clone();
            async move {
                let context: TransactionContext = serde_json::from_value(args[0].clone())?;
                let scope = TransactionScope::new();
                stub.execute::<(), _, _>(&scope, &provider_definition(), Some(&context), || async {
                    Err(AppError::Internal("try must not run on confirm delivery".into()))
                })
                .await?;
                Ok(serde_json::Value::Null)
            }
        },
    );
    let stub = inventory_executor.clone();
    order_registry.register_fn(
        "inventory-client",
        "cancel",
        vec![TRANSACTION_CONTEXT_TYPE.to_string()],
        move |args| {
            let stub = stub.clone();
            async move {
                let context: TransactionContext = serde_json::from_value(args[0].clone())?;
                let scope = TransactionScope::new();
                stub.execute::<(), _, _>(&scope, &provider_definition(), Some(&context), || async {
                    Err(AppError::Internal("try must not run on cancel delivery".into()))
                })
                .await?;
                Ok(serde_json::Value::Null)
            }
        },
    );

    let order_manager = TransactionManager::new(
        order_repository.clone(),
        Arc::new(ManualDispatcher::new()),
        Arc::new(Terminator::new(Arc::new(order_registry))),
        Arc::new(SequentialIdProvider::new()),
        clock,
    );

    World {
        order_executor: CompensableExecutor::new(order_manager.clone()),
        order_manager,
        order_repository,
        inventory_executor,
        inventory_manager,
        inventory_repository,
        tried,
        confirmed,
        cancelled,
    }
}

fn inventory_client_participant() -> Participant {
    Participant::new(
        InvocationDescriptor::new(
            "inventory-client",
            "confirm",
            vec![TRANSACTION_CONTEXT_TYPE.to_string()],
            vec![serde_json::Value::Null],
        ),
        InvocationDescriptor::new(
            "inventory-client",
            "cancel",
            vec![TRANSACTION_CONTEXT_TYPE.to_string()],
            vec![serde_json::Value::Null],
        ),
        ContextEditorKind::ArgumentScan,
    )
}

fn inventory_participant() -> Participant {
    Participant::new(
        InvocationDescriptor::new("inventory", "confirm_reserve", vec![], vec![]),
        InvocationDescriptor::new("inventory", "cancel_reserve", vec![], vec![]),
        ContextEditorKind::OutOfBand,
    )
}

/// Simulate the remote try call: the caller-side interceptor sends the
/// current context, the provider-side executor starts a branch and runs the
/// inventory try logic, which enlists the local endpoints.
async fn deliver_try(w: &World, context: TransactionContext) -> Result<(), AppError> {
    let scope = TransactionScope::new();
    let manager = w.inventory_manager.clone();
    let enlist_scope = scope.clone();
    let tried = w.tried.clone();
    w.inventory_executor
        .execute(&scope, &provider_definition(), Some(&context), || async move {
            tried.fetch_add(1, Ordering::SeqCst);
            manager
                .enlist_participant(&enlist_scope, inventory_participant())
                .await?;
            Ok(())
        })
        .await
        .map(|_| ())
}

#[tokio::test]
async fn commit_confirms_root_and_branch_exactly_once() {
    let w = world();
    let scope = TransactionScope::new();
    let order_manager = w.order_manager.clone();
    let business_scope = scope.clone();

    let root_id = {
        let w_ref = &w;
        let value = w
            .order_executor
            .execute(&scope, &root_definition(), None, || async move {
                let root = order_manager
                    .current_transaction(&business_scope)
                    .expect("root transaction active");
                order_manager
                    .enlist_participant(&business_scope, inventory_client_participant())
                    .await?;
                // remote try carries the trying-phase context
                deliver_try(
                    w_ref,
                    TransactionContext::new(root.id, TransactionPhase::Trying),
                )
                .await?;
                Ok(root.id)
            })
            .await
            .unwrap();
        value.expect("root call returns a value")
    };

    assert_eq!(w.tried.load(Ordering::SeqCst), 1);
    assert_eq!(w.confirmed.load(Ordering::SeqCst), 1);
    assert_eq!(w.cancelled.load(Ordering::SeqCst), 0);

    // root row and branch row (same id, separate stores) are both gone
    assert!(w
        .order_repository
        .find_by_id(root_id)
        .await
        .unwrap()
        .is_none());
    assert!(w
        .inventory_repository
        .find_by_id(root_id)
        .await
        .unwrap()
        .is_none());
    assert!(w.order_repository.is_empty());
    assert!(w.inventory_repository.is_empty());
}

#[tokio::test]
async fn business_failure_cancels_the_branch() {
    let w = world();
    let scope = TransactionScope::new();
    let order_manager = w.order_manager.clone();
    let business_scope = scope.clone();

    let w_ref = &w;
    let result: Result<Option<()>, AppError> = w
        .order_executor
        .execute(&scope, &root_definition(), None, || async move {
            let root = order_manager
                .current_transaction(&business_scope)
                .expect("root transaction active");
            order_manager
                .enlist_participant(&business_scope, inventory_client_participant())
                .await?;
            deliver_try(
                w_ref,
                TransactionContext::new(root.id, TransactionPhase::Trying),
            )
            .await?;
            // try landed on the provider, then the root's own logic fails
            Err(AppError::Participant("payment declined".into()))
        })
        .await;

    assert!(matches!(result.unwrap_err(), AppError::Participant(_)));
    assert_eq!(w.tried.load(Ordering::SeqCst), 1);
    assert_eq!(w.cancelled.load(Ordering::SeqCst), 1);
    assert_eq!(w.confirmed.load(Ordering::SeqCst), 0);
    assert!(w.order_repository.is_empty());
    assert!(w.inventory_repository.is_empty());
}

#[tokio::test]
async fn confirm_redelivery_is_idempotent() {
    let w = world();

    // branch created and confirmed once
    let root_id = TransactionId::from_uuid(uuid::Uuid::from_u128(9_000));
    deliver_try(&w, TransactionContext::new(root_id, TransactionPhase::Trying))
        .await
        .unwrap();

    let confirming = TransactionContext::new(root_id, TransactionPhase::Confirming);
    for _ in 0..3 {
        let scope = TransactionScope::new();
        let value: Option<()> = w
            .inventory_executor
            .execute(&scope, &provider_definition(), Some(&confirming), || async {
                Err(AppError::Internal("try must not run on confirm delivery".into()))
            })
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    // first delivery confirmed; the later two found no row and were swallowed
    assert_eq!(w.confirmed.load(Ordering::SeqCst), 1);
    assert!(w
        .inventory_repository
        .find_by_id(root_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unrecognized_phase_code_cancels_defensively() {
    let w = world();

    let root_id = TransactionId::from_uuid(uuid::Uuid::from_u128(9_100));
    deliver_try(&w, TransactionContext::new(root_id, TransactionPhase::Trying))
        .await
        .unwrap();

    // a context with a garbage phase code decodes as CANCELLING
    let garbled: TransactionContext =
        serde_json::from_value(serde_json::json!({ "id": root_id, "phase": 42 })).unwrap();
    assert_eq!(garbled.phase(), TransactionPhase::Cancelling);

    let scope = TransactionScope::new();
    w.inventory_executor
        .execute::<(), _, _>(&scope, &provider_definition(), Some(&garbled), || async {
            Err(AppError::Internal("try must not run on cancel delivery".into()))
        })
        .await
        .unwrap();

    assert_eq!(w.cancelled.load(Ordering::SeqCst), 1);
    assert!(w
        .inventory_repository
        .find_by_id(root_id)
        .await
        .unwrap()
        .is_none());
}
