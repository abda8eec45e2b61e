//! Stock ledger tests
//!
//! Movement posting, the non-negative stock rule, replay consistency and
//! conflict retries, driven through the in-memory store.

mod common;

use common::Harness;
use rust_decimal_macros::dec;
use stock_ledger_backend::error::AppError;
use stock_ledger_backend::models::{MovementReason, MovementType};
use stock_ledger_backend::services::ledger::{apply_movement, MovementRequest};

// ============================================================================
// Posting
// ============================================================================

#[tokio::test]
async fn test_stock_in_and_out_update_product_and_append_movements() {
    let h = Harness::new();
    let product = h.add_product("GREASE", 10, dec!(30), dec!(35)).await;
    let actor = h.actor;
    let id = product.id;

    let posting = h
        .transactor
        .run("stock_in", move |uow| {
            Box::pin(async move {
                apply_movement(
                    uow,
                    MovementRequest::stock_in(id, 5, MovementReason::Purchase, None, actor),
                )
                .await
            })
        })
        .await
        .unwrap();

    assert_eq!(posting.product.current_stock, 15);
    assert_eq!(posting.movement.movement_type, MovementType::In);
    assert_eq!(posting.movement.quantity, 5);
    assert_eq!(posting.movement.quantity_before, 10);
    assert_eq!(posting.movement.quantity_after, 15);

    let posting = h
        .transactor
        .run("stock_out", move |uow| {
            Box::pin(async move {
                apply_movement(
                    uow,
                    MovementRequest::stock_out(id, 15, MovementReason::Adjustment, None, actor),
                )
                .await
            })
        })
        .await
        .unwrap();

    assert_eq!(posting.product.current_stock, 0);
    assert_eq!(posting.movement.movement_type, MovementType::Out);
    assert_eq!(posting.movement.quantity, -15);

    let state = h.store.state().await;
    assert_eq!(state.movements_for(id).len(), 2);
    h.assert_ledger_consistent(id).await;
}

#[tokio::test]
async fn test_movement_below_zero_is_refused_and_leaves_nothing() {
    let h = Harness::new();
    let product = h.add_product("TORCH BIG", 3, dec!(150), dec!(180)).await;
    let actor = h.actor;
    let id = product.id;

    let err = h
        .transactor
        .run("stock_out", move |uow| {
            Box::pin(async move {
                apply_movement(
                    uow,
                    MovementRequest::stock_out(id, 4, MovementReason::Sale, None, actor),
                )
                .await
            })
        })
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock {
            product_id,
            available,
            requested,
        } => {
            assert_eq!(product_id, id);
            assert_eq!(available, 3);
            assert_eq!(requested, 4);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }

    assert_eq!(h.stock_of(id).await, 3);
    assert!(h.store.state().await.movements.is_empty());
}

#[tokio::test]
async fn test_zero_quantity_movement_is_a_validation_error() {
    let h = Harness::new();
    let product = h.add_product("EPOXY", 10, dec!(15), dec!(20)).await;
    let actor = h.actor;
    let id = product.id;

    let err = h
        .transactor
        .run("noop", move |uow| {
            Box::pin(async move {
                apply_movement(
                    uow,
                    MovementRequest::stock_in(id, 0, MovementReason::Adjustment, None, actor),
                )
                .await
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_movement_for_unknown_product_is_not_found() {
    let h = Harness::new();
    let actor = h.actor;
    let id = uuid::Uuid::new_v4();

    let err = h
        .transactor
        .run("missing", move |uow| {
            Box::pin(async move {
                apply_movement(
                    uow,
                    MovementRequest::stock_in(id, 1, MovementReason::Purchase, None, actor),
                )
                .await
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_failed_second_movement_rolls_back_the_first() {
    let h = Harness::new();
    let a = h.add_product("HAMMERS", 10, dec!(250), dec!(300)).await;
    let b = h.add_product("SPANNERS", 1, dec!(10), dec!(15)).await;
    let actor = h.actor;
    let (a_id, b_id) = (a.id, b.id);

    let err = h
        .transactor
        .run("two_movements", move |uow| {
            Box::pin(async move {
                apply_movement(
                    uow,
                    MovementRequest::stock_out(a_id, 2, MovementReason::Sale, None, actor),
                )
                .await?;
                apply_movement(
                    uow,
                    MovementRequest::stock_out(b_id, 2, MovementReason::Sale, None, actor),
                )
                .await
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(h.stock_of(a_id).await, 10);
    assert_eq!(h.stock_of(b_id).await, 1);
    assert!(h.store.state().await.movements.is_empty());
}

// ============================================================================
// Conflicts
// ============================================================================

#[tokio::test]
async fn test_conflict_is_retried_until_it_succeeds() {
    let h = Harness::with_retries(3);
    let product = h.add_product("WOOLEN", 20, dec!(60), dec!(70)).await;
    let actor = h.actor;
    let id = product.id;

    h.store.inject_conflicts(2);
    let posting = h
        .transactor
        .run("stock_out", move |uow| {
            Box::pin(async move {
                apply_movement(
                    uow,
                    MovementRequest::stock_out(id, 5, MovementReason::Sale, None, actor),
                )
                .await
            })
        })
        .await
        .unwrap();

    assert_eq!(posting.product.current_stock, 15);
    assert_eq!(h.store.state().await.movements_for(id).len(), 1);
    h.assert_ledger_consistent(id).await;
}

#[tokio::test]
async fn test_conflict_surfaces_once_retries_are_exhausted() {
    let h = Harness::with_retries(2);
    let product = h.add_product("WOOLEN", 20, dec!(60), dec!(70)).await;
    let actor = h.actor;
    let id = product.id;

    let attempts = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = attempts.clone();

    h.store.inject_conflicts(10);
    let err = h
        .transactor
        .run("stock_out", move |uow| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Box::pin(async move {
                apply_movement(
                    uow,
                    MovementRequest::stock_out(id, 5, MovementReason::Sale, None, actor),
                )
                .await
            })
        })
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    // First attempt plus two retries
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(h.stock_of(id).await, 20);
    assert!(h.store.state().await.movements.is_empty());
}

#[tokio::test]
async fn test_non_conflict_errors_are_not_retried() {
    let h = Harness::with_retries(5);
    let product = h.add_product("CRUSHER", 1, dec!(3500), dec!(4000)).await;
    let actor = h.actor;
    let id = product.id;

    let attempts = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter = attempts.clone();

    let err = h
        .transactor
        .run("stock_out", move |uow| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Box::pin(async move {
                apply_movement(
                    uow,
                    MovementRequest::stock_out(id, 2, MovementReason::Sale, None, actor),
                )
                .await
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
}
