//! Sale transaction tests
//!
//! Stock decrement, credit-customer debt, payments against sales, bulk
//! orders and concurrent sales competing for the same stock.

mod common;

use common::Harness;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stock_ledger_backend::error::AppError;
use stock_ledger_backend::models::{ActivityAction, MovementReason, PaymentStatus};
use stock_ledger_backend::services::sales::{
    BulkSaleInput, CreateSaleInput, SaleLineInput, UpdatePaymentInput,
};
use uuid::Uuid;

fn sale(product_id: Uuid, quantity: i32, unit_price: Decimal, amount_paid: Decimal) -> CreateSaleInput {
    CreateSaleInput {
        product_id,
        quantity,
        unit_price,
        customer_id: None,
        customer_name: None,
        payment_method: Some("CASH".to_string()),
        payment_status: None,
        amount_paid,
        notes: None,
    }
}

// ============================================================================
// Single sales
// ============================================================================

#[tokio::test]
async fn test_paid_sale_takes_stock_out_through_the_ledger() {
    let h = Harness::new();
    let product = h.add_product("KEY CUP", 66, dec!(80), dec!(100)).await;

    let details = h
        .sales()
        .create_sale(h.actor, sale(product.id, 6, dec!(100), dec!(600)))
        .await
        .unwrap();

    assert_eq!(details.sale.total_amount, dec!(600));
    assert_eq!(details.sale.amount_due, Decimal::ZERO);
    assert_eq!(details.sale.payment_status, PaymentStatus::Paid);
    assert!(details.sale.sale_number.starts_with("SALE-"));
    assert_eq!(details.product.current_stock, 60);

    let state = h.store.state().await;
    let movements = state.movements_for(product.id);
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].quantity, -6);
    assert_eq!(movements[0].reason, MovementReason::Sale);
    assert_eq!(movements[0].reference, Some(details.sale.id));
    h.assert_ledger_consistent(product.id).await;

    let entries = h.activity.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, ActivityAction::Create);
    assert_eq!(entries[0].resource_id, Some(details.sale.id));
}

#[tokio::test]
async fn test_credit_sale_charges_the_customer() {
    let h = Harness::new();
    let product = h.add_product("TYRE", 52, dec!(80), dec!(100)).await;
    let lender = h.add_lender("Kwame Mensah", dec!(0)).await;

    let mut input = sale(product.id, 5, dec!(100), dec!(200));
    input.customer_id = Some(lender.id);
    let details = h.sales().create_sale(h.actor, input).await.unwrap();

    assert_eq!(details.sale.amount_due, dec!(300));
    assert_eq!(details.sale.payment_status, PaymentStatus::Partial);
    assert_eq!(details.sale.customer_name.as_deref(), Some("Kwame Mensah"));

    let lender = h.lender(lender.id).await;
    assert_eq!(lender.current_debt, dec!(300));
    assert_eq!(lender.total_purchased, dec!(500));
}

#[tokio::test]
async fn test_sale_exceeding_stock_fails_without_side_effects() {
    let h = Harness::new();
    let product = h.add_product("PUMPING MACHINE", 2, dec!(2500), dec!(2800)).await;
    let lender = h.add_lender("Ama Owusu", dec!(0)).await;

    let mut input = sale(product.id, 3, dec!(2800), dec!(0));
    input.customer_id = Some(lender.id);
    let err = h.sales().create_sale(h.actor, input).await.unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { available: 2, requested: 3, .. }));
    let state = h.store.state().await;
    assert!(state.sales.is_empty());
    assert!(state.movements.is_empty());
    assert_eq!(state.lenders[&lender.id].current_debt, Decimal::ZERO);
    assert!(h.activity.entries().is_empty());
}

#[tokio::test]
async fn test_sale_validation() {
    let h = Harness::new();
    let product = h.add_product("SILICON", 38, dec!(25), dec!(30)).await;

    let err = h
        .sales()
        .create_sale(h.actor, sale(product.id, 0, dec!(30), dec!(0)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = h
        .sales()
        .create_sale(h.actor, sale(product.id, 1, dec!(30), dec!(31)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    // Claimed status must agree with the amounts
    let mut input = sale(product.id, 1, dec!(30), dec!(10));
    input.payment_status = Some(PaymentStatus::Paid);
    let err = h.sales().create_sale(h.actor, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    assert_eq!(h.stock_of(product.id).await, 38);
}

#[tokio::test]
async fn test_sale_to_unknown_customer_is_not_found() {
    let h = Harness::new();
    let product = h.add_product("SILICON", 38, dec!(25), dec!(30)).await;

    let mut input = sale(product.id, 1, dec!(30), dec!(0));
    input.customer_id = Some(Uuid::new_v4());
    let err = h.sales().create_sale(h.actor, input).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.stock_of(product.id).await, 38);
}

#[tokio::test]
async fn test_selling_the_last_unit_then_one_more() {
    let h = Harness::new();
    let product = h.add_product("BALANCE BEARING", 10, dec!(15), dec!(20)).await;

    let details = h
        .sales()
        .create_sale(h.actor, sale(product.id, 10, dec!(20), dec!(200)))
        .await
        .unwrap();
    assert_eq!(details.product.current_stock, 0);

    {
        let state = h.store.state().await;
        let movements = state.movements_for(product.id);
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].quantity_before, 10);
        assert_eq!(movements[0].quantity_after, 0);
        assert_eq!(movements[0].quantity, -10);
    }

    let err = h
        .sales()
        .create_sale(h.actor, sale(product.id, 1, dec!(20), dec!(20)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InsufficientStock {
            available: 0,
            requested: 1,
            ..
        }
    ));
    assert_eq!(h.stock_of(product.id).await, 0);
    assert_eq!(h.store.state().await.sales.len(), 1);
    h.assert_ledger_consistent(product.id).await;
}

#[tokio::test]
async fn test_sale_total_out_of_range_is_a_validation_error() {
    let h = Harness::new();
    let product = h.add_product("SILICON", 38, dec!(25), dec!(30)).await;

    let err = h
        .sales()
        .create_sale(h.actor, sale(product.id, 2, Decimal::MAX, dec!(0)))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "unit_price"));
    assert_eq!(h.stock_of(product.id).await, 38);
    assert!(h.store.state().await.sales.is_empty());
}

#[tokio::test]
async fn test_credit_sale_overflowing_customer_debt_is_rolled_back() {
    let h = Harness::new();
    let product = h.add_product("TYRE", 52, dec!(80), dec!(100)).await;
    let lender = h.add_lender("Kwame Mensah", Decimal::MAX).await;

    let mut input = sale(product.id, 1, dec!(100), dec!(0));
    input.customer_id = Some(lender.id);
    let err = h.sales().create_sale(h.actor, input).await.unwrap_err();

    assert!(matches!(err, AppError::Validation { .. }));
    assert_eq!(h.stock_of(product.id).await, 52);
    assert_eq!(h.lender(lender.id).await.current_debt, Decimal::MAX);
    assert!(h.store.state().await.movements.is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_concurrent_sales_cannot_oversell() {
    let h = Harness::new();
    let product = h.add_product("CENTRE GEAR", 10, dec!(100), dec!(120)).await;
    let sales = h.sales();

    let (first, second) = tokio::join!(
        sales.create_sale(h.actor, sale(product.id, 6, dec!(120), dec!(720))),
        sales.create_sale(h.actor, sale(product.id, 6, dec!(120), dec!(720))),
    );

    let outcomes = [first, second];
    let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppError::InsufficientStock { .. }))));

    assert_eq!(h.stock_of(product.id).await, 4);
    h.assert_ledger_consistent(product.id).await;
}

// ============================================================================
// Payments against sales
// ============================================================================

#[tokio::test]
async fn test_payment_settles_sale_and_reduces_debt() {
    let h = Harness::new();
    let product = h.add_product("HAMMERS", 186, dec!(250), dec!(300)).await;
    let lender = h.add_lender("Yaw Boateng", dec!(0)).await;

    let mut input = sale(product.id, 2, dec!(300), dec!(100));
    input.customer_id = Some(lender.id);
    let details = h.sales().create_sale(h.actor, input).await.unwrap();
    assert_eq!(h.lender(lender.id).await.current_debt, dec!(500));

    let outcome = h
        .sales()
        .update_payment(
            h.actor,
            details.sale.id,
            UpdatePaymentInput {
                amount_paid: dec!(200),
                payment_method: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.sale.amount_paid, dec!(300));
    assert_eq!(outcome.sale.amount_due, dec!(300));
    assert_eq!(outcome.sale.payment_status, PaymentStatus::Partial);
    assert_eq!(h.lender(lender.id).await.current_debt, dec!(300));

    // Paying more than is due settles the sale and reports the excess
    let outcome = h
        .sales()
        .update_payment(
            h.actor,
            details.sale.id,
            UpdatePaymentInput {
                amount_paid: dec!(350),
                payment_method: Some("MOBILE_MONEY".to_string()),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.applied, dec!(300));
    assert_eq!(outcome.overpayment, dec!(50));
    assert_eq!(outcome.sale.amount_due, Decimal::ZERO);
    assert_eq!(outcome.sale.payment_status, PaymentStatus::Paid);

    let lender = h.lender(lender.id).await;
    assert_eq!(lender.current_debt, Decimal::ZERO);

    let state = h.store.state().await;
    assert_eq!(state.payments.len(), 2);
    assert!(state.payments.iter().all(|p| p.lender_id == lender.id));
    assert_eq!(
        state.payments.iter().map(|p| p.amount).sum::<Decimal>(),
        dec!(500)
    );

    // Stock untouched by payments
    assert_eq!(h.stock_of(product.id).await, 184);
}

#[tokio::test]
async fn test_payment_on_settled_sale_is_refused() {
    let h = Harness::new();
    let product = h.add_product("LINING TYRE", 258, dec!(4), dec!(5)).await;

    let details = h
        .sales()
        .create_sale(h.actor, sale(product.id, 10, dec!(5), dec!(50)))
        .await
        .unwrap();

    let err = h
        .sales()
        .update_payment(
            h.actor,
            details.sale.id,
            UpdatePaymentInput {
                amount_paid: dec!(1),
                payment_method: None,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

// ============================================================================
// Bulk sales
// ============================================================================

#[tokio::test]
async fn test_bulk_sale_records_every_line_under_one_order() {
    let h = Harness::new();
    let a = h.add_product("SHOVEL GREEN", 48, dec!(80), dec!(100)).await;
    let b = h.add_product("BLANKET RED", 95, dec!(40), dec!(50)).await;
    let lender = h.add_lender("Efua Asante", dec!(0)).await;

    let result = h
        .sales()
        .create_bulk_sale(
            h.actor,
            BulkSaleInput {
                customer_id: Some(lender.id),
                customer_name: None,
                payment_method: Some("CREDIT".to_string()),
                notes: None,
                items: vec![
                    SaleLineInput {
                        product_id: a.id,
                        quantity: 2,
                        unit_price: dec!(100),
                        amount_paid: Decimal::ZERO,
                        payment_status: None,
                        notes: None,
                    },
                    SaleLineInput {
                        product_id: b.id,
                        quantity: 4,
                        unit_price: dec!(50),
                        amount_paid: dec!(200),
                        payment_status: None,
                        notes: None,
                    },
                ],
            },
        )
        .await
        .unwrap();

    assert!(result.order_number.starts_with("ORD-"));
    assert_eq!(result.sales.len(), 2);
    assert_eq!(result.total_amount, dec!(400));
    for (index, line) in result.sales.iter().enumerate() {
        assert_eq!(line.sale.order_number.as_deref(), Some(result.order_number.as_str()));
        assert_eq!(
            line.sale.sale_number,
            format!("{}-{}", result.order_number, index + 1)
        );
    }

    assert_eq!(h.stock_of(a.id).await, 46);
    assert_eq!(h.stock_of(b.id).await, 91);
    assert_eq!(h.lender(lender.id).await.current_debt, dec!(200));
}

#[tokio::test]
async fn test_bulk_sale_is_all_or_nothing() {
    let h = Harness::new();
    let a = h.add_product("SHOVEL GREEN", 48, dec!(80), dec!(100)).await;
    let b = h.add_product("CRUSHER", 1, dec!(3500), dec!(4000)).await;

    let line = |product_id, quantity, unit_price: Decimal| SaleLineInput {
        product_id,
        quantity,
        unit_price,
        amount_paid: Decimal::ZERO,
        payment_status: None,
        notes: None,
    };

    let err = h
        .sales()
        .create_bulk_sale(
            h.actor,
            BulkSaleInput {
                customer_id: None,
                customer_name: Some("Walk-in".to_string()),
                payment_method: None,
                notes: None,
                items: vec![line(a.id, 5, dec!(100)), line(b.id, 2, dec!(4000))],
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientStock { .. }));
    assert_eq!(h.stock_of(a.id).await, 48);
    let state = h.store.state().await;
    assert!(state.sales.is_empty());
    assert!(state.movements.is_empty());
}

#[tokio::test]
async fn test_empty_bulk_sale_is_refused() {
    let h = Harness::new();
    let err = h
        .sales()
        .create_bulk_sale(
            h.actor,
            BulkSaleInput {
                customer_id: None,
                customer_name: None,
                payment_method: None,
                notes: None,
                items: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}
