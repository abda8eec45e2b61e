//! Ledger properties over random operation sequences
//!
//! Sales, returns, purchase batches, batch removals and manual adjustments
//! are interleaved at random against one product. After every step the
//! committed movements must replay to the product's stock, and stock must
//! never be negative. A rejected step must leave stock untouched.

mod common;

use common::Harness;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stock_ledger_backend::error::AppError;
use stock_ledger_backend::services::additional_stock::CreateAdditionalStockInput;
use stock_ledger_backend::services::products::AdjustStockInput;
use stock_ledger_backend::services::returns::CreateReturnInput;
use stock_ledger_backend::services::sales::CreateSaleInput;
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Step {
    Sell(i32),
    Return { pick: usize, quantity: i32 },
    Receive(i32),
    RemoveBatch(usize),
    Adjust(i32),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1..15i32).prop_map(Step::Sell),
        (any::<usize>(), 1..5i32).prop_map(|(pick, quantity)| Step::Return { pick, quantity }),
        (1..30i32).prop_map(Step::Receive),
        any::<usize>().prop_map(Step::RemoveBatch),
        (-20..20i32).prop_map(Step::Adjust),
    ]
}

/// Sales and batches created so far, so later steps can refer back to them
#[derive(Default)]
struct History {
    sales: Vec<Uuid>,
    batches: Vec<Uuid>,
}

async fn run_step(
    h: &Harness,
    product_id: Uuid,
    history: &mut History,
    step: Step,
) -> Result<(), AppError> {
    match step {
        Step::Sell(quantity) => {
            let details = h
                .sales()
                .create_sale(
                    h.actor,
                    CreateSaleInput {
                        product_id,
                        quantity,
                        unit_price: dec!(20),
                        customer_id: None,
                        customer_name: None,
                        payment_method: Some("CASH".to_string()),
                        payment_status: None,
                        amount_paid: Decimal::from(quantity) * dec!(20),
                        notes: None,
                    },
                )
                .await?;
            history.sales.push(details.sale.id);
        }
        Step::Return { pick, quantity } => {
            if history.sales.is_empty() {
                return Ok(());
            }
            let sale_id = history.sales[pick % history.sales.len()];
            h.returns()
                .create_return(
                    h.actor,
                    CreateReturnInput {
                        sale_id,
                        product_id,
                        quantity,
                        reason: Some("Damaged".to_string()),
                        refund_amount: Decimal::ZERO,
                        refund_method: None,
                        notes: None,
                    },
                )
                .await?;
        }
        Step::Receive(quantity) => {
            let details = h
                .additional_stock()
                .create(
                    h.actor,
                    CreateAdditionalStockInput {
                        product_id,
                        quantity,
                        cost_per_unit: dec!(12.50),
                        supplier: None,
                        invoice_number: None,
                        purchase_date: None,
                        notes: None,
                    },
                )
                .await?;
            history.batches.push(details.record.id);
        }
        Step::RemoveBatch(pick) => {
            if history.batches.is_empty() {
                return Ok(());
            }
            let index = pick % history.batches.len();
            h.additional_stock()
                .delete(h.actor, history.batches[index])
                .await?;
            history.batches.remove(index);
        }
        Step::Adjust(delta) => {
            h.products()
                .adjust_stock(
                    h.actor,
                    product_id,
                    AdjustStockInput {
                        quantity: delta,
                        notes: None,
                    },
                )
                .await?;
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_random_operations_keep_the_ledger_consistent(
        opening in 0i32..40,
        steps in prop::collection::vec(step_strategy(), 1..30),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let h = Harness::new();
            let product = h.add_product("BALANCE BEARING", opening, dec!(15), dec!(20)).await;
            let mut history = History::default();

            for step in steps {
                let before = h.stock_of(product.id).await;
                let outcome = run_step(&h, product.id, &mut history, step.clone()).await;
                let after = h.stock_of(product.id).await;

                if let Err(err) = outcome {
                    prop_assert!(
                        matches!(
                            err,
                            AppError::InsufficientStock { .. }
                                | AppError::Validation { .. }
                                | AppError::ValidationError(_)
                        ),
                        "unexpected error for {:?}: {:?}",
                        step,
                        err
                    );
                    prop_assert_eq!(before, after, "rejected {:?} changed stock", step);
                }

                prop_assert!(after >= 0);
                let audit = h.ledger_audit(product.id).await;
                prop_assert!(audit.is_consistent(), "after {:?}: {:?}", step, audit);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
