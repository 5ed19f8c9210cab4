mod common;

use cashpoint_business::{CashoutRequest, CashoutService, SettlementError};
use cashpoint_persistence::TransactionRepo;
use cashpoint_core::{
    EventType, NewRateConfig, SettlementMetadata, TransactionStatus, TransactionType,
};
use common::{noon, standard_rates, Harness};
use chrono::Duration;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn request(customer: &str, tokens: i64) -> CashoutRequest {
    CashoutRequest::new(customer, tokens, "STORE_01", "STAFF_01")
}

#[tokio::test]
async fn test_worked_example() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 20_000).await;
    let service = CashoutService::new(&h.ctx);

    // $4.50 is below the $5 minimum
    let err = service
        .process_cashout(request("CUST_001", 4_500))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)), "{err}");
    assert_eq!(h.balance("CUST_001").await, 20_000);

    let receipt = service
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap();
    let tx = &receipt.transaction;
    assert_eq!(tx.usd_amount, dec!(6.00));
    assert_eq!(tx.tx_type, TransactionType::Cashout);
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(receipt.cash_to_customer(), dec!(6.00));
    assert_eq!(receipt.balance_after(), 14_000);
    assert!(!receipt.used_default_rates);
    assert!(!receipt.replayed);

    let meta = tx.cashout_metadata().unwrap();
    assert_eq!(meta.balance_before, 20_000);
    assert_eq!(meta.exchange_rate_used, dec!(1000));
    assert_eq!(meta.venue_commission, dec!(0));
    assert_eq!(meta.store_id, "STORE_01");

    let account = service.get_balance("CUST_001").await.unwrap();
    assert_eq!(account.balance, 14_000);
    assert_eq!(account.total_withdrawn, dec!(6));

    let stored = service.get_transaction(&tx.id).await.unwrap();
    assert_eq!(&stored, tx);
}

#[tokio::test]
async fn test_below_minimum_rejected_regardless_of_balance() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("POOR", 0).await;
    h.customer("RICH", 10_000_000).await;
    let service = CashoutService::new(&h.ctx);

    for customer in ["POOR", "RICH"] {
        let err = service
            .process_cashout(request(customer, 4_999))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Validation(_)), "{customer}: {err}");
    }

    for tokens in [0, -1_000] {
        let err = service
            .process_cashout(request("RICH", tokens))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }
    assert_eq!(h.balance("RICH").await, 10_000_000);
}

#[tokio::test]
async fn test_insufficient_balance() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 5_000).await;
    let service = CashoutService::new(&h.ctx);

    let err = service
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap_err();
    match err {
        SettlementError::InsufficientBalance {
            required,
            available,
        } => {
            assert_eq!(required, 6_000);
            assert_eq!(available, 5_000);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(h.balance("CUST_001").await, 5_000);
    assert!(service
        .list_customer_transactions("CUST_001", 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unknown_customer() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;

    let err = CashoutService::new(&h.ctx)
        .process_cashout(request("NOBODY", 6_000))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::NotFound { .. }), "{err}");
}

#[tokio::test]
async fn test_per_transaction_cap() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 1_000_000).await;

    let err = CashoutService::new(&h.ctx)
        .process_cashout(request("CUST_001", 500_001))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::LimitExceeded { .. }), "{err}");
    assert_eq!(h.balance("CUST_001").await, 1_000_000);
}

#[tokio::test]
async fn test_customer_daily_limit() {
    let h = Harness::new().await;
    h.rates(NewRateConfig {
        daily_limit_per_customer: dec!(10),
        ..standard_rates()
    })
    .await;
    h.customer("CUST_001", 100_000).await;
    let service = CashoutService::new(&h.ctx);

    service
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap();
    let err = service
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap_err();
    match err {
        SettlementError::LimitExceeded { limit, allowed, .. } => {
            assert_eq!(limit, "daily_limit_per_customer");
            assert_eq!(allowed, dec!(4));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Next business day starts a fresh total
    let tomorrow = h.at(noon() + Duration::days(1));
    CashoutService::new(&tomorrow)
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap();
    assert_eq!(h.balance("CUST_001").await, 88_000);
}

#[tokio::test]
async fn test_staff_daily_limit() {
    let h = Harness::new().await;
    h.rates(NewRateConfig {
        daily_limit_per_staff: dec!(10),
        ..standard_rates()
    })
    .await;
    h.customer("CUST_001", 100_000).await;
    h.customer("CUST_002", 100_000).await;
    let service = CashoutService::new(&h.ctx);

    service
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap();
    let err = service
        .process_cashout(request("CUST_002", 6_000))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, SettlementError::LimitExceeded { limit, .. } if limit == "daily_limit_per_staff"),
        "{err}"
    );

    // A different staff member is unaffected
    service
        .process_cashout(CashoutRequest::new("CUST_002", 6_000, "STORE_01", "STAFF_02"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_commission_split() {
    let h = Harness::new().await;
    h.rates(NewRateConfig {
        venue_commission_percent: dec!(10),
        ..standard_rates()
    })
    .await;
    h.customer("CUST_001", 20_000).await;

    let receipt = CashoutService::new(&h.ctx)
        .process_cashout(request("CUST_001", 6_000).with_notes("window 3"))
        .await
        .unwrap();
    let meta = receipt.transaction.cashout_metadata().unwrap();
    assert_eq!(meta.venue_commission, dec!(0.60));
    assert_eq!(meta.cash_to_customer, dec!(5.40));
    assert_eq!(meta.notes.as_deref(), Some("window 3"));
}

#[tokio::test]
async fn test_falls_back_to_default_rates() {
    let h = Harness::new().await;
    h.customer("CUST_001", 20_000).await;

    let receipt = CashoutService::new(&h.ctx)
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap();
    assert!(receipt.used_default_rates);
    assert_eq!(receipt.transaction.usd_amount, dec!(6.00));
}

#[tokio::test]
async fn test_reversal_restores_balance_once() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 20_000).await;
    let service = CashoutService::new(&h.ctx);

    let receipt = service
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap();
    let original_id = receipt.transaction.id.clone();

    let reversed = service
        .reverse_cashout(&original_id, "MGR_01", "counted wrong")
        .await
        .unwrap();
    assert_eq!(h.balance("CUST_001").await, 20_000);

    assert_eq!(reversed.original.status, TransactionStatus::Failed);
    let link = reversed.original.reversal.as_ref().unwrap();
    assert_eq!(link.reversal_transaction_id, reversed.reversal.id);
    assert_eq!(link.reversed_by, "MGR_01");

    assert_eq!(reversed.reversal.tx_type, TransactionType::CashoutReversal);
    match &reversed.reversal.metadata {
        SettlementMetadata::Reversal(meta) => {
            assert_eq!(meta.original_transaction_id, original_id);
            assert_eq!(meta.balance_before, 14_000);
            assert_eq!(meta.balance_after, 20_000);
        }
        other => panic!("unexpected metadata: {other:?}"),
    }

    let err = service
        .reverse_cashout(&original_id, "MGR_01", "again")
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::AlreadyReversed(_)), "{err}");
    assert_eq!(h.balance("CUST_001").await, 20_000);

    // A reversal record is not itself reversible
    let err = service
        .reverse_cashout(&reversed.reversal.id, "MGR_01", "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)), "{err}");

    let account = service.get_balance("CUST_001").await.unwrap();
    assert_eq!(account.total_withdrawn, dec!(0));

    // Voided cashouts no longer count toward the daily total
    let totals = service
        .daily_totals("CUST_001", "STAFF_01", noon().date_naive())
        .await
        .unwrap();
    assert_eq!(totals.customer_usd, dec!(0));
}

#[tokio::test]
async fn test_reverse_unknown_transaction() {
    let h = Harness::new().await;

    let err = CashoutService::new(&h.ctx)
        .reverse_cashout("TX_MISSING", "MGR_01", "reason")
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::NotFound { .. }), "{err}");
}

#[tokio::test]
async fn test_idempotent_reference() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 20_000).await;
    let service = CashoutService::new(&h.ctx);

    let first = service
        .process_cashout(request("CUST_001", 6_000).with_reference("POS-42"))
        .await
        .unwrap();
    let retry = service
        .process_cashout(request("CUST_001", 6_000).with_reference("POS-42"))
        .await
        .unwrap();

    assert!(retry.replayed);
    assert_eq!(retry.transaction.id, first.transaction.id);
    assert_eq!(retry.reference_id(), "POS-42");
    assert_eq!(h.balance("CUST_001").await, 14_000);

    let err = service
        .process_cashout(request("CUST_001", 7_000).with_reference("POS-42"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)), "{err}");

    // Same customer and amount, but another till and cashier
    for other in [
        CashoutRequest::new("CUST_001", 6_000, "STORE_02", "STAFF_01"),
        CashoutRequest::new("CUST_001", 6_000, "STORE_01", "STAFF_02"),
    ] {
        let err = service
            .process_cashout(other.with_reference("POS-42"))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Validation(_)), "{err}");
    }
    assert_eq!(h.balance("CUST_001").await, 14_000);
}

#[tokio::test]
async fn test_failed_record_write_rolls_back_debit() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 20_000).await;

    // The debit succeeds, then the record insert aborts
    sqlx::query(
        r#"
        CREATE TRIGGER reject_settlement_insert
        BEFORE INSERT ON settlement_transactions
        BEGIN
            SELECT RAISE(ABORT, 'settlement store unavailable');
        END
        "#,
    )
    .execute(h.db.pool())
    .await
    .unwrap();

    let service = CashoutService::new(&h.ctx);
    let err = service
        .process_cashout(request("CUST_001", 6_000).with_reference("POS-7"))
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::Persistence(_)), "{err}");
    assert_eq!(err.kind(), "persistence_failure");

    let account = service.get_balance("CUST_001").await.unwrap();
    assert_eq!(account.balance, 20_000);
    assert_eq!(account.total_withdrawn, dec!(0));
    assert_eq!(TransactionRepo::count(h.db.pool()).await.unwrap(), 0);

    let journal = h.db.event_reader().read_all().unwrap();
    assert!(journal
        .iter()
        .all(|e| e.event_type != EventType::CashoutCompleted));

    // Once the store recovers, the same request goes through exactly once
    sqlx::query("DROP TRIGGER reject_settlement_insert")
        .execute(h.db.pool())
        .await
        .unwrap();
    let receipt = service
        .process_cashout(request("CUST_001", 6_000).with_reference("POS-7"))
        .await
        .unwrap();
    assert!(!receipt.replayed);
    assert_eq!(receipt.balance_after(), 14_000);
    assert_eq!(TransactionRepo::count(h.db.pool()).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_retries_with_same_reference_debit_once() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 20_000).await;
    let ctx = Arc::new(h.at(noon()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            CashoutService::new(&ctx)
                .process_cashout(request("CUST_001", 6_000).with_reference("POS-1"))
                .await
        }));
    }

    let mut receipts = Vec::new();
    for handle in handles {
        receipts.push(handle.await.unwrap().unwrap());
    }

    let first_id = receipts[0].transaction.id.clone();
    assert!(receipts.iter().all(|r| r.transaction.id == first_id));
    assert_eq!(receipts.iter().filter(|r| !r.replayed).count(), 1);
    assert_eq!(h.balance("CUST_001").await, 14_000);
    assert_eq!(TransactionRepo::count(h.db.pool()).await.unwrap(), 1);

    let account = CashoutService::new(&h.ctx)
        .get_balance("CUST_001")
        .await
        .unwrap();
    assert_eq!(account.total_withdrawn, dec!(6));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cashouts_never_overdraw() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 20_000).await;
    let ctx = Arc::new(h.at(noon()));

    let mut handles = Vec::new();
    for i in 0..10 {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(async move {
            let staff = format!("STAFF_{:02}", i);
            CashoutService::new(&ctx)
                .process_cashout(CashoutRequest::new("CUST_001", 6_000, "STORE_01", &staff))
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(SettlementError::InsufficientBalance { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(h.balance("CUST_001").await, 2_000);

    let service = CashoutService::new(&h.ctx);
    let history = service
        .list_customer_transactions("CUST_001", 50)
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    let debited: i64 = history.iter().map(|t| t.token_amount).sum();
    assert_eq!(20_000 - debited, 2_000);
    assert!(history.iter().all(|t| t.metadata.balance_after() >= 0));
}

#[tokio::test]
async fn test_history_and_daily_totals() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 50_000).await;

    let morning = h.at(noon() - Duration::hours(2));
    let first = CashoutService::new(&morning)
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap();
    let second = CashoutService::new(&h.ctx)
        .process_cashout(request("CUST_001", 10_000))
        .await
        .unwrap();

    let service = CashoutService::new(&h.ctx);
    let history = service
        .list_customer_transactions("CUST_001", 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, second.transaction.id);
    assert_eq!(history[1].id, first.transaction.id);

    let totals = service
        .daily_totals("CUST_001", "STAFF_01", noon().date_naive())
        .await
        .unwrap();
    assert_eq!(totals.customer_usd, dec!(16));
    assert_eq!(totals.staff_usd, dec!(16));
    assert_eq!(totals.customer_remaining, dec!(984));
    assert_eq!(totals.staff_remaining, dec!(4984));
}

#[tokio::test]
async fn test_cashout_is_journaled() {
    let h = Harness::new().await;
    h.rates(standard_rates()).await;
    h.customer("CUST_001", 20_000).await;

    let receipt = CashoutService::new(&h.ctx)
        .process_cashout(request("CUST_001", 6_000))
        .await
        .unwrap();

    let events = h.db.event_reader().read_all().unwrap();
    let cashout = events
        .iter()
        .find(|e| e.event_type == EventType::CashoutCompleted)
        .unwrap();
    assert_eq!(cashout.subject_id, "CUST_001");
    assert_eq!(cashout.record_id.as_deref(), Some(receipt.transaction.id.as_str()));
    assert_eq!(cashout.token_amount, Some(6_000));
    assert_eq!(cashout.timestamp, noon());
}
