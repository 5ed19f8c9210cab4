//! Repository implementations cho SQLite
//!
//! Single-statement operations nhận bất kỳ `Executor` nào (pool hoặc
//! transaction); operations nhiều statement nhận `&mut SqliteConnection`
//! để caller gom chúng vào cùng một transaction.

use crate::error::{PersistenceError, PersistenceResult};
use crate::sqlite::schema::*;
use cashpoint_core::{
    LedgerAccount, RateConfig, ReconciliationLedger, ReconciliationNote, ReconciliationStatus,
    ReversalLink, SettlementStatus, SettlementTransaction, TransactionStatus, TransactionType,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Rate Config Repository
// ============================================================================

/// Repository cho rate_configs table
pub struct RateConfigRepo;

impl RateConfigRepo {
    /// Config active có cửa sổ hiệu lực chứa `as_of`
    pub async fn current_as_of<'e, E>(
        executor: E,
        as_of: DateTime<Utc>,
    ) -> PersistenceResult<Option<RateConfig>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, RateConfigRow>(
            r#"
            SELECT * FROM rate_configs
            WHERE is_active = 1
              AND effective_from <= ?
              AND (effective_to IS NULL OR effective_to > ?)
            ORDER BY effective_from DESC
            LIMIT 1
            "#,
        )
        .bind(as_of)
        .bind(as_of)
        .fetch_optional(executor)
        .await?;

        row.map(RateConfig::try_from).transpose()
    }

    /// Lấy config theo ID
    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<RateConfig>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, RateConfigRow>("SELECT * FROM rate_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("RateConfig", id))?
            .try_into()
    }

    /// Tất cả configs, mới nhất trước
    pub async fn list_all(pool: &SqlitePool) -> PersistenceResult<Vec<RateConfig>> {
        let rows = sqlx::query_as::<_, RateConfigRow>(
            "SELECT * FROM rate_configs ORDER BY created_at DESC, effective_from DESC",
        )
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(RateConfig::try_from).collect()
    }

    /// Đếm configs đang active
    pub async fn count_active<'e, E>(executor: E) -> PersistenceResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rate_configs WHERE is_active = 1")
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }

    /// Đóng mọi config đang active tại thời điểm `at`
    pub async fn deactivate_all<'e, E>(executor: E, at: DateTime<Utc>) -> PersistenceResult<u64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            "UPDATE rate_configs SET is_active = 0, effective_to = ? WHERE is_active = 1",
        )
        .bind(at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Thêm config mới
    pub async fn insert<'e, E>(executor: E, config: &RateConfig) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO rate_configs (
                id, tokens_per_dollar, min_cashout, max_cashout_per_transaction,
                daily_limit_per_customer, daily_limit_per_staff, venue_commission_percent,
                effective_from, effective_to, is_active, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&config.id)
        .bind(config.tokens_per_dollar.to_string())
        .bind(config.min_cashout.to_string())
        .bind(config.max_cashout_per_transaction.to_string())
        .bind(config.daily_limit_per_customer.to_string())
        .bind(config.daily_limit_per_staff.to_string())
        .bind(config.venue_commission_percent.to_string())
        .bind(config.effective_from)
        .bind(config.effective_to)
        .bind(config.is_active)
        .bind(&config.created_by)
        .bind(config.created_at)
        .execute(executor)
        .await
        .map_err(|e| PersistenceError::from_insert(e, "active rate config"))?;
        Ok(())
    }
}

// ============================================================================
// Customer Repository
// ============================================================================

/// Repository cho customers table (số dư token)
pub struct CustomerRepo;

impl CustomerRepo {
    /// Thêm customer mới
    pub async fn insert<'e, E>(executor: E, account: &LedgerAccount) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, balance, total_withdrawn, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.customer_id)
        .bind(&account.name)
        .bind(account.balance)
        .bind(account.total_withdrawn.to_string())
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(executor)
        .await
        .map_err(|e| PersistenceError::from_insert(e, &format!("customer {}", account.customer_id)))?;
        Ok(())
    }

    /// Lấy customer theo ID
    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<LedgerAccount>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Customer", id))?
            .try_into()
    }

    /// Lấy tất cả customers
    pub async fn get_all(pool: &SqlitePool) -> PersistenceResult<Vec<LedgerAccount>> {
        let rows = sqlx::query_as::<_, CustomerRow>("SELECT * FROM customers ORDER BY id")
            .fetch_all(pool)
            .await?;
        rows.into_iter().map(LedgerAccount::try_from).collect()
    }

    /// Cộng token thưởng (process bên ngoài). Trả về số dư mới.
    pub async fn credit_tokens<'e, E>(
        executor: E,
        id: &str,
        tokens: i64,
        at: DateTime<Utc>,
    ) -> PersistenceResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row: Option<(i64,)> = sqlx::query_as(
            "UPDATE customers SET balance = balance + ?, updated_at = ? WHERE id = ? RETURNING balance",
        )
        .bind(tokens)
        .bind(at)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        row.map(|(balance,)| balance)
            .ok_or_else(|| PersistenceError::not_found("Customer", id))
    }

    /// Trừ `tokens` chỉ khi `balance >= tokens`, trong một câu UPDATE.
    ///
    /// Trả về `None` nếu không có dòng nào bị ảnh hưởng (không đủ số dư hoặc
    /// customer không tồn tại). Đây là cơ chế duy nhất bảo vệ `balance >= 0`
    /// khi có nhiều cashout đồng thời; không được thay bằng read-then-write.
    pub async fn debit_if_sufficient(
        conn: &mut SqliteConnection,
        id: &str,
        tokens: i64,
        usd: Decimal,
        at: DateTime<Utc>,
    ) -> PersistenceResult<Option<i64>> {
        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            UPDATE customers
            SET balance = balance - ?, updated_at = ?
            WHERE id = ? AND balance >= ?
            RETURNING balance, total_withdrawn
            "#,
        )
        .bind(tokens)
        .bind(at)
        .bind(id)
        .bind(tokens)
        .fetch_optional(&mut *conn)
        .await?;

        let Some((balance_after, total_withdrawn)) = row else {
            return Ok(None);
        };

        // Same transaction already holds the write lock on this row
        let total = parse_decimal("total_withdrawn", &total_withdrawn)? + usd;
        sqlx::query("UPDATE customers SET total_withdrawn = ? WHERE id = ?")
            .bind(total.to_string())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(Some(balance_after))
    }

    /// Hoàn `tokens` cho customer và giảm `total_withdrawn` tương ứng.
    pub async fn credit_back(
        conn: &mut SqliteConnection,
        id: &str,
        tokens: i64,
        usd: Decimal,
        at: DateTime<Utc>,
    ) -> PersistenceResult<i64> {
        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            UPDATE customers
            SET balance = balance + ?, updated_at = ?
            WHERE id = ?
            RETURNING balance, total_withdrawn
            "#,
        )
        .bind(tokens)
        .bind(at)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        let (balance_after, total_withdrawn) =
            row.ok_or_else(|| PersistenceError::not_found("Customer", id))?;

        let total =
            (parse_decimal("total_withdrawn", &total_withdrawn)? - usd).max(Decimal::ZERO);
        sqlx::query("UPDATE customers SET total_withdrawn = ? WHERE id = ?")
            .bind(total.to_string())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(balance_after)
    }
}

// ============================================================================
// Venue Repository
// ============================================================================

/// Repository cho venues table (master data, read-only với engine)
pub struct VenueRepo;

impl VenueRepo {
    /// Lấy venue theo ID
    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<VenueRow>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, VenueRow>("SELECT * FROM venues WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Venue", id))
    }

    /// Lấy tất cả venues
    pub async fn get_all(pool: &SqlitePool) -> PersistenceResult<Vec<VenueRow>> {
        let rows = sqlx::query_as::<_, VenueRow>("SELECT * FROM venues ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Thêm hoặc cập nhật venue
    pub async fn upsert<'e, E>(
        executor: E,
        id: &str,
        name: &str,
        fee_percentage: Decimal,
        at: DateTime<Utc>,
    ) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO venues (id, name, fee_percentage, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                fee_percentage = excluded.fee_percentage
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(fee_percentage.to_string())
        .bind(at)
        .execute(executor)
        .await?;
        Ok(())
    }
}

// ============================================================================
// Settlement Transaction Repository
// ============================================================================

/// Repository cho settlement_transactions table
pub struct TransactionRepo;

impl TransactionRepo {
    /// Thêm transaction mới. Trùng `reference_id` trả về `UniqueViolation`.
    pub async fn insert<'e, E>(executor: E, tx: &SettlementTransaction) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let metadata = serde_json::to_string(&tx.metadata)?;
        let link = tx.reversal.as_ref();

        sqlx::query(
            r#"
            INSERT INTO settlement_transactions (
                id, customer_id, tx_type, token_amount, usd_amount, status, reference_id,
                store_id, actor_id, metadata, reversal_transaction_id, reversed_by,
                reversal_reason, reversed_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.customer_id)
        .bind(tx.tx_type.as_str())
        .bind(tx.token_amount)
        .bind(tx.usd_amount.to_string())
        .bind(tx.status.as_str())
        .bind(&tx.reference_id)
        .bind(&tx.store_id)
        .bind(&tx.actor_id)
        .bind(metadata)
        .bind(link.map(|l| l.reversal_transaction_id.clone()))
        .bind(link.map(|l| l.reversed_by.clone()))
        .bind(link.map(|l| l.reason.clone()))
        .bind(link.map(|l| l.reversed_at))
        .bind(tx.created_at)
        .execute(executor)
        .await
        .map_err(|e| PersistenceError::from_insert(e, &format!("reference_id {}", tx.reference_id)))?;
        Ok(())
    }

    /// Lấy transaction theo ID
    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<SettlementTransaction>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, TransactionRow>("SELECT * FROM settlement_transactions WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("SettlementTransaction", id))?
            .try_into()
    }

    /// Lấy transaction theo reference/idempotency id
    pub async fn get_by_reference<'e, E>(
        executor: E,
        reference_id: &str,
    ) -> PersistenceResult<Option<SettlementTransaction>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT * FROM settlement_transactions WHERE reference_id = ?",
        )
        .bind(reference_id)
        .fetch_optional(executor)
        .await?;
        row.map(SettlementTransaction::try_from).transpose()
    }

    /// Transactions của customer, mới nhất trước
    pub async fn get_by_customer(
        pool: &SqlitePool,
        customer_id: &str,
        limit: i64,
    ) -> PersistenceResult<Vec<SettlementTransaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT * FROM settlement_transactions
            WHERE customer_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(SettlementTransaction::try_from).collect()
    }

    /// Tổng USD của các cashout completed của customer trong `[from, to)`
    pub async fn completed_usd_for_customer(
        pool: &SqlitePool,
        customer_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PersistenceResult<Decimal> {
        Self::sum_completed_usd(pool, "customer_id", customer_id, from, to).await
    }

    /// Tổng USD của các cashout completed do staff thực hiện trong `[from, to)`
    pub async fn completed_usd_for_staff(
        pool: &SqlitePool,
        staff_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PersistenceResult<Decimal> {
        Self::sum_completed_usd(pool, "actor_id", staff_id, from, to).await
    }

    async fn sum_completed_usd(
        pool: &SqlitePool,
        column: &'static str,
        id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PersistenceResult<Decimal> {
        // Summed in Decimal, SQLite would go through REAL
        let sql = format!(
            r#"
            SELECT usd_amount FROM settlement_transactions
            WHERE {} = ? AND tx_type = ? AND status = ?
              AND created_at >= ? AND created_at < ?
            "#,
            column
        );
        let amounts: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(id)
            .bind(TransactionType::Cashout.as_str())
            .bind(TransactionStatus::Completed.as_str())
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await?;

        amounts
            .iter()
            .try_fold(Decimal::ZERO, |acc, (amount,)| -> PersistenceResult<Decimal> {
                Ok(acc + parse_decimal("usd_amount", amount)?)
            })
    }

    /// Void cashout gốc và gắn reversal link.
    ///
    /// Chỉ thành công với cashout `completed` chưa từng bị reverse; trả về
    /// `false` nếu không có dòng nào thỏa điều kiện.
    pub async fn mark_reversed<'e, E>(
        executor: E,
        id: &str,
        link: &ReversalLink,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE settlement_transactions
            SET status = ?, reversal_transaction_id = ?, reversed_by = ?,
                reversal_reason = ?, reversed_at = ?
            WHERE id = ? AND tx_type = ? AND status = ? AND reversal_transaction_id IS NULL
            "#,
        )
        .bind(TransactionStatus::Failed.as_str())
        .bind(&link.reversal_transaction_id)
        .bind(&link.reversed_by)
        .bind(&link.reason)
        .bind(link.reversed_at)
        .bind(id)
        .bind(TransactionType::Cashout.as_str())
        .bind(TransactionStatus::Completed.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Đếm transactions
    pub async fn count(pool: &SqlitePool) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM settlement_transactions")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Reconciliation Repository
// ============================================================================

/// Kết quả ghi actual fee, ghi vào DB trong một câu UPDATE
#[derive(Debug, Clone)]
pub struct FeeUpdate {
    pub actual_software_fee: Decimal,
    pub variance: Decimal,
    pub variance_percentage: Decimal,
    pub compliance_score: Decimal,
    pub status: ReconciliationStatus,
    pub flagged_reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Thanh toán venue đã gửi
#[derive(Debug, Clone)]
pub struct PaymentSent {
    pub amount: Decimal,
    pub method: String,
    pub sent_by: String,
    pub sent_at: DateTime<Utc>,
}

/// Thanh toán đã nhận; `total_received` là tổng cộng dồn
#[derive(Debug, Clone)]
pub struct PaymentReceived {
    pub total_received: Decimal,
    pub confirmed_by: String,
    pub received_at: DateTime<Utc>,
}

/// Repository cho reconciliation_ledger table.
///
/// Mọi chuyển trạng thái là compare-and-swap trên trạng thái hiện tại;
/// `false` nghĩa là dòng đã bị đổi bởi request khác.
pub struct ReconciliationRepo;

impl ReconciliationRepo {
    /// Thêm dòng mới. Trùng `(store_id, reconciliation_date)` trả về `UniqueViolation`.
    pub async fn insert<'e, E>(executor: E, rec: &ReconciliationLedger) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_ledger (
                id, store_id, reconciliation_date, venue_gaming_revenue,
                software_fee_percentage, expected_software_fee,
                reconciliation_status, settlement_status,
                submitted_by, submitted_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&rec.id)
        .bind(&rec.store_id)
        .bind(rec.reconciliation_date)
        .bind(rec.venue_gaming_revenue.to_string())
        .bind(rec.software_fee_percentage.to_string())
        .bind(rec.expected_software_fee.to_string())
        .bind(rec.reconciliation_status.as_str())
        .bind(rec.settlement_status.as_str())
        .bind(&rec.submitted_by)
        .bind(rec.submitted_at)
        .bind(rec.updated_at)
        .execute(executor)
        .await
        .map_err(|e| {
            PersistenceError::from_insert(
                e,
                &format!("reconciliation {}/{}", rec.store_id, rec.reconciliation_date),
            )
        })?;
        Ok(())
    }

    /// Lấy reconciliation theo ID
    pub async fn get_by_id<'e, E>(executor: E, id: &str) -> PersistenceResult<ReconciliationLedger>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, ReconciliationRow>("SELECT * FROM reconciliation_ledger WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| PersistenceError::not_found("Reconciliation", id))?
            .try_into()
    }

    /// Lấy reconciliation theo venue và ngày
    pub async fn get_by_store_and_date<'e, E>(
        executor: E,
        store_id: &str,
        date: NaiveDate,
    ) -> PersistenceResult<Option<ReconciliationLedger>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, ReconciliationRow>(
            "SELECT * FROM reconciliation_ledger WHERE store_id = ? AND reconciliation_date = ?",
        )
        .bind(store_id)
        .bind(date)
        .fetch_optional(executor)
        .await?;
        row.map(ReconciliationLedger::try_from).transpose()
    }

    /// Các dòng trong `[from, to]` (theo ngày), lọc theo venue nếu có
    pub async fn list(
        pool: &SqlitePool,
        store_id: Option<&str>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> PersistenceResult<Vec<ReconciliationLedger>> {
        let rows = sqlx::query_as::<_, ReconciliationRow>(
            r#"
            SELECT * FROM reconciliation_ledger
            WHERE (? IS NULL OR store_id = ?)
              AND reconciliation_date >= ? AND reconciliation_date <= ?
            ORDER BY reconciliation_date, store_id
            "#,
        )
        .bind(store_id)
        .bind(store_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
        rows.into_iter().map(ReconciliationLedger::try_from).collect()
    }

    /// Ghi actual fee và kết quả chấm điểm
    pub async fn update_fee<'e, E>(
        executor: E,
        id: &str,
        expected_status: ReconciliationStatus,
        update: &FeeUpdate,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_ledger
            SET actual_software_fee = ?, variance = ?, variance_percentage = ?,
                compliance_score = ?, reconciliation_status = ?,
                flagged_reason = COALESCE(?, flagged_reason), updated_at = ?
            WHERE id = ? AND reconciliation_status = ?
            "#,
        )
        .bind(update.actual_software_fee.to_string())
        .bind(update.variance.to_string())
        .bind(update.variance_percentage.to_string())
        .bind(update.compliance_score.to_string())
        .bind(update.status.as_str())
        .bind(&update.flagged_reason)
        .bind(update.at)
        .bind(id)
        .bind(expected_status.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// pending|flagged -> approved
    pub async fn approve<'e, E>(
        executor: E,
        id: &str,
        from: ReconciliationStatus,
        approved_by: &str,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_ledger
            SET reconciliation_status = ?, approved_by = ?, approved_at = ?, updated_at = ?
            WHERE id = ? AND reconciliation_status = ?
            "#,
        )
        .bind(ReconciliationStatus::Approved.as_str())
        .bind(approved_by)
        .bind(at)
        .bind(at)
        .bind(id)
        .bind(from.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// pending -> flagged
    pub async fn flag<'e, E>(
        executor: E,
        id: &str,
        from: ReconciliationStatus,
        reason: &str,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_ledger
            SET reconciliation_status = ?, flagged_reason = ?, updated_at = ?
            WHERE id = ? AND reconciliation_status = ?
            "#,
        )
        .bind(ReconciliationStatus::Flagged.as_str())
        .bind(reason)
        .bind(at)
        .bind(id)
        .bind(from.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// flagged -> resolved
    pub async fn resolve<'e, E>(
        executor: E,
        id: &str,
        from: ReconciliationStatus,
        resolved_by: &str,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_ledger
            SET reconciliation_status = ?, resolved_by = ?, resolved_at = ?, updated_at = ?
            WHERE id = ? AND reconciliation_status = ?
            "#,
        )
        .bind(ReconciliationStatus::Resolved.as_str())
        .bind(resolved_by)
        .bind(at)
        .bind(at)
        .bind(id)
        .bind(from.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// unsettled -> payment_sent
    pub async fn record_payment_sent<'e, E>(
        executor: E,
        id: &str,
        from: SettlementStatus,
        payment: &PaymentSent,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_ledger
            SET settlement_status = ?, amount_sent = ?, payment_method = ?,
                payment_sent_by = ?, payment_sent_at = ?, updated_at = ?
            WHERE id = ? AND settlement_status = ?
            "#,
        )
        .bind(SettlementStatus::PaymentSent.as_str())
        .bind(payment.amount.to_string())
        .bind(&payment.method)
        .bind(&payment.sent_by)
        .bind(payment.sent_at)
        .bind(at)
        .bind(id)
        .bind(from.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// payment_sent|partial -> partial|settled
    pub async fn record_payment_received<'e, E>(
        executor: E,
        id: &str,
        from: SettlementStatus,
        to: SettlementStatus,
        receipt: &PaymentReceived,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_ledger
            SET settlement_status = ?, amount_received = ?, payment_confirmed_by = ?,
                payment_received_at = ?, updated_at = ?
            WHERE id = ? AND settlement_status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(receipt.total_received.to_string())
        .bind(&receipt.confirmed_by)
        .bind(receipt.received_at)
        .bind(at)
        .bind(id)
        .bind(from.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Đổi settlement status không kèm số tiền (dispute)
    pub async fn set_settlement_status<'e, E>(
        executor: E,
        id: &str,
        from: SettlementStatus,
        to: SettlementStatus,
        at: DateTime<Utc>,
    ) -> PersistenceResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE reconciliation_ledger
            SET settlement_status = ?, updated_at = ?
            WHERE id = ? AND settlement_status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(at)
        .bind(id)
        .bind(from.as_str())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Đếm reconciliation rows
    pub async fn count(pool: &SqlitePool) -> PersistenceResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reconciliation_ledger")
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }
}

// ============================================================================
// Reconciliation Note Repository
// ============================================================================

/// Repository cho reconciliation_notes table (append-only)
pub struct NoteRepo;

impl NoteRepo {
    /// Thêm note
    pub async fn append<'e, E>(
        executor: E,
        reconciliation_id: &str,
        action: &str,
        actor_id: &str,
        note: &str,
        at: DateTime<Utc>,
    ) -> PersistenceResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query(
            r#"
            INSERT INTO reconciliation_notes (reconciliation_id, action, actor_id, note, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(reconciliation_id)
        .bind(action)
        .bind(actor_id)
        .bind(note)
        .bind(at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Notes của một reconciliation, theo thứ tự ghi
    pub async fn get_by_reconciliation(
        pool: &SqlitePool,
        reconciliation_id: &str,
    ) -> PersistenceResult<Vec<ReconciliationNote>> {
        let rows = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM reconciliation_notes WHERE reconciliation_id = ? ORDER BY id",
        )
        .bind(reconciliation_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(ReconciliationNote::from).collect())
    }
}

// ============================================================================
// Database initialization
// ============================================================================

/// Khởi tạo database connection pool.
///
/// WAL + busy timeout để các writer đồng thời chờ nhau thay vì lỗi ngay.
pub async fn create_pool(database_url: &str) -> PersistenceResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Tạo tables và indexes (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> PersistenceResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    debug!(statements = SCHEMA.len(), "schema ready");
    Ok(())
}

/// Tạo database mới với schema
pub async fn init_database(database_url: &str) -> PersistenceResult<SqlitePool> {
    let pool = create_pool(database_url).await?;
    init_schema(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    async fn test_pool() -> (TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("test.db").display());
        let pool = init_database(&url).await.unwrap();
        (dir, pool)
    }

    fn config(id: &str, from: DateTime<Utc>) -> RateConfig {
        RateConfig {
            id: id.to_string(),
            tokens_per_dollar: dec!(1000),
            min_cashout: dec!(5),
            max_cashout_per_transaction: dec!(500),
            daily_limit_per_customer: dec!(1000),
            daily_limit_per_staff: dec!(5000),
            venue_commission_percent: dec!(0),
            effective_from: from,
            effective_to: None,
            is_active: true,
            created_by: "ADMIN".to_string(),
            created_at: from,
        }
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let (_dir, pool) = test_pool().await;
        init_schema(&pool).await.unwrap();
        assert_eq!(TransactionRepo::count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_single_active_config_enforced() {
        let (_dir, pool) = test_pool().await;
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        RateConfigRepo::insert(&pool, &config("RC_1", t0)).await.unwrap();
        let err = RateConfigRepo::insert(&pool, &config("RC_2", t0))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        let t1 = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(RateConfigRepo::deactivate_all(&pool, t1).await.unwrap(), 1);
        RateConfigRepo::insert(&pool, &config("RC_2", t1)).await.unwrap();
        assert_eq!(RateConfigRepo::count_active(&pool).await.unwrap(), 1);

        let old = RateConfigRepo::get_by_id(&pool, "RC_1").await.unwrap();
        assert!(!old.is_active);
        assert_eq!(old.effective_to, Some(t1));

        let current = RateConfigRepo::current_as_of(&pool, t1).await.unwrap().unwrap();
        assert_eq!(current.id, "RC_2");
        assert!(RateConfigRepo::current_as_of(&pool, t0).await.unwrap().is_none());
        assert_eq!(RateConfigRepo::list_all(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_conditional_debit() {
        let (_dir, pool) = test_pool().await;
        let now = Utc::now();
        CustomerRepo::insert(&pool, &LedgerAccount::new("CUST_001", "Alice"))
            .await
            .unwrap();
        CustomerRepo::credit_tokens(&pool, "CUST_001", 10_000, now)
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let after = CustomerRepo::debit_if_sufficient(&mut conn, "CUST_001", 6_000, dec!(6), now)
            .await
            .unwrap();
        assert_eq!(after, Some(4_000));

        let refused =
            CustomerRepo::debit_if_sufficient(&mut conn, "CUST_001", 6_000, dec!(6), now)
                .await
                .unwrap();
        assert_eq!(refused, None);

        let back = CustomerRepo::credit_back(&mut conn, "CUST_001", 6_000, dec!(6), now)
            .await
            .unwrap();
        assert_eq!(back, 10_000);
        drop(conn);

        let account = CustomerRepo::get_by_id(&pool, "CUST_001").await.unwrap();
        assert_eq!(account.balance, 10_000);
        assert_eq!(account.total_withdrawn, dec!(0));
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let (_dir, pool) = test_pool().await;

        let err = CustomerRepo::get_by_id(&pool, "NOPE").await.unwrap_err();
        assert!(err.is_not_found());
        let err = CustomerRepo::credit_tokens(&pool, "NOPE", 1, Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        let err = ReconciliationRepo::get_by_id(&pool, "NOPE").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_venue_upsert() {
        let (_dir, pool) = test_pool().await;

        VenueRepo::upsert(&pool, "STORE_01", "Main St", dec!(5), Utc::now()).await.unwrap();
        VenueRepo::upsert(&pool, "STORE_01", "Main Street", dec!(6), Utc::now()).await.unwrap();

        let venue = VenueRepo::get_by_id(&pool, "STORE_01").await.unwrap();
        assert_eq!(venue.name, "Main Street");
        assert_eq!(venue.fee_percentage().unwrap(), dec!(6));
        assert_eq!(VenueRepo::get_all(&pool).await.unwrap().len(), 1);
    }
}
