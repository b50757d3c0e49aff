// SQLite TransactionRepository Implementation

use async_trait::async_trait;
use compensa_core::domain::{
    Participant, Transaction, TransactionId, TransactionPhase, TransactionRole,
};
use compensa_core::error::{AppError, Result};
use compensa_core::port::time_provider::TimeProvider;
use compensa_core::port::TransactionRepository;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.code().as_deref() == Some("2067") || db_err.code().as_deref() == Some("1555")
    )
}

pub struct SqliteTransactionRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteTransactionRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    async fn stored_version(&self, id: TransactionId) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT version FROM transactions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl TransactionRepository for SqliteTransactionRepository {
    async fn create(&self, transaction: &Transaction) -> Result<()> {
        let participants = serde_json::to_string(&transaction.participants)?;
        let attachments = serde_json::to_string(&transaction.attachments)?;

        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, phase, role, participants, attachments,
                retry_count, created_at, last_updated_at, version
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.phase().to_string())
        .bind(transaction.role.to_string())
        .bind(&participants)
        .bind(&attachments)
        .bind(transaction.retry_count)
        .bind(transaction.created_at)
        .bind(transaction.last_updated_at)
        .bind(transaction.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(AppError::DuplicateTransaction(transaction.id))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|r| r.into_transaction()).transpose()
    }

    async fn update(&self, transaction: &mut Transaction) -> Result<()> {
        let participants = serde_json::to_string(&transaction.participants)?;
        let attachments = serde_json::to_string(&transaction.attachments)?;
        let now = self.time_provider.now_millis();

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET phase = ?, participants = ?, attachments = ?,
                retry_count = ?, last_updated_at = ?, version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(transaction.phase().to_string())
        .bind(&participants)
        .bind(&attachments)
        .bind(transaction.retry_count)
        .bind(now)
        .bind(transaction.id.to_string())
        .bind(transaction.version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return match self.stored_version(transaction.id).await? {
                None => Err(AppError::NoSuchTransaction(transaction.id)),
                Some(_) => Err(AppError::VersionConflict {
                    id: transaction.id,
                    expected: transaction.version,
                }),
            };
        }

        transaction.version += 1;
        transaction.touch(now);
        Ok(())
    }

    async fn delete(&self, transaction: &Transaction) -> Result<()> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ? AND version = ?")
            .bind(transaction.id.to_string())
            .bind(transaction.version)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            // absent row: already completed, idempotent. present row: someone
            // re-drove it concurrently, refuse to delete under their feet.
            return match self.stored_version(transaction.id).await? {
                None => Ok(()),
                Some(_) => Err(AppError::VersionConflict {
                    id: transaction.id,
                    expected: transaction.version,
                }),
            };
        }

        Ok(())
    }

    async fn list_stale(
        &self,
        older_than_ms: i64,
        max_retry_count: i32,
    ) -> Result<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT * FROM transactions
            WHERE last_updated_at < ? AND retry_count < ?
            ORDER BY last_updated_at ASC
            "#,
        )
        .bind(older_than_ms)
        .bind(max_retry_count)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(|row| row.into_transaction()).collect()
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    phase: String,
    role: String,
    participants: String,
    attachments: String,
    retry_count: i32,
    created_at: i64,
    last_updated_at: i64,
    version: i64,
}

impl TransactionRow {
    fn into_transaction(self) -> Result<Transaction> {
        let id = Uuid::parse_str(&self.id)
            .map(TransactionId::from_uuid)
            .map_err(|e| AppError::Database(format!("Invalid transaction id: {}", e)))?;

        let phase = match self.phase.as_str() {
            "TRYING" => TransactionPhase::Trying,
            "CONFIRMING" => TransactionPhase::Confirming,
            _ => TransactionPhase::Cancelling, // Default fallback
        };

        let role = match self.role.as_str() {
            "BRANCH" => TransactionRole::Branch,
            _ => TransactionRole::Root,
        };

        let participants: Vec<Participant> = serde_json::from_str(&self.participants)?;
        let attachments: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&self.attachments)?;

        Ok(Transaction::restore(
            id,
            phase,
            role,
            participants,
            self.retry_count,
            self.created_at,
            self.last_updated_at,
            self.version,
            attachments,
        ))
    }
}
