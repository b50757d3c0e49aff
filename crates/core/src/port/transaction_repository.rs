// Transaction Repository Port (Interface)

use crate::domain::{Transaction, TransactionId};
use crate::error::Result;
use async_trait::async_trait;

/// Durable store for transactions with optimistic-locked updates.
///
/// A transaction row's absence means the transaction completed; lookups after
/// completion report "not found", never an error.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Persist a new transaction; fails if the id already exists
    async fn create(&self, transaction: &Transaction) -> Result<()>;

    /// Find transaction by id
    async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Optimistic update: succeeds only if the stored version equals
    /// `transaction.version`. On success the store and the caller's copy both
    /// advance by exactly one version and `last_updated_at` is refreshed.
    async fn update(&self, transaction: &mut Transaction) -> Result<()>;

    /// Version-guarded delete. Deleting an absent row is idempotent; a row
    /// present under a different version signals a conflict so a concurrently
    /// re-driven transaction is never deleted out from under recovery.
    async fn delete(&self, transaction: &Transaction) -> Result<()>;

    /// Transactions whose `last_updated_at` precedes `older_than_ms` and
    /// whose retry count is below `max_retry_count`, oldest first.
    /// Used by the recovery sweep.
    async fn list_stale(
        &self,
        older_than_ms: i64,
        max_retry_count: i32,
    ) -> Result<Vec<Transaction>>;
}

// ============================================================================
// In-memory reference implementation (tests, embedded single-process use)
// ============================================================================

pub mod memory {
    use super::*;
    use crate::error::AppError;
    use crate::port::time_provider::TimeProvider;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    pub struct MemoryTransactionRepository {
        time_provider: Arc<dyn TimeProvider>,
        rows: Mutex<HashMap<TransactionId, Transaction>>,
    }

    impl MemoryTransactionRepository {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                time_provider,
                rows: Mutex::new(HashMap::new()),
            }
        }

        pub fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.rows.lock().unwrap().is_empty()
        }
    }

    #[async_trait]
    impl TransactionRepository for MemoryTransactionRepository {
        async fn create(&self, transaction: &Transaction) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&transaction.id) {
                return Err(AppError::DuplicateTransaction(transaction.id));
            }
            rows.insert(transaction.id, transaction.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>> {
            Ok(self.rows.lock().unwrap().get(&id).cloned())
        }

        async fn update(&self, transaction: &mut Transaction) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            let stored = rows
                .get(&transaction.id)
                .ok_or(AppError::NoSuchTransaction(transaction.id))?;

            if stored.version != transaction.version {
                return Err(AppError::VersionConflict {
                    id: transaction.id,
                    expected: transaction.version,
                });
            }

            transaction.version += 1;
            transaction.touch(self.time_provider.now_millis());
            rows.insert(transaction.id, transaction.clone());
            Ok(())
        }

        async fn delete(&self, transaction: &Transaction) -> Result<()> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&transaction.id) {
                None => Ok(()),
                Some(stored) if stored.version == transaction.version => {
                    rows.remove(&transaction.id);
                    Ok(())
                }
                Some(_) => Err(AppError::VersionConflict {
                    id: transaction.id,
                    expected: transaction.version,
                }),
            }
        }

        async fn list_stale(
            &self,
            older_than_ms: i64,
            max_retry_count: i32,
        ) -> Result<Vec<Transaction>> {
            let rows = self.rows.lock().unwrap();
            let mut stale: Vec<Transaction> = rows
                .values()
                .filter(|row| {
                    row.last_updated_at < older_than_ms && row.retry_count < max_retry_count
                })
                .cloned()
                .collect();
            stale.sort_by_key(|row| row.last_updated_at);
            Ok(stale)
        }
    }
}
