// Recovery - re-drives stale transactions left behind by crashes or failures
//
// The sweep trigger (timer, cron, leader election) is external; this service
// performs one sweep when asked.

use crate::application::terminator::Terminator;
use crate::domain::{Transaction, TransactionContext, TransactionPhase, TransactionRole};
use crate::error::{AppError, Result};
use crate::port::{TimeProvider, TransactionRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Recovery sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Minimum age (ms since last update) before a row is considered stale
    pub recover_duration_ms: i64,
    /// Rows that reached this retry count are left alone (operator attention)
    pub max_retry_count: i32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            recover_duration_ms: 120_000,
            max_retry_count: 30,
        }
    }
}

/// Re-drives stale transactions through their pending phase.
///
/// Races safely with live completion attempts and with other recovery nodes:
/// every phase/retry persist is optimistic-locked, and a version conflict
/// just means someone else got there first.
pub struct RecoveryService {
    repository: Arc<dyn TransactionRepository>,
    terminator: Arc<Terminator>,
    time_provider: Arc<dyn TimeProvider>,
    config: RecoveryConfig,
}

impl RecoveryService {
    pub fn new(
        repository: Arc<dyn TransactionRepository>,
        terminator: Arc<Terminator>,
        time_provider: Arc<dyn TimeProvider>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            repository,
            terminator,
            time_provider,
            config,
        }
    }

    /// Perform one recovery sweep.
    ///
    /// Returns the number of transactions driven to completion. Rows that
    /// fail again stay durable for the next sweep with their retry count
    /// incremented.
    pub async fn recover_once(&self) -> Result<usize> {
        let cutoff = self.time_provider.now_millis() - self.config.recover_duration_ms;
        let stale = self
            .repository
            .list_stale(cutoff, self.config.max_retry_count)
            .await?;

        info!(
            candidates = stale.len(),
            cutoff = cutoff,
            "starting stale transaction recovery"
        );

        let mut recovered = 0;
        for mut transaction in stale {
            let id = transaction.id;
            match self.recover_single(&mut transaction).await {
                Ok(true) => recovered += 1,
                Ok(false) => {}
                Err(AppError::VersionConflict { .. }) => {
                    debug!(
                        transaction_id = %id,
                        "transaction updated concurrently, skipping"
                    );
                }
                Err(error) => {
                    warn!(
                        transaction_id = %id,
                        retry_count = transaction.retry_count,
                        error = %error,
                        "recovery attempt failed, row left for the next sweep"
                    );
                }
            }
        }

        info!(recovered = recovered, "stale transaction recovery complete");
        Ok(recovered)
    }

    async fn recover_single(&self, transaction: &mut Transaction) -> Result<bool> {
        match (transaction.phase(), transaction.role) {
            // a trying branch is completed by its root's cancel redelivery
            (TransactionPhase::Trying, TransactionRole::Branch) => Ok(false),
            (TransactionPhase::Confirming, _) => {
                transaction.add_retry();
                self.repository.update(transaction).await?;
                self.drive(transaction, TransactionPhase::Confirming).await?;
                self.repository.delete(transaction).await?;
                Ok(true)
            }
            // cancelling rows and trying roots (crashed or delay-cancelled)
            // are driven to cancel
            _ => {
                transaction.add_retry();
                transaction.enter_phase(TransactionPhase::Cancelling)?;
                self.repository.update(transaction).await?;
                self.drive(transaction, TransactionPhase::Cancelling).await?;
                self.repository.delete(transaction).await?;
                Ok(true)
            }
        }
    }

    async fn drive(&self, transaction: &Transaction, phase: TransactionPhase) -> Result<()> {
        for participant in &transaction.participants {
            let context = TransactionContext::new(transaction.id, phase);
            let invocation = match phase {
                TransactionPhase::Confirming => participant.confirm_invocation(),
                _ => participant.cancel_invocation(),
            };
            self.terminator
                .invoke(&context, invocation, participant.context_editor())
                .await?;
        }
        Ok(())
    }
}
