//! Credit ledger: idempotent spend-and-record without transactions.
//!
//! The backing store offers prepared statements and unique constraints,
//! not multi-statement transactions. At-most-once charging is therefore
//! anchored on the unlock record's (user, contact) uniqueness constraint:
//! the balance decrement is provisional and revocable, the insert is the
//! commit point, and a constraint conflict triggers compensation.
//!
//! Ordering is load-bearing: check, reserve by decrement, commit by
//! insert, compensate on conflict. Reordering changes the compensation
//! logic required and must not be done casually.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::repos::{LedgerStore, RepoError};
use crate::domain::credits::UnlockRecord;

/// Result of a successful or idempotent spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockOutcome {
    /// True when this call performed the charge.
    pub granted: bool,
    /// True when the unlock already existed and nothing was charged.
    pub already_unlocked: bool,
    pub remaining_balance: i64,
}

impl UnlockOutcome {
    fn granted(remaining_balance: i64) -> Self {
        Self {
            granted: true,
            already_unlocked: false,
            remaining_balance,
        }
    }

    fn already_unlocked(remaining_balance: i64) -> Self {
        Self {
            granted: false,
            already_unlocked: true,
            remaining_balance,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Balance does not cover the cost. No state was changed.
    #[error("insufficient credits: balance {balance}, required {required}")]
    InsufficientCredits { balance: i64, required: i64 },
    /// Compensation after a lost insert race could not be completed. The
    /// account may be under-credited until reconciled.
    #[error("ledger conflict for user {user_id} on contact {contact_id}: compensation failed")]
    Conflict { user_id: Uuid, contact_id: Uuid },
    #[error("invalid unlock cost {cost}")]
    InvalidCost { cost: i64 },
    /// Store failure, surfaced precisely. Timeouts are reported as failed
    /// unlocks, never silently treated as granted; retries are safe
    /// because the existing-unlock check makes them non-destructive.
    #[error(transparent)]
    Store(#[from] RepoError),
}

pub struct CreditLedger {
    store: Arc<dyn LedgerStore>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Spend `cost` credits to unlock `contact_id` for `user_id`.
    ///
    /// Idempotent: repeated calls for an already-unlocked contact return
    /// `already_unlocked` without touching the balance. Two concurrent
    /// calls produce exactly one unlock record and one net deduction; the
    /// loser of the insert race re-credits its provisional decrement.
    pub async fn spend(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
        cost: i64,
    ) -> Result<UnlockOutcome, LedgerError> {
        let started = std::time::Instant::now();
        let result = self.spend_inner(user_id, contact_id, cost).await;
        metrics::histogram!("hireboard_unlock_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn spend_inner(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
        cost: i64,
    ) -> Result<UnlockOutcome, LedgerError> {
        if cost < 1 {
            return Err(LedgerError::InvalidCost { cost });
        }

        if self.store.find_unlock(user_id, contact_id).await?.is_some() {
            let balance = self.store.balance(user_id).await?;
            metrics::counter!("hireboard_unlocks_total", "outcome" => "already_unlocked")
                .increment(1);
            return Ok(UnlockOutcome::already_unlocked(balance));
        }

        // Reserve: conditional decrement, rejected atomically when the
        // balance does not cover the cost.
        let Some(remaining) = self.store.debit(user_id, cost).await? else {
            let balance = self.store.balance(user_id).await?;
            metrics::counter!("hireboard_unlocks_total", "outcome" => "insufficient")
                .increment(1);
            return Err(LedgerError::InsufficientCredits {
                balance,
                required: cost,
            });
        };

        // Commit: the uniqueness constraint is the single source of
        // "exactly one charge".
        match self
            .store
            .insert_unlock(UnlockRecord::new(user_id, contact_id, cost))
            .await
        {
            Ok(()) => {
                info!(%user_id, %contact_id, cost, remaining, "contact unlocked");
                metrics::counter!("hireboard_unlocks_total", "outcome" => "granted").increment(1);
                metrics::counter!("hireboard_credits_spent_total").increment(cost as u64);
                Ok(UnlockOutcome::granted(remaining))
            }
            Err(err) if err.is_duplicate() => {
                // Lost the race between check and insert: a concurrent
                // call committed first. Revoke this call's decrement.
                self.compensate(user_id, contact_id, cost).await?;
                let balance = self.store.balance(user_id).await?;
                metrics::counter!("hireboard_unlocks_total", "outcome" => "already_unlocked")
                    .increment(1);
                Ok(UnlockOutcome::already_unlocked(balance))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Re-credit a provisional decrement whose commit lost the insert
    /// race. Retried once; a second failure surfaces as a conflict so the
    /// account can be reconciled out of band.
    async fn compensate(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
        cost: i64,
    ) -> Result<(), LedgerError> {
        for attempt in 1..=2u8 {
            match self.store.credit(user_id, cost).await {
                Ok(balance) => {
                    info!(%user_id, %contact_id, cost, balance, "compensated lost unlock race");
                    metrics::counter!("hireboard_ledger_compensations_total").increment(1);
                    return Ok(());
                }
                Err(err) => {
                    warn!(%user_id, %contact_id, attempt, error = %err, "compensation credit failed");
                }
            }
        }
        metrics::counter!("hireboard_ledger_conflicts_total").increment(1);
        Err(LedgerError::Conflict {
            user_id,
            contact_id,
        })
    }
}
