//! Ledger store on Postgres.
//!
//! No transactions: each statement stands alone. The conditional debit is
//! a single guarded UPDATE so the balance check and the decrement cannot
//! be split by a concurrent writer, and the unlock insert relies on the
//! composite primary key to surface the duplicate the ledger compensates
//! on.

use async_trait::async_trait;
use sqlx::{query, query_as};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{map_sqlx_error, PostgresRepositories};
use crate::application::repos::{LedgerStore, RepoError};
use crate::domain::credits::UnlockRecord;

#[derive(sqlx::FromRow)]
struct UnlockRow {
    user_id: Uuid,
    contact_id: Uuid,
    credits_spent: i64,
    unlocked_at: OffsetDateTime,
}

impl From<UnlockRow> for UnlockRecord {
    fn from(row: UnlockRow) -> Self {
        Self {
            user_id: row.user_id,
            contact_id: row.contact_id,
            credits_spent: row.credits_spent,
            unlocked_at: row.unlocked_at,
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresRepositories {
    async fn find_unlock(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> Result<Option<UnlockRecord>, RepoError> {
        let row: Option<UnlockRow> = query_as(
            "SELECT user_id, contact_id, credits_spent, unlocked_at \
             FROM contact_unlocks WHERE user_id = $1 AND contact_id = $2",
        )
        .bind(user_id)
        .bind(contact_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Into::into))
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, RepoError> {
        let balance: Option<(i64,)> =
            query_as("SELECT balance FROM credit_accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;
        // Absent account reads as an empty balance.
        Ok(balance.map(|(b,)| b).unwrap_or(0))
    }

    async fn debit(&self, user_id: Uuid, amount: i64) -> Result<Option<i64>, RepoError> {
        let updated: Option<(i64,)> = query_as(
            "UPDATE credit_accounts SET balance = balance - $2 \
             WHERE user_id = $1 AND balance >= $2 RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(updated.map(|(b,)| b))
    }

    async fn credit(&self, user_id: Uuid, amount: i64) -> Result<i64, RepoError> {
        let (balance,): (i64,) = query_as(
            "INSERT INTO credit_accounts (user_id, balance) VALUES ($1, $2) \
             ON CONFLICT (user_id) \
             DO UPDATE SET balance = credit_accounts.balance + EXCLUDED.balance \
             RETURNING balance",
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(balance)
    }

    async fn insert_unlock(&self, record: UnlockRecord) -> Result<(), RepoError> {
        query(
            "INSERT INTO contact_unlocks (user_id, contact_id, credits_spent, unlocked_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(record.user_id)
        .bind(record.contact_id)
        .bind(record.credits_spent)
        .bind(record.unlocked_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
