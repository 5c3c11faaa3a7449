//! Credit accounts and unlock records.
//!
//! The unlock record's composite identity (user, contact) carries the
//! at-most-once charging guarantee: the backing store enforces uniqueness
//! on the pair, and the ledger's compensation protocol leans on that
//! constraint instead of locks or transactions.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A user's spendable credit balance. Balance never goes negative; the
/// store rejects any decrement that would make it so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditAccount {
    pub user_id: Uuid,
    pub balance: i64,
}

/// Permanent record of a paid unlock. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockRecord {
    pub user_id: Uuid,
    pub contact_id: Uuid,
    pub credits_spent: i64,
    pub unlocked_at: OffsetDateTime,
}

impl UnlockRecord {
    pub fn new(user_id: Uuid, contact_id: Uuid, credits_spent: i64) -> Self {
        Self {
            user_id,
            contact_id,
            credits_spent,
            unlocked_at: OffsetDateTime::now_utc(),
        }
    }
}
