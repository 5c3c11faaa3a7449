//! Repository traits describing persistence adapters.
//!
//! The ledger store deliberately exposes primitive operations (conditional
//! debit, credit, insert-under-constraint) rather than a transactional
//! "spend" — the backing store offers no multi-statement transactions, so
//! the ledger composes these primitives with a compensation protocol.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::contacts::ContactRecord;
use crate::domain::credits::UnlockRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// True when the error is the distinguishable unique-constraint
    /// conflict the ledger's compensation path keys off.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Backing store for credit balances and unlock records.
///
/// Implementations must guarantee:
/// - `debit` is atomic and conditional: it only succeeds when the current
///   balance covers the amount, and returns the post-debit balance.
/// - `insert_unlock` enforces uniqueness on (user, contact) and surfaces a
///   violation as [`RepoError::Duplicate`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_unlock(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> Result<Option<UnlockRecord>, RepoError>;

    async fn balance(&self, user_id: Uuid) -> Result<i64, RepoError>;

    /// Conditionally decrement the balance by `amount`. Returns the new
    /// balance, or `None` when the balance does not cover the amount (no
    /// write performed).
    async fn debit(&self, user_id: Uuid, amount: i64) -> Result<Option<i64>, RepoError>;

    /// Increment the balance by `amount`, returning the new balance. Used
    /// only by the ledger's compensation path.
    async fn credit(&self, user_id: Uuid, amount: i64) -> Result<i64, RepoError>;

    async fn insert_unlock(&self, record: UnlockRecord) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ContactsRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContactRecord>, RepoError>;
}
