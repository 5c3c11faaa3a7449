//! Concurrency tests for the credit ledger's at-most-once charging.

use std::sync::Arc;

use async_trait::async_trait;
use hireboard::application::repos::{LedgerStore, RepoError};
use hireboard::domain::credits::UnlockRecord;
use hireboard::infra::MemoryLedgerStore;
use hireboard::ledger::{CreditLedger, LedgerError};
use tokio::sync::{Barrier, Notify};
use uuid::Uuid;

/// Holds every spend call at the existing-unlock check until all
/// participants have arrived, forcing the check-before-commit race window
/// deterministically: both calls see "not unlocked", both debit, and the
/// insert constraint decides the winner.
struct RaceWindowStore {
    inner: MemoryLedgerStore,
    checkpoint: Barrier,
}

#[async_trait]
impl LedgerStore for RaceWindowStore {
    async fn find_unlock(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> Result<Option<UnlockRecord>, RepoError> {
        let found = self.inner.find_unlock(user_id, contact_id).await?;
        self.checkpoint.wait().await;
        Ok(found)
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, RepoError> {
        self.inner.balance(user_id).await
    }

    async fn debit(&self, user_id: Uuid, amount: i64) -> Result<Option<i64>, RepoError> {
        self.inner.debit(user_id, amount).await
    }

    async fn credit(&self, user_id: Uuid, amount: i64) -> Result<i64, RepoError> {
        self.inner.credit(user_id, amount).await
    }

    async fn insert_unlock(&self, record: UnlockRecord) -> Result<(), RepoError> {
        self.inner.insert_unlock(record).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_spends_charge_exactly_once() {
    let user = Uuid::new_v4();
    let contact = Uuid::new_v4();
    let store = Arc::new(RaceWindowStore {
        inner: MemoryLedgerStore::with_balance(user, 5),
        checkpoint: Barrier::new(2),
    });
    let ledger = Arc::new(CreditLedger::new(store.clone()));

    let a = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.spend(user, contact, 2).await }
    });
    let b = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.spend(user, contact, 2).await }
    });

    let first = a.await.unwrap().unwrap();
    let second = b.await.unwrap().unwrap();

    // Exactly one call performed the charge; the loser of the insert race
    // was compensated.
    assert_eq!(
        [first.granted, second.granted].iter().filter(|g| **g).count(),
        1
    );
    assert_eq!(
        [first.already_unlocked, second.already_unlocked]
            .iter()
            .filter(|a| **a)
            .count(),
        1
    );
    assert_eq!(store.inner.balance(user).await.unwrap(), 3);
    assert_eq!(store.inner.unlock_count(), 1);
}

/// Delays the second caller's existing-unlock check until the first
/// caller has committed, so the idempotency check itself resolves the
/// race: no double debit, no compensation needed.
struct SequencedStore {
    inner: MemoryLedgerStore,
    committed: Notify,
    first_check_taken: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl LedgerStore for SequencedStore {
    async fn find_unlock(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> Result<Option<UnlockRecord>, RepoError> {
        use std::sync::atomic::Ordering;
        if self.first_check_taken.swap(true, Ordering::SeqCst) {
            self.committed.notified().await;
        }
        self.inner.find_unlock(user_id, contact_id).await
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, RepoError> {
        self.inner.balance(user_id).await
    }

    async fn debit(&self, user_id: Uuid, amount: i64) -> Result<Option<i64>, RepoError> {
        self.inner.debit(user_id, amount).await
    }

    async fn credit(&self, user_id: Uuid, amount: i64) -> Result<i64, RepoError> {
        self.inner.credit(user_id, amount).await
    }

    async fn insert_unlock(&self, record: UnlockRecord) -> Result<(), RepoError> {
        let result = self.inner.insert_unlock(record).await;
        self.committed.notify_one();
        result
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn race_on_a_single_credit_grants_once_and_reports_already_unlocked() {
    let user = Uuid::new_v4();
    let contact = Uuid::new_v4();
    let store = Arc::new(SequencedStore {
        inner: MemoryLedgerStore::with_balance(user, 1),
        committed: Notify::new(),
        first_check_taken: std::sync::atomic::AtomicBool::new(false),
    });
    let ledger = Arc::new(CreditLedger::new(store.clone()));

    let winner = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.spend(user, contact, 1).await }
    });
    let loser = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.spend(user, contact, 1).await }
    });

    let outcomes = [
        winner.await.unwrap().unwrap(),
        loser.await.unwrap().unwrap(),
    ];

    let granted: Vec<_> = outcomes.iter().filter(|o| o.granted).collect();
    let repeated: Vec<_> = outcomes.iter().filter(|o| o.already_unlocked).collect();
    assert_eq!(granted.len(), 1);
    assert_eq!(repeated.len(), 1);
    assert_eq!(granted[0].remaining_balance, 0);
    assert_eq!(repeated[0].remaining_balance, 0);
    assert_eq!(store.inner.balance(user).await.unwrap(), 0);
    assert_eq!(store.inner.unlock_count(), 1);
}

#[tokio::test]
async fn insufficient_balance_is_side_effect_free() {
    let user = Uuid::new_v4();
    let contact = Uuid::new_v4();
    let store = Arc::new(MemoryLedgerStore::with_balance(user, 1));
    let ledger = CreditLedger::new(store.clone());

    let err = ledger.spend(user, contact, 3).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientCredits {
            balance: 1,
            required: 3
        }
    ));
    assert_eq!(store.balance(user).await.unwrap(), 1);
    assert_eq!(store.unlock_count(), 0);
}

#[tokio::test]
async fn repeated_sequential_spends_never_stack_charges() {
    let user = Uuid::new_v4();
    let contact = Uuid::new_v4();
    let store = Arc::new(MemoryLedgerStore::with_balance(user, 10));
    let ledger = CreditLedger::new(store.clone());

    let first = ledger.spend(user, contact, 4).await.unwrap();
    assert!(first.granted);

    for _ in 0..5 {
        let again = ledger.spend(user, contact, 4).await.unwrap();
        assert!(again.already_unlocked);
        assert_eq!(again.remaining_balance, 6);
    }
    assert_eq!(store.balance(user).await.unwrap(), 6);
    assert_eq!(store.unlock_count(), 1);
}
