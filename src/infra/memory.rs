//! In-memory repository implementations.
//!
//! Used by tests and by local runs without a database. The ledger store
//! honors the same contract as Postgres: the conditional debit is atomic
//! under the map lock, and the unlock insert surfaces a duplicate pair as
//! [`RepoError::Duplicate`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::repos::{ContactsRepo, LedgerStore, RepoError};
use crate::cache::lock;
use crate::domain::contacts::ContactRecord;
use crate::domain::credits::UnlockRecord;

#[derive(Default)]
pub struct MemoryLedgerStore {
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Uuid, i64>,
    unlocks: HashMap<(Uuid, Uuid), UnlockRecord>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(user_id: Uuid, balance: i64) -> Self {
        let store = Self::default();
        {
            let mut state = lock::acquire(&store.state);
            state.balances.insert(user_id, balance);
        }
        store
    }

    pub fn grant(&self, user_id: Uuid, amount: i64) {
        let mut state = lock::acquire(&self.state);
        *state.balances.entry(user_id).or_insert(0) += amount;
    }

    pub fn unlock_count(&self) -> usize {
        lock::acquire(&self.state).unlocks.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn find_unlock(
        &self,
        user_id: Uuid,
        contact_id: Uuid,
    ) -> Result<Option<UnlockRecord>, RepoError> {
        let state = lock::acquire(&self.state);
        Ok(state.unlocks.get(&(user_id, contact_id)).cloned())
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64, RepoError> {
        let state = lock::acquire(&self.state);
        Ok(state.balances.get(&user_id).copied().unwrap_or(0))
    }

    async fn debit(&self, user_id: Uuid, amount: i64) -> Result<Option<i64>, RepoError> {
        let mut state = lock::acquire(&self.state);
        let balance = state.balances.entry(user_id).or_insert(0);
        if *balance < amount {
            return Ok(None);
        }
        *balance -= amount;
        Ok(Some(*balance))
    }

    async fn credit(&self, user_id: Uuid, amount: i64) -> Result<i64, RepoError> {
        let mut state = lock::acquire(&self.state);
        let balance = state.balances.entry(user_id).or_insert(0);
        *balance += amount;
        Ok(*balance)
    }

    async fn insert_unlock(&self, record: UnlockRecord) -> Result<(), RepoError> {
        let mut state = lock::acquire(&self.state);
        let pair = (record.user_id, record.contact_id);
        if state.unlocks.contains_key(&pair) {
            return Err(RepoError::Duplicate {
                constraint: "contact_unlocks_pkey".to_string(),
            });
        }
        state.unlocks.insert(pair, record);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryContactsRepo {
    contacts: Mutex<HashMap<Uuid, ContactRecord>>,
}

impl MemoryContactsRepo {
    pub fn with_contacts(records: Vec<ContactRecord>) -> Self {
        let repo = Self::default();
        {
            let mut contacts = lock::acquire(&repo.contacts);
            for record in records {
                contacts.insert(record.id, record);
            }
        }
        repo
    }
}

#[async_trait]
impl ContactsRepo for MemoryContactsRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ContactRecord>, RepoError> {
        let contacts = lock::acquire(&self.contacts);
        Ok(contacts.get(&id).cloned())
    }
}
