//! Contact read and unlock use cases.
//!
//! Composes the ledger, the access gate and the invalidation coordinator:
//! a successful unlock charges at most once, then synchronously clears the
//! cache entries the new unlock state could have made stale, then returns
//! the fully revealed view. Cache failures never fail the unlock.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::auth::{AuthError, Claims};
use super::error::AppError;
use super::repos::{ContactsRepo, LedgerStore};
use crate::cache::{
    CacheKeyDeriver, EntityKind, InvalidationCoordinator, InvalidationHints, ScopeContext,
    TieredCacheStore,
};
use crate::domain::contacts::ContactRecord;
use crate::domain::error::DomainError;
use crate::gate::{AccessGate, ContactView, UnlockState};
use crate::ledger::CreditLedger;

/// Wire response for a spend-and-reveal call.
#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub granted: bool,
    pub already_unlocked: bool,
    pub remaining_balance: i64,
    pub contact: ContactView,
}

pub struct UnlockService {
    contacts: Arc<dyn ContactsRepo>,
    ledger_store: Arc<dyn LedgerStore>,
    ledger: CreditLedger,
    gate: AccessGate,
    invalidation: Arc<InvalidationCoordinator>,
    cache: Arc<TieredCacheStore>,
    deriver: CacheKeyDeriver,
}

impl UnlockService {
    pub fn new(
        contacts: Arc<dyn ContactsRepo>,
        ledger_store: Arc<dyn LedgerStore>,
        invalidation: Arc<InvalidationCoordinator>,
        cache: Arc<TieredCacheStore>,
    ) -> Self {
        Self {
            contacts,
            ledger: CreditLedger::new(ledger_store.clone()),
            ledger_store,
            gate: AccessGate::new(),
            invalidation,
            cache,
            deriver: CacheKeyDeriver::new(),
        }
    }

    /// The requester's current view of a contact: full for unlockers and
    /// gating-exempt roles, masked otherwise.
    pub async fn view_contact(
        &self,
        claims: &Claims,
        contact_id: Uuid,
    ) -> Result<ContactView, AppError> {
        let contact = self.load(contact_id).await?;
        let state = self.unlock_state(claims, contact_id).await?;
        Ok(self.gate.view(&contact, claims.role, state))
    }

    /// Spend credits to unlock a contact for the requesting user.
    ///
    /// Idempotent at the ledger level; after a grant the shared fan-out
    /// and the requester's own per-user detail entry are invalidated
    /// before the response is returned.
    pub async fn unlock_contact(
        &self,
        claims: &Claims,
        contact_id: Uuid,
    ) -> Result<UnlockResponse, AppError> {
        let user_id = claims.user_id.ok_or(AuthError::Unauthenticated)?;
        let contact = self.load(contact_id).await?;

        let outcome = self
            .ledger
            .spend(user_id, contact_id, contact.unlock_cost)
            .await?;

        if outcome.granted {
            self.invalidation
                .invalidate(
                    EntityKind::Contact,
                    contact_id,
                    &InvalidationHints::for_company(contact.company_id),
                )
                .await;
            self.drop_per_user_view(claims, contact_id).await;
        }

        let view = self
            .gate
            .view(&contact, claims.role, UnlockState::Unlocked);
        Ok(UnlockResponse {
            granted: outcome.granted,
            already_unlocked: outcome.already_unlocked,
            remaining_balance: outcome.remaining_balance,
            contact: view,
        })
    }

    async fn load(&self, contact_id: Uuid) -> Result<ContactRecord, AppError> {
        self.contacts
            .find_by_id(contact_id)
            .await?
            .ok_or_else(|| DomainError::not_found("contact").into())
    }

    async fn unlock_state(
        &self,
        claims: &Claims,
        contact_id: Uuid,
    ) -> Result<UnlockState, AppError> {
        if claims.role.bypasses_gating() {
            return Ok(UnlockState::Unlocked);
        }
        let Some(user_id) = claims.user_id else {
            return Ok(UnlockState::Locked);
        };
        let record = self.ledger_store.find_unlock(user_id, contact_id).await?;
        Ok(UnlockState::from_record_presence(record.is_some()))
    }

    /// The fan-out table cannot enumerate per-user keys, but the unlocking
    /// user's own cached detail view is known exactly. Best-effort.
    async fn drop_per_user_view(&self, claims: &Claims, contact_id: Uuid) {
        let scope = ScopeContext::from_claims(claims);
        let path = format!("/contacts/{contact_id}");
        match self.deriver.derive_per_user(&path, "", &scope) {
            Ok(key) => {
                self.cache.delete(&key).await;
            }
            Err(err) => debug!(%contact_id, error = %err, "no per-user cache key to drop"),
        }
    }
}
