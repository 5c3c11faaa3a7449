//! Field-masking access gate.
//!
//! Produces the view of a contact a requester is entitled to. Masking is
//! pure and reapplied on every read; a masked view is never written back
//! to the record, and cached bodies carrying gated fields must be keyed
//! per user upstream.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::contacts::ContactRecord;
use crate::domain::types::Role;

/// Placeholder initials for an empty or whitespace-only name.
const EMPTY_NAME_PLACEHOLDER: &str = "NA";

/// Per-requester unlock state, resolved by the caller from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockState {
    Locked,
    Unlocked,
}

impl UnlockState {
    pub fn from_record_presence(present: bool) -> Self {
        if present {
            Self::Unlocked
        } else {
            Self::Locked
        }
    }
}

/// The wire view of a contact after gating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactView {
    pub id: Uuid,
    pub company_id: Uuid,
    /// Full name when unlocked, initials otherwise.
    pub full_name: String,
    pub title: String,
    pub location: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub unlock_cost: i64,
    pub is_unlocked: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AccessGate;

impl AccessGate {
    pub fn new() -> Self {
        Self
    }

    /// Derive the requester's view. Unlocked requesters (or roles that
    /// bypass gating) see every field; locked requesters see the always
    /// visible fields unchanged, initials in place of the name, and no
    /// contact methods.
    pub fn view(&self, contact: &ContactRecord, role: Role, state: UnlockState) -> ContactView {
        let unlocked = role.bypasses_gating() || state == UnlockState::Unlocked;
        if unlocked {
            return ContactView {
                id: contact.id,
                company_id: contact.company_id,
                full_name: contact.full_name.clone(),
                title: contact.title.clone(),
                location: contact.location.clone(),
                email: contact.email.clone(),
                phone: contact.phone.clone(),
                linkedin_url: contact.linkedin_url.clone(),
                unlock_cost: contact.unlock_cost,
                is_unlocked: true,
                created_at: contact.created_at,
                updated_at: contact.updated_at,
            };
        }

        ContactView {
            id: contact.id,
            company_id: contact.company_id,
            full_name: initials(&contact.full_name),
            title: contact.title.clone(),
            location: contact.location.clone(),
            email: None,
            phone: None,
            linkedin_url: None,
            unlock_cost: contact.unlock_cost,
            is_unlocked: false,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
        }
    }
}

/// Reduce a name to at most two uppercase initials. Empty or
/// whitespace-only input yields a fixed placeholder.
fn initials(name: &str) -> String {
    let reduced: String = name
        .split_whitespace()
        .filter_map(|token| token.chars().next())
        .flat_map(|c| c.to_uppercase())
        .take(2)
        .collect();
    if reduced.is_empty() {
        EMPTY_NAME_PLACEHOLDER.to_string()
    } else {
        reduced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact() -> ContactRecord {
        let now = OffsetDateTime::now_utc();
        ContactRecord {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            full_name: "Jane Doe".to_string(),
            title: "Staff Engineer".to_string(),
            location: Some("Berlin".to_string()),
            email: Some("jane@example.com".to_string()),
            phone: Some("+49 30 1234".to_string()),
            linkedin_url: Some("https://linkedin.com/in/janedoe".to_string()),
            unlock_cost: 2,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn locked_view_hides_every_gated_field() {
        let record = contact();
        let view = AccessGate::new().view(&record, Role::Member, UnlockState::Locked);

        assert_eq!(view.full_name, "JD");
        assert_eq!(view.email, None);
        assert_eq!(view.phone, None);
        assert_eq!(view.linkedin_url, None);
        assert!(!view.is_unlocked);
        // Always-visible fields pass through unchanged.
        assert_eq!(view.title, record.title);
        assert_eq!(view.location, record.location);
        assert_eq!(view.unlock_cost, record.unlock_cost);
    }

    #[test]
    fn unlocked_view_reveals_all_fields() {
        let record = contact();
        let view = AccessGate::new().view(&record, Role::Member, UnlockState::Unlocked);

        assert_eq!(view.full_name, "Jane Doe");
        assert_eq!(view.email, record.email);
        assert!(view.is_unlocked);
    }

    #[test]
    fn super_admin_bypasses_gating() {
        let record = contact();
        let view = AccessGate::new().view(&record, Role::SuperAdmin, UnlockState::Locked);
        assert_eq!(view.full_name, "Jane Doe");
        assert!(view.is_unlocked);
    }

    #[test]
    fn company_admin_does_not_bypass_gating() {
        let record = contact();
        let view = AccessGate::new().view(&record, Role::CompanyAdmin, UnlockState::Locked);
        assert_eq!(view.full_name, "JD");
        assert!(!view.is_unlocked);
    }

    #[test]
    fn initials_cap_at_two_characters() {
        assert_eq!(initials("Jane Doe"), "JD");
        assert_eq!(initials("Ada"), "A");
        assert_eq!(initials("jean claude van damme"), "JC");
        assert_eq!(initials("  spaced   out  "), "SO");
    }

    #[test]
    fn empty_name_uses_placeholder() {
        assert_eq!(initials(""), "NA");
        assert_eq!(initials("   "), "NA");
    }

    #[test]
    fn masking_does_not_mutate_the_record() {
        let record = contact();
        let before = record.clone();
        let _ = AccessGate::new().view(&record, Role::Member, UnlockState::Locked);
        assert_eq!(record, before);
    }
}
