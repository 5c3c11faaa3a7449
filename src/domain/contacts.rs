//! Contact records and their field-visibility policy.
//!
//! A contact's fields are partitioned into always-visible fields and gated
//! fields. Gated fields are only revealed to a requester who has unlocked
//! the contact (or holds a role that bypasses gating). The record itself is
//! never mutated by gating; the access gate produces a derived view.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A sourced recruiting contact, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactRecord {
    pub id: Uuid,
    /// Owning tenant.
    pub company_id: Uuid,
    /// Gated: reduced to initials when locked.
    pub full_name: String,
    /// Always visible.
    pub title: String,
    /// Always visible.
    pub location: Option<String>,
    /// Gated: absent when locked.
    pub email: Option<String>,
    /// Gated: absent when locked.
    pub phone: Option<String>,
    /// Gated: absent when locked.
    pub linkedin_url: Option<String>,
    /// Credits required to unlock this contact.
    pub unlock_cost: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
