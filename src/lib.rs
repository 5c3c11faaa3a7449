//! Hireboard backend core: scope-aware edge caching, explicit-key
//! invalidation, a credit-gated unlock ledger with at-most-once charging,
//! and field-level access gating for recruiting contacts.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod gate;
pub mod infra;
pub mod ledger;
pub mod presentation;
