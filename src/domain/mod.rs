//! Domain layer: entity records, roles, and domain errors.

pub mod contacts;
pub mod credits;
pub mod error;
pub mod types;
