//! Use-case layer: auth seam, repository traits, error projection, and
//! the unlock service wiring ledger, gate and cache together.

pub mod auth;
pub mod error;
pub mod repos;
pub mod unlock;

pub use auth::{AuthVerifier, Claims, TrustedHeaderVerifier};
pub use error::AppError;
pub use repos::{ContactsRepo, LedgerStore, RepoError};
pub use unlock::{UnlockResponse, UnlockService};
