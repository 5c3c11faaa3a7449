//! Infrastructure adapters: telemetry, Postgres repositories, in-memory
//! repositories for tests and local runs.

pub mod db;
pub mod error;
pub mod memory;
pub mod telemetry;

pub use db::PostgresRepositories;
pub use error::InfraError;
pub use memory::{MemoryContactsRepo, MemoryLedgerStore};
