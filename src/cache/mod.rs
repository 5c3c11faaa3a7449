//! Scope-aware edge response cache: key derivation, policy tiers, the
//! tiered store, invalidation fan-out, and the HTTP middleware seam.

pub mod config;
pub mod invalidation;
pub mod keys;
pub mod lock;
pub mod middleware;
pub mod policy;
pub mod store;

pub use config::CacheConfig;
pub use invalidation::{EntityKind, InvalidationCoordinator, InvalidationHints};
pub use keys::{CacheKey, CacheKeyDeriver, ScopeContext, ScopeError};
pub use middleware::{edge_cache_layer, policy_for_path, CacheState};
pub use policy::CachePolicy;
pub use store::{
    CacheEntry, CacheError, CacheStatus, EdgeCacheBackend, MemoryEdgeCache, TieredCacheStore,
};
