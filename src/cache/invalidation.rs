//! Invalidation by explicit key reconstruction.
//!
//! The edge cache has no tag-based bulk invalidation, so correctness rests
//! on a statically declared fan-out table: for each entity kind, the finite
//! set of path templates whose cached views could contain it — its own
//! detail view, its collection list, and any denormalized parent/child
//! views. The table must grow whenever a new read view joins an entity.
//!
//! Invalidation runs synchronously after a successful mutation, before the
//! mutation's response is returned, but failures are logged and absorbed:
//! a mutation never fails because the cache was unreachable. Per-user keys
//! and unusual filter combinations are not enumerated here; that staleness
//! window is accepted and bounded by the s-maxage tier.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::keys::{CacheKeyDeriver, ScopeContext};
use super::store::TieredCacheStore;
use crate::domain::types::Role;

/// Cached-view-bearing entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Company,
    Job,
    Contact,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Job => "job",
            Self::Contact => "contact",
        }
    }
}

/// Relations the mutating handler already knows; used to reconstruct
/// parent and collection keys without extra lookups.
#[derive(Debug, Clone, Default)]
pub struct InvalidationHints {
    /// Owning tenant of the mutated entity.
    pub company_id: Option<Uuid>,
    /// Public slug, when the entity has a slug-addressed lookup view.
    pub slug: Option<String>,
}

impl InvalidationHints {
    pub fn for_company(company_id: Uuid) -> Self {
        Self {
            company_id: Some(company_id),
            slug: None,
        }
    }
}

/// The fan-out table: every path template whose cached body could contain
/// the mutated entity.
fn affected_paths(kind: EntityKind, id: Uuid, hints: &InvalidationHints) -> Vec<String> {
    let mut paths = Vec::new();
    match kind {
        EntityKind::Company => {
            paths.push(format!("/companies/{id}"));
            paths.push("/companies".to_string());
            if let Some(slug) = &hints.slug {
                paths.push(format!("/companies/slug/{slug}"));
            }
        }
        EntityKind::Job => {
            paths.push(format!("/jobs/{id}"));
            paths.push("/jobs".to_string());
            if let Some(company_id) = hints.company_id {
                // Parent's denormalized views embed job listings.
                paths.push(format!("/companies/{company_id}/jobs"));
                paths.push(format!("/companies/{company_id}"));
            }
        }
        EntityKind::Contact => {
            paths.push(format!("/contacts/{id}"));
            if let Some(company_id) = hints.company_id {
                paths.push(format!("/companies/{company_id}/contacts"));
                paths.push(format!("/companies/{company_id}"));
            }
        }
    }
    paths
}

/// Scopes under which each affected path may have been cached. Shared
/// scopes are enumerable; per-user keys are not and are left to expire.
fn affected_scopes(hints: &InvalidationHints) -> Vec<ScopeContext> {
    let mut scopes = vec![
        ScopeContext::new(Role::Anonymous, None),
        ScopeContext::new(Role::Member, None),
        ScopeContext::new(Role::SuperAdmin, None),
    ];
    if let Some(company_id) = hints.company_id {
        scopes.push(ScopeContext::new(Role::CompanyAdmin, Some(company_id)));
    }
    scopes
}

/// Deletes every shared cache entry a mutation could have made stale.
pub struct InvalidationCoordinator {
    store: Arc<TieredCacheStore>,
    deriver: CacheKeyDeriver,
}

impl InvalidationCoordinator {
    pub fn new(store: Arc<TieredCacheStore>) -> Self {
        Self {
            store,
            deriver: CacheKeyDeriver::new(),
        }
    }

    /// Expand the fan-out table for the mutated entity and delete each key.
    /// Best-effort: failures are counted and logged, never propagated.
    pub async fn invalidate(&self, kind: EntityKind, id: Uuid, hints: &InvalidationHints) {
        let mut deleted = 0usize;
        let mut failed = 0usize;

        for path in affected_paths(kind, id, hints) {
            // List views cache each query variant separately; deleting the
            // bare-path key covers the default view, the rest age out.
            for scope in affected_scopes(hints) {
                let key = match self.deriver.derive(&path, "", &scope) {
                    Ok(key) => key,
                    Err(err) => {
                        warn!(entity = kind.as_str(), %id, error = %err, "skipping underivable invalidation key");
                        failed += 1;
                        continue;
                    }
                };
                if self.store.delete(&key).await {
                    deleted += 1;
                }
            }
        }

        metrics::counter!("hireboard_cache_invalidations_total", "entity" => kind.as_str())
            .increment(1);
        if failed > 0 {
            warn!(
                entity = kind.as_str(),
                %id,
                deleted,
                failed,
                "invalidation completed partially"
            );
        } else {
            debug!(entity = kind.as_str(), %id, deleted, "invalidation completed");
        }
    }
}
