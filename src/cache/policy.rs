//! Per-endpoint cache policy tiers.
//!
//! Policies are declared by data volatility, not per route. The tier table
//! is intentionally small; a route either picks a tier or explicitly opts
//! out with [`CachePolicy::bypass`]. An opt-out is a policy decision, never
//! an accidental omission.

use std::time::Duration;

/// Freshness and visibility policy applied when storing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_age: Duration,
    pub s_max_age: Duration,
    pub stale_while_revalidate: Duration,
    pub is_public: bool,
    /// Responses varying on per-user unlock state must be keyed per user.
    pub per_user: bool,
    cacheable: bool,
}

impl CachePolicy {
    const fn tier(
        max_age: u64,
        s_max_age: u64,
        stale_while_revalidate: u64,
        is_public: bool,
    ) -> Self {
        Self {
            max_age: Duration::from_secs(max_age),
            s_max_age: Duration::from_secs(s_max_age),
            stale_while_revalidate: Duration::from_secs(stale_while_revalidate),
            is_public,
            per_user: false,
            cacheable: true,
        }
    }

    /// Public static lookups: tenant slugs, chip taxonomies.
    pub const fn public_static() -> Self {
        Self::tier(1800, 7200, 14400, true)
    }

    /// Public listings: job boards, company pages.
    pub const fn public_listing() -> Self {
        Self::tier(600, 1800, 3600, true)
    }

    /// Tenant-scoped admin lists: contacts, applicants.
    pub const fn admin_list() -> Self {
        Self::tier(300, 1800, 3600, false)
    }

    /// Low-volatility admin reference data: templates.
    pub const fn admin_reference() -> Self {
        Self::tier(600, 3600, 7200, false)
    }

    /// Explicit do-not-cache marker for routes that opt out.
    pub const fn bypass() -> Self {
        Self {
            max_age: Duration::ZERO,
            s_max_age: Duration::ZERO,
            stale_while_revalidate: Duration::ZERO,
            is_public: false,
            per_user: false,
            cacheable: false,
        }
    }

    pub const fn keyed_per_user(mut self) -> Self {
        self.per_user = true;
        // Per-user views are private by definition.
        self.is_public = false;
        self
    }

    pub const fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    /// Assemble the `Cache-Control` value advertised downstream. The
    /// stale-while-revalidate window is advertised here only; internally a
    /// stale entry is a miss.
    pub fn cache_control_header(&self) -> String {
        if !self.cacheable {
            return "no-store".to_string();
        }
        let visibility = if self.is_public { "public" } else { "private" };
        format!(
            "{visibility}, max-age={}, s-maxage={}, stale-while-revalidate={}",
            self.max_age.as_secs(),
            self.s_max_age.as_secs(),
            self.stale_while_revalidate.as_secs(),
        )
    }

    /// Window during which a stored entry is served.
    pub fn fresh_for(&self) -> Duration {
        self.max_age.max(self.s_max_age)
    }
}
