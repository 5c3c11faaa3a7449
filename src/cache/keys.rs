//! Cache key derivation.
//!
//! A key is derived deterministically from (path, sorted query parameters,
//! role, tenant scope). The derivation is injective with respect to the
//! authorization outcome: requests that could legitimately receive
//! different authorized bodies always derive different keys. Scope is
//! folded into the key string itself — the edge cache matches on key only,
//! never on request headers.

use std::borrow::Cow;

use thiserror::Error;
use uuid::Uuid;

use crate::application::auth::Claims;
use crate::domain::types::Role;

/// Key-format version; bump to orphan every previously written entry.
const KEY_VERSION: &str = "v1";

/// Marker used when tenant scoping does not apply to the request.
const TENANT_ALL: &str = "all";

/// A derived cache key for one authorized view of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authorization scope of a request, resolved before key derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeContext {
    pub role: Role,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl ScopeContext {
    pub fn new(role: Role, tenant_id: Option<Uuid>) -> Self {
        Self {
            role,
            tenant_id,
            user_id: None,
        }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            role: claims.role,
            tenant_id: claims.tenant_id,
            user_id: claims.user_id,
        }
    }

    fn tenant_component(&self) -> Result<Cow<'static, str>, ScopeError> {
        match (self.role.is_tenant_scoped(), self.tenant_id) {
            // Tenant-filtered role without a resolved tenant: refuse to
            // produce a key rather than cache under an ambiguous scope.
            (true, None) => Err(ScopeError::UnresolvedTenant { role: self.role }),
            (_, Some(tenant)) => Ok(Cow::Owned(tenant.to_string())),
            (false, None) => Ok(Cow::Borrowed(TENANT_ALL)),
        }
    }
}

/// Failure to resolve a cacheable scope. Always fail closed: the request
/// proceeds uncached.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("role `{role}` requires a tenant scope but none was resolved")]
    UnresolvedTenant { role: Role },
    #[error("per-user cache key requested without an authenticated user")]
    MissingUser,
}

/// Derives canonical, scope-safe cache keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheKeyDeriver;

impl CacheKeyDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Derive the shared-scope key for a request.
    ///
    /// Query parameters are sorted lexicographically (by name, then value)
    /// so reordered-but-equivalent queries hit the same entry.
    pub fn derive(
        &self,
        path: &str,
        raw_query: &str,
        scope: &ScopeContext,
    ) -> Result<CacheKey, ScopeError> {
        let tenant = scope.tenant_component()?;
        Ok(CacheKey(format!(
            "{KEY_VERSION}|{path}|q:{}|r:{}|t:{}",
            sorted_query(raw_query),
            scope.role.as_str(),
            tenant,
        )))
    }

    /// Derive a per-user key for responses that vary on per-user state
    /// (e.g. unlock-gated contact views). Role and tenant alone are not
    /// injective for these; the user id must be folded in.
    pub fn derive_per_user(
        &self,
        path: &str,
        raw_query: &str,
        scope: &ScopeContext,
    ) -> Result<CacheKey, ScopeError> {
        let user = scope.user_id.ok_or(ScopeError::MissingUser)?;
        let shared = self.derive(path, raw_query, scope)?;
        Ok(CacheKey(format!("{}|u:{user}", shared.0)))
    }
}

fn sorted_query(raw_query: &str) -> String {
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw_query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    let mut out = String::new();
    for (i, (k, v)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push('&');
        }
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deriver() -> CacheKeyDeriver {
        CacheKeyDeriver::new()
    }

    #[test]
    fn reordered_query_params_collapse_to_one_key() {
        let scope = ScopeContext::new(Role::Anonymous, None);
        let a = deriver().derive("/jobs", "page=2&remote=true", &scope).unwrap();
        let b = deriver().derive("/jobs", "remote=true&page=2", &scope).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_roles_never_share_a_key() {
        let anon = ScopeContext::new(Role::Anonymous, None);
        let member = ScopeContext::new(Role::Member, None);
        let a = deriver().derive("/jobs", "page=1", &anon).unwrap();
        let b = deriver().derive("/jobs", "page=1", &member).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn different_tenants_never_share_a_key() {
        let t1 = ScopeContext::new(Role::CompanyAdmin, Some(Uuid::new_v4()));
        let t2 = ScopeContext::new(Role::CompanyAdmin, Some(Uuid::new_v4()));
        let a = deriver().derive("/admin/contacts", "", &t1).unwrap();
        let b = deriver().derive("/admin/contacts", "", &t2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn untenanted_scope_uses_all_marker() {
        let scope = ScopeContext::new(Role::SuperAdmin, None);
        let key = deriver().derive("/companies", "", &scope).unwrap();
        assert!(key.as_str().ends_with("|t:all"));
    }

    #[test]
    fn tenant_scoped_role_without_tenant_fails_closed() {
        let scope = ScopeContext::new(Role::CompanyAdmin, None);
        let result = deriver().derive("/admin/contacts", "", &scope);
        assert_eq!(
            result,
            Err(ScopeError::UnresolvedTenant {
                role: Role::CompanyAdmin
            })
        );
    }

    #[test]
    fn per_user_key_requires_user_id() {
        let scope = ScopeContext::new(Role::Member, None);
        assert_eq!(
            deriver().derive_per_user("/contacts/abc", "", &scope),
            Err(ScopeError::MissingUser)
        );
    }

    #[test]
    fn per_user_keys_differ_between_users() {
        let mut s1 = ScopeContext::new(Role::Member, None);
        s1.user_id = Some(Uuid::new_v4());
        let mut s2 = ScopeContext::new(Role::Member, None);
        s2.user_id = Some(Uuid::new_v4());

        let a = deriver().derive_per_user("/contacts/abc", "", &s1).unwrap();
        let b = deriver().derive_per_user("/contacts/abc", "", &s2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn derivation_is_deterministic() {
        let scope = ScopeContext::new(Role::CompanyAdmin, Some(Uuid::nil()));
        let a = deriver().derive("/admin/jobs", "status=open", &scope).unwrap();
        let b = deriver().derive("/admin/jobs", "status=open", &scope).unwrap();
        assert_eq!(a, b);
    }
}
