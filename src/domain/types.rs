//! Shared domain types.

use serde::{Deserialize, Serialize};

/// Effective role of a requester, resolved by the auth collaborator.
///
/// The role is part of every cache key: two requests that differ only in
/// role must never share a cached response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unauthenticated visitor.
    Anonymous,
    /// Authenticated candidate/member.
    Member,
    /// Administrator of a single tenant (company).
    CompanyAdmin,
    /// Platform operator; sees unfiltered data and bypasses field gating.
    SuperAdmin,
}

impl Role {
    /// Stable string form folded into cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Member => "member",
            Self::CompanyAdmin => "company_admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Whether this role's views are filtered to a single tenant.
    ///
    /// A tenant-filtered role without a resolved tenant id must never
    /// produce a cacheable key.
    pub fn is_tenant_scoped(&self) -> bool {
        matches!(self, Self::CompanyAdmin)
    }

    /// Whether this role sees gated contact fields without an unlock.
    pub fn bypasses_gating(&self) -> bool {
        matches!(self, Self::SuperAdmin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_strings_are_stable() {
        assert_eq!(Role::Anonymous.as_str(), "anonymous");
        assert_eq!(Role::Member.as_str(), "member");
        assert_eq!(Role::CompanyAdmin.as_str(), "company_admin");
        assert_eq!(Role::SuperAdmin.as_str(), "super_admin");
    }

    #[test]
    fn only_company_admin_is_tenant_scoped() {
        assert!(Role::CompanyAdmin.is_tenant_scoped());
        assert!(!Role::Anonymous.is_tenant_scoped());
        assert!(!Role::Member.is_tenant_scoped());
        assert!(!Role::SuperAdmin.is_tenant_scoped());
    }

    #[test]
    fn only_super_admin_bypasses_gating() {
        assert!(Role::SuperAdmin.bypasses_gating());
        assert!(!Role::CompanyAdmin.bypasses_gating());
    }
}
