//! Auth seam.
//!
//! Token issuance and verification are external collaborators; this module
//! defines the claims shape the rest of the system consumes and a verifier
//! trait for the wiring layer. Resolved claims are inserted into request
//! extensions ahead of the cache middleware, which folds them into the
//! cache key scope.

use axum::http::HeaderMap;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::types::Role;

/// Claims extracted from a verified request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Option<Uuid>,
    pub role: Role,
    pub tenant_id: Option<Uuid>,
}

impl Claims {
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            role: Role::Anonymous,
            tenant_id: None,
        }
    }
}

impl Default for Claims {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed identity header `{header}`")]
    MalformedHeader { header: &'static str },
    #[error("authentication required")]
    Unauthenticated,
}

/// Verifies a request's identity material and produces claims.
pub trait AuthVerifier: Send + Sync {
    fn verify(&self, headers: &HeaderMap) -> Result<Claims, AuthError>;
}

/// Verifier for deployments where a fronting gateway has already performed
/// token verification and forwards the result as trusted headers.
///
/// Absent headers yield anonymous claims; present-but-malformed headers are
/// rejected rather than silently downgraded.
#[derive(Debug, Default, Clone)]
pub struct TrustedHeaderVerifier;

pub const ROLE_HEADER: &str = "x-hireboard-role";
pub const TENANT_HEADER: &str = "x-hireboard-tenant";
pub const USER_HEADER: &str = "x-hireboard-user";

impl AuthVerifier for TrustedHeaderVerifier {
    fn verify(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let role = match headers.get(ROLE_HEADER) {
            None => return Ok(Claims::anonymous()),
            Some(value) => match value.to_str().ok() {
                Some("anonymous") => Role::Anonymous,
                Some("member") => Role::Member,
                Some("company_admin") => Role::CompanyAdmin,
                Some("super_admin") => Role::SuperAdmin,
                _ => {
                    return Err(AuthError::MalformedHeader {
                        header: ROLE_HEADER,
                    });
                }
            },
        };

        let tenant_id = parse_uuid_header(headers, TENANT_HEADER)?;
        let user_id = parse_uuid_header(headers, USER_HEADER)?;

        Ok(Claims {
            user_id,
            role,
            tenant_id,
        })
    }
}

fn parse_uuid_header(
    headers: &HeaderMap,
    name: &'static str,
) -> Result<Option<Uuid>, AuthError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(Some)
            .ok_or(AuthError::MalformedHeader { header: name }),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn missing_headers_mean_anonymous() {
        let claims = TrustedHeaderVerifier.verify(&HeaderMap::new()).unwrap();
        assert_eq!(claims, Claims::anonymous());
    }

    #[test]
    fn company_admin_claims_carry_tenant() {
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let claims = TrustedHeaderVerifier
            .verify(&headers(&[
                (ROLE_HEADER, "company_admin"),
                (TENANT_HEADER, &tenant.to_string()),
                (USER_HEADER, &user.to_string()),
            ]))
            .unwrap();
        assert_eq!(claims.role, Role::CompanyAdmin);
        assert_eq!(claims.tenant_id, Some(tenant));
        assert_eq!(claims.user_id, Some(user));
    }

    #[test]
    fn malformed_role_is_rejected_not_downgraded() {
        let result = TrustedHeaderVerifier.verify(&headers(&[(ROLE_HEADER, "root")]));
        assert!(matches!(
            result,
            Err(AuthError::MalformedHeader { header }) if header == ROLE_HEADER
        ));
    }

    #[test]
    fn malformed_tenant_uuid_is_rejected() {
        let result = TrustedHeaderVerifier.verify(&headers(&[
            (ROLE_HEADER, "company_admin"),
            (TENANT_HEADER, "not-a-uuid"),
        ]));
        assert!(result.is_err());
    }
}
