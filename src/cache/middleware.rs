//! Edge cache middleware.
//!
//! Sits in front of the read handlers: derives the scope-safe key, serves
//! fresh entries, and captures cacheable responses on the way out. Every
//! failure path degrades to the original uncached response.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_LENGTH};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::keys::{CacheKey, CacheKeyDeriver, ScopeContext};
use super::policy::CachePolicy;
use super::store::{CacheEntry, CacheStatus, TieredCacheStore, CACHE_STATUS_HEADER};
use crate::application::auth::Claims;

/// Responses larger than this are passed through uncached.
const MAX_CACHEABLE_BODY: usize = 2 * 1024 * 1024;

/// Shared cache handle injected into the router. Constructed once per
/// process and passed by reference; there is no process-global default.
#[derive(Clone)]
pub struct CacheState {
    pub store: Arc<TieredCacheStore>,
    pub enabled: bool,
    deriver: CacheKeyDeriver,
}

impl CacheState {
    pub fn new(store: Arc<TieredCacheStore>, enabled: bool) -> Self {
        Self {
            store,
            enabled,
            deriver: CacheKeyDeriver::new(),
        }
    }
}

/// Route the request path to its volatility tier. An endpoint missing from
/// this table is served uncached; opting out is always explicit.
pub fn policy_for_path(path: &str) -> CachePolicy {
    if path.starts_with("/companies/slug/") {
        return CachePolicy::public_static();
    }
    if path.starts_with("/admin/templates") {
        return CachePolicy::admin_reference();
    }
    if path.starts_with("/admin/") {
        return CachePolicy::admin_list();
    }
    // Unlock is a mutation surface even on GET probes.
    if path.ends_with("/unlock") {
        return CachePolicy::bypass();
    }
    // Contact detail bodies vary on per-user unlock state.
    if path.starts_with("/contacts/") {
        return CachePolicy::public_listing().keyed_per_user();
    }
    if path == "/jobs"
        || path.starts_with("/jobs/")
        || path == "/companies"
        || path.starts_with("/companies/")
    {
        return CachePolicy::public_listing();
    }
    CachePolicy::bypass()
}

pub async fn edge_cache_layer(
    State(state): State<CacheState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if !state.enabled || (method != Method::GET && method != Method::HEAD) {
        let mut response = next.run(request).await;
        set_header(&mut response, CACHE_CONTROL.as_str(), "no-store");
        return response;
    }

    let path = request.uri().path().to_string();
    let policy = policy_for_path(&path);
    if !policy.is_cacheable() {
        let mut response = next.run(request).await;
        set_header(&mut response, CACHE_CONTROL.as_str(), "no-store");
        return response;
    }

    let claims = request
        .extensions()
        .get::<Claims>()
        .cloned()
        .unwrap_or_default();
    let scope = ScopeContext::from_claims(&claims);
    let raw_query = request.uri().query().unwrap_or("").to_string();

    let key = match derive_key(&state.deriver, &path, &raw_query, &scope, &policy) {
        Ok(key) => key,
        Err(err) => {
            // Unresolved scope: serve uncached rather than risk caching
            // under an ambiguous key.
            debug!(%path, error = %err, "scope not cacheable, bypassing cache");
            let mut response = next.run(request).await;
            set_header(&mut response, CACHE_CONTROL.as_str(), "no-store");
            return response;
        }
    };

    if let Some(entry) = state.store.get(&key).await {
        metrics::counter!("hireboard_cache_requests_total", "status" => "hit").increment(1);
        return replay(entry, CacheStatus::Hit);
    }
    metrics::counter!("hireboard_cache_requests_total", "status" => "miss").increment(1);

    let response = next.run(request).await;
    capture(&state, key, response, &policy).await
}

fn derive_key(
    deriver: &CacheKeyDeriver,
    path: &str,
    raw_query: &str,
    scope: &ScopeContext,
    policy: &CachePolicy,
) -> Result<CacheKey, super::keys::ScopeError> {
    if policy.per_user {
        deriver.derive_per_user(path, raw_query, scope)
    } else {
        deriver.derive(path, raw_query, scope)
    }
}

/// Buffer and store a cacheable response, then replay it with the entry's
/// computed headers. Only 2xx responses are captured; anything else (or a
/// body we fail to buffer) passes through untouched.
async fn capture(
    state: &CacheState,
    key: CacheKey,
    response: Response,
    policy: &CachePolicy,
) -> Response {
    if !response.status().is_success() {
        let mut response = response;
        set_header(&mut response, CACHE_CONTROL.as_str(), "no-store");
        return response;
    }

    // A body known to exceed the cache limit is not worth buffering;
    // the response passes through untouched.
    let declared_len = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > MAX_CACHEABLE_BODY) {
        debug!(%key, len = declared_len.unwrap_or_default(), "response too large to cache");
        return response;
    }

    // Entries replay headers verbatim from a string representation; a
    // value that is not valid UTF-8 cannot round-trip, so the response is
    // served uncached rather than replayed with the header dropped.
    if response
        .headers()
        .iter()
        .any(|(_, value)| value.to_str().is_err())
    {
        debug!(%key, "opaque header bytes present, serving uncached");
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            // The upstream body stream itself failed; there is no intact
            // response left to serve.
            warn!(%key, error = %err, "failed to read response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if bytes.len() > MAX_CACHEABLE_BODY {
        debug!(%key, len = bytes.len(), "response too large to cache");
        return Response::from_parts(parts, Body::from(bytes));
    }

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let entry = state
        .store
        .put(key, bytes, parts.status.as_u16(), headers, policy)
        .await;
    replay(entry, CacheStatus::Miss)
}

/// Rebuild an HTTP response from a stored entry.
fn replay(entry: CacheEntry, status: CacheStatus) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::from_u16(entry.status).unwrap_or(StatusCode::OK));
    if let Some(headers) = builder.headers_mut() {
        for (name, value) in &entry.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(status.as_str()) {
            headers.insert(HeaderName::from_static(CACHE_STATUS_HEADER), value);
        }
    }
    builder
        .body(Body::from(entry.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn set_header(response: &mut Response, name: &'static str, value: &'static str) {
    response
        .headers_mut()
        .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lookups_use_the_static_tier() {
        let policy = policy_for_path("/companies/slug/acme");
        assert_eq!(policy, CachePolicy::public_static());
    }

    #[test]
    fn contact_detail_is_keyed_per_user() {
        let policy = policy_for_path("/contacts/4d0c7b2e");
        assert!(policy.per_user);
        assert!(!policy.is_public);
    }

    #[test]
    fn admin_routes_use_private_tiers() {
        assert_eq!(policy_for_path("/admin/contacts"), CachePolicy::admin_list());
        assert_eq!(
            policy_for_path("/admin/templates"),
            CachePolicy::admin_reference()
        );
    }

    #[test]
    fn unknown_routes_bypass_the_cache() {
        assert!(!policy_for_path("/healthz").is_cacheable());
        assert!(!policy_for_path("/contacts/4d0c7b2e/unlock").is_cacheable());
    }
}
