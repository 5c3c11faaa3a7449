//! HTTP surface: router assembly, identity resolution, and the contact
//! read/unlock handlers. The edge cache sits between identity resolution
//! and the handlers so every cached body is keyed under resolved claims.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use uuid::Uuid;

use crate::application::auth::AuthVerifier;
use crate::application::{AppError, Claims, UnlockService};
use crate::cache::{edge_cache_layer, CacheState};
use crate::infra::PostgresRepositories;

#[derive(Clone)]
pub struct AppState {
    pub unlock: Arc<UnlockService>,
    pub verifier: Arc<dyn AuthVerifier>,
    pub db: Option<PostgresRepositories>,
}

pub fn router(state: AppState, cache_state: CacheState) -> Router {
    Router::new()
        .route("/contacts/{id}", get(get_contact))
        .route("/contacts/{id}/unlock", post(unlock_contact))
        .layer(middleware::from_fn_with_state(
            cache_state,
            edge_cache_layer,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_claims,
        ))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Resolve identity material into claims before anything downstream runs.
/// Absent material is anonymous; malformed material is rejected here.
async fn resolve_claims(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state.verifier.verify(request.headers()) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

async fn get_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let view = state.unlock.view_contact(&claims, id).await?;
    Ok(Json(view).into_response())
}

async fn unlock_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let response = state.unlock.unlock_contact(&claims, id).await?;
    Ok(Json(response).into_response())
}

async fn healthz(State(state): State<AppState>) -> Response {
    if let Some(db) = &state.db {
        if let Err(err) = db.health_check().await {
            tracing::error!(error = %err, "health check failed");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unavailable").into_response();
        }
    }
    (StatusCode::OK, "ok").into_response()
}
