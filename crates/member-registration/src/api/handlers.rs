//! HTTP request handlers.

use super::types::{HealthResponse, LookupParams, LookupResponse, SignupRequest, SignupResponse};
use super::AppState;
use crate::error::RegistrationError;
use crate::service::SignupForm;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use tracing::{debug, info};

/// Health check endpoint.
pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, RegistrationError> {
    let member_count = state.service.member_count().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        member_count,
    }))
}

/// Submit a signup form.
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<SignupResponse>, RegistrationError> {
    let Json(request) = payload.map_err(|e| {
        debug!(error = %e, "Rejected signup body");
        RegistrationError::Validation(e.body_text())
    })?;

    info!(identifier_a = %request.identifier_a, "Signup request received");

    let member_number = state
        .service
        .signup(SignupForm {
            display_name: request.display_name,
            identifier_a: request.identifier_a,
            identifier_b: request.identifier_b,
        })
        .await?;

    Ok(Json(SignupResponse {
        status: "ok".to_string(),
        member_number,
    }))
}

/// Look up a member number by identifier A.
pub async fn lookup(
    State(state): State<AppState>,
    params: Result<Query<LookupParams>, QueryRejection>,
) -> Result<Json<LookupResponse>, RegistrationError> {
    let Query(params) = params.map_err(|e| RegistrationError::Validation(e.body_text()))?;

    let summary = state.service.lookup(&params.identifier_a).await?;

    Ok(Json(LookupResponse {
        status: "ok".to_string(),
        display_name: summary.display_name,
        member_number: summary.member_number,
    }))
}
