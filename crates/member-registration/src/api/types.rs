//! API request and response types.

use registry_store::MemberNumber;
use serde::{Deserialize, Serialize};

/// Signup form submission.
///
/// Missing fields deserialize as empty and are rejected by validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub identifier_a: String,

    #[serde(default)]
    pub identifier_b: String,
}

/// Response after a successful signup.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub status: String,
    pub member_number: MemberNumber,
}

/// Lookup query string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupParams {
    #[serde(default)]
    pub identifier_a: String,
}

/// Response for a lookup hit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub status: String,
    pub display_name: String,
    pub member_number: MemberNumber,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub member_count: u64,
}
