//! Response bodies for the HTTP API.

use island_core::JailRecord;
use serde::Serialize;

/// Body of `GET /api/v1/jails`.
#[derive(Debug, Serialize)]
pub struct JailsResponse {
    /// Running jails in host order.
    pub jails: Vec<JailRecord>,
}

/// Body of `GET /api/v1/jails/:id`.
#[derive(Debug, Serialize)]
pub struct DetailsResponse {
    /// The requested jail.
    pub details: JailRecord,
}

/// Body of `DELETE /api/v1/jails/:id`.
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    /// Id of the removed jail.
    pub deleted: u32,
}

/// Body of `DELETE /api/v1/jails`.
#[derive(Debug, Serialize)]
pub struct DeletedAllResponse {
    /// Ids of the removed jails, in listing order.
    pub deleted: Vec<u32>,
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Canonical reason phrase of the status code.
    pub error: String,
}
