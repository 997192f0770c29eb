//! Error types for gmaking-growth
//!
//! `GrowthError` is the failure taxonomy of one growth transaction.
//! `ApiError` is what HTTP handlers return; every `GrowthError` maps onto
//! exactly one status class.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Which of the three persisted writes failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistStep {
    /// Overwrite of the five stat totals
    Stats,
    /// Evolution step advance, clear reset and image reference update
    Evolution,
    /// Growth history append
    History,
}

impl fmt::Display for PersistStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PersistStep::Stats => "Failed to update final character stats",
            PersistStep::Evolution => "Failed to update character evolution step and image",
            PersistStep::History => "Failed to record new growth data to history",
        };
        f.write_str(text)
    }
}

/// Growth transaction failure
#[derive(Debug, Error)]
pub enum GrowthError {
    #[error("{0}")]
    NotFound(String),

    #[error("Character is already at max evolution stage ({step}).")]
    MaxEvolutionStage { step: u32 },

    #[error(
        "Insufficient clear count. Requires {} to reach step {}, current is {}.",
        requirement_label(.required),
        .next_step,
        .current
    )]
    InsufficientClears {
        /// `None` when no growth is defined past the current step
        required: Option<u32>,
        current: u32,
        next_step: u32,
    },

    #[error("AI modification type '{0}' is invalid or not defined.")]
    InvalidModification(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Failed to download current image for AI processing: {0}")]
    AssetDownload(String),

    #[error("Horde API submission failed: {0}")]
    UpstreamSubmission(String),

    #[error("AI image generation timed out after {waited_secs}s (job {job_id}).")]
    UpstreamTimeout { job_id: String, waited_secs: u64 },

    #[error("Job ID not found: {0}")]
    JobNotFound(String),

    #[error("Horde API returned no image or generation failed: {0}")]
    UpstreamResult(String),

    #[error("Failed to download AI result from URL: {0}")]
    UpstreamDownload(String),

    #[error("Base64 decoding failed: {0}")]
    UpstreamDecode(String),

    #[error("Invalid image data received.")]
    InvalidImageData,

    #[error("Failed to process image data: {0}")]
    ImageProcessing(String),

    #[error("{0}.")]
    Persistence(PersistStep),

    #[error("Growth request cancelled: service is shutting down.")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Common(#[from] gmaking_common::Error),
}

fn requirement_label(required: &Option<u32>) -> String {
    match required {
        Some(count) => count.to_string(),
        None => "an undefined number of clears (no further growth)".to_string(),
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Upstream did not finish in time (504)
    #[error("Gateway timeout: {0}")]
    GatewayTimeout(String),

    /// Service shutting down (503)
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<GrowthError> for ApiError {
    fn from(err: GrowthError) -> Self {
        let message = err.to_string();
        match err {
            GrowthError::NotFound(_) => ApiError::NotFound(message),
            GrowthError::MaxEvolutionStage { .. }
            | GrowthError::InsufficientClears { .. }
            | GrowthError::InvalidModification(_)
            | GrowthError::InvalidInput(_) => ApiError::BadRequest(message),
            GrowthError::UpstreamTimeout { .. } => ApiError::GatewayTimeout(message),
            GrowthError::Cancelled => ApiError::Unavailable(message),
            GrowthError::AssetDownload(_)
            | GrowthError::UpstreamSubmission(_)
            | GrowthError::JobNotFound(_)
            | GrowthError::UpstreamResult(_)
            | GrowthError::UpstreamDownload(_)
            | GrowthError::UpstreamDecode(_)
            | GrowthError::InvalidImageData
            | GrowthError::ImageProcessing(_)
            | GrowthError::Persistence(_)
            | GrowthError::Internal(_)
            | GrowthError::Common(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::GatewayTimeout(msg) => {
                (StatusCode::GATEWAY_TIMEOUT, "GATEWAY_TIMEOUT", msg)
            }
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
