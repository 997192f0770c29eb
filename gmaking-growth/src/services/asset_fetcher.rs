//! Source asset download
//!
//! Character image references are either absolute URLs or paths relative to
//! the game backend's origin.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::time::Duration;

use crate::error::GrowthError;

pub const DEFAULT_BASE_ORIGIN: &str = "http://localhost:8080";

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads the current character image for img2img input
pub struct AssetFetcher {
    http_client: reqwest::Client,
    base_origin: String,
}

impl AssetFetcher {
    pub fn new(base_origin: impl Into<String>) -> Result<Self, GrowthError> {
        let http_client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| GrowthError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_origin: base_origin.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_origin(&self) -> &str {
        &self.base_origin
    }

    /// Absolute URL for `reference`; origin-relative paths get the base origin
    pub fn resolve(&self, reference: &str) -> String {
        if reference.starts_with('/') {
            format!("{}{}", self.base_origin, reference)
        } else {
            reference.to_string()
        }
    }

    /// Download `reference` and return its bytes base64-encoded
    pub async fn fetch_base64(&self, reference: &str) -> Result<String, GrowthError> {
        let url = self.resolve(reference);
        tracing::debug!(url = %url, "Downloading source image");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GrowthError::AssetDownload(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GrowthError::AssetDownload(e.to_string()))?;

        tracing::debug!(url = %url, len = bytes.len(), "Source image downloaded");
        Ok(STANDARD.encode(&bytes))
    }
}
