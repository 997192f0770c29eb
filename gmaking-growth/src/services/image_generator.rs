//! Image generation seam used by the growth coordinator

use async_trait::async_trait;

use crate::error::GrowthError;
use crate::models::GeneratedImage;

/// Turns a source image into an evolved image
///
/// `HordeClient` is the production implementation; tests substitute stubs.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Run one img2img generation and return the normalised PNG result
    async fn generate(
        &self,
        prompt: &str,
        negative_prompt: &str,
        source_image_base64: &str,
    ) -> Result<GeneratedImage, GrowthError>;
}
