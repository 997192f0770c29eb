//! Service modules for the growth workflow
//!
//! - Image validation and PNG normalisation
//! - External generation job client (submit + poll)
//! - Source asset download
//! - Growth transaction coordinator

pub mod asset_fetcher;
pub mod growth_service;
pub mod horde_client;
pub mod image_generator;
pub mod image_validator;

pub use asset_fetcher::AssetFetcher;
pub use growth_service::GrowthService;
pub use horde_client::{HordeClient, HordeSettings, PollSettings};
pub use image_generator::ImageGenerator;
pub use image_validator::{detect_image_format, reencode_as_png, ImageFormat};
