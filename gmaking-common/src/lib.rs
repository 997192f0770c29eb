//! # gmaking Common Library
//!
//! Shared code for the gmaking backend services:
//! - Common error type
//! - Configuration file resolution and TOML loading
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
