//! Data models for gmaking-growth
//!
//! - Growth subjects (characters), stat sets and growth history records
//! - Modification profiles (prompt bundles per evolution stage)
//! - Growth rules (max step, clear requirements, increment range)
//! - Request/response shapes of the growth endpoint

pub mod character;
pub mod growth;
pub mod modification;
pub mod rules;

pub use character::{GrowthRecord, GrowthSubject, StatIncrements, StatSet};
pub use growth::{GeneratedImage, GrowthRequest, GrowthResponse};
pub use modification::{ModificationProfile, ModificationType};
pub use rules::GrowthRules;
