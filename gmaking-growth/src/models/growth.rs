//! Growth endpoint request/response shapes

use serde::{Deserialize, Serialize};

use super::{StatIncrements, StatSet};

/// POST /api/v1/grow-character request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthRequest {
    pub user_id: String,
    pub character_id: i64,
    /// Modification-type token, e.g. `EVO_KEY_STAGE1`
    pub target_modification: String,
    /// Optional extra style text appended to the profile prompt
    #[serde(default)]
    pub style_prompt: Option<String>,
}

/// Generated image, always normalised to PNG
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub image_base64: String,
    pub image_format: String,
}

/// POST /api/v1/grow-character success body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrowthResponse {
    pub status: String,
    pub image_base64: String,
    pub image_format: String,

    pub user_id: String,
    pub character_id: i64,
    pub new_evolution_step: u32,
    /// Always 0: clears are reset by the evolution write
    pub total_stage_clear_count: u32,

    pub new_total_attack: f64,
    pub new_total_defense: f64,
    pub new_total_hp: f64,
    pub new_total_speed: f64,
    pub new_total_critical_rate: f64,

    pub increment_attack: u32,
    pub increment_defense: u32,
    pub increment_hp: u32,
    pub increment_speed: u32,
    pub increment_critical_rate: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GrowthResponse {
    pub fn success(
        user_id: &str,
        character_id: i64,
        new_evolution_step: u32,
        totals: &StatSet,
        increments: &StatIncrements,
        image: GeneratedImage,
    ) -> Self {
        Self {
            status: "success".to_string(),
            image_base64: image.image_base64,
            image_format: image.image_format,
            user_id: user_id.to_string(),
            character_id,
            new_evolution_step,
            total_stage_clear_count: 0,
            new_total_attack: totals.attack,
            new_total_defense: totals.defense,
            new_total_hp: totals.hp,
            new_total_speed: totals.speed,
            new_total_critical_rate: totals.critical_rate,
            increment_attack: increments.attack,
            increment_defense: increments.defense,
            increment_hp: increments.hp,
            increment_speed: increments.speed,
            increment_critical_rate: increments.critical_rate,
            message: None,
        }
    }
}
