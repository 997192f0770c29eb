//! Modification profiles: the prompt bundle used for each evolution stage
//!
//! Tokens are a closed set shared with the game backend. Every token maps to
//! exactly one profile; `validate_catalog` is run at startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GrowthError;

/// Modification-type token sent by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModificationType {
    #[serde(rename = "EVO_KEY_STAGE1")]
    Stage1,
    #[serde(rename = "EVO_KEY_STAGE2")]
    Stage2,
    #[serde(rename = "EVO_KEY_STAGE3")]
    Stage3,
    #[serde(rename = "EVO_KEY_FINAL")]
    Final,
}

/// Prompt bundle for one visual transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModificationProfile {
    pub prompt: &'static str,
    pub negative_prompt: &'static str,
    pub output_suffix: &'static str,
}

const STAGE1: ModificationProfile = ModificationProfile {
    prompt: "A pixel-art fantasy RPG style character, keeping the same creature's **species**, **color palette**, \
             and overall **face structure** \
             from the input image. The character is now equipped with **basic, functional armor** and a **simple, functional weapon**. \
             The **pose** is that of a newly established warrior, confident and ready for adventure. \
             Centered composition, 1024x1024, with a **clean white background**.",
    negative_prompt: "different creature, new design, photorealistic, extra limbs, human-like form, blurry, multiple characters, \
                      text, watermark, colored background, change in species or face, oversized weapon, overly ornate",
    output_suffix: "stage_1_warrior.png",
};

const STAGE2: ModificationProfile = ModificationProfile {
    prompt: "Evolve the same pixel-art character. **Maintain its species**, color scheme, and face structure. \
             The character's **armor is clearly upgraded** to a stronger, more protective version (e.g., plate mail). \
             Its **current weapon is enhanced** to be larger, more detailed, and more refined. \
             The character adopts a **heroic, dynamic battle pose**, showing greater strength and readiness. \
             Centered composition, 1024x1024, with a **clean white background**.",
    negative_prompt: "different species, redesign, human-like, photorealistic, messy background, multiple creatures, \
                      text, watermark, colored background, change in species or face, drastically different weapon type",
    output_suffix: "stage_2_hero.png",
};

const STAGE3: ModificationProfile = ModificationProfile {
    prompt: "Evolve the same character into a seasoned knight-like figure. **Keep the same animal species**, color scheme, \
             and body structure. \
             The **armor is now full, gleaming, and highly ornate**, possibly featuring an emblem or a **cape**. \
             The **weapon is grander and more powerful**, possibly with **subtle magical effects** like glowing runes. \
             The character stands in a **proud, commanding, or charging stance**. \
             Centered composition, 1024x1024, with a **clean white background**.",
    negative_prompt: "different animal, new body design, photorealistic, extra limbs, human face, text, blur, 3D rendering, \
                      colored background, change in species or face, simple armor, rusty weapon",
    output_suffix: "stage_3_knight.png",
};

const FINAL: ModificationProfile = ModificationProfile {
    prompt: "Depict the same character in its ultimate, legendary evolved form. **Maintain the same face, proportions, \
             and species identity** as the input image. \
             The **weapon and armor are mythical and indestructible**, with **exquisite, magical details** and powerful auras. \
             The character's **pose** conveys supreme power, wisdom, and victory. \
             Centered composition, 1024x1024, with a **clean white background**.",
    negative_prompt: "different creature, new species, human-like, photorealistic, distorted, blur, text, watermark, colored background, \
                      change in species or face, weak equipment, no armor",
    output_suffix: "stage_4_legend.png",
};

impl ModificationType {
    pub const ALL: [ModificationType; 4] = [
        ModificationType::Stage1,
        ModificationType::Stage2,
        ModificationType::Stage3,
        ModificationType::Final,
    ];

    /// Wire token, e.g. `EVO_KEY_STAGE1`
    pub fn token(self) -> &'static str {
        match self {
            ModificationType::Stage1 => "EVO_KEY_STAGE1",
            ModificationType::Stage2 => "EVO_KEY_STAGE2",
            ModificationType::Stage3 => "EVO_KEY_STAGE3",
            ModificationType::Final => "EVO_KEY_FINAL",
        }
    }

    pub fn profile(self) -> &'static ModificationProfile {
        match self {
            ModificationType::Stage1 => &STAGE1,
            ModificationType::Stage2 => &STAGE2,
            ModificationType::Stage3 => &STAGE3,
            ModificationType::Final => &FINAL,
        }
    }
}

impl fmt::Display for ModificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ModificationType {
    type Err = GrowthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModificationType::ALL
            .into_iter()
            .find(|m| m.token() == s)
            .ok_or_else(|| GrowthError::InvalidModification(s.to_string()))
    }
}

/// Check every token has a usable profile with a distinct output suffix
pub fn validate_catalog() -> Result<(), String> {
    let mut suffixes = Vec::with_capacity(ModificationType::ALL.len());
    for kind in ModificationType::ALL {
        let profile = kind.profile();
        if profile.prompt.trim().is_empty() {
            return Err(format!("{} has an empty prompt", kind));
        }
        if profile.negative_prompt.trim().is_empty() {
            return Err(format!("{} has an empty negative prompt", kind));
        }
        if suffixes.contains(&profile.output_suffix) {
            return Err(format!(
                "{} reuses output suffix {}",
                kind, profile.output_suffix
            ));
        }
        suffixes.push(profile.output_suffix);
    }
    Ok(())
}
