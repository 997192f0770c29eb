//! Growth subject (character) state and growth history records

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// The five growable stats of a character
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatSet {
    pub attack: f64,
    pub defense: f64,
    pub hp: f64,
    pub speed: f64,
    pub critical_rate: f64,
}

impl StatSet {
    /// New totals after adding one growth's increments
    pub fn apply(&self, increments: &StatIncrements) -> StatSet {
        StatSet {
            attack: self.attack + f64::from(increments.attack),
            defense: self.defense + f64::from(increments.defense),
            hp: self.hp + f64::from(increments.hp),
            speed: self.speed + f64::from(increments.speed),
            critical_rate: self.critical_rate + f64::from(increments.critical_rate),
        }
    }
}

/// Per-stat increments of one growth transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatIncrements {
    pub attack: u32,
    pub defense: u32,
    pub hp: u32,
    pub speed: u32,
    pub critical_rate: u32,
}

impl StatIncrements {
    /// Draw five independent increments, each uniform over `range`
    ///
    /// `range` must be non-empty; `GrowthRules::validate` guarantees this for
    /// configured rules.
    pub fn roll<R: Rng + ?Sized>(rng: &mut R, range: &RangeInclusive<u32>) -> Self {
        Self {
            attack: rng.gen_range(range.clone()),
            defense: rng.gen_range(range.clone()),
            hp: rng.gen_range(range.clone()),
            speed: rng.gen_range(range.clone()),
            critical_rate: rng.gen_range(range.clone()),
        }
    }

    /// Increments as an array in attack, defense, hp, speed, critical order
    pub fn as_array(&self) -> [u32; 5] {
        [
            self.attack,
            self.defense,
            self.hp,
            self.speed,
            self.critical_rate,
        ]
    }
}

/// Current persisted state of a character, as read at the start of a growth
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthSubject {
    pub user_id: String,
    pub character_id: i64,
    pub evolution_step: u32,
    pub total_stage_clears: u32,
    pub stats: StatSet,
    /// Absolute URL or origin-relative path of the current character image
    pub current_image_url: String,
}

/// One growth history entry. Written once, never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthRecord {
    pub character_id: i64,
    pub user_id: String,
    pub increments: StatIncrements,
    /// Audit: creator (the owning user)
    pub created_by: String,
}

impl GrowthRecord {
    pub fn new(character_id: i64, user_id: &str, increments: StatIncrements) -> Self {
        Self {
            character_id,
            user_id: user_id.to_string(),
            increments,
            created_by: user_id.to_string(),
        }
    }
}
