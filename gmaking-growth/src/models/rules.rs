//! Growth rules: evolution ceiling, clear requirements, increment range

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::error::GrowthError;
use crate::models::GrowthSubject;

/// Highest evolution step a character can reach
pub const MAX_EVOLUTION_STEP: u32 = 5;

/// Inclusive bounds of a single stat increment
pub const GROWTH_INCREMENT_RANGE: RangeInclusive<u32> = 1..=5;

/// Stage clears required to grow from a given step
pub const REQUIRED_CLEARS: [(u32, u32); 3] = [(1, 10), (2, 20), (3, 30)];

/// Image row a grown character points at until its new artwork is stored
pub const PLACEHOLDER_IMAGE_ID: i64 = 1;

/// Rules applied by the growth coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthRules {
    pub max_evolution_step: u32,
    pub increment_range: RangeInclusive<u32>,
    /// Step → clears needed to leave that step. Unmapped steps cannot grow.
    pub required_clears: BTreeMap<u32, u32>,
}

impl Default for GrowthRules {
    fn default() -> Self {
        Self {
            max_evolution_step: MAX_EVOLUTION_STEP,
            increment_range: GROWTH_INCREMENT_RANGE,
            required_clears: REQUIRED_CLEARS.into_iter().collect(),
        }
    }
}

impl GrowthRules {
    /// Clears required to leave `step`; `None` means growth is undefined there
    pub fn required_clears(&self, step: u32) -> Option<u32> {
        self.required_clears.get(&step).copied()
    }

    /// Check whether `subject` may grow to the next step
    pub fn check_eligibility(&self, subject: &GrowthSubject) -> Result<(), GrowthError> {
        let step = subject.evolution_step;
        if step >= self.max_evolution_step {
            return Err(GrowthError::MaxEvolutionStage { step });
        }

        let required = self.required_clears(step);
        let satisfied = required.is_some_and(|r| subject.total_stage_clears >= r);
        if !satisfied {
            return Err(GrowthError::InsufficientClears {
                required,
                current: subject.total_stage_clears,
                next_step: step + 1,
            });
        }

        Ok(())
    }

    /// Reject rule sets that could never be applied safely
    pub fn validate(&self) -> Result<(), String> {
        if self.increment_range.is_empty() {
            return Err(format!(
                "increment range {:?} is empty",
                self.increment_range
            ));
        }
        if let Some(step) = self
            .required_clears
            .keys()
            .find(|s| **s >= self.max_evolution_step)
        {
            return Err(format!(
                "clear requirement defined for step {} at or above max step {}",
                step, self.max_evolution_step
            ));
        }
        Ok(())
    }
}
