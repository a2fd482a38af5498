//src/calories.rs
use crate::models::SessionDifficulty;

pub const DEFAULT_CALORIES_PER_MINUTE: f64 = 8.0;

/// Estimates calories for a finished (or running) workout.
pub trait CaloriePolicy {
    fn calories(&self, duration_minutes: u32, difficulty: Option<SessionDifficulty>) -> u32;
}

/// Fixed burn rate scaled by how hard the session felt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatRatePolicy {
    pub per_minute: f64,
}

impl Default for FlatRatePolicy {
    fn default() -> Self {
        Self {
            per_minute: DEFAULT_CALORIES_PER_MINUTE,
        }
    }
}

pub const fn intensity_factor(difficulty: Option<SessionDifficulty>) -> f64 {
    match difficulty {
        Some(SessionDifficulty::Hard) => 1.2,
        Some(SessionDifficulty::Easy) => 0.8,
        Some(SessionDifficulty::Medium) | None => 1.0,
    }
}

impl CaloriePolicy for FlatRatePolicy {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn calories(&self, duration_minutes: u32, difficulty: Option<SessionDifficulty>) -> u32 {
        let estimate = f64::from(duration_minutes) * self.per_minute * intensity_factor(difficulty);
        estimate.round().max(0.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_rate_applies_intensity() {
        let policy = FlatRatePolicy::default();
        assert_eq!(policy.calories(30, None), 240);
        assert_eq!(policy.calories(30, Some(SessionDifficulty::Medium)), 240);
        assert_eq!(policy.calories(30, Some(SessionDifficulty::Hard)), 288);
        assert_eq!(policy.calories(30, Some(SessionDifficulty::Easy)), 192);
        assert_eq!(policy.calories(0, Some(SessionDifficulty::Hard)), 0);
    }

    #[test]
    fn custom_rate() {
        let policy = FlatRatePolicy { per_minute: 10.5 };
        assert_eq!(policy.calories(10, None), 105);
    }
}
