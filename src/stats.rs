//src/stats.rs
//! Statistics derived from the workout history. Always recomputed, never stored.
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::models::CompletedWorkout;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyGoalProgress {
    pub target: u32,
    pub completed: u32,
    /// 0.0..=100.0
    pub percent: f64,
}

impl WeeklyGoalProgress {
    pub const fn achieved(&self) -> bool {
        self.completed >= self.target
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutStats {
    pub total_workouts: usize,
    pub this_week_workouts: usize,
    /// One decimal place.
    pub total_hours: f64,
    /// Mean over rated workouts only, one decimal place. 0.0 when none are rated.
    pub average_rating: f64,
    pub total_calories: u64,
    pub streak: u32,
    pub last_workout_date: Option<DateTime<Utc>>,
    /// Minutes, one decimal place.
    pub avg_workout_duration: f64,
    pub most_frequent_plan: Option<String>,
    pub weekly_goal: WeeklyGoalProgress,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Workouts that ended within the seven days before `now`.
pub fn this_week_count(history: &[CompletedWorkout], now: DateTime<Utc>) -> usize {
    let week_ago = now - Duration::days(7);
    history.iter().filter(|w| w.end_time >= week_ago).count()
}

/// Consecutive calendar days with a workout, counted back from `today`
/// (or from yesterday when there is nothing yet today).
pub fn current_streak(history: &[CompletedWorkout], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = history.iter().map(|w| w.end_time.date_naive()).collect();

    let mut day = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) => yesterday,
            None => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}

/// Mean of the non-zero ratings, or 0.0 if nothing is rated.
pub fn average_rating(history: &[CompletedWorkout]) -> f64 {
    let rated: Vec<f64> = history
        .iter()
        .filter_map(|w| w.rating)
        .filter(|r| *r > 0)
        .map(f64::from)
        .collect();
    if rated.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = rated.iter().sum::<f64>() / rated.len() as f64;
    round1(mean)
}

fn most_frequent_plan(history: &[CompletedWorkout]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for workout in history {
        *counts.entry(workout.plan_name.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        // Highest count wins; ties go to the alphabetically first name.
        .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
        .map(|(name, _)| name.to_string())
}

pub fn weekly_goal_progress(completed: usize, target: u32) -> WeeklyGoalProgress {
    let completed = u32::try_from(completed).unwrap_or(u32::MAX);
    let percent = if target == 0 {
        100.0
    } else {
        (f64::from(completed) / f64::from(target) * 100.0).min(100.0)
    };
    WeeklyGoalProgress {
        target,
        completed,
        percent: round1(percent),
    }
}

/// Everything the dashboard shows, derived from `history` as of `now`.
#[allow(clippy::cast_precision_loss)]
pub fn compute(history: &[CompletedWorkout], weekly_goal: u32, now: DateTime<Utc>) -> WorkoutStats {
    let total_workouts = history.len();
    let total_minutes: u64 = history.iter().map(|w| u64::from(w.duration)).sum();
    let this_week_workouts = this_week_count(history, now);

    WorkoutStats {
        total_workouts,
        this_week_workouts,
        total_hours: round1(total_minutes as f64 / 60.0),
        average_rating: average_rating(history),
        total_calories: history.iter().map(|w| u64::from(w.calories_burned)).sum(),
        streak: current_streak(history, now.date_naive()),
        last_workout_date: history.iter().map(|w| w.end_time).max(),
        avg_workout_duration: if total_workouts == 0 {
            0.0
        } else {
            round1(total_minutes as f64 / total_workouts as f64)
        },
        most_frequent_plan: most_frequent_plan(history),
        weekly_goal: weekly_goal_progress(this_week_workouts, weekly_goal),
    }
}
