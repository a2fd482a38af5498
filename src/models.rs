//src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// How hard the finished session felt. Drives the calorie intensity factor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionDifficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Feel {
    Great,
    Good,
    Ok,
    Tired,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanOrigin {
    System,
    #[default]
    User,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WorkoutStatus {
    Active,
    Paused,
    Completed,
}

/// One exercise inside a plan or a running workout.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExerciseSession {
    pub exercise_id: String,
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    /// Seconds of rest after each set.
    pub rest_time: u32,
    /// Set length in seconds for timed exercises (planks, holds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default)]
    pub completed_sets: u32,
    #[serde(default)]
    pub completed: bool,
}

impl ExerciseSession {
    pub fn new(exercise_id: &str, name: &str, sets: u32, reps: u32, rest_time: u32) -> Self {
        Self {
            exercise_id: exercise_id.to_string(),
            name: name.to_string(),
            sets,
            reps,
            rest_time,
            duration: None,
            completed_sets: 0,
            completed: false,
        }
    }

    #[must_use]
    pub const fn timed(mut self, seconds: u32) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Copy of this exercise with progress cleared.
    #[must_use]
    pub fn as_template(&self) -> Self {
        Self {
            completed_sets: 0,
            completed: false,
            ..self.clone()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkoutPlan {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Target length in minutes.
    pub duration: u32,
    pub difficulty: Difficulty,
    pub category: String,
    /// Estimated calorie cost.
    pub calories: u32,
    pub exercises: Vec<ExerciseSession>,
    #[serde(default)]
    pub is_favorite: bool,
    pub created_by: PlanOrigin,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Plan fields supplied by the caller when creating a custom plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPlan {
    pub name: String,
    pub description: String,
    pub duration: u32,
    pub difficulty: Difficulty,
    pub category: String,
    pub calories: u32,
    /// `None` seeds two placeholder exercises.
    pub exercises: Option<Vec<ExerciseSession>>,
    pub is_favorite: bool,
    pub tags: Vec<String>,
}

/// Partial update for a stored plan. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration: Option<u32>,
    pub difficulty: Option<Difficulty>,
    pub category: Option<String>,
    pub calories: Option<u32>,
    pub exercises: Option<Vec<ExerciseSession>>,
    pub is_favorite: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// The single in-progress workout.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActiveWorkout {
    pub id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub start_time: DateTime<Utc>,
    pub exercises: Vec<ExerciseSession>,
    pub current_exercise_index: usize,
    /// 1-based set number within the current exercise.
    pub current_set: u32,
    pub total_sets_completed: u32,
    pub completed_exercises: usize,
    pub status: WorkoutStatus,
    /// Seconds remaining. Counts rest while `is_resting`, otherwise the set countdown.
    pub timer: u32,
    pub is_resting: bool,
    /// Seconds spent active. Display only.
    pub total_duration: u32,
    /// Running estimate. Display only.
    pub calories_burned: u32,
}

impl ActiveWorkout {
    pub fn current_exercise(&self) -> Option<&ExerciseSession> {
        self.exercises.get(self.current_exercise_index)
    }

    pub fn next_exercise(&self) -> Option<&ExerciseSession> {
        self.exercises.get(self.current_exercise_index + 1)
    }

    /// Every exercise has all of its sets done; waiting on `complete_workout`.
    pub fn is_finish_ready(&self) -> bool {
        self.completed_exercises >= self.exercises.len()
    }

    pub fn total_sets(&self) -> u32 {
        self.exercises.iter().map(|e| e.sets).sum()
    }

    /// Fraction of planned sets completed, 0.0..=1.0.
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        let total = self.total_sets();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.total_sets_completed) / f64::from(total)
    }
}

/// Zero or one active workout, made explicit.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    NoActiveWorkout,
    InProgress(ActiveWorkout),
}

impl SessionState {
    pub const fn active(&self) -> Option<&ActiveWorkout> {
        match self {
            Self::NoActiveWorkout => None,
            Self::InProgress(workout) => Some(workout),
        }
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveWorkout> {
        match self {
            Self::NoActiveWorkout => None,
            Self::InProgress(workout) => Some(workout),
        }
    }

    pub const fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress(_))
    }

    /// Moves the workout out, leaving `NoActiveWorkout` behind.
    pub fn take(&mut self) -> Option<ActiveWorkout> {
        match std::mem::take(self) {
            Self::NoActiveWorkout => None,
            Self::InProgress(workout) => Some(workout),
        }
    }
}

impl From<Option<ActiveWorkout>> for SessionState {
    fn from(value: Option<ActiveWorkout>) -> Self {
        value.map_or(Self::NoActiveWorkout, Self::InProgress)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExerciseSnapshot {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    pub completed_sets: u32,
}

impl From<&ExerciseSession> for ExerciseSnapshot {
    fn from(value: &ExerciseSession) -> Self {
        Self {
            name: value.name.clone(),
            sets: value.sets,
            reps: value.reps,
            completed_sets: value.completed_sets,
        }
    }
}

/// History entry. Written once by `complete_workout` and never changed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompletedWorkout {
    pub id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Minutes, rounded.
    pub duration: u32,
    pub calories_burned: u32,
    pub exercises: Vec<ExerciseSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feel: Option<Feel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<SessionDifficulty>,
}

/// Optional details recorded when finishing a workout. Not validated here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionData {
    pub rating: Option<u8>,
    pub notes: Option<String>,
    pub feel: Option<Feel>,
    pub difficulty: Option<SessionDifficulty>,
}

/// Per-exercise overrides applied when starting a workout, indexed like the plan's exercises.
/// Missing or zero entries keep the plan value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub custom_sets: Vec<u32>,
    pub custom_reps: Vec<u32>,
    pub custom_rest_times: Vec<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    /// Used when an exercise has no rest time of its own.
    pub default_rest_time: u32,
    /// Set-phase countdown for exercises without a duration.
    pub default_set_duration: u32,
    pub auto_start_rest_timer: bool,
    /// Workouts per week.
    pub weekly_goal: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_rest_time: 60,
            default_set_duration: 45,
            auto_start_rest_timer: true,
            weekly_goal: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesUpdate {
    pub default_rest_time: Option<u32>,
    pub default_set_duration: Option<u32>,
    pub auto_start_rest_timer: Option<bool>,
    pub weekly_goal: Option<u32>,
}

impl Preferences {
    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(v) = update.default_rest_time {
            self.default_rest_time = v;
        }
        if let Some(v) = update.default_set_duration {
            self.default_set_duration = v;
        }
        if let Some(v) = update.auto_start_rest_timer {
            self.auto_start_rest_timer = v;
        }
        if let Some(v) = update.weekly_goal {
            self.weekly_goal = v;
        }
    }
}
