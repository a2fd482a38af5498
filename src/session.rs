//src/session.rs
//! Transitions of the active workout.
//!
//! Everything here is pure: no storage, no clock. The service persists the
//! workout after each call and owns the surrounding [`SessionState`].
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::calories::CaloriePolicy;
use crate::models::{
    ActiveWorkout, CompletedWorkout, CompletionData, ExerciseSession, ExerciseSnapshot, Preferences,
    StartOptions, WorkoutPlan, WorkoutStatus,
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("No workout is in progress.")]
    NoActiveWorkout,
    #[error("Workout '{id}' is already in progress. Finish or cancel it first.")]
    WorkoutAlreadyActive { id: String },
    #[error("Plan '{0}' has no exercises.")]
    EmptyPlan(String),
    #[error("Exercise '{name}' in plan '{plan_id}' must have at least one set.")]
    InvalidExercise { plan_id: String, name: String },
}

/// What a single `complete_set` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// More sets of the same exercise remain.
    NextSet,
    /// The exercise is done; moved on to the next one.
    NextExercise,
    /// The last set of the last exercise was just completed.
    FinishReady,
    /// Nothing left to complete; the call changed nothing.
    AlreadyFinished,
}

impl SetOutcome {
    pub const fn is_finish_ready(self) -> bool {
        matches!(self, Self::FinishReady | Self::AlreadyFinished)
    }
}

/// Countdown for the set phase of an exercise.
pub fn set_countdown(exercise: &ExerciseSession, prefs: &Preferences) -> u32 {
    exercise.duration.unwrap_or(prefs.default_set_duration)
}

fn override_at(values: &[u32], index: usize) -> Option<u32> {
    values.get(index).copied().filter(|v| *v > 0)
}

/// Rounded whole minutes between two instants, never negative.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let millis = (end - start).num_milliseconds().max(0);
    (millis as f64 / 60_000.0).round() as u32
}

impl ActiveWorkout {
    /// Builds a fresh workout from `plan`, with all progress cleared.
    ///
    /// # Errors
    /// - `Error::EmptyPlan` if the plan has no exercises.
    /// - `Error::InvalidExercise` if an exercise ends up with zero sets.
    pub fn start(
        plan: &WorkoutPlan,
        prefs: &Preferences,
        options: &StartOptions,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        if plan.exercises.is_empty() {
            return Err(Error::EmptyPlan(plan.id.clone()));
        }

        let exercises = plan
            .exercises
            .iter()
            .enumerate()
            .map(|(i, exercise)| {
                let mut session = exercise.as_template();
                session.sets = override_at(&options.custom_sets, i).unwrap_or(exercise.sets);
                session.reps = override_at(&options.custom_reps, i).unwrap_or(exercise.reps);
                session.rest_time = override_at(&options.custom_rest_times, i)
                    .or_else(|| Some(exercise.rest_time).filter(|r| *r > 0))
                    .unwrap_or(prefs.default_rest_time);
                if session.sets == 0 {
                    return Err(Error::InvalidExercise {
                        plan_id: plan.id.clone(),
                        name: session.name.clone(),
                    });
                }
                Ok(session)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timer = set_countdown(&exercises[0], prefs);

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            start_time: now,
            exercises,
            current_exercise_index: 0,
            current_set: 1,
            total_sets_completed: 0,
            completed_exercises: 0,
            status: WorkoutStatus::Active,
            timer,
            is_resting: false,
            total_duration: 0,
            calories_burned: 0,
        })
    }

    /// Marks one set of the current exercise as done and moves the workout on.
    ///
    /// Finishing the last exercise does not end the workout; the caller still
    /// has to call `complete_workout`. Further calls are no-ops.
    pub fn complete_set(&mut self, prefs: &Preferences) -> SetOutcome {
        if self.is_finish_ready() {
            return SetOutcome::AlreadyFinished;
        }
        let index = self.current_exercise_index;
        let Some(exercise) = self.exercises.get_mut(index) else {
            return SetOutcome::AlreadyFinished;
        };

        exercise.completed_sets = (exercise.completed_sets + 1).min(exercise.sets);
        self.total_sets_completed += 1;

        if exercise.completed_sets < exercise.sets {
            let rest = exercise.rest_time;
            self.current_set += 1;
            self.enter_rest(rest, prefs);
            debug!(workout_id = %self.id, exercise = index, set = self.current_set, "Set completed");
            return SetOutcome::NextSet;
        }

        exercise.completed = true;
        self.completed_exercises += 1;

        if self.is_finish_ready() {
            self.is_resting = false;
            self.timer = 0;
            debug!(workout_id = %self.id, "All exercises completed");
            return SetOutcome::FinishReady;
        }

        let Some(rest) = self
            .exercises
            .get(self.current_exercise_index + 1)
            .map(|next| next.rest_time)
        else {
            // Counters disagree with the exercise list: nothing left to move to.
            self.completed_exercises = self.exercises.len();
            self.is_resting = false;
            self.timer = 0;
            return SetOutcome::FinishReady;
        };
        self.current_exercise_index += 1;
        self.current_set = 1;
        self.enter_rest(rest, prefs);
        debug!(workout_id = %self.id, exercise = self.current_exercise_index, "Moved to next exercise");
        SetOutcome::NextExercise
    }

    fn enter_rest(&mut self, rest: u32, prefs: &Preferences) {
        if prefs.auto_start_rest_timer {
            self.is_resting = true;
            self.timer = rest;
        } else {
            self.is_resting = false;
            self.timer = self
                .current_exercise()
                .map_or(0, |exercise| set_countdown(exercise, prefs));
        }
    }

    /// Whether the progress counters agree with the per-exercise progress,
    /// as every transition in this module leaves them.
    pub fn is_consistent(&self) -> bool {
        let len = self.exercises.len();
        let Some(current) = self.exercises.get(self.current_exercise_index) else {
            return false;
        };
        let exercises_valid = self.exercises.iter().enumerate().all(|(i, e)| {
            let in_order = match i.cmp(&self.current_exercise_index) {
                std::cmp::Ordering::Less => e.completed,
                std::cmp::Ordering::Greater => e.completed_sets == 0,
                std::cmp::Ordering::Equal => true,
            };
            e.sets > 0 && e.completed_sets <= e.sets && e.completed == (e.completed_sets == e.sets) && in_order
        });
        let done = self.exercises.iter().filter(|e| e.completed).count();
        let sets: u32 = self.exercises.iter().map(|e| e.completed_sets).sum();
        let position_valid = if self.is_finish_ready() {
            self.current_exercise_index + 1 == len && self.current_set == current.sets
        } else {
            self.current_exercise_index == done && self.current_set == current.completed_sets + 1
        };
        exercises_valid
            && done == self.completed_exercises
            && sets == self.total_sets_completed
            && position_valid
    }

    /// Ends the current rest period early. Returns `false` if not resting.
    pub fn skip_rest(&mut self) -> bool {
        if !self.is_resting {
            return false;
        }
        self.is_resting = false;
        self.timer = 0;
        true
    }

    /// Returns `false` if already paused.
    pub fn pause(&mut self) -> bool {
        if self.status != WorkoutStatus::Active {
            return false;
        }
        self.status = WorkoutStatus::Paused;
        true
    }

    /// Returns `false` if not paused.
    pub fn resume(&mut self) -> bool {
        if self.status != WorkoutStatus::Paused {
            return false;
        }
        self.status = WorkoutStatus::Active;
        true
    }

    /// Accounts one second of active time for the display totals.
    pub fn record_active_second(&mut self, policy: &dyn CaloriePolicy) {
        self.total_duration += 1;
        self.calories_burned = policy.calories(self.total_duration / 60, None);
    }

    /// Turns the workout into its history entry.
    pub fn finish(
        mut self,
        data: CompletionData,
        policy: &dyn CaloriePolicy,
        end_time: DateTime<Utc>,
    ) -> CompletedWorkout {
        self.status = WorkoutStatus::Completed;
        let duration = elapsed_minutes(self.start_time, end_time);
        let calories_burned = policy.calories(duration, data.difficulty);

        CompletedWorkout {
            exercises: self.exercises.iter().map(ExerciseSnapshot::from).collect(),
            id: self.id,
            plan_id: self.plan_id,
            plan_name: self.plan_name,
            start_time: self.start_time,
            end_time,
            duration,
            calories_burned,
            rating: data.rating,
            notes: data.notes,
            feel: data.feel,
            difficulty: data.difficulty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calories::FlatRatePolicy;
    use crate::models::{Difficulty, PlanOrigin, SessionDifficulty};
    use chrono::{Duration, TimeZone};

    fn plan(exercises: Vec<ExerciseSession>) -> WorkoutPlan {
        WorkoutPlan {
            id: "p1".into(),
            name: "Test Plan".into(),
            description: String::new(),
            duration: 20,
            difficulty: Difficulty::Beginner,
            category: "strength".into(),
            calories: 150,
            exercises,
            is_favorite: false,
            created_by: PlanOrigin::User,
            tags: vec![],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 7, 30, 0).unwrap()
    }

    #[test]
    fn start_resets_progress() {
        let mut dirty = ExerciseSession::new("e1", "Push-ups", 3, 10, 60);
        dirty.completed_sets = 2;
        dirty.completed = true;
        let workout = ActiveWorkout::start(
            &plan(vec![dirty]),
            &Preferences::default(),
            &StartOptions::default(),
            now(),
        )
        .unwrap();

        assert_eq!(workout.exercises[0].completed_sets, 0);
        assert!(!workout.exercises[0].completed);
        assert_eq!(workout.current_exercise_index, 0);
        assert_eq!(workout.current_set, 1);
        assert_eq!(workout.status, WorkoutStatus::Active);
        assert!(!workout.is_resting);
        assert_eq!(workout.timer, Preferences::default().default_set_duration);
    }

    #[test]
    fn start_applies_overrides_and_rest_fallback() {
        let exercises = vec![
            ExerciseSession::new("e1", "Squats", 3, 12, 0),
            ExerciseSession::new("e2", "Plank", 2, 1, 30).timed(40),
        ];
        let options = StartOptions {
            custom_sets: vec![5, 0],
            custom_reps: vec![],
            custom_rest_times: vec![0, 90],
        };
        let prefs = Preferences {
            default_rest_time: 75,
            ..Preferences::default()
        };
        let workout = ActiveWorkout::start(&plan(exercises), &prefs, &options, now()).unwrap();

        assert_eq!(workout.exercises[0].sets, 5);
        assert_eq!(workout.exercises[0].rest_time, 75);
        assert_eq!(workout.exercises[1].sets, 2);
        assert_eq!(workout.exercises[1].rest_time, 90);
    }

    #[test]
    fn timed_first_exercise_sets_initial_countdown() {
        let exercises = vec![ExerciseSession::new("e1", "Plank", 2, 1, 30).timed(40)];
        let workout =
            ActiveWorkout::start(&plan(exercises), &Preferences::default(), &StartOptions::default(), now())
                .unwrap();
        assert_eq!(workout.timer, 40);
    }

    #[test]
    fn start_rejects_unusable_plans() {
        let empty = plan(vec![]);
        assert_eq!(
            ActiveWorkout::start(&empty, &Preferences::default(), &StartOptions::default(), now()),
            Err(Error::EmptyPlan("p1".into()))
        );

        let zero_sets = plan(vec![ExerciseSession::new("e1", "Squats", 0, 10, 60)]);
        assert!(matches!(
            ActiveWorkout::start(&zero_sets, &Preferences::default(), &StartOptions::default(), now()),
            Err(Error::InvalidExercise { .. })
        ));
    }

    #[test]
    fn sets_and_exercises_advance_with_rest() {
        let prefs = Preferences::default();
        let exercises = vec![
            ExerciseSession::new("e1", "Push-ups", 2, 10, 30),
            ExerciseSession::new("e2", "Squats", 1, 15, 45),
        ];
        let mut workout =
            ActiveWorkout::start(&plan(exercises), &prefs, &StartOptions::default(), now()).unwrap();

        assert_eq!(workout.complete_set(&prefs), SetOutcome::NextSet);
        assert!(workout.is_resting);
        assert_eq!(workout.timer, 30);
        assert_eq!(workout.current_set, 2);

        assert!(workout.skip_rest());
        assert_eq!(workout.complete_set(&prefs), SetOutcome::NextExercise);
        assert_eq!(workout.current_exercise_index, 1);
        assert_eq!(workout.current_set, 1);
        assert!(workout.is_resting);
        assert_eq!(workout.timer, 45, "rest uses the next exercise's rest time");
        assert!(workout.exercises[0].completed);
        assert_eq!(workout.completed_exercises, 1);

        assert_eq!(workout.complete_set(&prefs), SetOutcome::FinishReady);
        assert_eq!(workout.completed_exercises, 2);
        assert_eq!(workout.total_sets_completed, 3);
        assert!(!workout.is_resting);

        // Extra taps change nothing.
        assert_eq!(workout.complete_set(&prefs), SetOutcome::AlreadyFinished);
        assert_eq!(workout.total_sets_completed, 3);
        assert_eq!(workout.exercises[1].completed_sets, 1);
    }

    #[test]
    fn no_auto_rest_keeps_set_countdown() {
        let prefs = Preferences {
            auto_start_rest_timer: false,
            default_set_duration: 20,
            ..Preferences::default()
        };
        let exercises = vec![ExerciseSession::new("e1", "Push-ups", 2, 10, 30)];
        let mut workout =
            ActiveWorkout::start(&plan(exercises), &prefs, &StartOptions::default(), now()).unwrap();
        workout.complete_set(&prefs);
        assert!(!workout.is_resting);
        assert_eq!(workout.timer, 20);
    }

    #[test]
    fn pause_resume_toggle() {
        let prefs = Preferences::default();
        let exercises = vec![ExerciseSession::new("e1", "Push-ups", 2, 10, 30)];
        let mut workout =
            ActiveWorkout::start(&plan(exercises), &prefs, &StartOptions::default(), now()).unwrap();
        assert!(!workout.resume());
        assert!(workout.pause());
        assert!(!workout.pause());
        assert_eq!(workout.status, WorkoutStatus::Paused);
        assert!(workout.resume());
        assert_eq!(workout.status, WorkoutStatus::Active);
    }

    #[test]
    fn finish_builds_history_entry() {
        let prefs = Preferences::default();
        let exercises = vec![ExerciseSession::new("e1", "Push-ups", 2, 10, 30)];
        let mut workout =
            ActiveWorkout::start(&plan(exercises), &prefs, &StartOptions::default(), now()).unwrap();
        workout.complete_set(&prefs);
        workout.skip_rest();
        workout.complete_set(&prefs);
        let id = workout.id.clone();

        let entry = workout.finish(
            CompletionData {
                rating: Some(5),
                difficulty: Some(SessionDifficulty::Hard),
                ..CompletionData::default()
            },
            &FlatRatePolicy::default(),
            now() + Duration::seconds(25 * 60 + 31),
        );

        assert_eq!(entry.id, id);
        assert_eq!(entry.duration, 26);
        assert_eq!(entry.calories_burned, 250); // 26 * 8 * 1.2 = 249.6
        assert_eq!(entry.exercises[0].completed_sets, 2);
        assert_eq!(entry.rating, Some(5));
    }

    #[test]
    fn transitions_keep_counters_consistent() {
        let prefs = Preferences::default();
        let exercises = vec![
            ExerciseSession::new("e1", "Push-ups", 2, 10, 30),
            ExerciseSession::new("e2", "Squats", 3, 15, 45),
        ];
        let mut workout =
            ActiveWorkout::start(&plan(exercises), &prefs, &StartOptions::default(), now()).unwrap();
        assert!(workout.is_consistent());
        while !workout.complete_set(&prefs).is_finish_ready() {
            assert!(workout.is_consistent());
        }
        assert!(workout.is_consistent());

        workout.completed_exercises = 1;
        assert!(!workout.is_consistent());
    }

    #[test]
    fn skewed_counters_do_not_panic() {
        let prefs = Preferences::default();
        let exercises = vec![
            ExerciseSession::new("e1", "Push-ups", 1, 10, 30),
            ExerciseSession::new("e2", "Squats", 1, 15, 45),
        ];
        let mut workout =
            ActiveWorkout::start(&plan(exercises), &prefs, &StartOptions::default(), now()).unwrap();
        // Second exercise current while the first was never counted as done.
        workout.current_exercise_index = 1;
        assert!(!workout.is_consistent());

        assert_eq!(workout.complete_set(&prefs), SetOutcome::FinishReady);
        assert!(workout.is_finish_ready());
        assert_eq!(workout.complete_set(&prefs), SetOutcome::AlreadyFinished);
    }

    #[test]
    fn elapsed_minutes_rounds_and_clamps() {
        let start = now();
        assert_eq!(elapsed_minutes(start, start + Duration::seconds(89)), 1);
        assert_eq!(elapsed_minutes(start, start + Duration::seconds(90)), 2);
        assert_eq!(elapsed_minutes(start, start - Duration::minutes(5)), 0);
    }
}
