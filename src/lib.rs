use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;
use tracing::{info, warn};

// --- Declare modules ---
pub mod calories;
pub mod clock;
mod config;
pub mod db;
pub mod models;
pub mod plans;
pub mod session;
pub mod stats;
pub mod storage;

// --- Expose public types ---
pub use calories::{CaloriePolicy, FlatRatePolicy};
pub use clock::{SessionClock, TickEvent};
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, Config, Error as ConfigError, StandardColor, Theme,
};
pub use db::{
    get_db_path as get_db_path_util, Error as DbError, MemoryStore, RecordKey, SqliteStore, Store,
};
pub use models::{
    ActiveWorkout, CompletedWorkout, CompletionData, Difficulty, ExerciseSession, ExerciseSnapshot,
    Feel, NewPlan, PlanOrigin, PlanUpdate, Preferences, PreferencesUpdate, SessionDifficulty,
    SessionState, StartOptions, WorkoutPlan, WorkoutStatus,
};
pub use plans::Error as PlanError;
pub use session::{Error as SessionError, SetOutcome};
pub use stats::{WeeklyGoalProgress, WorkoutStats};
pub use storage::Error as StorageError;

/// Failures of the workout operations.
#[derive(ThisError, Debug)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Workout plan not found: {0}")]
    PlanNotFound(String),
    #[error("Plan '{0}' is built in and cannot be deleted.")]
    CannotDeleteSystemPlan(String),
    /// The change is visible in memory but was not saved.
    #[error("Change not saved: {0}")]
    Storage(#[from] StorageError),
}

impl From<PlanError> for Error {
    fn from(value: PlanError) -> Self {
        match value {
            PlanError::SystemPlan(id) => Self::CannotDeleteSystemPlan(id),
            PlanError::Storage(e) => Self::Storage(e),
        }
    }
}

impl Error {
    /// True for calls made with no workout in progress.
    pub const fn is_no_active_workout(&self) -> bool {
        matches!(self, Self::Session(SessionError::NoActiveWorkout))
    }
}

type TimeSource = Box<dyn Fn() -> DateTime<Utc>>;

/// Owns the plans, the zero-or-one active workout, the history and the clock.
///
/// Every operation applies its change in memory first and then writes it to
/// the store. A failed write is logged and returned as `Error::Storage`; the
/// in-memory state keeps the change, but it is not durable until a later
/// successful write.
pub struct AppService {
    pub config: Config,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    store: Box<dyn Store>,
    calorie_policy: Box<dyn CaloriePolicy>,
    now: TimeSource,
    clock: SessionClock,
    session: SessionState,
    workout_plans: Vec<WorkoutPlan>,
    history: Vec<CompletedWorkout>,
    preferences: Preferences,
    loading: bool,
}

fn persist_active(store: &dyn Store, workout: &ActiveWorkout) -> Result<(), Error> {
    storage::save_active(store, workout).map_err(|e| {
        warn!(workout_id = %workout.id, error = %e, "Failed to save active workout");
        Error::Storage(e)
    })
}

impl AppService {
    /// Initializes the application service from the config file and database.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or opening fails.
    pub fn initialize() -> AnyResult<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        let mut service = Self::with_store(config, Box::new(store));
        service.config_path = config_path;
        service.db_path = db_path;
        Ok(service)
    }

    /// Builds a service over any store and loads its data.
    pub fn with_store(config: Config, store: Box<dyn Store>) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!(error = %e, "Invalid configuration values replaced by defaults");
                config.sanitized()
            }
        };
        let calorie_policy = Box::new(FlatRatePolicy {
            per_minute: config.calories_per_minute,
        });
        let mut service = Self {
            config,
            config_path: PathBuf::new(),
            db_path: PathBuf::new(),
            store,
            calorie_policy,
            now: Box::new(Utc::now),
            clock: SessionClock::new(),
            session: SessionState::NoActiveWorkout,
            workout_plans: Vec::new(),
            history: Vec::new(),
            preferences: Preferences::default(),
            loading: true,
        };
        service.refresh_workout_data();
        service
    }

    /// Replaces the wall clock, e.g. to make durations deterministic.
    pub fn set_time_source<F>(&mut self, now: F)
    where
        F: Fn() -> DateTime<Utc> + 'static,
    {
        self.now = Box::new(now);
    }

    pub fn set_calorie_policy(&mut self, policy: Box<dyn CaloriePolicy>) {
        self.calorie_policy = policy;
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save(&self.config_path, &self.config)
    }

    // --- State exposed to the presentation layer ---

    pub fn workout_plans(&self) -> &[WorkoutPlan] {
        &self.workout_plans
    }

    pub const fn session_state(&self) -> &SessionState {
        &self.session
    }

    pub const fn active_workout(&self) -> Option<&ActiveWorkout> {
        self.session.active()
    }

    /// History oldest first, as stored.
    pub fn history(&self) -> &[CompletedWorkout] {
        &self.history
    }

    /// History newest first, for browsing.
    pub fn workout_history(&self) -> Vec<&CompletedWorkout> {
        self.history.iter().rev().collect()
    }

    pub fn stats(&self) -> WorkoutStats {
        stats::compute(&self.history, self.preferences.weekly_goal, (self.now)())
    }

    pub fn calculate_weekly_workouts(&self) -> usize {
        stats::this_week_count(&self.history, (self.now)())
    }

    pub fn calculate_streak(&self) -> u32 {
        stats::current_streak(&self.history, (self.now)().date_naive())
    }

    /// Seconds on the countdown, 0 with no workout in progress.
    pub fn timer(&self) -> u32 {
        self.active_workout().map_or(0, |w| w.timer)
    }

    pub fn is_resting(&self) -> bool {
        self.active_workout().is_some_and(|w| w.is_resting)
    }

    pub const fn loading(&self) -> bool {
        self.loading
    }

    pub const fn clock_running(&self) -> bool {
        self.clock.is_running()
    }

    pub const fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    // --- Loading ---

    /// Reloads plans, active workout, history and preferences from the store.
    ///
    /// Never fails: unreadable or malformed records fall back to the built-in
    /// plans, no active workout, empty history and default preferences.
    pub fn refresh_workout_data(&mut self) {
        self.loading = true;
        self.clock.stop();
        let store = self.store.as_ref();

        self.workout_plans = plans::list(store).unwrap_or_else(|e| {
            warn!(error = %e, "Could not load workout plans, using built-in plans");
            plans::default_plans()
        });
        self.history = storage::load_history(store).unwrap_or_else(|e| {
            warn!(error = %e, "Could not load workout history");
            Vec::new()
        });
        self.preferences = storage::load_preferences(store).unwrap_or_else(|e| {
            warn!(error = %e, "Could not load preferences, using defaults");
            Preferences::default()
        });
        self.session = storage::load_active(store)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Could not load active workout");
                None
            })
            .into();

        // Finished already: the snapshot outlived a failed clear.
        let recorded = self
            .active_workout()
            .filter(|w| self.history.iter().any(|h| h.id == w.id))
            .map(|w| w.id.clone());
        if let Some(id) = recorded {
            warn!(workout_id = %id, "Active workout is already in history, discarding it");
            self.session = SessionState::NoActiveWorkout;
            if let Err(e) = storage::clear_active(store) {
                warn!(error = %e, "Could not clear stale active workout");
            }
        }

        if self
            .active_workout()
            .is_some_and(|w| w.status == WorkoutStatus::Active)
        {
            self.clock.start();
        }
        self.loading = false;
        info!(
            plans = self.workout_plans.len(),
            history = self.history.len(),
            active = self.session.is_in_progress(),
            "Workout data loaded"
        );
    }

    fn reload_plans(&mut self) -> Result<(), Error> {
        self.workout_plans = plans::list(self.store.as_ref())?;
        Ok(())
    }

    // --- Active workout ---

    /// Starts a workout from `plan`.
    /// # Errors
    /// - `SessionError::WorkoutAlreadyActive` if a workout is in progress; it is left untouched.
    /// - `SessionError::EmptyPlan` / `SessionError::InvalidExercise` for unusable plans.
    /// - `Error::Storage` if the new workout could not be saved (it is still started).
    pub fn start_workout(
        &mut self,
        plan: &WorkoutPlan,
        options: &StartOptions,
    ) -> Result<ActiveWorkout, Error> {
        if let Some(current) = self.active_workout() {
            return Err(SessionError::WorkoutAlreadyActive {
                id: current.id.clone(),
            }
            .into());
        }
        let workout = ActiveWorkout::start(plan, &self.preferences, options, (self.now)())?;
        info!(workout_id = %workout.id, plan = %plan.name, "Workout started");

        self.session = SessionState::InProgress(workout.clone());
        self.clock.start();
        persist_active(self.store.as_ref(), &workout)?;
        Ok(workout)
    }

    /// Starts a workout from a stored plan.
    /// # Errors
    /// `Error::PlanNotFound` plus everything `start_workout` returns.
    pub fn start_workout_by_id(
        &mut self,
        plan_id: &str,
        options: &StartOptions,
    ) -> Result<ActiveWorkout, Error> {
        let plan = self
            .workout_plans
            .iter()
            .find(|p| p.id == plan_id)
            .cloned()
            .ok_or_else(|| Error::PlanNotFound(plan_id.to_string()))?;
        self.start_workout(&plan, options)
    }

    /// Completes one set of the current exercise.
    /// Returns `true` once every exercise is done and the workout can be finished.
    /// # Errors
    /// `SessionError::NoActiveWorkout`, or `Error::Storage` if the progress was not saved.
    pub fn complete_set(&mut self) -> Result<bool, Error> {
        let workout = self
            .session
            .active_mut()
            .ok_or(SessionError::NoActiveWorkout)?;
        let outcome = workout.complete_set(&self.preferences);
        if outcome == SetOutcome::AlreadyFinished {
            return Ok(true);
        }
        persist_active(self.store.as_ref(), workout)?;
        Ok(outcome.is_finish_ready())
    }

    /// Ends the current rest period early. No-op when not resting.
    /// # Errors
    /// `SessionError::NoActiveWorkout`, or `Error::Storage`.
    pub fn skip_rest(&mut self) -> Result<(), Error> {
        let workout = self
            .session
            .active_mut()
            .ok_or(SessionError::NoActiveWorkout)?;
        if workout.skip_rest() {
            persist_active(self.store.as_ref(), workout)?;
        }
        Ok(())
    }

    /// Pauses the workout and stops the clock.
    /// # Errors
    /// `SessionError::NoActiveWorkout`, or `Error::Storage`.
    pub fn pause_workout(&mut self) -> Result<(), Error> {
        let workout = self
            .session
            .active_mut()
            .ok_or(SessionError::NoActiveWorkout)?;
        self.clock.stop();
        if workout.pause() {
            info!(workout_id = %workout.id, timer = workout.timer, "Workout paused");
            persist_active(self.store.as_ref(), workout)?;
        }
        Ok(())
    }

    /// Resumes a paused workout; the clock continues from the stored timer.
    /// # Errors
    /// `SessionError::NoActiveWorkout`, or `Error::Storage`.
    pub fn resume_workout(&mut self) -> Result<(), Error> {
        let workout = self
            .session
            .active_mut()
            .ok_or(SessionError::NoActiveWorkout)?;
        let changed = workout.resume();
        self.clock.start();
        if changed {
            info!(workout_id = %workout.id, timer = workout.timer, "Workout resumed");
            persist_active(self.store.as_ref(), workout)?;
        }
        Ok(())
    }

    /// Abandons the workout in progress without recording it.
    /// # Errors
    /// `Error::Storage` if the saved snapshot could not be removed. The workout
    /// is gone from memory either way.
    pub fn cancel_workout(&mut self) -> Result<(), Error> {
        self.clock.stop();
        if let Some(workout) = self.session.take() {
            info!(workout_id = %workout.id, "Workout cancelled");
        }
        storage::clear_active(self.store.as_ref()).map_err(|e| {
            warn!(error = %e, "Failed to clear active workout");
            Error::Storage(e)
        })
    }

    /// Finishes the workout and records it in the history.
    /// # Errors
    /// - `SessionError::NoActiveWorkout` if nothing is in progress.
    /// - `Error::Storage` if the history could not be saved. The stored active
    ///   workout is then kept so a reload can recover it.
    pub fn complete_workout(&mut self, data: CompletionData) -> Result<CompletedWorkout, Error> {
        if !self.session.is_in_progress() {
            return Err(SessionError::NoActiveWorkout.into());
        }
        self.clock.stop();
        let Some(workout) = self.session.take() else {
            return Err(SessionError::NoActiveWorkout.into());
        };

        let entry = workout.finish(data, self.calorie_policy.as_ref(), (self.now)());
        self.history.push(entry.clone());
        storage::trim_history(&mut self.history, self.config.history_limit);
        info!(
            workout_id = %entry.id,
            duration = entry.duration,
            calories = entry.calories_burned,
            "Workout completed"
        );

        let store = self.store.as_ref();
        storage::save_history(store, &self.history).map_err(|e| {
            warn!(error = %e, "Failed to save workout history");
            Error::Storage(e)
        })?;
        storage::clear_active(store).map_err(|e| {
            warn!(error = %e, "Failed to clear active workout");
            Error::Storage(e)
        })?;
        Ok(entry)
    }

    /// Advances the session clock by one second.
    /// # Errors
    /// `Error::Storage` if the updated workout could not be saved.
    pub fn tick(&mut self) -> Result<TickEvent, Error> {
        let Some(workout) = self.session.active_mut() else {
            self.clock.stop();
            return Ok(TickEvent::Idle);
        };
        let event = self
            .clock
            .tick(workout, &self.preferences, self.calorie_policy.as_ref());
        if event != TickEvent::Idle {
            persist_active(self.store.as_ref(), workout)?;
        }
        Ok(event)
    }

    // --- Plans ---

    /// Flips a plan's favorite flag and returns the new value.
    /// # Errors
    /// `Error::PlanNotFound`, or `Error::Storage`.
    pub fn toggle_favorite(&mut self, plan_id: &str) -> Result<bool, Error> {
        let favorite = plans::toggle_favorite(self.store.as_ref(), plan_id)?
            .ok_or_else(|| Error::PlanNotFound(plan_id.to_string()))?;
        self.reload_plans()?;
        Ok(favorite)
    }

    /// # Errors
    /// `Error::Storage` if the plan could not be saved.
    pub fn create_custom_workout(&mut self, data: NewPlan) -> Result<WorkoutPlan, Error> {
        let plan = plans::create(self.store.as_ref(), data)?;
        self.reload_plans()?;
        Ok(plan)
    }

    /// # Errors
    /// `Error::PlanNotFound`, or `Error::Storage`.
    pub fn update_workout_plan(
        &mut self,
        plan_id: &str,
        update: PlanUpdate,
    ) -> Result<WorkoutPlan, Error> {
        let plan = plans::update(self.store.as_ref(), plan_id, update)?
            .ok_or_else(|| Error::PlanNotFound(plan_id.to_string()))?;
        self.reload_plans()?;
        Ok(plan)
    }

    /// # Errors
    /// `Error::PlanNotFound`, or `Error::Storage`.
    pub fn duplicate_workout_plan(
        &mut self,
        plan_id: &str,
        new_name: &str,
    ) -> Result<WorkoutPlan, Error> {
        let plan = plans::duplicate(self.store.as_ref(), plan_id, new_name)?
            .ok_or_else(|| Error::PlanNotFound(plan_id.to_string()))?;
        self.reload_plans()?;
        Ok(plan)
    }

    /// Deletes a user plan. An active workout started from it keeps running.
    /// # Errors
    /// `Error::PlanNotFound`, `Error::CannotDeleteSystemPlan`, or `Error::Storage`.
    pub fn delete_workout(&mut self, plan_id: &str) -> Result<(), Error> {
        if !plans::delete(self.store.as_ref(), plan_id)? {
            return Err(Error::PlanNotFound(plan_id.to_string()));
        }
        self.reload_plans()
    }

    pub fn favorite_workouts(&self) -> Vec<&WorkoutPlan> {
        self.workout_plans.iter().filter(|p| p.is_favorite).collect()
    }

    pub fn custom_workouts(&self) -> Vec<&WorkoutPlan> {
        self.plans_by_origin(PlanOrigin::User)
    }

    pub fn system_workouts(&self) -> Vec<&WorkoutPlan> {
        self.plans_by_origin(PlanOrigin::System)
    }

    fn plans_by_origin(&self, origin: PlanOrigin) -> Vec<&WorkoutPlan> {
        self.workout_plans
            .iter()
            .filter(|p| p.created_by == origin)
            .collect()
    }

    pub fn blank_template(&self) -> NewPlan {
        plans::blank_template(&self.preferences)
    }

    // --- Preferences ---

    /// # Errors
    /// `Error::Storage` if the preferences could not be saved.
    pub fn update_preferences(&mut self, update: PreferencesUpdate) -> Result<&Preferences, Error> {
        self.preferences.apply(update);
        storage::save_preferences(self.store.as_ref(), &self.preferences)?;
        Ok(&self.preferences)
    }
}
