//src/storage.rs
//! Typed JSON records on top of a [`Store`].
//!
//! Anything that fails to parse is treated as absent: the caller falls back to
//! defaults instead of refusing to start.
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::db::{self, RecordKey, Store};
use crate::models::{ActiveWorkout, CompletedWorkout, Preferences, WorkoutPlan, WorkoutStatus};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage access failed: {0}")]
    Store(#[from] db::Error),
    #[error("Failed to serialize record '{key}': {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

fn key_name(key: RecordKey) -> &'static str {
    key.into()
}

/// Reads and parses a record. `Ok(None)` for both missing and malformed data.
fn read<T: DeserializeOwned>(store: &dyn Store, key: RecordKey) -> Result<Option<T>, Error> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(record = key_name(key), error = %e, "Ignoring malformed stored record");
            Ok(None)
        }
    }
}

fn write<T: Serialize + ?Sized>(store: &dyn Store, key: RecordKey, value: &T) -> Result<(), Error> {
    let json = serde_json::to_string(value).map_err(|source| Error::Serialize {
        key: key_name(key),
        source,
    })?;
    store.set(key, &json)?;
    Ok(())
}

/// Stored plans, or `None` when nothing usable has been saved yet.
pub fn load_plans(store: &dyn Store) -> Result<Option<Vec<WorkoutPlan>>, Error> {
    read(store, RecordKey::WorkoutPlans)
}

pub fn save_plans(store: &dyn Store, plans: &[WorkoutPlan]) -> Result<(), Error> {
    write(store, RecordKey::WorkoutPlans, plans)
}

/// Restores the active workout snapshot.
///
/// Snapshots that could not have been produced by the state machine (no
/// exercises, counters that disagree with the per-exercise progress, a
/// leftover `completed` status) are discarded like malformed data.
pub fn load_active(store: &dyn Store) -> Result<Option<ActiveWorkout>, Error> {
    let active: Option<ActiveWorkout> = read(store, RecordKey::ActiveWorkout)?;
    Ok(active.filter(|workout| {
        let usable = workout.status != WorkoutStatus::Completed && workout.is_consistent();
        if !usable {
            warn!(workout_id = %workout.id, "Discarding inconsistent active workout snapshot");
        }
        usable
    }))
}

pub fn save_active(store: &dyn Store, workout: &ActiveWorkout) -> Result<(), Error> {
    write(store, RecordKey::ActiveWorkout, workout)
}

pub fn clear_active(store: &dyn Store) -> Result<(), Error> {
    store.remove(RecordKey::ActiveWorkout)?;
    Ok(())
}

/// History in the order it was recorded (oldest first).
pub fn load_history(store: &dyn Store) -> Result<Vec<CompletedWorkout>, Error> {
    Ok(read(store, RecordKey::WorkoutHistory)?.unwrap_or_default())
}

pub fn save_history(store: &dyn Store, history: &[CompletedWorkout]) -> Result<(), Error> {
    write(store, RecordKey::WorkoutHistory, history)
}

/// Drops the oldest entries so at most `limit` remain.
pub fn trim_history(history: &mut Vec<CompletedWorkout>, limit: usize) {
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}

/// Stored preferences; writes the defaults on first access.
pub fn load_preferences(store: &dyn Store) -> Result<Preferences, Error> {
    if let Some(prefs) = read(store, RecordKey::Preferences)? {
        return Ok(prefs);
    }
    let defaults = Preferences::default();
    write(store, RecordKey::Preferences, &defaults)?;
    Ok(defaults)
}

pub fn save_preferences(store: &dyn Store, prefs: &Preferences) -> Result<(), Error> {
    write(store, RecordKey::Preferences, prefs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{ExerciseSession, ExerciseSnapshot};
    use chrono::{Duration, TimeZone, Utc};

    fn sample_active() -> ActiveWorkout {
        ActiveWorkout {
            id: "w1".into(),
            plan_id: "p1".into(),
            plan_name: "Plan".into(),
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            exercises: vec![ExerciseSession {
                completed_sets: 1,
                ..ExerciseSession::new("e1", "Squats", 3, 12, 60)
            }],
            current_exercise_index: 0,
            current_set: 2,
            total_sets_completed: 1,
            completed_exercises: 0,
            status: WorkoutStatus::Paused,
            timer: 17,
            is_resting: true,
            total_duration: 95,
            calories_burned: 12,
        }
    }

    fn entry(id: &str) -> CompletedWorkout {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        CompletedWorkout {
            id: id.into(),
            plan_id: "p1".into(),
            plan_name: "Plan".into(),
            start_time: start,
            end_time: start + Duration::minutes(30),
            duration: 30,
            calories_burned: 240,
            exercises: vec![ExerciseSnapshot {
                name: "Squats".into(),
                sets: 3,
                reps: 12,
                completed_sets: 3,
            }],
            rating: Some(4),
            notes: None,
            feel: None,
            difficulty: None,
        }
    }

    #[test]
    fn active_workout_survives_a_round_trip() -> Result<(), Error> {
        let store = MemoryStore::new();
        let active = sample_active();
        save_active(&store, &active)?;
        assert_eq!(load_active(&store)?, Some(active));
        clear_active(&store)?;
        assert_eq!(load_active(&store)?, None);
        Ok(())
    }

    #[test]
    fn malformed_records_read_as_absent() -> Result<(), Error> {
        let store = MemoryStore::new();
        store.put_raw(RecordKey::WorkoutPlans, "[{\"id\": ");
        store.put_raw(RecordKey::WorkoutHistory, "not json");
        store.put_raw(RecordKey::ActiveWorkout, "{\"id\": 3}");
        assert_eq!(load_plans(&store)?, None);
        assert!(load_history(&store)?.is_empty());
        assert_eq!(load_active(&store)?, None);
        Ok(())
    }

    #[test]
    fn inconsistent_active_snapshot_is_discarded() -> Result<(), Error> {
        let store = MemoryStore::new();
        let mut active = sample_active();
        active.current_exercise_index = 4;
        save_active(&store, &active)?;
        assert_eq!(load_active(&store)?, None);

        // Parses fine, but the second exercise is current while the first
        // was never completed.
        let mut skewed = sample_active();
        skewed.exercises = vec![
            ExerciseSession::new("e1", "Squats", 1, 12, 60),
            ExerciseSession::new("e2", "Lunges", 1, 10, 60),
        ];
        skewed.current_exercise_index = 1;
        skewed.current_set = 1;
        skewed.total_sets_completed = 0;
        save_active(&store, &skewed)?;
        assert_eq!(load_active(&store)?, None);

        let mut miscounted = sample_active();
        miscounted.current_set = 3;
        save_active(&store, &miscounted)?;
        assert_eq!(load_active(&store)?, None);
        Ok(())
    }

    #[test]
    fn trim_history_drops_oldest() {
        let mut history: Vec<_> = (0..5).map(|i| entry(&i.to_string())).collect();
        trim_history(&mut history, 3);
        let ids: Vec<_> = history.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["2", "3", "4"]);
    }

    #[test]
    fn preferences_default_written_on_first_read() -> Result<(), Error> {
        let store = MemoryStore::new();
        let prefs = load_preferences(&store)?;
        assert_eq!(prefs, Preferences::default());
        assert!(store.raw(RecordKey::Preferences).is_some());
        Ok(())
    }

    #[test]
    fn write_failure_is_reported() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            save_active(&store, &sample_active()),
            Err(Error::Store(db::Error::Unavailable(_)))
        ));
    }
}
