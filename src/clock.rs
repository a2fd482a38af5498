//src/clock.rs
use tracing::debug;

use crate::calories::CaloriePolicy;
use crate::models::{ActiveWorkout, Preferences, WorkoutStatus};
use crate::session::set_countdown;

/// What happened during one clock second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// Clock stopped, workout paused, or nothing in progress.
    Idle,
    /// Timer counted down and is still above zero, or is parked at zero
    /// (finish-ready, or a set length of 0 disables the set countdown).
    Counting { remaining: u32 },
    /// Rest countdown reached zero and the rest period ended.
    RestFinished,
    /// Set countdown reached zero and the set was completed on the user's behalf.
    SetAutoCompleted { finish_ready: bool },
}

/// The one-second driver of the active workout.
///
/// The clock holds no timer value of its own; it only counts down
/// `ActiveWorkout::timer`. Whoever owns the clock calls [`SessionClock::tick`]
/// once per second.
#[derive(Debug, Default)]
pub struct SessionClock {
    running: bool,
    ticks: u64,
}

impl SessionClock {
    pub const fn new() -> Self {
        Self {
            running: false,
            ticks: 0,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            debug!("Session clock started");
        }
        self.running = true;
    }

    pub fn stop(&mut self) {
        if self.running {
            debug!(ticks = self.ticks, "Session clock stopped");
        }
        self.running = false;
    }

    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Advances `workout` by one second.
    ///
    /// Does nothing unless the clock is running and the workout is active.
    /// When the timer hits zero, rest ends (as if skipped), or the set phase
    /// completes the current set. A set phase entered with the timer at zero
    /// (after a rest) first loads the exercise's set countdown.
    pub fn tick(
        &mut self,
        workout: &mut ActiveWorkout,
        prefs: &Preferences,
        policy: &dyn CaloriePolicy,
    ) -> TickEvent {
        if !self.running || workout.status != WorkoutStatus::Active {
            return TickEvent::Idle;
        }
        self.ticks += 1;
        workout.record_active_second(policy);

        if workout.timer == 0 {
            if workout.is_resting {
                workout.skip_rest();
                return TickEvent::RestFinished;
            }
            if workout.is_finish_ready() {
                return TickEvent::Counting { remaining: 0 };
            }
            // Set phase after a rest: count down this exercise's set length.
            workout.timer = workout
                .current_exercise()
                .map_or(0, |exercise| set_countdown(exercise, prefs));
            if workout.timer == 0 {
                return TickEvent::Counting { remaining: 0 };
            }
            debug!(workout_id = %workout.id, countdown = workout.timer, "Set countdown started");
        }
        workout.timer -= 1;
        if workout.timer > 0 {
            return TickEvent::Counting {
                remaining: workout.timer,
            };
        }

        if workout.is_resting {
            workout.skip_rest();
            TickEvent::RestFinished
        } else if workout.is_finish_ready() {
            TickEvent::Counting { remaining: 0 }
        } else {
            let outcome = workout.complete_set(prefs);
            TickEvent::SetAutoCompleted {
                finish_ready: outcome.is_finish_ready(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calories::FlatRatePolicy;
    use crate::models::{Difficulty, ExerciseSession, PlanOrigin, StartOptions, WorkoutPlan};
    use chrono::Utc;

    fn workout(prefs: &Preferences) -> ActiveWorkout {
        let plan = WorkoutPlan {
            id: "p".into(),
            name: "Plan".into(),
            description: String::new(),
            duration: 10,
            difficulty: Difficulty::Beginner,
            category: "test".into(),
            calories: 50,
            exercises: vec![ExerciseSession::new("e1", "Jumping Jacks", 2, 30, 3)],
            is_favorite: false,
            created_by: PlanOrigin::System,
            tags: vec![],
        };
        ActiveWorkout::start(&plan, prefs, &StartOptions::default(), Utc::now()).unwrap()
    }

    #[test]
    fn stopped_clock_does_not_count() {
        let prefs = Preferences::default();
        let mut w = workout(&prefs);
        let mut clock = SessionClock::new();
        let before = w.timer;
        assert_eq!(clock.tick(&mut w, &prefs, &FlatRatePolicy::default()), TickEvent::Idle);
        assert_eq!(w.timer, before);
    }

    #[test]
    fn paused_workout_keeps_timer() {
        let prefs = Preferences::default();
        let mut w = workout(&prefs);
        let mut clock = SessionClock::new();
        clock.start();
        w.pause();
        let before = w.timer;
        for _ in 0..10 {
            assert_eq!(clock.tick(&mut w, &prefs, &FlatRatePolicy::default()), TickEvent::Idle);
        }
        assert_eq!(w.timer, before);
        assert_eq!(w.total_duration, 0);
    }

    #[test]
    fn rest_expiry_ends_rest() {
        let prefs = Preferences::default();
        let policy = FlatRatePolicy::default();
        let mut w = workout(&prefs);
        let mut clock = SessionClock::new();
        clock.start();
        w.complete_set(&prefs);
        assert!(w.is_resting);
        assert_eq!(w.timer, 3);

        assert_eq!(clock.tick(&mut w, &prefs, &policy), TickEvent::Counting { remaining: 2 });
        assert_eq!(clock.tick(&mut w, &prefs, &policy), TickEvent::Counting { remaining: 1 });
        assert_eq!(clock.tick(&mut w, &prefs, &policy), TickEvent::RestFinished);
        assert!(!w.is_resting);
        assert_eq!(w.timer, 0);
        assert_eq!(w.current_set, 2, "rest expiry does not advance sets");

        // The next second starts the set countdown for set 2.
        assert_eq!(clock.tick(&mut w, &prefs, &policy), TickEvent::Counting { remaining: 44 });
        assert_eq!(w.exercises[0].completed_sets, 1);
    }

    #[test]
    fn set_countdown_reloads_after_skipped_rest() {
        let prefs = Preferences::default();
        let policy = FlatRatePolicy::default();
        let mut w = workout(&prefs);
        w.exercises[0] = w.exercises[0].clone().timed(3);
        let mut clock = SessionClock::new();
        clock.start();
        w.complete_set(&prefs);
        w.skip_rest();
        assert_eq!(w.timer, 0);

        assert_eq!(clock.tick(&mut w, &prefs, &policy), TickEvent::Counting { remaining: 2 });
        assert_eq!(clock.tick(&mut w, &prefs, &policy), TickEvent::Counting { remaining: 1 });
        assert_eq!(
            clock.tick(&mut w, &prefs, &policy),
            TickEvent::SetAutoCompleted { finish_ready: true }
        );
        // Finish-ready: the timer stays parked.
        assert_eq!(clock.tick(&mut w, &prefs, &policy), TickEvent::Counting { remaining: 0 });
    }

    #[test]
    fn zero_set_length_disables_auto_complete() {
        let prefs = Preferences {
            default_set_duration: 0,
            ..Preferences::default()
        };
        let policy = FlatRatePolicy::default();
        let mut w = workout(&prefs);
        let mut clock = SessionClock::new();
        clock.start();
        for _ in 0..100 {
            assert_eq!(clock.tick(&mut w, &prefs, &policy), TickEvent::Counting { remaining: 0 });
        }
        assert_eq!(w.exercises[0].completed_sets, 0);
    }

    #[test]
    fn set_countdown_expiry_completes_set() {
        let prefs = Preferences {
            default_set_duration: 2,
            ..Preferences::default()
        };
        let policy = FlatRatePolicy::default();
        let mut w = workout(&prefs);
        let mut clock = SessionClock::new();
        clock.start();

        assert_eq!(clock.tick(&mut w, &prefs, &policy), TickEvent::Counting { remaining: 1 });
        assert_eq!(
            clock.tick(&mut w, &prefs, &policy),
            TickEvent::SetAutoCompleted { finish_ready: false }
        );
        assert_eq!(w.exercises[0].completed_sets, 1);
        assert!(w.is_resting);
    }
}
