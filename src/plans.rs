//src/plans.rs
//! Workout plan repository: built-in plans plus the user's own.
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::db::Store;
use crate::models::{
    Difficulty, ExerciseSession, NewPlan, PlanOrigin, PlanUpdate, Preferences, WorkoutPlan,
};
use crate::storage;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Plan '{0}' is built in and cannot be deleted.")]
    SystemPlan(String),
    #[error(transparent)]
    Storage(#[from] storage::Error),
}

fn new_plan_id() -> String {
    format!("custom_{}", Uuid::new_v4().simple())
}

/// All plans, seeding the built-in ones on first access.
pub fn list(store: &dyn Store) -> Result<Vec<WorkoutPlan>, Error> {
    if let Some(plans) = storage::load_plans(store)? {
        return Ok(plans);
    }
    let defaults = default_plans();
    storage::save_plans(store, &defaults)?;
    info!(count = defaults.len(), "Seeded built-in workout plans");
    Ok(defaults)
}

/// Stores a user plan built from `data` under a fresh id.
pub fn create(store: &dyn Store, data: NewPlan) -> Result<WorkoutPlan, Error> {
    let mut plans = list(store)?;
    let id = new_plan_id();

    let exercises = data.exercises.map_or_else(
        || placeholder_exercises(&id),
        |exercises| exercises.iter().map(ExerciseSession::as_template).collect(),
    );

    let mut tags = vec![
        "custom".to_string(),
        data.difficulty.to_string(),
        data.category.clone(),
    ];
    tags.extend(data.tags);
    let mut seen = std::collections::HashSet::new();
    tags.retain(|t| !t.trim().is_empty() && seen.insert(t.to_lowercase()));

    let plan = WorkoutPlan {
        id,
        name: data.name.trim().to_string(),
        description: data.description,
        duration: data.duration,
        difficulty: data.difficulty,
        category: data.category,
        calories: data.calories,
        exercises,
        is_favorite: data.is_favorite,
        created_by: PlanOrigin::User,
        tags,
    };
    plans.push(plan.clone());
    storage::save_plans(store, &plans)?;
    info!(plan_id = %plan.id, name = %plan.name, "Created custom plan");
    Ok(plan)
}

/// Merges `update` into the plan. `Ok(None)` if no plan has that id.
pub fn update(store: &dyn Store, id: &str, update: PlanUpdate) -> Result<Option<WorkoutPlan>, Error> {
    let mut plans = list(store)?;
    let Some(plan) = plans.iter_mut().find(|p| p.id == id) else {
        return Ok(None);
    };

    if let Some(name) = update.name {
        plan.name = name;
    }
    if let Some(description) = update.description {
        plan.description = description;
    }
    if let Some(duration) = update.duration {
        plan.duration = duration;
    }
    if let Some(difficulty) = update.difficulty {
        plan.difficulty = difficulty;
    }
    if let Some(category) = update.category {
        plan.category = category;
    }
    if let Some(calories) = update.calories {
        plan.calories = calories;
    }
    if let Some(exercises) = update.exercises {
        plan.exercises = exercises.iter().map(ExerciseSession::as_template).collect();
    }
    if let Some(is_favorite) = update.is_favorite {
        plan.is_favorite = is_favorite;
    }
    if let Some(tags) = update.tags {
        plan.tags = tags;
    }

    let updated = plan.clone();
    storage::save_plans(store, &plans)?;
    Ok(Some(updated))
}

/// Removes a user plan. Returns `false` if no plan has that id.
///
/// Does not check whether an active workout was started from the plan.
pub fn delete(store: &dyn Store, id: &str) -> Result<bool, Error> {
    let mut plans = list(store)?;
    let Some(pos) = plans.iter().position(|p| p.id == id) else {
        return Ok(false);
    };
    if plans[pos].created_by == PlanOrigin::System {
        return Err(Error::SystemPlan(id.to_string()));
    }
    plans.remove(pos);
    storage::save_plans(store, &plans)?;
    info!(plan_id = id, "Deleted plan");
    Ok(true)
}

/// Flips the favorite flag. Returns the new value, or `None` if not found.
pub fn toggle_favorite(store: &dyn Store, id: &str) -> Result<Option<bool>, Error> {
    let mut plans = list(store)?;
    let Some(plan) = plans.iter_mut().find(|p| p.id == id) else {
        return Ok(None);
    };
    plan.is_favorite = !plan.is_favorite;
    let now_favorite = plan.is_favorite;
    storage::save_plans(store, &plans)?;
    Ok(Some(now_favorite))
}

/// Copies a plan under a new id and name, owned by the user.
pub fn duplicate(store: &dyn Store, id: &str, new_name: &str) -> Result<Option<WorkoutPlan>, Error> {
    let mut plans = list(store)?;
    let Some(original) = plans.iter().find(|p| p.id == id) else {
        return Ok(None);
    };
    let copy = WorkoutPlan {
        id: format!("dup_{}_{}", Uuid::new_v4().simple(), original.id),
        name: new_name.trim().to_string(),
        exercises: original.exercises.iter().map(ExerciseSession::as_template).collect(),
        is_favorite: false,
        created_by: PlanOrigin::User,
        ..original.clone()
    };
    plans.push(copy.clone());
    storage::save_plans(store, &plans)?;
    info!(from = id, plan_id = %copy.id, "Duplicated plan");
    Ok(Some(copy))
}

/// Starting point for a new custom plan, using the user's rest preference.
pub fn blank_template(prefs: &Preferences) -> NewPlan {
    NewPlan {
        name: "My Custom Workout".into(),
        description: "Custom workout created by you".into(),
        duration: 30,
        difficulty: Difficulty::Intermediate,
        category: "custom".into(),
        calories: 250,
        exercises: Some(vec![ExerciseSession::new(
            "template_1",
            "Choose Exercise",
            3,
            10,
            prefs.default_rest_time,
        )]),
        is_favorite: false,
        tags: vec!["custom".into()],
    }
}

fn placeholder_exercises(plan_id: &str) -> Vec<ExerciseSession> {
    (1..=2)
        .map(|n| {
            ExerciseSession::new(
                &format!("{plan_id}_{n}"),
                &format!("Custom Exercise {n}"),
                3,
                10,
                60,
            )
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn system_plan(
    id: &str,
    name: &str,
    description: &str,
    duration: u32,
    difficulty: Difficulty,
    category: &str,
    calories: u32,
    exercises: Vec<ExerciseSession>,
    is_favorite: bool,
    tags: &[&str],
) -> WorkoutPlan {
    WorkoutPlan {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        duration,
        difficulty,
        category: category.into(),
        calories,
        exercises,
        is_favorite,
        created_by: PlanOrigin::System,
        tags: tags.iter().map(|t| (*t).to_string()).collect(),
    }
}

/// The plans every installation starts with.
pub fn default_plans() -> Vec<WorkoutPlan> {
    vec![
        system_plan(
            "1",
            "Full Body Strength",
            "Complete full body workout for all muscle groups",
            45,
            Difficulty::Intermediate,
            "strength",
            320,
            vec![
                ExerciseSession::new("1", "Push Ups", 3, 15, 60),
                ExerciseSession::new("2", "Squats", 3, 12, 60),
                ExerciseSession::new("3", "Pull Ups", 3, 10, 60),
            ],
            false,
            &["full body", "strength"],
        ),
        system_plan(
            "2",
            "Cardio Blast",
            "High intensity cardio workout",
            30,
            Difficulty::Beginner,
            "cardio",
            280,
            vec![
                ExerciseSession::new("4", "Jumping Jacks", 3, 30, 45),
                ExerciseSession::new("5", "High Knees", 3, 20, 45),
            ],
            true,
            &["cardio", "fat burning"],
        ),
        system_plan(
            "3",
            "Morning Yoga",
            "Gentle morning yoga routine",
            20,
            Difficulty::Beginner,
            "yoga",
            120,
            vec![ExerciseSession::new("6", "Sun Salutations", 3, 5, 30)],
            false,
            &["yoga", "morning"],
        ),
        system_plan(
            "4",
            "Full Body Beginner",
            "Perfect for starting your fitness journey",
            30,
            Difficulty::Beginner,
            "strength",
            280,
            vec![
                ExerciseSession::new("7", "Jumping Jacks", 3, 30, 60),
                ExerciseSession::new("8", "Bodyweight Squats", 3, 15, 60),
                ExerciseSession::new("9", "Push-ups", 3, 10, 60),
                ExerciseSession::new("10", "Plank", 3, 1, 60).timed(30),
            ],
            false,
            &["full body", "beginner", "no equipment"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[test]
    fn first_access_seeds_defaults() -> Result<(), Error> {
        let store = MemoryStore::new();
        let plans = list(&store)?;
        assert_eq!(plans.len(), default_plans().len());
        assert!(plans.iter().all(|p| p.created_by == PlanOrigin::System));
        assert!(plans
            .iter()
            .flat_map(|p| &p.exercises)
            .all(|e| e.completed_sets == 0 && !e.completed));
        assert!(storage::load_plans(&store)?.is_some());
        Ok(())
    }

    #[test]
    fn create_tags_and_placeholders() -> Result<(), Error> {
        let store = MemoryStore::new();
        let plan = create(
            &store,
            NewPlan {
                name: "  Leg Day ".into(),
                difficulty: Difficulty::Advanced,
                category: "strength".into(),
                tags: vec!["Custom".into(), "legs".into()],
                ..NewPlan::default()
            },
        )?;
        assert_eq!(plan.name, "Leg Day");
        assert_eq!(plan.created_by, PlanOrigin::User);
        assert_eq!(plan.exercises.len(), 2);
        assert_eq!(plan.tags, ["custom", "advanced", "strength", "legs"]);
        assert_eq!(list(&store)?.into_iter().find(|p| p.id == plan.id), Some(plan));
        Ok(())
    }

    #[test]
    fn update_merges_fields() -> Result<(), Error> {
        let store = MemoryStore::new();
        let updated = update(
            &store,
            "1",
            PlanUpdate {
                name: Some("Strength+".into()),
                duration: Some(50),
                ..PlanUpdate::default()
            },
        )?
        .expect("plan 1 exists");
        assert_eq!(updated.name, "Strength+");
        assert_eq!(updated.duration, 50);
        assert_eq!(updated.category, "strength");
        assert_eq!(update(&store, "missing", PlanUpdate::default())?, None);
        Ok(())
    }

    #[test]
    fn system_plans_cannot_be_deleted() -> Result<(), Error> {
        let store = MemoryStore::new();
        assert!(matches!(delete(&store, "1"), Err(Error::SystemPlan(_))));
        let copy = duplicate(&store, "1", "My Strength")?.expect("plan 1 exists");
        assert_eq!(copy.created_by, PlanOrigin::User);
        assert!(!copy.is_favorite);
        assert!(delete(&store, &copy.id)?);
        assert!(!delete(&store, &copy.id)?);
        Ok(())
    }

    #[test]
    fn toggle_favorite_flips_and_persists() -> Result<(), Error> {
        let store = MemoryStore::new();
        assert_eq!(toggle_favorite(&store, "2")?, Some(false));
        assert_eq!(toggle_favorite(&store, "2")?, Some(true));
        assert_eq!(toggle_favorite(&store, "nope")?, None);
        assert_eq!(list(&store)?.iter().filter(|p| p.is_favorite).count(), 1);
        Ok(())
    }
}
