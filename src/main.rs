//src/main.rs
mod cli; // Keep cli module for parsing args

use anyhow::{bail, Context, Result};
use chrono::Local;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io::{self, stdout, Write};
use std::thread;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use workout_session_lib::{
    get_config_path_util, load_config_util, ActiveWorkout, AppService, CompletedWorkout,
    CompletionData, Difficulty, Feel, NewPlan, Preferences, PreferencesUpdate, SessionDifficulty,
    StartOptions, TickEvent, WorkoutPlan, WorkoutStats, WorkoutStatus,
};

fn main() -> Result<()> {
    // --- Check for completion generation request FIRST ---
    let cli_args = cli::parse_args(); // Parse arguments once
    let export_csv = cli_args.export_csv;

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();

        eprintln!("Generating completion script for {}...", shell); // Print to stderr
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    init_tracing();

    // Initialize the application service (loads config, opens the DB, restores any workout)
    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        // --- Plan Commands ---
        cli::Commands::Plans { filter } => {
            let plans: Vec<&WorkoutPlan> = match filter {
                cli::PlanFilterCli::All => service.workout_plans().iter().collect(),
                cli::PlanFilterCli::Favorites => service.favorite_workouts(),
                cli::PlanFilterCli::Custom => service.custom_workouts(),
                cli::PlanFilterCli::System => service.system_workouts(),
            };
            if plans.is_empty() {
                println!("No workout plans found.");
            } else if export_csv {
                print_plans_csv(&plans)?;
            } else {
                print_plans_table(&plans, header_color(&service));
            }
        }
        cli::Commands::CreatePlan {
            name,
            description,
            difficulty,
            category,
            duration,
            tags,
        } => {
            let template = service.blank_template();
            let data = NewPlan {
                name,
                description: description.unwrap_or(template.description),
                duration: duration.unwrap_or(template.duration),
                difficulty: difficulty.map_or(template.difficulty, cli_difficulty_to_difficulty),
                category: category.unwrap_or(template.category),
                exercises: None,
                tags: tags
                    .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or_default(),
                ..template
            };
            match service.create_custom_workout(data) {
                Ok(plan) => println!(
                    "Created plan '{}' (ID: {}) with {} exercise(s).",
                    plan.name,
                    plan.id,
                    plan.exercises.len()
                ),
                Err(e) => bail!("Error creating plan: {}", e),
            }
        }
        cli::Commands::DuplicatePlan { id, name } => match service.duplicate_workout_plan(&id, &name) {
            Ok(plan) => println!("Duplicated plan '{}' as '{}' (ID: {}).", id, plan.name, plan.id),
            Err(e) => bail!("Error duplicating plan '{}': {}", id, e),
        },
        cli::Commands::DeletePlan { id } => match service.delete_workout(&id) {
            Ok(()) => println!("Deleted plan '{}'.", id),
            Err(e) => bail!("Error deleting plan '{}': {}", id, e),
        },
        cli::Commands::Favorite { id } => match service.toggle_favorite(&id) {
            Ok(true) => println!("Plan '{}' added to favorites.", id),
            Ok(false) => println!("Plan '{}' removed from favorites.", id),
            Err(e) => bail!("Error updating plan '{}': {}", id, e),
        },
        // --- Session Commands ---
        cli::Commands::Start { id, sets, reps, rest } => {
            let options = StartOptions {
                custom_sets: cli::parse_overrides(sets.as_deref()).context("Invalid --sets")?,
                custom_reps: cli::parse_overrides(reps.as_deref()).context("Invalid --reps")?,
                custom_rest_times: cli::parse_overrides(rest.as_deref())
                    .context("Invalid --rest")?,
            };
            match service.start_workout_by_id(&id, &options) {
                Ok(workout) => {
                    println!("Started '{}'.", workout.plan_name);
                    print_status(&workout, service.preferences());
                }
                Err(e) => bail!("Error starting workout: {}", e),
            }
        }
        cli::Commands::Status => match service.active_workout() {
            Some(workout) => print_status(workout, service.preferences()),
            None => println!("No workout in progress."),
        },
        cli::Commands::Set => {
            let finish_ready = match service.complete_set() {
                Ok(ready) => ready,
                Err(e) => bail!("Error completing set: {}", e),
            };
            if finish_ready {
                println!("All exercises done. Run `finish` to save the workout.");
            } else if let Some(workout) = service.active_workout() {
                print_status(workout, service.preferences());
            }
        }
        cli::Commands::SkipRest => {
            if let Err(e) = service.skip_rest() {
                bail!("Error skipping rest: {}", e);
            }
            println!("Rest skipped.");
        }
        cli::Commands::Pause => {
            if let Err(e) = service.pause_workout() {
                bail!("Error pausing workout: {}", e);
            }
            println!("Workout paused at {}.", format_timer(service.timer()));
        }
        cli::Commands::Resume => {
            if let Err(e) = service.resume_workout() {
                bail!("Error resuming workout: {}", e);
            }
            println!("Workout resumed.");
        }
        cli::Commands::Cancel => {
            let had_workout = service.active_workout().is_some();
            if let Err(e) = service.cancel_workout() {
                bail!("Error cancelling workout: {}", e);
            }
            if had_workout {
                println!("Workout cancelled. Nothing was recorded.");
            } else {
                println!("No workout in progress.");
            }
        }
        cli::Commands::Finish {
            rating,
            notes,
            feel,
            difficulty,
        } => {
            let data = CompletionData {
                rating,
                notes,
                feel: feel.map(cli_feel_to_feel),
                difficulty: difficulty.map(cli_session_difficulty_to_difficulty),
            };
            match service.complete_workout(data) {
                Ok(entry) => println!(
                    "Workout '{}' saved: {} min, {} kcal, {} set(s).",
                    entry.plan_name,
                    entry.duration,
                    entry.calories_burned,
                    entry.exercises.iter().map(|e| e.completed_sets).sum::<u32>()
                ),
                Err(e) => bail!("Error finishing workout: {}", e),
            }
        }
        cli::Commands::Tick { seconds } => {
            for _ in 0..seconds {
                let event = service.tick().context("Failed to advance the session clock")?;
                if event == TickEvent::Idle {
                    println!("Clock is not running (no active workout, or paused).");
                    break;
                }
                report_tick(event);
            }
            if let Some(workout) = service.active_workout() {
                print_status(workout, service.preferences());
            }
        }
        cli::Commands::Watch => run_watch(&mut service)?,
        // --- History & Stats ---
        cli::Commands::History { limit } => {
            let history: Vec<&CompletedWorkout> =
                service.workout_history().into_iter().take(limit).collect();
            if history.is_empty() {
                println!("No completed workouts yet.");
            } else if export_csv {
                print_history_csv(&history)?;
            } else {
                print_history_table(&history, header_color(&service));
            }
        }
        cli::Commands::Stats => print_stats(&service.stats(), header_color(&service)),
        cli::Commands::Prefs {
            rest_time,
            set_duration,
            auto_rest,
            weekly_goal,
        } => {
            let update = PreferencesUpdate {
                default_rest_time: rest_time,
                default_set_duration: set_duration,
                auto_start_rest_timer: auto_rest,
                weekly_goal,
            };
            if update != PreferencesUpdate::default() {
                if let Err(e) = service.update_preferences(update) {
                    bail!("Error saving preferences: {}", e);
                }
                println!("Preferences updated.");
            }
            print_preferences(service.preferences());
        }
        cli::Commands::DbPath => {
            println!("Database file is located at: {:?}", service.get_db_path());
        }
        cli::Commands::ConfigPath => {
            println!("Config file is located at: {:?}", service.get_config_path());
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the config's `log_level`. Logs go to stderr.
fn init_tracing() {
    let fallback = get_config_path_util()
        .ok()
        .and_then(|path| load_config_util(&path).ok())
        .map_or_else(|| "warn".to_string(), |config| config.log_level);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn header_color(service: &AppService) -> Color {
    workout_session_lib::parse_color(&service.config.theme.header_color)
        .map(Color::from)
        .unwrap_or(Color::Green) // Fallback
}

/// Ticks once per second until the workout is ready to finish or stops.
fn run_watch(service: &mut AppService) -> Result<()> {
    match service.active_workout() {
        None => {
            println!("No workout in progress.");
            return Ok(());
        }
        Some(workout) if workout.status == WorkoutStatus::Paused => {
            println!("Workout is paused. Run `resume` first.");
            return Ok(());
        }
        Some(_) => {}
    }

    println!("Watching workout. Press Ctrl+C to stop; progress is saved every second.");
    loop {
        thread::sleep(Duration::from_secs(1));
        let event = service.tick().context("Failed to advance the session clock")?;
        let Some(workout) = service.active_workout() else {
            break;
        };
        print!("\r{}", status_line(workout));
        stdout().flush()?;

        if matches!(event, TickEvent::RestFinished | TickEvent::SetAutoCompleted { .. }) {
            println!();
            report_tick(event);
        }
        if event == TickEvent::Idle || workout.is_finish_ready() {
            break;
        }
    }
    println!();
    if service.active_workout().is_some_and(ActiveWorkout::is_finish_ready) {
        println!("All exercises done. Run `finish` to save the workout.");
    }
    Ok(())
}

fn report_tick(event: TickEvent) {
    match event {
        TickEvent::RestFinished => println!("Rest over. Next set!"),
        TickEvent::SetAutoCompleted { finish_ready: true } => {
            println!("Final set completed.");
        }
        TickEvent::SetAutoCompleted { finish_ready: false } => println!("Set completed."),
        TickEvent::Idle | TickEvent::Counting { .. } => {}
    }
}

fn format_timer(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn status_line(workout: &ActiveWorkout) -> String {
    let phase = if workout.is_finish_ready() {
        "done"
    } else if workout.is_resting {
        "rest"
    } else {
        "set"
    };
    let exercise = workout
        .current_exercise()
        .map_or("-", |exercise| exercise.name.as_str());
    format!(
        "[{}] {} {} | set {} | {:.0}% ",
        phase,
        format_timer(workout.timer),
        exercise,
        workout.current_set,
        workout.progress() * 100.0
    )
}

fn print_status(workout: &ActiveWorkout, prefs: &Preferences) {
    println!(
        "{} ({}) started {}",
        workout.plan_name,
        workout.status,
        workout
            .start_time
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
    );
    if workout.is_finish_ready() {
        println!("All {} sets done. Run `finish` to save.", workout.total_sets());
        return;
    }
    if let Some(exercise) = workout.current_exercise() {
        println!(
            "Exercise {}/{}: {} - set {}/{} x {} reps",
            workout.current_exercise_index + 1,
            workout.exercises.len(),
            exercise.name,
            workout.current_set,
            exercise.sets,
            exercise.reps
        );
    }
    if workout.is_resting {
        println!("Resting: {} left", format_timer(workout.timer));
        if let Some(next) = workout.next_exercise() {
            println!("Up next: {}", next.name);
        }
    } else if workout.timer > 0 {
        println!("Set timer: {}", format_timer(workout.timer));
    } else if !prefs.auto_start_rest_timer {
        println!("Rest timer is off; complete the set when ready.");
    }
    println!(
        "Progress: {}/{} sets ({:.0}%), {} s active, ~{} kcal",
        workout.total_sets_completed,
        workout.total_sets(),
        workout.progress() * 100.0,
        workout.total_duration,
        workout.calories_burned
    );
}

fn print_plans_table(plans: &[&WorkoutPlan], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Name").fg(header_color),
            Cell::new("Difficulty").fg(header_color),
            Cell::new("Category").fg(header_color),
            Cell::new("Duration (min)").fg(header_color),
            Cell::new("Exercises").fg(header_color),
            Cell::new("Origin").fg(header_color),
            Cell::new("Fav").fg(header_color),
        ]);

    for plan in plans {
        let name = if plan.is_favorite {
            Cell::new(&plan.name).add_attribute(Attribute::Bold)
        } else {
            Cell::new(&plan.name)
        };
        table.add_row(vec![
            Cell::new(&plan.id),
            name,
            Cell::new(plan.difficulty.to_string()),
            Cell::new(&plan.category),
            Cell::new(plan.duration.to_string()),
            Cell::new(plan.exercises.len().to_string()),
            Cell::new(plan.created_by.to_string()),
            Cell::new(if plan.is_favorite { "*" } else { "" }),
        ]);
    }
    println!("{table}");
}

fn print_plans_csv(plans: &[&WorkoutPlan]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "ID",
        "Name",
        "Difficulty",
        "Category",
        "Duration_Min",
        "Exercises",
        "Origin",
        "Favorite",
        "Tags",
    ])?;
    for plan in plans {
        writer.write_record([
            plan.id.clone(),
            plan.name.clone(),
            plan.difficulty.to_string(),
            plan.category.clone(),
            plan.duration.to_string(),
            plan.exercises.len().to_string(),
            plan.created_by.to_string(),
            plan.is_favorite.to_string(),
            plan.tags.join(";"),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_history_table(history: &[&CompletedWorkout], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Finished (Local)").fg(header_color),
            Cell::new("Plan").fg(header_color),
            Cell::new("Duration (min)").fg(header_color),
            Cell::new("Calories").fg(header_color),
            Cell::new("Sets").fg(header_color),
            Cell::new("Rating").fg(header_color),
            Cell::new("Feel").fg(header_color),
            Cell::new("Notes").fg(header_color),
        ]);

    for entry in history {
        table.add_row(vec![
            Cell::new(
                entry
                    .end_time
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
            ),
            Cell::new(&entry.plan_name),
            Cell::new(entry.duration.to_string()),
            Cell::new(entry.calories_burned.to_string()),
            Cell::new(
                entry
                    .exercises
                    .iter()
                    .map(|e| e.completed_sets)
                    .sum::<u32>()
                    .to_string(),
            ),
            Cell::new(entry.rating.map_or_else(|| "-".to_string(), |r| r.to_string())),
            Cell::new(entry.feel.map_or_else(|| "-".to_string(), |f| f.to_string())),
            Cell::new(entry.notes.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

fn print_history_csv(history: &[&CompletedWorkout]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "ID",
        "Plan_ID",
        "Plan",
        "Start_Local",
        "End_Local",
        "Duration_Min",
        "Calories",
        "Rating",
        "Feel",
        "Difficulty",
        "Notes",
    ])?;
    for entry in history {
        writer.write_record([
            entry.id.clone(),
            entry.plan_id.clone(),
            entry.plan_name.clone(),
            entry.start_time.with_timezone(&Local).to_rfc3339(),
            entry.end_time.with_timezone(&Local).to_rfc3339(),
            entry.duration.to_string(),
            entry.calories_burned.to_string(),
            entry.rating.map(|r| r.to_string()).unwrap_or_default(),
            entry.feel.map(|f| f.to_string()).unwrap_or_default(),
            entry.difficulty.map(|d| d.to_string()).unwrap_or_default(),
            entry.notes.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_stats(stats: &WorkoutStats, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Statistic").fg(header_color),
            Cell::new("Value").fg(header_color),
        ]);

    let last = stats.last_workout_date.map_or_else(
        || "Never".to_string(),
        |d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    );
    let rows = [
        ("Total workouts", stats.total_workouts.to_string()),
        ("This week", stats.this_week_workouts.to_string()),
        (
            "Weekly goal",
            format!(
                "{}/{} ({:.0}%)",
                stats.weekly_goal.completed, stats.weekly_goal.target, stats.weekly_goal.percent
            ),
        ),
        ("Streak (days)", stats.streak.to_string()),
        ("Total hours", format!("{:.1}", stats.total_hours)),
        ("Avg duration (min)", format!("{:.1}", stats.avg_workout_duration)),
        ("Average rating", format!("{:.1}", stats.average_rating)),
        ("Total calories", stats.total_calories.to_string()),
        (
            "Most frequent plan",
            stats.most_frequent_plan.clone().unwrap_or_else(|| "-".to_string()),
        ),
        ("Last workout", last),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    println!("{table}");
}

fn print_preferences(prefs: &Preferences) {
    println!("Default rest time: {} s", prefs.default_rest_time);
    println!("Default set duration: {} s", prefs.default_set_duration);
    println!(
        "Auto-start rest timer: {}",
        if prefs.auto_start_rest_timer { "on" } else { "off" }
    );
    println!("Weekly goal: {} workouts", prefs.weekly_goal);
}

/// Converts CLI difficulty enum to the library's plan difficulty
fn cli_difficulty_to_difficulty(cli: cli::DifficultyCli) -> Difficulty {
    match cli {
        cli::DifficultyCli::Beginner => Difficulty::Beginner,
        cli::DifficultyCli::Intermediate => Difficulty::Intermediate,
        cli::DifficultyCli::Advanced => Difficulty::Advanced,
    }
}

fn cli_session_difficulty_to_difficulty(cli: cli::SessionDifficultyCli) -> SessionDifficulty {
    match cli {
        cli::SessionDifficultyCli::Easy => SessionDifficulty::Easy,
        cli::SessionDifficultyCli::Medium => SessionDifficulty::Medium,
        cli::SessionDifficultyCli::Hard => SessionDifficulty::Hard,
    }
}

fn cli_feel_to_feel(cli: cli::FeelCli) -> Feel {
    match cli {
        cli::FeelCli::Great => Feel::Great,
        cli::FeelCli::Good => Feel::Good,
        cli::FeelCli::Ok => Feel::Ok,
        cli::FeelCli::Tired => Feel::Tired,
    }
}
