// src/cli.rs
use clap::{Command, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run workout sessions from the terminal", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Print list output as CSV instead of a table
    #[arg(long, global = true)]
    pub export_csv: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DifficultyCli {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionDifficultyCli {
    Easy,
    Medium,
    Hard,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeelCli {
    Great,
    Good,
    Ok,
    Tired,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanFilterCli {
    All,
    Favorites,
    Custom,
    System,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List workout plans
    Plans {
        #[arg(short, long, value_enum, default_value_t = PlanFilterCli::All)]
        filter: PlanFilterCli,
    },
    /// Create a custom workout plan
    CreatePlan {
        /// Name of the plan (e.g., "Leg Day")
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        difficulty: Option<DifficultyCli>,
        /// Category (e.g., "strength", "cardio")
        #[arg(short, long)]
        category: Option<String>,
        /// Estimated duration in minutes
        #[arg(long)]
        duration: Option<u32>,
        /// Comma-separated tags
        #[arg(short, long)]
        tags: Option<String>,
    },
    /// Copy a plan under a new name
    DuplicatePlan {
        id: String,
        #[arg(short, long)]
        name: String,
    },
    /// Delete one of your own plans
    DeletePlan { id: String },
    /// Toggle a plan's favorite flag
    Favorite { id: String },
    /// Start a workout from a plan
    Start {
        /// Plan ID (see `plans`)
        id: String,
        /// Comma-separated sets per exercise, 0 keeps the plan value (e.g., "4,0,2")
        #[arg(long)]
        sets: Option<String>,
        /// Comma-separated reps per exercise
        #[arg(long)]
        reps: Option<String>,
        /// Comma-separated rest seconds per exercise
        #[arg(long)]
        rest: Option<String>,
    },
    /// Show the workout in progress
    Status,
    /// Complete the current set
    Set,
    /// End the current rest period
    SkipRest,
    Pause,
    Resume,
    /// Abandon the workout in progress without recording it
    Cancel,
    /// Finish the workout and add it to the history
    Finish {
        /// Rating from 1 to 5
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: Option<u8>,
        #[arg(short, long)]
        notes: Option<String>,
        #[arg(long, value_enum)]
        feel: Option<FeelCli>,
        #[arg(long, value_enum)]
        difficulty: Option<SessionDifficultyCli>,
    },
    /// Advance the session clock by N seconds
    Tick {
        #[arg(default_value_t = 1)]
        seconds: u32,
    },
    /// Run the session clock in real time until the workout is ready to finish
    Watch,
    /// List completed workouts, newest first
    History {
        /// Show only the last N entries
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show workout statistics
    Stats,
    /// Show or change session preferences
    Prefs {
        /// Rest seconds used when an exercise has none
        #[arg(long)]
        rest_time: Option<u32>,
        /// Set countdown seconds for untimed exercises
        #[arg(long)]
        set_duration: Option<u32>,
        #[arg(long)]
        auto_rest: Option<bool>,
        /// Workouts per week
        #[arg(long)]
        weekly_goal: Option<u32>,
    },
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    /// Generate shell completion scripts
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> Command {
    Cli::command()
}

/// Parses "4,0,2" into per-exercise overrides.
pub fn parse_overrides(raw: Option<&str>) -> Result<Vec<u32>, std::num::ParseIntError> {
    raw.map_or_else(
        || Ok(Vec::new()),
        |s| {
            s.split(',')
                .map(|part| part.trim().parse::<u32>())
                .collect()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_parse() {
        assert_eq!(parse_overrides(Some("4, 0,2")).unwrap(), vec![4, 0, 2]);
        assert!(parse_overrides(None).unwrap().is_empty());
        assert!(parse_overrides(Some("4,x")).is_err());
    }
}
