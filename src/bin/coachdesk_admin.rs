//! coachdesk administrator command line
//!
//! Talks to a running `coachdesk-server` through the admin REST API.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use coachdesk::api::NewExercise;
use coachdesk::client::AdminClient;
use coachdesk::training::{ExerciseType, MuscleGroup};
use coachdesk::{CoachResult, UserId};

#[derive(Debug, Parser)]
#[command(name = "coachdesk-admin", version, about = "coachdesk administrator client")]
struct Cli {
    /// Server base URL.
    #[arg(long, env = "COACHDESK_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Administrator username.
    #[arg(short, long, env = "COACHDESK_ADMIN_USER")]
    username: String,

    /// Administrator password.
    #[arg(short, long, env = "COACHDESK_ADMIN_PASSWORD", hide_env_values = true)]
    password: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the server answers.
    Health,
    /// List every account.
    Users,
    /// List professionals awaiting approval.
    Pending,
    /// Approve a professional.
    Approve {
        /// User id.
        id: UserId,
    },
    /// Remove a user and everything they own.
    Remove {
        /// User id.
        id: UserId,
    },
    /// Run the maintenance sweep now.
    Sweep,
    /// Add a catalog exercise.
    AddExercise {
        /// Unique name.
        name: String,
        /// Loading style, e.g. FREE_WEIGHTS.
        #[arg(long, value_parser = parse_upper::<ExerciseType>)]
        exercise_type: ExerciseType,
        /// Muscles worked, e.g. CHEST (repeatable).
        #[arg(long = "muscle", value_parser = parse_upper::<MuscleGroup>)]
        muscle_groups: Vec<MuscleGroup>,
        /// How to perform it.
        #[arg(long, default_value = "")]
        description: String,
        /// Demonstration video.
        #[arg(long)]
        video: Option<String>,
    },
}

/// Parses a SCREAMING_SNAKE_CASE enum through its serde name.
fn parse_upper<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, String> {
    let quoted = serde_json::Value::String(value.to_ascii_uppercase().replace('-', "_"));
    serde_json::from_value(quoted).map_err(|e| e.to_string())
}

fn print<T: Serialize>(value: &T) -> CoachResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| coachdesk::CoachError::internal(format!("cannot render response: {e}")))?;
    println!("{text}");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CoachResult<()> {
    let client = AdminClient::new(cli.url, cli.username, cli.password)?;
    match cli.command {
        Command::Health => print(&client.health().await?),
        Command::Users => print(&client.list_users().await?),
        Command::Pending => print(&client.pending_professionals().await?),
        Command::Approve { id } => print(&client.approve_professional(id).await?),
        Command::Remove { id } => print(&client.remove_user(id).await?),
        Command::Sweep => print(&client.run_sweep().await?),
        Command::AddExercise {
            name,
            exercise_type,
            muscle_groups,
            description,
            video,
        } => {
            let exercise = NewExercise {
                name,
                description,
                video_link: video,
                exercise_type,
                muscle_groups,
            };
            print(&client.add_exercise(&exercise).await?)
        }
    }
}
