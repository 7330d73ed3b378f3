//! CLI frontend for Dramatis.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dramatis",
    about = "Dramatis: scene rosters, combat bookkeeping and narration checks",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which persisted scenes still lack a structured roster
    Inspect {
        /// JSON file with one scene snapshot or a list of them
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a scene's roster from a persisted snapshot
    Bootstrap {
        /// JSON file with the scene snapshot
        file: PathBuf,

        /// Print the persisted form (roster plus legacy lists) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify an actor's turn against a scene's roster
    Classify {
        /// JSON file with the scene snapshot
        file: PathBuf,

        /// Actor id or label
        actor: String,

        /// Force a turn type: narrator, player, non_player
        #[arg(long = "as")]
        turn_type: Option<String>,
    },

    /// Normalize raw narration output against a run context
    Normalize {
        /// File with the generator output (JSON, or text with a JSON block)
        file: PathBuf,

        /// JSON file with the run context's tool outcomes
        #[arg(short, long)]
        context: Option<PathBuf>,
    },

    /// Play a scripted scene with offline narration and print its journal
    Play {
        /// JSON script: a scene snapshot and a list of steps
        file: PathBuf,

        /// JSON session config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Journal format: markdown, text
        #[arg(short, long, default_value = "markdown")]
        format: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect { file, json } => commands::inspect::run(&file, json),
        Commands::Bootstrap { file, json } => commands::bootstrap::run(&file, json),
        Commands::Classify {
            file,
            actor,
            turn_type,
        } => commands::classify::run(&file, &actor, turn_type.as_deref()),
        Commands::Normalize { file, context } => {
            commands::normalize::run(&file, context.as_deref())
        }
        Commands::Play {
            file,
            config,
            format,
        } => commands::play::run(&file, config.as_deref(), &format),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
