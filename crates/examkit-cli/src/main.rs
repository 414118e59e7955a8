//! examkit CLI: take timed exams from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;
mod console;

#[derive(Parser)]
#[command(name = "examkit", version, about = "Timed, monitored exam sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start (or resume) an exam
    Take {
        /// Exam id
        exam_id: String,

        /// Student id (defaults to `student_id` in the config)
        #[arg(long)]
        student: Option<String>,

        /// Ask the server for a demo attempt
        #[arg(long)]
        demo: bool,

        /// Read exams from this directory instead of the configured source
        #[arg(long)]
        exam_dir: Option<PathBuf>,

        /// Directory for the submission file
        #[arg(long)]
        results: Option<PathBuf>,

        /// Disable the integrity monitor
        #[arg(long)]
        relaxed: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate exam files
    Validate {
        /// Path to an exam file or a directory of exams
        #[arg(long)]
        exam: PathBuf,
    },

    /// Inspect or remove cached progress
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Create a starter config and example exam
    Init,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cached progress for an exam
    Show {
        exam_id: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Delete cached progress for an exam
    Clear {
        exam_id: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examkit=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            exam_id,
            student,
            demo,
            exam_dir,
            results,
            relaxed,
            config,
        } => {
            commands::take::execute(commands::take::TakeArgs {
                exam_id,
                student,
                demo,
                exam_dir,
                results,
                relaxed,
                config,
            })
            .await
        }
        Commands::Validate { exam } => commands::validate::execute(exam),
        Commands::Cache { action } => match action {
            CacheAction::Show { exam_id, config } => commands::cache::show(exam_id, config),
            CacheAction::Clear { exam_id, config } => commands::cache::clear(exam_id, config),
        },
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
