use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "srsw")]
#[command(about = "SRS Writer CLI - session management and specialist tooling", long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, short, global = true)]
    workspace: Option<PathBuf>,

    /// Configuration file, used ahead of the workspace and user config
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a daily file in the user log directory
    #[arg(long, global = true)]
    log_file: bool,

    /// Stream specialist loop events to stderr as JSON lines
    #[arg(long, global = true)]
    events: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and manage project sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Show the iteration budget a specialist would get
    Iterations {
        /// Specialist identifier, e.g. fr_writer
        specialist: String,
    },
    /// Run one specialist against the configured model
    Run {
        /// Specialist identifier, e.g. fr_writer
        specialist: String,
        /// What the specialist should do
        #[arg(long)]
        task: String,
    },
    /// Compress a specialist history file (JSON array of strings)
    Compress {
        /// Iteration the history is being prepared for
        #[arg(long)]
        current: u32,
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Show the Git branch, exit flag and the session it implies
    Status,
    /// Create a new project session
    New { name: String },
    /// Make another project the current one
    Switch { name: String },
    /// Rename a project directory and its session file
    Rename { old: String, new: String },
    /// Move a project to the workspace trash
    Delete { name: String },
    /// Run startup recovery and print the result
    Recover,
    /// List projects with a session file
    List,
    /// Leave the current project; the next recovery is skipped
    Exit {
        #[arg(long, default_value = "user exited project")]
        reason: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let logging = logging::init(cli.log_file, cli.events)?;
    let _file_guard = logging.file_guard;
    if let Some(events) = logging.events {
        logging::spawn_event_printer(events);
    }

    let ctx = commands::AppContext::load(cli.workspace, cli.config)?;

    match cli.command {
        Commands::Session { action } => match action {
            SessionAction::Status => commands::session::status(&ctx).await?,
            SessionAction::New { name } => commands::session::create(&ctx, &name).await?,
            SessionAction::Switch { name } => commands::session::switch(&ctx, &name).await?,
            SessionAction::Rename { old, new } => {
                commands::session::rename(&ctx, &old, &new).await?
            }
            SessionAction::Delete { name } => commands::session::delete(&ctx, &name).await?,
            SessionAction::Recover => commands::session::recover(&ctx).await?,
            SessionAction::List => commands::session::list(&ctx).await?,
            SessionAction::Exit { reason } => commands::session::exit(&ctx, &reason).await?,
        },
        Commands::Iterations { specialist } => commands::iterations::show(&ctx, &specialist)?,
        Commands::Run { specialist, task } => commands::run::run(&ctx, &specialist, &task).await?,
        Commands::Compress { current, file } => commands::compress::run(&ctx, current, &file)?,
    }

    Ok(())
}
