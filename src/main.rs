use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use boardsync::config::{LogFormat, SyncConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "boardsync")]
#[command(version, about = "Kanban board sync client")]
pub struct Cli {
    /// Log at debug level for boardsync modules
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Path to boardsync.toml. Defaults to .boardsync/boardsync.toml, then the
    /// per-user config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and print the bearer token (use it as BOARDSYNC_TOKEN)
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BOARDSYNC_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List boards you own (or every board you can see with --all)
    Boards {
        #[arg(long)]
        all: bool,
    },
    /// Print a board's columns and tasks
    Show { board: String },
    /// Append a column to a board
    AddColumn { board: String, title: String },
    /// Append a task to a column
    AddTask {
        board: String,
        column: String,
        title: String,
    },
    /// Retitle a column
    RenameColumn {
        board: String,
        column: String,
        title: String,
    },
    /// Move a column to a zero-based index
    MoveColumn {
        board: String,
        column: String,
        index: usize,
    },
    /// Move a task into a column at a zero-based index
    MoveTask {
        board: String,
        task: String,
        /// Destination column (defaults to the task's current column)
        #[arg(long)]
        to: Option<String>,
        index: usize,
    },
    /// Open a board and follow peer updates and presence until Ctrl-C
    Watch { board: String },
    /// View, create or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default .boardsync/boardsync.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let project_dir = std::env::current_dir().context("Failed to get current directory")?;

    let mut config = SyncConfig::discover(cli.config.as_deref(), &project_dir)?;
    if cli.verbose {
        config.logging.filter = "info,boardsync=debug".to_string();
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }
    boardsync::logging::init_logging(&config.logging)?;

    match &cli.command {
        Commands::Login { email, password } => cmd::cmd_login(&config, email, password).await?,
        Commands::Boards { all } => cmd::cmd_boards(&config, *all).await?,
        Commands::Show { board } => cmd::cmd_show(&config, board).await?,
        Commands::AddColumn { board, title } => cmd::cmd_add_column(&config, board, title).await?,
        Commands::AddTask {
            board,
            column,
            title,
        } => cmd::cmd_add_task(&config, board, column, title).await?,
        Commands::RenameColumn {
            board,
            column,
            title,
        } => cmd::cmd_rename_column(&config, board, column, title).await?,
        Commands::MoveColumn {
            board,
            column,
            index,
        } => cmd::cmd_move_column(&config, board, column, *index).await?,
        Commands::MoveTask {
            board,
            task,
            to,
            index,
        } => cmd::cmd_move_task(&config, board, task, to.as_deref(), *index).await?,
        Commands::Watch { board } => cmd::cmd_watch(&config, board).await?,
        Commands::Config { command } => {
            cmd::cmd_config(&project_dir, cli.config.as_deref(), &config, command.clone())?
        }
    }

    Ok(())
}
