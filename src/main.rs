use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use funban::NoteState;
use funban::config::{CliOverrides, FunbanConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "funban")]
#[command(version, about = "Realtime kanban board client")]
pub struct Cli {
    /// Debug logging for funban itself
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    /// Path to funban.toml (default: ./funban.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// REST base URL. Overrides funban.toml and FUNBAN_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// WebSocket URL. Overrides funban.toml and FUNBAN_WS_URL.
    #[arg(long, global = true)]
    pub ws_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the access token
    Login {
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
        /// Password (prompted if omitted)
        #[arg(long, env = "FUNBAN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored access token
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Change account password or email
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
    /// Show the board, following live changes
    Board {
        /// Print the board once and exit
        #[arg(long)]
        once: bool,
    },
    /// Manage team members
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Browse and save board snapshots
    History {
        #[command(subcommand)]
        command: HistoryCommands,
    },
    /// Show or create funban.toml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum AccountCommands {
    /// Change password (prompts for old and new)
    Password,
    /// Change the account email
    Email { new_email: String },
}

#[derive(Subcommand, Clone)]
pub enum UserCommands {
    /// List team members
    List,
    /// Add a team member
    Add {
        name: String,
        #[arg(short, long)]
        color: String,
    },
    /// Rename a team member (by id or name)
    Rename { user: String, name: String },
    /// Change a team member's color
    Color { user: String, color: String },
    /// Remove a team member and all their notes
    Remove { user: String },
}

#[derive(Subcommand, Clone)]
pub enum NoteCommands {
    /// Add a note to a column
    Add {
        text: String,
        /// Owner, by id or name
        #[arg(short, long)]
        owner: String,
        /// notes, todo, in_progress or done
        #[arg(short, long, default_value = "notes")]
        state: NoteState,
    },
    /// Change a note's text and/or column
    Edit {
        id: i64,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        state: Option<NoteState>,
    },
    /// Move a note directly above another note
    Before { id: i64, over: i64 },
    /// Move a note to the end of a column
    Last { id: i64, state: NoteState },
    /// Delete a note
    Remove { id: i64 },
    /// Duplicate a note
    Clone { id: i64 },
}

#[derive(Subcommand, Clone)]
pub enum HistoryCommands {
    /// List saved snapshots
    List,
    /// Show one snapshot
    Show { id: i64 },
    /// Show the most recent snapshot
    Last,
    /// Save the current board as a snapshot
    Save { label: String },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default funban.toml
    Init {
        /// Where to write (default: ./funban.toml)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Commands::Config { command } = &cli.command {
        return cmd::cmd_config(&cli, command.clone());
    }

    let overrides = CliOverrides {
        api_url: cli.api_url.clone(),
        ws_url: cli.ws_url.clone(),
        log_level: cli
            .verbose
            .then(|| "funban=debug,funban_common=debug".to_string()),
    };
    let config = FunbanConfig::load(cli.config.as_deref(), &overrides)?;
    let logging = &config.toml.logging;
    let _guard = funban::logging::init(&logging.level, logging.format, logging.directory.as_deref())?;

    let ctx = cmd::Context::new(config, cli.yes)?;

    match &cli.command {
        Commands::Login { email, password } => {
            cmd::cmd_login(&ctx, email.clone(), password.clone()).await?
        }
        Commands::Logout => cmd::cmd_logout(&ctx)?,
        Commands::Whoami => cmd::cmd_whoami(&ctx).await?,
        Commands::Account { command } => cmd::cmd_account(&ctx, command.clone()).await?,
        Commands::Board { once } => cmd::cmd_board(&ctx, *once).await?,
        Commands::User { command } => cmd::cmd_user(&ctx, command.clone()).await?,
        Commands::Note { command } => cmd::cmd_note(&ctx, command.clone()).await?,
        Commands::History { command } => cmd::cmd_history(&ctx, command.clone()).await?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}
