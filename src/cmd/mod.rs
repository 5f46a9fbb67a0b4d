//! CLI command implementations.
//!
//! | Module    | Commands handled                         |
//! |-----------|------------------------------------------|
//! | `account` | `Login`, `Logout`, `Whoami`, `Account`   |
//! | `board`   | `Board`                                  |
//! | `user`    | `User`                                   |
//! | `note`    | `Note`                                   |
//! | `history` | `History`                                |
//! | `config`  | `Config`                                 |

pub mod account;
pub mod board;
pub mod config;
pub mod history;
pub mod note;
pub mod user;

pub use account::{cmd_account, cmd_login, cmd_logout, cmd_whoami};
pub use board::cmd_board;
pub use config::cmd_config;
pub use history::cmd_history;
pub use note::cmd_note;
pub use user::cmd_user;

use anyhow::{Context as _, Result};

use funban::api::ApiClient;
use funban::board::Board;
use funban::config::FunbanConfig;
use funban::credentials::CredentialStore;
use funban::errors::ApiError;
use funban::sync::{SessionOptions, SyncSession, parse_ws_url};
use funban::ui::CommandSpinner;
use funban::ui::icons::WARN;
use funban::{Command, User};

/// Everything a command needs: resolved configuration and the credential
/// store.
pub struct Context {
    pub config: FunbanConfig,
    pub store: CredentialStore,
    pub assume_yes: bool,
}

impl Context {
    pub fn new(config: FunbanConfig, assume_yes: bool) -> Result<Self> {
        Ok(Self {
            config,
            store: CredentialStore::default_location()?,
            assume_yes,
        })
    }

    /// REST client without a token (sign-in only).
    pub fn anonymous_api(&self) -> ApiClient {
        ApiClient::new(self.config.api_url())
    }

    /// REST client carrying the stored token.
    pub fn api(&self) -> Result<ApiClient> {
        let token = self.store.require_token()?;
        Ok(self.anonymous_api().with_token(token))
    }

    /// Turn an API failure into a CLI error. A 401 means the stored token is
    /// dead: it is removed so the next command asks for a fresh login.
    pub fn api_failure(&self, err: ApiError) -> anyhow::Error {
        if err.is_unauthorized() {
            match self.store.clear() {
                Ok(_) => eprintln!(
                    "{}Session expired. Stored credentials removed; run `funban login`.",
                    WARN
                ),
                Err(e) => tracing::warn!(error = %e, "failed to clear credentials"),
            }
        }
        anyhow::Error::new(err)
    }

    /// Connect and wait for the first full board state.
    pub async fn open_session(&self) -> Result<SyncSession> {
        let token = self.store.require_token()?;
        let ws_url = parse_ws_url(self.config.ws_url())?;
        let session = SyncSession::start(
            SessionOptions {
                ws_url,
                policy: self.config.reconnect_policy(),
            },
            Some(token),
        );

        let spinner = CommandSpinner::start("Connecting to board");
        let synced = session.wait_until_synced(self.config.ack_timeout()).await;
        spinner.clear();
        if let Err(e) = synced {
            session.shutdown().await;
            return Err(e).context(
                "Could not load the board. Check the server URL, or run `funban login` if your session expired",
            );
        }
        Ok(session)
    }

    /// Ask before a destructive action unless `--yes` was given.
    pub fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    }
}

/// Connect, build a command from the current board, send it, and wait for
/// the server to acknowledge it. `build` returning `Ok(None)` means there
/// is nothing to send.
pub async fn run_board_command<F>(ctx: &Context, build: F) -> Result<()>
where
    F: FnOnce(&Board) -> Result<Option<(Command, String)>>,
{
    let session = ctx.open_session().await?;
    let board = session.board();

    let (command, done) = match build(&board) {
        Ok(Some(planned)) => planned,
        Ok(None) => {
            session.shutdown().await;
            println!("Nothing to change.");
            return Ok(());
        }
        Err(e) => {
            session.shutdown().await;
            return Err(e);
        }
    };

    let spinner = CommandSpinner::start(format!("Waiting for server ({})", command.type_name()));
    let result = session.execute(&command, ctx.config.ack_timeout()).await;
    session.shutdown().await;

    match result {
        Ok(uuid) => {
            tracing::debug!(%uuid, "command acknowledged");
            spinner.succeed(&done);
            Ok(())
        }
        Err(e) => {
            spinner.fail(&format!("{} failed", command.type_name()));
            Err(e.into())
        }
    }
}

/// Find a user by numeric id or exact name.
pub fn resolve_user<'a>(board: &'a Board, key: &str) -> Result<&'a User> {
    let by_id = key.parse::<i64>().ok().and_then(|id| board.user(id));
    by_id
        .or_else(|| board.user_by_name(key))
        .with_context(|| format!("No team member '{}'", key))
}
