//! Configuration view and setup (`funban config`).

use std::path::PathBuf;

use anyhow::Result;

use funban::config::{CONFIG_FILE_NAME, CliOverrides, FunbanConfig, FunbanToml};
use funban::credentials::CredentialStore;
use funban::ui::icons::CHECK;

use crate::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let overrides = CliOverrides {
                api_url: cli.api_url.clone(),
                ws_url: cli.ws_url.clone(),
                log_level: None,
            };
            let config = FunbanConfig::load(cli.config.as_deref(), &overrides)?;

            println!();
            println!("Funban Configuration");
            println!("====================");
            println!();
            match &config.source {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("No {} found, using defaults.", CONFIG_FILE_NAME),
            }
            println!();

            let toml = &config.toml;
            println!("[server]");
            println!("  api_url = \"{}\"", toml.server.api_url);
            println!("  ws_url = \"{}\"", toml.server.ws_url);
            println!();
            println!("[sync]");
            println!("  reconnect_delay_ms = {}", toml.sync.reconnect_delay_ms);
            match toml.sync.max_reconnect_attempts {
                Some(max) => println!("  max_reconnect_attempts = {}", max),
                None => println!("  max_reconnect_attempts = (unlimited)"),
            }
            println!("  ack_timeout_secs = {}", toml.sync.ack_timeout_secs);
            println!();
            println!("[logging]");
            println!("  level = \"{}\"", toml.logging.level);
            println!("  format = \"{}\"", toml.logging.format);
            if let Some(dir) = &toml.logging.directory {
                println!("  directory = \"{}\"", dir.display());
            }
            println!();

            if let Ok(store) = CredentialStore::default_location() {
                let signed_in = matches!(store.load(), Ok(Some(_)));
                let state = if signed_in { "signed in" } else { "not signed in" };
                println!("Credentials: {} ({})", store.path().display(), state);
                println!();
            }
        }
        Some(ConfigCommands::Init { path, force }) => {
            let path = path
                .or_else(|| cli.config.clone())
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            if path.exists() && !force {
                println!("{} already exists at {}", CONFIG_FILE_NAME, path.display());
                println!("Use --force to overwrite it.");
                return Ok(());
            }
            FunbanToml::default().save(&path)?;
            println!("{}Created {}", CHECK, path.display());
        }
    }
    Ok(())
}
