//! Configuration view and validation commands: `boardsync config`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use boardsync::config::{CONFIG_DIR, CONFIG_FILE, SyncConfig};

use super::super::ConfigCommands;

/// The file `discover` would have read, if any.
fn source_path(project_dir: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => SyncConfig::candidate_paths(project_dir)
            .into_iter()
            .find(|p| p.exists()),
    }
}

pub fn cmd_config(
    project_dir: &Path,
    explicit: Option<&Path>,
    config: &SyncConfig,
    command: Option<ConfigCommands>,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Boardsync Configuration");
            println!("=======================");
            println!();
            match source_path(project_dir, explicit) {
                Some(path) => println!("Config file: {}", path.display()),
                None => {
                    println!("No config file found. Using defaults.");
                    println!("Run 'boardsync config init' to create one.");
                }
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            println!();
            print!("{}", config.to_toml()?);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            let config_path = project_dir.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                println!("{} already exists at {}", CONFIG_FILE, config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            SyncConfig::write_default(&config_path)?;

            println!("Created {} at {}", CONFIG_FILE, config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [api] base_url, request_timeout_secs");
            println!("  - [realtime] url, cursor_throttle_ms, ping/pong timing");
            println!("  - [realtime.reconnect] max_attempts, base_delay_ms, max_delay_ms");
            println!("  - [logging] filter, format");
            println!();
            println!("Keep the API token out of the file; set BOARDSYNC_TOKEN instead.");
            println!();
        }
    }

    Ok(())
}
