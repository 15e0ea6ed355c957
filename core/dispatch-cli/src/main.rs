//! dispatch: command-line front end for the dispatch client.
//!
//! ## Subcommands
//!
//! - `status`: Show the active unit and the status panel
//! - `set-status`: Change the active unit's status by code id or label
//! - `on-duty`: Put one of your units on duty
//! - `watch`: Follow live status updates from the push channel
//! - `search-name`: Look up a citizen by name
//! - `citizens`: List your citizens
//! - `config`: Show or initialise `~/.dispatch/client.toml`

mod commands;
mod logging;
mod render;

use clap::{Parser, Subcommand};
use dispatch_core::{ClientConfig, DispatchError, StorageConfig};
use dispatch_protocol::UnitKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dispatch")]
#[command(about = "Dispatch unit status client")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to ~/.dispatch)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    /// REST API base URL, e.g. http://localhost:8080/v1
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Unit kind: leo or ems-fd
    #[arg(long, global = true)]
    kind: Option<UnitKind>,

    /// Push channel address (host:port)
    #[arg(long, global = true)]
    push_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the active unit and the status panel
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Change the active unit's status
    SetStatus {
        /// Status code id or label (e.g. 10-8)
        #[arg(value_name = "STATUS")]
        status: String,
    },

    /// Put a unit on duty
    OnDuty {
        /// Unit id; may be omitted when you have exactly one unit
        #[arg(value_name = "UNIT_ID")]
        unit_id: Option<String>,
    },

    /// Follow live status updates until interrupted
    Watch {
        /// Stop after this many seconds
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,
    },

    /// Search citizens by name
    SearchName {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List your citizens
    Citizens,

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default client.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let storage = cli
        .home
        .clone()
        .map(StorageConfig::with_root)
        .unwrap_or_default();
    let _logging_guard = logging::init(&storage);

    if let Err(e) = run(cli, storage) {
        tracing::error!(error = %e, "dispatch command failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, storage: StorageConfig) -> Result<(), DispatchError> {
    if let Commands::Config {
        action: ConfigAction::Init { force },
    } = &cli.command
    {
        return commands::init_config(&storage, *force);
    }

    let config = effective_config(&cli, &storage)?;
    match cli.command {
        Commands::Status { json } => commands::status(storage, config, json),
        Commands::SetStatus { status } => commands::set_status(storage, config, &status),
        Commands::OnDuty { unit_id } => commands::on_duty(storage, config, unit_id.as_deref()),
        Commands::Watch { duration } => commands::watch(storage, config, duration),
        Commands::SearchName { name } => commands::search_name(storage, config, &name),
        Commands::Citizens => commands::citizens(storage, config),
        Commands::Config {
            action: ConfigAction::Show,
        } => commands::show_config(&config),
        Commands::Config {
            action: ConfigAction::Init { .. },
        } => Ok(()),
    }
}

/// File and environment first, then command-line flags on top.
fn effective_config(cli: &Cli, storage: &StorageConfig) -> Result<ClientConfig, DispatchError> {
    let mut config = dispatch_core::config::load_config_file(storage)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    apply_flags(&mut config, cli);
    config.validate()
}

fn apply_flags(config: &mut ClientConfig, cli: &Cli) {
    if let Some(url) = cli.api_url.as_ref() {
        config.api_url = url.clone();
    }
    if let Some(kind) = cli.kind {
        config.unit_kind = kind;
    }
    if let Some(addr) = cli.push_addr.as_ref() {
        config.push_addr = Some(addr.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "dispatch",
            "--api-url",
            "https://cad.example.com/v1/",
            "--kind",
            "ems-fd",
            "status",
        ]);
        let mut config = ClientConfig::default();
        apply_flags(&mut config, &cli);
        let config = config.validate().unwrap();

        assert_eq!(config.api_url, "https://cad.example.com/v1");
        assert_eq!(config.unit_kind, UnitKind::EmsFd);
        assert_eq!(config.push_addr, None);
    }

    #[test]
    fn parses_set_status_and_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["dispatch", "set-status", "10-6", "--push-addr", "cad:4000"]);
        assert!(matches!(cli.command, Commands::SetStatus { ref status } if status == "10-6"));
        assert_eq!(cli.push_addr.as_deref(), Some("cad:4000"));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["dispatch", "--kind", "fire", "status"]).is_err());
    }
}
