//! manage-iocs: manage EPICS soft IOCs as systemd services.
//!
//! Discovers IOC instances from the configured search paths, generates
//! systemd unit files for them, and drives start/stop/enable/disable/status
//! through `systemctl` (and `attach` through `telnet`). Everything is a
//! single blocking call against the external process manager; the filesystem
//! and systemd are re-queried fresh on every verb.

mod commands;
mod config;
mod errors;
mod ioc;
mod output;
mod registry;
mod systemd;
#[cfg(test)]
mod testutil;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::{CommandFactory, Parser, Subcommand};

use crate::commands::Context;
use crate::config::Settings;
use crate::registry::local_hostname;
use crate::systemd::SystemdControl;

/// Default settings file consulted when `--config` is not given.
const DEFAULT_SETTINGS_PATH: &str = "/etc/manage-iocs.toml";

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "manage-iocs",
    version,
    about = "Manage EPICS soft IOCs as systemd services",
    styles = help_styles(),
    disable_help_subcommand = true
)]
struct Cli {
    /// Path to a manage-iocs.toml settings file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

/// The canonical verb table: one variant per verb, with clap enforcing the
/// argument arity.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Display this message
    Help,
    /// Show the version number
    Version,
    /// Show configs of all IOCs on this host
    Report,
    /// Check whether installed IOCs are running or stopped
    Status,
    /// Connect to the procServ console for an IOC
    Attach { ioc: String },
    /// Start the IOC <IOC>
    Start { ioc: String },
    /// Stop the IOC <IOC>
    Stop { ioc: String },
    /// Restart the IOC <IOC>
    Restart { ioc: String },
    /// Enable auto-start of IOC <IOC> at boot
    Enable { ioc: String },
    /// Disable auto-start of IOC <IOC> at boot
    Disable { ioc: String },
    /// Start all IOCs installed on this system
    Startall,
    /// Stop all IOCs installed on this system
    Stopall,
    /// Enable auto-start for all installed IOCs
    Enableall,
    /// Disable auto-start for all installed IOCs
    Disableall,
    /// Create the systemd unit file for an IOC
    Install { ioc: String },
    /// Remove the systemd unit file for an IOC
    Uninstall { ioc: String },
    /// List all IOCs in the search paths, including other hosts'
    List,
    /// List installed IOCs that are running
    Started,
    /// List installed IOCs that are stopped
    Stopped,
    /// Show the next unused procServ port
    Nextport,
    /// Show the procServ log of an IOC's last startup
    Lastlog { ioc: String },
    /// Rename an IOC, re-installing its unit if present
    Rename { ioc: String, name: String },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match &cli.command {
        Commands::Help => {
            Cli::command().print_help()?;
            println!();
            return Ok(0);
        }
        Commands::Version => {
            println!("manage-iocs {}", env!("CARGO_PKG_VERSION"));
            return Ok(0);
        }
        _ => {}
    }

    let settings = load_settings(cli.config.as_deref())?;
    let control = SystemdControl::new(&settings);
    let ctx = Context {
        settings: &settings,
        control: &control,
        euid: current_euid(),
        hostname: local_hostname(),
    };

    let code = match cli.command {
        Commands::Help | Commands::Version => unreachable!("handled above"),
        Commands::Report => commands::report(&ctx)?,
        Commands::Status => commands::status(&ctx)?,
        Commands::Attach { ioc } => commands::attach(&ctx, &ioc)?,
        Commands::Start { ioc } => commands::start(&ctx, &ioc)?,
        Commands::Stop { ioc } => commands::stop(&ctx, &ioc)?,
        Commands::Restart { ioc } => commands::restart(&ctx, &ioc)?,
        Commands::Enable { ioc } => commands::enable(&ctx, &ioc)?,
        Commands::Disable { ioc } => commands::disable(&ctx, &ioc)?,
        Commands::Startall => commands::startall(&ctx)?,
        Commands::Stopall => commands::stopall(&ctx)?,
        Commands::Enableall => commands::enableall(&ctx)?,
        Commands::Disableall => commands::disableall(&ctx)?,
        Commands::Install { ioc } => commands::install(&ctx, &ioc)?,
        Commands::Uninstall { ioc } => commands::uninstall(&ctx, &ioc)?,
        Commands::List => commands::list(&ctx)?,
        Commands::Started => commands::started(&ctx)?,
        Commands::Stopped => commands::stopped(&ctx)?,
        Commands::Nextport => commands::nextport(&ctx)?,
        Commands::Lastlog { ioc } => commands::lastlog(&ctx, &ioc)?,
        Commands::Rename { ioc, name } => commands::rename(&ctx, &ioc, &name)?,
    };
    Ok(code)
}

/// Effective uid of this process.
#[cfg(unix)]
fn current_euid() -> u32 {
    unsafe { libc::geteuid() }
}

#[cfg(not(unix))]
fn current_euid() -> u32 {
    u32::MAX
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    if let Some(path) = path {
        return Settings::load(path);
    }
    let default = Path::new(DEFAULT_SETTINGS_PATH);
    if default.exists() {
        return Settings::load(default);
    }
    Ok(Settings::default())
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
}
