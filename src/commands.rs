//! Verb implementations.
//!
//! Each function takes the shared [`Context`] and returns the process exit
//! code: 0 on success, a per-IOC failure count for the bulk verbs. Errors
//! propagate to `main`, which prints them and exits 1. State changes are
//! single blocking systemctl calls behind the [`UnitControl`] seam; the
//! registry is re-read from disk at the top of every verb, so each call sees
//! current filesystem state.

use std::fs;

use crate::config::Settings;
use crate::errors::{Error, Result};
use crate::ioc::IocRecord;
use crate::output;
use crate::registry::{host_matches, Registry};
use crate::systemd::{self, render_unit_file, ActiveState, UnitControl};

/// Identity and collaborators shared by every verb.
///
/// `euid` and `hostname` are captured once at startup rather than queried
/// inside the verbs, so tests can run as a pretend root on a pretend host.
pub struct Context<'a> {
    pub settings: &'a Settings,
    pub control: &'a dyn UnitControl,
    pub euid: u32,
    pub hostname: String,
}

impl Context<'_> {
    /// Fails fast before any side-effecting call when not root.
    fn require_root(&self, verb: &'static str) -> Result<()> {
        if self.euid != 0 {
            return Err(Error::RequiresRoot(verb));
        }
        Ok(())
    }

    fn registry(&self) -> Registry<'_> {
        Registry::new(self.settings)
    }

    fn lookup(&self, name: &str) -> Result<IocRecord> {
        self.registry()
            .discover()?
            .remove(name)
            .ok_or_else(|| Error::UnknownIoc(name.to_string()))
    }
}

/// Runs one systemctl action against one IOC, mapping a nonzero exit into a
/// step-specific error with the captured stderr appended.
fn passthrough(ctx: &Context, action: &str, ioc: &str, context: String) -> Result<()> {
    let out = ctx.control.run(action, Some(ioc))?;
    if !out.success() {
        return Err(Error::Command {
            context,
            stderr: out.diagnostic(),
        });
    }
    Ok(())
}

pub fn start(ctx: &Context, name: &str) -> Result<i32> {
    ctx.require_root("start")?;
    ctx.lookup(name)?;
    passthrough(ctx, "start", name, format!("Failed to start IOC '{name}'!"))?;
    Ok(0)
}

pub fn stop(ctx: &Context, name: &str) -> Result<i32> {
    ctx.require_root("stop")?;
    ctx.lookup(name)?;
    passthrough(ctx, "stop", name, format!("Failed to stop IOC '{name}'!"))?;
    Ok(0)
}

pub fn restart(ctx: &Context, name: &str) -> Result<i32> {
    ctx.require_root("restart")?;
    ctx.lookup(name)?;
    passthrough(
        ctx,
        "restart",
        name,
        format!("Failed to restart IOC '{name}'!"),
    )?;
    Ok(0)
}

pub fn enable(ctx: &Context, name: &str) -> Result<i32> {
    ctx.require_root("enable")?;
    ctx.lookup(name)?;
    passthrough(
        ctx,
        "enable",
        name,
        format!("Failed to enable autostart for IOC '{name}'!"),
    )?;
    Ok(0)
}

pub fn disable(ctx: &Context, name: &str) -> Result<i32> {
    ctx.require_root("disable")?;
    ctx.lookup(name)?;
    passthrough(
        ctx,
        "disable",
        name,
        format!("Failed to disable autostart for IOC '{name}'!"),
    )?;
    Ok(0)
}

/// Applies one action to every installed IOC in name order.
///
/// A failure on one IOC is reported and counted but does not stop the batch;
/// the returned exit code is the failure count.
fn apply_to_installed(ctx: &Context, verb: &'static str, action: &str, step: &str) -> Result<i32> {
    ctx.require_root(verb)?;
    let installed = ctx.registry().installed()?;
    let mut failures = 0;
    for name in installed.keys() {
        match passthrough(ctx, action, name, format!("Failed to {step} IOC '{name}'!")) {
            Ok(()) => println!("{action}: {name}"),
            Err(err) => {
                eprintln!("{err}");
                failures += 1;
            }
        }
    }
    Ok(failures)
}

pub fn startall(ctx: &Context) -> Result<i32> {
    apply_to_installed(ctx, "start", "start", "start")
}

pub fn stopall(ctx: &Context) -> Result<i32> {
    apply_to_installed(ctx, "stop", "stop", "stop")
}

pub fn enableall(ctx: &Context) -> Result<i32> {
    apply_to_installed(ctx, "enable", "enable", "enable autostart for")
}

pub fn disableall(ctx: &Context) -> Result<i32> {
    apply_to_installed(ctx, "disable", "disable", "disable autostart for")
}

/// Creates the unit file for an IOC and reloads systemd.
///
/// Refuses when the IOC is declared for another host, configured to run as
/// root, or already installed. All checks happen before anything is written.
pub fn install(ctx: &Context, name: &str) -> Result<i32> {
    ctx.require_root("install")?;
    let ioc = ctx.lookup(name)?;
    if !host_matches(&ioc.host, &ctx.hostname) {
        return Err(Error::HostMismatch {
            name: name.to_string(),
            host: ioc.host.clone(),
        });
    }
    if ioc.user == "root" {
        return Err(Error::RootRunUser {
            name: name.to_string(),
        });
    }
    let unit_path = ctx.settings.unit_path(name);
    if unit_path.exists() {
        return Err(Error::AlreadyInstalled(name.to_string()));
    }
    fs::create_dir_all(&ctx.settings.log_dir)
        .map_err(|source| Error::io(format!("Failed to install IOC '{name}'!"), source))?;
    fs::write(&unit_path, render_unit_file(ctx.settings, &ioc))
        .map_err(|source| Error::io(format!("Failed to install IOC '{name}'!"), source))?;
    let reload = ctx.control.run("daemon-reload", None)?;
    if !reload.success() {
        return Err(Error::Command {
            context: format!("Failed to install IOC '{name}'!"),
            stderr: reload.diagnostic(),
        });
    }
    println!("Installed {}", unit_path.display());
    Ok(0)
}

/// Removes an installed IOC: stop, then disable, then delete the unit file.
///
/// The sequence aborts at the first failing step, so a failed disable leaves
/// the unit file in place.
pub fn uninstall(ctx: &Context, name: &str) -> Result<i32> {
    ctx.require_root("uninstall")?;
    if !ctx.registry().installed()?.contains_key(name) {
        return Err(Error::NotInstalled(name.to_string()));
    }
    passthrough(
        ctx,
        "stop",
        name,
        format!("Failed to stop IOC '{name}' before uninstalling!"),
    )?;
    passthrough(
        ctx,
        "disable",
        name,
        format!("Failed to disable IOC '{name}' before uninstalling!"),
    )?;
    let unit_path = ctx.settings.unit_path(name);
    fs::remove_file(&unit_path)
        .map_err(|source| Error::io(format!("Failed to uninstall IOC '{name}'!"), source))?;
    let reload = ctx.control.run("daemon-reload", None)?;
    if !reload.success() {
        return Err(Error::Command {
            context: format!("Failed to uninstall IOC '{name}'!"),
            stderr: reload.diagnostic(),
        });
    }
    println!("Removed {}", unit_path.display());
    Ok(0)
}

/// Renames an IOC directory, re-installing the unit when one existed.
pub fn rename(ctx: &Context, name: &str, new_name: &str) -> Result<i32> {
    ctx.require_root("rename")?;
    let ioc = ctx.lookup(name)?;
    if ctx.registry().discover()?.contains_key(new_name) {
        return Err(Error::Command {
            context: format!("Failed to rename IOC '{name}'!"),
            stderr: format!("an IOC named '{new_name}' already exists"),
        });
    }
    let was_installed = ctx.settings.unit_path(name).is_file();
    if was_installed {
        uninstall(ctx, name)?;
    }
    let new_path = ioc.path.with_file_name(new_name);
    fs::rename(&ioc.path, &new_path)
        .map_err(|source| Error::io(format!("Failed to rename IOC '{name}'!"), source))?;
    if was_installed {
        install(ctx, new_name)?;
    }
    println!("Renamed '{name}' to '{new_name}'");
    Ok(0)
}

/// Table of configs for every IOC declared for this host.
pub fn report(ctx: &Context) -> Result<i32> {
    let iocs = ctx.registry().discover_on_host(&ctx.hostname)?;
    print!("{}", report_table(&iocs));
    Ok(0)
}

pub(crate) fn report_table(
    iocs: &std::collections::BTreeMap<String, IocRecord>,
) -> String {
    let rows: Vec<Vec<String>> = iocs
        .values()
        .map(|ioc| {
            vec![
                ioc.path.display().to_string(),
                ioc.name.clone(),
                ioc.user.clone(),
                ioc.procserv_port.to_string(),
                ioc.exec_abs().display().to_string(),
            ]
        })
        .collect();
    output::render_table(&["BASE", "IOC", "USER", "PORT", "EXEC"], &rows)
}

/// Status table for every installed IOC.
pub fn status(ctx: &Context) -> Result<i32> {
    let installed = ctx.registry().installed()?;
    let names: Vec<&str> = installed.keys().map(String::as_str).collect();
    let rows = systemd::status_of_all(ctx.control, names)?;
    print!("{}", output::status_table(&rows, true));
    Ok(0)
}

/// All known IOCs, including those declared for other hosts.
pub fn list(ctx: &Context) -> Result<i32> {
    let iocs = ctx.registry().discover()?;
    let rows: Vec<Vec<String>> = iocs
        .values()
        .map(|ioc| {
            vec![
                ioc.name.clone(),
                ioc.host.clone(),
                ioc.procserv_port.to_string(),
                ioc.path.display().to_string(),
            ]
        })
        .collect();
    print!(
        "{}",
        output::render_table(&["IOC", "HOST", "PORT", "BASE"], &rows)
    );
    Ok(0)
}

/// Names of installed IOCs currently running.
pub fn started(ctx: &Context) -> Result<i32> {
    list_by_state(ctx, ActiveState::Running)
}

/// Names of installed IOCs currently stopped.
pub fn stopped(ctx: &Context) -> Result<i32> {
    list_by_state(ctx, ActiveState::Stopped)
}

fn list_by_state(ctx: &Context, wanted: ActiveState) -> Result<i32> {
    for name in names_in_state(ctx, &wanted)? {
        println!("{name}");
    }
    Ok(0)
}

pub(crate) fn names_in_state(ctx: &Context, wanted: &ActiveState) -> Result<Vec<String>> {
    let installed = ctx.registry().installed()?;
    let mut names = Vec::new();
    for name in installed.keys() {
        let (active, _) = systemd::status_of(ctx.control, name)?;
        if active == *wanted {
            names.push(name.clone());
        }
    }
    Ok(names)
}

/// Prints the next unused procServ port.
pub fn nextport(ctx: &Context) -> Result<i32> {
    println!("{}", ctx.registry().next_free_port()?);
    Ok(0)
}

/// Prints the procServ log for an IOC.
pub fn lastlog(ctx: &Context, name: &str) -> Result<i32> {
    ctx.lookup(name)?;
    let path = ctx.settings.log_path(name);
    let contents = fs::read_to_string(&path)
        .map_err(|source| Error::io(format!("No log found for IOC '{name}'"), source))?;
    print!("{contents}");
    Ok(0)
}

/// Connects to the IOC's procServ console via telnet, blocking until the
/// session ends.
pub fn attach(ctx: &Context, name: &str) -> Result<i32> {
    let ioc = ctx.lookup(name)?;
    println!(
        "Connecting to IOC '{}' on port {} (escape with Ctrl-] then 'quit')",
        name, ioc.procserv_port
    );
    let status = std::process::Command::new("telnet")
        .arg("localhost")
        .arg(ioc.procserv_port.to_string())
        .status()
        .map_err(|source| Error::io("failed to launch telnet", source))?;
    Ok(status.code().unwrap_or(1))
}
