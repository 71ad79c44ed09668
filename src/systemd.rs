//! The systemd seam: blocking `systemctl` invocations, status normalization,
//! and unit-file generation.
//!
//! [`UnitControl`] is the one trait boundary in the tool; everything that
//! mutates or queries systemd goes through it, so tests can substitute a
//! recording mock and the rest of the code stays oblivious.

use std::fmt;
use std::process::Command;

use log::debug;

use crate::config::Settings;
use crate::errors::{Error, Result};
use crate::ioc::IocRecord;

/// Captured result of one external invocation.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// stderr text for error messages, with a fallback when the command
    /// produced none.
    pub fn diagnostic(&self) -> String {
        if self.stderr.is_empty() {
            format!("systemctl exited with status {}", self.code)
        } else {
            self.stderr.clone()
        }
    }
}

/// Abstract process-manager control: one blocking call per action.
///
/// `ioc` is `Some(name)` for per-unit actions (the unit name is derived from
/// the name) and `None` for global actions such as `daemon-reload`. Exit code
/// 0 is the only success signal; no retries, no timeouts beyond systemctl's
/// own.
pub trait UnitControl {
    fn run(&self, action: &str, ioc: Option<&str>) -> Result<CommandOutput>;
}

/// Real adapter shelling out to `systemctl`.
pub struct SystemdControl {
    settings: Settings,
}

impl SystemdControl {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }
}

impl UnitControl for SystemdControl {
    fn run(&self, action: &str, ioc: Option<&str>) -> Result<CommandOutput> {
        let mut cmd = Command::new("systemctl");
        cmd.arg(action);
        if let Some(name) = ioc {
            cmd.arg(self.settings.unit_name(name));
        }
        debug!("running {:?}", cmd);
        let output = cmd.output().map_err(|source| {
            Error::io(format!("failed to run systemctl {action}"), source)
        })?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Normalized `is-active` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveState {
    Running,
    Stopped,
    /// Any systemd state this tool does not special-case ("failed",
    /// "activating", ...), passed through capitalized.
    Other(String),
}

impl ActiveState {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "active" => ActiveState::Running,
            "inactive" => ActiveState::Stopped,
            other => ActiveState::Other(capitalize(other)),
        }
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveState::Running => f.write_str("Running"),
            ActiveState::Stopped => f.write_str("Stopped"),
            ActiveState::Other(raw) => f.write_str(raw),
        }
    }
}

/// Normalized `is-enabled` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnabledState {
    Enabled,
    Disabled,
    Other(String),
}

impl EnabledState {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "enabled" => EnabledState::Enabled,
            "disabled" => EnabledState::Disabled,
            other => EnabledState::Other(capitalize(other)),
        }
    }
}

impl fmt::Display for EnabledState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnabledState::Enabled => f.write_str("Enabled"),
            EnabledState::Disabled => f.write_str("Disabled"),
            EnabledState::Other(raw) => f.write_str(raw),
        }
    }
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Queries active and enabled state for one IOC.
///
/// The exit codes are ignored on purpose: `is-active` exits nonzero for
/// inactive units, and that is a perfectly good answer.
pub fn status_of(control: &dyn UnitControl, ioc: &str) -> Result<(ActiveState, EnabledState)> {
    let active = control.run("is-active", Some(ioc))?;
    let enabled = control.run("is-enabled", Some(ioc))?;
    Ok((
        ActiveState::from_raw(active.stdout.trim()),
        EnabledState::from_raw(enabled.stdout.trim()),
    ))
}

/// Pointwise [`status_of`], preserving the caller-supplied order.
pub fn status_of_all<'a, I>(
    control: &dyn UnitControl,
    names: I,
) -> Result<Vec<(String, ActiveState, EnabledState)>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut rows = Vec::new();
    for name in names {
        let (active, enabled) = status_of(control, name)?;
        rows.push((name.to_string(), active, enabled));
    }
    Ok(rows)
}

/// Renders the systemd unit file for one IOC.
///
/// The unit wraps the startup script in procServ with a logfile, the
/// configured listen port and restricted mode, and exports the IOC's
/// identity to the supervised process via environment assignments.
pub fn render_unit_file(settings: &Settings, ioc: &IocRecord) -> String {
    let exec_start = shell_words::join([
        settings.procserv.display().to_string(),
        "--foreground".to_string(),
        "--quiet".to_string(),
        "--restrict".to_string(),
        format!("--logfile={}", settings.log_path(&ioc.name).display()),
        "--name".to_string(),
        ioc.name.clone(),
        ioc.procserv_port.to_string(),
        ioc.exec_abs().display().to_string(),
    ]);
    format!(
        "[Unit]\n\
         Description=EPICS soft IOC {name} via procServ\n\
         After=network.target\n\
         \n\
         [Service]\n\
         User={user}\n\
         WorkingDirectory={path}\n\
         Environment=IOCNAME={name}\n\
         Environment=TOP={path}\n\
         Environment=HOSTNAME={host}\n\
         Environment=PROCSERV_PORT={port}\n\
         ExecStart={exec_start}\n\
         Restart=on-failure\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        name = ioc.name,
        user = ioc.user,
        path = ioc.path.display(),
        host = ioc.host,
        port = ioc.procserv_port,
        exec_start = exec_start,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn known_active_tokens_normalize_exactly() {
        assert_eq!(ActiveState::from_raw("active"), ActiveState::Running);
        assert_eq!(ActiveState::from_raw("inactive"), ActiveState::Stopped);
    }

    #[test]
    fn unknown_tokens_pass_through_capitalized() {
        assert_eq!(
            ActiveState::from_raw("activating"),
            ActiveState::Other("Activating".to_string())
        );
        assert_eq!(
            ActiveState::from_raw("FAILED"),
            ActiveState::Other("Failed".to_string())
        );
        assert_eq!(
            EnabledState::from_raw("static"),
            EnabledState::Other("Static".to_string())
        );
    }

    #[test]
    fn enabled_tokens_normalize() {
        assert_eq!(EnabledState::from_raw("enabled"), EnabledState::Enabled);
        assert_eq!(EnabledState::from_raw("disabled"), EnabledState::Disabled);
    }

    #[test]
    fn display_uses_the_closed_vocabulary() {
        assert_eq!(ActiveState::Running.to_string(), "Running");
        assert_eq!(ActiveState::Stopped.to_string(), "Stopped");
        assert_eq!(EnabledState::Enabled.to_string(), "Enabled");
        assert_eq!(
            ActiveState::Other("Activating".to_string()).to_string(),
            "Activating"
        );
    }

    #[test]
    fn status_of_all_preserves_caller_order() {
        let control = crate::testutil::MockControl::new();
        control.set_active("b", "active");
        control.set_enabled("b", "enabled");
        control.set_active("a", "activating");
        let rows = status_of_all(&control, ["b", "a"]).unwrap();
        assert_eq!(
            rows[0],
            (
                "b".to_string(),
                ActiveState::Running,
                EnabledState::Enabled
            )
        );
        assert_eq!(rows[1].0, "a");
        assert_eq!(rows[1].1, ActiveState::Other("Activating".to_string()));
        assert_eq!(rows[1].2, EnabledState::Disabled);
    }

    #[test]
    fn unit_file_embeds_identity_and_procserv_flags() {
        let settings = Settings::default();
        let ioc = IocRecord {
            name: "motor1".to_string(),
            path: PathBuf::from("/epics/iocs/motor1"),
            user: "iocuser".to_string(),
            host: "localhost".to_string(),
            procserv_port: 4010,
            exec_path: "st.cmd".to_string(),
        };
        let unit = render_unit_file(&settings, &ioc);
        assert!(unit.contains("User=iocuser\n"));
        assert!(unit.contains("WorkingDirectory=/epics/iocs/motor1\n"));
        assert!(unit.contains("Environment=IOCNAME=motor1\n"));
        assert!(unit.contains("Environment=PROCSERV_PORT=4010\n"));
        assert!(unit.contains("--logfile=/var/log/softioc/motor1.log"));
        assert!(unit.contains("--restrict"));
        assert!(unit.contains("4010 /epics/iocs/motor1/st.cmd\n"));
        assert!(unit.contains("WantedBy=multi-user.target"));
    }

    #[test]
    fn unit_file_quotes_paths_with_spaces() {
        let settings = Settings::default();
        let ioc = IocRecord {
            name: "cam 1".to_string(),
            path: PathBuf::from("/epics/iocs/cam 1"),
            user: "iocuser".to_string(),
            host: "localhost".to_string(),
            procserv_port: 4011,
            exec_path: "st.cmd".to_string(),
        };
        let unit = render_unit_file(&settings, &ioc);
        assert!(unit.contains("'/epics/iocs/cam 1/st.cmd'"));
    }
}
