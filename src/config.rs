//! Configuration for manage-iocs.
//!
//! Two kinds of configuration live here: the per-IOC `config` file (a flat
//! key=value format read by [`read_config_file`]) and the tool-level
//! [`Settings`], loadable from an optional `manage-iocs.toml`. Settings are
//! passed by value into the registry and formatters rather than living as
//! module constants, so tests can point discovery at a scratch tree.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

use crate::errors::{Error, Result};

/// Tool-level settings corresponding to `manage-iocs.toml`.
///
/// Every field has a default, so running without a settings file is the
/// normal case.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Ordered list of directories scanned for IOC subdirectories.
    pub search_paths: Vec<PathBuf>,
    /// Directory holding generated unit files.
    pub systemd_dir: PathBuf,
    /// Prefix for unit names ("softioc-" gives `softioc-<ioc>.service`).
    pub unit_prefix: String,
    /// procServ binary invoked by generated units.
    pub procserv: PathBuf,
    /// Directory procServ writes per-IOC logs into.
    pub log_dir: PathBuf,
    /// Lowest port considered by `nextport`.
    pub first_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_paths: vec![
                PathBuf::from("/epics/iocs"),
                PathBuf::from("/opt/epics/iocs"),
                PathBuf::from("/opt/iocs"),
            ],
            systemd_dir: PathBuf::from("/etc/systemd/system"),
            unit_prefix: "softioc-".to_string(),
            procserv: PathBuf::from("/usr/bin/procServ"),
            log_dir: PathBuf::from("/var/log/softioc"),
            first_port: 4000,
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Settings> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file {}", path.display()))?;
        Ok(settings)
    }

    /// Unit name for an IOC, e.g. `softioc-ioc1.service`.
    pub fn unit_name(&self, ioc: &str) -> String {
        format!("{}{}.service", self.unit_prefix, ioc)
    }

    /// Path of the unit file whose presence marks an IOC as installed.
    pub fn unit_path(&self, ioc: &str) -> PathBuf {
        self.systemd_dir.join(self.unit_name(ioc))
    }

    /// procServ logfile path for an IOC.
    pub fn log_path(&self, ioc: &str) -> PathBuf {
        self.log_dir.join(format!("{ioc}.log"))
    }
}

/// Reads an IOC's flat key=value config file.
///
/// Blank lines and lines whose first non-whitespace character is `#` are
/// skipped; remaining lines split on the first `=` with both sides trimmed.
/// A line with no `=` is a malformed-config error. No type coercion happens
/// here; callers coerce individual fields.
pub fn read_config_file(path: &Path) -> Result<HashMap<String, String>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| Error::io(format!("failed to read {}", path.display()), source))?;
    let mut config = HashMap::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::MalformedConfig {
                path: path.to_path_buf(),
                reason: format!("line {} has no '='", lineno + 1),
            });
        };
        config.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(config)
}
