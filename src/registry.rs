//! IOC discovery.
//!
//! The registry is rebuilt from disk on every query; the filesystem is the
//! source of truth and nothing is cached between calls.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::config::{read_config_file, Settings};
use crate::errors::{Error, Result};
use crate::ioc::IocRecord;

/// Name of the per-IOC config file that marks a directory as an IOC.
const CONFIG_FILE: &str = "config";

/// Walks the configured search roots and builds the IOC catalog.
pub struct Registry<'a> {
    settings: &'a Settings,
}

impl<'a> Registry<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Scans every search root for immediate subdirectories containing a
    /// `config` file and parses each into an [`IocRecord`].
    ///
    /// Missing roots are skipped; directories without a config file are
    /// skipped; a malformed config fails the whole call. When the same IOC
    /// name appears under more than one root, the later root wins and the
    /// shadowed entry is logged.
    pub fn discover(&self) -> Result<BTreeMap<String, IocRecord>> {
        let mut iocs = BTreeMap::new();
        for root in &self.settings.search_paths {
            let entries = match std::fs::read_dir(root) {
                Ok(entries) => entries,
                Err(_) => {
                    debug!("skipping missing search path {}", root.display());
                    continue;
                }
            };
            for entry in entries {
                let entry = entry.map_err(|source| {
                    Error::io(format!("failed to list {}", root.display()), source)
                })?;
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let config_path = path.join(CONFIG_FILE);
                if !config_path.is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                let config = read_config_file(&config_path)?;
                let record = IocRecord::from_config(&name, &path, &config, &config_path)?;
                if let Some(shadowed) = iocs.insert(name.clone(), record) {
                    warn!(
                        "duplicate IOC name '{}': {} overrides {}",
                        name,
                        path.display(),
                        shadowed.path.display()
                    );
                }
            }
        }
        Ok(iocs)
    }

    /// Catalog filtered to IOCs declared for this host (or `localhost`).
    pub fn discover_on_host(&self, hostname: &str) -> Result<BTreeMap<String, IocRecord>> {
        let mut iocs = self.discover()?;
        iocs.retain(|_, ioc| host_matches(&ioc.host, hostname));
        Ok(iocs)
    }

    /// Catalog intersected with the installed-unit-file predicate.
    ///
    /// Bulk verbs operate on this set only; an IOC with no unit file cannot
    /// be driven through systemd.
    pub fn installed(&self) -> Result<BTreeMap<String, IocRecord>> {
        let mut iocs = self.discover()?;
        iocs.retain(|name, _| self.settings.unit_path(name).is_file());
        Ok(iocs)
    }

    /// Smallest port at or above `first_port` not claimed by any IOC.
    pub fn next_free_port(&self) -> Result<u16> {
        let used: BTreeSet<u16> = self
            .discover()?
            .values()
            .map(|ioc| ioc.procserv_port)
            .collect();
        (self.settings.first_port..=u16::MAX)
            .find(|port| !used.contains(port))
            .ok_or(Error::PortsExhausted(self.settings.first_port))
    }
}

/// Whether a declared host refers to the local machine.
///
/// `localhost` always matches; otherwise compare the full names, then the
/// domain-stripped short names.
pub fn host_matches(declared: &str, local: &str) -> bool {
    declared == "localhost" || declared == local || short_host(declared) == short_host(local)
}

fn short_host(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

/// Hostname of this machine, falling back to `localhost` if unavailable.
#[cfg(unix)]
pub fn local_hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc == 0 {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        if let Ok(name) = std::str::from_utf8(&buf[..end]) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }
    "localhost".to_string()
}

#[cfg(not(unix))]
pub fn local_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
