//! The record type for one discovered IOC.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::{Error, Result};

/// One IOC instance discovered in the search paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IocRecord {
    /// Identifier, taken from the directory name; unique per registry snapshot.
    pub name: String,
    /// Absolute base directory of the IOC.
    pub path: PathBuf,
    /// OS account the IOC process runs as.
    pub user: String,
    /// Host this IOC is declared to run on.
    pub host: String,
    /// TCP port procServ listens on for this IOC.
    pub procserv_port: u16,
    /// Startup script, relative to `path`.
    pub exec_path: String,
}

impl IocRecord {
    /// Builds a record from a parsed config map.
    ///
    /// `PORT` is required and must be a positive integer; `HOST`, `USER` and
    /// `EXEC` fall back to `localhost`, `iocuser` and `st.cmd`. A missing key
    /// gets its default; a present-but-invalid value is a malformed-config
    /// error.
    pub fn from_config(
        name: &str,
        base: &Path,
        config: &HashMap<String, String>,
        config_path: &Path,
    ) -> Result<Self> {
        let raw_port = config.get("PORT").ok_or_else(|| Error::MalformedConfig {
            path: config_path.to_path_buf(),
            reason: "missing required key PORT".to_string(),
        })?;
        let procserv_port = raw_port
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| Error::MalformedConfig {
                path: config_path.to_path_buf(),
                reason: format!("PORT '{raw_port}' is not a positive integer"),
            })?;
        Ok(Self {
            name: name.to_string(),
            path: base.to_path_buf(),
            user: config
                .get("USER")
                .cloned()
                .unwrap_or_else(|| "iocuser".to_string()),
            host: config
                .get("HOST")
                .cloned()
                .unwrap_or_else(|| "localhost".to_string()),
            procserv_port,
            exec_path: config
                .get("EXEC")
                .cloned()
                .unwrap_or_else(|| "st.cmd".to_string()),
        })
    }

    /// Absolute path of the startup script.
    pub fn exec_abs(&self) -> PathBuf {
        self.path.join(&self.exec_path)
    }
}
