//! Operational error taxonomy.
//!
//! Everything here propagates to `main` unretried and is rendered as a single
//! line on stderr with exit code 1. Messages that operators grep for (the
//! "before uninstalling" step errors, the root-privilege refusals) are part of
//! the contract and should not be reworded casually.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An IOC config file broke the key=value format or carried an
    /// invalid/missing required key.
    #[error("Malformed config file {path}: {reason}")]
    MalformedConfig { path: PathBuf, reason: String },

    #[error("No IOC named '{0}' was found in the search paths")]
    UnknownIoc(String),

    #[error("IOC '{0}' is not installed")]
    NotInstalled(String),

    /// Privileged verb attempted without euid 0. Raised before any
    /// side-effecting call is made.
    #[error("You must be root to {0} an IOC!")]
    RequiresRoot(&'static str),

    /// A systemctl invocation exited nonzero. `context` names the failing
    /// step; `stderr` is the captured diagnostic.
    #[error("{context}: {stderr}")]
    Command { context: String, stderr: String },

    #[error("Cannot install IOC '{name}' on this host; it is configured for host '{host}'")]
    HostMismatch { name: String, host: String },

    #[error("Refusing to install IOC '{name}' to run as user 'root'!")]
    RootRunUser { name: String },

    #[error("Failed to install IOC '{0}'! A unit file already exists")]
    AlreadyInstalled(String),

    #[error("No free procServ port at or above {0}")]
    PortsExhausted(u16),

    #[error("{context}: {cause}")]
    Io {
        context: String,
        cause: std::io::Error,
    },
}

impl Error {
    /// Wraps an I/O error with a step-specific message.
    pub fn io(context: impl Into<String>, cause: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            cause,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
