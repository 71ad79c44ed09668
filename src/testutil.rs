//! Shared test fixtures: a scratch IOC tree and a recording systemd mock.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tempfile::TempDir;

use crate::config::Settings;
use crate::errors::Result;
use crate::systemd::{CommandOutput, UnitControl};

/// A temporary directory laid out like a host: one search root, a systemd
/// directory, and a log directory, with [`Settings`] pointing at them.
pub struct Fixture {
    pub dir: TempDir,
    pub settings: Settings,
}

impl Fixture {
    pub fn search_root(&self) -> PathBuf {
        self.dir.path().join("iocs")
    }
}

pub fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let settings = Settings {
        search_paths: vec![dir.path().join("iocs")],
        systemd_dir: dir.path().join("systemd"),
        unit_prefix: "softioc-".to_string(),
        procserv: PathBuf::from("/usr/bin/procServ"),
        log_dir: dir.path().join("log"),
        first_port: 4000,
    };
    std::fs::create_dir_all(&settings.search_paths[0]).unwrap();
    std::fs::create_dir_all(&settings.systemd_dir).unwrap();
    Fixture { dir, settings }
}

/// Creates an IOC directory with a config file under the fixture's search
/// root. `extra` entries are appended after the PORT line.
pub fn add_ioc(fix: &Fixture, name: &str, port: u16, extra: &[(&str, &str)]) {
    let ioc_dir = fix.search_root().join(name);
    std::fs::create_dir_all(&ioc_dir).unwrap();
    let mut config = format!("PORT={port}\n");
    for (key, value) in extra {
        config.push_str(&format!("{key}={value}\n"));
    }
    std::fs::write(ioc_dir.join("config"), config).unwrap();
}

/// Drops a placeholder unit file in place so the IOC counts as installed.
pub fn mark_installed(fix: &Fixture, name: &str) {
    std::fs::write(
        fix.settings.unit_path(name),
        format!("[Unit]\nDescription=EPICS soft IOC {name} via procServ\n"),
    )
    .unwrap();
}

/// Recording stand-in for systemctl.
///
/// Every call is appended to `calls`. State-changing actions update the
/// simulated unit state, so `is-active` / `is-enabled` afterwards reflect
/// the last action applied. Failures are forced per (action, ioc) pair and
/// report "Simulated failure" on stderr.
pub struct MockControl {
    calls: RefCell<Vec<(String, Option<String>)>>,
    active: RefCell<HashMap<String, String>>,
    enabled: RefCell<HashMap<String, String>>,
    fail: RefCell<HashSet<(String, String)>>,
}

impl MockControl {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            active: RefCell::new(HashMap::new()),
            enabled: RefCell::new(HashMap::new()),
            fail: RefCell::new(HashSet::new()),
        }
    }

    pub fn fail_on(&self, action: &str, ioc: &str) {
        self.fail
            .borrow_mut()
            .insert((action.to_string(), ioc.to_string()));
    }

    pub fn set_active(&self, ioc: &str, raw: &str) {
        self.active
            .borrow_mut()
            .insert(ioc.to_string(), raw.to_string());
    }

    pub fn set_enabled(&self, ioc: &str, raw: &str) {
        self.enabled
            .borrow_mut()
            .insert(ioc.to_string(), raw.to_string());
    }

    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl UnitControl for MockControl {
    fn run(&self, action: &str, ioc: Option<&str>) -> Result<CommandOutput> {
        self.calls
            .borrow_mut()
            .push((action.to_string(), ioc.map(str::to_string)));
        let Some(name) = ioc else {
            return Ok(ok_output(""));
        };
        if self
            .fail
            .borrow()
            .contains(&(action.to_string(), name.to_string()))
        {
            return Ok(CommandOutput {
                stdout: String::new(),
                stderr: "Simulated failure".to_string(),
                code: 1,
            });
        }
        match action {
            "start" | "restart" => {
                self.set_active(name, "active");
            }
            "stop" => {
                self.set_active(name, "inactive");
            }
            "enable" => {
                self.set_enabled(name, "enabled");
            }
            "disable" => {
                self.set_enabled(name, "disabled");
            }
            "is-active" => {
                let state = self
                    .active
                    .borrow()
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| "inactive".to_string());
                let code = if state == "active" { 0 } else { 3 };
                return Ok(CommandOutput {
                    stdout: state,
                    stderr: String::new(),
                    code,
                });
            }
            "is-enabled" => {
                let state = self
                    .enabled
                    .borrow()
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| "disabled".to_string());
                let code = if state == "enabled" { 0 } else { 1 };
                return Ok(CommandOutput {
                    stdout: state,
                    stderr: String::new(),
                    code,
                });
            }
            _ => {}
        }
        Ok(ok_output(""))
    }
}

fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        code: 0,
    }
}
