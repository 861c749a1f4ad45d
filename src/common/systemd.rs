use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

use crate::common::paths;

/// Errors from driving systemctl.
#[derive(Debug, Error)]
pub enum ServiceControlError {
    #[error("failed to invoke systemctl {args}: {source}")]
    Spawn {
        args: String,
        #[source]
        source: std::io::Error,
    },
    #[error("systemctl {args} exited with status {code}")]
    Failed { args: String, code: i32 },
}

/// Declarative description of a system service unit.
#[derive(Debug, Clone)]
pub struct SystemServiceConfig {
    pub name: String,
    pub description: String,
    pub exec_start: String,
    pub after: Option<String>,
    pub wants: Option<String>,
    pub service_type: Option<String>,
    pub remain_after_exit: bool,
    pub environment: Vec<String>,
    pub user: Option<String>,
    pub restart: Option<String>,
    pub restart_sec: Option<String>,
    pub exec_start_pre: Option<String>,
    pub exec_condition: Option<String>,
    pub exec_start_post: Option<String>,
    pub wanted_by: Option<String>,
}

impl SystemServiceConfig {
    /// Create a new service configuration
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        exec_start: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            exec_start: exec_start.into(),
            after: None,
            wants: None,
            service_type: None,
            remain_after_exit: false,
            environment: Vec::new(),
            user: None,
            restart: None,
            restart_sec: None,
            exec_start_pre: None,
            exec_condition: None,
            exec_start_post: None,
            wanted_by: Some("multi-user.target".to_string()),
        }
    }

    pub fn with_after(mut self, after: impl Into<String>) -> Self {
        self.after = Some(after.into());
        self
    }

    pub fn with_wants(mut self, wants: impl Into<String>) -> Self {
        self.wants = Some(wants.into());
        self
    }

    pub fn with_service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    pub fn with_remain_after_exit(mut self, remain: bool) -> Self {
        self.remain_after_exit = remain;
        self
    }

    pub fn with_environment(mut self, env: impl Into<String>) -> Self {
        self.environment.push(env.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_restart(mut self, restart: impl Into<String>) -> Self {
        self.restart = Some(restart.into());
        self
    }

    pub fn with_restart_sec(mut self, sec: impl Into<String>) -> Self {
        self.restart_sec = Some(sec.into());
        self
    }

    pub fn with_exec_start_pre(mut self, cmd: impl Into<String>) -> Self {
        self.exec_start_pre = Some(cmd.into());
        self
    }

    pub fn with_exec_condition(mut self, cmd: impl Into<String>) -> Self {
        self.exec_condition = Some(cmd.into());
        self
    }

    pub fn with_exec_start_post(mut self, cmd: impl Into<String>) -> Self {
        self.exec_start_post = Some(cmd.into());
        self
    }

    pub fn with_wanted_by(mut self, target: impl Into<String>) -> Self {
        self.wanted_by = Some(target.into());
        self
    }

    /// Generate the unit file content
    pub fn to_service_content(&self) -> String {
        let mut content = format!("[Unit]\nDescription={}\n", self.description);

        if let Some(after) = &self.after {
            content.push_str(&format!("After={}\n", after));
        }
        if let Some(wants) = &self.wants {
            content.push_str(&format!("Wants={}\n", wants));
        }

        content.push_str("\n[Service]\n");
        content.push_str(&format!("ExecStart={}\n", self.exec_start));

        if let Some(service_type) = &self.service_type {
            content.push_str(&format!("Type={}\n", service_type));
        }
        if self.remain_after_exit {
            content.push_str("RemainAfterExit=true\n");
        }
        for env in &self.environment {
            content.push_str(&format!("Environment={}\n", env));
        }
        if let Some(user) = &self.user {
            content.push_str(&format!("User={}\n", user));
        }
        if let Some(restart) = &self.restart {
            content.push_str(&format!("Restart={}\n", restart));
        }
        if let Some(restart_sec) = &self.restart_sec {
            content.push_str(&format!("RestartSec={}\n", restart_sec));
        }
        if let Some(pre) = &self.exec_start_pre {
            content.push_str(&format!("ExecStartPre={}\n", pre));
        }
        if let Some(condition) = &self.exec_condition {
            content.push_str(&format!("ExecCondition={}\n", condition));
        }
        if let Some(post) = &self.exec_start_post {
            content.push_str(&format!("ExecStartPost={}\n", post));
        }

        content.push_str("\n[Install]\n");
        if let Some(wanted_by) = &self.wanted_by {
            content.push_str(&format!("WantedBy={}\n", wanted_by));
        }

        content
    }
}

/// Systemd manager for system-scope units.
pub struct SystemdManager {
    unit_dir: PathBuf,
}

impl SystemdManager {
    pub fn new() -> Self {
        Self::with_unit_dir(paths::SYSTEM_UNIT_DIR)
    }

    /// Use a different unit directory (used by tests).
    pub fn with_unit_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            unit_dir: dir.into(),
        }
    }

    pub fn unit_path(&self, service_name: &str) -> PathBuf {
        self.unit_dir.join(format!("{}.service", service_name))
    }

    /// Write the unit file for a service configuration, returning its path.
    pub fn write_unit_file(&self, config: &SystemServiceConfig) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.unit_dir).with_context(|| {
            format!("creating unit directory {}", self.unit_dir.display())
        })?;

        let unit_path = self.unit_path(&config.name);
        std::fs::write(&unit_path, config.to_service_content())
            .with_context(|| format!("writing unit file {}", unit_path.display()))?;
        Ok(unit_path)
    }

    /// Remove the unit file for a service. Returns false when there was
    /// nothing to remove.
    pub fn remove_unit_file(&self, service_name: &str) -> Result<bool> {
        let unit_path = self.unit_path(service_name);
        if !unit_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&unit_path)
            .with_context(|| format!("removing unit file {}", unit_path.display()))?;
        Ok(true)
    }

    pub fn start(&self, service_name: &str) -> Result<(), ServiceControlError> {
        self.run_systemctl(&["start", &unit_name(service_name)])
    }

    pub fn stop(&self, service_name: &str) -> Result<(), ServiceControlError> {
        self.run_systemctl(&["stop", &unit_name(service_name)])
    }

    pub fn enable(&self, service_name: &str) -> Result<(), ServiceControlError> {
        self.run_systemctl(&["enable", &unit_name(service_name)])
    }

    pub fn disable(&self, service_name: &str) -> Result<(), ServiceControlError> {
        self.run_systemctl(&["disable", &unit_name(service_name)])
    }

    pub fn daemon_reload(&self) -> Result<(), ServiceControlError> {
        self.run_systemctl(&["daemon-reload"])
    }

    fn run_systemctl(&self, args: &[&str]) -> Result<(), ServiceControlError> {
        let status = Command::new("systemctl")
            .args(args)
            .status()
            .map_err(|source| ServiceControlError::Spawn {
                args: args.join(" "),
                source,
            })?;

        if !status.success() {
            return Err(ServiceControlError::Failed {
                args: args.join(" "),
                code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

impl Default for SystemdManager {
    fn default() -> Self {
        Self::new()
    }
}

fn unit_name(service_name: &str) -> String {
    format!("{}.service", service_name)
}
