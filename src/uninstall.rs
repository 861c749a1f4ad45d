use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::common::paths;
use crate::common::privileges::logged_in_username;
use crate::common::systemd::SystemdManager;
use crate::icon::ProfileIconWriter;
use crate::ui::prelude::*;

/// Reverse everything `install` and `apply` wrote. Targets that are already
/// gone are reported, not errors, so the command can be re-run on a clean
/// system. systemctl failures still abort the remaining steps.
pub fn run() -> Result<()> {
    let username = logged_in_username().context("determining the account to clean up")?;
    let writer = ProfileIconWriter::new();

    remove_profile_icon(&writer, &username)?;
    remove_service(&SystemdManager::new())?;
    remove_executable()?;

    emit(Level::Success, "uninstall.done", "Uninstall completed", None);
    Ok(())
}

/// Delete the icon file and strip `Icon=` lines from the user record,
/// leaving the rest of the record alone.
pub fn remove_profile_icon(writer: &ProfileIconWriter, username: &str) -> Result<()> {
    let icon_path = writer.icon_path(username);
    if icon_path.exists() {
        fs::remove_file(&icon_path)
            .with_context(|| format!("removing icon file {}", icon_path.display()))?;
        emit(
            Level::Info,
            "uninstall.icon",
            &format!("Removed profile icon {}", icon_path.display()),
            None,
        );
    } else {
        emit(
            Level::Info,
            "uninstall.icon.missing",
            &format!("No profile icon found at {}", icon_path.display()),
            None,
        );
    }

    let record_path = writer.user_record_path(username);
    if record_path.exists() {
        let content = fs::read_to_string(&record_path)
            .with_context(|| format!("reading user record {}", record_path.display()))?;
        fs::write(&record_path, strip_icon_lines(&content))
            .with_context(|| format!("updating user record {}", record_path.display()))?;
        emit(
            Level::Info,
            "uninstall.record",
            &format!("Removed the Icon entry from {}", record_path.display()),
            None,
        );
    } else {
        emit(
            Level::Info,
            "uninstall.record.missing",
            &format!("No user record found at {}", record_path.display()),
            None,
        );
    }

    Ok(())
}

fn remove_service(manager: &SystemdManager) -> Result<()> {
    let unit_path = manager.unit_path(paths::SERVICE_NAME);
    if !unit_path.exists() {
        emit(
            Level::Info,
            "uninstall.unit.missing",
            &format!("No systemd unit found at {}", unit_path.display()),
            None,
        );
        return Ok(());
    }

    // Stop and disable before deleting the unit file.
    manager.stop(paths::SERVICE_NAME)?;
    manager.disable(paths::SERVICE_NAME)?;
    manager.remove_unit_file(paths::SERVICE_NAME)?;
    manager.daemon_reload()?;

    emit(
        Level::Info,
        "uninstall.unit",
        &format!("Removed systemd unit {}", unit_path.display()),
        None,
    );
    Ok(())
}

fn remove_executable() -> Result<()> {
    let dest = Path::new(paths::EXECUTABLE_PATH);
    if dest.exists() {
        fs::remove_file(dest)
            .with_context(|| format!("removing executable {}", dest.display()))?;
        emit(
            Level::Info,
            "uninstall.executable",
            &format!("Removed executable {}", dest.display()),
            None,
        );
    } else {
        emit(
            Level::Info,
            "uninstall.executable.missing",
            &format!("No executable found at {}", dest.display()),
            None,
        );
    }
    Ok(())
}

/// Drop every `Icon=` line, keeping all other content in order.
fn strip_icon_lines(content: &str) -> String {
    let body = content
        .lines()
        .filter(|l| !l.starts_with("Icon="))
        .collect::<Vec<_>>()
        .join("\n");
    if content.ends_with('\n') && !body.is_empty() {
        body + "\n"
    } else {
        body
    }
}
