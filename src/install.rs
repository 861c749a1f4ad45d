use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::common::paths;
use crate::common::privileges::logged_in_username;
use crate::common::systemd::{SystemServiceConfig, SystemdManager};
use crate::ui::prelude::*;

/// Install the executable and the once-per-boot systemd service. Steps run
/// in order and the first failure aborts the rest; cleanup of anything
/// already written is `uninstall`'s job.
pub fn run(username: Option<String>, email: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => logged_in_username().context("determining the account to apply the icon to")?,
    };
    let email = match email {
        Some(email) => email,
        None => prompt_email()?,
    };

    emit(
        Level::Info,
        "install.target",
        &format!("Installing avatar service for {} ({})", username, email.trim()),
        None,
    );

    install_executable()?;

    let manager = SystemdManager::new();
    let config = service_config(&username, &email);
    let unit_path = manager.write_unit_file(&config)?;
    emit(
        Level::Info,
        "install.unit",
        &format!("Created systemd unit at {}", unit_path.display()),
        None,
    );

    manager.daemon_reload()?;
    manager.enable(paths::SERVICE_NAME)?;
    manager.start(paths::SERVICE_NAME)?;

    emit(
        Level::Success,
        "install.done",
        "Service enabled and started; the icon refreshes once per boot",
        None,
    );
    Ok(())
}

/// The unit that runs `apply` once per boot. The marker file makes the
/// restart policy safe: a boot where the unit already succeeded is skipped
/// via ExecCondition, while ExecStartPre clears a stale marker left over
/// from the previous boot.
fn service_config(username: &str, email: &str) -> SystemServiceConfig {
    SystemServiceConfig::new(
        paths::SERVICE_NAME,
        "Change the account profile icon from Libravatar",
        format!(
            "{} apply {} {}",
            paths::EXECUTABLE_PATH,
            username,
            email.trim()
        ),
    )
    .with_after("network-online.target")
    .with_wants("network-online.target")
    .with_service_type("oneshot")
    .with_remain_after_exit(true)
    .with_environment("DISPLAY=:0")
    .with_user("root")
    .with_restart("on-failure")
    .with_restart_sec("30s")
    .with_exec_start_pre(format!("/bin/rm -f {}", paths::MARKER_PATH))
    .with_exec_condition(format!("/bin/bash -c '! [ -e {} ]'", paths::MARKER_PATH))
    .with_exec_start_post(format!("/bin/touch {}", paths::MARKER_PATH))
}

fn install_executable() -> Result<()> {
    let source = env::current_exe().context("resolving the current executable")?;
    let dest = Path::new(paths::EXECUTABLE_PATH);

    if let Some(dir) = dest.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating directory {}", dir.display()))?;
    }

    fs::copy(&source, dest).with_context(|| {
        format!("copying {} to {}", source.display(), dest.display())
    })?;
    fs::set_permissions(dest, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("marking {} executable", dest.display()))?;

    emit(
        Level::Info,
        "install.executable",
        &format!("Installed executable at {}", dest.display()),
        None,
    );
    Ok(())
}

fn prompt_email() -> Result<String> {
    let email: String = dialoguer::Input::new()
        .with_prompt("What is your Email")
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("email must not be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("reading the email address")?;
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_config_renders_boot_unit() {
        let content = service_config("alice", " alice@example.com ").to_service_content();

        assert!(content.contains(
            "ExecStart=/usr/local/bin/gnome-libravatar apply alice alice@example.com"
        ));
        assert!(content.contains("After=network-online.target"));
        assert!(content.contains("Wants=network-online.target"));
        assert!(content.contains("Type=oneshot"));
        assert!(content.contains("RemainAfterExit=true"));
        assert!(content.contains("Environment=DISPLAY=:0"));
        assert!(content.contains("User=root"));
        assert!(content.contains("Restart=on-failure"));
        assert!(content.contains("RestartSec=30s"));
        assert!(content.contains("ExecStartPre=/bin/rm -f /run/gnome-libravatar.done"));
        assert!(
            content.contains("ExecCondition=/bin/bash -c '! [ -e /run/gnome-libravatar.done ]'")
        );
        assert!(content.contains("ExecStartPost=/bin/touch /run/gnome-libravatar.done"));
        assert!(content.contains("WantedBy=multi-user.target"));
    }
}
