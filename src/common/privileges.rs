use anyhow::{Context, Result};
use std::env;
use sudo::RunningAs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("this command must be run with root privileges, re-run it with sudo")]
    NeedRoot,
}

/// Every command touches system paths or systemd, so root is required
/// before any work starts.
pub fn require_root() -> Result<(), PrivilegeError> {
    match sudo::check() {
        RunningAs::Root => Ok(()),
        RunningAs::User | RunningAs::Suid => Err(PrivilegeError::NeedRoot),
    }
}

/// Resolve the login the command was invoked from. Under sudo the real
/// account is in SUDO_USER, not in the uid.
pub fn logged_in_username() -> Result<String> {
    for var in ["SUDO_USER", "USER"] {
        if let Ok(user) = env::var(var)
            && !user.is_empty()
        {
            return Ok(user);
        }
    }

    let uid = nix::unistd::Uid::current();
    let entry = nix::unistd::User::from_uid(uid)
        .context("looking up the current user in the password database")?
        .with_context(|| format!("no password database entry for uid {}", uid))?;
    Ok(entry.name)
}
