use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::common::paths;
use crate::ui::prelude::*;

/// Writes an avatar into the AccountsService icon store and keeps the
/// per-user record's `Icon=` field pointing at it.
pub struct ProfileIconWriter {
    accounts_dir: PathBuf,
}

impl ProfileIconWriter {
    pub fn new() -> Self {
        Self::with_accounts_dir(paths::ACCOUNTS_SERVICE_DIR)
    }

    /// Use a different AccountsService root (used by tests).
    pub fn with_accounts_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            accounts_dir: dir.into(),
        }
    }

    pub fn icon_path(&self, username: &str) -> PathBuf {
        self.accounts_dir.join("icons").join(username)
    }

    pub fn user_record_path(&self, username: &str) -> PathBuf {
        self.accounts_dir.join("users").join(username)
    }

    /// Install `image` as the account icon for `username` and point the
    /// user record at it. Safe to run repeatedly with the same inputs.
    pub fn apply(&self, username: &str, image: &[u8]) -> Result<()> {
        let icon_path = self.icon_path(username);
        let record_path = self.user_record_path(username);

        if !record_path.exists() {
            fs::write(
                &record_path,
                format!("[User]\nIcon={}\n", icon_path.display()),
            )
            .with_context(|| format!("creating user record {}", record_path.display()))?;
        }

        fs::write(&icon_path, image)
            .with_context(|| format!("writing icon file {}", icon_path.display()))?;

        // AccountsService expects the icon to belong to root. Skipped when
        // not root so the writer stays testable against a temp directory.
        if nix::unistd::Uid::effective().is_root() {
            nix::unistd::chown(
                &icon_path,
                Some(nix::unistd::Uid::from_raw(0)),
                Some(nix::unistd::Gid::from_raw(0)),
            )
            .with_context(|| format!("chowning icon file {}", icon_path.display()))?;
        }

        let content = fs::read_to_string(&record_path)
            .with_context(|| format!("reading user record {}", record_path.display()))?;
        let icon_line = format!("Icon={}", icon_path.display());
        let updated = set_icon_line(&content, &icon_line);
        fs::write(&record_path, updated)
            .with_context(|| format!("updating user record {}", record_path.display()))?;

        emit(
            Level::Success,
            "icon.applied",
            &format!("Profile icon updated for {}", username),
            None,
        );
        Ok(())
    }
}

impl Default for ProfileIconWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the first `Icon=` line with `icon_line`, or append one when the
/// record has none. Every other line is left untouched.
fn set_icon_line(content: &str, icon_line: &str) -> String {
    if content.lines().any(|l| l.starts_with("Icon=")) {
        let mut replaced = false;
        let body = content
            .lines()
            .map(|l| {
                if !replaced && l.starts_with("Icon=") {
                    replaced = true;
                    icon_line
                } else {
                    l
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        if content.ends_with('\n') { body + "\n" } else { body }
    } else {
        format!("{}\n{}", content.trim_end_matches('\n'), icon_line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer_in_tempdir() -> (TempDir, ProfileIconWriter) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("icons")).unwrap();
        fs::create_dir_all(dir.path().join("users")).unwrap();
        let writer = ProfileIconWriter::with_accounts_dir(dir.path());
        (dir, writer)
    }

    #[test]
    fn test_apply_creates_record_and_icon() {
        let (_dir, writer) = writer_in_tempdir();
        writer.apply("alice", b"PNGDATA").unwrap();

        let icon = fs::read(writer.icon_path("alice")).unwrap();
        assert_eq!(icon, b"PNGDATA");

        let record = fs::read_to_string(writer.user_record_path("alice")).unwrap();
        let expected_line = format!("Icon={}", writer.icon_path("alice").display());
        assert!(record.starts_with("[User]\n"));
        assert_eq!(record.lines().filter(|l| l.starts_with("Icon=")).count(), 1);
        assert!(record.lines().any(|l| l == expected_line));
    }

    #[test]
    fn test_apply_replaces_existing_icon_line() {
        let (_dir, writer) = writer_in_tempdir();
        let record_path = writer.user_record_path("bob");
        fs::write(
            &record_path,
            "[User]\nLanguage=en_US.UTF-8\nIcon=/old/path\nSession=gnome\n",
        )
        .unwrap();

        writer.apply("bob", b"IMG").unwrap();

        let record = fs::read_to_string(&record_path).unwrap();
        let expected_line = format!("Icon={}", writer.icon_path("bob").display());
        assert_eq!(
            record,
            format!(
                "[User]\nLanguage=en_US.UTF-8\n{}\nSession=gnome\n",
                expected_line
            )
        );
    }

    #[test]
    fn test_apply_appends_when_icon_line_missing() {
        let (_dir, writer) = writer_in_tempdir();
        let record_path = writer.user_record_path("carol");
        fs::write(&record_path, "[User]\nLanguage=en_US.UTF-8\n").unwrap();

        writer.apply("carol", b"IMG").unwrap();

        let record = fs::read_to_string(&record_path).unwrap();
        let expected_line = format!("Icon={}", writer.icon_path("carol").display());
        assert_eq!(
            record,
            format!("[User]\nLanguage=en_US.UTF-8\n{}", expected_line)
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let (_dir, writer) = writer_in_tempdir();
        writer.apply("dave", b"IMG").unwrap();
        let first = fs::read_to_string(writer.user_record_path("dave")).unwrap();

        writer.apply("dave", b"IMG").unwrap();
        let second = fs::read_to_string(writer.user_record_path("dave")).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_apply_overwrites_prior_icon_bytes() {
        let (_dir, writer) = writer_in_tempdir();
        writer.apply("erin", b"OLDIMAGEDATA").unwrap();
        writer.apply("erin", b"NEW").unwrap();

        let icon = fs::read(writer.icon_path("erin")).unwrap();
        assert_eq!(icon, b"NEW");
    }
}
