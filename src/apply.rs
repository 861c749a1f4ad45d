use anyhow::{Context, Result};

use crate::avatar::AvatarFetcher;
use crate::icon::ProfileIconWriter;
use crate::ui::prelude::*;

/// Fetch the avatar for `email` and install it as the profile icon of
/// `username`. This is what the boot unit runs once per boot.
pub fn run(username: &str, email: &str) -> Result<()> {
    run_with(&AvatarFetcher::new(), &ProfileIconWriter::new(), username, email)
}

fn run_with(
    fetcher: &AvatarFetcher,
    writer: &ProfileIconWriter,
    username: &str,
    email: &str,
) -> Result<()> {
    emit(
        Level::Info,
        "apply.fetch",
        &format!("Downloading avatar for {}", email.trim()),
        None,
    );
    let image = fetcher
        .fetch(email)
        .context("downloading the avatar image")?;
    emit(
        Level::Info,
        "apply.fetched",
        &format!("Avatar downloaded ({} bytes)", image.len()),
        None,
    );

    writer
        .apply(username, &image)
        .with_context(|| format!("applying the profile icon for {}", username))?;
    Ok(())
}
