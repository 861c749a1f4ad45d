mod apply;
mod avatar;
mod common;
mod icon;
mod install;
mod ui;
mod uninstall;

use clap::{Parser, Subcommand};
use ui::prelude::*;

/// Set the GNOME account profile picture from Libravatar
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug output
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit line-delimited JSON events instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download the avatar for an email address and set it as the profile icon
    Apply {
        /// Account whose profile icon should change
        username: String,
        /// Email address the avatar is registered under
        email: String,
    },

    /// Install the executable and the once-per-boot systemd service
    Install {
        /// Account to apply the icon to (defaults to the invoking login)
        #[arg(short, long)]
        username: Option<String>,
        /// Email address the avatar is registered under (prompted when absent)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Stop the service and remove the icon, record entry and executable
    Uninstall,
}

fn main() {
    let cli = Cli::parse();

    ui::init(
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
        true,
    );
    ui::set_debug_mode(cli.debug);

    if let Err(e) = common::privileges::require_root() {
        emit(Level::Error, "privileges", &e.to_string(), None);
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Apply { username, email } => apply::run(&username, &email),
        Commands::Install { username, email } => install::run(username, email),
        Commands::Uninstall => uninstall::run(),
    };

    if let Err(e) = result {
        emit(Level::Error, "error", &format!("{e:#}"), None);
        std::process::exit(1);
    }
}
