//! Fixed filesystem locations the tool installs into. Everything lives at a
//! well-known system path; only the AccountsService entries vary by user.

pub const SERVICE_NAME: &str = "gnome-libravatar";

/// Where the running binary gets copied on install.
pub const EXECUTABLE_PATH: &str = "/usr/local/bin/gnome-libravatar";

/// Runtime marker: present once the unit has run this boot.
pub const MARKER_PATH: &str = "/run/gnome-libravatar.done";

pub const SYSTEM_UNIT_DIR: &str = "/etc/systemd/system";

pub const ACCOUNTS_SERVICE_DIR: &str = "/var/lib/AccountsService";
