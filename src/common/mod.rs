pub mod paths;
pub mod privileges;
pub mod systemd;
