pub mod config;
pub mod logger;
pub mod password;
pub mod settings_toml;

pub use config::*;
pub use logger::setup_logging;
pub use password::get_sftp_password;
pub use settings_toml::{RemdexToml, apply_file_to_opts, load_settings_toml, parse_settings_toml};
