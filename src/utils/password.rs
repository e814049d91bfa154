//! SFTP password loading: env var → .env in dir → secure prompt.

use anyhow::{Context, Result};
use colored::Colorize;
use log::info;
use std::path::Path;

use crate::utils::config::PackagePaths;

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn try_env_then_dotenv(dir: &Path) -> Option<String> {
    let key = PackagePaths::get().password_env();
    if let Some(s) = non_empty_env(key) {
        return Some(s);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        return non_empty_env(key);
    }
    None
}

/// Read the SFTP password for `account` (`user@host`): env (REMDEX_SFTP_PASSWORD) → .env in
/// `dir` → secure prompt.
pub fn get_sftp_password(dir: &Path, account: &str) -> Result<String> {
    if let Some(s) = try_env_then_dotenv(dir) {
        info!("SFTP password found in environment");
        return Ok(s);
    }
    let label = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    let pass = rpassword::prompt_password(format!("{} Password for {}: ", label, account))
        .context("read SFTP password")?;
    Ok(pass.trim_end_matches(['\r', '\n']).to_string())
}
