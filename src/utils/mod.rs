// src/utils/mod.rs
pub mod country;
pub mod db_connect;
pub mod service_provider;

use anyhow::{Context, Result};
use log::{info, warn};

/// Loads environment variables from a .env file, setting only keys that are
/// not already present in the process environment.
pub fn load_env_from_file(file_path: &str) -> Result<()> {
    use std::fs::File;
    use std::io::{BufRead, BufReader};

    match File::open(file_path) {
        Ok(file) => {
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = line.context("Failed to read line from env file")?;
                let line = line.trim();
                if line.starts_with('#') || line.is_empty() {
                    continue;
                }
                if let Some(idx) = line.find('=') {
                    let key = line[..idx].trim();
                    let value = line[idx + 1..].trim().trim_matches('"');
                    if std::env::var(key).is_err() {
                        std::env::set_var(key, value);
                    }
                }
            }
            info!("Loaded environment variables from {}", file_path);
        }
        Err(e) => {
            warn!("No env file at {} ({}); using process environment", file_path, e);
        }
    }
    Ok(())
}

/// Loads .env from the working directory if present.
pub fn load_env() {
    let _ = load_env_from_file(".env");
}
