//! Environment bootstrap: load an optional `.env` file for the active
//! environment tier and set a sensible default `RUST_LOG`.

use anyhow::Result;
use std::env;
use tracing::{info, warn};

/// Load `environment/<env>.env` if present, falling back to whatever
/// is already in the process environment.
pub fn load_environment_config(env: &str) -> Result<()> {
    let env_file = format!("environment/{}.env", env);

    match dotenv::from_filename(&env_file) {
        Ok(_) => info!("loaded environment configuration from {}", env_file),
        Err(e) => {
            warn!("failed to load environment file {}: {}", env_file, e);
            info!("falling back to environment variables and defaults");
        }
    }

    Ok(())
}

/// Current environment tier from the first CLI argument, defaulting to
/// `development`.
pub fn get_environment() -> String {
    env::args().nth(1).unwrap_or_else(|| "development".to_string())
}

/// Load the environment file and set a tier-appropriate default
/// `RUST_LOG` (never overriding an operator-set value).
pub fn configure_app() -> Result<()> {
    let env = get_environment();
    info!("configuring application for environment: {}", env);

    load_environment_config(&env)?;

    if env::var("RUST_LOG").is_err() {
        let default_filter = match env.as_str() {
            "production" => "info,dc_server=info",
            "staging" => "info,dc_server=debug",
            _ => "info,dc_server=debug,dc_core=debug",
        };
        env::set_var("RUST_LOG", default_filter);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_environment_defaults_to_development() {
        // argv[1] is not present under `cargo test`, so this exercises
        // the fallback branch rather than a real CLI argument.
        assert_eq!(get_environment(), "development");
    }
}
