//! cave-server: CAVE chat server
//!
//! Features:
//! - Nicknames and broadcast chat messages
//! - Per-user profiles (display name, bio, pronouns)
//! - Bounded client table and bounded input lines
//! - Configuration via CLI arguments or TOML file

use cave::config::Config;
use cave::runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        max_clients = config.max_clients,
        max_line_length = config.max_line_length,
        max_pending_output = config.max_pending_output,
        "Starting CAVE server"
    );

    runtime::run(config)?;
    Ok(())
}
