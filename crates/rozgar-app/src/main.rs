//! Rozgar application binary - composition root.
//!
//! 1. Parse the CLI and load configuration (file, env, flags)
//! 2. Initialize tracing
//! 3. Open the SQLite database
//! 4. Build the language model client and resolve the JWT secret
//! 5. Start the axum API server until Ctrl-C

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use rozgar_api::auth::load_or_generate_secret;
use rozgar_api::routes;
use rozgar_api::state::AppState;
use rozgar_chat::HttpLanguageModel;
use rozgar_core::config::RozgarConfig;
use rozgar_storage::Database;

use crate::cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = RozgarConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    args.apply_to(&mut config);
    config.general.data_dir = expand_home(&config.general.data_dir)
        .to_string_lossy()
        .to_string();

    // Tracing. RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.general.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Rozgar v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = PathBuf::from(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = config.database_path();
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Language model.
    let model = HttpLanguageModel::new(&config.model)?;
    tracing::info!(
        endpoint = %config.model.endpoint,
        model = %config.model.model,
        token = %model.masked_token(),
        "Language model client ready"
    );

    // Auth.
    let jwt_secret = if config.auth.jwt_secret.trim().is_empty() {
        load_or_generate_secret(&data_dir.join("jwt_secret"))
    } else {
        config.auth.jwt_secret.clone()
    };

    let state = AppState::new(config.clone(), db, Arc::new(model), &jwt_secret);

    // === API server ===

    routes::start_server(&config, state).await?;

    Ok(())
}
