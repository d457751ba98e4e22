use anyhow::Result;
use sgn_common::AppConfig;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    // With no config path, defaults plus environment overrides are used.
    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(config_path = %path, "loading configuration");
            AppConfig::load(&path)?
        }
        None => {
            info!("no config path given, using defaults and environment");
            AppConfig::from_env()?
        }
    };

    let listen = config.server.listen.clone();
    let admin_listen = config.server.admin_listen.clone();
    let state = sgn_api::new_shared_state(config)?;

    info!(
        listen = %listen,
        admin_listen = %admin_listen,
        primary = %state.selector.primary(),
        secondary = %state.selector.secondary(),
        secondary_credentials = state.selector.has_secondary_credentials(),
        "starting compliance gateway"
    );

    tokio::try_join!(
        sgn_api::run_server(state.clone(), &listen),
        sgn_api::run_admin_server(state, &admin_listen),
    )?;

    Ok(())
}
