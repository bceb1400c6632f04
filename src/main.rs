use claimdesk::config::AppConfig;
use claimdesk::main_module::run_axum_server;
use claimdesk::shared::state::AppState;
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env()?;
    info!(
        "Starting claimdesk {} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.host,
        config.server.port
    );

    let state = Arc::new(AppState::from_config(config)?);
    run_axum_server(state).await?;
    Ok(())
}
