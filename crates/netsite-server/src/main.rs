use anyhow::{Context, Result};
use netsite_monitoring::LogExt;
use netsite_server::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment variables
    let config = ServerConfig::load().context("Failed to load configuration")?;

    let monitoring_config = config.monitoring_config();
    netsite_monitoring::init_logging(&monitoring_config).context("Failed to initialize logging")?;

    // Run the server using the library's run function
    netsite_server::run(config)
        .await
        .log_err("Server stopped with an error")
        .context("Server error")?;

    netsite_monitoring::shutdown(&monitoring_config);
    Ok(())
}
