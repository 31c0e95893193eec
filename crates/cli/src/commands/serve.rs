//! `confab serve` starts the HTTP API server.

use confab_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.server.port = port;
    }

    println!("Confab chat service");
    println!("  Listening:  {}", config.server.addr());
    println!("  Model:      {}", config.provider.model);
    println!("  Database:   {}", config.history.database_path);

    confab_gateway::start(config).await?;

    Ok(())
}
