use cashu_wallet_api::api::server;
use cashu_wallet_api::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok(); // Load .env file if present

    // Initialize logger (set RUST_LOG=debug for verbose output, RUST_LOG=info for normal)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    
    let config = ServiceConfig::from_env();
    
    log::info!("Starting Cashu wallet server on {}", config.bind_address);
    server::start_server(config).await?;
    Ok(())
}
