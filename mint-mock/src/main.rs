/// Mock Cashu Mint
/// 
/// A lightweight mint that signs blinded outputs with in-memory keys.
/// Invoices are never real; quotes are paid via POST /regtest/pay/:quote_id
/// or immediately when AUTO_PAY is set.

mod handlers;
mod mint;
mod server;

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

use mint::MockMint;
use server::run_server;

#[derive(Debug)]
struct Config {
    // Mint
    units: Vec<String>,
    auto_pay: bool,
    
    // Server
    server_host: String,
    server_port: u16,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present
        
        let units = env::var("MINT_UNITS")
            .unwrap_or_else(|_| "sat,usd".to_string())
            .split(',')
            .map(|u| u.trim().to_lowercase())
            .filter(|u| !u.is_empty())
            .collect::<Vec<_>>();
        if units.is_empty() {
            anyhow::bail!("MINT_UNITS must name at least one unit");
        }
        
        let auto_pay = env::var("AUTO_PAY")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        
        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());
        
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3338".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;
        
        Ok(Self {
            units,
            auto_pay,
            server_host,
            server_port,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();
    
    log::info!("Starting Mock Cashu Mint...");
    
    // Load configuration
    let config = Config::from_env()
        .context("Failed to load configuration")?;
    
    log::info!("Units: {}", config.units.join(", "));
    log::info!("Auto-pay quotes: {}", config.auto_pay);
    log::info!("Server will listen on {}:{}", config.server_host, config.server_port);
    
    let mint = Arc::new(
        MockMint::new(&config.units, config.auto_pay)
            .context("Failed to generate mint keysets")?
    );
    
    // Run server
    run_server(mint, config.server_host, config.server_port)
        .await
        .context("Server error")?;
    
    Ok(())
}
