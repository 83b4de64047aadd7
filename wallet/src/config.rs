/// Service configuration from environment variables
/// 
/// Controls where the HTTP API binds, where wallet state is persisted and
/// how often pending mint quotes are polled.

use cashu_wallet_manager::types::DEFAULT_UNIT;
use cashu_wallet_manager::LogLevel;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Address the HTTP API listens on
    pub bind_address: String,
    /// Directory holding the wallet store (one JSON file per key)
    pub data_dir: PathBuf,
    /// Unit made active on a fresh store
    pub default_unit: String,
    /// Pending quote polling interval; `None` disables the poller
    pub quote_poll_interval: Option<Duration>,
    /// Library log level applied at startup
    pub log_level: Option<LogLevel>,
    /// Comma-separated CORS origins; unset allows any origin
    pub allowed_origins: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables
    /// 
    /// Environment variables:
    /// - `BIND_ADDRESS`: listen address (default `0.0.0.0:3000`)
    /// - `WALLET_DATA_DIR`: wallet store directory (default `./wallet-data`)
    /// - `DEFAULT_UNIT`: unit for a fresh store (default `sat`)
    /// - `QUOTE_POLL_INTERVAL_SECS`: seconds between quote checks, `0` disables (default `5`)
    /// - `CASHU_LOG_LEVEL`: debug, info, warn, error or none (optional)
    /// - `ALLOWED_ORIGINS`: CORS origins (optional)
    /// 
    /// # Examples
    /// 
    /// ```bash
    /// # Against a local mock mint
    /// SERVER_PORT=3338 cargo run -p mint-mock &
    /// BIND_ADDRESS=127.0.0.1:3000 cargo run -p cashu-wallet-api
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_address = env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address);
        
        let data_dir = env::var("WALLET_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        log::info!("📁 Wallet data directory: {:?}", data_dir);
        
        let default_unit = env::var("DEFAULT_UNIT")
            .map(|u| u.trim().to_lowercase())
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or(defaults.default_unit);
        
        let quote_poll_interval = match env::var("QUOTE_POLL_INTERVAL_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    log::info!("⏸️  Quote polling disabled");
                    None
                }
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    log::warn!("⚠️  Invalid QUOTE_POLL_INTERVAL_SECS '{}', using default", raw);
                    defaults.quote_poll_interval
                }
            },
            Err(_) => defaults.quote_poll_interval,
        };
        
        let log_level = env::var("CASHU_LOG_LEVEL").ok().map(|l| LogLevel::coerce(&l));
        
        let allowed_origins = env::var("ALLOWED_ORIGINS").ok().filter(|o| !o.is_empty());
        
        Self {
            bind_address,
            data_dir,
            default_unit,
            quote_poll_interval,
            log_level,
            allowed_origins,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            data_dir: PathBuf::from("./wallet-data"),
            default_unit: DEFAULT_UNIT.to_string(),
            quote_poll_interval: Some(Duration::from_secs(5)),
            log_level: None,
            allowed_origins: None,
        }
    }
}
