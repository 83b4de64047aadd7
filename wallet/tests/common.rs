//! Common test utilities for wallet API integration tests
//! 
//! This module provides shared test infrastructure including:
//! - A mock mint served on an ephemeral port
//! - The wallet API served over a temporary data directory
//! - Small JSON request helpers
#![allow(dead_code)]

use cashu_wallet_api::api::server::{cors_layer, create_manager, create_router};
use cashu_wallet_api::ServiceConfig;
use cashu_wallet_manager::WalletManager;
use mint_mock::MockMint;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Mock mint plus wallet API, torn down on drop
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config: ServiceConfig,
    pub manager: Arc<WalletManager>,
    pub mint: Arc<MockMint>,
    pub mint_url: String,
    pub api_url: String,
    pub client: reqwest::Client,
    tasks: Vec<JoinHandle<()>>,
}

impl TestEnvironment {
    pub async fn new() -> anyhow::Result<Self> {
        init_logger();

        // Mock mint
        let mint = Arc::new(MockMint::new(&["sat".to_string(), "usd".to_string()], false)?);
        let (mint_listener, mint_addr) = bind_ephemeral().await?;
        let mint_task = {
            let mint = mint.clone();
            tokio::spawn(async move {
                if let Err(e) = mint_mock::serve(mint_listener, mint).await {
                    log::error!("Mock mint stopped: {}", e);
                }
            })
        };
        log::info!("🪙 Mock mint at http://{}", mint_addr);

        // Wallet API over a temp data dir, no background poller
        let temp_dir = TempDir::new()?;
        log::info!("📁 Test directory: {:?}", temp_dir.path());
        let config = ServiceConfig {
            data_dir: temp_dir.path().to_path_buf(),
            quote_poll_interval: None,
            ..Default::default()
        };

        let manager = create_manager(&config).await?;
        let app = create_router(manager.clone(), cors_layer(None)?);
        let (api_listener, api_addr) = bind_ephemeral().await?;
        let api_task = tokio::spawn(async move {
            if let Err(e) = axum::serve(api_listener, app).await {
                log::error!("Wallet API stopped: {}", e);
            }
        });

        Ok(Self {
            temp_dir,
            config,
            manager,
            mint,
            mint_url: format!("http://{}", mint_addr),
            api_url: format!("http://{}", api_addr),
            client: reqwest::Client::new(),
            tasks: vec![mint_task, api_task],
        })
    }

    pub async fn get(&self, path: &str) -> anyhow::Result<(u16, Value)> {
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .send()
            .await?;
        read(response).await
    }

    pub async fn post(&self, path: &str, body: Value) -> anyhow::Result<(u16, Value)> {
        let response = self
            .client
            .post(format!("{}{}", self.api_url, path))
            .json(&body)
            .send()
            .await?;
        read(response).await
    }

    pub async fn put(&self, path: &str, body: Value) -> anyhow::Result<(u16, Value)> {
        let response = self
            .client
            .put(format!("{}{}", self.api_url, path))
            .json(&body)
            .send()
            .await?;
        read(response).await
    }

    /// Pay a quote through the mock mint's regtest endpoint
    pub async fn pay_quote(&self, quote: &str) -> anyhow::Result<()> {
        self.client
            .post(format!("{}/regtest/pay/{}", self.mint_url, quote))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        log::info!("🧹 Cleaning up test environment...");
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn bind_ephemeral() -> anyhow::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    Ok((listener, addr))
}

async fn read(response: reqwest::Response) -> anyhow::Result<(u16, Value)> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    Ok((status, value))
}

pub fn parse<T: DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("response shape")
}
