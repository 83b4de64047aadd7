//! Mint API client
//!
//! `MintConnector` is the seam between wallet bookkeeping and the mint.
//! `HttpMintClient` talks to a real mint over its v1 REST API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CashuError, Result};
use crate::nuts::{
    ErrorResponse, KeySetInfo, KeysResponse, KeysetResponse, MintInfo, MintKeys,
    MintQuoteRequest, MintQuoteResponse, MintRequest, MintResponse,
};

#[async_trait]
pub trait MintConnector: Send + Sync {
    /// Base URL of the mint this connector talks to
    fn mint_url(&self) -> &str;

    async fn get_info(&self) -> Result<MintInfo>;

    async fn get_keysets(&self) -> Result<Vec<KeySetInfo>>;

    async fn get_keys(&self, keyset_id: &str) -> Result<MintKeys>;

    async fn create_mint_quote(
        &self,
        amount: u64,
        unit: &str,
        description: Option<String>,
    ) -> Result<MintQuoteResponse>;

    async fn check_mint_quote(&self, quote_id: &str) -> Result<MintQuoteResponse>;

    async fn mint(&self, request: MintRequest) -> Result<MintResponse>;
}

/// Builds the connector used for a given mint URL
pub type ConnectorFactory = Arc<dyn Fn(&str) -> Arc<dyn MintConnector> + Send + Sync>;

/// Factory producing `HttpMintClient`s
pub fn http_connector_factory() -> ConnectorFactory {
    Arc::new(|url: &str| Arc::new(HttpMintClient::new(url)) as Arc<dyn MintConnector>)
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpMintClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMintClient {
    pub fn new(mint_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: mint_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(err) => Err(CashuError::Mint {
                code: err.code,
                detail: err.detail,
            }),
            Err(_) => Err(CashuError::Mint {
                code: None,
                detail: format!("HTTP {}: {}", status, body),
            }),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        log::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        log::debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl MintConnector for HttpMintClient {
    fn mint_url(&self) -> &str {
        &self.base_url
    }

    async fn get_info(&self) -> Result<MintInfo> {
        self.get_json("/v1/info").await
    }

    async fn get_keysets(&self) -> Result<Vec<KeySetInfo>> {
        let response: KeysetResponse = self.get_json("/v1/keysets").await?;
        Ok(response.keysets)
    }

    async fn get_keys(&self, keyset_id: &str) -> Result<MintKeys> {
        let response: KeysResponse = self.get_json(&format!("/v1/keys/{}", keyset_id)).await?;
        response
            .keysets
            .into_iter()
            .find(|k| k.id == keyset_id)
            .ok_or_else(|| {
                CashuError::InvalidMintResponse(format!("keyset {} missing from response", keyset_id))
            })
    }

    async fn create_mint_quote(
        &self,
        amount: u64,
        unit: &str,
        description: Option<String>,
    ) -> Result<MintQuoteResponse> {
        let request = MintQuoteRequest {
            amount,
            unit: unit.to_string(),
            description,
        };
        self.post_json("/v1/mint/quote/bolt11", &request).await
    }

    async fn check_mint_quote(&self, quote_id: &str) -> Result<MintQuoteResponse> {
        self.get_json(&format!("/v1/mint/quote/bolt11/{}", quote_id))
            .await
    }

    async fn mint(&self, request: MintRequest) -> Result<MintResponse> {
        self.post_json("/v1/mint/bolt11", &request).await
    }
}
