//! Network client construction
//!
//! The pool treats clients as opaque handles. `ClientFactory` is the seam
//! between the pool and whatever protocol client the tool layer uses;
//! `LcdClientFactory` is the production implementation, building an HTTP
//! client bound to one LCD endpoint and chain id.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Where new clients should point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfig {
    pub endpoint: String,
    pub chain_id: String,
}

impl NetworkConfig {
    pub fn new(endpoint: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            chain_id: chain_id.into(),
        }
    }
}

/// Builds fresh network clients for the pool.
///
/// Uses `Pin<Box<dyn Future>>` so factories can be stored behind `Arc<dyn _>`
/// by callers that need to.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: Send + 'static;

    /// Construct a client for `network`. Errors map to `Error::Network`.
    fn create<'a>(
        &'a self,
        network: &'a NetworkConfig,
    ) -> Pin<Box<dyn Future<Output = Result<Self::Client>> + Send + 'a>>;
}

/// HTTP client bound to one LCD endpoint.
#[derive(Debug, Clone)]
pub struct LcdClient {
    http: reqwest::Client,
    network: NetworkConfig,
}

impl LcdClient {
    pub fn endpoint(&self) -> &str {
        &self.network.endpoint
    }

    pub fn chain_id(&self) -> &str {
        &self.network.chain_id
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Full URL for an LCD path such as `/cosmos/base/tendermint/v1beta1/node_info`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.network.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET a JSON document from the LCD.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let url = self.url(path);
        let request_error = |source| Error::Request {
            endpoint: url.clone(),
            source,
        };
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(request_error)?
            .error_for_status()
            .map_err(request_error)?;
        response.json().await.map_err(request_error)
    }

    /// Node information, used as a connectivity probe.
    pub async fn node_info(&self) -> Result<serde_json::Value> {
        self.get_json("/cosmos/base/tendermint/v1beta1/node_info")
            .await
    }
}

/// Creates [`LcdClient`]s with a shared request timeout.
#[derive(Debug, Clone)]
pub struct LcdClientFactory {
    request_timeout: Duration,
}

impl LcdClientFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl ClientFactory for LcdClientFactory {
    type Client = LcdClient;

    fn create<'a>(
        &'a self,
        network: &'a NetworkConfig,
    ) -> Pin<Box<dyn Future<Output = Result<LcdClient>> + Send + 'a>> {
        Box::pin(async move {
            if !(network.endpoint.starts_with("http://") || network.endpoint.starts_with("https://"))
            {
                return Err(Error::Network(format!(
                    "endpoint must be an http(s) URL: {}",
                    network.endpoint
                )));
            }
            let http = reqwest::Client::builder()
                .timeout(self.request_timeout)
                .build()
                .map_err(|e| Error::Network(e.to_string()))?;
            debug!(endpoint = %network.endpoint, chain_id = %network.chain_id, "created LCD client");
            Ok(LcdClient {
                http,
                network: network.clone(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ErrorCode, Remediation};

    fn testnet() -> NetworkConfig {
        NetworkConfig::new("https://pulsar.lcd.secretnodes.com/", "pulsar-3")
    }

    #[tokio::test]
    async fn factory_binds_client_to_network() {
        let factory = LcdClientFactory::new(Duration::from_secs(5));
        let client = factory.create(&testnet()).await.unwrap();
        assert_eq!(client.chain_id(), "pulsar-3");
        assert_eq!(client.endpoint(), "https://pulsar.lcd.secretnodes.com/");
    }

    #[tokio::test]
    async fn url_joins_without_double_slash() {
        let factory = LcdClientFactory::new(Duration::from_secs(5));
        let client = factory.create(&testnet()).await.unwrap();
        assert_eq!(
            client.url("/cosmos/base/tendermint/v1beta1/node_info"),
            "https://pulsar.lcd.secretnodes.com/cosmos/base/tendermint/v1beta1/node_info"
        );
    }

    #[tokio::test]
    async fn non_http_endpoint_is_network_error() {
        let factory = LcdClientFactory::new(Duration::from_secs(5));
        let err = factory
            .create(&NetworkConfig::new("grpc://node:9090", "secret-4"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Network);
        assert!(err.is_retryable());
    }
}
