//! JSON-RPC over HTTP implementation of [`LedgerRpc`]

use crate::config::RpcConfig;
use crate::rpc::{LedgerRpc, RawSignatureStatus, RpcError, SendOptions, SimulationOutcome};
use crate::types::TransactionIdentifier;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// Results wrapped in a `{ context, value }` envelope
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

/// Typed JSON-RPC client for a ledger node
#[derive(Clone)]
pub struct JsonRpcLedgerClient {
    inner: Client,
    url: Url,
}

impl JsonRpcLedgerClient {
    pub fn new(config: &RpcConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("invalid rpc url {}: {}", config.url, e)))?;
        let inner = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Internal(format!("failed to build http client: {}", e)))?;
        Ok(Self { inner, url })
    }

    pub fn endpoint(&self) -> &Url {
        &self.url
    }

    /// Issue one JSON-RPC call and deserialize its result
    async fn call<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<R, RpcError> {
        let payload = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: 1,
            method,
            params,
        };
        debug!("rpc call {}", method);

        let response = self
            .inner
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{} request failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(RpcError::Transport(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Transport(format!("{} response unreadable: {}", method, e)))?;

        if let Some(error) = response.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = response.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| RpcError::Transport(format!("{} result malformed: {}", method, e)))
    }
}

#[async_trait]
impl LedgerRpc for JsonRpcLedgerClient {
    async fn simulate_transaction(
        &self,
        tx: &[u8],
    ) -> std::result::Result<SimulationOutcome, RpcError> {
        let encoded = general_purpose::STANDARD.encode(tx);
        let result: WithContext<SimulationOutcome> = self
            .call(
                "simulateTransaction",
                json!([encoded, { "encoding": "base64" }]),
            )
            .await?;
        Ok(result.value)
    }

    async fn send_transaction(
        &self,
        tx: &[u8],
        options: &SendOptions,
    ) -> std::result::Result<TransactionIdentifier, RpcError> {
        let encoded = general_purpose::STANDARD.encode(tx);
        let mut config = serde_json::to_value(options)
            .map_err(|e| RpcError::Transport(format!("send options unserializable: {}", e)))?;
        config["encoding"] = json!("base64");

        let signature: String = self
            .call("sendTransaction", json!([encoded, config]))
            .await?;
        Ok(TransactionIdentifier::new(signature))
    }

    async fn get_signature_status(
        &self,
        identifier: &TransactionIdentifier,
    ) -> std::result::Result<Option<RawSignatureStatus>, RpcError> {
        let result: WithContext<Vec<Option<RawSignatureStatus>>> = self
            .call("getSignatureStatuses", json!([[identifier.as_str()]]))
            .await?;
        Ok(result.value.into_iter().next().flatten())
    }
}
