//! Bootstrap gateway: maps addresses to serving nodes and topics to
//! subscribers.
//!
//! [`RpcGateway`] speaks JSON-RPC 2.0 over HTTP to a seed node. Calls are
//! single-shot; retrying is the connection manager's business.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use nkn_protocol::rpc::{METHOD_GET_SUBSCRIBERS, METHOD_GET_WS_ADDR};
use nkn_protocol::{JsonRpcRequest, JsonRpcResponse};
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::types::{ClientError, Endpoint, GatewayError};

/// Resolution calls the client needs from the overlay.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    /// Endpoint of the node that currently serves `address`.
    async fn resolve_endpoint(&self, address: &str) -> Result<Endpoint, GatewayError>;

    /// Addresses currently subscribed to `topic`.
    async fn resolve_subscribers(&self, topic: &str) -> Result<Vec<String>, GatewayError>;
}

/// JSON-RPC client for a bootstrap seed.
#[derive(Debug)]
pub struct RpcGateway {
    http: Client,
    seed_rpc_server_addr: String,
    next_id: AtomicU64,
}

impl RpcGateway {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(cfg.rpc_timeout())
            .build()
            .map_err(|e| ClientError::Config(format!("http client: {e}")))?;

        Ok(Self {
            http,
            seed_rpc_server_addr: cfg.seed_rpc_server_addr.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue one JSON-RPC call and return its `result`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        tracing::trace!(method, id, seed = %self.seed_rpc_server_addr, "seed rpc call");

        let resp = self
            .http
            .post(&self.seed_rpc_server_addr)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::Malformed(format!("{method}: {e}: {body}"))
        })?;
        Ok(parsed.into_result()?)
    }
}

#[async_trait]
impl Gateway for RpcGateway {
    async fn resolve_endpoint(&self, address: &str) -> Result<Endpoint, GatewayError> {
        let result = self
            .call(METHOD_GET_WS_ADDR, json!({ "address": address }))
            .await?;
        let host = result.as_str().ok_or_else(|| {
            GatewayError::Malformed(format!("{METHOD_GET_WS_ADDR}: expected string, got {result}"))
        })?;
        Endpoint::from_host(host)
    }

    async fn resolve_subscribers(&self, topic: &str) -> Result<Vec<String>, GatewayError> {
        let result = self
            .call(METHOD_GET_SUBSCRIBERS, json!({ "topic": topic }))
            .await?;
        parse_subscribers(result)
    }
}

fn parse_subscribers(result: Value) -> Result<Vec<String>, GatewayError> {
    match result {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(GatewayError::Malformed(format!(
                    "{METHOD_GET_SUBSCRIBERS}: expected address string, got {other}"
                ))),
            })
            .collect(),
        other => Err(GatewayError::Malformed(format!(
            "{METHOD_GET_SUBSCRIBERS}: expected array, got {other}"
        ))),
    }
}
