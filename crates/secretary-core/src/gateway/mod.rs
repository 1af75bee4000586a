//! JSON-RPC client for the managed tool gateway.
//!
//! The gateway exposes the calendar target over the MCP `tools/call`
//! method. Tool names are qualified as `<target>___<tool>`.
//!
//! The deployed gateway is IAM-authorized, so requests are SigV4-signed when
//! a signer is attached. The user's JWT then only travels as the reserved
//! `user_token` argument. Without a signer (local runs against a plain MCP
//! endpoint) the JWT is sent as a bearer token instead.

use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "aws")]
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::tool::{failure, ToolExecutor};
use crate::types::{CallerIdentity, ToolCall};
#[cfg(feature = "aws")]
use crate::util::sigv4::SigV4Signer;

/// Separator between target and tool name in gateway tool names.
pub const TARGET_SEPARATOR: &str = "___";

/// JSON-RPC request.
#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: ToolsCallParams<'a>,
}

#[derive(Serialize)]
struct ToolsCallParams<'a> {
    name: &'a str,
    arguments: Value,
}

/// JSON-RPC response.
#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    #[allow(dead_code)]
    code: Option<i64>,
    message: String,
}

/// Proxies tool calls to the gateway.
pub struct GatewayClient {
    http: Client,
    endpoint: String,
    target_name: String,
    next_id: AtomicU64,
    #[cfg(feature = "aws")]
    signer: Option<Arc<SigV4Signer>>,
}

impl GatewayClient {
    /// `http` should carry the gateway timeout (30 s by default).
    pub fn new(http: Client, config: &GatewayConfig) -> Result<Self, GatewayError> {
        if config.url.is_empty() {
            return Err(GatewayError::NotConfigured);
        }
        Ok(Self {
            http,
            endpoint: config.url.clone(),
            target_name: config.target_name.clone(),
            next_id: AtomicU64::new(1),
            #[cfg(feature = "aws")]
            signer: None,
        })
    }

    #[cfg(feature = "aws")]
    pub fn with_signer(mut self, signer: Arc<SigV4Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    #[cfg(feature = "aws")]
    fn is_signed(&self) -> bool {
        self.signer.is_some()
    }

    #[cfg(not(feature = "aws"))]
    fn is_signed(&self) -> bool {
        false
    }

    /// Gateway-side name of a catalog tool.
    pub fn qualify_tool_name(&self, name: &str) -> String {
        format!("{}{}{}", self.target_name, TARGET_SEPARATOR, name)
    }

    /// Send a `tools/call` request and unwrap the gateway envelope.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        bearer_token: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let qualified = self.qualify_tool_name(name);
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method: "tools/call",
            params: ToolsCallParams {
                name: &qualified,
                arguments,
            },
        };

        debug!("Gateway tools/call {}", qualified);

        let mut builder = self.http.post(&self.endpoint).json(&req);
        if let Some(token) = bearer_token.filter(|_| !self.is_signed()) {
            builder = builder.bearer_auth(token);
        }
        #[allow(unused_mut)]
        let mut request = builder.build()?;
        #[cfg(feature = "aws")]
        if let Some(signer) = &self.signer {
            signer.sign(&mut request).await?;
        }
        let resp = self.http.execute(request).await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("Gateway returned {} for {}", status.as_u16(), qualified);
            return Ok(failure(format!("Gateway error: {} - {}", status.as_u16(), body)));
        }

        let body = resp.text().await?;
        let rpc_resp: JsonRpcResponse = match serde_json::from_str(&body) {
            Ok(r) => r,
            Err(e) => {
                warn!("Gateway response parse error: {}", e);
                return Ok(json!({"success": true, "result": body}));
            }
        };

        if let Some(err) = rpc_resp.error {
            return Ok(failure(format!("Gateway error: {}", err.message)));
        }

        Ok(unwrap_result(rpc_resp.result.unwrap_or(Value::Null)))
    }
}

/// Pull the text payload out of an MCP `tools/call` result.
fn unwrap_result(result: Value) -> Value {
    let texts: Vec<&str> = result
        .get("content")
        .and_then(|c| c.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|c| c.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if texts.is_empty() {
        return result;
    }

    let raw = texts.join("\n");
    match serde_json::from_str::<Value>(&raw) {
        Ok(parsed) => parsed,
        Err(_) => json!({"success": true, "result": raw}),
    }
}

/// Strip the gateway target prefix from a tool name.
pub fn unqualify_tool_name(name: &str) -> &str {
    match name.find(TARGET_SEPARATOR) {
        Some(idx) => &name[idx + TARGET_SEPARATOR.len()..],
        None => name,
    }
}

/// Add the caller's identity as reserved arguments for the calendar target.
fn with_caller(input: &Value, caller: &CallerIdentity) -> Value {
    let mut args = match input {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    args.insert("user_id".to_string(), json!(caller.user_id));
    if let Some(token) = &caller.bearer_token {
        args.insert("user_token".to_string(), json!(token));
    }
    Value::Object(args)
}

#[async_trait]
impl ToolExecutor for GatewayClient {
    async fn execute(&self, call: &ToolCall, caller: &CallerIdentity) -> Result<Value, GatewayError> {
        self.call_tool(
            &call.name,
            with_caller(&call.input, caller),
            caller.bearer_token.as_deref(),
        )
        .await
    }
}
