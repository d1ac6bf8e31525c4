//! JSON-RPC transport to an engine host over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{OnceCell, mpsc};
use tracing::{debug, error, info, instrument, warn};

use super::{EngineCommand, EngineEvent, EngineGateway, EventStream};
use crate::error::GatewayError;

/// Header carrying the MCP session negotiated by `initialize`.
const SESSION_HEADER: &str = "mcp-session-id";

/// Gateway that posts `tools/call` requests to `{base_url}/message` and
/// reads push events from the `{base_url}/events` server-sent-event stream.
///
/// The first call performs the MCP `initialize` handshake. Hosts that hand
/// back an `mcp-session-id` get it on every later request; hosts that do not
/// are treated as plain JSON-RPC.
#[derive(Debug)]
pub struct RpcGateway {
    base_url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
    session: OnceCell<Option<String>>,
}

impl RpcGateway {
    /// Creates a gateway for the engine host at `base_url`.
    #[instrument(skip(base_url), fields(base_url = %base_url.as_ref()))]
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::unavailable(format!("Failed to build HTTP client: {}", e)))?;
        info!("Creating RPC gateway");
        Ok(Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            client,
            next_id: AtomicU64::new(1),
            session: OnceCell::new(),
        })
    }

    /// Base URL of the engine host.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// MCP session id, negotiated once on first use.
    ///
    /// A failed handshake is not cached, so the next call tries again.
    async fn session_id(&self) -> Result<Option<&str>, GatewayError> {
        let session = self.session.get_or_try_init(|| self.initialize()).await?;
        Ok(session.as_deref())
    }

    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<Option<String>, GatewayError> {
        let url = format!("{}/message", self.base_url);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "gomoku", "version": env!("CARGO_PKG_VERSION")}
            }
        });
        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let Some(session_id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
        else {
            info!(status = %response.status(), "No MCP session offered; using plain JSON-RPC");
            return Ok(None);
        };
        debug!(mcp_session_id = %session_id, "Extracted MCP session ID from header");

        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        if let Err(e) = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header(SESSION_HEADER, &session_id)
            .json(&notification)
            .send()
            .await
        {
            warn!(error = %e, "Failed to send initialized notification");
        }

        info!(mcp_session_id = %session_id, "MCP session initialized");
        Ok(Some(session_id))
    }

    fn transport_error(err: reqwest::Error) -> GatewayError {
        if err.is_connect() {
            GatewayError::unavailable(format!("Engine host unreachable: {}", err))
        } else if err.is_timeout() {
            GatewayError::rejected("Engine call timed out")
        } else {
            GatewayError::rejected(format!("HTTP request failed: {}", err))
        }
    }
}

#[async_trait::async_trait]
impl EngineGateway for RpcGateway {
    #[instrument(skip(self, args), fields(command = %command))]
    async fn call(&self, command: EngineCommand, args: Value) -> Result<Value, GatewayError> {
        let session_id = self.session_id().await?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {
                "name": command.as_ref(),
                "arguments": args
            }
        });
        debug!(id, "Sending engine call");

        let mut builder = self
            .client
            .post(format!("{}/message", self.base_url))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream");
        if let Some(session_id) = session_id {
            builder = builder.header(SESSION_HEADER, session_id);
        }
        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(Self::transport_error)?;
        debug!(status = %status, bytes = text.len(), "Engine call answered");

        if !status.is_success() && !text.contains("\"jsonrpc\"") {
            warn!(status = %status, "Engine host returned HTTP error");
            return Err(GatewayError::rejected(format!("HTTP {}: {}", status, text)));
        }

        decode_rpc_body(&text)
    }

    #[instrument(skip(self))]
    async fn subscribe(&self) -> Result<EventStream, GatewayError> {
        let mut builder = self
            .client
            .get(format!("{}/events", self.base_url))
            .header("Accept", "text/event-stream")
            .timeout(Duration::from_secs(60 * 60 * 24));
        if let Some(session_id) = self.session_id().await? {
            builder = builder.header(SESSION_HEADER, session_id);
        }
        let mut response = builder
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(GatewayError::rejected(format!(
                "Event stream refused: HTTP {}",
                response.status()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut decoder = SseDecoder::default();
            loop {
                let chunk = match response.chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => {
                        debug!("Event stream closed by engine host");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Event stream failed");
                        break;
                    }
                };
                for (channel, data) in decoder.push(&chunk) {
                    let payload = match serde_json::from_str(&data) {
                        Ok(payload) => payload,
                        Err(_) => Value::String(data),
                    };
                    match EngineEvent::decode(&channel, payload) {
                        Ok(Some(event)) => {
                            if tx.send(event).is_err() {
                                debug!("Event subscriber dropped; closing stream");
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => error!(channel = %channel, error = %e, "Undecodable engine event"),
                    }
                }
            }
        });

        info!("Subscribed to engine events");
        Ok(rx)
    }
}

/// Extracts the tool result from a JSON or SSE-framed JSON-RPC response.
fn decode_rpc_body(text: &str) -> Result<Value, GatewayError> {
    let json_str = if text.trim_start().starts_with('{') {
        text.trim()
    } else {
        text.lines()
            .filter(|line| line.starts_with("data: {"))
            .last()
            .and_then(|line| line.strip_prefix("data: "))
            .ok_or_else(|| GatewayError::protocol("No data in SSE response"))?
    };

    let json: Value = serde_json::from_str(json_str)?;

    if let Some(err) = json.get("error") {
        let message = err["message"].as_str().unwrap_or("Unknown error");
        return Err(GatewayError::rejected(message));
    }

    let result = json
        .get("result")
        .cloned()
        .ok_or_else(|| GatewayError::protocol("Missing result in response"))?;

    if result["isError"].as_bool() == Some(true) {
        let message = result["content"][0]["text"]
            .as_str()
            .unwrap_or("Engine reported an error");
        return Err(GatewayError::rejected(message));
    }

    if let Some(structured) = result.get("structuredContent") {
        return Ok(structured.clone());
    }

    if let Some(text) = result["content"][0]["text"].as_str() {
        return Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())));
    }

    Ok(result)
}

/// Incremental decoder for `event:` / `data:` framed server-sent events.
///
/// Buffers raw bytes so a UTF-8 sequence split across chunks survives;
/// only complete lines are decoded.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds one chunk, returning every `(channel, data)` pair it completes.
    fn push(&mut self, chunk: &[u8]) -> Vec<(String, String)> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                if !self.data.is_empty() {
                    let channel = self.event.take().unwrap_or_else(|| "message".to_string());
                    out.push((channel, self.data.join("\n")));
                    self.data.clear();
                }
                self.event = None;
            } else if let Some(name) = line.strip_prefix("event:") {
                self.event = Some(name.trim().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data.push(data.trim_start().to_string());
            }
        }
        out
    }
}
