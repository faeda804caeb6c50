use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::captions::CaptionExtractor;

pub mod protocol;
pub mod tools;

use protocol::{
    JsonRpcRequest, JsonRpcResponse, DEFAULT_PROTOCOL_VERSION, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
};
use tools::{ExtractCaptionsArgs, EXTRACT_CAPTIONS_TOOL};

/// MCP server exposing the caption operation as a tool
pub struct McpServer {
    extractor: CaptionExtractor,
    name: String,
}

impl McpServer {
    pub fn new(extractor: CaptionExtractor, name: impl Into<String>) -> Self {
        Self {
            extractor,
            name: name.into(),
        }
    }

    /// Serve newline-delimited JSON-RPC on stdin/stdout until stdin closes
    pub async fn run_stdio(&self) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.run(stdin, stdout).await
    }

    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MCP server '{}' listening on stdio", self.name);

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.context("Failed to read request")? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(&line).await {
                let mut payload = serde_json::to_string(&response)
                    .context("Failed to serialize response")?;
                payload.push('\n');

                writer
                    .write_all(payload.as_bytes())
                    .await
                    .context("Failed to write response")?;
                writer.flush().await.context("Failed to flush response")?;
            }
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle one raw message. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                tracing::warn!("Unparsable message: {}", e);
                Some(JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e)))
            }
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!("Received {}", request.method);

        if request.is_notification() {
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(id, INVALID_REQUEST, "Invalid Request: jsonrpc must be \"2.0\""));
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize_result(&request.params)),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tools::get_tools() })),
            "tools/call" => self.call_tool(id, &request.params).await,
            other => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        };

        Some(response)
    }

    fn initialize_result(&self, params: &Value) -> Value {
        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);

        json!({
            "protocolVersion": protocol_version,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": self.name,
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    async fn call_tool(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        if name != EXTRACT_CAPTIONS_TOOL {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {}", name));
        }

        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
        let args: ExtractCaptionsArgs = match serde_json::from_value(arguments) {
            Ok(args) => args,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid arguments: {}", e));
            }
        };

        let result = self
            .extractor
            .extract(&args.youtube_url, args.language_preference.as_deref())
            .await;

        let structured = match serde_json::to_value(&result) {
            Ok(value) => value,
            Err(e) => {
                return JsonRpcResponse::error(id, INTERNAL_ERROR, format!("Failed to encode result: {}", e));
            }
        };

        JsonRpcResponse::success(
            id,
            json!({
                "content": [{ "type": "text", "text": structured.to_string() }],
                "structuredContent": structured,
                "isError": result.is_error(),
            }),
        )
    }
}
