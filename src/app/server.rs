//! Newline-delimited JSON-RPC 2.0 over stdio, speaking the subset of MCP that tool clients
//! use: `initialize`, `ping`, `tools/list` and `tools/call`.

use std::io::{BufRead, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::adb::executor::AdbExecutor;
use crate::app::commands::{dispatch, ToolContext};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::models::ToolOutput;
use crate::app::state::DeviceSession;
use crate::app::tools::{tool_catalog, ToolCall, ToolCallError};

pub const SERVER_NAME: &str = "android-emulator";
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const INVALID_REQUEST: i32 = -32600;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Holds the selected device for the lifetime of the connection.
pub struct McpServer<'a> {
    adb: &'a dyn AdbExecutor,
    config: &'a AppConfig,
    session: DeviceSession,
}

impl<'a> McpServer<'a> {
    pub fn new(adb: &'a dyn AdbExecutor, config: &'a AppConfig, session: DeviceSession) -> Self {
        Self {
            adb,
            config,
            session,
        }
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    /// Reads requests until EOF. A bad line gets an error reply; it never ends the loop.
    pub fn serve<R: BufRead, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<(), AppError> {
        info!(server = SERVER_NAME, "serving on stdio");
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            let read = reader.read_until(b'\n', &mut buffer).map_err(|err| {
                error!(error = %err, "failed to read request");
                AppError::system(
                    format!("Failed to read request: {err}"),
                    Uuid::new_v4().to_string(),
                )
            })?;
            if read == 0 {
                break;
            }
            // Invalid UTF-8 decodes lossily and then fails JSON parsing with -32700.
            let line = String::from_utf8_lossy(&buffer);
            if line.trim().is_empty() {
                continue;
            }
            let Some(response) = self.handle_line(&line) else {
                continue;
            };
            writeln!(writer, "{response}")
                .and_then(|_| writer.flush())
                .map_err(|err| {
                    AppError::system(
                        format!("Failed to write response: {err}"),
                        Uuid::new_v4().to_string(),
                    )
                })?;
        }
        info!("stdin closed, shutting down");
        Ok(())
    }

    /// One serialized response line, or `None` for notifications.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let response = self.handle_message(line)?;
        match serde_json::to_string(&response) {
            Ok(serialized) => Some(serialized),
            Err(err) => {
                error!(error = %err, "failed to serialize response");
                None
            }
        }
    }

    pub fn handle_message(&mut self, line: &str) -> Option<Value> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "malformed request");
                return to_value(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {err}"),
                ));
            }
        };

        let Some(id) = request.id else {
            debug!(method = ?request.method, "notification");
            return None;
        };
        let Some(method) = request.method else {
            return to_value(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                "Invalid request: missing method",
            ));
        };

        let response = match method.as_str() {
            "initialize" => JsonRpcResponse::success(id, initialize_result(request.params.as_ref())),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tool_catalog() })),
            "tools/call" => match request.params {
                Some(params) => self.call_tool(id, params),
                None => JsonRpcResponse::failure(id, INVALID_PARAMS, "Missing params"),
            },
            other if other.starts_with("notifications/") => return None,
            other => {
                JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}"))
            }
        };
        to_value(response)
    }

    fn call_tool(&mut self, id: Value, params: Value) -> JsonRpcResponse {
        let params: CallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(err) => {
                return JsonRpcResponse::failure(id, INVALID_PARAMS, format!("Invalid params: {err}"))
            }
        };
        let output = match ToolCall::parse(&params.name, params.arguments) {
            Ok(call) => self.run_tool(call),
            Err(err @ ToolCallError::Unknown(_)) => ToolOutput::error(err.to_string()),
            Err(err @ ToolCallError::InvalidArguments { .. }) => {
                return JsonRpcResponse::failure(id, INVALID_PARAMS, err.to_string());
            }
        };
        match serde_json::to_value(&output) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                JsonRpcResponse::failure(id, INVALID_PARAMS, format!("Failed to encode result: {err}"))
            }
        }
    }

    fn run_tool(&mut self, call: ToolCall) -> ToolOutput {
        let trace_id = Uuid::new_v4().to_string();
        let tool = call.name();
        let mut ctx = ToolContext::new(self.adb, self.config, &mut self.session, trace_id.as_str());
        match catch_unwind(AssertUnwindSafe(|| dispatch(call, &mut ctx))) {
            Ok(output) => output,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(trace_id = %trace_id, tool, panic = %message, "tool handler panicked");
                ToolOutput::error(format!("Error: {message}"))
            }
        }
    }
}

fn initialize_result(params: Option<&Value>) -> Value {
    let protocol_version = params
        .and_then(|params| params.get("protocolVersion"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn to_value(response: JsonRpcResponse) -> Option<Value> {
    serde_json::to_value(response)
        .map_err(|err| error!(error = %err, "failed to encode response"))
        .ok()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
