use clap::{Args, Subcommand};
use fanfou_core::{CredentialSource, Credentials, FanfouError, TokenPair, resolve};
use serde_json::{Map, Value, json};
use tokio::io::{self, AsyncBufRead, AsyncWrite, BufReader};
use uuid::Uuid;

pub mod client;
pub mod framing;
pub mod image;
pub mod session;
pub mod signer;
pub mod tools;

pub use client::{DEFAULT_API_BASE, DEFAULT_OAUTH_BASE, Endpoints, FanfouApi};
pub use session::Session;
pub use tools::{ToolDefinition, ToolOutput, Toolbox, UnknownTool, is_known_tool, tool_definitions};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
const MCP_SERVER_NAME: &str = "fanfou-mcp";
const MCP_INSTRUCTIONS: &str = "饭否是一款基于 Web 的微博客服务，用户可以发布 140 字以内的消息，并可以关注其他用户。读取类工具可直接调用；收藏、关注、发布和删除需要先向用户展示预览并在确认后以 confirm=true 调用。";

/// Remote host overrides shared by every binary.
#[derive(Args, Clone, Debug)]
pub struct EndpointArgs {
    /// FanFou REST API base URL
    #[arg(long, global = true, env = "FANFOU_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,
    /// FanFou OAuth base URL (x_auth access token exchange)
    #[arg(long, global = true, env = "FANFOU_OAUTH_BASE", default_value = DEFAULT_OAUTH_BASE)]
    pub oauth_base: String,
}

impl EndpointArgs {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.api_base, &self.oauth_base)
    }
}

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the FanFou MCP server over stdio
    Serve,
}

pub async fn run(endpoints: Endpoints, source: &dyn CredentialSource, command: McpCommands) -> i32 {
    match command {
        McpCommands::Serve => match serve_stdio(endpoints, resolve(source)).await {
            Ok(()) => 0,
            Err(err) => {
                tracing::error!(event = "mcp_server_error", error = %err);
                1
            }
        },
    }
}

/// Serve JSON-RPC on stdin/stdout until EOF.
///
/// Accepts newline-delimited messages and `Content-Length` frames; each reply
/// uses the framing of its request. A batch gets one array reply.
/// One server, one session: a password login happens at most once per process.
pub async fn serve_stdio(
    endpoints: Endpoints,
    credentials: Result<Credentials, FanfouError>,
) -> Result<(), String> {
    let server = McpServer::new(
        Toolbox::new(endpoints, credentials),
        format!("stdio-{}", Uuid::now_v7()),
    );
    tracing::info!(
        event = "mcp_server_started",
        server = MCP_SERVER_NAME,
        version = env!("CARGO_PKG_VERSION"),
        session_id = %server.session_id,
    );

    serve(&server, BufReader::new(io::stdin()), io::stdout()).await
}

async fn serve<R, W>(server: &McpServer, mut reader: R, mut writer: W) -> Result<(), String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some((incoming, wire)) = framing::read_message(&mut reader)
        .await
        .map_err(|e| format!("Failed to read MCP message: {e}"))?
    {
        let is_batch = incoming.is_array();
        let mut responses = server.handle_incoming_message(incoming).await;
        let reply = match responses.len() {
            0 => continue,
            1 if !is_batch => responses.remove(0),
            _ => Value::Array(responses),
        };
        framing::write_message(&mut writer, &reply, wire)
            .await
            .map_err(|e| format!("Failed to write MCP response: {e}"))?;
    }
    Ok(())
}

/// Handle one HTTP-delivered JSON-RPC message (single or batch).
///
/// Builds a fresh server per call so no session outlives the request that
/// supplied its credentials.
pub async fn handle_http_jsonrpc(
    endpoints: Endpoints,
    source: &(dyn CredentialSource + Sync),
    incoming: Value,
) -> Vec<Value> {
    let server = McpServer::new(
        Toolbox::new(endpoints, resolve(source)),
        format!("http-{}", Uuid::now_v7()),
    );
    server.handle_incoming_message(incoming).await
}

struct McpServer {
    toolbox: Toolbox,
    session_id: String,
}

impl McpServer {
    fn new(toolbox: Toolbox, session_id: String) -> Self {
        Self {
            toolbox,
            session_id,
        }
    }

    /// Replies for one inbound value. Notifications and client responses
    /// produce none, so a batch of them yields an empty list.
    async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        match incoming {
            Value::Array(batch) if batch.is_empty() => vec![error_response(
                Value::Null,
                RpcError::invalid_request("Batch request must not be empty"),
            )],
            Value::Array(batch) => {
                let mut replies = Vec::with_capacity(batch.len());
                for message in batch {
                    replies.extend(self.handle_single_message(message).await);
                }
                replies
            }
            message => self.handle_single_message(message).await.into_iter().collect(),
        }
    }

    async fn handle_single_message(&self, message: Value) -> Option<Value> {
        let Value::Object(mut envelope) = message else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };
        let id = envelope.remove("id");

        if envelope.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Some(error_response(
                id.unwrap_or(Value::Null),
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        // Without a method this is a reply to us; we never send requests.
        let method = envelope.get("method").and_then(Value::as_str)?.to_string();
        let params = envelope.remove("params").unwrap_or(Value::Null);

        let Some(id) = id else {
            tracing::debug!(event = "mcp_notification", method = %method, session_id = %self.session_id);
            return None;
        };
        Some(match self.handle_request(&method, params).await {
            Ok(payload) => success_response(id, payload),
            Err(err) => error_response(id, err),
        })
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self) -> Value {
        json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                },
                "resources": {
                    "listChanged": false
                },
                "prompts": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            },
            "instructions": MCP_INSTRUCTIONS
        })
    }

    fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = tool_definitions()
            .iter()
            .map(ToolDefinition::to_value)
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let output = self
            .toolbox
            .call(name, &args)
            .await
            .map_err(|err| RpcError::invalid_params(err.to_string()))?;
        tracing::info!(
            event = "mcp_tool_call",
            tool = name,
            is_error = output.is_error,
            session_id = %self.session_id,
        );
        Ok(build_tool_call_response(output))
    }
}

fn build_tool_call_response(output: ToolOutput) -> Value {
    let text = to_pretty_json(&output.value);
    let mut response = json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": structured_content(output.value),
    });
    if output.is_error {
        response["isError"] = Value::Bool(true);
    }
    if let Some(pair) = output.minted {
        response["_meta"] = minted_token_meta(&pair);
    }
    response
}

/// `structuredContent` must be an object; list results are wrapped.
fn structured_content(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        other => json!({ "items": other }),
    }
}

fn minted_token_meta(pair: &TokenPair) -> Value {
    json!({
        "mintedOAuthToken": {
            "oauth_token": pair.token,
            "oauth_token_secret": pair.secret,
            "note": "Persist this pair as FANFOU_OAUTH_TOKEN / FANFOU_OAUTH_TOKEN_SECRET and drop the username/password."
        }
    })
}

#[derive(Debug)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }
}

fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanfou_core::{CredentialField, FieldNaming, StaticSource};

    fn server() -> McpServer {
        let source = StaticSource::new(FieldNaming::Env)
            .with(CredentialField::ApiKey, "ck")
            .with(CredentialField::ApiSecret, "cs")
            .with(CredentialField::OAuthToken, "tok")
            .with(CredentialField::OAuthTokenSecret, "ts");
        McpServer::new(
            Toolbox::new(
                Endpoints::new("http://127.0.0.1:9", "http://127.0.0.1:9"),
                resolve(&source),
            ),
            "test".to_string(),
        )
    }

    #[test]
    fn initialize_reports_server_identity() {
        let payload = server().initialize_payload();
        assert_eq!(payload["protocolVersion"], json!(MCP_PROTOCOL_VERSION));
        assert_eq!(payload["serverInfo"]["name"], json!("fanfou-mcp"));
        assert!(payload["capabilities"].get("tools").is_some());
    }

    #[test]
    fn tools_list_exposes_every_tool_with_schema() {
        let payload = server().tools_list_payload();
        let tools = payload["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 11);
        for tool in tools {
            assert_eq!(tool["inputSchema"]["type"], json!("object"));
            assert!(!tool["description"].as_str().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn batch_skips_notifications_and_rejects_empty() {
        let server = server();
        let responses = server
            .handle_incoming_message(json!([
                { "jsonrpc": "2.0", "id": 1, "method": "ping" },
                { "jsonrpc": "2.0", "method": "notifications/initialized" }
            ]))
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], json!(1));

        let empty = server.handle_incoming_message(json!([])).await;
        assert_eq!(empty[0]["error"]["code"], json!(-32600));
    }

    #[tokio::test]
    async fn unknown_method_and_tool_are_rpc_errors() {
        let server = server();
        let unknown_method = server
            .handle_incoming_message(json!({ "jsonrpc": "2.0", "id": 2, "method": "sampling/create" }))
            .await;
        assert_eq!(unknown_method[0]["error"]["code"], json!(-32601));

        let unknown_tool = server
            .handle_incoming_message(json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": { "name": "nope", "arguments": {} }
            }))
            .await;
        assert_eq!(unknown_tool[0]["error"]["code"], json!(-32602));
    }

    #[tokio::test]
    async fn unconfirmed_publish_returns_prompt_without_error_flag() {
        let responses = server()
            .handle_incoming_message(json!({
                "jsonrpc": "2.0", "id": 4, "method": "tools/call",
                "params": { "name": "publish_status", "arguments": { "status": "hello" } }
            }))
            .await;
        let result = &responses[0]["result"];
        assert!(result.get("isError").is_none());
        assert_eq!(result["structuredContent"]["需要确认"], json!(true));
        assert!(result["content"][0]["text"].as_str().unwrap().contains("需要确认"));
    }

    #[test]
    fn minted_pair_is_attached_as_meta() {
        let response = build_tool_call_response(ToolOutput {
            value: json!([]),
            is_error: false,
            minted: Some(TokenPair {
                token: "t1".into(),
                secret: "s1".into(),
            }),
        });
        assert_eq!(response["_meta"]["mintedOAuthToken"]["oauth_token"], json!("t1"));
        assert_eq!(response["structuredContent"]["items"], json!([]));
    }

    #[tokio::test]
    async fn stdio_loop_answers_newline_delimited_client() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"c","version":"1"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );
        let mut output = Vec::new();
        serve(&server(), BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let init: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(init["id"], json!(1));
        assert_eq!(init["result"]["protocolVersion"], json!(MCP_PROTOCOL_VERSION));
        let list: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(list["result"]["tools"].as_array().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn stdio_loop_replies_in_content_length_framing() {
        let body = r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#;
        let input = format!("Content-Length: {}\r\n\r\n{body}", body.len());
        let mut output = Vec::new();
        serve(&server(), BufReader::new(input.as_bytes()), &mut output)
            .await
            .unwrap();
        let text = String::from_utf8(output).unwrap();
        let (header, reply) = text.split_once("\r\n\r\n").unwrap();
        assert_eq!(header, format!("Content-Length: {}", reply.len()));
        let reply: Value = serde_json::from_str(reply).unwrap();
        assert_eq!(reply["id"], json!(9));
    }
}
