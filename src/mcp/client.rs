//! MCP client for Streamable HTTP servers
//!
//! Every public operation opens its own session (`initialize` +
//! `notifications/initialized`), issues one request, and closes the session
//! again with `DELETE`. No connection state survives between calls.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::protocol::{
    McpNotification, McpRequest, McpResponse, McpTool, McpToolList, McpToolResult,
    PROTOCOL_VERSION,
};
use crate::config::McpConfig;
use crate::error::{Error, Result};

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_HEADER: &str = "mcp-protocol-version";
const EVENT_STREAM: &str = "text/event-stream";

/// Upper bound on tools/list pages followed in one session
const MAX_LIST_PAGES: usize = 32;

/// An open MCP session
struct Session {
    /// Server-assigned id; stateless servers don't send one
    id: Option<String>,
}

/// MCP client for communicating with a Streamable HTTP MCP server
pub struct McpClient {
    /// HTTP client
    http: Client,
    /// Server endpoint, e.g. `http://localhost:8000/mcp`
    endpoint: String,
    /// Request ID counter
    next_id: AtomicU64,
}

impl McpClient {
    /// Create a client for the configured endpoint
    pub fn new(config: &McpConfig) -> Result<Self> {
        url::Url::parse(&config.url)
            .map_err(|e| Error::Config(format!("Invalid MCP endpoint '{}': {}", config.url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(McpClient {
            http,
            endpoint: config.url.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Get the server endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// POST one JSON-RPC message
    async fn post<T: Serialize>(&self, session: Option<&Session>, body: &T) -> Result<Response> {
        let mut request = self.http.post(&self.endpoint).json(body);
        if let Some(id) = session.and_then(|s| s.id.as_deref()) {
            request = request
                .header(SESSION_HEADER, id)
                .header(PROTOCOL_HEADER, PROTOCOL_VERSION);
        }

        let response = request.send().await.map_err(|e| {
            Error::ToolProviderUnavailable(format!("Failed to reach MCP server {}: {}", self.endpoint, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ToolProviderUnavailable(format!(
                "MCP server {} returned {}: {}",
                self.endpoint,
                status,
                body.trim()
            )));
        }

        Ok(response)
    }

    /// Send a request and read the matching reply, as JSON or from an SSE stream
    async fn send_request(
        &self,
        session: Option<&Session>,
        request: McpRequest,
    ) -> Result<(McpResponse, Option<String>)> {
        debug!("MCP request -> {}: {} (id {})", self.endpoint, request.method, request.id);

        let response = self.post(session, &request).await?;
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with(EVENT_STREAM));

        let reply = if is_stream {
            Self::read_event_stream(response, request.id).await?
        } else {
            let reply: McpResponse = response
                .json()
                .await
                .map_err(|e| Error::Protocol(format!("Failed to parse MCP response: {}", e)))?;
            if !reply.answers(request.id) {
                return Err(Error::Protocol(format!(
                    "MCP response does not answer request {}",
                    request.id
                )));
            }
            reply
        };

        debug!("MCP response <- {}: id {}", self.endpoint, request.id);
        Ok((reply, session_id))
    }

    /// Read SSE events until the reply to `id` arrives
    async fn read_event_stream(response: Response, id: u64) -> Result<McpResponse> {
        let mut events = response.bytes_stream().eventsource();

        while let Some(event) = events.next().await {
            let event = event
                .map_err(|e| Error::ToolProviderUnavailable(format!("MCP event stream failed: {}", e)))?;
            if event.data.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<McpResponse>(&event.data) {
                Ok(message) if message.answers(id) => return Ok(message),
                Ok(_) => debug!("Skipping unrelated MCP message: {}", event.data),
                Err(e) => debug!("Skipping non JSON-RPC event ({}): {}", e, event.data),
            }
        }

        Err(Error::Protocol(format!(
            "MCP event stream ended before the reply to request {}",
            id
        )))
    }

    /// Open a session: initialize, then acknowledge with `notifications/initialized`
    async fn open_session(&self) -> Result<Session> {
        let (reply, session_id) = self
            .send_request(None, McpRequest::initialize(self.next_id()))
            .await?;

        if let Some(err) = reply.error {
            return Err(Error::ToolProviderUnavailable(format!(
                "MCP initialize rejected: {} (code {})",
                err.message, err.code
            )));
        }

        let session = Session { id: session_id };
        self.post(Some(&session), &McpNotification::initialized()).await?;

        debug!(
            "MCP session opened on {} (session id: {})",
            self.endpoint,
            session.id.as_deref().unwrap_or("none")
        );
        Ok(session)
    }

    /// Terminate a session. Failures are logged, never returned.
    async fn close_session(&self, session: Session) {
        let Some(id) = session.id else {
            return;
        };

        match self
            .http
            .delete(&self.endpoint)
            .header(SESSION_HEADER, &id)
            .send()
            .await
        {
            Ok(response)
                if response.status().is_success()
                    || response.status() == StatusCode::METHOD_NOT_ALLOWED => {}
            Ok(response) => debug!("MCP session {} close returned {}", id, response.status()),
            Err(e) => debug!("MCP session {} close failed: {}", id, e),
        }
    }

    /// List available tools from the MCP server, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let session = self.open_session().await?;
        let tools = self.list_tools_in(&session).await;
        self.close_session(session).await;

        let tools = tools?;
        debug!("MCP server {} has {} tools", self.endpoint, tools.len());
        Ok(tools)
    }

    async fn list_tools_in(&self, session: &Session) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let request = McpRequest::list_tools(self.next_id(), cursor.as_deref());
            let (reply, _) = self.send_request(Some(session), request).await?;

            if let Some(err) = reply.error {
                return Err(Error::Protocol(format!(
                    "tools/list failed: {} (code {})",
                    err.message, err.code
                )));
            }

            let page: McpToolList = serde_json::from_value(reply.result.unwrap_or(Value::Null))
                .map_err(|e| Error::Protocol(format!("Failed to parse tools/list result: {}", e)))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        warn!(
            "MCP server {} kept paginating tools/list, stopping after {} pages",
            self.endpoint, MAX_LIST_PAGES
        );
        Ok(tools)
    }

    /// Call a tool on the MCP server.
    ///
    /// A JSON-RPC error from the server (unknown tool, invalid arguments) is
    /// returned as an `isError` result; only transport and protocol failures
    /// are `Err`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult> {
        let session = self.open_session().await?;
        let reply = self
            .send_request(Some(&session), McpRequest::call_tool(self.next_id(), name, arguments))
            .await;
        self.close_session(session).await;

        let (reply, _) = reply?;

        if let Some(ref err) = reply.error {
            warn!("MCP tool {} rejected: {} (code {})", name, err.message, err.code);
            return Ok(McpToolResult::from_rpc_error(err));
        }

        let tool_result: McpToolResult = serde_json::from_value(reply.result.unwrap_or(Value::Null))
            .map_err(|e| Error::Protocol(format!("Failed to parse MCP tool result: {}", e)))?;

        if tool_result.is_error {
            warn!("MCP tool {} returned error", name);
        }

        Ok(tool_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, header_exists, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: String) -> McpConfig {
        McpConfig {
            url,
            timeout_secs: 5,
        }
    }

    async fn mount_handshake(server: &MockServer) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("mcp-session-id", "sess-1")
                    .set_body_json(json!({
                        "jsonrpc": "2.0",
                        "id": 1,
                        "result": {
                            "protocolVersion": PROTOCOL_VERSION,
                            "capabilities": {"tools": {}},
                            "serverInfo": {"name": "gene-programs", "version": "1.0"}
                        }
                    })),
            )
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "notifications/initialized"})))
            .and(header("mcp-session-id", "sess-1"))
            .respond_with(ResponseTemplate::new(202))
            .mount(server)
            .await;

        Mock::given(method("DELETE"))
            .and(header("mcp-session-id", "sess-1"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        assert!(McpClient::new(&config("not a url".to_string())).is_err());
    }

    #[tokio::test]
    async fn test_list_tools_over_json() {
        let server = MockServer::start().await;
        mount_handshake(&server).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .and(header("mcp-session-id", "sess-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {"tools": [
                    {"name": "get_dataset_id_by_name", "description": "Map a filename to its id",
                     "inputSchema": {"type": "object", "properties": {"filename": {"type": "string"}}, "required": ["filename"]}},
                    {"name": "jaccard_topk"}
                ]}
            })))
            .mount(&server)
            .await;

        let client = McpClient::new(&config(format!("{}/mcp", server.uri()))).unwrap();
        let tools = client.list_tools().await.unwrap();

        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "get_dataset_id_by_name");
        assert_eq!(tools[1].name, "jaccard_topk");
        assert!(tools[1].input_schema.is_none());
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor_without_session() {
        let server = MockServer::start().await;

        // Stateless server: no session id on initialize
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "initialize"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"protocolVersion": PROTOCOL_VERSION, "capabilities": {"tools": {}}}
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "notifications/initialized"})))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/list", "params": {"cursor": "page-2"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 3,
                "result": {"tools": [{"name": "program_top_genes"}]}
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "result": {"tools": [{"name": "jaccard_topk"}], "nextCursor": "page-2"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Nothing may carry a session header, and there is no session to delete
        Mock::given(header_exists("mcp-session-id"))
            .respond_with(ResponseTemplate::new(400))
            .with_priority(1)
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = McpClient::new(&config(format!("{}/mcp", server.uri()))).unwrap();
        let tools = client.list_tools().await.unwrap();

        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["jaccard_topk", "program_top_genes"]);
    }

    #[tokio::test]
    async fn test_call_tool_over_event_stream() {
        let server = MockServer::start().await;
        mount_handshake(&server).await;

        let sse_body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/message\",\"params\":{\"level\":\"info\",\"data\":\"loading\"}}\n\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"{\\\"dataset_id\\\":\\\"ds_1\\\"}\"}],\"isError\":false}}\n\n",
        );

        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "tools/call",
                "params": {"name": "get_dataset_id_by_name", "arguments": {"filename": "x.h5ad"}}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = McpClient::new(&config(format!("{}/mcp", server.uri()))).unwrap();
        let result = client
            .call_tool("get_dataset_id_by_name", json!({"filename": "x.h5ad"}))
            .await
            .unwrap();

        assert!(!result.is_error);
        assert_eq!(result.content[0].text.as_deref(), Some("{\"dataset_id\":\"ds_1\"}"));
    }

    #[tokio::test]
    async fn test_rpc_error_becomes_error_result() {
        let server = MockServer::start().await;
        mount_handshake(&server).await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "tools/call"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 2,
                "error": {"code": -32602, "message": "Unknown tool: nope"}
            })))
            .mount(&server)
            .await;

        let client = McpClient::new(&config(format!("{}/mcp", server.uri()))).unwrap();
        let result = client.call_tool("nope", json!({})).await.unwrap();

        assert!(result.is_error);
        assert_eq!(result.content[0].text.as_deref(), Some("MCP error -32602: Unknown tool: nope"));
        assert_eq!(result.extra["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Nothing listens on port 9 (discard) in the test environment
        let client = McpClient::new(&config("http://127.0.0.1:9/mcp".to_string())).unwrap();
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, Error::ToolProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn test_http_error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("starting up"))
            .mount(&server)
            .await;

        let client = McpClient::new(&config(format!("{}/mcp", server.uri()))).unwrap();
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, Error::ToolProviderUnavailable(_)));
    }
}
