//! Test: client -> gateway -> backend over Streamable HTTP

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::middleware::Next;
use mcpgate_core::{
    AuthKind, BackendRecord, BackendRepository, CallStatus, CorsOrigins, LogQuery,
    RequestLogRepository,
};
use mcpgate_gateway::{build_router, Gateway, GatewayDependencies};
use mcpgate_storage::{SqliteBackendRepository, SqliteRequestLogRepository};
use parking_lot::Mutex;
use rmcp::{
    model::*,
    service::{RequestContext, RunningService, ServiceError},
    transport::{
        streamable_http_server::{
            session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
        },
        StreamableHttpClientTransport,
    },
    ErrorData as McpError, RoleClient, RoleServer, ServerHandler, ServiceExt,
};
use tests::db::shared_in_memory;
use tests::fixtures::{tool, vault};
use tokio_util::sync::CancellationToken;

/// Backend exposing `add(a, b)`.
#[derive(Clone)]
struct CalcServer;

impl ServerHandler for CalcServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "calc".to_string(),
                version: "1.0.0".to_string(),
                ..Default::default()
            },
            instructions: None,
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(vec![tool("add")]))
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if params.name != "add" {
            return Err(McpError::invalid_params(
                format!("unknown tool: {}", params.name),
                None,
            ));
        }
        let args = params.arguments.unwrap_or_default();
        let operand = |key: &str| args.get(key).and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(CallToolResult::success(vec![Content::text(
            (operand("a") + operand("b")).to_string(),
        )]))
    }
}

/// Serve a router on a loopback port until the token is cancelled.
async fn serve(router: axum::Router, ct: CancellationToken) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { ct.cancelled().await })
            .await
            .unwrap();
    });

    // Give server a moment to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{}", addr.port())
}

/// Start the calc backend, recording the Authorization header it receives.
async fn start_backend(ct: CancellationToken) -> (String, Arc<Mutex<Option<String>>>) {
    let service = StreamableHttpService::new(
        || Ok(CalcServer),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig {
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(15)),
            sse_retry: Some(Duration::from_secs(3)),
            cancellation_token: ct.child_token(),
        },
    );

    let seen_auth = Arc::new(Mutex::new(None));
    let recorder = seen_auth.clone();
    let router = axum::Router::new()
        .nest_service("/mcp", service)
        .layer(axum::middleware::from_fn(move |req: Request, next: Next| {
            let recorder = recorder.clone();
            async move {
                if let Some(value) = req.headers().get("authorization") {
                    *recorder.lock() = value.to_str().ok().map(str::to_string);
                }
                next.run(req).await
            }
        }));

    let base = serve(router, ct).await;
    (format!("{}/mcp", base), seen_auth)
}

struct Fixture {
    base: String,
    client: RunningService<RoleClient, ClientInfo>,
    gateway: Arc<Gateway>,
    logs: Arc<SqliteRequestLogRepository>,
    seen_auth: Arc<Mutex<Option<String>>>,
    ct: CancellationToken,
}

impl Fixture {
    async fn start() -> Self {
        let ct = CancellationToken::new();
        let (backend_url, seen_auth) = start_backend(ct.clone()).await;

        let db = shared_in_memory();
        let backends = Arc::new(SqliteBackendRepository::new(db.clone()));
        let logs = Arc::new(SqliteRequestLogRepository::new(db));
        let vault = Arc::new(vault());
        let blob = vault.encrypt("calc-token").unwrap();
        backends
            .create(
                &BackendRecord::new("Calculator", "calc", backend_url)
                    .with_credential(AuthKind::Bearer, blob),
            )
            .await
            .unwrap();

        let gateway = Arc::new(Gateway::new(GatewayDependencies::new(
            backends,
            logs.clone(),
            vault,
        )));
        let report = gateway.reconcile().await.unwrap();
        assert_eq!(report.connected, 1, "gateway should reach the backend");

        let router = build_router(gateway.clone(), &CorsOrigins::Any, ct.child_token());
        let base = serve(router, ct.clone()).await;

        let transport = StreamableHttpClientTransport::from_uri(format!("{}/mcp", base));
        let client = ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "test-client".to_string(),
                version: "1.0.0".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
        .serve(transport)
        .await
        .expect("client should connect to gateway");

        Self {
            base,
            client,
            gateway,
            logs,
            seen_auth,
            ct,
        }
    }

    async fn call(&self, name: &str, args: serde_json::Value) -> Result<CallToolResult, ServiceError> {
        self.client
            .call_tool(CallToolRequestParams {
                name: name.to_string().into(),
                arguments: args.as_object().cloned(),
                task: None,
                meta: None,
            })
            .await
    }

    async fn stop(self) {
        self.client.cancel().await.ok();
        self.gateway.shutdown().await;
        self.ct.cancel();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tools_are_listed_with_alias_prefix() {
    let fx = Fixture::start().await;

    let tools = fx
        .client
        .list_tools(Default::default())
        .await
        .expect("list_tools should work");

    assert_eq!(tools.tools.len(), 1);
    assert_eq!(tools.tools[0].name, "calc__add");
    assert_eq!(tools.tools[0].description.as_deref(), Some("[calc] add tool"));

    fx.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tools_capability_without_list_changed() {
    let fx = Fixture::start().await;

    let info = fx.client.peer_info().expect("handshake should complete");
    let tools = info
        .capabilities
        .tools
        .as_ref()
        .expect("gateway should advertise tools");

    assert_eq!(tools.list_changed, None);
    assert_eq!(info.server_info.name, "mcpgate");

    fx.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_call_is_routed_with_credential_and_logged() {
    let fx = Fixture::start().await;

    let result = fx
        .call("calc__add", serde_json::json!({"a": 2, "b": 3}))
        .await
        .expect("call should succeed");

    let text = result.content[0].as_text().expect("text content");
    assert_eq!(text.text, "5");
    assert_eq!(fx.seen_auth.lock().as_deref(), Some("Bearer calc-token"));

    let page = fx.logs.query(&LogQuery::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].tool_name, "add");
    assert_eq!(page.rows[0].status, CallStatus::Success);

    fx.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_backend_error_passes_through() {
    let fx = Fixture::start().await;

    let err = fx
        .call("calc__missing", serde_json::json!({}))
        .await
        .expect_err("backend rejects unknown tool");

    match err {
        ServiceError::McpError(data) => {
            assert_eq!(data.code, ErrorCode::INVALID_PARAMS);
            assert!(data.message.contains("unknown tool: missing"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let page = fx
        .logs
        .query(&LogQuery::default().with_status(CallStatus::Error))
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    fx.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_alias_is_invalid_params() {
    let fx = Fixture::start().await;

    let err = fx
        .call("nope__add", serde_json::json!({}))
        .await
        .expect_err("no such alias");

    match err {
        ServiceError::McpError(data) => {
            assert_eq!(data.code, ErrorCode::INVALID_PARAMS);
            assert!(data.message.contains("nope__add"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    fx.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_routes() {
    let fx = Fixture::start().await;
    let http = reqwest::Client::new();

    let health: serde_json::Value = http
        .get(format!("{}/health", fx.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let report = fx.gateway.health_checker().run_checks().await;
    assert_eq!(report.up, 1);

    let backends: serde_json::Value = http
        .get(format!("{}/admin/health", fx.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = backends.as_array().expect("array of backends");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["alias"], "calc");
    assert_eq!(rows[0]["status"], "UP");
    assert_eq!(rows[0]["enabled"], true);
    assert!(rows[0]["last_checked_at"].is_string());

    fx.stop().await;
}
