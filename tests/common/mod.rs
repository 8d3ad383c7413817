//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request as HttpRequest, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use rest_dispatch::config::ServerConfig;
use rest_dispatch::echo;
use rest_dispatch::http::HttpServer;
use rest_dispatch::lifecycle::Shutdown;
use rest_dispatch::pipeline::{Pipeline, PipelineBuilder};
use rest_dispatch::routing::RouteTable;

/// Configuration bound to an ephemeral local port.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config
}

/// A pipeline builder serving the echo resource.
pub fn echo_pipeline(config: &ServerConfig) -> PipelineBuilder {
    let table = RouteTable::builder()
        .register_all(echo::routes())
        .build()
        .expect("echo routes are valid");
    Pipeline::builder(table).configure(config)
}

/// Router for in-process requests.
pub fn echo_router() -> Router {
    let config = test_config();
    let pipeline = echo_pipeline(&config).build();
    HttpServer::new(config, pipeline).router()
}

/// What came back from a request.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("body is JSON")
    }
}

/// Drive one request through a router without a socket.
pub async fn send(router: &Router, request: HttpRequest<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body readable");
    Reply {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

/// Shorthand for a bodiless GET.
pub async fn get(router: &Router, uri: &str) -> Reply {
    send(router, HttpRequest::get(uri).body(Body::empty()).unwrap()).await
}

/// A server running on a real socket.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server stops in time")
            .expect("server task did not panic");
    }
}

/// Start a server for `pipeline` on an ephemeral port.
pub async fn start_server(config: ServerConfig, pipeline: Pipeline) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config, pipeline);
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });

    RunningServer {
        addr,
        shutdown,
        handle,
    }
}
