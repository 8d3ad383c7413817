//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router that feeds every request to the pipeline
//! - Wire up middleware (tracing, body limits)
//! - Buffer request bodies and capture the peer address
//! - Bind server to listener and stop gracefully on shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::{ConnectInfo, Request as AxumRequest, State},
    http::StatusCode,
    response::IntoResponse,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::writer::WireResponse;
use crate::http::Request;
use crate::lifecycle::Shutdown;
use crate::pipeline::Pipeline;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Application state injected into the dispatch handler.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    max_content_size: usize,
}

/// HTTP front end for a pipeline.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(config: ServerConfig, pipeline: Pipeline) -> Self {
        Self::with_pipeline(config, Arc::new(pipeline))
    }

    /// Serve an already shared pipeline.
    pub fn with_pipeline(config: ServerConfig, pipeline: Arc<Pipeline>) -> Self {
        let state = AppState {
            pipeline,
            max_content_size: config.server.max_content_size,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestBodyLimitLayer::new(config.server.max_content_size)),
            )
    }

    /// The router, for serving elsewhere or driving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = &self.config.server.bind_address;
        TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires. In-flight requests are allowed to finish.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            name = %self.config.server.name,
            address = %addr,
            keep_alive = self.config.server.keep_alive,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Convert the transport request and run it through the pipeline.
async fn dispatch(State(state): State<AppState>, request: AxumRequest) -> WireResponse {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, state.max_content_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                method = %parts.method,
                path = %parts.uri.path(),
                limit = state.max_content_size,
                error = %e,
                "Rejecting request body"
            );
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request body exceeds {} bytes", state.max_content_size),
            )
                .into_response();
        }
    };

    let request = Request::from_parts(parts, body, remote_addr);
    state.pipeline.execute(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::routing::{HandlerResult, RouteSpec, RouteTable};
    use axum::body::Body;
    use axum::http::Method;
    use tower::ServiceExt;

    fn size(request: &mut Request, _: &mut Response) -> HandlerResult {
        Ok(Some(serde_json::json!({ "size": request.body().len() }).into()))
    }

    fn server(max_content_size: usize) -> HttpServer {
        let mut config = ServerConfig::default();
        config.server.max_content_size = max_content_size;
        let table = RouteTable::builder()
            .register(RouteSpec::new("/upload", Method::POST, size))
            .build()
            .unwrap();
        HttpServer::new(config, Pipeline::builder(table).build())
    }

    #[tokio::test]
    async fn test_body_is_buffered() {
        let response = server(1024)
            .router()
            .oneshot(
                axum::http::Request::post("/upload")
                    .body(Body::from("twelve bytes"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"size":12}"#);
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let response = server(4)
            .router()
            .oneshot(
                axum::http::Request::post("/upload")
                    .body(Body::from("far too large"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
