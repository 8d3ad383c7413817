//! rest-dispatch server binary.
//!
//! Serves the demo echo resource at `/test` (JSON by default, `/test.xml`
//! or `Accept: application/xml` for XML) until SIGINT or SIGTERM.

use std::path::PathBuf;

use clap::Parser;

use rest_dispatch::config::{load_config, validate_config, ConfigError, ServerConfig};
use rest_dispatch::echo;
use rest_dispatch::error::Failure;
use rest_dispatch::http::HttpServer;
use rest_dispatch::lifecycle::{spawn_signal_handler, Shutdown};
use rest_dispatch::observability::{init_logging, metrics, LoggingObserver};
use rest_dispatch::pipeline::Pipeline;
use rest_dispatch::routing::{RouteDefaults, RouteTable};

#[derive(Parser, Debug)]
#[command(name = "rest-dispatch", version, about = "REST request dispatch server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address (e.g. 127.0.0.1:8080).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Failure> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    init_logging(&config.observability)?;
    metrics::set_enabled(config.observability.metrics_enabled);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        bind_address = %config.server.bind_address,
        worker_threads = config.executor.worker_threads,
        handler_timeout_ms = config.executor.handler_timeout_ms,
        default_format = %config.serialization.default_format,
        "Configuration loaded"
    );

    let defaults = RouteDefaults {
        base_url: Some(config.server.base_url.clone()),
        ..RouteDefaults::default()
    };
    let table = RouteTable::builder()
        .defaults(defaults)
        .register_all(echo::routes())
        .build()?;
    tracing::info!(routes = table.len(), "Routes registered");

    let pipeline = Pipeline::builder(table)
        .configure(&config)
        .observer(LoggingObserver)
        .build();

    let server = HttpServer::new(config, pipeline);
    let listener = server.bind().await?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
