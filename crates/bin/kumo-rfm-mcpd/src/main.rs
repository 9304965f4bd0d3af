//! Daemon entry point for the KumoRFM MCP server.
//!
//! Loads configuration from CLI arguments and the environment, builds the
//! session manager, and serves the MCP protocol over stdio and/or streamable HTTP.

mod config;
mod sessions;

use rfm_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, RfmConfig};
use crate::sessions::build_session_manager;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = RfmConfig::from_args()?;
    init_logging(config.log_format);
    info!(api_url = %config.api_url, "starting kumo-rfm-mcpd");

    let sessions = build_session_manager(&config)?;

    let http = config.http_serve.then(|| {
        let sessions = sessions.clone();
        let http_config = McpHttpServerConfig::new(config.http_addr)
            .with_stateful_mode(config.http_stateful);
        tokio::spawn(async move { serve_streamable_http(sessions, http_config).await })
    });

    if config.enable_stdio {
        serve_stdio(sessions).await?;
    }
    if let Some(http) = http
        && let Err(err) = http.await?
    {
        error!(error = %err, "streamable HTTP server stopped");
        return Err(err);
    }
    Ok(())
}
