//! HTTP/SSE transport binary.
//!
//! Binds the same dispatcher as the stdio binary behind an SSE
//! endpoint at /sse.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rmcp::transport::sse_server::SseServer;

use gcal_mcp::auth;
use gcal_mcp::gcal::GoogleCalendar;
use gcal_mcp::CalendarServer;

#[derive(Parser)]
#[command(name = "gcal-mcp-sse", about = "Google Calendar MCP server over HTTP/SSE")]
struct Cli {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let session = match auth::authorize().await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error during Google Calendar authorization: {:#}", e);
            std::process::exit(1);
        }
    };

    let api = Arc::new(GoogleCalendar::new(session));
    let server = CalendarServer::new(api);

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", cli.host, cli.port))?;

    tracing::info!("SSE endpoint at http://{}/sse", addr);

    let ct = SseServer::serve(addr)
        .await
        .with_context(|| format!("Failed to bind SSE server to {}", addr))?
        .with_service(move || server.clone());

    tokio::signal::ctrl_c().await?;
    ct.cancel();

    Ok(())
}
