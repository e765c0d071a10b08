//! Stdio transport binary.
//!
//! Speaks MCP over stdin/stdout, so all diagnostics go to stderr.

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;

use gcal_mcp::auth;
use gcal_mcp::gcal::GoogleCalendar;
use gcal_mcp::CalendarServer;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let session = match auth::authorize().await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error during Google Calendar authorization: {:#}", e);
            std::process::exit(1);
        }
    };

    let api = Arc::new(GoogleCalendar::new(session));
    let server = CalendarServer::new(api);

    tracing::info!("starting Google Calendar MCP server on stdio");

    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
