//! gcal-mcp - Google Calendar MCP server.
//!
//! Exposes a fixed set of calendar tools (list/create/update/delete
//! events, free/busy queries, calendar listing, timezone/date lookup)
//! over the Model Context Protocol. Two transports are provided, a
//! stdio binary and an HTTP/SSE binary; both bind the same dispatcher.

pub mod auth;
pub mod config;
pub mod conflicts;
pub mod datetime;
pub mod gcal;
pub mod schemas;
pub mod server;
pub mod timezone;

pub use server::CalendarServer;
