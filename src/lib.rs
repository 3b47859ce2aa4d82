//! PTY session engine exposed to AI agents over MCP.
//!
//! `session` is the core: a single PTY-attached process plus the
//! sentinel-based command-completion protocol. `registry` indexes sessions
//! and reaps idle or dead ones. `server` wires both up as MCP tools.

pub mod buffer;
pub mod config;
pub mod error;
pub mod escapes;
pub mod registry;
pub mod sanitizer;
pub mod sentinel;
pub mod server;
pub mod session;
