//! MCP Protocol Layer
//!
//! JSON-RPC 2.0 types, message shapes, and the stdio transport.

pub mod messages;
pub mod stdio;
pub mod types;
