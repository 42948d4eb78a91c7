//! # pgbridge - MCP tool server for PostgreSQL
//!
//! Exposes a fixed set of database tools to language-model clients over the
//! Model Context Protocol:
//! - Tool catalog with typed parameters and JSON Schema discovery
//! - Dispatcher that validates arguments and never lets a failure escape
//! - Read-only query policy enforced before any database round trip
//! - Per-call PostgreSQL connections with transactional writes
//! - Newline-delimited JSON-RPC transport on stdio
//!
//! ## Architecture
//!
//! ```text
//!   stdin  → ┌───────────┐   ┌────────────┐   ┌──────────┐   ┌────────────┐
//!            │ mcp::     │ → │ tools::    │ → │ db::ops  │ → │ db::       │
//!   stdout ← │ McpServer │   │ Dispatcher │   │ (policy) │   │ PgDatabase │
//!            └───────────┘   └────────────┘   └──────────┘   └────────────┘
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod db;
pub mod mcp;
pub mod tools;
pub mod types;

// Internal utilities
pub mod observability;
pub mod validation;

pub use types::{Config, Error, Result};
