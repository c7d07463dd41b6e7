//! Expose a clap command tree to MCP clients as tools.
//!
//! ```text
//! CommandTree ──walk──▶ SelectedNode ──schema──▶ ToolDefinition ──▶ ToolRegistry
//!                 ▲                                                    │
//!          SelectionRule                               call ──▶ Executor (fresh tree per call)
//! ```
//!
//! A host builds a [`tree::CommandTree`] (a factory for its `clap::Command`
//! plus one action per runnable path), picks rules, and either serves it with
//! [`mcp::serve_stdio`] or grafts [`cmd::mcp_command`] onto its own CLI.

pub mod cmd;
pub mod config;
pub mod desktop;
pub mod error;
pub mod execute;
pub mod mcp;
pub mod registry;
pub mod schema;
pub mod selection;
pub mod tree;
pub mod utils;
pub mod walker;

pub use error::BridgeError;
pub use mcp::{Bridge, BridgeServer};
pub use selection::{InheritedFlagRule, PathPredicate, SelectionRule};
pub use tree::CommandTree;
