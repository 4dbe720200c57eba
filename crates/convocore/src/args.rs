//! CLI flags for the `convocore` binary.
//!
//! Everything here overrides the environment-variable configuration
//! documented in `SPEC_FULL.md` §6; the env vars remain the primary
//! configuration surface (so the binary runs unattended under an MCP
//! client launcher), these flags exist for local debugging.

use std::path::PathBuf;

use clap::Parser;

/// Conversation-state manager for an AI coding assistant, exposed as an
/// MCP stdio server.
#[derive(Debug, Parser)]
#[command(name = "convocore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Conversation-state manager MCP server (stdio JSON-RPC)")]
pub struct Cli {
    /// Tracing verbosity, overriding `RUST_LOG` (`error`, `warn`, `info`, `debug`, `trace`).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to the skeleton cache manifest, overriding `CACHE_MANIFEST_PATH`.
    #[arg(long)]
    pub cache_manifest_path: Option<PathBuf>,

    /// Additional storage root to probe, on top of `STORAGE_ROOTS` and the
    /// platform defaults. May be repeated.
    #[arg(long = "storage-root")]
    pub storage_roots: Vec<String>,

    /// Run one foreground scheduler tick (rebuild + hierarchy + indexing
    /// sweep) and exit, instead of serving the stdio MCP transport. Useful
    /// for warming the cache ahead of a client connecting.
    #[arg(long)]
    pub tick_once: bool,
}
