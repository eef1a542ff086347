//! Command-line and HTTP front ends for [`docqa_rag`].
//!
//! The `docqa` binary wires [`settings::Settings`] into a
//! [`docqa_rag::DocumentQa`] and exposes it through subcommands
//! (`ingest`, `query`, `chat`, `stats`, `clear`, `serve`).

pub mod commands;
pub mod render;
pub mod server;
pub mod settings;
