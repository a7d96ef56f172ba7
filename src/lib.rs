//! Workspace search driven by ripgrep
//!
//! [`SearchServer`] runs `rg --json` for each search request, groups the
//! streamed matches into one [`SearchResult`] per file and reports them to a
//! [`SearchClient`]. The `jsonrpc` module exposes the same server over stdio.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod search;
pub mod types;

pub use client::{ChannelClient, ClientEvent, SearchClient};
pub use config::SearchConfig;
pub use error::{RpcError, SessionError};
pub use search::{ActiveSearch, SearchServer};
pub use types::{LinePreview, LineText, Match, SearchId, SearchOptions, SearchResult};
