//! ripgrep backed search sessions
//!
//! A search flows through these stages:
//! - `paths` and `args` turn the request into an `rg --json` command line
//! - `process` runs ripgrep and streams its stdout
//! - `parser` and `protocol` decode the stream into ripgrep messages
//! - `aggregator` groups matches into one result per file
//! - `server` owns the sessions and reports to the client

pub mod aggregator;
pub mod args;
pub mod parser;
pub mod paths;
pub mod process;
pub mod protocol;
pub mod server;

pub use server::{ActiveSearch, SearchServer};
