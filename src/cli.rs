//! Command line arguments of the server binary

use crate::config::{detect_rg_path, SearchConfig, DEFAULT_MAX_FILE_SIZE};
use clap::Parser;
use std::path::PathBuf;

/// Search-in-workspace server speaking JSON-RPC over stdio
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the ripgrep executable (defaults to `rg` on PATH)
    #[arg(long)]
    pub rg_path: Option<PathBuf>,

    /// File size ceiling used when a search does not specify one
    #[arg(long, default_value = DEFAULT_MAX_FILE_SIZE)]
    pub max_filesize: String,
}

impl Cli {
    pub fn into_config(self) -> SearchConfig {
        SearchConfig {
            rg_path: self.rg_path.unwrap_or_else(detect_rg_path),
            default_max_file_size: self.max_filesize,
        }
    }
}
