//! Server configuration

use std::path::PathBuf;

/// ripgrep's `--max-filesize` when the client does not send one.
pub const DEFAULT_MAX_FILE_SIZE: &str = "20M";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// ripgrep executable
    pub rg_path: PathBuf,
    pub default_max_file_size: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rg_path: detect_rg_path(),
            default_max_file_size: DEFAULT_MAX_FILE_SIZE.to_string(),
        }
    }
}

impl SearchConfig {
    pub fn with_rg_path(rg_path: impl Into<PathBuf>) -> Self {
        Self {
            rg_path: rg_path.into(),
            default_max_file_size: DEFAULT_MAX_FILE_SIZE.to_string(),
        }
    }
}

/// Locate `rg` on PATH, falling back to the bare name so a missing binary
/// surfaces as a spawn error on the first search.
pub fn detect_rg_path() -> PathBuf {
    match which::which("rg") {
        Ok(path) => {
            log::debug!("Found ripgrep at {}", path.display());
            path
        }
        Err(e) => {
            log::warn!("ripgrep not found on PATH: {}", e);
            PathBuf::from("rg")
        }
    }
}
