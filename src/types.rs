use serde::{Deserialize, Serialize};

/// Identifier handed back to the client for every `search` call.
pub type SearchId = u64;

/// Options accepted by a single search request.
///
/// Every field has a default so clients may send a partial object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    pub match_case: bool,
    pub include_ignored: bool,
    pub max_file_size: Option<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub use_reg_exp: bool,
    pub match_whole_word: bool,
    pub max_results: Option<usize>,
}

impl SearchOptions {
    /// Result cap, if any. A cap of zero means "no cap".
    pub fn result_limit(&self) -> Option<usize> {
        self.max_results.filter(|&max| max > 0)
    }
}

/// All matches found in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub file_uri: String,
    /// URI of the workspace root containing the file, empty when none does
    #[serde(rename = "root")]
    pub root_uri: String,
    pub matches: Vec<Match>,
}

impl SearchResult {
    pub fn new(file_uri: impl Into<String>, root_uri: impl Into<String>) -> Self {
        Self {
            file_uri: file_uri.into(),
            root_uri: root_uri.into(),
            matches: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    /// 1-based line number
    pub line: u64,
    /// 1-based character offset of the match within the full line
    pub character: usize,
    /// Match length in characters
    pub length: usize,
    pub line_text: LineText,
}

/// Line content attached to a match: the whole line, or a window around the
/// match when the line is too long to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineText {
    Text(String),
    Preview(LinePreview),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePreview {
    pub text: String,
    /// 1-based offset of the match within `text`
    pub character: usize,
}
