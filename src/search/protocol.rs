//! ripgrep `--json` wire types
//!
//! See <https://docs.rs/grep-printer/latest/grep_printer/struct.JSON.html>.
//! Only the fields the aggregator needs are modelled; everything else is
//! ignored by serde.

use base64::Engine;
use serde::Deserialize;

/// Arbitrary data as emitted by ripgrep: UTF-8 text, or base64 encoded
/// bytes when the data is not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BytesOrText {
    Text { text: String },
    Bytes { bytes: String },
}

impl BytesOrText {
    /// Raw bytes of the value. Undecodable base64 yields an empty buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            BytesOrText::Text { text } => text.clone().into_bytes(),
            BytesOrText::Bytes { bytes } => base64::engine::general_purpose::STANDARD
                .decode(bytes)
                .unwrap_or_else(|e| {
                    log::warn!("Invalid base64 data in ripgrep output: {}", e);
                    Vec::new()
                }),
        }
    }

    /// Canonical text form; invalid UTF-8 is replaced lossily.
    pub fn to_text(&self) -> String {
        match self {
            BytesOrText::Text { text } => text.clone(),
            BytesOrText::Bytes { .. } => String::from_utf8_lossy(&self.to_bytes()).into_owned(),
        }
    }
}

/// One line of ripgrep JSON output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RgMessage {
    Begin(RgBegin),
    Match(RgMatch),
    End(RgEnd),
    Context(serde_json::Value),
    Summary(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RgBegin {
    #[serde(default)]
    pub path: Option<BytesOrText>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RgMatch {
    #[serde(default)]
    pub path: Option<BytesOrText>,
    pub lines: BytesOrText,
    #[serde(default)]
    pub line_number: Option<u64>,
    #[serde(default)]
    pub absolute_offset: u64,
    #[serde(default)]
    pub submatches: Vec<RgSubmatch>,
}

/// Byte range of one match inside `RgMatch::lines`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RgSubmatch {
    #[serde(rename = "match")]
    pub matched: BytesOrText,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RgEnd {
    #[serde(default)]
    pub path: Option<BytesOrText>,
}
