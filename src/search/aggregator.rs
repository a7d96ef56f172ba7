//! Per-file result aggregation
//!
//! Matches are collected between a file's `begin` and `end` messages and
//! handed out as one `SearchResult` per file. The aggregator also counts
//! matches and reports when the result cap has been reached.

use super::paths::root_for_file;
use super::protocol::{RgBegin, RgMatch, RgMessage};
use crate::types::{LinePreview, LineText, Match, SearchResult};
use std::path::{Path, PathBuf};
use url::Url;

/// Lines longer than this many characters are sent as a preview window.
pub const PREVIEW_THRESHOLD: usize = 300;
const PREVIEW_PREFIX_LENGTH: usize = 25;
const PREVIEW_SUFFIX_LENGTH: usize = 70;
const ELLIPSIS: &str = "...";

/// What the caller should do after a message has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// The cap was hit; the open result has already been flushed and no
    /// further messages will be processed.
    LimitReached,
}

#[derive(Debug)]
enum FileState {
    AwaitingFile,
    FileOpen(SearchResult),
}

pub struct ResultAggregator {
    roots: Vec<PathBuf>,
    limit: Option<usize>,
    num_results: usize,
    state: FileState,
    stopped: bool,
}

impl ResultAggregator {
    /// `roots` are the workspace roots used to attribute files,
    /// `limit` the maximum number of matches to deliver.
    pub fn new(roots: Vec<PathBuf>, limit: Option<usize>) -> Self {
        Self {
            roots,
            limit,
            num_results: 0,
            state: FileState::AwaitingFile,
            stopped: false,
        }
    }

    pub fn num_results(&self) -> usize {
        self.num_results
    }

    pub fn limit_reached(&self) -> bool {
        self.stopped
    }

    /// Feed one message; completed results are passed to `emit`.
    pub fn handle<F>(&mut self, message: RgMessage, emit: &mut F) -> Step
    where
        F: FnMut(SearchResult),
    {
        if self.stopped {
            return Step::LimitReached;
        }

        match message {
            RgMessage::Begin(begin) => {
                self.begin_file(begin, emit);
                Step::Continue
            }
            RgMessage::Match(data) => self.push_match(data, emit),
            RgMessage::End(_) => {
                self.flush(emit);
                Step::Continue
            }
            RgMessage::Context(_) | RgMessage::Summary(_) => Step::Continue,
        }
    }

    /// Stream ended; deliver a result whose `end` never arrived.
    pub fn finish<F>(&mut self, emit: &mut F)
    where
        F: FnMut(SearchResult),
    {
        if !self.stopped && matches!(self.state, FileState::FileOpen(_)) {
            log::debug!("Output ended inside a file, flushing partial result");
            self.flush(emit);
        }
    }

    fn begin_file<F>(&mut self, begin: RgBegin, emit: &mut F)
    where
        F: FnMut(SearchResult),
    {
        if matches!(self.state, FileState::FileOpen(_)) {
            log::warn!("begin message received while a file is open, flushing it first");
            self.flush(emit);
        }

        let path = begin.path.map(|p| p.to_text()).filter(|p| !p.is_empty());
        let Some(path) = path else {
            log::error!("Begin message without path, dropping its matches");
            return;
        };

        match self.open_result(Path::new(&path)) {
            Some(result) => self.state = FileState::FileOpen(result),
            None => log::error!("Could not resolve file path {:?}, dropping its matches", path),
        }
    }

    fn open_result(&self, file: &Path) -> Option<SearchResult> {
        let file_uri = Url::from_file_path(file).ok()?;
        let root_uri = root_for_file(file, &self.roots)
            .and_then(|root| Url::from_file_path(root).ok())
            .map(String::from)
            .unwrap_or_default();
        Some(SearchResult::new(file_uri, root_uri))
    }

    fn push_match<F>(&mut self, data: RgMatch, emit: &mut F) -> Step
    where
        F: FnMut(SearchResult),
    {
        let FileState::FileOpen(result) = &mut self.state else {
            return Step::Continue;
        };

        let line = data.line_number.unwrap_or_default();
        let line_bytes = data.lines.to_bytes();
        let line_text = String::from_utf8_lossy(&line_bytes);

        let mut reached = false;
        for submatch in &data.submatches {
            let start_offset = char_offset(&line_bytes, submatch.start);
            let length = submatch.matched.to_text().chars().count();

            result.matches.push(Match {
                line,
                character: start_offset + 1,
                length,
                line_text: line_preview(&line_text, start_offset, length),
            });
            self.num_results += 1;

            if self.limit.is_some_and(|limit| self.num_results >= limit) {
                reached = true;
                break;
            }
        }

        if reached {
            log::debug!("Reached maximum of {} results", self.num_results);
            self.flush(emit);
            self.stopped = true;
            return Step::LimitReached;
        }
        Step::Continue
    }

    fn flush<F>(&mut self, emit: &mut F)
    where
        F: FnMut(SearchResult),
    {
        if let FileState::FileOpen(result) = std::mem::replace(&mut self.state, FileState::AwaitingFile) {
            emit(result);
        }
    }
}

/// Convert a byte offset within `line` to a character offset.
///
/// ripgrep reports byte offsets, clients expect character offsets.
pub fn char_offset(line: &[u8], byte_offset: usize) -> usize {
    let end = byte_offset.min(line.len());
    String::from_utf8_lossy(&line[..end]).chars().count()
}

/// Line text for a match starting at character `start_offset`.
///
/// Long lines are cut to a window of 25 characters before the match, the
/// match itself and 70 characters after it; `character` in the preview is
/// the 1-based position of the match inside the window.
pub fn line_preview(line: &str, start_offset: usize, match_length: usize) -> LineText {
    let trimmed = line.trim_end();
    if trimmed.chars().count() <= PREVIEW_THRESHOLD {
        return LineText::Text(trimmed.to_string());
    }

    // The window is cut from the untrimmed line so a match in trailing
    // whitespace stays inside the preview
    let full = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
    let start_offset = start_offset.min(full.chars().count());
    let start = start_offset.saturating_sub(PREVIEW_PREFIX_LENGTH);
    let length = PREVIEW_PREFIX_LENGTH + match_length + PREVIEW_SUFFIX_LENGTH;
    let prefix = if start > 0 { ELLIPSIS } else { "" };

    let mut text = String::from(prefix);
    text.extend(full.chars().skip(start).take(length));

    LineText::Preview(LinePreview {
        text,
        character: (start_offset - start) + prefix.chars().count() + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::protocol::{BytesOrText, RgEnd, RgSubmatch};

    fn text(value: &str) -> BytesOrText {
        BytesOrText::Text {
            text: value.to_string(),
        }
    }

    fn begin(path: &str) -> RgMessage {
        RgMessage::Begin(RgBegin {
            path: Some(text(path)),
        })
    }

    fn end() -> RgMessage {
        RgMessage::End(RgEnd { path: None })
    }

    fn matched(line_number: u64, line: &str, needle: &str) -> RgMessage {
        let submatches = line
            .match_indices(needle)
            .map(|(start, m)| RgSubmatch {
                matched: text(m),
                start,
                end: start + m.len(),
            })
            .collect();
        RgMessage::Match(RgMatch {
            path: None,
            lines: text(line),
            line_number: Some(line_number),
            absolute_offset: 0,
            submatches,
        })
    }

    fn run(aggregator: &mut ResultAggregator, messages: Vec<RgMessage>) -> (Vec<SearchResult>, Step) {
        let mut results = Vec::new();
        let mut last = Step::Continue;
        for message in messages {
            last = aggregator.handle(message, &mut |r| results.push(r));
            if last == Step::LimitReached {
                break;
            }
        }
        (results, last)
    }

    #[test]
    fn test_results_emitted_per_file_on_end() {
        let mut aggregator = ResultAggregator::new(vec![PathBuf::from("/ws")], None);
        let (results, step) = run(
            &mut aggregator,
            vec![
                begin("/ws/b.rs"),
                matched(1, "foo\n", "foo"),
                matched(4, "a foo b foo\n", "foo"),
                end(),
                begin("/ws/a.rs"),
                matched(2, "  foo\n", "foo"),
                end(),
            ],
        );

        assert_eq!(step, Step::Continue);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file_uri, "file:///ws/b.rs");
        assert_eq!(results[0].root_uri, "file:///ws");
        assert_eq!(results[0].matches.len(), 3);
        assert_eq!(results[0].matches[2].line, 4);
        assert_eq!(results[0].matches[2].character, 9);
        assert_eq!(results[0].matches[2].line_text, LineText::Text("a foo b foo".to_string()));
        assert_eq!(results[1].file_uri, "file:///ws/a.rs");
        assert_eq!(results[1].matches[0].character, 3);
        assert_eq!(aggregator.num_results(), 4);
    }

    #[test]
    fn test_match_without_open_file_is_ignored() {
        let mut aggregator = ResultAggregator::new(vec![], None);
        let (results, _) = run(&mut aggregator, vec![matched(1, "foo", "foo"), end()]);
        assert!(results.is_empty());
        assert_eq!(aggregator.num_results(), 0);
    }

    #[test]
    fn test_begin_without_path_drops_file() {
        let mut aggregator = ResultAggregator::new(vec![], None);
        let (results, _) = run(
            &mut aggregator,
            vec![
                RgMessage::Begin(RgBegin { path: None }),
                matched(1, "foo", "foo"),
                end(),
                begin("/ws/ok.rs"),
                matched(1, "foo", "foo"),
                end(),
            ],
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_uri, "file:///ws/ok.rs");
    }

    #[test]
    fn test_relative_path_is_unresolvable() {
        let mut aggregator = ResultAggregator::new(vec![], None);
        let (results, _) = run(
            &mut aggregator,
            vec![begin("relative/a.rs"), matched(1, "foo", "foo"), end()],
        );
        assert!(results.is_empty());
    }

    #[test]
    fn test_file_outside_roots_has_empty_root() {
        let mut aggregator = ResultAggregator::new(vec![PathBuf::from("/ws")], None);
        let (results, _) = run(
            &mut aggregator,
            vec![begin("/elsewhere/a.rs"), matched(1, "foo", "foo"), end()],
        );
        assert_eq!(results[0].root_uri, "");
    }

    #[test]
    fn test_begin_while_open_flushes_then_reopens() {
        let mut aggregator = ResultAggregator::new(vec![], None);
        let (results, _) = run(
            &mut aggregator,
            vec![
                begin("/ws/a.rs"),
                matched(1, "foo", "foo"),
                begin("/ws/b.rs"),
                matched(2, "foo", "foo"),
                end(),
            ],
        );
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file_uri, "file:///ws/a.rs");
        assert_eq!(results[1].file_uri, "file:///ws/b.rs");
        assert_eq!(results[1].matches[0].line, 2);
    }

    #[test]
    fn test_limit_flushes_open_file_and_stops() {
        let mut aggregator = ResultAggregator::new(vec![], Some(3));
        let (results, step) = run(
            &mut aggregator,
            vec![
                begin("/ws/a.rs"),
                matched(1, "foo foo", "foo"),
                end(),
                begin("/ws/b.rs"),
                matched(1, "foo foo foo", "foo"),
                matched(2, "foo", "foo"),
                end(),
            ],
        );

        assert_eq!(step, Step::LimitReached);
        assert!(aggregator.limit_reached());
        assert_eq!(aggregator.num_results(), 3);
        let delivered: usize = results.iter().map(|r| r.matches.len()).sum();
        assert_eq!(delivered, 3);
        assert_eq!(results[1].matches.len(), 1);

        let mut late = Vec::new();
        let step = aggregator.handle(begin("/ws/c.rs"), &mut |r| late.push(r));
        assert_eq!(step, Step::LimitReached);
        aggregator.finish(&mut |r| late.push(r));
        assert!(late.is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_file() {
        let mut aggregator = ResultAggregator::new(vec![], None);
        let (mut results, _) = run(&mut aggregator, vec![begin("/ws/a.rs"), matched(1, "foo", "foo")]);
        assert!(results.is_empty());

        aggregator.finish(&mut |r| results.push(r));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_character_offsets_count_characters_not_bytes() {
        let mut aggregator = ResultAggregator::new(vec![], None);
        let (results, _) = run(
            &mut aggregator,
            vec![begin("/ws/a.rs"), matched(1, "héllo wörld foo\n", "foo"), end()],
        );
        let m = &results[0].matches[0];
        assert_eq!(m.character, 13);
        assert_eq!(m.length, 3);
    }

    #[test]
    fn test_char_offset() {
        let line = "日本語 foo".as_bytes();
        assert_eq!(char_offset(line, 0), 0);
        assert_eq!(char_offset(line, 9), 3);
        assert_eq!(char_offset(line, 10), 4);
        assert_eq!(char_offset(line, 1000), 7);
    }

    #[test]
    fn test_line_of_300_characters_is_verbatim() {
        let line = "x".repeat(300);
        assert_eq!(line_preview(&line, 150, 3), LineText::Text(line.clone()));

        let with_newline = format!("{}\n", line);
        assert_eq!(line_preview(&with_newline, 0, 1), LineText::Text(line));
    }

    #[test]
    fn test_line_of_301_characters_gets_preview() {
        let mut line = "a".repeat(301);
        line.replace_range(200..203, "foo");

        let LineText::Preview(preview) = line_preview(&line, 200, 3) else {
            panic!("expected a preview");
        };

        assert!(!preview.text.is_empty());
        assert!(preview.text.starts_with(ELLIPSIS));
        assert!(preview.text.chars().count() <= ELLIPSIS.len() + 25 + 3 + 70);
        let at: String = preview.text.chars().skip(preview.character - 1).take(3).collect();
        assert_eq!(at, "foo");
    }

    #[test]
    fn test_preview_near_line_start_has_no_ellipsis() {
        let mut line = "b".repeat(400);
        line.replace_range(10..13, "foo");

        let LineText::Preview(preview) = line_preview(&line, 10, 3) else {
            panic!("expected a preview");
        };

        assert!(!preview.text.starts_with(ELLIPSIS));
        assert_eq!(preview.character, 11);
        let at: String = preview.text.chars().skip(preview.character - 1).take(3).collect();
        assert_eq!(at, "foo");
    }

    #[test]
    fn test_preview_with_multibyte_text() {
        let line = format!("{}foo{}", "é".repeat(100), "ü".repeat(250));

        let LineText::Preview(preview) = line_preview(&line, 100, 3) else {
            panic!("expected a preview");
        };

        assert_eq!(preview.character, 29);
        let at: String = preview.text.chars().skip(preview.character - 1).take(3).collect();
        assert_eq!(at, "foo");
    }

    #[test]
    fn test_preview_of_match_in_trailing_whitespace() {
        let line = format!("{}{}\n", "a".repeat(301), " ".repeat(10));

        let LineText::Preview(preview) = line_preview(&line, 305, 2) else {
            panic!("expected a preview");
        };

        assert!(preview.character <= preview.text.chars().count());
        let at: String = preview.text.chars().skip(preview.character - 1).take(2).collect();
        assert_eq!(at, "  ");
    }
}
