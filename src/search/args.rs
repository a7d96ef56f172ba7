//! ripgrep command line construction

use crate::types::SearchOptions;
use std::path::PathBuf;

const GLOB_ARG: &str = "--glob=";
const SUB_DIR_GLOB: &str = "**/";
const WHOLE_WORD_SPECIAL_CHARS: &[char] = &[
    '-', '\\', '{', '}', '*', '+', '?', '|', '^', '$', '.', '[', ']', '(', ')', '#',
];

/// Build the flag portion of the ripgrep command line.
///
/// Arguments are deduplicated while keeping their first position.
pub fn build_args(options: &SearchOptions, default_max_file_size: &str) -> Vec<String> {
    let mut args = ArgSet::default();

    args.add("--hidden");
    args.add("--json");

    if options.match_case {
        args.add("--case-sensitive");
    } else {
        args.add("--ignore-case");
    }

    if options.include_ignored {
        args.add("--no-ignore");
    }

    match options.max_file_size.as_deref().map(str::trim) {
        Some(size) if !size.is_empty() => args.add(format!("--max-filesize={}", size)),
        _ => args.add(format!("--max-filesize={}", default_max_file_size)),
    }

    for (patterns, exclude) in [(&options.include, false), (&options.exclude, true)] {
        for pattern in patterns.iter().filter(|p| !p.is_empty()) {
            for arg in pattern_to_glob_args(pattern, exclude) {
                args.add(arg);
            }
        }
    }

    if options.use_reg_exp || options.match_whole_word {
        args.add("--regexp");
    } else {
        args.add("--fixed-strings");
        // A literal query starting with `-` must not be read as a flag
        args.add("--");
    }

    args.into_vec()
}

/// Translate a file pattern into ripgrep `--glob` arguments.
///
/// A pattern that does not end in `*` gets a second glob for the contents of
/// the directory it may name.
pub fn pattern_to_glob_args(pattern: &str, exclude: bool) -> Vec<String> {
    let exclude_char = if exclude { "!" } else { "" };
    let prefix = if pattern.starts_with('/') { "**" } else { SUB_DIR_GLOB };
    let updated = if pattern.starts_with(SUB_DIR_GLOB) {
        pattern.to_string()
    } else {
        format!("{}{}", prefix, pattern)
    };

    let glob = format!("{}{}{}", GLOB_ARG, exclude_char, updated);
    let mut globs = vec![glob.clone()];
    if !glob.ends_with('*') {
        let suffix = if glob.ends_with('/') { "*" } else { "/*" };
        globs.push(format!("{}{}", glob, suffix));
    }
    globs
}

/// Escape a literal query for whole-word regex matching.
///
/// `\b` is only added next to word characters; a boundary next to a
/// non-word character would never match.
pub fn escape_whole_word(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 4);
    for ch in query.chars() {
        if WHOLE_WORD_SPECIAL_CHARS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    if escaped.chars().next().is_some_and(is_word_char) {
        escaped.insert_str(0, "\\b");
    }
    if escaped.chars().last().is_some_and(is_word_char) {
        escaped.push_str("\\b");
    }
    escaped
}

/// Full argument list: flags, the query, then the search paths.
pub fn build_command_line(
    query: &str,
    options: &SearchOptions,
    search_paths: &[PathBuf],
    default_max_file_size: &str,
) -> Vec<String> {
    let mut args = build_args(options, default_max_file_size);

    // Whole-word search runs in regex mode, so a literal query needs escaping
    if options.match_whole_word && !options.use_reg_exp {
        args.push(escape_whole_word(query));
    } else {
        args.push(query.to_string());
    }

    args.extend(
        search_paths
            .iter()
            .map(|path| path.to_string_lossy().into_owned()),
    );
    args
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[derive(Default)]
struct ArgSet {
    args: Vec<String>,
}

impl ArgSet {
    fn add(&mut self, arg: impl Into<String>) {
        let arg = arg.into();
        if !self.args.contains(&arg) {
            self.args.push(arg);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.args
    }
}
