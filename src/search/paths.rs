//! Search root and pattern resolution
//!
//! Include patterns that name an existing folder (`./src`, `/abs/dir/**`) are
//! turned into search roots, and the remaining relative patterns are rewritten
//! to absolute ones so ripgrep can match them against absolute file paths.

use crate::types::SearchOptions;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// Outcome of trying to resolve patterns to folders on disk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolvedPatterns {
    /// Patterns that resolved to at least one existing path
    pub converted_patterns: HashSet<String>,
    /// Existing paths derived from those patterns, in discovery order
    pub resolved_paths: Vec<PathBuf>,
}

/// Search paths plus the options rewritten against them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSearch {
    pub search_paths: Vec<PathBuf>,
    pub options: SearchOptions,
}

/// Try every pattern against every search path and collect the ones that
/// name an existing file or folder.
pub fn resolve_patterns_to_paths(patterns: &[String], search_paths: &[PathBuf]) -> ResolvedPatterns {
    let mut resolved = ResolvedPatterns::default();

    for pattern in patterns {
        for root in search_paths {
            if let Some(found) = resolve_folder_from_glob(root, pattern) {
                resolved.converted_patterns.insert(pattern.clone());
                if !resolved.resolved_paths.contains(&found) {
                    resolved.resolved_paths.push(found);
                }
            }
        }
    }

    resolved
}

/// Rewrite `./`-relative patterns into one absolute pattern per search path.
///
/// Other patterns pass through unchanged. The result is deduplicated and may
/// be longer than the input.
pub fn replace_relative_to_absolute(patterns: &[String], search_paths: &[PathBuf]) -> Vec<String> {
    let mut processed: Vec<String> = Vec::new();

    for pattern in patterns {
        for root in search_paths {
            let absolute = relative_to_absolute_pattern(root, pattern);
            if !processed.contains(&absolute) {
                processed.push(absolute);
            }
        }
    }

    processed
}

/// Narrow the workspace roots using the include patterns.
///
/// Returns the effective search paths and the include patterns left over
/// once the folder references have been consumed. When nothing resolves the
/// roots are returned as-is.
pub fn resolve_search_paths_from_includes(
    root_paths: &[PathBuf],
    include: &[String],
) -> (Vec<PathBuf>, Vec<String>) {
    let ResolvedPatterns {
        converted_patterns,
        resolved_paths,
    } = resolve_patterns_to_paths(include, root_paths);

    let remaining = include
        .iter()
        .filter(|pattern| !converted_patterns.contains(*pattern))
        .cloned()
        .collect();

    if resolved_paths.is_empty() {
        (root_paths.to_vec(), remaining)
    } else {
        (resolved_paths, remaining)
    }
}

/// Produce the search paths and a rewritten copy of `options`.
pub fn normalize_options(root_paths: &[PathBuf], options: &SearchOptions) -> NormalizedSearch {
    let (search_paths, include) = resolve_search_paths_from_includes(root_paths, &options.include);

    let mut normalized = options.clone();
    normalized.include = replace_relative_to_absolute(&include, &search_paths);
    normalized.exclude = replace_relative_to_absolute(&options.exclude, &search_paths);

    log::debug!(
        "Normalized search: paths={:?} include={:?} exclude={:?}",
        search_paths,
        normalized.include,
        normalized.exclude
    );

    NormalizedSearch {
        search_paths,
        options: normalized,
    }
}

/// Pick the workspace root a file belongs to: the longest root that
/// contains it, or `None` when it lies outside every root.
pub fn root_for_file<'a>(file: &Path, roots: &'a [PathBuf]) -> Option<&'a PathBuf> {
    roots
        .iter()
        .filter(|root| file.starts_with(root))
        .max_by_key(|root| root.as_os_str().len())
}

fn is_relative_to_base_directory(pattern: &str) -> bool {
    pattern.replace('\\', "/").starts_with("./")
}

fn relative_to_absolute_pattern(root: &Path, pattern: &str) -> String {
    if !is_relative_to_base_directory(pattern) {
        return pattern.to_string();
    }

    let unified = pattern.replace('\\', "/");
    let mut joined = normalize_path(&root.join(&unified[2..]))
        .to_string_lossy()
        .into_owned();
    if unified.ends_with('/') && !joined.ends_with('/') {
        joined.push('/');
    }
    joined
}

/// `/a/b/**` -> `/a/b`, `./foo/**` -> `./foo`; anything else is returned as-is.
fn strip_glob_suffix(pattern: &str) -> String {
    let path = Path::new(pattern);
    match (path.file_name(), path.parent()) {
        (Some(name), Some(parent)) if name == "**" => parent.to_string_lossy().into_owned(),
        _ => pattern.to_string(),
    }
}

fn resolve_folder_from_glob(root: &Path, pattern: &str) -> Option<PathBuf> {
    let base = strip_glob_suffix(pattern);
    let base_path = Path::new(&base);

    let target = if base_path.is_absolute() {
        normalize_path(base_path)
    } else if is_relative_to_base_directory(&base) {
        normalize_path(&root.join(base_path))
    } else {
        // Not a reference to a single file or folder
        return None;
    };

    target.exists().then_some(target)
}

/// Lexically resolve `.` and `..` components without touching the disk.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }

    normalized
}
