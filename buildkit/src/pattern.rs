//! Shell-style wildcard matching and glob expansion over the filesystem.
//!
//! Supports `*` (any run of characters), `?` (one character), `[...]` sets
//! with ranges and `[!...]`/`[^...]` negation, and `**` as a whole path
//! component matching zero or more directories.

use std::path::{Path, PathBuf};

use log::*;
use walkdir::{DirEntry, WalkDir};

const RECURSIVE: &str = "**";

/// Returns `true` if `s` contains any wildcard character.
pub fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Tests whether `pattern` matches the whole of `name`.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern = pattern.chars().collect::<Vec<_>>();
    let name = name.chars().collect::<Vec<_>>();
    fit(&pattern, &name)
}

fn fit(pattern: &[char], name: &[char]) -> bool {
    let (mut pi, mut ni) = (0, 0);
    // Position just after the last `*` and the name index it is retried from.
    let mut backtrack: Option<(usize, usize)> = None;

    while ni < name.len() {
        if pattern.get(pi) == Some(&'*') {
            pi += 1;
            backtrack = Some((pi, ni));
            continue;
        }

        if let Some(next) = step(pattern, pi, name[ni]) {
            pi = next;
            ni += 1;
        } else if let Some((star_pi, star_ni)) = backtrack {
            pi = star_pi;
            ni = star_ni + 1;
            backtrack = Some((star_pi, star_ni + 1));
        } else {
            return false;
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}

/// Matches one character of the name at `pi`, returning the next pattern index.
fn step(pattern: &[char], pi: usize, c: char) -> Option<usize> {
    match *pattern.get(pi)? {
        '?' => Some(pi + 1),
        '[' => match set_match(pattern, pi + 1, c) {
            Some((hit, end)) => hit.then_some(end),
            // Unterminated set, `[` is literal.
            None => (c == '[').then_some(pi + 1),
        },
        literal => (literal == c).then_some(pi + 1),
    }
}

/// Scans the set starting after `[`. Returns whether `c` is in it and the
/// index after the closing `]`, or `None` if the set never closes.
fn set_match(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start;
    let negated = matches!(pattern.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut hit = false;
    let mut first = true;
    loop {
        let lo = *pattern.get(i)?;
        if lo == ']' && !first {
            return Some((hit != negated, i + 1));
        }
        first = false;

        match (pattern.get(i + 1), pattern.get(i + 2)) {
            (Some('-'), Some(&hi)) if hi != ']' => {
                hit |= lo <= c && c <= hi;
                i += 3;
            }
            _ => {
                hit |= lo == c;
                i += 1;
            }
        }
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Matches a single path component. Wildcards never match hidden names.
fn component_match(pattern: &str, name: &str) -> bool {
    if !has_wildcard(pattern) {
        return pattern == name;
    }
    if is_hidden(name) && !is_hidden(pattern) {
        return false;
    }
    wildcard_match(pattern, name)
}

fn segments_match(pattern: &[String], segments: &[String]) -> bool {
    match pattern.split_first() {
        None => segments.is_empty(),
        Some((head, tail)) if head == RECURSIVE => (0..=segments.len()).any(|skip| {
            segments[..skip].iter().all(|s| !is_hidden(s)) && segments_match(tail, &segments[skip..])
        }),
        Some((head, tail)) => match segments.split_first() {
            Some((segment, rest)) => component_match(head, segment) && segments_match(tail, rest),
            None => false,
        },
    }
}

fn readable(entry: walkdir::Result<DirEntry>) -> Option<DirEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(err) => {
            debug!("Skipping unreadable entry: {}", err);
            None
        }
    }
}

/// Expands `pattern` against the filesystem.
///
/// Leading components without wildcards form the directory the search starts
/// from, and every match is returned joined onto it, so relative patterns give
/// relative paths. A pattern without wildcards expands to itself if it exists.
///
/// Components that are not valid Unicode are matched lossily but returned
/// unchanged.
pub fn expand(pattern: impl AsRef<Path>) -> Vec<PathBuf> {
    let path = pattern.as_ref();

    let mut base = PathBuf::new();
    let mut rest = Vec::new();
    for component in path.components() {
        let part = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !has_wildcard(&part) {
            base.push(component);
        } else {
            rest.push(part.into_owned());
        }
    }

    if rest.is_empty() {
        return if path.exists() {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let root = if base.as_os_str().is_empty() {
        Path::new(".")
    } else {
        base.as_path()
    };

    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    if !rest.iter().any(|part| part == RECURSIVE) {
        walker = walker.max_depth(rest.len());
    }

    // Hidden directories can only match a component spelled with a dot.
    let prune_hidden = !rest.iter().any(|part| is_hidden(part));
    let entries = walker.into_iter().filter_entry(move |entry| {
        !prune_hidden || entry.depth() == 0 || !is_hidden(&entry.file_name().to_string_lossy())
    });

    let mut matches = Vec::new();
    for entry in entries.filter_map(readable) {
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let segments = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>();

        if segments_match(&rest, &segments) {
            trace!("`{}` matched {}", path.display(), relative.display());
            matches.push(base.join(relative));
        }
    }

    debug!("`{}` expanded to {} path(s).", path.display(), matches.len());
    matches
}

/// Finds regular files under `dir`, at any depth, whose file name matches
/// `pattern`. A missing `dir` yields nothing.
pub fn find_files(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(readable)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| wildcard_match(pattern, &entry.file_name().to_string_lossy()))
        .map(DirEntry::into_path)
        .collect()
}
