//! Small text utilities shared across the workspace.

use std::sync::LazyLock;

use regex::Regex;

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s:\)\(/\?]+").expect("valid filename escape pattern"));

/// Rewrites a free-text label into a string safe to embed in a filename.
///
/// Runs of whitespace and `:()/?` collapse to a single `-`; `*` becomes
/// the literal word `star`. Series descriptions come straight from the
/// scanner console and routinely contain all of these.
pub fn escape_filename(label: &str) -> String {
    UNSAFE_FILENAME_CHARS
        .replace_all(label, "-")
        .replace('*', "star")
}
