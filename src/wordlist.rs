use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::types::StatusCodeSet;

/// Parse wordlist (or extension template) content into unique entries.
///
/// Rules per line:
/// - surrounding whitespace is trimmed
/// - blank lines are ignored
/// - any line containing `#` anywhere is treated as a comment and dropped whole
/// - duplicates collapse, first occurrence wins
pub fn parse_words_str(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();

    for raw_line in s.lines() {
        let line = raw_line.trim();
        // Not just leading `#`: `secret#note` is dropped as well.
        if line.is_empty() || line.contains('#') {
            continue;
        }
        if seen.insert(line) {
            out.push(line.to_string());
        }
    }

    out
}

/// Parse status-code content, one code per line.
///
/// Malformed lines (not a number, or outside 100..=999) are logged and skipped.
pub fn parse_status_codes_str(s: &str) -> StatusCodeSet {
    let mut set = StatusCodeSet::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<u16>() {
            Ok(code) if (100..=999).contains(&code) => {
                set.insert(code);
            }
            Ok(code) => warn!(line_no, code, "status code out of range, skipping"),
            Err(e) => warn!(line_no, value = line, error = %e, "invalid status code, skipping"),
        }
    }

    set
}

/// Load a wordlist from a file. Errors if the file cannot be read.
pub fn load_words_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read wordlist: {}", path.as_ref().display()))?;
    Ok(parse_words_str(&content))
}

/// Load extension templates from a file. Errors if the file cannot be read.
pub fn load_extensions_from_path(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path.as_ref()).with_context(|| {
        format!("failed to read extensions file: {}", path.as_ref().display())
    })?;
    Ok(parse_words_str(&content))
}

/// Load the wildcard status-code set from a file. Errors if the file cannot be read.
pub fn load_status_codes_from_path(path: impl AsRef<Path>) -> Result<StatusCodeSet> {
    let content = fs::read_to_string(path.as_ref()).with_context(|| {
        format!("failed to read status codes file: {}", path.as_ref().display())
    })?;
    Ok(parse_status_codes_str(&content))
}

/// Status codes treated as "exists" when no file is given.
pub fn default_status_codes() -> StatusCodeSet {
    const DEFAULT: &[u16] = &[200, 204, 301, 302, 307, 401, 403];
    DEFAULT.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_words_trims_and_dedups() {
        let words = parse_words_str("admin\n  images \nadmin\n\n");
        assert_eq!(words, vec!["admin", "images"]);
    }

    #[test]
    fn hash_anywhere_drops_the_line() {
        let words = parse_words_str("admin\nimages\nsecret#note\n# header\n");
        assert_eq!(words, vec!["admin", "images"]);
    }

    #[test]
    fn status_codes_skip_malformed() {
        let set = parse_status_codes_str("200\nabc\n204\n\n70000\n42\n");
        assert_eq!(set.len(), 2);
        assert!(set.contains(&200) && set.contains(&204));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_words_from_path("/definitely/not/here.txt").unwrap_err();
        assert!(err.to_string().contains("failed to read wordlist"));
    }

    #[test]
    fn default_codes_include_ok() {
        let d = default_status_codes();
        assert!(d.contains(&200) && d.contains(&403));
    }
}
