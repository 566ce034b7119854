use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The status code a probe must return to be reported as found.
pub const SUCCESS_STATUS: u16 = 200;

/// Placeholder in an extension template that is replaced with the current word.
pub const EXTENSION_PLACEHOLDER: &str = "%";

/// Status codes that mark a response as "exists" during wildcard detection.
pub type StatusCodeSet = HashSet<u16>;

/// Size of a probed response.
///
/// `NotMeasured` means the server did not declare a length and counting was not
/// requested; it is not the same thing as an empty body.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(from = "Option<u64>", into = "Option<u64>")]
pub enum ResponseSize {
    Measured(u64),
    NotMeasured,
}

impl ResponseSize {
    pub fn measured(&self) -> Option<u64> {
        match self {
            ResponseSize::Measured(n) => Some(*n),
            ResponseSize::NotMeasured => None,
        }
    }
}

impl From<ResponseSize> for Option<u64> {
    fn from(size: ResponseSize) -> Self {
        size.measured()
    }
}

impl From<Option<u64>> for ResponseSize {
    fn from(v: Option<u64>) -> Self {
        v.map(ResponseSize::Measured).unwrap_or(ResponseSize::NotMeasured)
    }
}

impl std::fmt::Display for ResponseSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseSize::Measured(n) => write!(f, "{n}"),
            ResponseSize::NotMeasured => f.write_str("-"),
        }
    }
}

/// One classified response for a probed path.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub entity: String,
    pub status: u16,
    pub size: ResponseSize,
}

/// Outcome of the wildcard check. Decided once during setup.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WildcardState {
    pub found: bool,
    pub ignored: bool,
    pub baseline_length: Option<u64>,
}

impl WildcardState {
    /// Whether results with the baseline length must be suppressed.
    pub fn suppresses(&self, size: ResponseSize) -> bool {
        match (self.found && self.ignored, self.baseline_length, size) {
            (true, Some(baseline), ResponseSize::Measured(n)) => n == baseline,
            _ => false,
        }
    }
}

/// Words and extension templates to probe.
///
/// Both lists are deduplicated on construction, keeping first-seen order, so
/// extension probes always run in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    words: Vec<String>,
    extensions: Vec<String>,
}

impl CandidateSet {
    pub fn new<W, E>(words: W, extensions: E) -> Self
    where
        W: IntoIterator,
        W::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            words: dedup(words),
            extensions: dedup(extensions),
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Paths to probe for `word`: the word itself, then one per extension
    /// template when `with_extensions` is set.
    pub fn paths_for(&self, word: &str, with_extensions: bool) -> Vec<String> {
        let mut out = Vec::with_capacity(1 + self.extensions.len());
        out.push(word.to_string());
        if with_extensions {
            out.extend(self.extensions.iter().map(|t| apply_template(t, word)));
        }
        out
    }
}

/// Substitute the first placeholder in `template` with `word`.
/// A template without a placeholder is returned as is.
pub fn apply_template(template: &str, word: &str) -> String {
    template.replacen(EXTENSION_PLACEHOLDER, word, 1)
}

fn dedup<I>(items: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let s: String = item.into();
        if seen.insert(s.clone()) {
            out.push(s);
        }
    }
    out
}

/// Final outcome of a scan.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanReport {
    pub target: String,
    pub started_at: String,
    pub finished_at: String,
    pub wildcard: WildcardState,
    pub words_total: u64,
    pub words_issued: u64,
    pub error_count: u64,
    pub results: Vec<ProbeResult>,
}
