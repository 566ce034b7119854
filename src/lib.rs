//! Library crate for dirber-rs exposing the scan engine and its collaborators.
pub mod collector;
pub mod error;
pub mod logging;
pub mod options;
pub mod probe;
pub mod progress;
pub mod scanner;
pub mod server;
pub mod types;
pub mod wildcard;
pub mod wordlist;

pub use error::{ProbeError, ScanError};
pub use options::ScanOptions;
pub use scanner::Scanner;
pub use types::{CandidateSet, ProbeResult, ResponseSize, ScanReport, StatusCodeSet, WildcardState};
