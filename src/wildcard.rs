use rand::Rng;
use tracing::{info, warn};

use crate::error::ScanError;
use crate::probe::Prober;
use crate::types::{ResponseSize, StatusCodeSet, WildcardState};

/// A fresh 128-bit random path segment, hex encoded.
pub fn random_token() -> String {
    format!("{:032x}", rand::thread_rng().gen::<u128>())
}

/// Pre-scan check: is the target online, and does it answer arbitrary paths?
///
/// `base_url` must end with `/`. Fails with [`ScanError::Connect`] if the target
/// is unreachable and with [`ScanError::Wildcard`] if it fabricates positive
/// responses and `ignore_wildcard` is not set.
pub async fn detect_wildcard(
    prober: &Prober,
    base_url: &str,
    status_codes: &StatusCodeSet,
    ignore_wildcard: bool,
) -> Result<WildcardState, ScanError> {
    let (status, size) = prober
        .probe(base_url)
        .await
        .map_err(|source| ScanError::Connect {
            url: base_url.to_string(),
            source,
        })?;
    info!(url = base_url, status, %size, "target is online");

    let url = format!("{base_url}{}", random_token());
    let (status, size) = prober
        .probe(&url)
        .await
        .map_err(ScanError::WildcardProbe)?;

    if !status_codes.contains(&status) {
        return Ok(WildcardState::default());
    }

    warn!(url = %url, status, "wildcard response found");
    if !ignore_wildcard {
        return Err(ScanError::Wildcard { url, status });
    }

    if size == ResponseSize::NotMeasured {
        warn!("wildcard response has no measurable length; enable include-length to filter it");
    }
    info!(baseline = %size, "ignoring wildcard responses");
    Ok(WildcardState {
        found: true,
        ignored: true,
        baseline_length: size.measured(),
    })
}
