use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

use crate::error::{error_chain, ProbeError};
use crate::progress::clear_line;
use crate::types::{ProbeResult, WildcardState, SUCCESS_STATUS};

/// Decides which probe results are reported.
#[derive(Debug, Clone, Copy)]
pub struct ResultFilter {
    wildcard: WildcardState,
}

impl ResultFilter {
    pub fn new(wildcard: WildcardState) -> Self {
        Self { wildcard }
    }

    /// Keep only success responses that do not match the wildcard baseline.
    pub fn retains(&self, result: &ProbeResult) -> bool {
        result.status == SUCCESS_STATUS && !self.wildcard.suppresses(result.size)
    }
}

/// Drain `rx` until every sender is gone, returning accepted results in arrival order.
pub async fn collect_results(
    mut rx: UnboundedReceiver<ProbeResult>,
    filter: ResultFilter,
    found: Arc<AtomicU64>,
    interactive: bool,
) -> Vec<ProbeResult> {
    let mut results = Vec::new();
    while let Some(res) = rx.recv().await {
        if !filter.retains(&res) {
            continue;
        }
        if interactive {
            clear_line();
        }
        info!(status = res.status, size = %res.size, "found /{}", res.entity);
        found.fetch_add(1, Ordering::Relaxed);
        results.push(res);
    }
    results
}

/// Log every probe error until every sender is gone. Returns how many were seen.
pub async fn collect_errors(mut rx: UnboundedReceiver<ProbeError>, interactive: bool) -> u64 {
    let mut count = 0;
    while let Some(err) = rx.recv().await {
        if interactive {
            clear_line();
        }
        let kind = match &err {
            ProbeError::MalformedUrl { .. } => "malformed_url",
            ProbeError::Certificate { .. } => "certificate",
            ProbeError::Transport { .. } => "transport",
        };
        error!(url = err.url(), kind, "{}", error_chain(&err));
        count += 1;
    }
    count
}
