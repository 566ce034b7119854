use crate::collector::{collect_errors, collect_results, ResultFilter};
use crate::error::{ProbeError, ScanError};
use crate::options::ScanOptions;
use crate::probe::Prober;
use crate::progress::{clear_line, ProgressReporter, ScanPhase, ScanProgress};
use crate::types::{CandidateSet, ProbeResult, ScanReport, StatusCodeSet};
use crate::wildcard::detect_wildcard;
use ::time::{format_description::well_known, OffsetDateTime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives a full content-discovery scan against one base URL.
#[derive(Clone, Debug)]
pub struct Scanner {
    options: ScanOptions,
    candidates: Arc<CandidateSet>,
    status_codes: Arc<StatusCodeSet>,
    prober: Prober,
}

impl Scanner {
    pub fn new(
        options: ScanOptions,
        candidates: CandidateSet,
        status_codes: StatusCodeSet,
    ) -> Result<Self, ScanError> {
        let prober = Prober::new(&options)?;
        Self::with_prober(options, candidates, status_codes, prober)
    }

    /// Use a prepared prober, e.g. one carrying extra default headers.
    pub fn with_prober(
        options: ScanOptions,
        candidates: CandidateSet,
        status_codes: StatusCodeSet,
        prober: Prober,
    ) -> Result<Self, ScanError> {
        options.validate()?;
        Ok(Self {
            options,
            candidates: Arc::new(candidates),
            status_codes: Arc::new(status_codes),
            prober,
        })
    }

    /// Scan `base_url` and return every retained result.
    ///
    /// - Checks reachability and wildcard behaviour before any worker starts.
    /// - Runs `threads` workers over a queue pre-filled with every word.
    /// - Each worker probes one word and all its extension variants before taking the next.
    pub async fn scan(&self, base_url: &str) -> Result<ScanReport, ScanError> {
        self.scan_with_cancel(base_url, CancellationToken::new()).await
    }

    /// Variant that accepts a `CancellationToken`.
    ///
    /// Cancelling during setup fails with [`ScanError::Cancelled`]; cancelling
    /// later stops handing out new words and returns the partial report.
    pub async fn scan_with_cancel(
        &self,
        base_url: &str,
        cancel: CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let progress = ScanProgress::new();
        let report = self.scan_internal(base_url, progress.clone(), cancel).await?;
        progress.set_phase(ScanPhase::Completed);
        Ok(report)
    }

    /// Variant reporting into a caller-owned [`ScanProgress`].
    ///
    /// On success the phase is left at `Draining`; the caller sets `Completed`
    /// once it has stored the report, so observers never see a finished scan
    /// without its results.
    pub async fn scan_with_progress(
        &self,
        base_url: &str,
        progress: ScanProgress,
        cancel: CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        self.scan_internal(base_url, progress, cancel).await
    }

    async fn scan_internal(
        &self,
        base_url: &str,
        progress: ScanProgress,
        cancel: CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let base_url = normalize_base_url(base_url);
        let started_at = now_rfc3339();
        let total = self.candidates.len() as u64;
        progress.total.store(total, Ordering::Relaxed);

        progress.set_phase(ScanPhase::Setup);
        debug!(url = %base_url, "scan setup");
        let setup = detect_wildcard(
            &self.prober,
            &base_url,
            &self.status_codes,
            self.options.ignore_wildcard,
        );
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScanError::Cancelled),
            res = setup => res,
        };
        let wildcard = match outcome {
            Ok(w) => w,
            Err(e) => {
                progress.set_phase(ScanPhase::Aborted);
                return Err(e);
            }
        };

        progress.set_phase(ScanPhase::Running);
        info!(
            url = %base_url,
            words = total,
            threads = self.options.threads,
            extensions = self.options.search_extensions,
            "scan started"
        );

        // Queue holds every word, so filling it never waits on a worker.
        let (word_tx, word_rx) = mpsc::channel::<String>(self.candidates.len().max(1));
        for word in self.candidates.words() {
            if word_tx.try_send(word.clone()).is_err() {
                break;
            }
        }
        drop(word_tx);
        let word_rx = Arc::new(Mutex::new(word_rx));

        let (results_tx, results_rx) = mpsc::unbounded_channel::<ProbeResult>();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel::<ProbeError>();
        let interactive = self.options.show_progress;
        let results_task = tokio::spawn(collect_results(
            results_rx,
            ResultFilter::new(wildcard),
            progress.found.clone(),
            interactive,
        ));
        let errors_task = tokio::spawn(collect_errors(errors_rx, interactive));

        let reporter_cancel = CancellationToken::new();
        // Stops the reporter on every exit path below, including early `?` returns.
        let _reporter_guard = reporter_cancel.clone().drop_guard();
        let reporter = interactive.then(|| {
            ProgressReporter::stderr(progress.issued.clone(), total).spawn(reporter_cancel.clone())
        });

        let mut set = JoinSet::new();
        for id in 0..self.options.threads {
            let worker = Worker {
                id,
                base_url: base_url.clone(),
                prober: self.prober.clone(),
                candidates: self.candidates.clone(),
                search_extensions: self.options.search_extensions,
                words: word_rx.clone(),
                issued: progress.issued.clone(),
                results: results_tx.clone(),
                errors: errors_tx.clone(),
                cancel: cancel.clone(),
            };
            set.spawn(worker.run());
        }

        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                error!(error = %e, "worker task failed");
            }
        }

        progress.set_phase(ScanPhase::Draining);
        reporter_cancel.cancel();
        if let Some(handle) = reporter {
            let _ = handle.await;
        }
        if interactive {
            clear_line();
        }
        drop(results_tx);
        drop(errors_tx);
        let results = results_task.await?;
        let error_count = errors_task.await?;

        if cancel.is_cancelled() {
            warn!("scan cancelled, returning partial results");
        }
        let words_issued = progress.issued();
        info!(found = results.len(), errors = error_count, issued = words_issued, "scan finished");

        Ok(ScanReport {
            target: base_url,
            started_at,
            finished_at: now_rfc3339(),
            wildcard,
            words_total: total,
            words_issued,
            error_count,
            results,
        })
    }
}

struct Worker {
    id: usize,
    base_url: String,
    prober: Prober,
    candidates: Arc<CandidateSet>,
    search_extensions: bool,
    words: Arc<Mutex<mpsc::Receiver<String>>>,
    issued: Arc<AtomicU64>,
    results: mpsc::UnboundedSender<ProbeResult>,
    errors: mpsc::UnboundedSender<ProbeError>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let next = self.words.lock().await.recv().await;
            let Some(word) = next else { break };
            self.issued.fetch_add(1, Ordering::Relaxed);

            for entity in self.candidates.paths_for(&word, self.search_extensions) {
                let url = format!("{}{}", self.base_url, entity);
                match self.prober.probe(&url).await {
                    Ok((status, size)) => {
                        debug!(worker = self.id, url = %url, status, "probed");
                        let _ = self.results.send(ProbeResult {
                            entity,
                            status,
                            size,
                        });
                    }
                    Err(e) => {
                        let _ = self.errors.send(e);
                    }
                }
            }
        }
    }
}

/// Ensure the base URL ends with `/` so candidates can be appended directly.
pub fn normalize_base_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
