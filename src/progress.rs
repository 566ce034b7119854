use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a single scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    #[default]
    Idle,
    Setup,
    Running,
    Draining,
    Completed,
    Aborted,
}

impl ScanPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Setup => "setup",
            ScanPhase::Running => "running",
            ScanPhase::Draining => "draining",
            ScanPhase::Completed => "completed",
            ScanPhase::Aborted => "aborted",
        }
    }
}

/// Counters shared between workers, collectors and observers of a scan.
#[derive(Clone, Debug)]
pub struct ScanProgress {
    pub issued: Arc<AtomicU64>,
    pub total: Arc<AtomicU64>,
    pub found: Arc<AtomicU64>,
    phase: Arc<watch::Sender<ScanPhase>>,
}

impl ScanProgress {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(ScanPhase::Idle);
        Self {
            issued: Arc::new(AtomicU64::new(0)),
            total: Arc::new(AtomicU64::new(0)),
            found: Arc::new(AtomicU64::new(0)),
            phase: Arc::new(phase),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.borrow()
    }

    pub fn set_phase(&self, phase: ScanPhase) {
        self.phase.send_replace(phase);
    }

    pub fn subscribe(&self) -> watch::Receiver<ScanPhase> {
        self.phase.subscribe()
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn found(&self) -> u64 {
        self.found.load(Ordering::Relaxed)
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Format the progress status line. Nothing to show when `total` is zero.
pub fn render_progress(issued: u64, total: u64) -> Option<String> {
    if total == 0 {
        return None;
    }
    let pct = issued as f64 * 100.0 / total as f64;
    Some(format!("\rProgress: {issued} / {total} ({pct:3.2}%)"))
}

/// Erase the current progress line on stderr.
pub fn clear_line() {
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "\r\x1b[2K");
    let _ = err.flush();
}

/// Periodically writes the progress line until cancelled.
pub struct ProgressReporter<W> {
    issued: Arc<AtomicU64>,
    total: u64,
    interval: Duration,
    out: W,
}

impl ProgressReporter<std::io::Stderr> {
    pub fn stderr(issued: Arc<AtomicU64>, total: u64) -> Self {
        Self::new(issued, total, Duration::from_secs(1), std::io::stderr())
    }
}

impl<W: Write + Send + 'static> ProgressReporter<W> {
    pub fn new(issued: Arc<AtomicU64>, total: u64, interval: Duration, out: W) -> Self {
        Self {
            issued,
            total,
            interval,
            out,
        }
    }

    /// Run on a background task. The task exits at the first tick after `cancel`
    /// fires and writes nothing once it has been observed.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        let issued = self.issued.load(Ordering::Relaxed);
                        if let Some(line) = render_progress(issued, self.total) {
                            let _ = self.out.write_all(line.as_bytes());
                            let _ = self.out.flush();
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn render_formats_percentage() {
        assert_eq!(
            render_progress(1, 4).unwrap(),
            "\rProgress: 1 / 4 (25.00%)"
        );
        assert!(render_progress(3, 0).is_none());
    }

    #[tokio::test]
    async fn reporter_ticks_then_stops_on_cancel() {
        let issued = Arc::new(AtomicU64::new(2));
        let buf = SharedBuf::default();
        let cancel = CancellationToken::new();
        let handle = ProgressReporter::new(
            issued.clone(),
            8,
            Duration::from_millis(10),
            buf.clone(),
        )
        .spawn(cancel.clone());

        time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        let written = buf.text();
        assert!(written.contains("Progress: 2 / 8 (25.00%)"));

        let len_after_stop = written.len();
        issued.store(8, Ordering::Relaxed);
        time::sleep(Duration::from_millis(40)).await;
        assert_eq!(buf.text().len(), len_after_stop);
    }

    #[tokio::test]
    async fn cancelled_before_first_tick_writes_nothing() {
        let buf = SharedBuf::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        ProgressReporter::new(
            Arc::new(AtomicU64::new(0)),
            5,
            Duration::from_millis(5),
            buf.clone(),
        )
        .spawn(cancel)
        .await
        .unwrap();
        assert!(buf.text().is_empty());
    }

    #[test]
    fn phase_updates_are_visible() {
        let p = ScanProgress::new();
        let rx = p.subscribe();
        assert_eq!(p.phase(), ScanPhase::Idle);
        p.set_phase(ScanPhase::Running);
        assert_eq!(*rx.borrow(), ScanPhase::Running);
        assert_eq!(p.phase().as_str(), "running");
    }
}
