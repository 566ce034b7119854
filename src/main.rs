use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use tracing::info;

use dirber_rs::probe::Prober;
use dirber_rs::types::ScanReport;
use dirber_rs::{logging, server, wordlist, CandidateSet, ScanOptions, Scanner};

/// dirber-rs — Fast async web content discovery with wildcard detection.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dirber-rs",
    version,
    about = "Fast async web content discovery with wildcard detection.",
    long_about = None
)]
struct Cli {
    /// Base URL to scan (e.g., https://example.com/).
    #[arg(long, short = 'u')]
    url: Option<String>,

    /// Path to the wordlist (one path segment per line; lines containing `#` are skipped).
    #[arg(long, short = 'w')]
    wordlist: Option<PathBuf>,

    /// Path to extension templates; `%` is replaced with the word (e.g. `%.php`).
    #[arg(long)]
    extensions: Option<PathBuf>,

    /// Path to status codes that mark a wildcard response (one per line).
    #[arg(long = "status-codes")]
    status_codes: Option<PathBuf>,

    /// Number of parallel workers.
    #[arg(long, short = 't', default_value_t = 10)]
    threads: usize,

    /// Per-request timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 10_000)]
    timeout_ms: u64,

    /// Follow redirects instead of reporting the first hop.
    #[arg(long = "follow-redirects", default_value_t = false)]
    follow_redirects: bool,

    /// Count body length when the server does not declare one.
    #[arg(long = "include-length", default_value_t = false)]
    include_length: bool,

    /// Skip TLS certificate verification.
    #[arg(long, short = 'k', default_value_t = false)]
    insecure: bool,

    /// Continue on wildcard targets, hiding responses with the wildcard length.
    #[arg(long = "ignore-wildcard", default_value_t = false)]
    ignore_wildcard: bool,

    /// Also probe every extension template for each word.
    #[arg(long = "search-extensions", short = 'x', default_value_t = false)]
    search_extensions: bool,

    /// Upstream proxy URL (http, https or socks5).
    #[arg(long)]
    proxy: Option<String>,

    /// Cookie header value sent with every request.
    #[arg(long)]
    cookies: Option<String>,

    /// Do not draw the progress line.
    #[arg(long = "no-progress", default_value_t = false)]
    no_progress: bool,

    /// Write the report as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Serve the control API on this address instead of scanning (e.g. 127.0.0.1:8080).
    #[arg(long)]
    serve: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize_logging(cli.verbose)?;

    if let Some(bind) = cli.serve.as_deref() {
        let bind = bind.to_string();
        tokio::spawn(async move {
            if let Err(e) = server::spawn_server(&bind).await {
                tracing::error!(error = %e, "control API server error");
            }
        });
        info!("press Ctrl+C to stop the server");
        let _ = tokio::signal::ctrl_c().await;
        return Ok(());
    }

    let (Some(url), Some(wordlist_path)) = (cli.url.as_deref(), cli.wordlist.as_deref()) else {
        bail!("--url and --wordlist are required unless --serve is given");
    };

    let words = wordlist::load_words_from_path(wordlist_path)?;
    let extensions = match cli.extensions.as_deref() {
        Some(p) => wordlist::load_extensions_from_path(p)?,
        None => Vec::new(),
    };
    if cli.search_extensions && extensions.is_empty() {
        bail!("--search-extensions needs a non-empty --extensions file");
    }
    let status_codes = match cli.status_codes.as_deref() {
        Some(p) => wordlist::load_status_codes_from_path(p)?,
        None => wordlist::default_status_codes(),
    };

    let options = ScanOptions {
        threads: cli.threads,
        timeout: Duration::from_millis(cli.timeout_ms),
        follow_redirects: cli.follow_redirects,
        include_length: cli.include_length,
        insecure_tls: cli.insecure,
        proxy: cli.proxy.clone(),
        cookies: cli.cookies.clone(),
        ignore_wildcard: cli.ignore_wildcard,
        search_extensions: cli.search_extensions,
        show_progress: !cli.no_progress,
    };

    let mut headers = HeaderMap::new();
    if let Some(cookies) = options.cookies.as_deref() {
        let value = HeaderValue::from_str(cookies).context("cookie string is not a valid header value")?;
        headers.insert(COOKIE, value);
    }
    let prober = Prober::with_headers(&options, headers)?;

    let candidates = CandidateSet::new(words, extensions);
    let scanner = Scanner::with_prober(options, candidates, status_codes, prober)?;

    let cancel = tokio_util::sync::CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let report = scanner.scan_with_cancel(url, cancel).await?;
    print_results_table(&report);

    if let Some(path) = cli.output.as_deref() {
        write_report_json(path, &report)
            .with_context(|| format!("failed to write JSON to {}", path.display()))?;
        info!(path = %path.display(), "wrote JSON report");
    }

    Ok(())
}

fn print_results_table(report: &ScanReport) {
    let mut entity_w = "path".len();
    for r in &report.results {
        entity_w = entity_w.max(r.entity.len() + 1);
    }
    let status_w = "status".len();
    let size_w = 8usize;

    println!(
        "\nFound: {} (words: {}/{}, errors: {})",
        report.results.len(),
        report.words_issued,
        report.words_total,
        report.error_count
    );
    println!(
        "{:<entity_w$}  {:>status_w$}  {:>size_w$}",
        "path", "status", "size"
    );
    println!("{:-<entity_w$}  {:-<status_w$}  {:-<size_w$}", "", "", "");
    for r in &report.results {
        println!(
            "{:<entity_w$}  {:>status_w$}  {:>size_w$}",
            format!("/{}", r.entity),
            r.status,
            r.size.to_string()
        );
    }
}

fn write_report_json(path: &std::path::Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
