use rand::Rng;
use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::{redirect, Client, Proxy, Response, Url};
use tracing::trace;

use crate::error::{ProbeError, ScanError};
use crate::options::ScanOptions;
use crate::types::ResponseSize;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.51",
];

/// Pick a User-Agent from the pool, independently on every call.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS[rand::thread_rng().gen_range(0..USER_AGENTS.len())]
}

/// Issues single classified GET requests.
///
/// Cheap to clone: the underlying connection pool is shared between clones.
#[derive(Clone, Debug)]
pub struct Prober {
    client: Client,
    include_length: bool,
}

impl Prober {
    pub fn new(options: &ScanOptions) -> Result<Self, ScanError> {
        Self::with_headers(options, HeaderMap::new())
    }

    /// Build a prober that sends `headers` with every request (e.g. a `Cookie`).
    pub fn with_headers(options: &ScanOptions, headers: HeaderMap) -> Result<Self, ScanError> {
        let redirect_policy = if options.follow_redirects {
            redirect::Policy::limited(10)
        } else {
            redirect::Policy::none()
        };

        let mut builder = Client::builder()
            .default_headers(headers)
            .redirect(redirect_policy)
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_tls);

        if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = Proxy::all(proxy).map_err(|e| ScanError::InvalidProxy {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(ScanError::Client)?;
        Ok(Self {
            client,
            include_length: options.include_length,
        })
    }

    /// GET `url` and return its status code and size.
    ///
    /// The body is always read to the end so the connection can go back to the pool.
    pub async fn probe(&self, url: &str) -> Result<(u16, ResponseSize), ProbeError> {
        let parsed = Url::parse(url).map_err(|source| ProbeError::MalformedUrl {
            url: url.to_string(),
            source,
        })?;

        let mut response = self
            .client
            .get(parsed)
            .header(USER_AGENT, random_user_agent())
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status().as_u16();
        let size = match response.content_length().filter(|&n| n > 0) {
            Some(declared) => {
                drain(&mut response).await.map_err(|e| classify(url, e))?;
                ResponseSize::Measured(declared)
            }
            None if self.include_length => {
                let body = response.bytes().await.map_err(|e| classify(url, e))?;
                ResponseSize::Measured(count_codepoints(&body))
            }
            None => {
                drain(&mut response).await.map_err(|e| classify(url, e))?;
                ResponseSize::NotMeasured
            }
        };

        trace!(url, status, %size, "probe complete");
        Ok((status, size))
    }
}

/// Number of codepoints in `body`, counting every byte of an invalid or
/// truncated UTF-8 sequence as one.
pub fn count_codepoints(body: &[u8]) -> u64 {
    body.utf8_chunks()
        .map(|chunk| chunk.valid().chars().count() + chunk.invalid().len())
        .sum::<usize>() as u64
}

async fn drain(response: &mut Response) -> Result<(), reqwest::Error> {
    while response.chunk().await?.is_some() {}
    Ok(())
}

fn classify(url: &str, err: reqwest::Error) -> ProbeError {
    if is_certificate_error(&err) {
        ProbeError::Certificate {
            url: url.to_string(),
            source: err,
        }
    } else {
        ProbeError::Transport {
            url: url.to_string(),
            source: err,
        }
    }
}

fn is_certificate_error(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(tls) = cause.downcast_ref::<native_tls::Error>() {
            return mentions_certificate(&tls.to_string());
        }
        if mentions_certificate(&cause.to_string()) {
            return true;
        }
        source = cause.source();
    }
    false
}

fn mentions_certificate(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    ["certificate", "x509", "cert verify"]
        .iter()
        .any(|needle| msg.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_fails_before_io() {
        let prober = Prober::new(&ScanOptions::default()).unwrap();
        let err = prober.probe("not a url").await.unwrap_err();
        assert!(matches!(err, ProbeError::MalformedUrl { .. }));
        assert_eq!(err.url(), "not a url");
    }

    #[test]
    fn random_user_agent_comes_from_pool() {
        for _ in 0..32 {
            assert!(USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[test]
    fn invalid_utf8_bytes_count_one_each() {
        assert_eq!(count_codepoints("héllo".as_bytes()), 5);
        // `€` is e2 82 ac; a body cut after two bytes holds two invalid bytes.
        assert_eq!(count_codepoints(b"ab\xe2\x82"), 4);
        assert_eq!(count_codepoints(b"\xff\xfex"), 3);
        assert_eq!(count_codepoints(b""), 0);
    }

    #[test]
    fn certificate_messages_detected() {
        assert!(mentions_certificate(
            "error:0A000086:SSL routines:tls_post_process_server_certificate:certificate verify failed"
        ));
        assert!(mentions_certificate("x509: certificate signed by unknown authority"));
        assert!(!mentions_certificate("connection refused"));
    }
}
