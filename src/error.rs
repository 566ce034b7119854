use thiserror::Error;

/// Failure of a single probe. Never fatal to a running scan.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("malformed url {url}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid certificate for {url}")]
    Certificate {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ProbeError {
    pub fn url(&self) -> &str {
        match self {
            ProbeError::MalformedUrl { url, .. }
            | ProbeError::Certificate { url, .. }
            | ProbeError::Transport { url, .. } => url,
        }
    }
}

/// Errors that stop a scan (or prevent it from starting).
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("unable to connect to {url}")]
    Connect {
        url: String,
        #[source]
        source: ProbeError,
    },

    #[error("wildcard check request failed")]
    WildcardProbe(#[source] ProbeError),

    #[error("wildcard response found: {url} => {status}")]
    Wildcard { url: String, status: u16 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("proxy url {proxy} is invalid")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),

    #[error("scan task failed")]
    Task(#[from] tokio::task::JoinError),

    #[error("scan cancelled during setup")]
    Cancelled,
}

/// Render an error with every cause in its source chain, `outer: cause: root`.
///
/// reqwest only shows its top level in `Display`; the useful part (refused
/// connection, failed certificate check) lives further down the chain.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
