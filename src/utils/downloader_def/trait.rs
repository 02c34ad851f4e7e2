use std::io::Read;

use thiserror::Error;

use crate::models::manifest::SourceLocator;

/// Per-artifact transfer failures. None of these abort a provisioning run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transfer interrupted: {0}")]
    Transport(String),

    #[error("remote returned HTTP {code} for {url}")]
    Status { code: u16, url: String },

    #[error(
        "remote refused access (HTTP {code}); check the token and accept the license at {repo_url}"
    )]
    Unauthorized { code: u16, repo_url: String },

    /// `total` is the full length from `Content-Range: bytes */<total>`, when sent.
    #[error("remote rejected resume range")]
    RangeNotSatisfiable { total: Option<u64> },

    #[error("transfer ended early: received {received} of {expected} bytes")]
    Truncated { received: u64, expected: u64 },

    #[error("size mismatch: got {actual} bytes, expected {expected}")]
    SizeMismatch { actual: u64, expected: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Whether a partial download is worth keeping for a later resume.
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Truncated { .. })
    }
}

/// Parameters for opening one remote artifact.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub locator: &'a SourceLocator,
    /// Bearer token; only set for artifacts that require authorization.
    pub credential: Option<&'a str>,
    /// Byte offset to resume from; 0 requests the whole file.
    pub offset: u64,
    /// Entity tag the bytes before `offset` were fetched under. The remote
    /// sends the whole file instead of a range when it no longer matches.
    pub validator: Option<&'a str>,
}

/// An open transfer. `total_len` is the full artifact size when the remote announced it.
pub struct RemoteStream {
    pub body: Box<dyn Read + Send>,
    /// True when the remote honored the range and `body` starts at the requested offset.
    pub resumed: bool,
    pub total_len: Option<u64>,
    /// Strong entity tag of the served file, if the remote sent one.
    pub validator: Option<String>,
}

pub trait SourceProvider {
    fn open(&self, request: FetchRequest<'_>) -> Result<RemoteStream, FetchError>;
}
