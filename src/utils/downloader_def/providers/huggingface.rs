use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, ClientBuilder, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, ETAG, IF_RANGE, RANGE};
use tracing::debug;

use crate::models::manifest::SourceLocator;
use crate::utils::downloader_def::r#trait::{FetchError, FetchRequest, RemoteStream, SourceProvider};
use crate::utils::errors::{ResultTrait as _, ResultWithError};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

lazy_static! {
    static ref CONTENT_RANGE_RE: Regex = Regex::new(r"^bytes (\d+)-(\d+)/(\d+|\*)$").unwrap();
    static ref UNSATISFIED_RANGE_RE: Regex = Regex::new(r"^bytes \*/(\d+)$").unwrap();
}

/// Fetches files through the Hub's `resolve` endpoint.
#[derive(Debug)]
pub struct HuggingFaceSourceProvider {
    client: Client,
    endpoint: Url,
}

impl HuggingFaceSourceProvider {
    pub fn new(endpoint: &str, connect_timeout: Duration) -> ResultWithError<Self> {
        Self::with_builder(endpoint, Client::builder().connect_timeout(connect_timeout))
    }

    fn with_builder(endpoint: &str, builder: ClientBuilder) -> ResultWithError<Self> {
        let endpoint = Url::parse(endpoint).auto_err("Invalid Hugging Face endpoint")?;
        let client = builder
            .user_agent(concat!("comfy-provision/", env!("CARGO_PKG_VERSION")))
            // Multi-gigabyte bodies; only the connect phase is bounded.
            .timeout(None::<Duration>)
            .build()
            .auto_err("Failed to create HTTP client")?;

        Ok(Self { client, endpoint })
    }

    pub fn file_url(&self, locator: &SourceLocator) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(locator.repo_id.split('/'))
                .push("resolve")
                .push(&locator.revision)
                .extend(locator.path.split('/'));
        }
        url
    }

    fn repo_url(&self, locator: &SourceLocator) -> String {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(locator.repo_id.split('/'));
        }
        url.to_string()
    }

    fn apply_auth(&self, req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        if let Some(tok) = token {
            req.header(AUTHORIZATION, format!("Bearer {}", tok))
        } else {
            req
        }
    }

    /// Parses `bytes <start>-<end>/<total>` into `(start, total)`.
    pub fn parse_content_range(value: &str) -> Option<(u64, Option<u64>)> {
        let caps = CONTENT_RANGE_RE.captures(value.trim())?;
        let start = caps[1].parse().ok()?;
        let total = caps[3].parse().ok();
        Some((start, total))
    }

    /// Parses the `bytes */<total>` form sent with a 416.
    pub fn parse_unsatisfied_range(value: &str) -> Option<u64> {
        let caps = UNSATISFIED_RANGE_RE.captures(value.trim())?;
        caps[1].parse().ok()
    }

    fn content_range(resp: &Response) -> Option<&str> {
        resp.headers().get(CONTENT_RANGE).and_then(|v| v.to_str().ok())
    }

    /// Strong `ETag` of the response. Weak tags cannot guard a byte range.
    fn validator(resp: &Response) -> Option<String> {
        resp.headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty() && !v.starts_with("W/"))
            .map(str::to_string)
    }

    fn resumed_stream(&self, resp: Response, offset: u64) -> Result<RemoteStream, FetchError> {
        let content_range = Self::content_range(&resp).and_then(Self::parse_content_range);

        let total_len = match content_range {
            Some((start, _)) if start != offset => {
                return Err(FetchError::Transport(format!(
                    "remote resumed at byte {start}, expected {offset}"
                )));
            }
            Some((_, Some(total))) => Some(total),
            _ => resp.content_length().map(|len| offset + len),
        };

        Ok(RemoteStream {
            validator: Self::validator(&resp),
            body: Box::new(resp),
            resumed: true,
            total_len,
        })
    }
}

impl SourceProvider for HuggingFaceSourceProvider {
    fn open(&self, request: FetchRequest<'_>) -> Result<RemoteStream, FetchError> {
        let url = self.file_url(request.locator);
        debug!("GET {} (offset {})", url, request.offset);

        let mut req = self.client.get(url.clone());
        req = self.apply_auth(req, request.credential);
        if request.offset > 0 {
            req = req.header(RANGE, format!("bytes={}-", request.offset));
            if let Some(validator) = request.validator {
                req = req.header(IF_RANGE, validator);
            }
        }

        let resp = req
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => Ok(RemoteStream {
                total_len: resp.content_length(),
                validator: Self::validator(&resp),
                body: Box::new(resp),
                resumed: false,
            }),
            StatusCode::PARTIAL_CONTENT if request.offset > 0 => {
                self.resumed_stream(resp, request.offset)
            }
            StatusCode::RANGE_NOT_SATISFIABLE => Err(FetchError::RangeNotSatisfiable {
                total: Self::content_range(&resp).and_then(Self::parse_unsatisfied_range),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::Unauthorized {
                code: resp.status().as_u16(),
                repo_url: self.repo_url(request.locator),
            }),
            status => Err(FetchError::Status {
                code: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}
