//! HTTP collaborators for the search server: ranked search over
//! `GET /api/search` and AI search streams over `GET /api/ai_stream_search`.

use std::{collections::VecDeque, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use reqwest::{header::ACCEPT, Client};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{SearchErrorBody, SearchMode, SearchQuery, SearchResponse},
};
use tracing::{debug, info};
use url::Url;

use crate::{instruction_parser::FrameSource, InstructionTransport, SearchBackend};

const SEARCH_PATH: &str = "api/search";
const AI_STREAM_PATH: &str = "api/ai_stream_search";

fn base_url(server_url: &str) -> Result<Url> {
    let mut url = Url::parse(server_url).with_context(|| format!("invalid server url: {server_url}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("server_url must start with http:// or https://"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub struct HttpSearchBackend {
    http: Client,
    base: Url,
    top_k: u32,
}

impl HttpSearchBackend {
    pub fn new(server_url: &str, top_k: u32, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build search http client")?;
        Ok(Self {
            http,
            base: base_url(server_url)?,
            top_k,
        })
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(&self, query: &str, mode: SearchMode) -> Result<SearchResponse> {
        let url = self.base.join(SEARCH_PATH)?;
        let response = self
            .http
            .get(url)
            .query(&SearchQuery::new(query, mode, self.top_k))
            .send()
            .await
            .context("search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error = match response.json::<SearchErrorBody>().await {
                Ok(body) => ApiError::from_body(status.as_u16(), body),
                Err(_) => ApiError::new(
                    ErrorCode::from_status(status.as_u16()),
                    format!("search request failed with status {status}"),
                ),
            };
            return Err(error.into());
        }

        let body: SearchResponse = response
            .json()
            .await
            .context("invalid search response body")?;
        info!(
            mode = %mode,
            results = body.results.len(),
            search_type = body.search_type.as_deref().unwrap_or_default(),
            "search: response received"
        );
        Ok(body)
    }
}

pub struct HttpInstructionTransport {
    http: Client,
    base: Url,
}

impl HttpInstructionTransport {
    /// No overall timeout is set; a stream lives as long as the server keeps
    /// reasoning. Only connecting is bounded.
    pub fn new(server_url: &str, connect_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("failed to build stream http client")?;
        Ok(Self {
            http,
            base: base_url(server_url)?,
        })
    }
}

#[async_trait]
impl InstructionTransport for HttpInstructionTransport {
    async fn open(&self, query: &str) -> Result<Box<dyn FrameSource>> {
        let url = self.base.join(AI_STREAM_PATH)?;
        let response = self
            .http
            .get(url)
            .query(&[("query", query)])
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .context("failed to open instruction stream")?
            .error_for_status()
            .context("instruction stream rejected")?;
        debug!(query, "stream: opened");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(Box::new(HttpFrameSource::new(body)))
    }
}

/// Frames decoded from a `text/event-stream` response body.
pub struct HttpFrameSource {
    body: Option<BoxStream<'static, reqwest::Result<Vec<u8>>>>,
    decoder: SseFrameDecoder,
    pending: VecDeque<String>,
}

impl HttpFrameSource {
    fn new(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> Self {
        Self {
            body: Some(body),
            decoder: SseFrameDecoder::default(),
            pending: VecDeque::new(),
        }
    }
}

#[async_trait]
impl FrameSource for HttpFrameSource {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(Ok(frame));
            }
            let body = self.body.as_mut()?;
            match body.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.decoder.push(&chunk)),
                Some(Err(err)) => {
                    self.body = None;
                    return Some(Err(anyhow::Error::new(err).context("instruction stream interrupted")));
                }
                None => {
                    self.body = None;
                    return self.decoder.finish().map(Ok);
                }
            }
        }
    }

    async fn close(&mut self) {
        if self.body.take().is_some() {
            debug!("stream: closed");
        }
        self.pending.clear();
    }
}

/// Incremental `text/event-stream` decoder yielding the data of each event.
///
/// Events end at a blank line; `data:` lines are joined with `\n` after one
/// optional leading space is stripped. Comment lines and other fields are
/// ignored. Bytes are buffered until an event is complete, so multi-byte
/// characters split across chunks decode intact.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: Vec<u8>,
}

impl SseFrameDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some((end, separator)) = event_boundary(&self.buffer) {
            let event: Vec<u8> = self.buffer.drain(..end + separator).collect();
            if let Some(frame) = decode_event(&event[..end]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flushes a final event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        decode_event(&rest)
    }
}

fn event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    [&b"\r\n\r\n"[..], b"\n\n", b"\r\r"]
        .into_iter()
        .filter_map(|separator| {
            buffer
                .windows(separator.len())
                .position(|window| window == separator)
                .map(|at| (at, separator.len()))
        })
        .min_by_key(|(at, _)| *at)
}

fn decode_event(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut data: Option<String> = None;
    for line in text.split(['\n', '\r']) {
        let value = if let Some(rest) = line.strip_prefix("data:") {
            rest.strip_prefix(' ').unwrap_or(rest)
        } else if line == "data" {
            ""
        } else {
            continue;
        };
        match data.as_mut() {
            Some(joined) => {
                joined.push('\n');
                joined.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }
    data
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
