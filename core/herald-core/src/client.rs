//! Remote banner client.
//!
//! Two modes: a one-shot `get_banners` round trip, and a long-lived
//! `subscribe_banners` connection that yields full batches. The client never
//! retries or reconnects on its own; reconnection is the caller's decision.
//!
//! A [`Subscription`] owns its reader task. Closing it (explicitly or by
//! dropping it) aborts the reader and discards anything still buffered, so a
//! closed subscription can never deliver another event.

use crate::config::HeraldConfig;
use crate::error::{HeraldError, Result};
use crate::storage::{resolve_socket_path, StorageConfig};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use herald_protocol::{
    parse_response, parse_stream_message, Banner, BannersData, BannersParams, ClientContext,
    ErrorInfo, Method, Request, Response, StreamMessage, MAX_MESSAGE_BYTES,
};
use rand::RngCore;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const STREAM_BUFFER: usize = 16;
const CLIENT_NAME: &str = concat!("herald/", env!("CARGO_PKG_VERSION"));

/// One item delivered by a live subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A full batch of remote banners for the current moment.
    Batch(Vec<Banner>),
    /// An error notice from the service. The stream stays open.
    Notice(String),
    /// A line that could not be parsed. The stream stays open.
    Malformed(String),
    /// The channel failed or was closed by the service. Always the last event.
    Dropped(String),
}

/// Receiving end of a live banner subscription.
pub struct Subscription {
    events: mpsc::Receiver<StreamEvent>,
    reader: Option<JoinHandle<()>>,
    closed: bool,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<StreamEvent>, reader: Option<JoinHandle<()>>) -> Self {
        Self {
            events,
            reader,
            closed: false,
        }
    }

    /// A subscription fed by hand. Used by in-process sources and tests.
    pub fn channel(capacity: usize) -> (mpsc::Sender<StreamEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx, None))
    }

    /// Next event; `None` once closed or once the sender side is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    /// Next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        if self.closed {
            return None;
        }
        self.events.try_recv().ok()
    }

    /// Releases the connection. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.events.close();
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// The remote side of the reconciliation: a banner service.
#[async_trait]
pub trait BannerSource: Send + Sync {
    /// One-shot fetch. Sends the local candidates and a context snapshot.
    async fn fetch(&self, local: &[Banner], context: &ClientContext) -> Result<Vec<Banner>>;

    /// Opens a live subscription.
    async fn subscribe(&self) -> Result<Subscription>;

    /// Describes where this source lives, for the context snapshot.
    fn endpoint(&self) -> String {
        String::new()
    }
}

/// Builds the context snapshot sent with a one-shot fetch.
pub fn client_context(endpoint: &str) -> ClientContext {
    let hostname = std::env::var("HOSTNAME")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    ClientContext {
        client: CLIENT_NAME.to_string(),
        hostname,
        platform: std::env::consts::OS.to_string(),
        endpoint: endpoint.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        extra: Map::new(),
    }
}

/// Banner service reached over its Unix socket (newline-delimited JSON).
#[derive(Debug, Clone)]
pub struct SocketBannerClient {
    socket: PathBuf,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl SocketBannerClient {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        let defaults = HeraldConfig::default();
        Self {
            socket: socket.into(),
            connect_timeout: defaults.connect_timeout(),
            request_timeout: defaults.request_timeout(),
        }
    }

    pub fn from_config(storage: &StorageConfig, config: &HeraldConfig) -> Self {
        let socket = resolve_socket_path(storage, config.socket_path.as_deref());
        Self::new(socket).with_timeouts(config.connect_timeout(), config.request_timeout())
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket
    }

    /// Asks the service whether it is up. Returns the `data` payload.
    pub async fn health(&self) -> Result<Value> {
        let request = Request::new(Method::GetHealth, Some(make_request_id(Method::GetHealth)), None);
        let response = self.round_trip(&request).await?;
        Ok(response.data.unwrap_or(Value::Null))
    }

    async fn connect(&self) -> Result<UnixStream> {
        match tokio::time::timeout(self.connect_timeout, UnixStream::connect(&self.socket)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(err)) => Err(HeraldError::RemoteUnavailable(format!(
                "failed to connect to {}: {}",
                self.socket.display(),
                err
            ))),
            Err(_) => Err(HeraldError::RemoteUnavailable(format!(
                "timed out connecting to {}",
                self.socket.display()
            ))),
        }
    }

    async fn round_trip(&self, request: &Request) -> Result<Response> {
        let exchange = async {
            let mut stream = self.connect().await?;
            write_request(&mut stream, request).await?;
            let mut reader = BufReader::new(stream);
            read_message(&mut reader).await?.ok_or_else(|| {
                HeraldError::RemoteUnavailable("connection closed before a response".to_string())
            })
        };
        let line = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| {
                HeraldError::RemoteUnavailable(format!(
                    "{} timed out after {}ms",
                    request.method.as_str(),
                    self.request_timeout.as_millis()
                ))
            })??;

        let response =
            parse_response(&line).map_err(|info| HeraldError::MalformedMessage(info.message))?;
        if !response.ok {
            return Err(HeraldError::Protocol(response.error.unwrap_or_else(|| {
                ErrorInfo::new("unknown_error", "service reported failure without details")
            })));
        }
        Ok(response)
    }
}

#[async_trait]
impl BannerSource for SocketBannerClient {
    async fn fetch(&self, local: &[Banner], context: &ClientContext) -> Result<Vec<Banner>> {
        let params = BannersParams {
            banners: local.to_vec(),
            context: context.clone(),
        };
        let params = serde_json::to_value(&params).map_err(|source| HeraldError::Json {
            context: "serialize get_banners params".to_string(),
            source,
        })?;
        let request = Request::new(
            Method::GetBanners,
            Some(make_request_id(Method::GetBanners)),
            Some(params),
        );

        let response = self.round_trip(&request).await?;
        let data = match response.data {
            Some(data) => serde_json::from_value::<BannersData>(data).map_err(|source| {
                HeraldError::Json {
                    context: "get_banners response".to_string(),
                    source,
                }
            })?,
            None => BannersData::default(),
        };
        debug!(count = data.banners.len(), "Fetched remote banners");
        Ok(data.banners)
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let request = Request::new(
            Method::SubscribeBanners,
            Some(make_request_id(Method::SubscribeBanners)),
            None,
        );
        let mut stream = self.connect().await?;
        tokio::time::timeout(self.request_timeout, write_request(&mut stream, &request))
            .await
            .map_err(|_| {
                HeraldError::RemoteUnavailable("timed out sending subscribe request".to_string())
            })??;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let reader = tokio::spawn(forward_stream(BufReader::new(stream), tx));
        debug!(socket = %self.socket.display(), "Banner stream opened");
        Ok(Subscription::new(rx, Some(reader)))
    }

    fn endpoint(&self) -> String {
        self.socket.to_string_lossy().to_string()
    }
}

async fn write_request(stream: &mut UnixStream, request: &Request) -> Result<()> {
    let mut payload = serde_json::to_vec(request).map_err(|source| HeraldError::Json {
        context: "serialize request".to_string(),
        source,
    })?;
    payload.push(b'\n');
    stream
        .write_all(&payload)
        .await
        .map_err(|err| HeraldError::RemoteUnavailable(format!("failed to write request: {}", err)))?;
    stream
        .flush()
        .await
        .map_err(|err| HeraldError::RemoteUnavailable(format!("failed to flush request: {}", err)))
}

/// Reads one newline-terminated message. `Ok(None)` at a clean EOF.
async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer = Vec::new();
    let limit = (MAX_MESSAGE_BYTES + 1) as u64;
    let read = AsyncReadExt::take(&mut *reader, limit)
        .read_until(b'\n', &mut buffer)
        .await
        .map_err(|err| HeraldError::StreamTransport(format!("failed to read: {}", err)))?;

    if read == 0 {
        return Ok(None);
    }
    if buffer.len() > MAX_MESSAGE_BYTES {
        return Err(HeraldError::StreamTransport(
            "message exceeded maximum size".to_string(),
        ));
    }
    while matches!(buffer.last(), Some(b'\n' | b'\r')) {
        buffer.pop();
    }
    Ok(Some(buffer))
}

async fn forward_stream<R>(mut reader: R, events: mpsc::Sender<StreamEvent>)
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let event = match read_message(&mut reader).await {
            Ok(Some(line)) if line.iter().all(|b| b.is_ascii_whitespace()) => continue,
            Ok(Some(line)) => classify_line(&line),
            Ok(None) => StreamEvent::Dropped("banner service closed the stream".to_string()),
            Err(err) => StreamEvent::Dropped(err.to_string()),
        };
        let terminal = matches!(event, StreamEvent::Dropped(_));
        if events.send(event).await.is_err() || terminal {
            break;
        }
    }
}

fn classify_line(line: &[u8]) -> StreamEvent {
    // The service rejects a subscription with a regular error response.
    if let Ok(response) = serde_json::from_slice::<Response>(line) {
        if !response.ok {
            let reason = response
                .error
                .map(|info| info.to_string())
                .unwrap_or_else(|| "subscription rejected".to_string());
            return StreamEvent::Dropped(reason);
        }
    }
    match parse_stream_message(line) {
        Ok(StreamMessage::Banners { banners }) => StreamEvent::Batch(banners),
        Ok(StreamMessage::Error { error }) => StreamEvent::Notice(error),
        Err(info) => StreamEvent::Malformed(info.message),
    }
}

fn make_request_id(method: Method) -> String {
    let mut random = rand::thread_rng();
    format!(
        "{}-{}-{:x}",
        method.as_str(),
        std::process::id(),
        random.next_u64()
    )
}
