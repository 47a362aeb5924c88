//! HTTP and WebSocket transport.
//!
//! Thin I/O layer for the collaborators the state machines talk to:
//! [`HttpApi`] fetches history pages and checks clan membership over REST,
//! [`connect`] opens the JSON event channel over a WebSocket. Protocol logic
//! stays in the Sans-IO state machines.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use roomsync_core::{
    MessagePage, RequestError, RoomId, RoomKey, UserId,
    wire::{self, ClientFrame, MembershipResponse, ServerFrame},
};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_tungstenite::{WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

/// Default timeout for REST requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Capacity of the channel frame queues.
const CHANNEL_CAPACITY: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Base URL could not be parsed or converted.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// HTTP client construction failed.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket connection failed.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL of the chat API, e.g. `https://api.example.com/chat`.
    pub base_url: String,
    /// Timeout for REST requests.
    pub request_timeout: Duration,
}

impl TransportConfig {
    /// Configuration with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), request_timeout: DEFAULT_REQUEST_TIMEOUT }
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// WebSocket URL of the event channel for `token`.
    pub fn channel_url(&self, token: &str) -> Result<Url, TransportError> {
        let mut url = Url::parse(&format!("{}/ws", self.base()))
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(TransportError::InvalidUrl(format!(
                    "base url must be http or https, got {other}"
                )));
            },
        };
        url.set_scheme(scheme)
            .map_err(|()| TransportError::InvalidUrl(format!("cannot switch to {scheme}")))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }
}

/// REST client for history pages and membership checks.
#[derive(Debug, Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    config: TransportConfig,
    token: Option<String>,
}

impl HttpApi {
    /// Create a client. `token` is sent as a bearer token when present.
    pub fn new(config: TransportConfig, token: Option<String>) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { http, config, token })
    }

    /// Fetch one page of persisted messages.
    pub async fn fetch_page(&self, room: &RoomKey, page: u32) -> Result<MessagePage, RequestError> {
        let url = format!("{}/{}s/{}/messages", self.config.base(), room.kind, room.id);
        let request = self.authorize(self.http.get(url).query(&[("page", page)]));

        request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(request_error)?
            .json::<MessagePage>()
            .await
            .map_err(request_error)
    }

    /// Check whether `user_id` belongs to clan `clan_id`.
    pub async fn check_membership(&self, user_id: &UserId, clan_id: &RoomId) -> Result<bool, RequestError> {
        let url = format!("{}/clans/{}/members/{}", self.config.base(), clan_id, user_id);
        let request = self.authorize(self.http.get(url));

        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(request_error)?
            .json::<MembershipResponse>()
            .await
            .map_err(request_error)?;
        Ok(response.is_member)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn request_error(err: reqwest::Error) -> RequestError {
    if let Some(status) = err.status() {
        RequestError::Status(status.as_u16())
    } else if err.is_decode() {
        RequestError::Decode(err.to_string())
    } else {
        RequestError::Network(err.to_string())
    }
}

/// Handle to an open event channel.
///
/// Frames are sent/received via the queues; an internal task handles the
/// WebSocket I/O. `from_server` yields `None` once the socket closed.
pub struct ChannelHandle {
    /// Send frames to the server.
    pub to_server: mpsc::Sender<ClientFrame>,
    /// Receive frames from the server.
    pub from_server: mpsc::Receiver<ServerFrame>,
    abort_handle: tokio::task::AbortHandle,
}

impl ChannelHandle {
    /// Stop the channel task, closing the socket.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Open the event channel.
pub async fn connect(config: &TransportConfig, token: &str) -> Result<ChannelHandle, TransportError> {
    let url = config.channel_url(token)?;
    let (socket, _) = connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::Connection(e.to_string()))?;

    let (to_server_tx, to_server_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (from_server_tx, from_server_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let handle = tokio::spawn(run_channel(socket, to_server_rx, from_server_tx));

    Ok(ChannelHandle {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

/// Bridge the frame queues and the socket until either side closes.
async fn run_channel<T>(
    socket: WebSocketStream<T>,
    mut to_server: mpsc::Receiver<ClientFrame>,
    from_server: mpsc::Sender<ServerFrame>,
) where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outgoing = to_server.recv() => {
                let Some(frame) = outgoing else {
                    let _ = sink.close().await;
                    break;
                };
                match wire::encode(&frame) {
                    Ok(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            tracing::warn!(error = %e, "channel send failed");
                            break;
                        }
                    },
                    Err(e) => tracing::warn!(error = %e, "failed to encode frame"),
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match wire::decode(&text) {
                    Ok(frame) => {
                        if from_server.send(frame).await.is_err() {
                            break;
                        }
                    },
                    Err(e) => tracing::warn!(error = %e, "ignoring undecodable frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "channel receive failed");
                    break;
                },
            },
        }
    }

    tracing::debug!("event channel task finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_url_switches_scheme() {
        let config = TransportConfig::new("https://api.example.com/chat/");
        let url = config.channel_url("abc").unwrap();
        assert_eq!(url.as_str(), "wss://api.example.com/chat/ws?token=abc");

        let config = TransportConfig::new("http://localhost:8080");
        assert_eq!(config.channel_url("t").unwrap().as_str(), "ws://localhost:8080/ws?token=t");
    }

    #[test]
    fn channel_url_rejects_other_schemes() {
        let config = TransportConfig::new("ftp://example.com");
        assert!(matches!(config.channel_url("t"), Err(TransportError::InvalidUrl(_))));
    }
}
