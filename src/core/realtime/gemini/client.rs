//! Gemini Live client implementation.
//!
//! Implements [`LiveTransport`] over the Live API WebSocket.
//!
//! # API Reference
//!
//! - Endpoint: Vertex AI `LlmBidiService/BidiGenerateContent` or the Developer
//!   API `GenerativeService.BidiGenerateContent`
//! - Protocol: WebSocket with JSON messages, in text or binary frames
//! - Audio: PCM 16-bit mono little-endian, base64 encoded; 24kHz output
//!
//! # Example
//!
//! ```rust,ignore
//! use live_transcript::core::realtime::{GeminiLiveClient, GeminiLiveConfig, LiveTransport};
//!
//! let client = GeminiLiveClient::connect(GeminiLiveConfig {
//!     project_id: Some("my-project".to_string()),
//!     access_token: Some(token.into()),
//!     ..Default::default()
//! })
//! .await?;
//!
//! client.send_turn("Tell me a story").await?;
//! while let Some(event) = client.next_event().await? {
//!     println!("{:?}", event);
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::config::GeminiLiveConfig;
use super::messages::{ClientMessage, ServerMessage};
use crate::core::realtime::base::{
    ConnectionState, LiveEvent, LiveTransport, RealtimeError, RealtimeResult,
};

/// Channel capacity for outgoing messages and decoded events.
const WS_CHANNEL_CAPACITY: usize = 256;

/// How long `close` waits for the connection task to say goodbye.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Whether a setup rejection is the server refusing the transcription model
/// field, which some deployments do not accept.
pub fn is_transcription_model_rejection(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    reason.contains("unknown name \"model\"")
        && (reason.contains("input_audio_transcription")
            || reason.contains("output_audio_transcription"))
}

// =============================================================================
// Gemini Live Client
// =============================================================================

/// Gemini Live API client.
///
/// A single spawned task owns the socket. Outgoing messages reach it through
/// an mpsc channel, so every message is written as one whole frame; decoded
/// events come back through a second channel drained by
/// [`LiveTransport::next_event`].
pub struct GeminiLiveClient {
    config: GeminiLiveConfig,
    state: Arc<RwLock<ConnectionState>>,
    connected: Arc<AtomicBool>,
    ws_sender: Mutex<Option<mpsc::Sender<ClientMessage>>>,
    events: Mutex<mpsc::Receiver<RealtimeResult<LiveEvent>>>,
    connection_handle: Mutex<Option<JoinHandle<()>>>,
}

impl GeminiLiveClient {
    /// Open the socket, send setup and wait for it to be acknowledged.
    ///
    /// If the server rejects the transcription model and fallback is enabled,
    /// setup is retried once with the server's default transcriber.
    pub async fn connect(config: GeminiLiveConfig) -> RealtimeResult<Self> {
        config.validate()?;

        info!(
            backend = %config.backend,
            project = config.project_id.as_deref().unwrap_or("-"),
            location = %config.location,
            model = %config.model,
            "Connecting to Gemini Live"
        );
        if let Some(model) = &config.transcription_model {
            info!("Transcription model requested for input/output: {}", model);
        }

        let (config, session) = match Self::open_session(&config).await {
            Ok(session) => (config, session),
            Err(RealtimeError::SetupRejected(reason))
                if config.fallback_to_default_transcription
                    && config.transcription_model.is_some()
                    && is_transcription_model_rejection(&reason) =>
            {
                warn!(
                    "Server rejected the transcription model ({}), retrying with default transcription",
                    reason
                );
                let fallback = config.without_transcription_model();
                let session = Self::open_session(&fallback).await?;
                (fallback, session)
            }
            Err(e) => return Err(e),
        };

        Ok(Self::start(config, session))
    }

    async fn open_session(config: &GeminiLiveConfig) -> RealtimeResult<(WsSink, WsSource, Vec<LiveEvent>)> {
        let url = config.websocket_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        if let Some(auth) = config.authorization_header() {
            let value = HeaderValue::from_str(&auth)
                .map_err(|e| RealtimeError::AuthenticationFailed(e.to_string()))?;
            request.headers_mut().insert(http::header::AUTHORIZATION, value);
        }

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let (mut sink, mut stream) = ws_stream.split();

        let setup = ClientMessage::setup(config).to_json()?;
        sink.send(Message::Text(setup.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;

        let leftover = tokio::time::timeout(config.setup_timeout, Self::await_setup_complete(&mut sink, &mut stream))
            .await
            .map_err(|_| {
                RealtimeError::Timeout(format!(
                    "no setupComplete within {}ms",
                    config.setup_timeout.as_millis()
                ))
            })??;

        info!("Connected to Gemini Live");
        Ok((sink, stream, leftover))
    }

    /// Read frames until `setupComplete`. Returns any other events that
    /// arrived in the same frame.
    async fn await_setup_complete(sink: &mut WsSink, stream: &mut WsSource) -> RealtimeResult<Vec<LiveEvent>> {
        while let Some(frame) = stream.next().await {
            let payload = match frame {
                Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_str().as_bytes()),
                Ok(Message::Binary(data)) => data,
                Ok(Message::Ping(data)) => {
                    let _ = sink.send(Message::Pong(data)).await;
                    continue;
                }
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| format!("{}: {}", u16::from(f.code), f.reason.as_str()))
                        .unwrap_or_else(|| "closed without reason".to_string());
                    return Err(RealtimeError::SetupRejected(reason));
                }
                Ok(_) => continue,
                Err(e) => return Err(RealtimeError::ConnectionFailed(e.to_string())),
            };

            let message = ServerMessage::parse(&payload)?;
            let mut events = message.into_events();
            if let Some(pos) = events.iter().position(|e| *e == LiveEvent::SetupComplete) {
                return Ok(events.split_off(pos + 1));
            }
            debug!("Ignoring {} event(s) received before setupComplete", events.len());
        }
        Err(RealtimeError::SetupRejected(
            "connection closed before setup completed".to_string(),
        ))
    }

    fn start(config: GeminiLiveConfig, session: (WsSink, WsSource, Vec<LiveEvent>)) -> Self {
        let (mut ws_sink, mut ws_stream, leftover) = session;
        let (tx, mut rx) = mpsc::channel::<ClientMessage>(WS_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel::<RealtimeResult<LiveEvent>>(WS_CHANNEL_CAPACITY);

        let state = Arc::new(RwLock::new(ConnectionState::Connected));
        let connected = Arc::new(AtomicBool::new(true));
        let task_state = state.clone();
        let task_connected = connected.clone();

        let handle = tokio::spawn(async move {
            for event in leftover {
                if events_tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }

            loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        let Some(message) = outgoing else {
                            let _ = ws_sink.send(Message::Close(None)).await;
                            debug!("Sender dropped, closing Gemini Live socket");
                            break;
                        };
                        let json = match message.to_json() {
                            Ok(j) => j,
                            Err(e) => {
                                error!("Failed to serialize message: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send WebSocket message: {}", e);
                            let _ = events_tx.send(Err(RealtimeError::WebSocketError(e.to_string()))).await;
                            break;
                        }
                    }

                    incoming = ws_stream.next() => {
                        let payload = match incoming {
                            Some(Ok(Message::Text(text))) => Bytes::copy_from_slice(text.as_str().as_bytes()),
                            Some(Ok(Message::Binary(data))) => data,
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                                continue;
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!("WebSocket closed by server: {:?}", frame);
                                break;
                            }
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                let _ = events_tx.send(Err(RealtimeError::WebSocketError(e.to_string()))).await;
                                break;
                            }
                            None => break,
                        };

                        match ServerMessage::parse(&payload) {
                            Ok(message) => {
                                for event in message.into_events() {
                                    if events_tx.send(Ok(event)).await.is_err() {
                                        debug!("Event receiver dropped");
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("Failed to parse server message: {} - {}", e, String::from_utf8_lossy(&payload));
                            }
                        }
                    }
                }
            }

            task_connected.store(false, Ordering::SeqCst);
            *task_state.write() = ConnectionState::Disconnected;
        });

        Self {
            config,
            state,
            connected,
            ws_sender: Mutex::new(Some(tx)),
            events: Mutex::new(events_rx),
            connection_handle: Mutex::new(Some(handle)),
        }
    }

    /// Configuration the session was actually opened with (after any
    /// transcription fallback).
    pub fn config(&self) -> &GeminiLiveConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_message(&self, message: ClientMessage) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        let sender = self.ws_sender.lock().await.clone();
        if let Some(sender) = sender {
            sender
                .send(message)
                .await
                .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
        } else {
            Err(RealtimeError::NotConnected)
        }
    }
}

#[async_trait]
impl LiveTransport for GeminiLiveClient {
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()> {
        self.send_message(ClientMessage::audio(&audio, self.config.input_sample_rate))
            .await
    }

    async fn send_turn(&self, text: &str) -> RealtimeResult<()> {
        self.send_message(ClientMessage::user_turn(text)).await
    }

    async fn send_audio_stream_end(&self) -> RealtimeResult<()> {
        self.send_message(ClientMessage::audio_stream_end()).await
    }

    async fn next_event(&self) -> RealtimeResult<Option<LiveEvent>> {
        self.events.lock().await.recv().await.transpose()
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }

    async fn close(&self) -> RealtimeResult<()> {
        // Dropping the sender makes the connection task send a close frame.
        self.ws_sender.lock().await.take();

        if let Some(mut handle) = self.connection_handle.lock().await.take()
            && tokio::time::timeout(CLOSE_GRACE, &mut handle).await.is_err()
        {
            warn!("Gemini Live connection task did not stop in time, aborting");
            handle.abort();
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Disconnected;
        info!("Disconnected from Gemini Live");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcription_rejection_detection() {
        assert!(is_transcription_model_rejection(
            "1007: Invalid JSON payload received. Unknown name \"model\" at 'setup.input_audio_transcription': Cannot find field."
        ));
        assert!(is_transcription_model_rejection(
            "unknown name \"model\" at 'setup.output_audio_transcription'"
        ));
        assert!(!is_transcription_model_rejection("permission denied"));
        assert!(!is_transcription_model_rejection(
            "unknown name \"voice\" at 'setup.generation_config'"
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let result = GeminiLiveClient::connect(GeminiLiveConfig::default()).await;
        assert!(matches!(
            result,
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = GeminiLiveConfig {
            endpoint_override: Some(format!("ws://{addr}")),
            ..Default::default()
        };
        let result = GeminiLiveClient::connect(config).await;
        assert!(matches!(result, Err(RealtimeError::ConnectionFailed(_))));
    }
}
