//! Test helpers for integration tests
//!
//! Provides a gateway server on an ephemeral port, a WebSocket client that
//! speaks both envelope encodings, and HTTP assertions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bonfire_common::GatewaySettings;
use bonfire_core::{Snowflake, SnowflakeGenerator};
use bonfire_gateway::collaborators::{LocalChannels, StaticAuthenticator};
use bonfire_gateway::protocol::payloads::{HandshakeMessage, ReadyMessage};
use bonfire_gateway::protocol::{Envelope, Payload};
use bonfire_gateway::{create_app, GatewayState};
use futures_util::{SinkExt, StreamExt};
use prost::Message as _;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::fixtures::{ALICE_ID, ALICE_TOKEN, BOB_ID, BOB_TOKEN, READ_ONLY_CHANNEL};

/// How long a client waits for the next frame
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    state: GatewayState,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        Self::start_with_settings(test_settings()).await
    }

    /// Start a test server with custom gateway settings
    pub async fn start_with_settings(settings: GatewaySettings) -> Result<Self> {
        let ids = Arc::new(SnowflakeGenerator::new(1)?);
        let authenticator = StaticAuthenticator::new()
            .with_token(ALICE_TOKEN, Snowflake::new(ALICE_ID))
            .with_token(BOB_TOKEN, Snowflake::new(BOB_ID));
        let commands =
            LocalChannels::new(Arc::clone(&ids)).with_read_only(Snowflake::new(READ_ONLY_CHANNEL));

        // Create gateway state
        let state = GatewayState::new(settings, ids, Arc::new(authenticator), Arc::new(commands))?;

        // Build application
        let app = create_app(state.clone());

        // Bind to an ephemeral port
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        // Spawn server task
        let handle = tokio::spawn(async move {
            bonfire_gateway::server::serve(listener, app, std::future::pending())
                .await
                .ok();
        });

        // Wait for server to be ready
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Create HTTP client
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            state,
            _handle: handle,
        })
    }

    /// Shared gateway state, for publishing events and inspecting sessions
    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL for the gateway with an optional query string
    pub fn gateway_url(&self, query: &str) -> String {
        if query.is_empty() {
            format!("ws://{}/gateway", self.addr)
        } else {
            format!("ws://{}/gateway?{}", self.addr, query)
        }
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Open a gateway connection
    pub async fn connect(&self, query: &str) -> Result<GatewayClient> {
        GatewayClient::connect(&self.gateway_url(query)).await
    }

    /// Connect with default selectors and complete Identify
    pub async fn identified(&self, token: &str) -> Result<GatewayClient> {
        let mut client = self.connect("").await?;
        client.handshake().await?;
        client.identify(token).await?;
        Ok(client)
    }

    /// Poll `/health` until the active session count reaches `expected`
    pub async fn wait_for_sessions(&self, expected: u64) -> Result<()> {
        for _ in 0..50 {
            let health: serde_json::Value =
                assert_json(self.get("/health").await?, StatusCode::OK).await?;
            if health["sessions"] == expected {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        bail!("session count never reached {expected}")
    }
}

/// Gateway settings with timeouts short enough for tests
pub fn test_settings() -> GatewaySettings {
    GatewaySettings {
        identify_timeout_ms: 300,
        close_grace_ms: 200,
        ..GatewaySettings::default()
    }
}

/// How a frame arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

/// A decoded server frame
#[derive(Debug)]
pub struct Received {
    pub kind: FrameKind,
    pub envelope: Envelope,
}

impl Received {
    pub fn payload(&self) -> Result<&Payload> {
        self.envelope
            .payload
            .as_ref()
            .context("server sent an empty envelope")
    }
}

/// What the server sent next
#[derive(Debug)]
pub enum ServerFrame {
    Envelope(Received),
    /// Close frame with its code, or `None` when the transport just ended
    Closed(Option<u16>),
}

/// WebSocket client for the gateway
pub struct GatewayClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Outbound encoding this client sends in by default
    binary: bool,
}

impl GatewayClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        let binary = !url.contains("encoding=json");
        Ok(Self { stream, binary })
    }

    /// Send in the encoding the connection negotiated
    pub async fn send(&mut self, payload: Payload) -> Result<()> {
        if self.binary {
            self.send_binary(payload).await
        } else {
            self.send_json(payload).await
        }
    }

    pub async fn send_json(&mut self, payload: Payload) -> Result<()> {
        let text = serde_json::to_string(&Envelope::unsequenced(payload))?;
        self.send_raw(Message::Text(text)).await
    }

    pub async fn send_binary(&mut self, payload: Payload) -> Result<()> {
        let bytes = Envelope::unsequenced(payload).encode_to_vec();
        self.send_raw(Message::Binary(bytes)).await
    }

    pub async fn send_raw(&mut self, message: Message) -> Result<()> {
        self.stream.send(message).await?;
        Ok(())
    }

    /// Wait for the next data or close frame
    pub async fn next_frame(&mut self) -> Result<ServerFrame> {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for a frame")?;

            let received = match message {
                None | Some(Err(_)) => return Ok(ServerFrame::Closed(None)),
                Some(Ok(Message::Close(frame))) => {
                    return Ok(ServerFrame::Closed(frame.map(|f| u16::from(f.code))));
                }
                Some(Ok(Message::Text(text))) => Received {
                    kind: FrameKind::Text,
                    envelope: serde_json::from_str(&text)?,
                },
                Some(Ok(Message::Binary(bytes))) => Received {
                    kind: FrameKind::Binary,
                    envelope: Envelope::decode(bytes.as_slice())?,
                },
                Some(Ok(_)) => continue,
            };
            return Ok(ServerFrame::Envelope(received));
        }
    }

    /// Next envelope; fails if the connection closes instead
    pub async fn recv(&mut self) -> Result<Received> {
        match self.next_frame().await? {
            ServerFrame::Envelope(received) => Ok(received),
            ServerFrame::Closed(code) => bail!("connection closed with {code:?}"),
        }
    }

    /// Read until the connection closes and return the close code
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            if let ServerFrame::Closed(code) = self.next_frame().await? {
                return Ok(code);
            }
        }
    }

    /// Read the handshake
    pub async fn handshake(&mut self) -> Result<HandshakeMessage> {
        let received = self.recv().await?;
        match received.envelope.payload {
            Some(Payload::Handshake(handshake)) => Ok(handshake),
            other => bail!("expected handshake, got {other:?}"),
        }
    }

    /// Send Identify and wait for Ready
    pub async fn identify(&mut self, token: &str) -> Result<ReadyMessage> {
        self.send(crate::fixtures::identify(token)).await?;
        let received = self.recv().await?;
        match received.envelope.payload {
            Some(Payload::Ready(ready)) => Ok(ready),
            other => bail!("expected ready, got {other:?}"),
        }
    }

    /// Subscribe and wait for the acknowledgement
    pub async fn subscribe(&mut self, scope: &str) -> Result<()> {
        self.send(crate::fixtures::subscribe(scope)).await?;
        let received = self.recv().await?;
        match received.envelope.payload {
            Some(Payload::Subscribed(ack)) if ack.scope == scope => Ok(()),
            other => bail!("expected subscribed, got {other:?}"),
        }
    }
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(
    response: Response,
    expected_status: StatusCode,
) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(response.json().await?)
}
