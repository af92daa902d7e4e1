//! WebSocket handler
//!
//! Drives one connection: negotiation, the bootstrap exchange, then the
//! reader and writer tasks until either side ends the session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum_extra::headers::UserAgent;
use axum_extra::TypedHeader;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{timeout, timeout_at, Instant};

use crate::collaborators::Identity;
use crate::connection::{Connection, Session};
use crate::error::GatewayError;
use crate::handshake::{self, Handshake, Input, Step};
use crate::protocol::payloads::{IdentifyMessage, ReadyMessage};
use crate::protocol::{codec, Capabilities, CloseCode, Envelope, Payload, ProtocolError, WireFrame};
use crate::router::Command;
use crate::server::GatewayState;

/// Opening request selectors
#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    pub encoding: Option<String>,
    pub version: Option<String>,
}

/// WebSocket gateway handler
pub async fn gateway_handler(
    State(state): State<GatewayState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    Query(query): Query<GatewayQuery>,
    user_agent: Option<TypedHeader<UserAgent>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let negotiated = handshake::negotiate(
        state.versions(),
        query.encoding.as_deref(),
        query.version.as_deref(),
    );
    let user_agent = user_agent.map(|TypedHeader(ua)| ua.as_str().to_string());

    // Oversized frames still reach the codec so they close with a protocol
    // violation; this is only the transport's hard cap
    let transport_limit = state.settings().max_frame_bytes.saturating_mul(4);

    ws.max_message_size(transport_limit)
        .max_frame_size(transport_limit)
        .on_upgrade(move |socket| async move {
            match negotiated {
                Ok(negotiated) => {
                    let connection =
                        Connection::new(remote_addr, negotiated, query.version, user_agent);
                    handle_socket(state, connection, socket).await;
                }
                Err(e) => reject(socket, remote_addr, &e).await,
            }
        })
}

/// Close a connection whose opening request failed negotiation
async fn reject(mut socket: WebSocket, remote_addr: SocketAddr, err: &ProtocolError) {
    let code = err.to_close_code();
    tracing::info!(
        remote_addr = %remote_addr,
        close_code = ?code,
        error = %err,
        "Rejecting connection before handshake"
    );
    send_close(&mut socket, code).await;
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: GatewayState, connection: Connection, mut socket: WebSocket) {
    tracing::info!(
        connection_id = %connection.id(),
        remote_addr = %connection.remote_addr(),
        encoding = %connection.encoding(),
        version = %connection.version(),
        requested_version = ?connection.requested_version(),
        user_agent = ?connection.user_agent(),
        "WebSocket connection established"
    );

    let mut fsm = Handshake::new();
    let (identity, client_capabilities) =
        match bootstrap(&state, &connection, &mut fsm, &mut socket).await {
            Ok(identified) => identified,
            Err(e) => {
                close_bootstrap(&connection, socket, &e).await;
                return;
            }
        };

    let capabilities = Capabilities::negotiate(state.capabilities(), client_capabilities);
    let session = match state.sessions().create(&connection, identity, capabilities) {
        Ok(session) => session,
        Err(e) => {
            close_bootstrap(&connection, socket, &e).await;
            return;
        }
    };

    session.reply(Payload::Ready(ReadyMessage {
        session_id: session.id().as_u64(),
        user_id: session.user_id().as_u64(),
        version: session.version().major,
        revision: session.version().revision,
        capabilities: capabilities.bits(),
    }));

    tracing::info!(
        connection_id = %connection.id(),
        session_id = %session.id(),
        user_id = %session.user_id(),
        "Session ready"
    );

    let (sink, stream) = socket.split();
    let mut send_task = tokio::spawn(write_loop(Arc::clone(&session), sink));
    let mut recv_task = tokio::spawn(read_loop(
        state.clone(),
        Arc::clone(&session),
        fsm,
        stream,
    ));

    tokio::select! {
        result = &mut recv_task => {
            match result {
                Ok(Some(close_code)) => {
                    tracing::debug!(
                        session_id = %session.id(),
                        close_code = ?close_code,
                        "Receive task ended with close code"
                    );
                    session.close_with(close_code);
                    if timeout(state.settings().close_grace(), &mut send_task).await.is_err() {
                        send_task.abort();
                    }
                }
                _ => send_task.abort(),
            }
        }
        _ = &mut send_task => {
            tracing::debug!(session_id = %session.id(), "Send task ended");
            recv_task.abort();
        }
    }

    cleanup_session(&state, &session);
}

/// Run the bootstrap exchange up to a successful Identify
///
/// Returns the authenticated identity and the client's capability bits.
async fn bootstrap(
    state: &GatewayState,
    connection: &Connection,
    fsm: &mut Handshake,
    socket: &mut WebSocket,
) -> Result<(Identity, u32), GatewayError> {
    fsm.advance(Input::Upgraded)?;

    let hello = Payload::Handshake(handshake::handshake_message(
        connection.version(),
        state.capabilities(),
        state.settings().heartbeat_interval_ms,
    ));
    send_envelope(socket, &Envelope::unsequenced(hello), connection)
        .await
        .inspect_err(|_| fsm.close())?;
    fsm.advance(Input::HandshakeDelivered)?;

    let deadline = Instant::now() + state.settings().identify_timeout();
    loop {
        let message = match timeout_at(deadline, socket.recv()).await {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                fsm.advance(Input::Disconnected)?;
                return Err(GatewayError::Transport(e.to_string()));
            }
            Ok(None) => {
                fsm.advance(Input::Disconnected)?;
                return Err(GatewayError::Closed);
            }
            Err(_) => return Err(timed_out(fsm)),
        };

        let Some(frame) = data_frame(message, fsm) else {
            continue;
        };
        let frame = frame?;

        let payload = decode(state, fsm, &frame)?;
        let identify = match fsm.advance(Input::Frame(payload))? {
            Step::Authenticate(identify) => identify,
            step => return Err(unexpected_step(fsm, step)),
        };

        let input = match timeout_at(deadline, authenticate(state, connection, &identify)).await {
            Ok(input) => input,
            Err(_) => return Err(timed_out(fsm)),
        };

        return match fsm.advance(input)? {
            Step::CreateSession(identity) => Ok((identity, identify.capabilities)),
            step => Err(unexpected_step(fsm, step)),
        };
    }
}

async fn authenticate(
    state: &GatewayState,
    connection: &Connection,
    identify: &IdentifyMessage,
) -> Input {
    match state.authenticator().authenticate(identify).await {
        Ok(identity) => Input::Authenticated(identity),
        Err(e) => {
            tracing::info!(
                connection_id = %connection.id(),
                error = %e,
                "Identify rejected"
            );
            Input::AuthRejected(e.to_string())
        }
    }
}

fn timed_out(fsm: &mut Handshake) -> GatewayError {
    match fsm.advance(Input::TimedOut) {
        Err(e) => e,
        Ok(_) => GatewayError::IdentifyTimeout,
    }
}

fn unexpected_step(fsm: &mut Handshake, step: Step) -> GatewayError {
    let state = fsm.state().as_str();
    fsm.close();
    tracing::error!(state = state, step = ?step, "Bootstrap produced an unexpected step");
    GatewayError::InvalidTransition {
        state,
        input: "frame",
    }
}

/// Split a WebSocket message into a data frame, a control frame to skip,
/// or the end of the transport
fn data_frame(
    message: Message,
    fsm: &mut Handshake,
) -> Option<Result<WireFrame, GatewayError>> {
    match message {
        Message::Text(text) => Some(Ok(WireFrame::Text(text))),
        Message::Binary(bytes) => Some(Ok(WireFrame::Binary(bytes))),
        // Pong is handled automatically by axum
        Message::Ping(_) | Message::Pong(_) => None,
        Message::Close(_) => {
            let _ = fsm.advance(Input::Disconnected);
            Some(Err(GatewayError::Closed))
        }
    }
}

fn decode(
    state: &GatewayState,
    fsm: &mut Handshake,
    frame: &WireFrame,
) -> Result<Payload, GatewayError> {
    codec::decode(frame, state.settings().max_frame_bytes).map_err(|e| {
        fsm.close();
        GatewayError::from(e)
    })
}

/// Close a connection that never produced a session
async fn close_bootstrap(connection: &Connection, mut socket: WebSocket, err: &GatewayError) {
    match err.to_close_code() {
        Some(code) => {
            tracing::info!(
                connection_id = %connection.id(),
                close_code = ?code,
                error = %err,
                "Closing connection during bootstrap"
            );
            send_close(&mut socket, code).await;
        }
        None => {
            tracing::debug!(
                connection_id = %connection.id(),
                error = %err,
                "Connection ended during bootstrap"
            );
        }
    }
}

/// Read inbound frames until the transport ends or the session must close
async fn read_loop(
    state: GatewayState,
    session: Arc<Session>,
    mut fsm: Handshake,
    mut stream: SplitStream<WebSocket>,
) -> Option<CloseCode> {
    let idle = state.settings().heartbeat_timeout();

    loop {
        let message = match timeout(idle, stream.next()).await {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                tracing::warn!(session_id = %session.id(), error = %e, "WebSocket error");
                let _ = fsm.advance(Input::Disconnected);
                return None;
            }
            Ok(None) => {
                let _ = fsm.advance(Input::Disconnected);
                return None;
            }
            Err(_) => {
                let err = timed_out(&mut fsm);
                tracing::info!(session_id = %session.id(), error = %err, "Session idle");
                return err.to_close_code();
            }
        };

        session.touch();

        let frame = match data_frame(message, &mut fsm) {
            Some(Ok(frame)) => frame,
            Some(Err(_)) => {
                tracing::info!(session_id = %session.id(), "Client closed connection");
                return None;
            }
            None => continue,
        };

        if let Err(e) = handle_frame(&state, &session, &mut fsm, &frame).await {
            tracing::info!(
                session_id = %session.id(),
                error = %e,
                "Closing session on protocol error"
            );
            return e.to_close_code();
        }
    }
}

/// Decode one inbound frame and route the command it carries
async fn handle_frame(
    state: &GatewayState,
    session: &Arc<Session>,
    fsm: &mut Handshake,
    frame: &WireFrame,
) -> Result<(), GatewayError> {
    let payload = decode(state, fsm, frame)?;

    tracing::trace!(
        session_id = %session.id(),
        payload = payload.name(),
        inbound = %frame.encoding(),
        "Received payload"
    );

    let payload = match fsm.advance(Input::Frame(payload))? {
        Step::Dispatch(payload) => payload,
        step => return Err(unexpected_step(fsm, step)),
    };

    let name = payload.name();
    match Command::parse(payload) {
        // Failures were already reported to the session
        Ok(command) => {
            let _ = state.router().submit(session, command).await;
        }
        Err(e) => state.router().report_failure(session, name, &e),
    }
    Ok(())
}

/// Drain the session's outbound queue onto the socket
async fn write_loop(session: Arc<Session>, mut sink: SplitSink<WebSocket, Message>) {
    loop {
        let outgoing = session.next_outgoing().await;
        if outgoing.finished {
            break;
        }

        for envelope in &outgoing.envelopes {
            let frame = match codec::encode(envelope, session.encoding()) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!(session_id = %session.id(), error = %e, "Failed to encode envelope");
                    continue;
                }
            };
            if sink.send(to_message(frame)).await.is_err() {
                tracing::warn!(
                    session_id = %session.id(),
                    "Failed to send message to WebSocket"
                );
                return;
            }
        }

        if let Some(code) = outgoing.close {
            tracing::info!(session_id = %session.id(), close_code = ?code, "Closing session");
            send_close(&mut sink, code).await;
            return;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(session_id = %session.id(), error = %e, "Failed to close WebSocket");
    }
}

async fn send_envelope(
    socket: &mut WebSocket,
    envelope: &Envelope,
    connection: &Connection,
) -> Result<(), GatewayError> {
    let frame = codec::encode(envelope, connection.encoding())?;
    socket
        .send(to_message(frame))
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))
}

fn to_message(frame: WireFrame) -> Message {
    match frame {
        WireFrame::Text(text) => Message::Text(text),
        WireFrame::Binary(bytes) => Message::Binary(bytes),
    }
}

fn close_message(code: CloseCode) -> Message {
    Message::Close(Some(CloseFrame {
        code: code.as_u16(),
        reason: code.name().into(),
    }))
}

/// Send a close frame; returns whether the transport accepted it
async fn send_close<S>(sink: &mut S, code: CloseCode) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    match sink.send(close_message(code)).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(close_code = ?code, error = %e, "Failed to send close frame");
            false
        }
    }
}

/// Tear down a session once both tasks are done
fn cleanup_session(state: &GatewayState, session: &Arc<Session>) {
    tracing::info!(
        session_id = %session.id(),
        connection_id = %session.connection_id(),
        created_at = %session.created_at(),
        idle_ms = session.last_contact().elapsed().as_millis(),
        last_seq = session.last_sequence(),
        "Cleaning up session"
    );
    state.sessions().destroy(session.id());
}
