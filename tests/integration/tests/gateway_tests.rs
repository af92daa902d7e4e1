//! Gateway Integration Tests
//!
//! Each test starts an in-process gateway on an ephemeral port; no external
//! services are needed.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use bonfire_common::{GatewaySettings, OverflowPolicy};
use bonfire_core::{DomainEvent, Snowflake};
use bonfire_gateway::protocol::payloads::ReadyMessage;
use bonfire_gateway::protocol::{CloseCode, Envelope, Payload};
use integration_tests::{
    assert_json, fixtures::*, test_settings, FrameKind, ServerFrame, TestServer,
};
use prost::Message as _;
use reqwest::StatusCode;
use tokio_tungstenite::tungstenite::Message;

fn code(close: CloseCode) -> Option<u16> {
    Some(close.as_u16())
}

// ============================================================================
// Negotiation
// ============================================================================

#[tokio::test]
async fn test_json_scenario() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.connect("encoding=json&version=2").await.unwrap();

    let hello = alice.recv().await.unwrap();
    assert_eq!(hello.kind, FrameKind::Text);
    assert_eq!(hello.envelope.seq, 0);
    match hello.payload().unwrap() {
        Payload::Handshake(handshake) => {
            assert_eq!(handshake.version, 2);
            assert_eq!(handshake.revision, 0);
            assert!(handshake.heartbeat_interval_ms > 0);
        }
        other => panic!("expected handshake, got {other:?}"),
    }

    let ready = alice.identify(ALICE_TOKEN).await.unwrap();
    assert_eq!(ready.user_id, ALICE_ID as u64);
    assert_eq!(ready.version, 2);
    alice.subscribe("channel:42").await.unwrap();

    let mut bob = server.identified(BOB_TOKEN).await.unwrap();
    bob.send(send_message(42, "hello")).await.unwrap();

    let event = alice.recv().await.unwrap();
    assert_eq!(event.kind, FrameKind::Text);
    assert_eq!(event.envelope.seq, 1);
    match event.payload().unwrap() {
        Payload::MessageCreated(message) => {
            assert_eq!(message.channel_id, 42);
            assert_eq!(message.author_id, BOB_ID as u64);
            assert_eq!(message.content, "hello");
        }
        other => panic!("expected message_created, got {other:?}"),
    }
}

#[tokio::test]
async fn test_default_encoding_is_binary() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.connect("").await.unwrap();

    let hello = client.recv().await.unwrap();
    assert_eq!(hello.kind, FrameKind::Binary);
    match hello.payload().unwrap() {
        // Latest supported version
        Payload::Handshake(handshake) => assert_eq!(handshake.version, 2),
        other => panic!("expected handshake, got {other:?}"),
    }

    client.send(identify(ALICE_TOKEN)).await.unwrap();
    let ready = client.recv().await.unwrap();
    assert_eq!(ready.kind, FrameKind::Binary);
    assert!(matches!(ready.payload().unwrap(), Payload::Ready(_)));
}

#[tokio::test]
async fn test_version_selection() {
    let server = TestServer::start().await.expect("Failed to start server");

    let mut v1 = server.connect("version=v1").await.unwrap();
    assert_eq!(v1.handshake().await.unwrap().version, 1);

    let mut v2 = server.connect("version=2.0").await.unwrap();
    assert_eq!(v2.handshake().await.unwrap().version, 2);
}

#[tokio::test]
async fn test_unsupported_version_closes_before_handshake() {
    let server = TestServer::start().await.expect("Failed to start server");

    for query in ["version=9", "version=2.5", "version=latest"] {
        let mut client = server.connect(query).await.unwrap();
        match client.next_frame().await.unwrap() {
            ServerFrame::Closed(close) => {
                assert_eq!(close, code(CloseCode::VersionUnsupported), "{query}");
            }
            ServerFrame::Envelope(received) => {
                panic!("{query}: expected close, got {:?}", received.envelope)
            }
        }
    }
}

#[tokio::test]
async fn test_unknown_encoding_is_protocol_violation() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.connect("encoding=xml").await.unwrap();

    assert_eq!(
        client.expect_close().await.unwrap(),
        code(CloseCode::ProtocolViolation)
    );
}

// ============================================================================
// Handshake / Identify
// ============================================================================

#[tokio::test]
async fn test_identify_timeout() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.connect("").await.unwrap();
    client.handshake().await.unwrap();

    assert_eq!(client.expect_close().await.unwrap(), code(CloseCode::Timeout));
    assert_eq!(server.state().sessions().session_count(), 0);
}

#[tokio::test]
async fn test_invalid_token_is_auth_failure() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.connect("").await.unwrap();
    client.handshake().await.unwrap();

    client.send(identify("not-a-token")).await.unwrap();
    assert_eq!(
        client.expect_close().await.unwrap(),
        code(CloseCode::AuthFailure)
    );
}

#[tokio::test]
async fn test_empty_token_is_protocol_violation() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.connect("").await.unwrap();
    client.handshake().await.unwrap();

    client.send(identify("")).await.unwrap();
    assert_eq!(
        client.expect_close().await.unwrap(),
        code(CloseCode::ProtocolViolation)
    );
}

#[tokio::test]
async fn test_command_before_identify_is_protocol_violation() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.connect("").await.unwrap();
    client.handshake().await.unwrap();

    client.send(heartbeat(0)).await.unwrap();
    assert_eq!(
        client.expect_close().await.unwrap(),
        code(CloseCode::ProtocolViolation)
    );
}

#[tokio::test]
async fn test_second_identify_is_protocol_violation() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();

    client.send(identify(ALICE_TOKEN)).await.unwrap();
    assert_eq!(
        client.expect_close().await.unwrap(),
        code(CloseCode::ProtocolViolation)
    );
    server.wait_for_sessions(0).await.unwrap();
}

#[tokio::test]
async fn test_server_payload_from_client_is_protocol_violation() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();

    client
        .send(Payload::Ready(ReadyMessage::default()))
        .await
        .unwrap();
    assert_eq!(
        client.expect_close().await.unwrap(),
        code(CloseCode::ProtocolViolation)
    );
}

#[tokio::test]
async fn test_idle_session_times_out() {
    let settings = GatewaySettings {
        heartbeat_interval_ms: 100,
        heartbeat_timeout_ms: 300,
        ..test_settings()
    };
    let server = TestServer::start_with_settings(settings)
        .await
        .expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();

    assert_eq!(client.expect_close().await.unwrap(), code(CloseCode::Timeout));
}

// ============================================================================
// Frames
// ============================================================================

#[tokio::test]
async fn test_mixed_inbound_encodings() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.connect("").await.unwrap();
    client.handshake().await.unwrap();

    client.send_binary(identify(ALICE_TOKEN)).await.unwrap();
    assert!(matches!(
        client.recv().await.unwrap().payload().unwrap(),
        Payload::Ready(_)
    ));

    // A text command on a protobuf connection; the reply stays binary
    client.send_json(subscribe("presence")).await.unwrap();
    let ack = client.recv().await.unwrap();
    assert_eq!(ack.kind, FrameKind::Binary);
    assert!(matches!(ack.payload().unwrap(), Payload::Subscribed(s) if s.scope == "presence"));
}

#[tokio::test]
async fn test_malformed_frames_are_protocol_violations() {
    let server = TestServer::start().await.expect("Failed to start server");

    let mut concatenated = Envelope::unsequenced(heartbeat(0)).encode_to_vec();
    concatenated.extend(Envelope::unsequenced(subscribe("presence")).encode_to_vec());

    let frames = [
        Message::Text("not json".to_string()),
        Message::Text(r#"{"payload":{}}"#.to_string()),
        Message::Text(r#"{"seq":0}"#.to_string()),
        Message::Text(
            r#"{"payload":{"heartbeat":{"last_seq":0},"subscribe":{"scope":"presence","events":0}}}"#
                .to_string(),
        ),
        Message::Text(r#"{"payload":{"teleport":{}}}"#.to_string()),
        Message::Binary(vec![0xff, 0xff, 0xff]),
        Message::Binary(concatenated),
        Message::Binary(Vec::new()),
    ];

    for frame in frames {
        let mut client = server.identified(ALICE_TOKEN).await.unwrap();
        let description = format!("{frame:?}");
        client.send_raw(frame).await.unwrap();
        assert_eq!(
            client.expect_close().await.unwrap(),
            code(CloseCode::ProtocolViolation),
            "{description}"
        );
    }
}

#[tokio::test]
async fn test_oversized_frame_is_protocol_violation() {
    let settings = GatewaySettings {
        max_frame_bytes: 1024,
        ..test_settings()
    };
    let server = TestServer::start_with_settings(settings)
        .await
        .expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();

    client
        .send_binary(send_message(1, &"x".repeat(2048)))
        .await
        .unwrap();
    assert_eq!(
        client.expect_close().await.unwrap(),
        code(CloseCode::ProtocolViolation)
    );
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_events_arrive_in_order() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();
    client.subscribe("channel:7").await.unwrap();

    let events = server.state().events();
    for id in 1..=50 {
        events.send(message_created(7, id)).await.unwrap();
    }
    // Other scopes never reach the session
    events.send(message_created(8, 999)).await.unwrap();

    for expected in 1..=50u64 {
        let received = client.recv().await.unwrap();
        assert_eq!(received.envelope.seq, expected);
        match received.payload().unwrap() {
            Payload::MessageCreated(message) => assert_eq!(message.message_id, expected),
            other => panic!("expected message_created, got {other:?}"),
        }
    }

    client.send(heartbeat(50)).await.unwrap();
    match client.recv().await.unwrap().payload().unwrap() {
        Payload::HeartbeatAck(ack) => assert_eq!(ack.last_seq, 50),
        other => panic!("expected heartbeat_ack, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();
    client.subscribe("channel:3").await.unwrap();

    client
        .send(Payload::Unsubscribe(
            bonfire_gateway::protocol::payloads::UnsubscribeCommand {
                scope: "channel:3".to_string(),
            },
        ))
        .await
        .unwrap();
    assert!(matches!(
        client.recv().await.unwrap().payload().unwrap(),
        Payload::Unsubscribed(_)
    ));

    assert_eq!(server.state().router().publish(&message_created(3, 1)), 0);
}

#[tokio::test]
async fn test_domain_failure_keeps_session_open() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();

    client
        .send(send_message(READ_ONLY_CHANNEL as u64, "hi"))
        .await
        .unwrap();
    let failure = client.recv().await.unwrap();
    assert_eq!(failure.envelope.seq, 0);
    match failure.payload().unwrap() {
        Payload::Error(err) => {
            assert_eq!(err.code, "CANNOT_SEND_MESSAGES");
            assert_eq!(err.command, "send_message");
        }
        other => panic!("expected error, got {other:?}"),
    }

    client.send(subscribe("guild:1")).await.unwrap();
    match client.recv().await.unwrap().payload().unwrap() {
        Payload::Error(err) => assert_eq!(err.code, "INVALID_SCOPE"),
        other => panic!("expected error, got {other:?}"),
    }

    client.send(heartbeat(0)).await.unwrap();
    assert!(matches!(
        client.recv().await.unwrap().payload().unwrap(),
        Payload::HeartbeatAck(_)
    ));
}

#[tokio::test]
async fn test_presence_scope_receives_updates() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut alice = server.identified(ALICE_TOKEN).await.unwrap();
    alice.subscribe("presence").await.unwrap();
    alice.subscribe(&format!("user:{BOB_ID}")).await.unwrap();

    let mut bob = server.identified(BOB_TOKEN).await.unwrap();
    bob.send(Payload::UpdatePresence(
        bonfire_gateway::protocol::payloads::UpdatePresenceCommand {
            status: "idle".to_string(),
        },
    ))
    .await
    .unwrap();

    // Delivered once even though two subscriptions match
    let update = alice.recv().await.unwrap();
    assert_eq!(update.envelope.seq, 1);
    match update.payload().unwrap() {
        Payload::PresenceUpdated(presence) => {
            assert_eq!(presence.user_id, BOB_ID as u64);
            assert_eq!(presence.status, "idle");
        }
        other => panic!("expected presence_updated, got {other:?}"),
    }

    alice.send(heartbeat(1)).await.unwrap();
    assert!(matches!(
        alice.recv().await.unwrap().payload().unwrap(),
        Payload::HeartbeatAck(_)
    ));
}

#[tokio::test]
async fn test_backpressure_overflow_closes_session() {
    let settings = GatewaySettings {
        queue_capacity: 1,
        overflow_policy: OverflowPolicy::Disconnect,
        ..test_settings()
    };
    let server = TestServer::start_with_settings(settings)
        .await
        .expect("Failed to start server");
    let mut slow = server.identified(ALICE_TOKEN).await.unwrap();
    slow.subscribe("channel:5").await.unwrap();

    // Published without yielding, so the writer cannot drain in between
    let router = server.state().router();
    for id in 1..=5 {
        router.publish(&message_created(5, id));
    }

    let mut saw_missed = false;
    let close = loop {
        match slow.next_frame().await.unwrap() {
            ServerFrame::Envelope(received) => {
                if let Some(Payload::EventsMissed(missed)) = &received.envelope.payload {
                    assert!(missed.count >= 1);
                    saw_missed = true;
                }
            }
            ServerFrame::Closed(close) => break close,
        }
    };

    assert!(saw_missed);
    assert_eq!(close, code(CloseCode::BackpressureOverflow));
    assert_eq!(router.stats().overflows, 1);
}

#[tokio::test]
async fn test_drop_oldest_reports_missed_events_before_closing() {
    let settings = GatewaySettings {
        queue_capacity: 1,
        overflow_threshold: 3,
        overflow_policy: OverflowPolicy::DropOldest,
        ..test_settings()
    };
    let server = TestServer::start_with_settings(settings)
        .await
        .expect("Failed to start server");
    let mut slow = server.identified(ALICE_TOKEN).await.unwrap();
    slow.subscribe("channel:6").await.unwrap();

    // 1 is evicted by 2, 2 by 3, and the third overflow (4) closes
    let router = server.state().router();
    for id in 1..=5 {
        router.publish(&message_created(6, id));
    }

    let missed = slow.recv().await.unwrap();
    assert_eq!(missed.envelope.seq, 1);
    match missed.payload().unwrap() {
        Payload::EventsMissed(missed) => assert_eq!(missed.count, 3),
        other => panic!("expected events_missed, got {other:?}"),
    }

    let survivor = slow.recv().await.unwrap();
    assert_eq!(survivor.envelope.seq, 2);
    match survivor.payload().unwrap() {
        Payload::MessageCreated(created) => assert_eq!(created.message_id, 3),
        other => panic!("expected message_created, got {other:?}"),
    }

    assert_eq!(
        slow.expect_close().await.unwrap(),
        code(CloseCode::BackpressureOverflow)
    );
    let stats = router.stats();
    assert_eq!(stats.overflows, 1);
    assert_eq!(stats.dropped, 3);
}

#[tokio::test]
async fn test_unread_control_replies_close_session() {
    let settings = GatewaySettings {
        queue_capacity: 4,
        control_queue_capacity: 4,
        overflow_threshold: u32::MAX,
        overflow_policy: OverflowPolicy::DropOldest,
        ..test_settings()
    };
    let server = TestServer::start_with_settings(settings)
        .await
        .expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();
    client.subscribe("channel:8").await.unwrap();

    // Large dispatches fill the socket buffers while the client never reads;
    // the heartbeat acks then pile up behind a blocked writer
    let router = server.state().router();
    let sessions = server.state().sessions();
    let bulky = |id: i64| DomainEvent::MessageCreated {
        channel_id: Snowflake::new(8),
        message_id: Snowflake::new(id),
        author_id: Snowflake::new(BOB_ID),
        content: "x".repeat(64 * 1024),
        timestamp_ms: 1_700_000_000_000,
    };

    let mut closing = false;
    for id in 1..=2_000 {
        router.publish(&bulky(id));
        client.send(heartbeat(0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;

        closing = sessions
            .sessions_for_identity(Snowflake::new(ALICE_ID))
            .iter()
            .all(|session| session.is_closing());
        if closing {
            break;
        }
    }
    assert!(closing, "control backlog never closed the session");

    assert_eq!(
        client.expect_close().await.unwrap(),
        code(CloseCode::BackpressureOverflow)
    );
}

#[tokio::test]
async fn test_external_events_reach_subscribers() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();
    client.subscribe("channel:12").await.unwrap();

    let events = server.state().events();
    for id in 1..=3 {
        events.send(message_created(12, id)).await.unwrap();
    }

    for id in 1..=3u64 {
        let received = client.recv().await.unwrap();
        assert_eq!(received.envelope.seq, id);
        match received.payload().unwrap() {
            Payload::MessageCreated(created) => {
                assert_eq!(created.channel_id, 12);
                assert_eq!(created.message_id, id);
            }
            other => panic!("expected message_created, got {other:?}"),
        }
    }
}

// ============================================================================
// Sessions and health
// ============================================================================

#[tokio::test]
async fn test_sessions_are_destroyed_on_disconnect() {
    let server = TestServer::start().await.expect("Failed to start server");
    let alice = server.identified(ALICE_TOKEN).await.unwrap();
    let _alice_again = server.identified(ALICE_TOKEN).await.unwrap();
    let _bob = server.identified(BOB_TOKEN).await.unwrap();

    server.wait_for_sessions(3).await.unwrap();
    let sessions = server.state().sessions();
    assert_eq!(
        sessions
            .sessions_for_identity(Snowflake::new(ALICE_ID))
            .len(),
        2
    );

    drop(alice);
    server.wait_for_sessions(2).await.unwrap();
    assert_eq!(
        sessions
            .sessions_for_identity(Snowflake::new(ALICE_ID))
            .len(),
        1
    );
}

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut client = server.identified(ALICE_TOKEN).await.unwrap();
    client.subscribe("channel:1").await.unwrap();
    server.state().router().publish(&message_created(1, 1));
    client.recv().await.unwrap();

    let response = server.get("/health").await.expect("Request failed");
    let health: serde_json::Value = assert_json(response, StatusCode::OK).await.unwrap();

    assert_eq!(health["status"], "ok");
    assert_eq!(health["sessions"], 1);
    assert_eq!(health["identities"], 1);
    assert_eq!(health["scopes"], 1);
    assert_eq!(health["router"]["published"], 1);
    assert_eq!(health["router"]["delivered"], 1);
    assert_eq!(health["router"]["dropped"], 0);
}
