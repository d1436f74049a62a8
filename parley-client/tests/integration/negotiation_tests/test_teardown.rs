use std::time::Duration;

use parley_client::{
    CallEvent, ConnectionEvent, IceConnectionState, RemoteTrack, SessionState, SignalingState,
    TrackKind,
};
use parley_core::{SessionDescription, SignallingMessage};

use crate::integration::{connected_pair, eventually, init_tracing, spawn_default_peer};
use crate::utils::fake_engine::EngineCall;
use crate::utils::signal_helpers::{is_hangup, is_offer};

#[tokio::test]
async fn test_hangup_closes_both_sides() {
    init_tracing();
    let (a, b) = connected_pair().await;

    assert!(a.handle.hangup());

    assert!(a.wait_for(SessionState::Closed).await);
    assert!(b.wait_for(SessionState::Closed).await);
    assert_eq!(a.signalling.sent_count(is_hangup), 1);
    // A received hangup is never answered with another one
    assert_eq!(b.signalling.sent_count(is_hangup), 0);

    let calls = b.engine.calls();
    let detach = calls.iter().position(|c| *c == EngineCall::Detach(1));
    let close = calls.iter().position(|c| *c == EngineCall::Close(1));
    assert!(detach.is_some() && close.is_some());
    assert!(detach < close);
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    init_tracing();
    let (a, _b) = connected_pair().await;

    a.handle.hangup();
    assert!(a.wait_for(SessionState::Closed).await);

    a.handle.hangup();
    a.handle.deliver(SignallingMessage::Hangup);
    a.engine
        .emit(1, ConnectionEvent::IceConnectionStateChanged(IceConnectionState::Failed));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(a.handle.state(), SessionState::Closed);
    assert_eq!(a.engine.count(|c| matches!(c, EngineCall::Close(_))), 1);
    assert_eq!(a.signalling.sent_count(is_hangup), 1);
}

#[tokio::test]
async fn test_ice_disconnect_tears_down() {
    init_tracing();
    let (a, b) = connected_pair().await;

    a.engine.emit(
        1,
        ConnectionEvent::IceConnectionStateChanged(IceConnectionState::Disconnected),
    );

    assert!(a.wait_for(SessionState::Closed).await);
    assert_eq!(b.handle.state(), SessionState::Connected);
}

#[tokio::test]
async fn test_signalling_closed_tears_down() {
    init_tracing();
    let (a, _b) = connected_pair().await;

    a.engine
        .emit(1, ConnectionEvent::SignalingStateChanged(SignalingState::Closed));

    assert!(a.wait_for(SessionState::Closed).await);
}

#[tokio::test]
async fn test_stale_connection_events_are_ignored() {
    init_tracing();
    let mut peer = spawn_default_peer();

    peer.handle.call();
    peer.handle
        .deliver(SignallingMessage::Answer(SessionDescription::answer("remote-answer")));
    assert!(peer.wait_for(SessionState::Connected).await);
    peer.handle.hangup();
    assert!(peer.wait_for(SessionState::Closed).await);

    // A new call gets a new connection
    peer.handle.call();
    assert!(eventually(|| peer.signalling.sent_count(is_offer) == 2).await);
    assert!(peer.wait_for(SessionState::Offering).await);
    peer.drain_events();

    // Late callbacks from the first connection
    peer.engine.emit(
        1,
        ConnectionEvent::IceConnectionStateChanged(IceConnectionState::Failed),
    );
    peer.engine.emit(
        1,
        ConnectionEvent::RemoteTrack(RemoteTrack {
            id: "old-audio".into(),
            kind: TrackKind::Audio,
            stream_id: "old".into(),
        }),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(peer.handle.state(), SessionState::Offering);
    assert!(
        !peer
            .drain_events()
            .iter()
            .any(|e| matches!(e, CallEvent::RemoteStream(_)))
    );
    assert_eq!(peer.engine.count(|c| *c == EngineCall::CreateOffer(2)), 1);
}

#[tokio::test]
async fn test_shutdown_closes_active_call() {
    init_tracing();
    let (a, _b) = connected_pair().await;

    assert!(a.handle.shutdown());

    assert!(a.wait_for(SessionState::Closed).await);
    assert!(eventually(|| !a.handle.call()).await);
}
