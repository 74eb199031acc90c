mod fixture;

use std::time::Duration;

use engineioxide_client::Packet as EIoPacket;
use fixture::{
    client_events, connect, connected, create_client, create_client_with, next, open_packet,
};
use socketioxide_client::{
    AckError, ClientStatus, DisconnectReason, Error, ProtocolVersion, Socket,
};
use socketioxide_core::packet::Packet;
use tokio::{sync::mpsc, time::Instant};

#[tokio::test]
async fn reconnect_after_transport_close() {
    let (client, mut server) = create_client(|b| {
        b.reconnection_delay(Duration::from_millis(10))
            .randomization_factor(0.0)
    });
    let mut events = client_events(&client);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tx1 = tx.clone();
    client.socket().on_connect(move |_: &Socket| {
        tx1.send("connect".to_string()).ok();
    });
    client
        .socket()
        .on_disconnect(move |_: &Socket, reason: DisconnectReason| {
            tx.send(format!("disconnect: {reason:?}")).ok();
        });

    let session = connect(&client, &mut server).await;
    assert_eq!(next(&mut rx).await, "connect");
    session.close();

    let mut session = server.accept().await;
    session.accept_ns("/").await;
    assert_eq!(next(&mut rx).await, "disconnect: TransportClose");
    assert_eq!(next(&mut rx).await, "connect");

    let expected = [
        "connecting",
        "connect",
        "disconnect: server gracefully closed the connection",
        "reconnect attempt: 1",
        "reconnect: 1",
        "connect",
    ];
    for event in expected {
        assert_eq!(next(&mut events).await, event);
    }
    assert_eq!(client.status(), ClientStatus::Connected);
}

#[tokio::test]
async fn server_close_packet() {
    let (client, mut server) = create_client(|b| b.reconnection(false));
    let mut events = client_events(&client);
    let session = connect(&client, &mut server).await;
    let mut status = client.status_receiver();

    session.send_raw(EIoPacket::Close).await;
    assert_ok!(status.wait_for(|s| *s == ClientStatus::Disconnected).await);
    for event in [
        "connecting",
        "connect",
        "disconnect: server gracefully closed the connection",
    ] {
        assert_eq!(next(&mut events).await, event);
    }
    let err = assert_some!(client.last_error());
    assert!(matches!(*err, Error::Transport(_)), "{err:?}");
    assert!(server.try_accept(Duration::from_millis(100)).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn v3_heartbeat_timeout() {
    let open = open_packet(25000, 5000);
    let (client, mut server) = create_client_with(open, |b| {
        b.protocol(ProtocolVersion::V3)
            .reconnection_delay(Duration::from_secs(1))
            .randomization_factor(0.0)
    });
    let mut events = client_events(&client);
    let mut status = client.status_receiver();

    let start = Instant::now();
    client.connect();
    let mut session = server.accept().await;
    session.send("0").await;
    connected(&client.socket()).await;

    // The ping sent by the client is never answered
    assert_eq!(session.recv_raw().await, EIoPacket::Ping);
    assert_ok!(status.wait_for(|s| *s == ClientStatus::Reconnecting).await);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(30000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(31000), "{elapsed:?}");

    for event in [
        "connecting",
        "connect",
        "ping",
        "error: transport error: HeartbeatTimeout",
        "disconnect: server did not answer the heartbeat in time",
        "reconnect attempt: 1",
        "reconnect: 1",
        "connect",
    ] {
        assert_eq!(next(&mut events).await, event);
    }
    let mut session = server.accept().await;
    session.send("0").await;
    connected(&client.socket()).await;
}

#[tokio::test(start_paused = true)]
async fn v3_heartbeat() {
    let open = open_packet(25000, 5000);
    let (client, mut server) =
        create_client_with(open, |b| b.protocol(ProtocolVersion::V3));
    let mut events = client_events(&client);
    client.connect();
    let mut session = server.accept().await;
    session.send("0").await;

    for _ in 0..3 {
        assert_eq!(session.recv_raw().await, EIoPacket::Ping);
        session.send_raw(EIoPacket::Pong).await;
    }
    assert!(client.is_connected());
    for event in ["connecting", "connect", "ping", "pong", "ping", "pong"] {
        assert_eq!(next(&mut events).await, event);
    }
}

#[tokio::test(start_paused = true)]
async fn v4_heartbeat_timeout() {
    let open = open_packet(300, 200);
    let (client, mut server) = create_client_with(open, |b| b.reconnection(false));
    let mut status = client.status_receiver();
    let start = Instant::now();
    let session = connect(&client, &mut server).await;

    session.send_raw(EIoPacket::Ping).await;
    assert_ok!(status.wait_for(|s| *s == ClientStatus::Disconnected).await);
    assert!(start.elapsed() >= Duration::from_millis(500));
    let err = assert_some!(client.last_error());
    assert!(matches!(*err, Error::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn v4_ping_pong() {
    let (client, mut server) = create_client(|b| b);
    let mut events = client_events(&client);
    let mut session = connect(&client, &mut server).await;
    session.send_raw(EIoPacket::Ping).await;
    assert_eq!(session.recv_raw().await, EIoPacket::Pong);
    for event in ["connecting", "connect", "ping", "pong"] {
        assert_eq!(next(&mut events).await, event);
    }
}

#[tokio::test]
async fn reconnect_attempts_exhausted() {
    let (client, server) = create_client(|b| {
        b.reconnection_attempts(Some(2))
            .reconnection_delay(Duration::from_millis(10))
            .randomization_factor(0.0)
    });
    server.connector.refuse_next(10);
    let mut events = client_events(&client);
    let mut status = client.status_receiver();

    client.connect();
    assert_ok!(status.wait_for(|s| *s == ClientStatus::Disconnected).await);
    for event in ["connecting", "reconnect attempt: 1", "reconnect attempt: 2"] {
        assert_eq!(next(&mut events).await, event);
    }
    let event = next(&mut events).await;
    assert!(
        event.starts_with("error: reconnection failed after 2 attempts: handshake error"),
        "{event}"
    );
    let err = assert_some!(client.last_error());
    match &*err {
        Error::ReconnectFailed { attempts, last } => {
            assert_eq!(*attempts, 2);
            assert!(matches!(**last, Error::Handshake(_)), "{last:?}");
        }
        err => panic!("unexpected error: {err:?}"),
    }
    assert!(!client.is_connected());
}

#[tokio::test]
async fn reconnection_disabled() {
    let (client, mut server) = create_client(|b| b.reconnection(false));
    server.connector.refuse_next(1);
    let mut events = client_events(&client);

    client.connect();
    assert_eq!(next(&mut events).await, "connecting");
    let event = next(&mut events).await;
    assert!(event.starts_with("error: handshake error"), "{event}");
    assert_eq!(client.status(), ClientStatus::Disconnected);
    let err = assert_some!(client.last_error());
    assert!(matches!(*err, Error::Handshake(_)), "{err:?}");

    // The client can be started again
    tokio::time::sleep(Duration::from_millis(10)).await;
    connect(&client, &mut server).await;
    assert_eq!(client.status(), ClientStatus::Connected);
}

#[tokio::test]
async fn client_disconnect_is_idempotent() {
    let (client, mut server) = create_client(|b| b);
    let mut events = client_events(&client);
    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .socket()
        .on_disconnect(move |_: &Socket, reason: DisconnectReason| {
            tx.send(reason).ok();
        });
    let mut session = connect(&client, &mut server).await;
    assert_eq!(next(&mut events).await, "connecting");
    assert_eq!(next(&mut events).await, "connect");

    client.disconnect();
    client.disconnect();
    assert_eq!(session.recv().await, Packet::disconnect("/"));
    assert_eq!(session.recv_raw().await, EIoPacket::Close);
    assert_eq!(next(&mut events).await, "disconnect: client has been closed");
    assert_eq!(next(&mut rx).await, DisconnectReason::ClientDisconnect);
    assert_eq!(client.status(), ClientStatus::Disconnected);

    // No reconnection and no other event
    assert!(server.try_accept(Duration::from_millis(100)).await.is_none());
    assert!(events.try_recv().is_err());
    assert!(rx.try_recv().is_err());

    // The client can be connected again
    let _session = connect(&client, &mut server).await;
    assert!(client.socket().is_connected());
}

#[tokio::test]
async fn buffered_ack_survives_reconnection() {
    let (client, mut server) = create_client(|b| {
        b.reconnection_delay(Duration::from_millis(10))
            .randomization_factor(0.0)
    });
    let session = connect(&client, &mut server).await;
    let pending = client.emit_with_ack("sent", vec![], None);
    let mut status = client.status_receiver();
    session.close();
    // The ack of a sent packet is cancelled with the session
    assert_eq!(pending.await, Err(AckError::Cancelled));
    assert_ok!(status.wait_for(|s| *s != ClientStatus::Connected).await);

    let res = client.emit_with_ack("sum", vec![2.into(), 3.into()], None);
    let mut session = server.accept().await;
    session.accept_ns("/").await;
    let mut expected = Packet::event("/", "sum", vec![2.into(), 3.into()]);
    expected.inner.set_ack_id(res.id());
    assert_eq!(session.recv().await, expected);
    session.send(&format!("3{}[5]", res.id())).await;
    assert_eq!(res.await, Ok(vec![5.into()]));
}
