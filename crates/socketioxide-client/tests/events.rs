mod fixture;

use bytes::Bytes;
use fixture::{client_events, connect, create_client, next};
use serde::{Deserialize, Serialize};
use serde_json::json;
use socketioxide_client::{Event, PayloadValue, Socket};
use socketioxide_core::packet::Packet;
use tokio::sync::mpsc;

#[tokio::test]
async fn handlers_order() {
    let (client, mut server) = create_client(|b| b);
    let (tx, mut rx) = mpsc::unbounded_channel();
    for i in 1..=3 {
        let tx = tx.clone();
        client.on("order", move |_: &Socket, _: Event| {
            tx.send(format!("handler {i}")).ok();
        });
    }
    let tx1 = tx.clone();
    client.on_any(move |_: &Socket, event: &Event| {
        tx1.send(format!("any {}", event.name)).ok();
    });
    let mut session = connect(&client, &mut server).await;

    session.send("2[\"order\"]").await;
    session.send("2[\"other\"]").await;
    for expected in ["any order", "handler 1", "handler 2", "handler 3", "any other"] {
        assert_eq!(next(&mut rx).await, expected);
    }
}

#[tokio::test]
async fn event_args() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Message {
        user: String,
        count: u32,
    }
    let (client, mut server) = create_client(|b| b);
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("message", move |_: &Socket, event: Event| {
        tx.send(event).ok();
    });
    let mut session = connect(&client, &mut server).await;

    session
        .send("2[\"message\",{\"user\":\"foo\",\"count\":2},\"extra\"]")
        .await;
    let event = next(&mut rx).await;
    assert_eq!(event.name, "message");
    assert_eq!(event.args.len(), 2);
    let data: Message = assert_ok!(event.data());
    assert_eq!(
        data,
        Message {
            user: "foo".into(),
            count: 2
        }
    );

    session.send("2[\"message\"]").await;
    let event = next(&mut rx).await;
    assert!(event.args.is_empty());
    assert_eq!(assert_ok!(event.data::<Option<Message>>()), None);
}

#[tokio::test]
async fn off_handlers() {
    let (client, mut server) = create_client(|b| b);
    let (tx, mut rx) = mpsc::unbounded_channel();
    for event in ["a", "b"] {
        let tx = tx.clone();
        client.on(event, move |_: &Socket, event: Event| {
            tx.send(event.name.to_string()).ok();
        });
    }
    let mut session = connect(&client, &mut server).await;

    client.off("a");
    session.send("2[\"a\"]").await;
    session.send("2[\"b\"]").await;
    assert_eq!(next(&mut rx).await, "b");

    client.off_all();
    session.send("2[\"b\"]").await;
    // The dispatcher is still running
    let tx1 = tx.clone();
    client.on("c", move |_: &Socket, event: Event| {
        tx1.send(event.name.to_string()).ok();
    });
    session.send("2[\"c\"]").await;
    assert_eq!(next(&mut rx).await, "c");
}

#[tokio::test]
async fn handler_panic_keeps_dispatcher() {
    let (client, mut server) = create_client(|b| b);
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("panic", |_: &Socket, _: Event| panic!("handler panic"));
    client.on("ok", move |_: &Socket, _: Event| {
        tx.send(()).ok();
    });
    let mut session = connect(&client, &mut server).await;

    session.send("2[\"panic\"]").await;
    session.send("2[\"ok\"]").await;
    next(&mut rx).await;
}

#[tokio::test]
async fn receive_binary_event() {
    let (client, mut server) = create_client(|b| b);
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("file", move |_: &Socket, event: Event| {
        tx.send(event.args).ok();
    });
    let mut session = connect(&client, &mut server).await;

    session
        .send("51-[\"file\",{\"name\":\"a.bin\"},{\"_placeholder\":true,\"num\":0}]")
        .await;
    session.send_binary(Bytes::from_static(&[1, 2, 3])).await;

    let args = next(&mut rx).await;
    assert_eq!(
        args,
        vec![
            PayloadValue::from(json!({ "name": "a.bin" })),
            PayloadValue::Binary(0, Bytes::from_static(&[1, 2, 3]))
        ]
    );
}

#[tokio::test]
async fn emit_binary_event() {
    let (client, mut server) = create_client(|b| b);
    let mut session = connect(&client, &mut server).await;

    let args: Vec<PayloadValue> = vec![
        "upload".into(),
        Bytes::from_static(&[1, 2]).into(),
        Bytes::from_static(&[3]).into(),
    ];
    assert_ok!(client.emit("file", args.clone()));
    assert_eq!(session.recv().await, Packet::event("/", "file", args));
}

#[tokio::test]
async fn emit_value() {
    #[derive(Serialize)]
    struct Message<'a> {
        user: &'a str,
        count: u32,
    }
    let (client, mut server) = create_client(|b| b);
    let mut session = connect(&client, &mut server).await;

    assert_ok!(client.emit_value("message", &Message { user: "foo", count: 2 }));
    assert_eq!(
        session.recv().await,
        Packet::event(
            "/",
            "message",
            vec![json!({ "user": "foo", "count": 2 }).into()]
        )
    );
    assert_ok!(client.emit_value("list", &[1, 2, 3]));
    assert_eq!(
        session.recv().await,
        Packet::event("/", "list", vec![json!([1, 2, 3]).into()])
    );
}

#[tokio::test]
async fn json_bridge() {
    let (client, mut server) = create_client(|b| b);
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_json("data", move |json: String| {
        tx.send(json).ok();
    });
    let mut session = connect(&client, &mut server).await;

    session.send("2[\"data\",{\"a\":1},2]").await;
    assert_eq!(next(&mut rx).await, r#"{"a":1}"#);
    session.send("2[\"data\"]").await;
    assert_eq!(next(&mut rx).await, "{}");

    assert_ok!(client.emit_json("data", [r#"{"a":1}"#, "text", "[1,2]"]));
    assert_eq!(
        session.recv().await,
        Packet::event(
            "/",
            "data",
            vec![json!({ "a": 1 }).into(), "text".into(), "[1,2]".into()]
        )
    );
}

#[tokio::test]
async fn protocol_error_keeps_session() {
    let (client, mut server) = create_client(|b| b);
    let mut events = client_events(&client);
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("ok", move |_: &Socket, _: Event| {
        tx.send(()).ok();
    });
    let mut session = connect(&client, &mut server).await;
    assert_eq!(next(&mut events).await, "connecting");
    assert_eq!(next(&mut events).await, "connect");

    session.send("9invalid").await;
    session.send("2[\"ok\"]").await;
    next(&mut rx).await;
    let event = next(&mut events).await;
    assert!(event.starts_with("error: protocol error"), "{event}");
    assert!(client.is_connected());
}

#[tokio::test]
async fn hostile_packets_keep_session() {
    let (client, mut server) = create_client(|b| b);
    let mut events = client_events(&client);
    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on("ok", move |_: &Socket, event: Event| {
        tx.send(event.args).ok();
    });
    let mut session = connect(&client, &mut server).await;
    assert_eq!(next(&mut events).await, "connecting");
    assert_eq!(next(&mut events).await, "connect");

    let packets = [
        "5300000000000000000-[\"a\"]",
        "518446744073709551615-[\"a\"]",
        "€abc",
        "2€",
    ];
    for packet in packets {
        session.send(packet).await;
    }
    session.send("2[\"ok\",\"€\"]").await;
    assert_eq!(next(&mut rx).await, vec![PayloadValue::from("€")]);
    for _ in packets {
        let event = next(&mut events).await;
        assert!(event.starts_with("error: protocol error"), "{event}");
    }
    assert!(client.is_connected());
    assert_ok!(client.emit("alive", vec![]));
    assert_eq!(session.recv().await, Packet::event("/", "alive", vec![]));
}
