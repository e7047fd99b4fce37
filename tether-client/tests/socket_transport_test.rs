//! WebSocket transport integration tests
//!
//! Correlation of out-of-order replies, failure of in-flight calls on a dropped
//! connection, reconnect on demand, explicit close and pushed notifications.

mod common;

use common::{
    mock_error_response, mock_notification, mock_response, reply_after, reply_now, MockWsServer,
};
use serde_json::{json, Value};
use std::time::Duration;
use tether_client::{
    ClientBuilder, ConnectionState, RetryPolicy, SocketTransport, TimeoutPolicy, TransportKind,
    TransportRouter,
};
use tether_core::{mapper, Error, RpcRequest};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Replies `params[0]` after `params[1]` milliseconds; `hang` is never answered
async fn delayed_echo_server() -> MockWsServer {
    MockWsServer::with_handler(|request, outbox| {
        if request["method"] == "hang" {
            return;
        }
        let result = request["params"][0].clone();
        let delay = request["params"][1].as_u64().unwrap_or(0);
        reply_after(
            &outbox,
            Duration::from_millis(delay),
            mock_response(&request["id"], result),
        );
    })
    .await
}

/// Completes the handshake for the first connection and hangs up on it; later
/// connections are accepted at the TCP level and never answered
async fn handshake_once_server() -> (String, mpsc::UnboundedReceiver<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut stalled = Vec::new();
        let mut count = 0;
        while let Ok((stream, _)) = listener.accept().await {
            count += 1;
            if count == 1 {
                if let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await {
                    drop(ws_stream);
                }
            } else {
                stalled.push(stream);
            }
            let _ = accepted_tx.send(count);
        }
    });

    (url, accepted_rx)
}

fn socket(client: &tether_client::RpcClient) -> &SocketTransport {
    match client.transport() {
        TransportRouter::Socket(socket) => socket,
        _ => panic!("not a socket client"),
    }
}

fn socket_state(client: &tether_client::RpcClient) -> ConnectionState {
    socket(client).state()
}

#[tokio::test]
async fn test_request_response() {
    let server = MockWsServer::echo().await;
    let client = ClientBuilder::socket(server.url()).build().await.unwrap();

    assert_eq!(client.transport_kind(), TransportKind::Socket);
    assert_eq!(client.polling_interval(), None);
    assert_eq!(socket_state(&client), ConnectionState::Connected);

    let value: String = client.request("eth_chainId", vec![json!("0x1")]).await.unwrap();
    assert_eq!(value, "0x1");
    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn test_replies_correlated_by_id_not_order() {
    let server = delayed_echo_server().await;
    let client = ClientBuilder::socket(server.url()).build().await.unwrap();

    let slow = client.request::<String>("eth_call", vec![json!("slow"), json!(150)]);
    let medium = client.request::<String>("eth_call", vec![json!("medium"), json!(75)]);
    let fast = client.request::<String>("eth_call", vec![json!("fast"), json!(0)]);

    let (slow, medium, fast) = tokio::join!(slow, medium, fast);

    assert_eq!(slow.unwrap(), "slow");
    assert_eq!(medium.unwrap(), "medium");
    assert_eq!(fast.unwrap(), "fast");
    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn test_error_reply() {
    let server = MockWsServer::with_handler(|request, outbox| {
        reply_now(
            &outbox,
            mock_error_response(&request["id"], -32601, "the method foo does not exist"),
        );
    })
    .await;
    let client = ClientBuilder::socket(server.url()).build().await.unwrap();

    let err = client.call(&RpcRequest::method("foo")).await.unwrap_err();
    assert_eq!(err.code(), Some(mapper::METHOD_NOT_FOUND));
}

#[tokio::test]
async fn test_drop_fails_in_flight_calls_and_next_call_reconnects() {
    let mut server = delayed_echo_server().await;
    let client = ClientBuilder::socket(server.url())
        .retry_policy(RetryPolicy::no_retry())
        .build()
        .await
        .unwrap();

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.call(&RpcRequest::method("hang")).await }
    });
    let second = tokio::spawn({
        let client = client.clone();
        async move { client.call(&RpcRequest::method("hang")).await }
    });

    // Both requests are on the wire before the connection goes away
    assert_eq!(server.wait_for_message().await.unwrap()["method"], "hang");
    assert_eq!(server.wait_for_message().await.unwrap()["method"], "hang");
    server.drop_connections();

    assert_eq!(first.await.unwrap().unwrap_err(), Error::ConnectionClosed);
    assert_eq!(second.await.unwrap().unwrap_err(), Error::ConnectionClosed);

    let value: String = client
        .request("eth_blockNumber", vec![json!("0x2a"), json!(0)])
        .await
        .unwrap();
    assert_eq!(value, "0x2a");
    assert_eq!(server.accepted(), 2);
    assert_eq!(socket_state(&client), ConnectionState::Connected);
}

#[tokio::test]
async fn test_default_policy_retries_across_reconnect() {
    let mut server = MockWsServer::with_handler(|request, outbox| {
        if request["method"] == "eth_blockNumber" {
            reply_now(&outbox, mock_response(&request["id"], json!("0x99")));
        }
    })
    .await;
    let client = ClientBuilder::socket(server.url())
        .retry_policy(
            RetryPolicy::new(3)
                .unwrap()
                .with_base_delay(Duration::from_millis(10)),
        )
        .build()
        .await
        .unwrap();

    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.call(&RpcRequest::method("eth_syncing")).await }
    });
    assert_eq!(server.wait_for_message().await.unwrap()["method"], "eth_syncing");
    server.drop_connections();

    // ConnectionClosed is transient, so the call is resent on a new connection
    assert_eq!(server.wait_for_message().await.unwrap()["method"], "eth_syncing");
    assert_eq!(server.accepted(), 2);
    pending.abort();

    let value: String = client.request("eth_blockNumber", vec![]).await.unwrap();
    assert_eq!(value, "0x99");
}

#[tokio::test]
async fn test_close_refuses_further_calls() {
    let server = MockWsServer::echo().await;
    let client = ClientBuilder::socket(server.url()).build().await.unwrap();

    let _: String = client.request("eth_chainId", vec![json!("0x1")]).await.unwrap();

    client.close().await.unwrap();
    assert_eq!(socket_state(&client), ConnectionState::Closed);

    let err = client
        .call_with(
            &RpcRequest::new("eth_chainId", vec![json!("0x1")]),
            Some(&RetryPolicy::no_retry()),
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err, Error::ConnectionClosed);

    // Closing twice is harmless
    client.close().await.unwrap();
    assert_eq!(server.accepted(), 1);
}

#[tokio::test]
async fn test_notifications_reach_subscribers() {
    let server = MockWsServer::with_handler(|request, outbox| {
        if request["method"] == "eth_subscribe" {
            reply_now(&outbox, mock_response(&request["id"], json!("0xcd0c3e8af590364c09d0fa6a1210faf5")));
            reply_now(
                &outbox,
                mock_notification(
                    "eth_subscription",
                    json!({
                        "subscription": "0xcd0c3e8af590364c09d0fa6a1210faf5",
                        "result": { "number": "0x1b4" }
                    }),
                ),
            );
        }
    })
    .await;
    let client = ClientBuilder::socket(server.url()).build().await.unwrap();

    let mut heads = client.subscribe("eth_subscription").await.unwrap();
    let id: String = client
        .request("eth_subscribe", vec![json!("newHeads")])
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), heads.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event["subscription"], Value::String(id));
    assert_eq!(event["result"]["number"], "0x1b4");

    assert!(client.unsubscribe(&heads).await);
    server.broadcast(mock_notification("eth_subscription", json!({"result": {}})));
    assert!(!client.unsubscribe(&heads).await);
}

#[tokio::test]
async fn test_connect_refused_is_transport_error() {
    let server = MockWsServer::echo().await;
    let url = server.url();
    server.shutdown();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = ClientBuilder::socket(url).build().await.unwrap_err();
    assert_eq!(err.code(), Some(mapper::TRANSPORT_ERROR));
}

#[tokio::test]
async fn test_build_times_out_when_handshake_stalls() {
    // Bound but never accepted: TCP connects through the backlog, the handshake never runs
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());

    let build = ClientBuilder::socket(url)
        .timeout_policy(TimeoutPolicy::from_millis(50).unwrap())
        .build();
    let err = tokio::time::timeout(Duration::from_secs(3), build)
        .await
        .expect("build ignored the timeout policy")
        .unwrap_err();

    assert_eq!(err, Error::Timeout { timeout_ms: 50 });
    drop(listener);
}

#[tokio::test]
async fn test_close_interrupts_stalled_reconnect() {
    let (url, mut accepted) = handshake_once_server().await;
    let client = ClientBuilder::socket(url).build().await.unwrap();
    assert_eq!(accepted.recv().await, Some(1));

    let call = tokio::spawn({
        let client = client.clone();
        async move { client.call(&RpcRequest::method("eth_blockNumber")).await }
    });

    // The reconnect reaches the server and stalls in the handshake
    let second = tokio::time::timeout(Duration::from_secs(5), accepted.recv())
        .await
        .unwrap();
    assert_eq!(second, Some(2));

    tokio::time::timeout(Duration::from_secs(2), client.close())
        .await
        .expect("close waited on the stalled connect")
        .unwrap();
    assert_eq!(socket_state(&client), ConnectionState::Closed);

    let err = tokio::time::timeout(Duration::from_secs(5), call)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert_eq!(err, Error::ConnectionClosed);
}

#[tokio::test]
async fn test_timed_out_call_leaves_nothing_pending() {
    let mut server = delayed_echo_server().await;
    let client = ClientBuilder::socket(server.url())
        .retry_policy(RetryPolicy::no_retry())
        .timeout_policy(TimeoutPolicy::from_millis(50).unwrap())
        .build()
        .await
        .unwrap();

    let err = client.call(&RpcRequest::method("hang")).await.unwrap_err();
    assert_eq!(err, Error::Timeout { timeout_ms: 50 });
    assert_eq!(server.wait_for_message().await.unwrap()["method"], "hang");
    assert_eq!(socket(&client).pending_count(), 0);

    // The connection itself is still healthy
    let value: String = client
        .request("eth_chainId", vec![json!("0x1"), json!(0)])
        .await
        .unwrap();
    assert_eq!(value, "0x1");
    assert_eq!(socket(&client).pending_count(), 0);
    assert_eq!(server.accepted(), 1);
}
