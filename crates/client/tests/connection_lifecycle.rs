//! Integration test: boots an in-process WebSocket server that plays the
//! serving node, connects a real [`Client`] through a scripted gateway, and
//! drives it through handshakes, disconnects, wrong-node redirects and close.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nkn_client::{
    Client, ClientError, ConnectionState, Endpoint, Event, Gateway, GatewayError, Generation,
    Identity,
};
use nkn_protocol::{
    InboundMessage, OutboundMessage, ServerFrame, SetClient, ACTION_SEND_RAW_BLOCK,
    ACTION_SET_CLIENT,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

const ADDRESS: &str = "alice.0a0b";
const WAIT: Duration = Duration::from_secs(5);
const FAST_RECONNECT: Duration = Duration::from_millis(50);

// ── Mini node: in-process WS server ─────────────────────────────────────

/// One accepted client connection, after its `setClient` arrived.
struct NodeConn {
    set_client: SetClient,
    /// Frames to push to the client. Dropping this closes the connection.
    send: mpsc::Sender<Message>,
    /// Text and binary frames the client wrote after the handshake.
    recv: mpsc::Receiver<Message>,
}

impl NodeConn {
    async fn push(&self, msg: Message) {
        self.send.send(msg).await.expect("node connection gone");
    }

    async fn push_json(&self, value: serde_json::Value) {
        self.push(Message::Text(value.to_string())).await;
    }

    async fn push_frame(&self, frame: &ServerFrame) {
        self.push(Message::Text(serde_json::to_string(frame).unwrap()))
            .await;
    }

    async fn ack(&self) {
        self.push_frame(&ServerFrame::success(ACTION_SET_CLIENT)).await;
    }

    async fn next_frame(&mut self) -> Message {
        timeout(WAIT, self.recv.recv())
            .await
            .expect("timeout waiting for client frame")
            .expect("client connection closed")
    }
}

async fn start_mini_node() -> (SocketAddr, mpsc::Receiver<NodeConn>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (conn_rx, _accept) = serve_mini_node(listener);
    (addr, conn_rx)
}

/// Accept clients on `listener`. Aborting the returned task drops the
/// listener, so later dials are refused; connections already accepted stay up.
fn serve_mini_node(listener: TcpListener) -> (mpsc::Receiver<NodeConn>, JoinHandle<()>) {
    let (conn_tx, conn_rx) = mpsc::channel(8);

    let accept = tokio::spawn(async move {
        while let Ok((stream, _peer)) = listener.accept().await {
            let conn_tx = conn_tx.clone();
            tokio::spawn(async move {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let (mut sink, mut stream) = ws.split();

                // Wait for setClient.
                let set_client = loop {
                    match stream.next().await {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(req) = serde_json::from_str::<SetClient>(&text) {
                                break req;
                            }
                        }
                        Some(Ok(_)) => continue,
                        _ => return,
                    }
                };

                let (to_client_tx, mut to_client_rx) = mpsc::channel::<Message>(16);
                let (from_client_tx, from_client_rx) = mpsc::channel::<Message>(16);

                let conn = NodeConn {
                    set_client,
                    send: to_client_tx,
                    recv: from_client_rx,
                };
                if conn_tx.send(conn).await.is_err() {
                    return;
                }

                let read_task = tokio::spawn(async move {
                    while let Some(Ok(msg)) = stream.next().await {
                        if matches!(msg, Message::Text(_) | Message::Binary(_))
                            && from_client_tx.send(msg).await.is_err()
                        {
                            break;
                        }
                    }
                });

                while let Some(msg) = to_client_rx.recv().await {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
                let _ = sink.close().await;
                let _ = read_task.await;
            });
        }
    });

    (conn_rx, accept)
}

async fn next_conn(conns: &mut mpsc::Receiver<NodeConn>) -> NodeConn {
    timeout(WAIT, conns.recv())
        .await
        .expect("timeout waiting for client connection")
        .expect("mini node stopped")
}

async fn next_event(generation: &mut Generation) -> Option<Event> {
    timeout(WAIT, generation.recv())
        .await
        .expect("timeout waiting for event")
}

async fn next_generation(client: &Client) -> Generation {
    timeout(WAIT, client.next_generation())
        .await
        .expect("timeout waiting for generation")
        .expect("client closed")
}

async fn wait_for_state(client: &Client, want: ConnectionState) {
    let mut state = client.watch_state();
    timeout(WAIT, state.wait_for(|s| *s == want))
        .await
        .expect("timeout waiting for state")
        .expect("state channel closed");
}

// ── Scripted gateway ────────────────────────────────────────────────────

struct ScriptedGateway {
    endpoint: String,
    resolves: AtomicUsize,
    failures_left: AtomicUsize,
    topics: HashMap<String, Vec<String>>,
}

impl ScriptedGateway {
    fn new(node: SocketAddr) -> Self {
        Self {
            endpoint: format!("ws://{node}"),
            resolves: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            topics: HashMap::new(),
        }
    }

    fn with_topic(mut self, topic: &str, subscribers: &[&str]) -> Self {
        self.topics.insert(
            topic.to_string(),
            subscribers.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    fn resolves(&self) -> usize {
        self.resolves.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Gateway for ScriptedGateway {
    async fn resolve_endpoint(&self, address: &str) -> Result<Endpoint, GatewayError> {
        assert_eq!(address, ADDRESS);
        self.resolves.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GatewayError::Http("seed unreachable".into()));
        }
        Ok(Endpoint::from_url(self.endpoint.clone()))
    }

    async fn resolve_subscribers(&self, topic: &str) -> Result<Vec<String>, GatewayError> {
        Ok(self.topics.get(topic).cloned().unwrap_or_default())
    }
}

async fn connect(gateway: Arc<ScriptedGateway>, reconnect: Duration) -> Result<Client, ClientError> {
    Client::builder()
        .identity(Identity::from_public_key(vec![0x0a, 0x0b]))
        .identifier("alice")
        .gateway(gateway)
        .reconnect_interval(reconnect)
        .connect()
        .await
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn handshake_emits_connected_once() {
    let (addr, mut conns) = start_mini_node().await;
    let gateway = Arc::new(ScriptedGateway::new(addr));
    let client = connect(gateway.clone(), FAST_RECONNECT).await.unwrap();

    assert_eq!(client.address(), ADDRESS);
    assert_eq!(client.endpoint(), Some(Endpoint::from_url(format!("ws://{addr}"))));

    let node = next_conn(&mut conns).await;
    assert_eq!(node.set_client, SetClient::new(ADDRESS));

    let mut generation = next_generation(&client).await;
    assert_eq!(generation.id(), 1);

    node.ack().await;
    assert_eq!(next_event(&mut generation).await, Some(Event::Connected));

    let inbound = InboundMessage {
        src: "bob.0c0d".into(),
        payload: b"hello".to_vec(),
    };
    node.push(Message::Binary(inbound.encode_to_vec())).await;
    assert_eq!(
        next_event(&mut generation).await,
        Some(Event::Message(inbound))
    );
    assert_eq!(generation.try_recv(), None);
    assert_eq!(client.state(), ConnectionState::Active);
    assert_eq!(gateway.resolves(), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn events_keep_frame_order() {
    let (addr, mut conns) = start_mini_node().await;
    let client = connect(Arc::new(ScriptedGateway::new(addr)), FAST_RECONNECT)
        .await
        .unwrap();
    let node = next_conn(&mut conns).await;
    let mut generation = next_generation(&client).await;

    let first = InboundMessage {
        src: "a".into(),
        payload: vec![1],
    };
    let second = InboundMessage {
        src: "b".into(),
        payload: vec![2],
    };

    node.ack().await;
    node.push(Message::Binary(first.encode_to_vec())).await;
    node.push_frame(
        &ServerFrame::success(ACTION_SEND_RAW_BLOCK)
            .with_result(serde_json::json!({"header": {"height": 77}})),
    )
    .await;
    node.push(Message::Binary(second.encode_to_vec())).await;

    assert_eq!(next_event(&mut generation).await, Some(Event::Connected));
    assert_eq!(next_event(&mut generation).await, Some(Event::Message(first)));
    match next_event(&mut generation).await {
        Some(Event::Block(block)) => assert_eq!(block.height(), Some(77)),
        other => panic!("expected block, got {other:?}"),
    }
    assert_eq!(next_event(&mut generation).await, Some(Event::Message(second)));

    client.shutdown().await;
}

#[tokio::test]
async fn wrong_node_resolves_again_before_reconnect() {
    let (addr, mut conns) = start_mini_node().await;
    let gateway = Arc::new(ScriptedGateway::new(addr));
    let client = connect(gateway.clone(), FAST_RECONNECT).await.unwrap();

    let node = next_conn(&mut conns).await;
    let mut first = next_generation(&client).await;
    node.ack().await;
    assert_eq!(next_event(&mut first).await, Some(Event::Connected));
    assert_eq!(gateway.resolves(), 1);

    node.push_json(serde_json::json!({"Error": 48001, "Action": "setClient"}))
        .await;
    assert_eq!(next_event(&mut first).await, None);

    let node = next_conn(&mut conns).await;
    assert_eq!(gateway.resolves(), 2);
    assert_eq!(node.set_client.addr, ADDRESS);

    let mut second = next_generation(&client).await;
    assert_eq!(second.id(), 2);
    node.ack().await;
    assert_eq!(next_event(&mut second).await, Some(Event::Connected));
    assert_eq!(second.try_recv(), None);

    client.shutdown().await;
}

#[tokio::test]
async fn transient_drop_reuses_endpoint() {
    let (addr, mut conns) = start_mini_node().await;
    let gateway = Arc::new(ScriptedGateway::new(addr));
    let client = connect(gateway.clone(), FAST_RECONNECT).await.unwrap();

    for expected_generation in 1..=3 {
        let node = next_conn(&mut conns).await;
        let mut generation = next_generation(&client).await;
        assert_eq!(generation.id(), expected_generation);
        node.ack().await;
        assert_eq!(next_event(&mut generation).await, Some(Event::Connected));

        drop(node);
        assert_eq!(next_event(&mut generation).await, None);
    }

    let _node = next_conn(&mut conns).await;
    assert_eq!(gateway.resolves(), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn refused_dial_is_retried_on_same_endpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (mut conns, accept) = serve_mini_node(listener);
    let gateway = Arc::new(ScriptedGateway::new(addr));
    let client = connect(gateway.clone(), FAST_RECONNECT).await.unwrap();

    let node = next_conn(&mut conns).await;
    let mut first = next_generation(&client).await;

    // Take the node down: the session ends and every redial is refused.
    accept.abort();
    let _ = accept.await;
    drop(node);
    assert_eq!(next_event(&mut first).await, None);

    tokio::time::sleep(FAST_RECONNECT * 7).await;
    assert!(!client.is_closed());
    assert_ne!(client.state(), ConnectionState::Active);

    // Same port comes back; the client finds it without asking the seed.
    let listener = TcpListener::bind(addr).await.unwrap();
    let (mut conns, _accept) = serve_mini_node(listener);
    let node = next_conn(&mut conns).await;
    assert_eq!(node.set_client, SetClient::new(ADDRESS));

    let mut second = next_generation(&client).await;
    node.ack().await;
    assert_eq!(next_event(&mut second).await, Some(Event::Connected));
    assert_eq!(client.state(), ConnectionState::Active);
    assert_eq!(gateway.resolves(), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn unclaimed_generation_is_dropped_with_its_session() {
    let (addr, mut conns) = start_mini_node().await;
    let client = connect(Arc::new(ScriptedGateway::new(addr)), Duration::from_secs(30))
        .await
        .unwrap();
    let node = next_conn(&mut conns).await;
    wait_for_state(&client, ConnectionState::Active).await;

    drop(node);
    wait_for_state(&client, ConnectionState::ReconnectPending).await;

    assert!(
        timeout(Duration::from_millis(200), client.next_generation())
            .await
            .is_err(),
        "a finished session's generation must not be handed out"
    );

    client.shutdown().await;
}

#[tokio::test]
async fn node_error_reuses_endpoint() {
    let (addr, mut conns) = start_mini_node().await;
    let gateway = Arc::new(ScriptedGateway::new(addr));
    let client = connect(gateway.clone(), FAST_RECONNECT).await.unwrap();

    let node = next_conn(&mut conns).await;
    let mut generation = next_generation(&client).await;
    node.push_json(serde_json::json!({"Error": 45001, "Action": "setClient"}))
        .await;
    assert_eq!(next_event(&mut generation).await, None);

    let node = next_conn(&mut conns).await;
    let mut generation = next_generation(&client).await;
    node.push(Message::Text("garbage".into())).await;
    assert_eq!(next_event(&mut generation).await, None);

    let node = next_conn(&mut conns).await;
    let mut generation = next_generation(&client).await;
    node.push(Message::Close(Some(CloseFrame {
        code: CloseCode::Policy,
        reason: "policy".into(),
    })))
    .await;
    assert_eq!(next_event(&mut generation).await, None);

    let _node = next_conn(&mut conns).await;
    assert_eq!(gateway.resolves(), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn failed_reresolution_is_retried() {
    let (addr, mut conns) = start_mini_node().await;
    let gateway = Arc::new(ScriptedGateway::new(addr));
    let client = connect(gateway.clone(), FAST_RECONNECT).await.unwrap();

    let node = next_conn(&mut conns).await;
    let mut generation = next_generation(&client).await;
    gateway.fail_next(2);
    node.push_json(serde_json::json!({"Error": 48001})).await;
    assert_eq!(next_event(&mut generation).await, None);

    let node = next_conn(&mut conns).await;
    assert_eq!(gateway.resolves(), 4);
    assert!(!client.is_closed());

    let mut generation = next_generation(&client).await;
    node.ack().await;
    assert_eq!(next_event(&mut generation).await, Some(Event::Connected));

    client.shutdown().await;
}

#[tokio::test]
async fn send_writes_one_binary_frame() {
    let (addr, mut conns) = start_mini_node().await;
    let client = connect(Arc::new(ScriptedGateway::new(addr)), FAST_RECONNECT)
        .await
        .unwrap();
    let mut node = next_conn(&mut conns).await;
    wait_for_state(&client, ConnectionState::Active).await;

    client.send(["addrB"], vec![1, 2, 3], 60).await.unwrap();

    match node.next_frame().await {
        Message::Binary(data) => {
            let msg = OutboundMessage::decode(&data).unwrap();
            assert_eq!(msg.dests, vec!["addrB"]);
            assert_eq!(msg.payload, vec![1, 2, 3]);
            assert_eq!(msg.max_holding_seconds, 60);
        }
        other => panic!("expected binary frame, got {other:?}"),
    }
    assert!(timeout(Duration::from_millis(200), node.recv.recv()).await.is_err());

    client.shutdown().await;
}

#[tokio::test]
async fn publish_resolves_subscribers() {
    let (addr, mut conns) = start_mini_node().await;
    let gateway = ScriptedGateway::new(addr)
        .with_topic("empty", &[])
        .with_topic("news", &["s1", "s2"]);
    let client = connect(Arc::new(gateway), FAST_RECONNECT).await.unwrap();
    let mut node = next_conn(&mut conns).await;
    wait_for_state(&client, ConnectionState::Active).await;

    client.publish("empty", b"nobody".to_vec(), 0).await.unwrap();
    assert!(
        timeout(Duration::from_millis(200), node.recv.recv()).await.is_err(),
        "publish to an empty topic must not write"
    );

    client.publish("news", b"headline".to_vec(), 30).await.unwrap();
    match node.next_frame().await {
        Message::Binary(data) => {
            let msg = OutboundMessage::decode(&data).unwrap();
            assert_eq!(msg.dests, vec!["s1", "s2"]);
            assert_eq!(msg.payload, b"headline");
            assert_eq!(msg.max_holding_seconds, 30);
        }
        other => panic!("expected binary frame, got {other:?}"),
    }

    client.shutdown().await;
}

#[tokio::test]
async fn send_between_sessions_fails_fast() {
    let (addr, mut conns) = start_mini_node().await;
    let client = connect(Arc::new(ScriptedGateway::new(addr)), Duration::from_secs(30))
        .await
        .unwrap();
    let node = next_conn(&mut conns).await;
    wait_for_state(&client, ConnectionState::Active).await;

    drop(node);
    wait_for_state(&client, ConnectionState::ReconnectPending).await;

    let result = timeout(Duration::from_secs(1), client.send(["addrB"], vec![1], 0))
        .await
        .expect("send blocked without a session");
    assert!(matches!(result, Err(ClientError::NotConnected)));

    client.shutdown().await;
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let (addr, mut conns) = start_mini_node().await;
    let gateway = Arc::new(ScriptedGateway::new(addr));
    let client = connect(gateway.clone(), FAST_RECONNECT).await.unwrap();
    let _node = next_conn(&mut conns).await;
    wait_for_state(&client, ConnectionState::Active).await;

    let state = client.watch_state();
    client.close();
    client.close();
    assert!(client.is_closed());

    assert!(matches!(
        client.send(["addrB"], vec![1], 0).await,
        Err(ClientError::Closed)
    ));
    assert!(client.next_generation().await.is_none());

    client.shutdown().await;
    assert_eq!(*state.borrow(), ConnectionState::Closed);

    assert!(
        timeout(Duration::from_millis(300), conns.recv()).await.is_err(),
        "closed client must not reconnect"
    );
    assert_eq!(gateway.resolves(), 1);
}

#[tokio::test]
async fn close_while_waiting_to_reconnect_is_final() {
    let (addr, mut conns) = start_mini_node().await;
    let gateway = Arc::new(ScriptedGateway::new(addr));
    let client = connect(gateway.clone(), Duration::from_secs(1)).await.unwrap();
    let node = next_conn(&mut conns).await;
    wait_for_state(&client, ConnectionState::Active).await;

    let state = client.watch_state();
    drop(node);
    wait_for_state(&client, ConnectionState::ReconnectPending).await;
    client.close();

    timeout(WAIT, client.shutdown())
        .await
        .expect("shutdown stalled while waiting to reconnect");
    assert_eq!(*state.borrow(), ConnectionState::Closed);

    assert!(
        timeout(Duration::from_millis(800), conns.recv()).await.is_err(),
        "closed client must not reconnect"
    );
    assert_eq!(gateway.resolves(), 1);
}

#[tokio::test]
async fn close_wakes_generation_waiters() {
    let (addr, mut conns) = start_mini_node().await;
    let client = Arc::new(
        connect(Arc::new(ScriptedGateway::new(addr)), FAST_RECONNECT)
            .await
            .unwrap(),
    );
    let _node = next_conn(&mut conns).await;
    let _first = next_generation(&client).await;

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.next_generation().await.is_none() })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.close();

    let woke_with_none = timeout(WAIT, waiter).await.unwrap().unwrap();
    assert!(woke_with_none);
}

#[tokio::test]
async fn first_resolution_failure_fails_connect() {
    let (addr, _conns) = start_mini_node().await;
    let gateway = Arc::new(ScriptedGateway::new(addr));
    gateway.fail_next(1);

    let err = connect(gateway.clone(), FAST_RECONNECT).await.unwrap_err();
    assert!(matches!(err, ClientError::Gateway(GatewayError::Http(_))));
    assert_eq!(gateway.resolves(), 1);
}

#[tokio::test]
async fn first_dial_failure_fails_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let err = connect(Arc::new(ScriptedGateway::new(dead)), FAST_RECONNECT)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Session(_)));
}
