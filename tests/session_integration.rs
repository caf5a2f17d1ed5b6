//! End-to-end exercise of the login / token-bind handshake and order
//! routing through `SessionManager`/`SessionChannel`, wired the same way
//! `bin/server.rs` wires them but over an in-memory transport instead of
//! real sockets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use venue::auth::{Authenticator, StaticCredentialStore};
use venue::bus::Bus;
use venue::domain::{ClientId, ConnectionId, Order, OrderAction, OrderIdGenerator, Ticker};
use venue::framing;
use venue::market::MarketData;
use venue::protocol::{ClientMessage, LoginRequest, ServerMessage, TokenBindRequest};
use venue::session::{ChannelKind, SessionChannel, SessionManager};
use venue::transport::{IoResult, Transport};

/// An in-memory duplex `Transport`: bytes pushed on `inbound` are what
/// `recv()` returns; bytes passed to `send()` land on `outbound` for the
/// test to inspect.
struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn recv(&mut self, buf: &mut [u8]) -> (IoResult, usize) {
        match self.inbound.recv().await {
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                (IoResult::Ok, n)
            }
            None => (IoResult::Closed, 0),
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> IoResult {
        match self.outbound.send(bytes.to_vec()) {
            Ok(()) => IoResult::Ok,
            Err(_) => IoResult::Error,
        }
    }

    fn close(&mut self) {
        self.inbound.close();
    }
}

/// The test's handle to the other end of a `MockTransport`: push raw
/// frames in, read raw frames out.
struct PeerHandle {
    to_server: mpsc::UnboundedSender<Vec<u8>>,
    from_server: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl PeerHandle {
    fn send_message(&self, msg: &ClientMessage) {
        self.to_server.send(framing::frame(msg).unwrap()).unwrap();
    }

    async fn recv_message(&mut self) -> ServerMessage {
        let bytes = timeout(Duration::from_secs(1), self.from_server.recv())
            .await
            .expect("timed out waiting for server message")
            .expect("server channel closed");
        let mut seen = Vec::new();
        framing::unframe::<ServerMessage, _>(&bytes, |m| seen.push(m)).unwrap();
        seen.into_iter().next().expect("no message decoded")
    }
}

fn mock_pair() -> (MockTransport, PeerHandle) {
    let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
    let (from_server_tx, from_server_rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            inbound: to_server_rx,
            outbound: from_server_tx,
        },
        PeerHandle {
            to_server: to_server_tx,
            from_server: from_server_rx,
        },
    )
}

struct Harness {
    bus: Bus,
    session_manager: Arc<SessionManager>,
    order_ids: Arc<OrderIdGenerator>,
    next_connection: ConnectionId,
}

impl Harness {
    fn new() -> Self {
        let bus = Bus::new();
        let session_manager = SessionManager::new(bus.system.clone());
        session_manager.install(&bus.market);

        let store = Arc::new(StaticCredentialStore::new(vec![("alice", "secret", 7u32)]));
        let authenticator = Authenticator::new(bus.system.clone(), store);
        authenticator.install();

        Self {
            bus,
            session_manager,
            order_ids: Arc::new(OrderIdGenerator::default()),
            next_connection: 0,
        }
    }

    fn connect(&mut self, kind: ChannelKind) -> (Arc<SessionChannel>, PeerHandle) {
        let (transport, peer) = mock_pair();
        self.next_connection += 1;
        let channel = SessionChannel::new(
            self.next_connection,
            kind,
            Box::new(transport),
            self.bus.system.clone(),
            self.bus.market.clone(),
            self.order_ids.clone(),
        );
        match kind {
            ChannelKind::Upstream => self.session_manager.accept_upstream(channel.clone()),
            ChannelKind::Downstream => self.session_manager.accept_downstream(channel.clone()),
        }
        tokio::spawn(channel.clone().run());
        (channel, peer)
    }
}

fn login(name: &str, password: &str) -> ClientMessage {
    ClientMessage::Login(LoginRequest {
        name: name.to_string(),
        password: password.to_string(),
    })
}

#[tokio::test]
async fn successful_login_then_token_bind_authenticates_both_channels() {
    let mut harness = Harness::new();

    let (_upstream, mut up_peer) = harness.connect(ChannelKind::Upstream);
    up_peer.send_message(&login("alice", "secret"));

    let response = up_peer.recv_message().await;
    let ServerMessage::LoginResponse(resp) = response else {
        panic!("expected a login response");
    };
    assert!(resp.ok);
    assert_ne!(resp.token, 0);

    let (downstream, mut down_peer) = harness.connect(ChannelKind::Downstream);
    down_peer.send_message(&ClientMessage::TokenBind(TokenBindRequest { token: resp.token }));

    let bind_response = down_peer.recv_message().await;
    let ServerMessage::LoginResponse(bind_resp) = bind_response else {
        panic!("expected a token-bind response");
    };
    assert!(bind_resp.ok);
    assert_eq!(downstream.client_id(), Some(7u32 as ClientId));
}

#[tokio::test]
async fn wrong_password_is_rejected_without_creating_a_session() {
    let mut harness = Harness::new();

    let (_upstream, mut up_peer) = harness.connect(ChannelKind::Upstream);
    up_peer.send_message(&login("alice", "wrong"));

    let response = up_peer.recv_message().await;
    let ServerMessage::LoginResponse(resp) = response else {
        panic!("expected a login response");
    };
    assert!(!resp.ok);
    assert_eq!(resp.token, 0);
    assert!(resp.error.is_some());
}

#[tokio::test]
async fn duplicate_login_for_the_same_client_is_rejected() {
    let mut harness = Harness::new();

    let (_first, mut first_peer) = harness.connect(ChannelKind::Upstream);
    first_peer.send_message(&login("alice", "secret"));
    let first_response = first_peer.recv_message().await;
    let ServerMessage::LoginResponse(resp) = first_response else {
        panic!("expected a login response");
    };
    assert!(resp.ok);

    let (_second, mut second_peer) = harness.connect(ChannelKind::Upstream);
    second_peer.send_message(&login("alice", "secret"));
    let second_response = second_peer.recv_message().await;
    let ServerMessage::LoginResponse(resp2) = second_response else {
        panic!("expected a login response");
    };
    assert!(!resp2.ok);
    assert_eq!(resp2.error.as_deref(), Some("Already authorized"));
}

#[tokio::test]
async fn token_bind_with_unknown_token_is_rejected() {
    let mut harness = Harness::new();

    let (_downstream, mut down_peer) = harness.connect(ChannelKind::Downstream);
    down_peer.send_message(&ClientMessage::TokenBind(TokenBindRequest { token: 0xDEAD_BEEF }));

    let response = down_peer.recv_message().await;
    let ServerMessage::LoginResponse(resp) = response else {
        panic!("expected a token-bind response");
    };
    assert!(!resp.ok);
    assert_eq!(resp.error.as_deref(), Some("Invalid token"));
}

#[tokio::test]
async fn second_token_bind_for_an_already_bound_session_is_rejected() {
    let mut harness = Harness::new();

    let (_upstream, mut up_peer) = harness.connect(ChannelKind::Upstream);
    up_peer.send_message(&login("alice", "secret"));
    let ServerMessage::LoginResponse(resp) = up_peer.recv_message().await else {
        panic!("expected a login response");
    };

    let (_first_down, mut first_down_peer) = harness.connect(ChannelKind::Downstream);
    first_down_peer.send_message(&ClientMessage::TokenBind(TokenBindRequest { token: resp.token }));
    let ServerMessage::LoginResponse(first_bind) = first_down_peer.recv_message().await else {
        panic!("expected a token-bind response");
    };
    assert!(first_bind.ok);

    let (_second_down, mut second_down_peer) = harness.connect(ChannelKind::Downstream);
    second_down_peer.send_message(&ClientMessage::TokenBind(TokenBindRequest { token: resp.token }));
    let ServerMessage::LoginResponse(second_bind) = second_down_peer.recv_message().await else {
        panic!("expected a token-bind response");
    };
    assert!(!second_bind.ok);
    assert_eq!(second_bind.error.as_deref(), Some("Already connected"));
}

#[tokio::test]
async fn authenticated_order_is_matched_and_status_reaches_the_downstream_channel() {
    let mut harness = Harness::new();

    let coordinator_data = Arc::new(MarketData::build(&[(Ticker::new("AAPL"), 100.0)], 1));
    let pool = Arc::new(venue::worker::WorkerPool::new(&[]));
    let coordinator = Arc::new(venue::coordinator::Coordinator::new(
        coordinator_data,
        harness.bus.market.clone(),
        pool,
        Duration::from_secs(60),
    ));
    coordinator.install();

    let (_upstream, mut up_peer) = harness.connect(ChannelKind::Upstream);
    up_peer.send_message(&login("alice", "secret"));
    let ServerMessage::LoginResponse(resp) = up_peer.recv_message().await else {
        panic!("expected a login response");
    };

    let (_downstream, mut down_peer) = harness.connect(ChannelKind::Downstream);
    down_peer.send_message(&ClientMessage::TokenBind(TokenBindRequest { token: resp.token }));
    let ServerMessage::LoginResponse(bind_resp) = down_peer.recv_message().await else {
        panic!("expected a token-bind response");
    };
    assert!(bind_resp.ok);

    // A resting sell, then a crossing buy — the buy is `last_added`, so
    // it's the side whose status is reported back.
    up_peer.send_message(&ClientMessage::Order(Order {
        id: 0,
        timestamp: 0,
        ticker: Ticker::new("AAPL"),
        quantity: 10,
        price: 100.0,
        action: OrderAction::Sell,
    }));
    up_peer.send_message(&ClientMessage::Order(Order {
        id: 0,
        timestamp: 0,
        ticker: Ticker::new("AAPL"),
        quantity: 10,
        price: 100.0,
        action: OrderAction::Buy,
    }));

    let status_msg = down_peer.recv_message().await;
    let ServerMessage::OrderStatus(status) = status_msg else {
        panic!("expected an order status");
    };
    assert_eq!(status.quantity, 10);
}
