//! A single client connection: a transport, a framing codec, and the
//! pre-/post-authentication message routing.
//!
//! Grounded on `examples/original_source/server/src/session_manager.hpp`'s
//! `SessionChannel` template parameter (there, a compile-time template
//! over transport + serializer; here, a trait object over `Transport`
//! since the session map already pays a hash lookup per the "Dynamic
//! dispatch" design note).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, warn};

use crate::bus::events::{
    ChannelStatusEvent, ConnectionStatus, ServerLoginRequest, ServerTokenBindRequest,
};
use crate::bus::{MarketBus, SystemBus};
use crate::domain::{ClientId, ConnectionId, OrderIdGenerator, ServerOrder};
use crate::framing;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::Transport;

/// Which side of the handshake a channel serves — decides which
/// unauthenticated message variant is legal on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Upstream,
    Downstream,
}

const RECV_BUF: usize = 8192;

pub struct SessionChannel {
    connection_id: ConnectionId,
    kind: ChannelKind,
    transport: AsyncMutex<Box<dyn Transport>>,
    client_id: RwLock<Option<ClientId>>,
    authenticated: AtomicBool,
    system_bus: Arc<SystemBus>,
    market_bus: Arc<MarketBus>,
    order_ids: Arc<OrderIdGenerator>,
}

impl SessionChannel {
    pub fn new(
        connection_id: ConnectionId,
        kind: ChannelKind,
        transport: Box<dyn Transport>,
        system_bus: Arc<SystemBus>,
        market_bus: Arc<MarketBus>,
        order_ids: Arc<OrderIdGenerator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection_id,
            kind,
            transport: AsyncMutex::new(transport),
            client_id: RwLock::new(None),
            authenticated: AtomicBool::new(false),
            system_bus,
            market_bus,
            order_ids,
        })
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        *self.client_id.read()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Marks the channel authenticated for `client_id`. Idempotent.
    pub fn authenticate(&self, client_id: ClientId) {
        *self.client_id.write() = Some(client_id);
        self.authenticated.store(true, Ordering::Release);
    }

    /// Frames and writes `msg`. Logs and drops on a transport error —
    /// matching the original's "fatal for the message" treatment of a
    /// saturated `async_tx`.
    pub async fn post(&self, msg: ServerMessage) {
        let bytes = match framing::frame(&msg) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(connection_id = self.connection_id, %err, "failed to frame outgoing message");
                return;
            }
        };
        let result = self.transport.lock().await.send(&bytes).await;
        if result != crate::transport::IoResult::Ok {
            warn!(connection_id = self.connection_id, "write failed, closing channel");
            self.close().await;
        }
    }

    /// Closes the transport and publishes the disconnect event. Safe to
    /// call more than once.
    pub async fn close(&self) {
        self.transport.lock().await.close();
        self.system_bus.post_channel_status(ChannelStatusEvent {
            connection_id: self.connection_id,
            status: ConnectionStatus::Disconnected,
            client_id: self.client_id(),
        });
    }

    /// Drives the receive loop until the transport closes or errors.
    /// Spawned as its own task by the acceptor; runs until completion.
    pub async fn run(self: Arc<Self>) {
        let mut pending = Vec::with_capacity(RECV_BUF);
        let mut read_buf = vec![0u8; RECV_BUF];
        loop {
            let (result, n) = {
                let mut transport = self.transport.lock().await;
                transport.recv(&mut read_buf).await
            };
            match result {
                crate::transport::IoResult::Ok if n > 0 => {
                    pending.extend_from_slice(&read_buf[..n]);
                }
                crate::transport::IoResult::Ok => continue,
                crate::transport::IoResult::Closed => {
                    debug!(connection_id = self.connection_id, "channel closed by peer");
                    break;
                }
                crate::transport::IoResult::Error => {
                    warn!(connection_id = self.connection_id, "read error, closing channel");
                    break;
                }
            }

            let consumed =
                match framing::unframe::<ClientMessage, _>(&pending, |msg| self.dispatch(msg)) {
                    Ok(c) => c,
                    Err(err) => {
                        error!(connection_id = self.connection_id, %err, "framing error, closing channel");
                        self.close().await;
                        return;
                    }
                };
            pending.drain(..consumed);
        }
        self.close().await;
    }

    fn dispatch(&self, msg: ClientMessage) {
        if !self.is_authenticated() {
            match (self.kind, msg) {
                (ChannelKind::Upstream, ClientMessage::Login(request)) => {
                    self.system_bus.post_login_request(ServerLoginRequest {
                        connection_id: self.connection_id,
                        request,
                    });
                }
                (ChannelKind::Downstream, ClientMessage::TokenBind(request)) => {
                    self.system_bus
                        .post_token_bind_request(ServerTokenBindRequest {
                            connection_id: self.connection_id,
                            request,
                        });
                }
                (_, other) => {
                    warn!(connection_id = self.connection_id, kind = ?self.kind, ?other, "illegal pre-auth message, dropped");
                }
            }
            return;
        }

        match msg {
            ClientMessage::Order(mut order) => {
                order.id = self.order_ids.next();
                let Some(client_id) = self.client_id() else {
                    return;
                };
                self.market_bus.post_order(ServerOrder { client_id, order });
            }
            other => {
                debug!(connection_id = self.connection_id, ?other, "unexpected post-auth message, dropped");
            }
        }
    }
}
