//! Owns every live connection: the two unauthenticated connection maps
//! and the authenticated session map, and drives the login/token-bind
//! handshake.
//!
//! Grounded on `examples/original_source/server/src/session_manager.hpp`.
//! `folly::AtomicHashMap` there becomes `dashmap::DashMap` here — the
//! same concurrent-map substitution `usealtoal-edgelord` makes for its
//! own connection registry.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use crate::bus::events::{ChannelStatusEvent, ConnectionStatus, ServerLoginResponse};
use crate::bus::{MarketBus, SystemBus};
use crate::domain::{ClientId, ConnectionId, ServerOrderStatus, Token};
use crate::protocol::LoginResponse;
use crate::session::channel::SessionChannel;

/// Maximum concurrently tracked connections across all three maps,
/// matching `MAX_CONNECTIONS` in the original's constants header.
pub const MAX_CONNECTIONS: usize = 65_536;

struct Session {
    client_id: ClientId,
    token: Token,
    upstream: Arc<SessionChannel>,
    downstream: Option<Arc<SessionChannel>>,
}

/// Generates an opaque, server-issued session token. A real deployment
/// would draw from a CSPRNG; `rand::random` is adequate here since the
/// token only needs to be hard to guess within a session's lifetime.
fn generate_token() -> Token {
    rand::random::<u64>()
}

pub struct SessionManager {
    system_bus: Arc<SystemBus>,
    unauth_upstream: DashMap<ConnectionId, Arc<SessionChannel>>,
    unauth_downstream: DashMap<ConnectionId, Arc<SessionChannel>>,
    sessions: DashMap<ClientId, Session>,
}

impl SessionManager {
    pub fn new(system_bus: Arc<SystemBus>) -> Arc<Self> {
        Arc::new(Self {
            system_bus,
            unauth_upstream: DashMap::new(),
            unauth_downstream: DashMap::new(),
            sessions: DashMap::new(),
        })
    }

    /// Wires this manager's handlers onto the system and market buses.
    /// Call once at startup after construction.
    pub fn install(self: &Arc<Self>, market_bus: &MarketBus) {
        let this = self.clone();
        market_bus.set_status_handler(move |status| this.on_order_status(status));

        let this = self.clone();
        self.system_bus
            .subscribe_login_response(move |event| this.on_login_response(event));

        let this = self.clone();
        self.system_bus
            .subscribe_token_bind_request(move |event| this.on_token_bind_request(event));

        let this = self.clone();
        self.system_bus
            .subscribe_channel_status(move |event| this.on_channel_status(event));
    }

    pub fn accept_upstream(&self, channel: Arc<SessionChannel>) {
        info!(connection_id = channel.connection_id(), "new upstream connection");
        if self.sessions.len() >= MAX_CONNECTIONS {
            error!("connection limit reached");
            return;
        }
        self.unauth_upstream.insert(channel.connection_id(), channel);
    }

    pub fn accept_downstream(&self, channel: Arc<SessionChannel>) {
        info!(connection_id = channel.connection_id(), "new downstream connection");
        if self.sessions.len() >= MAX_CONNECTIONS {
            error!("connection limit reached");
            return;
        }
        self.unauth_downstream.insert(channel.connection_id(), channel);
    }

    /// Closes every tracked channel. Order matters: authenticated
    /// sessions first, then the still-pending connections, mirroring the
    /// destruction order the original calls out.
    pub async fn close_all(&self) {
        for entry in self.sessions.iter() {
            entry.upstream.close().await;
            if let Some(downstream) = &entry.downstream {
                downstream.close().await;
            }
        }
        for entry in self.unauth_upstream.iter() {
            entry.close().await;
        }
        for entry in self.unauth_downstream.iter() {
            entry.close().await;
        }
        self.sessions.clear();
        self.unauth_upstream.clear();
        self.unauth_downstream.clear();
    }

    fn on_order_status(&self, status: ServerOrderStatus) {
        debug!(client_id = status.client_id, "order status");
        let Some(session) = self.sessions.get(&status.client_id) else {
            debug!(client_id = status.client_id, "client is offline");
            return;
        };
        if let Some(downstream) = &session.downstream {
            let downstream = downstream.clone();
            tokio::spawn(async move {
                downstream
                    .post(crate::protocol::ServerMessage::OrderStatus(status.status))
                    .await;
            });
        } else {
            info!(client_id = status.client_id, "no downstream connection");
        }
    }

    fn on_login_response(&self, result: &ServerLoginResponse) {
        debug!(ok = result.ok, client_id = ?result.client_id, "login response");
        let Some((_, channel)) = self.unauth_upstream.remove(&result.connection_id) else {
            error!(connection_id = result.connection_id, "connection not found");
            return;
        };

        if !result.ok {
            error!(connection_id = result.connection_id, "authentication failed, closing channel");
            let channel = channel.clone();
            let error = result.error.clone().map(|e| e.to_string());
            tokio::spawn(async move {
                channel
                    .post(crate::protocol::ServerMessage::LoginResponse(LoginResponse {
                        token: 0,
                        ok: false,
                        error,
                    }))
                    .await;
            });
            return;
        }

        let Some(client_id) = result.client_id else {
            error!("login response marked ok with no client id");
            return;
        };
        let token = generate_token();

        if self.sessions.contains_key(&client_id) {
            error!(client_id, "already authorized");
            let channel = channel.clone();
            tokio::spawn(async move {
                channel
                    .post(crate::protocol::ServerMessage::LoginResponse(LoginResponse {
                        token: 0,
                        ok: false,
                        error: Some("Already authorized".to_string()),
                    }))
                    .await;
            });
            return;
        }

        self.sessions.insert(
            client_id,
            Session {
                client_id,
                token,
                upstream: channel.clone(),
                downstream: None,
            },
        );
        channel.authenticate(client_id);
        let channel = channel.clone();
        tokio::spawn(async move {
            channel
                .post(crate::protocol::ServerMessage::LoginResponse(LoginResponse {
                    token,
                    ok: true,
                    error: None,
                }))
                .await;
        });
    }

    fn on_token_bind_request(&self, event: &crate::bus::events::ServerTokenBindRequest) {
        debug!(connection_id = event.connection_id, token = event.request.token, "token bind request");
        let Some((_, downstream)) = self.unauth_downstream.remove(&event.connection_id) else {
            warn!("client already disconnected");
            return;
        };

        let token = event.request.token;
        let matched = self
            .sessions
            .iter()
            .find(|entry| entry.token == token)
            .map(|entry| entry.client_id);

        let Some(client_id) = matched else {
            error!(connection_id = event.connection_id, "invalid token received");
            let downstream = downstream.clone();
            tokio::spawn(async move {
                downstream
                    .post(crate::protocol::ServerMessage::LoginResponse(LoginResponse {
                        token: 0,
                        ok: false,
                        error: Some("Invalid token".to_string()),
                    }))
                    .await;
            });
            return;
        };

        let mut session = self.sessions.get_mut(&client_id).unwrap();
        if session.downstream.is_some() {
            error!(connection_id = event.connection_id, "downstream already connected");
            drop(session);
            let downstream = downstream.clone();
            tokio::spawn(async move {
                downstream
                    .post(crate::protocol::ServerMessage::LoginResponse(LoginResponse {
                        token: 0,
                        ok: false,
                        error: Some("Already connected".to_string()),
                    }))
                    .await;
            });
            return;
        }

        session.downstream = Some(downstream.clone());
        downstream.authenticate(client_id);
        let token = session.token;
        drop(session);
        info!(client_id, token, "new session");
        let sessions = self.sessions.len();
        info!(active_sessions = sessions, "session stats");

        tokio::spawn(async move {
            downstream
                .post(crate::protocol::ServerMessage::LoginResponse(LoginResponse {
                    token,
                    ok: true,
                    error: None,
                }))
                .await;
        });
    }

    fn on_channel_status(&self, event: &ChannelStatusEvent) {
        match event.status {
            ConnectionStatus::Connected => {}
            ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                debug!(connection_id = event.connection_id, "channel disconnected");
                self.unauth_upstream.remove(&event.connection_id);
                self.unauth_downstream.remove(&event.connection_id);
                if let Some(client_id) = event.client_id {
                    if self.sessions.remove(&client_id).is_some() {
                        info!(client_id, "client disconnected");
                        info!(active_sessions = self.sessions.len(), "session stats");
                    }
                }
            }
        }
    }
}
