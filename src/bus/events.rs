//! Control-plane event and request types carried on the system bus.

use crate::domain::{ClientId, ConnectionId};
use crate::error::AuthError;
use crate::protocol::{LoginRequest, TokenBindRequest};

/// A `LoginRequest` lifted onto the system bus with its originating
/// connection, for the authenticator to consume.
#[derive(Debug, Clone)]
pub struct ServerLoginRequest {
    pub connection_id: ConnectionId,
    pub request: LoginRequest,
}

/// The authenticator's verdict, posted back for the session manager.
#[derive(Debug, Clone)]
pub struct ServerLoginResponse {
    pub connection_id: ConnectionId,
    pub ok: bool,
    pub client_id: Option<ClientId>,
    pub error: Option<AuthError>,
}

impl ServerLoginResponse {
    pub fn success(connection_id: ConnectionId, client_id: ClientId) -> Self {
        Self {
            connection_id,
            ok: true,
            client_id: Some(client_id),
            error: None,
        }
    }

    pub fn failure(connection_id: ConnectionId, error: AuthError) -> Self {
        Self {
            connection_id,
            ok: false,
            client_id: None,
            error: Some(error),
        }
    }
}

/// A `TokenBindRequest` lifted onto the system bus.
#[derive(Debug, Clone)]
pub struct ServerTokenBindRequest {
    pub connection_id: ConnectionId,
    pub request: TokenBindRequest,
}

/// Connection lifecycle transitions for a session channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

/// Posted by a session channel on any terminal transition.
#[derive(Debug, Clone)]
pub struct ChannelStatusEvent {
    pub connection_id: ConnectionId,
    pub status: ConnectionStatus,
    pub client_id: Option<ClientId>,
}

/// Control commands accepted on the system bus (CLI + signal handler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Shutdown,
    PriceFeedStart,
    PriceFeedStop,
    MonitorOn,
    MonitorOff,
    MonitorToggle,
    LogLevelUp,
    LogLevelDown,
}

/// Coarse-grained server lifecycle events, for the control plane / tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    Operational,
    ShuttingDown,
}
