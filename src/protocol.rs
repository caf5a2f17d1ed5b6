//! Wire-level message set. Framing (`crate::framing`) is serializer
//! agnostic; this module only defines the payload shapes.

use serde::{Deserialize, Serialize};

use crate::domain::{Order, OrderStatus, Ticker, Price, Token};

/// First message on a fresh upstream connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

/// First message on a fresh downstream connection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenBindRequest {
    pub token: Token,
}

/// Sent back over whichever channel (upstream on login, downstream on
/// token bind) completed the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: Token,
    pub ok: bool,
    pub error: Option<String>,
}

/// Every message a client may send, pre- or post- authentication. The
/// session channel enforces which variants are legal before
/// authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    Login(LoginRequest),
    TokenBind(TokenBindRequest),
    Order(Order),
}

/// Every message the server may post to a client channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    LoginResponse(LoginResponse),
    OrderStatus(OrderStatus),
}

/// The single message type flowing over the broadcast channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub ticker: Ticker,
    pub price: Price,
}
