//! Session handling: per-connection channels and the manager that owns
//! them and drives the login/token-bind handshake.

pub mod channel;
pub mod manager;

pub use channel::{ChannelKind, SessionChannel};
pub use manager::SessionManager;
