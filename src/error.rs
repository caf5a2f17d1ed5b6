//! Error taxonomy for the matching venue.
//!
//! Hot paths never throw across thread boundaries: a [`VenueError`] either
//! terminates the message (dropped, logged) or the channel (closed, status
//! event posted). Nothing on the `ServerOrder` / `ServerOrderStatus` path
//! propagates an error value — see `bus::market`.

use thiserror::Error;

/// Categorized failures, matching the error taxonomy in the design notes.
#[derive(Debug, Error)]
pub enum VenueError {
    /// Remote closed, write failed, ring full. Channel-fatal.
    #[error("transport error: {0}")]
    Transport(String),

    /// Body length exceeds capacity, or a partial frame could not be
    /// completed. Buffer-fatal.
    #[error("framing error: {0}")]
    Framing(String),

    /// Message failed to deserialize. Message-fatal, channel survives.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Credential check failed.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Unknown ticker, or no downstream channel for a client.
    #[error("routing error: {0}")]
    Routing(String),

    /// Connection limit, order-book limit, or ring full.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// Config invalid at load. Fatal, refuses to start.
    #[error("config error: {0}")]
    Config(String),

    /// Uncaught failure on a worker or network thread.
    #[error("fatal error: {0}")]
    Fatal(String),
}

/// Authentication failure kinds, surfaced verbatim in `LoginResponse.error`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,
    #[error("invalid password")]
    InvalidPassword,
    #[error("credential store error: {0}")]
    DbError(String),
    #[error("already authorized")]
    AlreadyAuthorized,
    #[error("invalid token")]
    InvalidToken,
    #[error("already connected")]
    AlreadyConnected,
    #[error("credential check timed out")]
    Timeout,
}

pub type VenueResult<T> = Result<T, VenueError>;
