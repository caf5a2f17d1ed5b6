//! Transport abstraction: a capability trait per role, with TCP, UDP and
//! SHM implementors behind it.
//!
//! The original is callback-driven (`async_rx`/`async_tx` arm a single
//! completion callback); here each await point is an explicit suspension,
//! per the "Coroutine/event-loop flow" design note — `recv`/`send` are
//! plain `async fn`s instead of callback-arming calls.

pub mod tcp;
pub mod udp;

use async_trait::async_trait;

/// Outcome of a suspended I/O operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoResult {
    Ok,
    Closed,
    Error,
}

/// A byte-stream or datagram endpoint. Implementors: `TcpTransport`,
/// `UdpTransport`, `shm::transport::ShmTransport`.
///
/// Used as a trait object in the session map (the lookup there already
/// costs a hash, per the design notes); the hot order-processing path
/// never goes through a `dyn Transport`.
#[async_trait]
pub trait Transport: Send {
    /// Reads into `buf`, returning the number of bytes read. `Ok(0)`
    /// means the peer half-closed cleanly.
    async fn recv(&mut self, buf: &mut [u8]) -> (IoResult, usize);

    /// Writes `bytes` in full, or fails after the implementor's
    /// `BUSY_WAIT_CYCLES`/backpressure budget is exhausted.
    async fn send(&mut self, bytes: &[u8]) -> IoResult;

    /// Releases the underlying handle. Idempotent.
    fn close(&mut self);
}
