//! SHM-backed `Transport` implementation: a `ByteRing` pair plus a
//! reactor handle to wake the peer after every send.
//!
//! Grounded on `examples/original_source/common/src/network/transport/shm/shm_transport.hpp`.
//! Unlike the TCP/UDP transports, recv is driven by polling the ring
//! rather than an OS readiness notification, so `recv` spins briefly
//! before yielding to the runtime — the SHM path trades CPU for latency
//! by design.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::reactor::{Drainable, ShmReactor};
use super::ring::ByteRing;
use crate::transport::{IoResult, Transport};

/// One direction of SHM communication: a ring to write into and the
/// ring to poll for incoming bytes, plus the reactor used to wake the
/// peer after a write.
pub struct ShmTransport {
    tx_ring: Arc<ByteRing>,
    rx_ring: Arc<ByteRing>,
    reactor: Arc<ShmReactor>,
    rx_is_upstream: bool,
    spin_budget: u32,
}

impl ShmTransport {
    pub fn new(
        tx_ring: Arc<ByteRing>,
        rx_ring: Arc<ByteRing>,
        reactor: Arc<ShmReactor>,
        rx_is_upstream: bool,
    ) -> Self {
        Self {
            tx_ring,
            rx_ring,
            reactor,
            rx_is_upstream,
            spin_budget: 2000,
        }
    }
}

#[async_trait]
impl Transport for ShmTransport {
    async fn recv(&mut self, buf: &mut [u8]) -> (IoResult, usize) {
        let mut spins = 0u32;
        loop {
            let n = self.rx_ring.read(buf);
            if n > 0 {
                return (IoResult::Ok, n);
            }
            if !self.reactor.running() {
                return (IoResult::Closed, 0);
            }
            spins += 1;
            if spins < self.spin_budget {
                std::hint::spin_loop();
            } else {
                tokio::time::sleep(Duration::from_micros(50)).await;
            }
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> IoResult {
        if !self.tx_ring.write(bytes) {
            return IoResult::Error;
        }
        self.reactor.notify();
        IoResult::Ok
    }

    fn close(&mut self) {
        self.reactor.stop();
    }
}

/// Registers an `ShmTransport`'s receive ring with a reactor so the
/// reactor's drain loop can poll it eagerly instead of relying solely on
/// the polling `recv` future.
pub struct RingDrain {
    ring: Arc<ByteRing>,
    is_upstream: bool,
    scratch_len: usize,
}

impl RingDrain {
    pub fn new(ring: Arc<ByteRing>, is_upstream: bool) -> Self {
        Self {
            ring,
            is_upstream,
            scratch_len: 4096,
        }
    }
}

impl Drainable for RingDrain {
    fn try_drain(&self) -> usize {
        let mut scratch = vec![0u8; self.scratch_len];
        self.ring.read(&mut scratch)
    }

    fn is_upstream(&self) -> bool {
        self.is_upstream
    }
}
