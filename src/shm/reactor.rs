//! Futex-coordinated drain loop for SHM transports.
//!
//! Grounded on
//! `examples/original_source/common/src/network/transport/shm/shm_reactor.hpp`.
//! Each side (server/client) holds a local-futex word (its own inbox) and
//! a remote-futex word (its peer's inbox). `notify()` bumps the peer's
//! counter and wakes it; `run()` busy-waits then blocks until its own
//! counter changes, then drains every registered transport whose role
//! matches this reactor's role.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::futex::{futex_wake, wait_for_change};
use super::layout::ShmLayout;

/// Which side of the handshake a reactor drives. The server reactor
/// drains the upstream ring (client → server); the client reactor drains
/// downstream and broadcast (server → client).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorRole {
    Server,
    Client,
}

/// Anything the reactor can drain: `try_drain` pulls whatever is
/// available and delivers it, returning the number of bytes drained.
pub trait Drainable: Send + Sync {
    fn try_drain(&self) -> usize;
    /// Whether this transport belongs to the upstream ring (only
    /// relevant to deciding which role drains it).
    fn is_upstream(&self) -> bool;
}

/// Drives the non-blocking SHM transports registered with it.
pub struct ShmReactor {
    role: ReactorRole,
    layout: *const ShmLayout,
    transports: RwLock<Vec<Arc<dyn Drainable>>>,
    running: AtomicBool,
    seq_counter: AtomicU32,
}

// SAFETY: `layout` points at a `ShmLayout` living in a memory-mapped
// region that outlives every reactor built on it (enforced by the
// caller holding the `ShmRegion` alive); access is through atomics only.
unsafe impl Send for ShmReactor {}
unsafe impl Sync for ShmReactor {}

impl ShmReactor {
    /// # Safety
    /// `layout` must remain valid for the reactor's entire lifetime.
    pub unsafe fn new(layout: *const ShmLayout, role: ReactorRole) -> Self {
        Self {
            role,
            layout,
            transports: RwLock::new(Vec::new()),
            running: AtomicBool::new(false),
            seq_counter: AtomicU32::new(0),
        }
    }

    pub fn add(&self, transport: Arc<dyn Drainable>) {
        self.transports.write().push(transport);
    }

    fn layout(&self) -> &ShmLayout {
        unsafe { &*self.layout }
    }

    fn local_ftx(&self) -> &AtomicU32 {
        match self.role {
            ReactorRole::Server => &self.layout().upstream_ftx,
            ReactorRole::Client => &self.layout().downstream_ftx,
        }
    }

    fn remote_ftx(&self) -> &AtomicU32 {
        match self.role {
            ReactorRole::Server => &self.layout().downstream_ftx,
            ReactorRole::Client => &self.layout().upstream_ftx,
        }
    }

    /// Runs the drain loop until `stop()` is called. Intended to be the
    /// entire body of a dedicated reactor thread.
    pub fn run(&self) {
        self.running.store(true, Ordering::Release);
        let mut last_seen = self.seq_counter.load(Ordering::Relaxed);

        while self.running.load(Ordering::Acquire) {
            let current = wait_for_change(self.local_ftx(), last_seen);
            if !self.running.load(Ordering::Acquire) {
                return;
            }
            for transport in self.transports.read().iter() {
                let drains_upstream =
                    matches!(self.role, ReactorRole::Server) == transport.is_upstream();
                if drains_upstream {
                    transport.try_drain();
                }
            }
            last_seen = current;
            self.seq_counter.store(current, Ordering::Relaxed);
        }
    }

    /// Stops the loop and wakes both sides so neither blocks forever.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        futex_wake(self.local_ftx());
        futex_wake(self.remote_ftx());
    }

    /// Bumps the peer's counter and wakes it.
    pub fn notify(&self) {
        self.remote_ftx().fetch_add(1, Ordering::Release);
        futex_wake(self.remote_ftx());
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::layout::ShmRegion;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingDrain {
        upstream: bool,
        drains: AtomicUsize,
    }

    impl Drainable for CountingDrain {
        fn try_drain(&self) -> usize {
            self.drains.fetch_add(1, Ordering::SeqCst);
            0
        }
        fn is_upstream(&self) -> bool {
            self.upstream
        }
    }

    #[test]
    fn notify_wakes_a_blocked_reactor() {
        let path =
            std::env::temp_dir().join(format!("venue-shm-reactor-test-{}", std::process::id()));
        let path = path.to_str().unwrap().to_string();
        let region = ShmRegion::create(&path).unwrap();
        let layout_ptr = unsafe { region.layout() as *const ShmLayout };

        let server_reactor = Arc::new(unsafe { ShmReactor::new(layout_ptr, ReactorRole::Server) });
        let drain = Arc::new(CountingDrain {
            upstream: true,
            drains: AtomicUsize::new(0),
        });
        server_reactor.add(drain.clone());

        let runner = server_reactor.clone();
        let handle = std::thread::spawn(move || runner.run());

        // Give the reactor a moment to enter its wait.
        std::thread::sleep(Duration::from_millis(20));

        let client_reactor = unsafe { ShmReactor::new(layout_ptr, ReactorRole::Client) };
        client_reactor.notify();

        std::thread::sleep(Duration::from_millis(20));
        server_reactor.stop();
        handle.join().unwrap();

        assert!(drain.drains.load(Ordering::SeqCst) >= 1);
        let _ = std::fs::remove_file(&path);
    }
}
