//! CPU-pinned worker pool. Each worker owns a single-threaded FIFO task
//! queue and runs a dedicated OS thread, optionally pinned to a core via
//! `core_affinity` — the style used for core pinning in
//! `examples/cooprefr-bettersys/rust-backend/src/edge/receiver.rs`.
//!
//! Grounded on `examples/original_source/common/src/worker.hpp`: there a
//! `Worker` wraps a boost `io_context` run on a dedicated thread; here a
//! worker wraps an unbounded `crossbeam_channel` drained on a dedicated
//! thread. Posting a task is `post()`; the original's `ioCtx.post(...)` is
//! this crate's channel send. The thread body also attempts `SCHED_FIFO`
//! elevation before entering its loop, same as the original's
//! `utils::setTheadRealTime()` call.

use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};
use tracing::{debug, error, warn};

use crate::domain::ThreadId;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Best-effort `SCHED_FIFO` elevation for the calling thread, mirroring
/// `utils::setTheadRealTime` in `examples/original_source/common/src/utils/utils.cpp`.
/// Requires `CAP_SYS_NICE` or root; an unprivileged process simply stays
/// on the default scheduler, logged at debug rather than treated as an
/// error.
fn set_realtime_priority(worker_id: ThreadId) {
    let param = libc::sched_param { sched_priority: 99 };
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc != 0 {
        debug!(worker = worker_id, "could not elevate to SCHED_FIFO, continuing at default priority");
    }
}

/// A single worker thread with its own task queue.
pub struct Worker {
    id: ThreadId,
    sender: parking_lot::Mutex<Option<Sender<Task>>>,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Spawns the worker thread. If `core_id` is `Some`, attempts to pin
    /// it; pinning failure is logged and degrades to an unpinned thread
    /// rather than failing startup.
    pub fn spawn(id: ThreadId, core_id: Option<core_affinity::CoreId>) -> Self {
        let (sender, receiver) = channel::unbounded::<Task>();

        let handle = std::thread::Builder::new()
            .name(format!("venue-worker-{id}"))
            .spawn(move || {
                set_realtime_priority(id);
                if let Some(core) = core_id {
                    if core_affinity::set_for_current(core) {
                        debug!(worker = id, core = core.id, "pinned worker thread");
                    } else {
                        warn!(worker = id, core = core.id, "failed to pin worker thread, continuing unpinned");
                    }
                }
                for task in receiver.iter() {
                    task();
                }
            })
            .expect("failed to spawn worker thread");

        Self {
            id,
            sender: parking_lot::Mutex::new(Some(sender)),
            handle: parking_lot::Mutex::new(Some(handle)),
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Enqueues a task for this worker's thread. Errors (receiver
    /// dropped, meaning the worker already stopped) are logged and
    /// dropped — mirrors `io_context::post` on a stopped context.
    pub fn post<F: FnOnce() + Send + 'static>(&self, task: F) {
        let sent = match self.sender.lock().as_ref() {
            Some(sender) => sender.send(Box::new(task)).is_ok(),
            None => false,
        };
        if !sent {
            error!(worker = self.id, "worker queue closed, task dropped");
        }
    }

    /// Drops the sender (so the thread's receive loop ends) and joins
    /// the thread. Takes `&self` so `WorkerPool::stop_all` can be called
    /// through a shared `Arc<WorkerPool>`.
    pub fn stop(&self) {
        self.sender.lock().take();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

/// A fixed pool of workers, one task queue per core. Falls back to a
/// single unpinned worker when no core list is configured, mirroring
/// `Coordinator::startWorkers`'s empty-`coresApp` case.
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    pub fn new(core_ids: &[usize]) -> Self {
        if core_ids.is_empty() {
            return Self {
                workers: vec![Worker::spawn(0, None)],
            };
        }

        let available = core_affinity::get_core_ids().unwrap_or_default();
        let workers = core_ids
            .iter()
            .enumerate()
            .map(|(i, &core_idx)| {
                let core = available.get(core_idx).copied();
                if core.is_none() {
                    warn!(core_idx, "requested core index out of range, spawning unpinned");
                }
                Worker::spawn(i, core)
            })
            .collect();
        Self { workers }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn post_to<F: FnOnce() + Send + 'static>(&self, worker_id: ThreadId, task: F) {
        self.workers[worker_id].post(task);
    }

    pub fn stop_all(&self) {
        for worker in &self.workers {
            worker.stop();
        }
    }
}
