//! Single-producer / single-consumer ring buffers.
//!
//! Two shapes coexist: a byte ring (split-memcpy,
//! cache-aligned head/tail) and a slot ring (fixed-size slots with a
//! per-slot sequence number). Grounded on
//! `examples/original_source/common/src/network/transport/shm/shm_ring_buffer.hpp`,
//! cross-checked against the cache-aligned SPSC design in
//! `examples/other_examples/83792f40_debasishg-ringmpsc-rs__src-ring.rs.rs`.
//!
//! Neither type synchronizes beyond atomics: exactly one producer and one
//! consumer, enforced by the caller (the transport layer owns each ring
//! end exclusively).

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Total capacity in bytes. Must be a power of two.
pub const RING_SIZE: usize = 16 * 1024 * 1024;
const MASK: usize = RING_SIZE - 1;

/// Cache-line aligned single-producer/single-consumer byte ring. Writes
/// are single-shot: they either fully succeed or return `false` with no
/// partial write. Wraparound is handled by a split memcpy.
#[repr(align(64))]
pub struct ByteRing {
    head: AtomicU64,
    cached_head: UnsafeCell<u64>,
    tail: AtomicU64,
    cached_tail: UnsafeCell<u64>,
    data: UnsafeCell<Box<[u8; RING_SIZE]>>,
}

// SAFETY: `ByteRing` is sound under the single-producer/single-consumer
// discipline documented above: `write` only touches `tail`/`cached_head`,
// `read` only touches `head`/`cached_tail`, and the `data` region each
// touches is disjoint at any instant because `write` never advances past
// unread bytes and `read` never advances past unwritten bytes.
unsafe impl Sync for ByteRing {}
unsafe impl Send for ByteRing {}

impl Default for ByteRing {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteRing {
    pub fn new() -> Self {
        Self {
            head: AtomicU64::new(0),
            cached_head: UnsafeCell::new(0),
            tail: AtomicU64::new(0),
            cached_tail: UnsafeCell::new(0),
            data: UnsafeCell::new(Box::new([0u8; RING_SIZE])),
        }
    }

    /// Producer side only. Returns `false` if there is not enough free
    /// space for the whole of `buf` — no partial writes occur.
    pub fn write(&self, buf: &[u8]) -> bool {
        let len = buf.len() as u64;
        let t = self.tail.load(Ordering::Relaxed);
        // SAFETY: single producer owns `cached_head`.
        let cached = unsafe { *self.cached_head.get() };

        let mut h = cached;
        if len > RING_SIZE as u64 - (t - h) - 1 {
            h = self.head.load(Ordering::Acquire);
            unsafe {
                *self.cached_head.get() = h;
            }
            if len > RING_SIZE as u64 - (t - h) - 1 {
                return false;
            }
        }

        let offset = (t as usize) & MASK;
        let first_part = (len as usize).min(RING_SIZE - offset);
        // SAFETY: `[offset, offset+first_part)` and any wraparound tail
        // are bytes the consumer has already released (bounded by the
        // free-space check above); only the producer writes here.
        unsafe {
            let data = &mut *self.data.get();
            data[offset..offset + first_part].copy_from_slice(&buf[..first_part]);
            if first_part < buf.len() {
                data[..buf.len() - first_part].copy_from_slice(&buf[first_part..]);
            }
        }

        self.tail.store(t + len, Ordering::Release);
        true
    }

    /// Consumer side only. Returns the number of bytes read into `buf`
    /// (up to `buf.len()`), or `0` if nothing is available.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let h = self.head.load(Ordering::Relaxed);
        // SAFETY: single consumer owns `cached_tail`.
        let mut t = unsafe { *self.cached_tail.get() };

        let mut avail = t - h;
        if avail == 0 {
            t = self.tail.load(Ordering::Acquire);
            unsafe {
                *self.cached_tail.get() = t;
            }
            avail = t - h;
            if avail == 0 {
                return 0;
            }
        }

        let to_read = (avail as usize).min(buf.len());
        let offset = (h as usize) & MASK;
        let first_part = to_read.min(RING_SIZE - offset);
        // SAFETY: only the consumer reads; these bytes were published by
        // the producer's `Release` store to `tail` above.
        unsafe {
            let data = &*self.data.get();
            buf[..first_part].copy_from_slice(&data[offset..offset + first_part]);
            if first_part < to_read {
                buf[first_part..to_read].copy_from_slice(&data[..to_read - first_part]);
            }
        }

        self.head.store(h + to_read as u64, Ordering::Release);
        to_read
    }
}

/// Number of slots in a `SlotRing`.
pub const SLOT_COUNT: usize = 128 * 1024;
/// Payload bytes carried per slot.
pub const DATA_CAPACITY: usize = 56;

struct Slot {
    seq: AtomicU64,
    len: UnsafeCell<u16>,
    data: UnsafeCell<[u8; DATA_CAPACITY]>,
}

/// A slot-sequence SPSC ring: each slot carries a sequence number
/// initialized to its own index. The producer waits for `seq == p_idx`,
/// writes, then stores `p_idx + 1` (release); the consumer waits for
/// `seq == c_idx + 1`, reads, then stores `c_idx + SLOT_COUNT` (release).
/// Messages larger than `DATA_CAPACITY` are rejected.
pub struct SlotRing {
    slots: Box<[Slot]>,
    p_idx: UnsafeCell<u64>,
    c_idx: UnsafeCell<u64>,
}

unsafe impl Sync for SlotRing {}
unsafe impl Send for SlotRing {}

impl Default for SlotRing {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotRing {
    pub fn new() -> Self {
        let slots: Vec<Slot> = (0..SLOT_COUNT)
            .map(|i| Slot {
                seq: AtomicU64::new(i as u64),
                len: UnsafeCell::new(0),
                data: UnsafeCell::new([0u8; DATA_CAPACITY]),
            })
            .collect();
        Self {
            slots: slots.into_boxed_slice(),
            p_idx: UnsafeCell::new(0),
            c_idx: UnsafeCell::new(0),
        }
    }

    /// Producer side only. `false` if the slot is not yet free (ring
    /// full) or `payload` exceeds `DATA_CAPACITY`.
    pub fn try_write(&self, payload: &[u8]) -> bool {
        if payload.len() > DATA_CAPACITY {
            return false;
        }
        // SAFETY: single producer owns `p_idx`.
        let p_idx = unsafe { *self.p_idx.get() };
        let slot = &self.slots[(p_idx as usize) % SLOT_COUNT];
        if slot.seq.load(Ordering::Acquire) != p_idx {
            return false;
        }
        unsafe {
            *slot.len.get() = payload.len() as u16;
            (*slot.data.get())[..payload.len()].copy_from_slice(payload);
            *self.p_idx.get() = p_idx + 1;
        }
        slot.seq.store(p_idx + 1, Ordering::Release);
        true
    }

    /// Consumer side only. Returns `None` if the next slot is not yet
    /// published.
    pub fn try_read(&self) -> Option<Vec<u8>> {
        // SAFETY: single consumer owns `c_idx`.
        let c_idx = unsafe { *self.c_idx.get() };
        let slot = &self.slots[(c_idx as usize) % SLOT_COUNT];
        if slot.seq.load(Ordering::Acquire) != c_idx + 1 {
            return None;
        }
        let out = unsafe {
            let len = *slot.len.get() as usize;
            (*slot.data.get())[..len].to_vec()
        };
        slot.seq.store(c_idx + SLOT_COUNT as u64, Ordering::Release);
        unsafe {
            *self.c_idx.get() = c_idx + 1;
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_ring_spsc_roundtrip() {
        let ring = ByteRing::new();
        assert!(ring.write(b"hello"));
        let mut buf = [0u8; 16];
        let n = ring.read(&mut buf);
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn byte_ring_rejects_oversized_write() {
        let ring = ByteRing::new();
        let huge = vec![0u8; RING_SIZE];
        assert!(!ring.write(&huge));
    }

    #[test]
    fn byte_ring_wraparound() {
        let ring = ByteRing::new();
        let chunk = vec![7u8; RING_SIZE - 10];
        assert!(ring.write(&chunk));
        let mut buf = vec![0u8; chunk.len()];
        assert_eq!(ring.read(&mut buf), chunk.len());

        // This write wraps past the end of the backing array.
        let second = vec![9u8; 20];
        assert!(ring.write(&second));
        let mut buf2 = vec![0u8; 20];
        assert_eq!(ring.read(&mut buf2), 20);
        assert_eq!(buf2, second);
    }

    #[test]
    fn slot_ring_roundtrip_in_order() {
        let ring = SlotRing::new();
        for i in 0..10u8 {
            assert!(ring.try_write(&[i, i, i]));
        }
        for i in 0..10u8 {
            let got = ring.try_read().unwrap();
            assert_eq!(got, vec![i, i, i]);
        }
        assert!(ring.try_read().is_none());
    }

    #[test]
    fn slot_ring_rejects_oversized_message() {
        let ring = SlotRing::new();
        let huge = vec![0u8; DATA_CAPACITY + 1];
        assert!(!ring.try_write(&huge));
    }

    #[test]
    fn slot_ring_full_when_all_slots_occupied() {
        let ring = SlotRing::new();
        for _ in 0..SLOT_COUNT {
            assert!(ring.try_write(b"x"));
        }
        assert!(!ring.try_write(b"x"));
    }
}
