//! Thin wrapper over the Linux `futex(2)` syscall: a fast user-space
//! wait/wake primitive keyed on a 32-bit word, used by the SHM reactor.

use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(target_os = "linux")]
fn futex_syscall(addr: *const AtomicU32, op: i32, val: i32) -> i64 {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            addr,
            op,
            val,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0,
        )
    }
}

/// Blocks the calling thread until `word` no longer equals `expected`, or
/// it is woken by `futex_wake`. Spurious wakeups are possible; callers
/// must re-check the condition in a loop (the SHM reactor does).
#[cfg(target_os = "linux")]
pub fn futex_wait(word: &AtomicU32, expected: u32) {
    futex_syscall(word as *const AtomicU32, libc::FUTEX_WAIT, expected as i32);
}

/// Wakes up to one thread blocked on `word` via `futex_wait`.
#[cfg(target_os = "linux")]
pub fn futex_wake(word: &AtomicU32) {
    futex_syscall(word as *const AtomicU32, libc::FUTEX_WAKE, 1);
}

/// Non-Linux fallback: no futex syscall is available, so waits degrade
/// to a short park. Correct, just not as fast.
#[cfg(not(target_os = "linux"))]
pub fn futex_wait(_word: &AtomicU32, _expected: u32) {
    std::thread::sleep(std::time::Duration::from_micros(50));
}

#[cfg(not(target_os = "linux"))]
pub fn futex_wake(_word: &AtomicU32) {}

/// Busy-wait spin budget before falling back to a futex block, per
/// the SHM reactor.
pub const BUSY_WAIT_CYCLES: usize = 1000;

/// Spins on `pause` up to `BUSY_WAIT_CYCLES` checking `condition`, then
/// blocks on the futex until `word` changes from `last_seen`.
pub fn wait_for_change(word: &AtomicU32, last_seen: u32) -> u32 {
    let mut spins = 0;
    loop {
        let current = word.load(Ordering::Acquire);
        if current != last_seen {
            return current;
        }
        if spins < BUSY_WAIT_CYCLES {
            std::hint::spin_loop();
            spins += 1;
        } else {
            futex_wait(word, last_seen);
            spins = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn wake_unblocks_waiter() {
        let word = Arc::new(AtomicU32::new(0));
        let w2 = word.clone();

        let handle = std::thread::spawn(move || {
            wait_for_change(&w2, 0);
        });

        std::thread::sleep(Duration::from_millis(10));
        word.store(1, Ordering::Release);
        futex_wake(&word);

        handle.join().unwrap();
    }
}
