//! The shared-memory layout and the region that backs it.
//!
//! Grounded on `examples/original_source/common/src/network/transport/shm/shm_layout.hpp`
//! and the byte-offset table it describes. The server creates and
//! `mlock`s the region; the client opens, mmaps, warms pages and signals
//! readiness by writing 1 to `upstream_ftx`.

use std::fs::OpenOptions;
use std::io;
use std::sync::atomic::AtomicU32;

use memmap2::MmapMut;

use super::ring::ByteRing;

/// In-memory shape of the shared region. Each field is independently
/// cache-line aligned to avoid false sharing between the server and
/// client threads that touch it.
#[repr(C)]
pub struct ShmLayout {
    pub upstream_ftx: AtomicU32,
    _pad0: [u8; 60],
    pub downstream_ftx: AtomicU32,
    _pad1: [u8; 60],
    pub upstream_waiting: AtomicU32,
    _pad2: [u8; 60],
    pub downstream_waiting: AtomicU32,
    _pad3: [u8; 60],
    pub upstream: ByteRing,
    pub downstream: ByteRing,
    pub broadcast: ByteRing,
}

impl ShmLayout {
    pub const SIZE: usize = std::mem::size_of::<ShmLayout>();
}

/// Owns the memory-mapped file backing a `ShmLayout` and exposes it as a
/// raw pointer the caller reinterprets as `&ShmLayout`. The mapping must
/// outlive every transport/reactor built on top of it.
pub struct ShmRegion {
    mmap: MmapMut,
}

impl ShmRegion {
    /// Creates (or truncates) and `mlock`s the backing file — the server
    /// side of the handshake.
    pub fn create(path: &str) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(ShmLayout::SIZE as u64)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let region = Self { mmap };
        region.mlock();
        Ok(region)
    }

    /// Opens an existing region, mmaps it and warms every page by
    /// touching it once — the client side of the handshake.
    pub fn open(path: &str) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        warm_pages(&mut mmap);
        Ok(Self { mmap })
    }

    fn mlock(&self) {
        unsafe {
            libc::mlock(
                self.mmap.as_ptr() as *const libc::c_void,
                self.mmap.len(),
            );
        }
    }

    /// # Safety
    /// The caller must ensure the mapping is at least `ShmLayout::SIZE`
    /// bytes (guaranteed by `create`/`open`) and that no other `&mut`
    /// alias to the region is live for the lifetime of the returned
    /// reference.
    pub unsafe fn layout(&self) -> &ShmLayout {
        &*(self.mmap.as_ptr() as *const ShmLayout)
    }

}

fn warm_pages(mmap: &mut MmapMut) {
    const PAGE: usize = 4096;
    let mut i = 0;
    while i < mmap.len() {
        mmap[i] = mmap[i];
        i += PAGE;
    }
}
