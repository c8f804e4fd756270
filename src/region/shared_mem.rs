//! Anonymous, page-cache-backed shared memory for a region.
//!
//! Backed by `memfd_create` + `mmap(MAP_SHARED)` rather than
//! `mmap(MAP_ANONYMOUS | MAP_PRIVATE)`: the fault monitor's minor-fault path
//! depends on the mapping being page-cache-backed so that
//! `madvise(MADV_DONTNEED)` merely drops the page-table entry while the
//! memfd's page-cache content survives, producing a `MINOR` fault (content
//! already exists, just needs remapping) rather than a `MISSING` one on the
//! next access.

use std::ffi::{c_void, CString};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr::NonNull;

/// A region's backing memory: one `memfd`, mapped once.
pub struct SharedRegion {
    base: NonNull<c_void>,
    padded_size: usize,
    _fd: OwnedFd,
}

// SAFETY: `SharedRegion` only exposes raw byte access and syscalls that are
// themselves safe to call from any thread; callers are responsible for
// synchronizing concurrent access to the mapped bytes (the engine does so
// via its per-region fault mutex).
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Creates a zero-filled shared mapping of at least `non_padded_size`
    /// bytes, rounded up to a whole number of OS pages.
    pub fn create(non_padded_size: usize, contract_index: u32) -> std::io::Result<Self> {
        let page = page_size::get();
        let padded_size = non_padded_size.div_ceil(page).max(1) * page;

        let name = CString::new(format!("pagehash-region-{contract_index}"))
            .expect("contract index formats without NUL bytes");
        // SAFETY: `name` is a valid NUL-terminated C string for the duration
        // of the call; memfd_create does not retain the pointer afterward.
        let raw_fd: RawFd = unsafe { libc::memfd_create(name.as_ptr(), 0) };
        if raw_fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        // SAFETY: memfd_create just returned this fd and we own it exclusively.
        let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };

        // SAFETY: fd is a valid, open file descriptor.
        let rc = unsafe { libc::ftruncate(fd.as_raw_fd(), padded_size as libc::off_t) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }

        // SAFETY: fd is valid and sized; MAP_SHARED over a memfd is a
        // standard anonymous-but-page-cache-backed mapping.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                padded_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error());
        }
        let base = NonNull::new(addr).expect("mmap reported success with a null address");

        Ok(SharedRegion {
            base,
            padded_size,
            _fd: fd,
        })
    }

    pub fn base_ptr(&self) -> *mut u8 {
        self.base.as_ptr() as *mut u8
    }

    pub fn padded_size(&self) -> usize {
        self.padded_size
    }

    /// Borrows the mapping as a byte slice.
    ///
    /// # Safety
    /// The caller must ensure no concurrent unsynchronized write touches the
    /// borrowed range — the engine upholds this by holding its per-region
    /// fault mutex across every call into this method.
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.base_ptr(), self.padded_size)
    }

    /// Arms (`enable = true`) or lifts (`enable = false`) write-protect
    /// mediation is delegated to the fault channel; this method only
    /// manages the coarser, always-present read/write mapping permissions
    /// used before the fault channel is registered and during teardown.
    pub fn mprotect(&self, offset: usize, len: usize, prot: libc::c_int) -> std::io::Result<()> {
        // SAFETY: offset/len are caller-checked to stay within padded_size.
        let rc = unsafe {
            libc::mprotect(
                self.base_ptr().add(offset) as *mut c_void,
                len,
                prot,
            )
        };
        if rc != 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// `madvise(MADV_DONTNEED)` over `[offset, offset+len)` — drops the
    /// physical backing / page-table entries for the range while the
    /// memfd's page-cache content (and therefore any subsequent read) is
    /// preserved. Used both by `reprotectReads` (to observe reads via minor
    /// faults) and by `saveChunkToDisk` (to release RAM after a chunk has
    /// been written to disk).
    pub fn madvise_dontneed(&self, offset: usize, len: usize) -> std::io::Result<()> {
        // SAFETY: offset/len are caller-checked to stay within padded_size.
        let rc = unsafe {
            libc::madvise(
                self.base_ptr().add(offset) as *mut c_void,
                len,
                libc::MADV_DONTNEED,
            )
        };
        if rc != 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        // SAFETY: base/padded_size describe exactly the mapping created in
        // `create`, which is only ever unmapped here.
        unsafe {
            libc::munmap(self.base_ptr() as *mut c_void, self.padded_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_region_is_zero_filled() {
        let region = SharedRegion::create(4096 * 3, 1).unwrap();
        let bytes = unsafe { region.as_slice() };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn padded_size_rounds_up_to_page_size() {
        let page = page_size::get();
        let region = SharedRegion::create(page + 1, 2).unwrap();
        assert_eq!(region.padded_size() % page, 0);
        assert!(region.padded_size() >= page + 1);
    }
}
