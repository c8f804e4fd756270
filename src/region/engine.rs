//! The per-region state-hashing engine: wires the shared memory mapping,
//! the userfaultfd-driven fault monitor, the incremental hasher, and the
//! chunk pager into one handle a caller can create, mutate through, and
//! digest.

use std::ffi::c_void;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::{Arc, Mutex};

use userfaultfd::{ProtectMode, RegisterMode, Uffd, UffdBuilder};

use crate::config::CHUNK_SIZE;
use crate::diagnostic;
use crate::error::EngineError;
use crate::hash::ChunkedHasher;
use crate::lru::LruAccountant;
use crate::pager::ChunkPager;

use super::fault_monitor;
use super::shared_mem::SharedRegion;

/// Everything a fault event needs mutable access to — the hasher's
/// dirty/cached-intermediate state and the residency table — behind one
/// per-region fault mutex.
pub(crate) struct EngineState {
    pub hasher: ChunkedHasher,
    pub resident: Vec<bool>,
}

/// Shared, `Arc`-held half of an [`Engine`]: the part the fault handler
/// thread also needs a handle to.
pub(crate) struct EngineInner {
    pub contract_index: u32,
    pub logical_len: usize,
    pub shared: SharedRegion,
    pub pager: ChunkPager,
    pub lru: Arc<LruAccountant>,
    pub fault_mutex: Mutex<EngineState>,
}

impl EngineInner {
    /// Every chunk occupies exactly [`CHUNK_SIZE`] bytes of the backing
    /// mapping — the region is padded up to a whole number of chunks at
    /// creation, so there is no short final chunk to special-case here.
    pub fn chunk_len(&self, _chunk_index: usize) -> usize {
        CHUNK_SIZE
    }

    /// Persists a resident chunk and drops its physical backing: writes it
    /// out via the pager, `madvise(DONTNEED)`s its mapping, clears its
    /// residency bit, and forgets it in the LRU accountant. Called both by
    /// the fault handler when the LRU accountant names this chunk as an
    /// eviction victim, and directly by `Engine::save_chunk_to_disk`.
    pub(crate) fn evict_chunk(&self, chunk_index: usize) -> Result<(), EngineError> {
        let offset = chunk_index * CHUNK_SIZE;
        let bytes = {
            // SAFETY: held only long enough to copy the chunk out; no other
            // writer can observe a torn read because writes to a resident
            // chunk always go through the WP fault path, which also takes
            // this mutex before resuming the mutator.
            let region = unsafe { self.shared.as_slice() };
            region[offset..offset + CHUNK_SIZE].to_vec()
        };
        self.pager.save_chunk(chunk_index, &bytes)?;
        self.shared.madvise_dontneed(offset, CHUNK_SIZE)?;
        {
            let mut state = self.fault_mutex.lock().unwrap();
            if chunk_index < state.resident.len() {
                state.resident[chunk_index] = false;
            }
        }
        self.lru.forget(self.contract_index, chunk_index);
        Ok(())
    }
}

/// A live, pageable hashing engine over one contract's state buffer.
pub struct Engine {
    inner: Arc<EngineInner>,
    uffd: Arc<Uffd>,
    shutdown_write: OwnedFd,
    handler: Option<std::thread::JoinHandle<()>>,
}

impl Engine {
    /// `create(contractIndex, len, pager, lru)` — allocates the region,
    /// registers it with the kernel's userfaultfd channel, arms
    /// write-protection over the whole (initially all-resident, all-dirty)
    /// region, and spawns the fault handler thread.
    pub fn create(
        contract_index: u32,
        logical_len: usize,
        pager: ChunkPager,
        lru: Arc<LruAccountant>,
    ) -> Result<Engine, EngineError> {
        let page = page_size::get();
        if CHUNK_SIZE % page != 0 {
            return Err(EngineError::Primitive(
                "CHUNK_SIZE must be a multiple of the OS page size",
            ));
        }

        let max_chunks = logical_len.div_ceil(CHUNK_SIZE).max(1);
        let padded_len = max_chunks * CHUNK_SIZE;

        let shared = SharedRegion::create(padded_len, contract_index)?;

        let uffd = UffdBuilder::new()
            .close_on_exec(true)
            .non_blocking(false)
            .user_mode_only(true)
            .create()
            .map_err(|e| EngineError::Kernel(format!("UFFDIO_API failed: {e}")))?;
        let uffd = Arc::new(uffd);

        uffd.register_with_mode(
            shared.base_ptr() as *mut c_void,
            shared.padded_size(),
            RegisterMode::MISSING | RegisterMode::WP | RegisterMode::MINOR,
        )
        .map_err(|e| EngineError::Kernel(format!("UFFDIO_REGISTER failed: {e}")))?;

        uffd.write_protect(
            shared.base_ptr() as *mut c_void,
            shared.padded_size(),
            ProtectMode::Protect,
        )
        .map_err(|e| EngineError::Kernel(format!("initial UFFDIO_WRITEPROTECT failed: {e}")))?;

        let mut pipe_fds = [0i32; 2];
        // SAFETY: pipe_fds is a valid 2-element array.
        let rc = unsafe { libc::pipe(pipe_fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(EngineError::Io(std::io::Error::last_os_error()));
        }
        // SAFETY: pipe() just returned these as freshly opened, owned fds.
        let shutdown_read = unsafe { OwnedFd::from_raw_fd(pipe_fds[0]) };
        let shutdown_write = unsafe { OwnedFd::from_raw_fd(pipe_fds[1]) };

        let inner = Arc::new(EngineInner {
            contract_index,
            logical_len,
            shared,
            pager,
            lru,
            fault_mutex: Mutex::new(EngineState {
                hasher: ChunkedHasher::new(logical_len),
                // Registering the whole mapping with MISSING means the
                // kernel populates nothing on its own: every chunk starts
                // genuinely absent and becomes resident only once its first
                // fault is handled (see `fault_monitor::handle_missing`).
                resident: vec![false; max_chunks],
            }),
        });

        let handler = fault_monitor::spawn(Arc::clone(&inner), Arc::clone(&uffd), shutdown_read);

        Ok(Engine {
            inner,
            uffd,
            shutdown_write,
            handler: Some(handler),
        })
    }

    pub fn max_chunks(&self) -> usize {
        self.inner.fault_mutex.lock().unwrap().hasher.max_chunks()
    }

    pub fn logical_len(&self) -> usize {
        self.inner.logical_len
    }

    pub fn padded_len(&self) -> usize {
        self.inner.shared.padded_size()
    }

    /// A raw pointer to the region's backing memory. The mutator (e.g. a
    /// contract-execution VM) writes through this pointer directly; there is
    /// no explicit "I wrote here" call, since the fault channel observes the
    /// write itself via a write-protect fault.
    ///
    /// # Safety
    /// The caller must not read or write past `padded_len()` bytes from this
    /// pointer, and must not retain it past the engine's lifetime.
    pub unsafe fn as_mut_ptr(&self) -> *mut u8 {
        self.inner.shared.base_ptr()
    }

    /// `totalResidentBytes()` — sums the RAM currently backing this region
    /// (as opposed to [`crate::lru::LruAccountant::resident_bytes`], which
    /// sums across every engine in the process).
    pub fn total_resident_bytes(&self) -> u64 {
        let state = self.inner.fault_mutex.lock().unwrap();
        state.resident.iter().filter(|&&r| r).count() as u64 * CHUNK_SIZE as u64
    }

    /// `markChunkChanged(i)` — the explicit, non-fault-driven alternative to
    /// letting a write-protect fault mark the chunk dirty. Intended for a
    /// caller that instruments its own writes instead of relying on the
    /// fault channel.
    pub fn mark_chunk_changed(&self, chunk_index: usize) {
        self.inner.fault_mutex.lock().unwrap().hasher.mark_chunk_changed(chunk_index);
    }

    /// `digest(out, outLen)` — hashes the region's logical bytes, reusing
    /// cached leaf intermediates for every chunk not marked dirty since the
    /// last call.
    pub fn digest(&self, out: &mut [u8], use_cache: bool) -> Result<(), EngineError> {
        let mut state = self.inner.fault_mutex.lock().unwrap();
        // SAFETY: the fault mutex is held for the duration of this call, so
        // no write-protect fault can be mid-flight mutating bytes this slice
        // reads (see `EngineInner::evict_chunk`'s comment for the same
        // invariant from the other direction).
        let region = unsafe { self.inner.shared.as_slice() };
        let logical = &region[..self.inner.logical_len];
        state.hasher.digest(logical, out, use_cache)
    }

    /// `digestAndReprotect(out, outLen)` — digests, then re-arms
    /// write-protection over the whole region so the next write to any
    /// chunk is observed again.
    pub fn digest_and_reprotect(&self, out: &mut [u8], use_cache: bool) -> Result<(), EngineError> {
        self.digest(out, use_cache)?;
        self.reprotect_writes(0, 0)
    }

    /// Resolves the `(offset, len)` convention shared by `reprotectWrites`
    /// and `reprotectReads`: `(0, 0)` means "the whole region".
    fn effective_range(&self, offset: usize, len: usize) -> (usize, usize) {
        if offset == 0 && len == 0 {
            (0, self.inner.shared.padded_size())
        } else {
            (offset, len)
        }
    }

    /// `reprotectWrites(offset=0, len=0)` — re-arms `UFFDIO_WRITEPROTECT`
    /// over `[offset, offset+len)`, or the whole region when both are zero.
    ///
    /// A failure to arm write-protection means the kernel can no longer be
    /// trusted to report future writes to the affected range, so every
    /// chunk is conservatively marked dirty before the error is returned —
    /// the next digest recomputes from scratch rather than risk silently
    /// missing a write.
    pub fn reprotect_writes(&self, offset: usize, len: usize) -> Result<(), EngineError> {
        let (offset, len) = self.effective_range(offset, len);
        let result = if offset.checked_add(len).map_or(true, |end| end > self.inner.shared.padded_size()) {
            Err(EngineError::Input("reprotect_writes range exceeds the region's padded length"))
        } else {
            self.uffd
                .write_protect(
                    // SAFETY: bounds checked against `padded_size()` above.
                    unsafe { self.inner.shared.base_ptr().add(offset) as *mut c_void },
                    len,
                    ProtectMode::Protect,
                )
                .map_err(|e| EngineError::Kernel(format!("UFFDIO_WRITEPROTECT failed: {e}")))
        };
        if let Err(ref e) = result {
            diagnostic!(
                1,
                "pagehash: WP arming failed for contract {} ({e}); marking all chunks dirty",
                self.inner.contract_index
            );
            let mut state = self.inner.fault_mutex.lock().unwrap();
            let max_chunks = state.hasher.max_chunks();
            for chunk_index in 0..max_chunks {
                state.hasher.mark_chunk_changed(chunk_index);
            }
        }
        result
    }

    /// `reprotectReads(offset=0, len=0)` — drops page-table entries over
    /// `[offset, offset+len)`, or the whole region when both are zero, via
    /// `MADV_DONTNEED` without touching the memfd's page-cache content, so
    /// the next read or write in that range goes through a minor fault
    /// instead of silently hitting an already-mapped page.
    pub fn reprotect_reads(&self, offset: usize, len: usize) -> Result<(), EngineError> {
        let (offset, len) = self.effective_range(offset, len);
        if offset.checked_add(len).map_or(true, |end| end > self.inner.shared.padded_size()) {
            return Err(EngineError::Input("reprotect_reads range exceeds the region's padded length"));
        }
        self.inner.shared.madvise_dontneed(offset, len).map_err(EngineError::from)
    }

    /// `saveChunkToDisk(i)` — persists chunk `i`'s current bytes to disk and
    /// releases its physical backing (the same eviction as `evictChunk`,
    /// just named after the on-disk side effect rather than the RAM one).
    pub fn save_chunk_to_disk(&self, chunk_index: usize) -> Result<(), EngineError> {
        self.inner.evict_chunk(chunk_index)
    }

    /// `loadChunkFromDisk(i)` — an explicit, non-fault-driven read of a
    /// chunk's on-disk bytes; does not affect residency or the mapping.
    pub fn load_chunk_from_disk(&self, chunk_index: usize) -> Result<Vec<u8>, EngineError> {
        self.inner.pager.load_chunk(chunk_index, CHUNK_SIZE)
    }

    /// `evict(i)` — the operator-driven counterpart to the fault handler's
    /// opportunistic eviction: persists chunk `i` and drops its physical
    /// backing immediately, regardless of the current RAM budget.
    pub fn evict_chunk(&self, chunk_index: usize) -> Result<(), EngineError> {
        self.inner.evict_chunk(chunk_index)
    }

    /// `isChunkDirty(i)` — whether chunk `i` has been written (or explicitly
    /// marked changed) since its leaf intermediate was last cached.
    pub fn is_chunk_dirty(&self, chunk_index: usize) -> bool {
        self.inner.fault_mutex.lock().unwrap().hasher.is_dirty(chunk_index)
    }

    /// `flushAll(changedOnly=false)` — persists resident chunks to disk and
    /// releases their RAM: every resident chunk when `changed_only` is
    /// `false`, or only the resident chunks marked dirty when it is `true`.
    /// A non-resident chunk was already written out when it was evicted, so
    /// it is skipped either way.
    pub fn flush_all(&self, changed_only: bool) -> Result<(), EngineError> {
        let max_chunks = self.max_chunks();
        for chunk_index in 0..max_chunks {
            let (resident, dirty) = {
                let state = self.inner.fault_mutex.lock().unwrap();
                (
                    state.resident.get(chunk_index).copied().unwrap_or(false),
                    state.hasher.is_dirty(chunk_index),
                )
            };
            if resident && (!changed_only || dirty) {
                self.save_chunk_to_disk(chunk_index)?;
            }
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        fault_monitor::signal_shutdown(self.shutdown_write.as_raw_fd());
        if let Some(handle) = self.handler.take() {
            let _ = handle.join();
        }
    }
}
