//! Fault-driven change tracker and pager.
//!
//! One thread per region, parked in `poll(2)` over the region's userfaultfd
//! descriptor and a shutdown self-pipe — a join-on-drop thread with a pipe
//! to signal it home, applied here to a single long-lived handler rather
//! than a pool of them. Each fault is classified and dispatched:
//!
//! | fault bits        | action                                                         |
//! |--------------------|----------------------------------------------------------------|
//! | write-protect       | mark chunk dirty, update LRU, lift write-protection, resume    |
//! | minor                | update LRU, `UFFDIO_CONTINUE`, resume                          |
//! | missing (neither)    | load chunk from disk, `UFFDIO_COPY` + arm write-protect, resume|

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

use userfaultfd::{Event, FaultKind, ProtectMode, Uffd};

use crate::config::{CHUNK_SIZE, LOAD_RETRY_BACKOFF_CAP, LOAD_RETRY_BACKOFF_INITIAL};
use crate::diagnostic;

use super::engine::EngineInner;

/// Spawns the handler thread for `inner`, returning its join handle. The
/// thread exits as soon as a byte is written to the shutdown pipe (read end:
/// `shutdown_read`) or the kernel reports the uffd closed.
pub(crate) fn spawn(
    inner: Arc<EngineInner>,
    uffd: Arc<Uffd>,
    shutdown_read: OwnedFd,
) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name(format!("pagehash-fault-{}", inner.contract_index))
        .spawn(move || handler_loop(inner, uffd, shutdown_read))
        .expect("spawning the fault handler thread should not fail")
}

fn handler_loop(inner: Arc<EngineInner>, uffd: Arc<Uffd>, shutdown_read: OwnedFd) {
    let uffd_fd = uffd.as_raw_fd();
    let shutdown_fd = shutdown_read.as_raw_fd();

    loop {
        if !wait_for_activity(uffd_fd, shutdown_fd) {
            diagnostic!(3, "pagehash: fault handler for contract {} shutting down", inner.contract_index);
            return;
        }

        match uffd.read_event() {
            Ok(Some(Event::Pagefault { kind, addr, .. })) => {
                if let Err(e) = dispatch(&inner, &uffd, kind, addr as usize) {
                    diagnostic!(1, "pagehash: fault handling error on contract {}: {e}", inner.contract_index);
                }
            }
            Ok(Some(_other_event)) => {
                // Fork/remap/remove events are not produced by this engine's
                // single-process, single-mapping usage; ignore defensively.
            }
            Ok(None) => continue,
            Err(e) => {
                diagnostic!(1, "pagehash: uffd read_event error on contract {}: {e}", inner.contract_index);
                return;
            }
        }
    }
}

/// Blocks until either fd is readable. Returns `false` if the shutdown pipe
/// fired (the self-pipe pattern for clean thread shutdown).
fn wait_for_activity(uffd_fd: RawFd, shutdown_fd: RawFd) -> bool {
    let mut fds = [
        libc::pollfd { fd: uffd_fd, events: libc::POLLIN, revents: 0 },
        libc::pollfd { fd: shutdown_fd, events: libc::POLLIN, revents: 0 },
    ];
    loop {
        // SAFETY: fds is a valid, correctly-sized array for the duration of the call.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return false;
        }
        if fds[1].revents & libc::POLLIN != 0 {
            return false;
        }
        if fds[0].revents & libc::POLLIN != 0 {
            return true;
        }
    }
}

fn dispatch(inner: &EngineInner, uffd: &Uffd, kind: FaultKind, fault_addr: usize) -> std::io::Result<()> {
    let base = inner.shared.base_ptr() as usize;
    let offset = fault_addr.saturating_sub(base);
    let chunk_index = offset / CHUNK_SIZE;
    let chunk_start = base + chunk_index * CHUNK_SIZE;
    let chunk_len = inner.chunk_len(chunk_index);

    match kind {
        FaultKind::WriteProtect => handle_write_protect(inner, uffd, chunk_index, chunk_start, chunk_len),
        FaultKind::Minor { .. } => handle_minor(inner, uffd, chunk_index, chunk_start, chunk_len),
        FaultKind::Missing => handle_missing(inner, uffd, chunk_index, chunk_start, chunk_len),
    }
}

fn handle_write_protect(
    inner: &EngineInner,
    uffd: &Uffd,
    chunk_index: usize,
    chunk_start: usize,
    chunk_len: usize,
) -> std::io::Result<()> {
    {
        let mut state = inner.fault_mutex.lock().unwrap();
        state.hasher.mark_chunk_changed(chunk_index);
        inner.lru.touch(inner.contract_index, chunk_index, chunk_len as u64);
    }
    // Lifting write-protect and waking the mutator in one ioctl is what
    // makes "dirty observable before resume" atomic from the mutator's
    // point of view: it cannot complete its write until this call returns.
    uffd.write_protect(chunk_start as *mut std::ffi::c_void, chunk_len, ProtectMode::NoProtect)
        .map_err(to_io_error)?;
    Ok(())
}

fn handle_minor(
    inner: &EngineInner,
    uffd: &Uffd,
    chunk_index: usize,
    chunk_start: usize,
    chunk_len: usize,
) -> std::io::Result<()> {
    inner.lru.touch(inner.contract_index, chunk_index, chunk_len as u64);
    retry_with_backoff(|| {
        uffd.continue_(chunk_start as *mut std::ffi::c_void, chunk_len, true)
            .map(|_| ())
            .map_err(to_io_error)
    })
}

fn handle_missing(
    inner: &EngineInner,
    uffd: &Uffd,
    chunk_index: usize,
    chunk_start: usize,
    chunk_len: usize,
) -> std::io::Result<()> {
    // A chunk with no on-disk copy has never been written since this
    // contract's region was created — its logical content is all-zero, the
    // same as the backing memfd's own untouched pages.
    let has_disk_copy = inner.pager.chunk_exists_on_disk(chunk_index).map_err(to_io_error)?;
    let bytes = if has_disk_copy {
        retry_with_backoff(|| {
            inner
                .pager
                .load_chunk(chunk_index, chunk_len)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?
    } else {
        vec![0u8; chunk_len]
    };

    {
        let mut state = inner.fault_mutex.lock().unwrap();
        state.resident[chunk_index] = true;
        inner.lru.touch(inner.contract_index, chunk_index, chunk_len as u64);
    }

    let src = bytes.as_ptr() as *const std::ffi::c_void;
    let dst = chunk_start as *mut std::ffi::c_void;
    // wake = false: the mutator stays parked until write-protection is
    // armed immediately below, so it never observes an unprotected window.
    retry_with_backoff(|| uffd.copy(src, dst, chunk_len, false).map(|_| ()).map_err(to_io_error))?;
    uffd.write_protect(dst, chunk_len, ProtectMode::Protect).map_err(to_io_error)?;
    uffd.wake(dst, chunk_len).map_err(to_io_error)?;

    // Opportunistic eviction: this chunk's load just grew resident RAM, so
    // give the accountant a chance to reclaim room for it immediately
    // rather than waiting for some future touch to notice the overrun.
    for victim in inner.lru.try_evict(chunk_len as u64) {
        if victim.contract_index == inner.contract_index {
            if let Err(e) = inner.evict_chunk(victim.chunk_index) {
                diagnostic!(
                    1,
                    "pagehash: opportunistic eviction of chunk {} of contract {} failed: {e}",
                    victim.chunk_index,
                    inner.contract_index
                );
            }
        }
        // Chunks belonging to other contracts are evicted by their own
        // engine the next time it touches the accountant; this handler only
        // has a mapping for `inner`'s own address space.
    }
    Ok(())
}

fn retry_with_backoff<T>(mut op: impl FnMut() -> std::io::Result<T>) -> std::io::Result<T> {
    let mut backoff = LOAD_RETRY_BACKOFF_INITIAL;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_transient(&e) => {
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(LOAD_RETRY_BACKOFF_CAP);
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(libc::EEXIST) | Some(libc::EAGAIN) | Some(libc::EINTR)
    )
}

fn to_io_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

/// Writes one byte to `write_fd` to signal the handler thread to exit.
pub(crate) fn signal_shutdown(write_fd: RawFd) {
    let byte: [u8; 1] = [0];
    // SAFETY: write_fd is a valid fd for the pipe's write end; a short write
    // of one byte cannot partially fail.
    unsafe {
        libc::write(write_fd, byte.as_ptr() as *const std::ffi::c_void, 1);
    }
}
