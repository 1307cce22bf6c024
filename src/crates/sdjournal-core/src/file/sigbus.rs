//! SIGBUS handling for memory-mapped journal files.
//!
//! Touching a page of a mapping whose backing file has been truncated
//! raises SIGBUS, which kills the process by default. The handler below
//! maps an anonymous zero page over the faulting address so that execution
//! can continue, and counts the fault. Each reader remembers the count it
//! started from and reports any later fault as an I/O error, whether or not
//! decoding the zeroed bytes happened to succeed.

use crate::error::{JournalError, Result};
use std::io;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

const PAGE_SIZE: usize = 4096;

static FAULTS: AtomicU64 = AtomicU64::new(0);
static INSTALLED: OnceLock<libc::c_int> = OnceLock::new();

extern "C" fn on_sigbus(_sig: libc::c_int, info: *mut libc::siginfo_t, _ctx: *mut libc::c_void) {
    // SAFETY: the kernel hands us a valid siginfo for SA_SIGINFO handlers,
    // and mmap is async-signal-safe.
    unsafe {
        let page = ((*info).si_addr() as usize & !(PAGE_SIZE - 1)) as *mut libc::c_void;
        libc::mmap(
            page,
            PAGE_SIZE,
            libc::PROT_READ,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED,
            -1,
            0,
        );
    }

    FAULTS.fetch_add(1, Ordering::Relaxed);
}

/// Installs the process-wide SIGBUS handler. Calling it again is a no-op.
pub fn install_handler() -> Result<()> {
    let rc = INSTALLED.get_or_init(|| {
        // SAFETY: `sa` is fully initialised before being passed to sigaction.
        unsafe {
            let mut sa: libc::sigaction = std::mem::zeroed();
            sa.sa_flags = libc::SA_SIGINFO;
            sa.sa_sigaction = on_sigbus as usize;
            libc::sigemptyset(&mut sa.sa_mask);

            libc::sigaction(libc::SIGBUS, &sa, std::ptr::null_mut())
        }
    });

    if *rc == -1 {
        return Err(JournalError::Io(io::Error::other(
            "failed to install SIGBUS handler",
        )));
    }

    Ok(())
}

/// Number of SIGBUS faults handled since the process started.
pub fn fault_count() -> u64 {
    FAULTS.load(Ordering::Relaxed)
}

/// Fails if a mapped page vanished after `baseline` was taken from
/// [`fault_count`].
pub(crate) fn check(baseline: u64) -> Result<()> {
    if fault_count() != baseline {
        return Err(JournalError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "journal file was truncated while mapped",
        )));
    }

    Ok(())
}
