//! Scoped SIGPIPE masking around transport I/O
//!
//! Writing to a socket whose peer has gone away raises SIGPIPE on most Unix
//! platforms, killing the process before the write can report `EPIPE`. Every
//! transport read and write therefore runs inside a [`SigpipeGuard`] critical
//! section: the guard blocks SIGPIPE for the calling thread on construction
//! and restores the previously saved mask when dropped, on every exit path.

/// RAII guard that blocks SIGPIPE for the current thread while alive.
#[cfg(unix)]
#[derive(Debug)]
pub struct SigpipeGuard {
    saved: libc::sigset_t,
}

#[cfg(unix)]
impl SigpipeGuard {
    /// Block SIGPIPE, saving the prior thread mask for restoration.
    pub fn new() -> Self {
        // Both sets start zeroed; the saved set must not carry stack garbage
        // into the restoring pthread_sigmask call.
        unsafe {
            let mut block: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut block);
            libc::sigaddset(&mut block, libc::SIGPIPE);

            let mut saved: libc::sigset_t = std::mem::zeroed();
            libc::pthread_sigmask(libc::SIG_BLOCK, &block, &mut saved);

            SigpipeGuard { saved }
        }
    }
}

#[cfg(unix)]
impl Drop for SigpipeGuard {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.saved, std::ptr::null_mut());
        }
    }
}

#[cfg(unix)]
impl Default for SigpipeGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// No-op stand-in on platforms without SIGPIPE.
#[cfg(not(unix))]
#[derive(Debug, Default)]
pub struct SigpipeGuard;

#[cfg(not(unix))]
impl SigpipeGuard {
    /// No-op on this platform.
    pub fn new() -> Self {
        SigpipeGuard
    }
}
