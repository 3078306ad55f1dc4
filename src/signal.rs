//! Cooperative SIGINT handling.
//!
//! The first SIGINT only raises a flag; the search loop checks it between
//! iterations and finishes the one in flight. A second SIGINT aborts the
//! process immediately with status 1.

use std::sync::atomic::{AtomicBool, Ordering};

static EXIT_FLAG: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_sig: libc::c_int) {
    if EXIT_FLAG.swap(true, Ordering::SeqCst) {
        // Second delivery: abort unconditionally. _exit is async-signal-safe.
        unsafe { libc::_exit(1) };
    }
}

/// Install the SIGINT handler. Call once before searching.
pub fn install() {
    unsafe {
        libc::signal(libc::SIGINT, handle_sigint as *const () as libc::sighandler_t);
    }
}

/// True once a SIGINT has been delivered.
pub fn exit_requested() -> bool {
    EXIT_FLAG.load(Ordering::SeqCst)
}
