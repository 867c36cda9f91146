//! Termination signal handling.
//!
//! SIGINT, SIGTERM and SIGHUP set a shared flag instead of killing the
//! process. The executor checks the flag between renames, so a signal never
//! lands in the middle of one, and the run then rolls back from its snapshot.
//! A second signal while the flag is already set exits immediately with
//! `128 + signal`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "stop requested" flag
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Request a stop, as a signal would
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Install handlers for SIGINT (Ctrl+C), SIGTERM and SIGHUP.
/// Call this once at program start.
pub fn init_signal_handlers() -> Result<InterruptFlag, std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::flag;

    let interrupt = InterruptFlag::new();
    for sig in [SIGINT, SIGTERM, SIGHUP] {
        // Registered first so it sees the flag before this signal sets it
        flag::register_conditional_shutdown(sig, 128 + sig, Arc::clone(&interrupt.0))?;
        flag::register(sig, Arc::clone(&interrupt.0))?;
    }
    tracing::debug!("Signal handlers installed");
    Ok(interrupt)
}
