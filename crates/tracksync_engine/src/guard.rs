//! Scoped ownership of the engine's reentrancy flags.

use std::sync::atomic::{AtomicBool, Ordering};

/// Holds a flag set for its lifetime and clears it on drop.
///
/// The flag clears on every exit path: normal return, `?`, panic, and a
/// future dropped mid-await.
#[derive(Debug)]
pub(crate) struct FlagGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> FlagGuard<'a> {
    /// Sets `flag` if it was clear. Returns `None` if it was already set.
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
