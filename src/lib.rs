pub mod cohort;
pub mod config;
pub mod error;
pub mod identity;
pub mod repository;
pub mod security;
pub mod server;
pub mod storage;

// Debug-build tracing helper: expands to eprintln! in tests and debug builds.
// Usage: tprintln!("session.issue account={}", id);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
