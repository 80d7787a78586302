// src/macros.rs

//
// Logging macros
//
// logging feature enabled  → tracing
// logging feature disabled → only log_error prints to stderr
//
// Dispatch and correlation paths log through these so the crate builds
// without tracing unless a host opts in.
//

#![allow(unused_macros)]

// --------------------
// ERROR
// --------------------

#[cfg(feature = "logging")]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!($($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_error {
    ($($arg:tt)*) => {
        eprintln!($($arg)*)
    };
}

// --------------------
// WARN
// --------------------

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        tracing::warn!($($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

// --------------------
// DEBUG
// --------------------

#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

// --------------------
// TRACE (per-message noise: every send, every correlation hit)
// --------------------

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_trace;
pub(crate) use log_warn;
