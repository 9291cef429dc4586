// Copyright 2025 Tiny Labs Inc
// SPDX-License-Identifier: Apache-2.0

//! Logging macros shared by the signal generator crates.
//!
//! All records are emitted with a `siggen::<module path>` target so that an
//! application can route or filter them as one group.

use std::sync::{atomic::AtomicBool, atomic::Ordering};

#[doc(hidden)]
pub use log as _log;

#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:ident, $($arg:tt)+) => {
        $crate::_log::$level!(target: concat!("siggen::", module_path!()), $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)+) => { $crate::__log!(info, $($arg)+) };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)+) => { $crate::__log!(warn, $($arg)+) };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)+) => { $crate::__log!(debug, $($arg)+) };
}

/// Info record emitted only while diagnostics are switched on, see
/// [`init_logging`].
#[macro_export]
macro_rules! diagnostic {
    ($($arg:tt)+) => {
        if $crate::is_diagnostics_enabled() {
            $crate::__log!(info, $($arg)+);
        }
    };
}

static DIAGNOSTICS_ENABLED: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS_ENABLED.load(Ordering::Acquire)
}

/// Initialize the logging.
///
/// Meant to be called once at the start of the program. No concrete logger
/// is installed here: the embedding application picks its own `log`
/// implementation. This only toggles the diagnostics records, which report
/// buffer renders and cache invalidations.
pub fn init_logging(with_diagnostics: bool) {
    DIAGNOSTICS_ENABLED.store(with_diagnostics, Ordering::Release);
}
