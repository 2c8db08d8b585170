//! Macros for logging and debug assertions. [`bridge_trace!()`] and the `bridge_debug_assert_*!()`
//! macros are compiled out during release builds, so they can be used for asserting additional
//! invariants in debug builds. Check [`setup_logger()`][crate::wrapper::setup_logger()] for more
//! information on where the output ends up. None of the logging functions are realtime-safe, and
//! you should avoid using them during release builds in any of the functions that may be called
//! from an audio thread.

// NOTE: Exporting macros in Rust is a bit weird. `#[macro_export]` causes them to be exported to
//       the crate root, but that makes it difficult to include just the macros without using
//       `#[macro_use] extern crate clap_as_vst3;`. That's why the macros are also re-exported from
//       this module.

/// Write something to the logger. This defaults to STDERR unless the `CLAP_AS_VST3_LOG`
/// environment variable points somewhere else.
#[macro_export]
macro_rules! bridge_log {
    ($($args:tt)*) => (
        $crate::log::info!($($args)*)
    );
}
#[doc(inline)]
pub use bridge_log;

/// Similar to `bridge_log!()`, but less subtle. Used for printing warnings.
#[macro_export]
macro_rules! bridge_warn {
    ($($args:tt)*) => (
        $crate::log::warn!($($args)*)
    );
}
#[doc(inline)]
pub use bridge_warn;

/// Similar to `bridge_log!()`, but more scream-y. Used for printing fatal errors.
#[macro_export]
macro_rules! bridge_error {
    ($($args:tt)*) => (
        $crate::log::error!($($args)*)
    );
}
#[doc(inline)]
pub use bridge_error;

/// The same as `bridge_log!()`, but with source and thread information. Like the
/// `bridge_debug_assert*!()` macros, this is only shown when compiling in debug mode.
#[macro_export]
macro_rules! bridge_trace {
    ($($args:tt)*) => (
        $crate::util::permit_alloc(|| $crate::log::trace!($($args)*))
    );
}
#[doc(inline)]
pub use bridge_trace;

/// A `debug_assert!()` analogue that prints the error with line number information instead of
/// panicking. During tests this is upgraded to a regular panicking `debug_assert!()`.
#[macro_export]
macro_rules! bridge_debug_assert {
    ($cond:expr $(,)?) => (
        #[allow(clippy::neg_cmp_op_on_partial_ord)]
        if cfg!(test) {
           debug_assert!($cond);
        } else if cfg!(debug_assertions) && !$cond {
            $crate::util::permit_alloc(|| $crate::log::warn!(concat!("Debug assertion failed: ", stringify!($cond))));
        }
    );
    ($cond:expr, $format:expr $(, $($args:tt)*)?) => (
        #[allow(clippy::neg_cmp_op_on_partial_ord)]
        if cfg!(test) {
           debug_assert!($cond, $format, $($($args)*)?);
        } else if cfg!(debug_assertions) && !$cond {
            $crate::util::permit_alloc(|| $crate::log::warn!(concat!("Debug assertion failed: ", stringify!($cond), ", ", $format), $($($args)*)?));
        }
    );
}
#[doc(inline)]
pub use bridge_debug_assert;
