//! General utilities shared by the wrapper.

use lazy_static::lazy_static;
use std::time::Instant;

lazy_static! {
    /// The point in time all ticks returned by [`tick_ms()`] are measured from.
    static ref TICK_EPOCH: Instant = Instant::now();
}

/// Temporarily allow allocations within `func` if the bridge was configured with the
/// `assert_process_allocs` feature.
#[cfg(all(debug_assertions, feature = "assert_process_allocs"))]
pub fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    assert_no_alloc::permit_alloc(func)
}

/// Temporarily allow allocations within `func` if the bridge was configured with the
/// `assert_process_allocs` feature.
#[cfg(not(all(debug_assertions, feature = "assert_process_allocs")))]
pub fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    func()
}

/// A monotonic millisecond counter. Only differences between two ticks are meaningful.
pub fn tick_ms() -> u64 {
    TICK_EPOCH.elapsed().as_millis() as u64
}
