//! Contiguous partition assignment.
//!
//! Unit `i` of `W` owns `[floor(i*N/W), floor((i+1)*N/W))`. Consecutive
//! ranges share their boundary, so the ranges tile `0..N` exactly once for
//! any `N`, including `N < W` (some units then own an empty range).

use std::ops::Range;

/// Index range owned by `unit` when `len` items are split across `units` units.
///
/// # Panics
///
/// Panics if `units` is zero.
pub fn partition_range(unit: usize, len: usize, units: usize) -> Range<usize> {
    assert!(units > 0, "partition_range requires at least one unit");
    // u128 keeps `unit * len` from overflowing for very large batches
    let bound = |k: usize| ((k as u128 * len as u128) / units as u128) as usize;
    bound(unit)..bound(unit + 1)
}

/// All `units` ranges in unit order
pub fn partition_ranges(len: usize, units: usize) -> impl Iterator<Item = Range<usize>> {
    (0..units).map(move |unit| partition_range(unit, len, units))
}
