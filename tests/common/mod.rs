//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::{Duration, Instant};

/// Upper bound for waiting on background rounds
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Call `step` until it returns true, sleeping briefly between frames
///
/// Panics after [`test_timeout`].
pub fn poll_until(what: &str, mut step: impl FnMut() -> bool) {
    let deadline = Instant::now() + test_timeout();
    while Instant::now() < deadline {
        if step() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("timed out waiting for {}", what);
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}
