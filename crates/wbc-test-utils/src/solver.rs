//! Solver constructors on a manual clock.

use wbc_core::config::WbcConfig;
use wbc_core::time::ManualClock;
use wbc_velocity::WbcVelocity;

/// Unconfigured solver plus a handle to its clock.
pub fn manual_solver() -> (WbcVelocity<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    (WbcVelocity::with_clock(clock.clone()), clock)
}

/// Solver configured from `config`, plus a handle to its clock.
///
/// Panics if `config` is rejected.
pub fn configured_solver(config: &WbcConfig) -> (WbcVelocity<ManualClock>, ManualClock) {
    let (mut wbc, clock) = manual_solver();
    if let Err(e) = wbc.configure_from(config) {
        panic!("test configuration rejected: {e}");
    }
    (wbc, clock)
}
