//! Shared test fixtures for the whole-body controller crates.
//!
//! Provides sample configurations, a planar serial chain that produces
//! consistent task frames for any joint position, and solver constructors
//! wired to a [`ManualClock`](wbc_core::time::ManualClock).

pub mod chain;
pub mod configs;
pub mod solver;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use chain::{PlanarChain, fixed_frame, frame_map};
pub use configs::{arm_config, names, two_joint_config};
pub use solver::{configured_solver, manual_solver};
