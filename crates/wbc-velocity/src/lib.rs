//! Priority-ordered velocity equation assembly for whole-body control.
//!
//! Turns Cartesian and joint-space motion constraints into one weighted
//! linear system per priority level, expressed in joint-velocity space, for
//! a downstream hierarchical solver.
//!
//! # Architecture
//!
//! ```text
//! ConstraintConfig ──► WbcVelocity::configure ──► PriorityLevel / JointIndexMap / TaskFrameRegistry
//!                                                         │
//! TaskFrameMap (per cycle) ──► WbcVelocity::assemble ─────┴──► [LinearEquationSystem]
//! ```
//!
//! Forward kinematics and the hierarchical solve happen elsewhere: the
//! caller supplies task-frame poses and Jacobians and consumes the systems.

pub mod constraint;
pub mod equation;
pub mod joint_index;
pub mod pinv;
pub mod solver;
pub mod task_frame;
pub mod twist;

pub use constraint::{CartesianState, Constraint, ConstraintHandle, KindState};
pub use equation::LinearEquationSystem;
pub use joint_index::JointIndexMap;
pub use pinv::PseudoInverse;
pub use solver::{PriorityLevel, WbcVelocity};
pub use task_frame::{TaskFrame, TaskFrameMap, TaskFrameRegistry};
