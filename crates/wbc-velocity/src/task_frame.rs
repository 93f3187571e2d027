//! Task frames and the full-robot Jacobian registry.
//!
//! A [`TaskFrame`] is supplied every cycle by the kinematics provider: the
//! pose of a named frame and its Jacobian over the joints that move it. The
//! [`TaskFrameRegistry`] spreads those columns into 6×N Jacobians laid out
//! by the [`JointIndexMap`].

use std::collections::{BTreeMap, HashMap};

use nalgebra::{Isometry3, Matrix6xX};
use tracing::trace;

use wbc_core::config::ConstraintConfig;
use wbc_core::error::InputError;

use crate::joint_index::JointIndexMap;

/// Per-cycle kinematic data for one named frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFrame {
    /// Joints the Jacobian columns refer to, in column order.
    pub joint_names: Vec<String>,
    /// 6×k Jacobian, rows `[vx, vy, vz, wx, wy, wz]`.
    pub jacobian: Matrix6xX<f64>,
    /// Pose of the frame in the robot base frame.
    pub pose: Isometry3<f64>,
}

impl TaskFrame {
    pub fn new(joint_names: Vec<String>, jacobian: Matrix6xX<f64>, pose: Isometry3<f64>) -> Self {
        Self {
            joint_names,
            jacobian,
            pose,
        }
    }

    /// A frame that no joint moves, e.g. the robot base.
    pub fn fixed(pose: Isometry3<f64>) -> Self {
        Self {
            joint_names: Vec::new(),
            jacobian: Matrix6xX::zeros(0),
            pose,
        }
    }
}

/// Per-cycle task frame input, keyed by frame name.
///
/// Ordered so that splicing and error reporting do not depend on hash order.
pub type TaskFrameMap = BTreeMap<String, TaskFrame>;

/// Look up a frame that must be present in the cycle input.
pub fn require_frame<'a>(frames: &'a TaskFrameMap, name: &str) -> Result<&'a TaskFrame, InputError> {
    frames
        .get(name)
        .ok_or_else(|| InputError::IncompleteTaskFrameInput(name.to_string()))
}

/// One full-robot Jacobian per frame required by a Cartesian constraint.
#[derive(Debug, Clone, Default)]
pub struct TaskFrameRegistry {
    names: Vec<String>,
    jacobians: Vec<Matrix6xX<f64>>,
    lookup: HashMap<String, usize>,
}

impl TaskFrameRegistry {
    /// Collect root, tip and reference frames of all Cartesian constraints,
    /// in first-seen order, each with a zero 6×`n_joints` Jacobian.
    pub fn from_constraints<'a>(
        constraints: impl IntoIterator<Item = &'a ConstraintConfig>,
        n_joints: usize,
    ) -> Self {
        let mut registry = Self::default();
        for frame in constraints
            .into_iter()
            .filter_map(ConstraintConfig::frame_names)
            .flatten()
        {
            registry.register(frame, n_joints);
        }
        registry
    }

    fn register(&mut self, name: &str, n_joints: usize) {
        if self.lookup.contains_key(name) {
            return;
        }
        self.lookup.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
        self.jacobians.push(Matrix6xX::zeros(n_joints));
    }

    /// Required frame names in registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    /// Full-robot Jacobian of a registered frame.
    pub fn jacobian(&self, name: &str) -> Option<&Matrix6xX<f64>> {
        self.lookup.get(name).map(|&i| &self.jacobians[i])
    }

    /// Full-robot Jacobian of a frame that must be registered.
    pub fn require_jacobian(&self, name: &str) -> Result<&Matrix6xX<f64>, InputError> {
        self.jacobian(name)
            .ok_or_else(|| InputError::IncompleteTaskFrameInput(name.to_string()))
    }

    /// Fail on the first required frame missing from `frames`.
    pub fn check_complete(&self, frames: &TaskFrameMap) -> Result<(), InputError> {
        match self.names.iter().find(|name| !frames.contains_key(*name)) {
            Some(missing) => Err(InputError::IncompleteTaskFrameInput(missing.clone())),
            None => Ok(()),
        }
    }

    /// Write the columns of every supplied frame into its full-robot
    /// Jacobian.
    ///
    /// Every supplied frame is validated against the joint map, registered
    /// or not. A registered frame's Jacobian is rebuilt from scratch, so
    /// columns of joints it does not list this cycle are zero.
    pub fn splice(
        &mut self,
        frames: &TaskFrameMap,
        joints: &JointIndexMap,
    ) -> Result<(), InputError> {
        for (name, frame) in frames {
            if frame.jacobian.ncols() != frame.joint_names.len() {
                return Err(InputError::TaskFrameDimMismatch {
                    frame: name.clone(),
                    columns: frame.jacobian.ncols(),
                    joints: frame.joint_names.len(),
                });
            }

            let slot = self.lookup.get(name).copied();
            match slot {
                Some(slot) => self.jacobians[slot].fill(0.0),
                None => trace!(frame = %name, "task frame not required by any constraint"),
            }

            for (col, joint) in frame.joint_names.iter().enumerate() {
                let Some(idx) = joints.index_of(joint) else {
                    return Err(InputError::InvalidJointName {
                        frame: name.clone(),
                        joint: joint.clone(),
                    });
                };
                if let Some(slot) = slot {
                    self.jacobians[slot].set_column(idx, &frame.jacobian.column(col));
                }
            }
        }
        Ok(())
    }
}
