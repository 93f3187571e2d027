//! Runtime constraint state.
//!
//! A [`Constraint`] owns its [`ConstraintConfig`] and everything that
//! changes from cycle to cycle: the reference, weights, activation, the
//! timeout flag and the task matrix computed during assembly. Callers reach
//! it through a [`ConstraintHandle`], which stamps reference writes with the
//! solver clock.

use std::ops::Deref;

use nalgebra::{DMatrix, DVector, Isometry3, Matrix6, Vector6};
use serde::{Deserialize, Serialize};

use wbc_core::config::{ConstraintConfig, ConstraintKind};
use wbc_core::error::InputError;
use wbc_core::time::Timestamp;

use crate::joint_index::JointIndexMap;
use crate::pinv::PseudoInverse;
use crate::task_frame::{TaskFrameMap, TaskFrameRegistry, require_frame};
use crate::twist;

// ---------------------------------------------------------------------------
// KindState
// ---------------------------------------------------------------------------

/// Intermediate results of the last Cartesian evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartesianState {
    /// Pose of the tip frame relative to the root frame.
    pub pose_tip_in_root: Isometry3<f64>,
    /// Pose of the reference frame relative to the root frame.
    pub pose_ref_frame_in_root: Isometry3<f64>,
    /// Local 6×6 Jacobian of the relative tip motion.
    pub local_jacobian: Matrix6<f64>,
    pub pseudo_inverse: PseudoInverse,
}

impl Default for CartesianState {
    fn default() -> Self {
        Self {
            pose_tip_in_root: Isometry3::identity(),
            pose_ref_frame_in_root: Isometry3::identity(),
            local_jacobian: Matrix6::identity(),
            pseudo_inverse: PseudoInverse::default(),
        }
    }
}

/// Kind-specific runtime data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KindState {
    Cartesian(Box<CartesianState>),
    Joint,
}

// ---------------------------------------------------------------------------
// Constraint
// ---------------------------------------------------------------------------

/// Mutable per-cycle state of one configured constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    config: ConstraintConfig,
    reference: DVector<f64>,
    reference_root: DVector<f64>,
    weights: DVector<f64>,
    activation: f64,
    timed_out: bool,
    last_reference_update: Timestamp,
    last_evaluation: Option<Timestamp>,
    task_matrix: DMatrix<f64>,
    state: KindState,
}

impl Constraint {
    /// Fresh state: zero reference, configured weights, full activation.
    ///
    /// `now` counts as the last reference update, so a timeout starts
    /// running at configuration time.
    pub fn new(config: ConstraintConfig, n_joints: usize, now: Timestamp) -> Self {
        let dim = config.output_dim();
        let state = match config.kind {
            ConstraintKind::Cartesian { .. } => KindState::Cartesian(Box::default()),
            ConstraintKind::Joint { .. } => KindState::Joint,
        };
        Self {
            weights: DVector::from_vec(config.initial_weights()),
            reference: DVector::zeros(dim),
            reference_root: DVector::zeros(dim),
            activation: 1.0,
            timed_out: false,
            last_reference_update: now,
            last_evaluation: None,
            task_matrix: DMatrix::zeros(dim, n_joints),
            state,
            config,
        }
    }

    pub fn config(&self) -> &ConstraintConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Number of equation rows this constraint contributes.
    pub fn output_dim(&self) -> usize {
        self.reference.len()
    }

    /// Reference as last written (in the configured reference frame).
    pub fn reference(&self) -> &DVector<f64> {
        &self.reference
    }

    /// Reference re-expressed in the root frame during the last evaluation.
    pub fn reference_root(&self) -> &DVector<f64> {
        &self.reference_root
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    pub const fn activation(&self) -> f64 {
        self.activation
    }

    pub const fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub const fn last_reference_update(&self) -> Timestamp {
        self.last_reference_update
    }

    pub const fn last_evaluation(&self) -> Option<Timestamp> {
        self.last_evaluation
    }

    /// Task matrix (output rows × robot joints) from the last evaluation.
    pub fn task_matrix(&self) -> &DMatrix<f64> {
        &self.task_matrix
    }

    pub fn state(&self) -> &KindState {
        &self.state
    }

    /// Cartesian intermediate data, `None` for joint constraints.
    pub fn cartesian_state(&self) -> Option<&CartesianState> {
        match &self.state {
            KindState::Cartesian(state) => Some(state),
            KindState::Joint => None,
        }
    }

    /// Weights as they enter the equation system: configured weights scaled
    /// by activation, zero while timed out.
    pub fn effective_weights(&self) -> DVector<f64> {
        let gate = if self.timed_out { 0.0 } else { 1.0 };
        &self.weights * (self.activation * gate)
    }

    // -- Mutators (reached through ConstraintHandle) --

    pub(crate) fn set_reference(&mut self, values: &[f64], now: Timestamp) -> Result<(), InputError> {
        if values.len() != self.output_dim() {
            return Err(InputError::ReferenceDimMismatch {
                constraint: self.config.name.clone(),
                expected: self.output_dim(),
                got: values.len(),
            });
        }
        self.reference.copy_from_slice(values);
        self.last_reference_update = now;
        Ok(())
    }

    pub(crate) fn set_activation(&mut self, activation: f64) -> Result<(), InputError> {
        if !activation.is_finite() || !(0.0..=1.0).contains(&activation) {
            return Err(InputError::InvalidActivation {
                constraint: self.config.name.clone(),
                value: activation,
            });
        }
        self.activation = activation;
        Ok(())
    }

    pub(crate) fn set_weights(&mut self, weights: &[f64]) -> Result<(), InputError> {
        if weights.len() != self.output_dim() {
            return Err(InputError::WeightDimMismatch {
                constraint: self.config.name.clone(),
                expected: self.output_dim(),
                got: weights.len(),
            });
        }
        self.weights.copy_from_slice(weights);
        Ok(())
    }

    // -- Evaluation --

    /// Run one cycle of evaluation: timeout check, task matrix, root-frame
    /// reference and the activation reset.
    ///
    /// `frames` must already be checked for completeness and spliced into
    /// `registry`.
    pub(crate) fn evaluate(
        &mut self,
        frames: &TaskFrameMap,
        registry: &TaskFrameRegistry,
        joints: &JointIndexMap,
        now: Timestamp,
    ) -> Result<(), InputError> {
        let timeout = self.config.timeout;
        self.timed_out =
            timeout > 0.0 && now.elapsed_since(self.last_reference_update).as_secs_f64() > timeout;

        match &self.config.kind {
            ConstraintKind::Cartesian {
                root,
                tip,
                ref_frame,
            } => {
                let root_pose = require_frame(frames, root)?.pose;
                let tip_pose = require_frame(frames, tip)?.pose;
                let ref_pose = require_frame(frames, ref_frame)?.pose;

                let pose_tip_in_root = root_pose.inverse() * tip_pose;
                let local_jacobian = twist::local_jacobian(&pose_tip_in_root, &root_pose.rotation);
                let pseudo_inverse = PseudoInverse::compute(&local_jacobian)
                    .ok_or_else(|| InputError::DecompositionFailed(self.config.name.clone()))?;

                let dim = self.reference.len();
                self.task_matrix =
                    pseudo_inverse.h.rows(0, dim) * (registry.require_jacobian(tip)? - registry.require_jacobian(root)?);

                // Rotation only: a pure angular reference must not pick up a
                // linear component from the offset between the frames.
                let pose_ref_frame_in_root = root_pose.inverse() * ref_pose;
                let reference = Vector6::from_column_slice(self.reference.as_slice());
                let in_root = twist::rotate(&pose_ref_frame_in_root.rotation, &reference);
                self.reference_root.copy_from_slice(in_root.as_slice());

                let evaluated = CartesianState {
                    pose_tip_in_root,
                    pose_ref_frame_in_root,
                    local_jacobian,
                    pseudo_inverse,
                };
                match &mut self.state {
                    KindState::Cartesian(state) => **state = evaluated,
                    other => *other = KindState::Cartesian(Box::new(evaluated)),
                }
            }
            ConstraintKind::Joint { joint_names } => {
                self.task_matrix.fill(0.0);
                for (row, joint) in joint_names.iter().enumerate() {
                    let Some(col) = joints.index_of(joint) else {
                        return Err(InputError::UnknownConstraintJoint {
                            constraint: self.config.name.clone(),
                            joint: joint.clone(),
                        });
                    };
                    self.task_matrix[(row, col)] = 1.0;
                }
                self.reference_root.copy_from(&self.reference);
            }
        }

        self.last_evaluation = Some(now);

        // A stale reference from an earlier active phase must not leak into
        // the next one.
        #[allow(clippy::float_cmp)]
        if self.activation == 0.0 {
            self.reference.fill(0.0);
            self.reference_root.fill(0.0);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConstraintHandle
// ---------------------------------------------------------------------------

/// Mutable access to one constraint, stamped with the time of the lookup.
///
/// Reads go through `Deref` to [`Constraint`].
#[derive(Debug)]
pub struct ConstraintHandle<'a> {
    constraint: &'a mut Constraint,
    now: Timestamp,
}

impl<'a> ConstraintHandle<'a> {
    pub(crate) fn new(constraint: &'a mut Constraint, now: Timestamp) -> Self {
        Self { constraint, now }
    }

    /// Write a new reference and mark it as fresh.
    ///
    /// Cartesian references are twists `[vx, vy, vz, wx, wy, wz]` in the
    /// constraint's reference frame. Joint references hold one velocity per
    /// listed joint.
    pub fn set_reference(&mut self, values: &[f64]) -> Result<(), InputError> {
        self.constraint.set_reference(values, self.now)
    }

    /// Write a reference twist. Cartesian constraints only.
    pub fn set_twist(&mut self, twist: &Vector6<f64>) -> Result<(), InputError> {
        if !self.constraint.config.is_cartesian() {
            return Err(InputError::NotCartesian(self.constraint.config.name.clone()));
        }
        self.constraint.set_reference(twist.as_slice(), self.now)
    }

    /// Set the activation gate, in `[0, 1]`.
    pub fn set_activation(&mut self, activation: f64) -> Result<(), InputError> {
        self.constraint.set_activation(activation)
    }

    pub fn set_weights(&mut self, weights: &[f64]) -> Result<(), InputError> {
        self.constraint.set_weights(weights)
    }
}

impl Deref for ConstraintHandle<'_> {
    type Target = Constraint;

    fn deref(&self) -> &Constraint {
        self.constraint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix6xX, UnitQuaternion, Vector3};
    use std::time::Duration;

    use crate::task_frame::TaskFrame;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn joint_map() -> JointIndexMap {
        JointIndexMap::from_names(&names(&["j1", "j2", "j3"])).unwrap()
    }

    #[test]
    fn new_constraint_defaults() {
        let c = Constraint::new(
            ConstraintConfig::joint("posture", 0, ["j1", "j3"]),
            3,
            Timestamp::from_secs(1.0),
        );
        assert_eq!(c.output_dim(), 2);
        assert_eq!(c.task_matrix().shape(), (2, 3));
        assert_relative_eq!(c.activation(), 1.0);
        assert!(!c.timed_out());
        assert_eq!(c.last_reference_update(), Timestamp::from_secs(1.0));
        assert!(c.last_evaluation().is_none());
        assert_eq!(c.weights().as_slice(), &[1.0, 1.0]);
        assert!(c.cartesian_state().is_none());
    }

    #[test]
    fn handle_stamps_reference_updates() {
        let mut c = Constraint::new(ConstraintConfig::joint("p", 0, ["j1"]), 3, Timestamp::ZERO);
        let mut handle = ConstraintHandle::new(&mut c, Timestamp::from_secs(3.0));
        handle.set_reference(&[0.25]).unwrap();
        assert_eq!(handle.last_reference_update(), Timestamp::from_secs(3.0));
        assert_eq!(handle.reference().as_slice(), &[0.25]);
    }

    #[test]
    fn reference_length_checked() {
        let mut c = Constraint::new(ConstraintConfig::joint("p", 0, ["j1"]), 3, Timestamp::ZERO);
        let err = c.set_reference(&[1.0, 2.0], Timestamp::ZERO).unwrap_err();
        assert!(matches!(
            err,
            InputError::ReferenceDimMismatch {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn weights_length_checked() {
        let mut c = Constraint::new(ConstraintConfig::joint("p", 0, ["j1"]), 3, Timestamp::ZERO);
        assert!(c.set_weights(&[1.0, 1.0]).is_err());
        c.set_weights(&[0.3]).unwrap();
        assert_eq!(c.weights().as_slice(), &[0.3]);
    }

    #[test]
    fn activation_range_checked() {
        let mut c = Constraint::new(ConstraintConfig::joint("p", 0, ["j1"]), 3, Timestamp::ZERO);
        assert!(c.set_activation(1.5).is_err());
        assert!(c.set_activation(-0.1).is_err());
        assert!(c.set_activation(f64::NAN).is_err());
        c.set_activation(0.5).unwrap();
        assert_relative_eq!(c.activation(), 0.5);
    }

    #[test]
    fn set_twist_rejected_for_joint_constraint() {
        let mut c = Constraint::new(ConstraintConfig::joint("p", 0, ["j1"]), 3, Timestamp::ZERO);
        let mut handle = ConstraintHandle::new(&mut c, Timestamp::ZERO);
        let err = handle.set_twist(&Vector6::zeros()).unwrap_err();
        assert_eq!(err, InputError::NotCartesian("p".into()));
    }

    #[test]
    fn joint_selection_matrix() {
        let mut c = Constraint::new(
            ConstraintConfig::joint("p", 0, ["j3", "j1"]),
            3,
            Timestamp::ZERO,
        );
        c.set_reference(&[0.1, 0.2], Timestamp::ZERO).unwrap();
        c.evaluate(
            &TaskFrameMap::new(),
            &TaskFrameRegistry::default(),
            &joint_map(),
            Timestamp::ZERO,
        )
        .unwrap();
        let expected = DMatrix::from_row_slice(2, 3, &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert_eq!(c.task_matrix(), &expected);
        assert_eq!(c.reference_root().as_slice(), &[0.1, 0.2]);
        assert_eq!(c.last_evaluation(), Some(Timestamp::ZERO));
    }

    #[test]
    fn joint_constraint_unknown_joint() {
        let mut c = Constraint::new(ConstraintConfig::joint("p", 0, ["j7"]), 3, Timestamp::ZERO);
        let err = c
            .evaluate(
                &TaskFrameMap::new(),
                &TaskFrameRegistry::default(),
                &joint_map(),
                Timestamp::ZERO,
            )
            .unwrap_err();
        assert_eq!(
            err,
            InputError::UnknownConstraintJoint {
                constraint: "p".into(),
                joint: "j7".into()
            }
        );
    }

    #[test]
    fn timeout_and_activation_gate_weights() {
        let mut c = Constraint::new(
            ConstraintConfig::joint("p", 0, ["j1"])
                .with_weights(vec![2.0])
                .with_timeout(0.1),
            3,
            Timestamp::ZERO,
        );
        c.set_activation(0.5).unwrap();
        let frames = TaskFrameMap::new();
        let registry = TaskFrameRegistry::default();

        c.evaluate(&frames, &registry, &joint_map(), Timestamp::from_secs(0.05))
            .unwrap();
        assert!(!c.timed_out());
        assert_relative_eq!(c.effective_weights()[0], 1.0);

        let later = Timestamp::ZERO + Duration::from_millis(200);
        c.evaluate(&frames, &registry, &joint_map(), later).unwrap();
        assert!(c.timed_out());
        assert_relative_eq!(c.effective_weights()[0], 0.0);

        // A fresh reference clears the timeout on the next evaluation.
        c.set_reference(&[0.0], later).unwrap();
        c.evaluate(&frames, &registry, &joint_map(), later).unwrap();
        assert!(!c.timed_out());
    }

    #[test]
    fn zero_activation_clears_references() {
        let mut c = Constraint::new(ConstraintConfig::joint("p", 0, ["j2"]), 3, Timestamp::ZERO);
        c.set_reference(&[0.7], Timestamp::ZERO).unwrap();
        c.set_activation(0.0).unwrap();
        c.evaluate(
            &TaskFrameMap::new(),
            &TaskFrameRegistry::default(),
            &joint_map(),
            Timestamp::ZERO,
        )
        .unwrap();
        assert_eq!(c.reference().as_slice(), &[0.0]);
        assert_eq!(c.reference_root().as_slice(), &[0.0]);

        // Re-activating without a new write keeps the cleared reference.
        c.set_activation(1.0).unwrap();
        c.evaluate(
            &TaskFrameMap::new(),
            &TaskFrameRegistry::default(),
            &joint_map(),
            Timestamp::ZERO,
        )
        .unwrap();
        assert_eq!(c.reference_root().as_slice(), &[0.0]);
    }

    fn cartesian_setup(
        root_pose: Isometry3<f64>,
        tip_pose: Isometry3<f64>,
        ref_pose: Isometry3<f64>,
    ) -> (TaskFrameMap, TaskFrameRegistry) {
        let config = ConstraintConfig::cartesian("ee", 0, "root", "tip", "ref");
        let mut registry = TaskFrameRegistry::from_constraints([&config], 3);
        let mut frames = TaskFrameMap::new();
        frames.insert("root".into(), TaskFrame::fixed(root_pose));
        frames.insert("ref".into(), TaskFrame::fixed(ref_pose));
        let tip_jac = Matrix6xX::from_fn(3, |r, c| if r == c { 1.0 } else { 0.0 });
        frames.insert(
            "tip".into(),
            TaskFrame::new(names(&["j1", "j2", "j3"]), tip_jac, tip_pose),
        );
        registry.splice(&frames, &joint_map()).unwrap();
        (frames, registry)
    }

    #[test]
    fn cartesian_identity_frames() {
        let (frames, registry) =
            cartesian_setup(Isometry3::identity(), Isometry3::identity(), Isometry3::identity());
        let mut c = Constraint::new(
            ConstraintConfig::cartesian("ee", 0, "root", "tip", "ref"),
            3,
            Timestamp::ZERO,
        );
        c.set_reference(&[0.1, 0.2, 0.3, 0.0, 0.0, 0.0], Timestamp::ZERO)
            .unwrap();
        c.evaluate(&frames, &registry, &joint_map(), Timestamp::ZERO)
            .unwrap();

        // Identity local Jacobian: the task matrix is the tip Jacobian.
        let expected = Matrix6xX::from_fn(3, |r, c| if r == c { 1.0 } else { 0.0 });
        assert_relative_eq!(
            c.task_matrix().clone(),
            DMatrix::from_column_slice(6, 3, expected.as_slice()),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            c.reference_root().clone(),
            DVector::from_vec(vec![0.1, 0.2, 0.3, 0.0, 0.0, 0.0]),
            epsilon = 1e-12
        );
        let state = c.cartesian_state().unwrap();
        assert_relative_eq!(
            state.pseudo_inverse.h * state.local_jacobian,
            Matrix6::identity(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn cartesian_reference_rotation_only() {
        let ref_pose = Isometry3::from_parts(
            Vector3::new(2.0, 0.0, 0.0).into(),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
        );
        let (frames, registry) = cartesian_setup(
            Isometry3::identity(),
            Isometry3::translation(0.0, 0.0, 0.5),
            ref_pose,
        );
        let mut c = Constraint::new(
            ConstraintConfig::cartesian("ee", 0, "root", "tip", "ref"),
            3,
            Timestamp::ZERO,
        );
        // Pure rotation about the reference frame's x axis.
        c.set_reference(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0], Timestamp::ZERO)
            .unwrap();
        c.evaluate(&frames, &registry, &joint_map(), Timestamp::ZERO)
            .unwrap();

        let out = c.reference_root();
        // No translational velocity despite the 2 m offset; axis becomes +y.
        assert_relative_eq!(out[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[2], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[3], 0.0, epsilon = 1e-12);
        assert_relative_eq!(out[4], 1.0, epsilon = 1e-12);
        assert_relative_eq!(out[5], 0.0, epsilon = 1e-12);

        let state = c.cartesian_state().unwrap();
        assert_relative_eq!(
            state.pose_tip_in_root.translation.vector,
            Vector3::new(0.0, 0.0, 0.5),
            epsilon = 1e-12
        );
    }
}
