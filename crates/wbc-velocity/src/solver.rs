//! Velocity-level whole-body controller front end.
//!
//! [`WbcVelocity`] owns every configured constraint, the joint index map and
//! the task-frame registry. Once per control cycle the caller writes new
//! references through [`WbcVelocity::constraint`] and then calls
//! [`WbcVelocity::assemble`] with the current task frames to get one
//! weighted linear system per priority level.

use std::collections::{BTreeMap, HashMap};

use nalgebra::Matrix6xX;
use tracing::{debug, trace, warn};

use wbc_core::config::{ConstraintConfig, WbcConfig, validate_constraints};
use wbc_core::error::{UsageError, WbcError};
use wbc_core::time::{Clock, SystemClock};

use crate::constraint::{Constraint, ConstraintHandle};
use crate::equation::LinearEquationSystem;
use crate::joint_index::JointIndexMap;
use crate::task_frame::{TaskFrameMap, TaskFrameRegistry};

// ---------------------------------------------------------------------------
// PriorityLevel
// ---------------------------------------------------------------------------

/// Constraints sharing one priority, in configuration order.
#[derive(Debug, Clone)]
pub struct PriorityLevel {
    priority: i32,
    rows: usize,
    constraints: Vec<Constraint>,
}

impl PriorityLevel {
    /// Priority value as configured (levels themselves are compacted).
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Total output rows of all constraints on this level.
    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }
}

// ---------------------------------------------------------------------------
// WbcVelocity
// ---------------------------------------------------------------------------

/// Assembles priority-ordered velocity equation systems from constraints.
#[derive(Debug)]
pub struct WbcVelocity<C: Clock = SystemClock> {
    clock: C,
    configured: bool,
    joints: JointIndexMap,
    task_frames: TaskFrameRegistry,
    levels: Vec<PriorityLevel>,
    /// Name → (level, position). Holds no ownership.
    by_name: HashMap<String, (usize, usize)>,
    equations: Vec<LinearEquationSystem>,
    /// Filled by `assemble`, swapped with `equations` on success.
    scratch: Vec<LinearEquationSystem>,
}

impl WbcVelocity<SystemClock> {
    /// Create an unconfigured solver on the monotonic system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl Default for WbcVelocity<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> WbcVelocity<C> {
    /// Create an unconfigured solver on a custom clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            configured: false,
            joints: JointIndexMap::default(),
            task_frames: TaskFrameRegistry::default(),
            levels: Vec::new(),
            by_name: HashMap::new(),
            equations: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Drop all constraints, joints and task frames.
    pub fn clear(&mut self) {
        self.configured = false;
        self.joints = JointIndexMap::default();
        self.task_frames = TaskFrameRegistry::default();
        self.levels.clear();
        self.by_name.clear();
        self.equations.clear();
        self.scratch.clear();
    }

    // -- Configuration --

    /// Replace the configuration.
    ///
    /// The whole input is validated before anything is built; on error the
    /// solver is left unconfigured with no partial state.
    pub fn configure(
        &mut self,
        constraints: &[ConstraintConfig],
        joint_names: &[String],
    ) -> Result<(), WbcError> {
        self.clear();

        validate_constraints(constraints, joint_names)
            .inspect_err(|e| warn!("rejected whole-body controller configuration: {e}"))?;
        let joints = JointIndexMap::from_names(joint_names)?;

        // BTreeMap keys sort ascending; empty priorities never appear, so
        // level indices come out contiguous.
        let mut grouped: BTreeMap<i32, Vec<&ConstraintConfig>> = BTreeMap::new();
        for config in constraints {
            grouped.entry(config.priority).or_default().push(config);
        }

        let now = self.clock.now();
        let n_joints = joints.len();
        let mut levels = Vec::with_capacity(grouped.len());
        let mut by_name = HashMap::with_capacity(constraints.len());
        for (level_idx, (priority, configs)) in grouped.into_iter().enumerate() {
            let mut level = PriorityLevel {
                priority,
                rows: 0,
                constraints: Vec::with_capacity(configs.len()),
            };
            for config in configs {
                by_name.insert(config.name.clone(), (level_idx, level.constraints.len()));
                level.rows += config.output_dim();
                level
                    .constraints
                    .push(Constraint::new(config.clone(), n_joints, now));
            }
            levels.push(level);
        }

        let task_frames = TaskFrameRegistry::from_constraints(
            levels
                .iter()
                .flat_map(|level| level.constraints.iter().map(Constraint::config)),
            n_joints,
        );

        self.joints = joints;
        self.task_frames = task_frames;
        self.equations = levels
            .iter()
            .map(|level| LinearEquationSystem::zeros(level.rows, n_joints))
            .collect();
        self.scratch = self.equations.clone();
        self.levels = levels;
        self.by_name = by_name;
        self.configured = true;

        self.log_layout();
        Ok(())
    }

    /// Configure from a loaded [`WbcConfig`].
    pub fn configure_from(&mut self, config: &WbcConfig) -> Result<(), WbcError> {
        self.configure(&config.constraints, &config.joint_names)
    }

    fn log_layout(&self) {
        debug!("joint index map:");
        for (name, index) in self.joints.iter() {
            debug!("  {name}: {index}");
        }
        debug!("task frames: {:?}", self.task_frames.names());
        for (idx, level) in self.levels.iter().enumerate() {
            debug!(
                "priority level {idx} (configured {}), {} rows:",
                level.priority, level.rows
            );
            for constraint in &level.constraints {
                match constraint.config().frame_names() {
                    Some([root, tip, ref_frame]) => debug!(
                        "  {}: cartesian, root '{root}', tip '{tip}', ref frame '{ref_frame}'",
                        constraint.name()
                    ),
                    None => debug!(
                        "  {}: joint, {} joints",
                        constraint.name(),
                        constraint.output_dim()
                    ),
                }
            }
        }
    }

    fn ensure_configured(&self) -> Result<(), UsageError> {
        if self.configured {
            Ok(())
        } else {
            Err(UsageError::NotConfigured)
        }
    }

    fn position_of(&self, name: &str) -> Result<(usize, usize), UsageError> {
        self.ensure_configured()?;
        self.by_name.get(name).copied().ok_or_else(|| {
            warn!("no such constraint: {name}");
            UsageError::ConstraintNotFound(name.to_string())
        })
    }

    // -- Lookup --

    /// Mutable handle to a constraint, for writing this cycle's reference,
    /// activation or weights.
    pub fn constraint(&mut self, name: &str) -> Result<ConstraintHandle<'_>, WbcError> {
        let (level, pos) = self.position_of(name)?;
        let now = self.clock.now();
        Ok(ConstraintHandle::new(
            &mut self.levels[level].constraints[pos],
            now,
        ))
    }

    /// Read-only view of a constraint.
    pub fn constraint_ref(&self, name: &str) -> Result<&Constraint, WbcError> {
        let (level, pos) = self.position_of(name)?;
        Ok(&self.levels[level].constraints[pos])
    }

    // -- Assembly --

    /// Build one weighted linear system per priority level.
    ///
    /// `task_frames` must contain every frame named by a Cartesian
    /// constraint. The systems are built in a scratch set and only replace
    /// [`equations`](Self::equations) once every constraint evaluated, so a
    /// failed call leaves the previous cycle's systems in place.
    pub fn assemble(
        &mut self,
        task_frames: &TaskFrameMap,
    ) -> Result<&[LinearEquationSystem], WbcError> {
        self.ensure_configured()?;

        self.task_frames
            .check_complete(task_frames)
            .inspect_err(|e| warn!("{e}"))?;
        self.task_frames
            .splice(task_frames, &self.joints)
            .inspect_err(|e| warn!("{e}"))?;

        let now = self.clock.now();
        let n_joints = self.joints.len();
        self.scratch
            .resize_with(self.levels.len(), || LinearEquationSystem::zeros(0, 0));

        for (level, equations) in self.levels.iter_mut().zip(self.scratch.iter_mut()) {
            equations.reset(level.rows, n_joints);
            let mut row = 0;
            for constraint in &mut level.constraints {
                constraint
                    .evaluate(task_frames, &self.task_frames, &self.joints, now)
                    .inspect_err(|e| warn!("{e}"))?;
                equations.write_constraint(row, constraint);
                row += constraint.output_dim();
            }
        }

        std::mem::swap(&mut self.equations, &mut self.scratch);
        trace!(levels = self.equations.len(), time = %now, "assembled equation systems");
        Ok(&self.equations)
    }

    // -- Introspection --

    pub const fn is_configured(&self) -> bool {
        self.configured
    }

    /// Joint names in task-matrix column order.
    pub fn joint_names(&self) -> Vec<String> {
        (0..self.joints.len())
            .filter_map(|i| self.joints.name_of(i).map(str::to_string))
            .collect()
    }

    pub const fn joint_index_map(&self) -> &JointIndexMap {
        &self.joints
    }

    /// Number of (compacted) priority levels.
    pub fn priority_count(&self) -> usize {
        self.levels.len()
    }

    /// Configured priority value of each level.
    pub fn priorities(&self) -> Vec<i32> {
        self.levels.iter().map(PriorityLevel::priority).collect()
    }

    /// Row count of each level's equation system.
    pub fn rows_per_priority(&self) -> Vec<usize> {
        self.levels.iter().map(PriorityLevel::rows).collect()
    }

    pub fn levels(&self) -> &[PriorityLevel] {
        &self.levels
    }

    /// Names of the task frames every [`assemble`](Self::assemble) call needs.
    pub fn task_frame_names(&self) -> &[String] {
        self.task_frames.names()
    }

    /// Full-robot Jacobian of a required task frame, as of the last cycle.
    pub fn task_frame_jacobian(&self, name: &str) -> Option<&Matrix6xX<f64>> {
        self.task_frames.jacobian(name)
    }

    /// Systems produced by the last successful [`assemble`](Self::assemble),
    /// all zero between `configure` and the first one.
    pub fn equations(&self) -> &[LinearEquationSystem] {
        &self.equations
    }

    /// Copy of every constraint's runtime state, grouped by level.
    pub fn snapshot_constraints(&self) -> Vec<Vec<Constraint>> {
        self.levels
            .iter()
            .map(|level| level.constraints.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wbc_core::error::{ConfigError, InputError};
    use wbc_core::time::{ManualClock, Timestamp};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn solver() -> WbcVelocity<ManualClock> {
        WbcVelocity::with_clock(ManualClock::new())
    }

    #[test]
    fn unconfigured_solver_rejects_everything() {
        let mut wbc = solver();
        assert!(!wbc.is_configured());
        assert!(matches!(
            wbc.constraint("x"),
            Err(WbcError::Usage(UsageError::NotConfigured))
        ));
        assert!(matches!(
            wbc.assemble(&TaskFrameMap::new()),
            Err(WbcError::Usage(UsageError::NotConfigured))
        ));
        assert!(wbc.joint_names().is_empty());
        assert!(wbc.snapshot_constraints().is_empty());
    }

    #[test]
    fn sparse_priorities_are_compacted() {
        let mut wbc = solver();
        let constraints = vec![
            ConstraintConfig::joint("a", 0, ["j1"]),
            ConstraintConfig::joint("b", 0, ["j2"]),
            ConstraintConfig::joint("c", 3, ["j1", "j2"]),
        ];
        wbc.configure(&constraints, &names(&["j1", "j2"])).unwrap();
        assert_eq!(wbc.priority_count(), 2);
        assert_eq!(wbc.priorities(), vec![0, 3]);
        assert_eq!(wbc.rows_per_priority(), vec![2, 2]);
    }

    #[test]
    fn lookup_unknown_name() {
        let mut wbc = solver();
        wbc.configure(&[ConstraintConfig::joint("a", 0, ["j1"])], &names(&["j1"]))
            .unwrap();
        let err = wbc.constraint("b").unwrap_err();
        assert!(matches!(
            err,
            WbcError::Usage(UsageError::ConstraintNotFound(ref n)) if n == "b"
        ));
        assert!(wbc.constraint_ref("a").is_ok());
    }

    #[test]
    fn failed_configure_leaves_no_state() {
        let mut wbc = solver();
        wbc.configure(&[ConstraintConfig::joint("a", 0, ["j1"])], &names(&["j1"]))
            .unwrap();

        let bad = vec![
            ConstraintConfig::joint("x", 0, ["j1"]),
            ConstraintConfig::joint("x", 1, ["j1"]),
        ];
        let err = wbc.configure(&bad, &names(&["j1"])).unwrap_err();
        assert!(matches!(
            err,
            WbcError::Config(ConfigError::DuplicateConstraintName(_))
        ));
        assert!(!wbc.is_configured());
        assert_eq!(wbc.priority_count(), 0);
        assert!(wbc.joint_names().is_empty());
        assert!(wbc.constraint_ref("x").is_err());
    }

    #[test]
    fn reference_write_uses_solver_clock() {
        let clock = ManualClock::new();
        let mut wbc = WbcVelocity::with_clock(clock.clone());
        wbc.configure(&[ConstraintConfig::joint("a", 0, ["j1"])], &names(&["j1"]))
            .unwrap();
        clock.advance_secs(2.0);
        wbc.constraint("a").unwrap().set_reference(&[1.0]).unwrap();
        assert_eq!(
            wbc.constraint_ref("a").unwrap().last_reference_update(),
            Timestamp::from_secs(2.0)
        );
    }

    #[test]
    fn unknown_joint_in_joint_constraint_is_input_error() {
        let mut wbc = solver();
        wbc.configure(&[ConstraintConfig::joint("a", 0, ["j9"])], &names(&["j1"]))
            .unwrap();
        let err = wbc.assemble(&TaskFrameMap::new()).unwrap_err();
        assert!(matches!(
            err,
            WbcError::Input(InputError::UnknownConstraintJoint { .. })
        ));
    }

    #[test]
    fn clear_resets_configuration() {
        let mut wbc = solver();
        wbc.configure(&[ConstraintConfig::joint("a", 0, ["j1"])], &names(&["j1"]))
            .unwrap();
        wbc.clear();
        assert!(!wbc.is_configured());
        assert!(wbc.equations().is_empty());
        assert!(wbc.task_frame_names().is_empty());
    }
}
