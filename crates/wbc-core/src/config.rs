use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Output dimensionality of every Cartesian constraint (a full twist).
pub const CARTESIAN_DIM: usize = 6;

// ---------------------------------------------------------------------------
// ConstraintKind
// ---------------------------------------------------------------------------

/// What a constraint acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Relative twist of `tip` with respect to `root`. The reference twist
    /// is given in `ref_frame`.
    Cartesian {
        root: String,
        tip: String,
        ref_frame: String,
    },
    /// Velocities of the listed joints, in the listed order.
    Joint { joint_names: Vec<String> },
}

// ---------------------------------------------------------------------------
// ConstraintConfig
// ---------------------------------------------------------------------------

/// Immutable description of one constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintConfig {
    /// Unique name, used to look the constraint up every cycle.
    pub name: String,

    /// Priority level. 0 is the highest priority. Negative values are
    /// rejected at configure time.
    #[serde(default)]
    pub priority: i32,

    pub kind: ConstraintKind,

    /// Per-row weights. `None` means all ones.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,

    /// Seconds without a reference update after which the constraint is
    /// deactivated. 0 disables the timeout.
    #[serde(default)]
    pub timeout: f64,
}

impl ConstraintConfig {
    /// A Cartesian constraint with unit weights and no timeout.
    pub fn cartesian(
        name: impl Into<String>,
        priority: i32,
        root: impl Into<String>,
        tip: impl Into<String>,
        ref_frame: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            kind: ConstraintKind::Cartesian {
                root: root.into(),
                tip: tip.into(),
                ref_frame: ref_frame.into(),
            },
            weights: None,
            timeout: 0.0,
        }
    }

    /// A joint-space constraint with unit weights and no timeout.
    pub fn joint<S: Into<String>>(
        name: impl Into<String>,
        priority: i32,
        joint_names: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            kind: ConstraintKind::Joint {
                joint_names: joint_names.into_iter().map(Into::into).collect(),
            },
            weights: None,
            timeout: 0.0,
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of equation rows this constraint contributes.
    pub fn output_dim(&self) -> usize {
        match &self.kind {
            ConstraintKind::Cartesian { .. } => CARTESIAN_DIM,
            ConstraintKind::Joint { joint_names } => joint_names.len(),
        }
    }

    /// Configured weights, or all ones.
    pub fn initial_weights(&self) -> Vec<f64> {
        self.weights
            .clone()
            .unwrap_or_else(|| vec![1.0; self.output_dim()])
    }

    /// Root, tip and reference frame names, for Cartesian constraints.
    pub fn frame_names(&self) -> Option<[&str; 3]> {
        match &self.kind {
            ConstraintKind::Cartesian {
                root,
                tip,
                ref_frame,
            } => Some([root, tip, ref_frame]),
            ConstraintKind::Joint { .. } => None,
        }
    }

    pub const fn is_cartesian(&self) -> bool {
        matches!(self.kind, ConstraintKind::Cartesian { .. })
    }

    /// Validate the fields of this constraint on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.priority < 0 {
            return Err(ConfigError::InvalidPriority {
                name: self.name.clone(),
                priority: self.priority,
            });
        }
        if let ConstraintKind::Joint { joint_names } = &self.kind
            && joint_names.is_empty()
        {
            return Err(ConfigError::EmptyJointList(self.name.clone()));
        }
        if let Some(weights) = &self.weights
            && weights.len() != self.output_dim()
        {
            return Err(ConfigError::WeightDimMismatch {
                name: self.name.clone(),
                expected: self.output_dim(),
                got: weights.len(),
            });
        }
        if !self.timeout.is_finite() || self.timeout < 0.0 {
            return Err(ConfigError::InvalidTimeout {
                name: self.name.clone(),
                timeout: self.timeout,
            });
        }
        Ok(())
    }
}

/// Validate a full constraint set against the robot's joint list.
///
/// Checks every constraint individually, then name uniqueness, then joint
/// name uniqueness. Nothing is built; callers can validate before touching
/// any state.
pub fn validate_constraints(
    constraints: &[ConstraintConfig],
    joint_names: &[String],
) -> Result<(), ConfigError> {
    for constraint in constraints {
        constraint.validate()?;
    }

    let mut names = HashSet::with_capacity(constraints.len());
    for constraint in constraints {
        if !names.insert(constraint.name.as_str()) {
            return Err(ConfigError::DuplicateConstraintName(
                constraint.name.clone(),
            ));
        }
    }

    let mut joints = HashSet::with_capacity(joint_names.len());
    for joint in joint_names {
        if !joints.insert(joint.as_str()) {
            return Err(ConfigError::DuplicateJointName(joint.clone()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// WbcConfig
// ---------------------------------------------------------------------------

/// Complete controller configuration loaded from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WbcConfig {
    /// Robot joints. Their order defines the task-matrix column order.
    pub joint_names: Vec<String>,

    #[serde(default)]
    pub constraints: Vec<ConstraintConfig>,
}

impl WbcConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_constraints(&self.constraints, &self.joint_names)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
