use thiserror::Error;

/// Top-level error type for the whole-body controller.
#[derive(Debug, Error)]
pub enum WbcError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),
}

/// Configuration errors, detected eagerly while configuring.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Constraint '{name}' has priority {priority} (must be >= 0)")]
    InvalidPriority { name: String, priority: i32 },

    #[error("Constraint name '{0}' is not unique")]
    DuplicateConstraintName(String),

    #[error("Joint name '{0}' is listed more than once")]
    DuplicateJointName(String),

    #[error("Constraint '{name}' has {got} weights, expected {expected}")]
    WeightDimMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Constraint '{name}' has invalid timeout {timeout} (must be finite and >= 0)")]
    InvalidTimeout { name: String, timeout: f64 },

    #[error("Joint constraint '{0}' lists no joints")]
    EmptyJointList(String),
}

/// Operations invoked in the wrong solver state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Solver has not been configured")]
    NotConfigured,

    #[error("No such constraint: {0}")]
    ConstraintNotFound(String),
}

/// Per-cycle input errors. Reported synchronously, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("Task frame '{0}' is required but missing from the task frame input")]
    IncompleteTaskFrameInput(String),

    #[error("Task frame '{frame}' references joint '{joint}' which is not in the joint index map")]
    InvalidJointName { frame: String, joint: String },

    #[error("Constraint '{constraint}' references joint '{joint}' which is not in the joint index map")]
    UnknownConstraintJoint { constraint: String, joint: String },

    #[error("Task frame '{frame}' has a Jacobian with {columns} columns for {joints} joints")]
    TaskFrameDimMismatch {
        frame: String,
        columns: usize,
        joints: usize,
    },

    #[error("Reference for constraint '{constraint}' has {got} entries, expected {expected}")]
    ReferenceDimMismatch {
        constraint: String,
        expected: usize,
        got: usize,
    },

    #[error("Weights for constraint '{constraint}' have {got} entries, expected {expected}")]
    WeightDimMismatch {
        constraint: String,
        expected: usize,
        got: usize,
    },

    #[error("Activation {value} of constraint '{constraint}' is outside [0, 1]")]
    InvalidActivation { constraint: String, value: f64 },

    #[error("Constraint '{0}' is not a Cartesian constraint")]
    NotCartesian(String),

    #[error("Singular value decomposition failed for constraint '{0}'")]
    DecompositionFailed(String),
}
