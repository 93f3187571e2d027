//! Sample configurations.

use wbc_core::config::{ConstraintConfig, WbcConfig};

/// Owned joint names from string literals.
pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

/// Two joints, one posture constraint on `j2`.
pub fn two_joint_config() -> WbcConfig {
    WbcConfig {
        joint_names: names(&["j1", "j2"]),
        constraints: vec![ConstraintConfig::joint("posture_j2", 0, ["j2"])],
    }
}

/// Three-joint planar arm: a Cartesian tool constraint on priority 0 and a
/// full posture constraint on priority 1.
///
/// Needs the task frames `base` and `tool`.
pub fn arm_config() -> WbcConfig {
    WbcConfig {
        joint_names: names(&["shoulder", "elbow", "wrist"]),
        constraints: vec![
            ConstraintConfig::cartesian("tool_pose", 0, "base", "tool", "base"),
            ConstraintConfig::joint("posture", 1, ["shoulder", "elbow", "wrist"])
                .with_weights(vec![0.1, 0.1, 0.1]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_configs_validate() {
        assert!(two_joint_config().validate().is_ok());
        assert!(arm_config().validate().is_ok());
    }
}
