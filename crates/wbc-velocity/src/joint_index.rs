//! Joint name to column index mapping.
//!
//! The order of the joint names given at configure time defines the column
//! order of every task matrix and every full-robot Jacobian. Task frames may
//! list their joints in any order; they are mapped through this table.

use std::collections::HashMap;

use wbc_core::error::ConfigError;

/// Bijection from joint name to task-matrix column.
#[derive(Debug, Clone, Default)]
pub struct JointIndexMap {
    names: Vec<String>,
    indices: HashMap<String, usize>,
}

impl JointIndexMap {
    /// Build the map, preserving the input order as the column order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateJointName`] if a name repeats.
    pub fn from_names(joint_names: &[String]) -> Result<Self, ConfigError> {
        let mut indices = HashMap::with_capacity(joint_names.len());
        for (i, name) in joint_names.iter().enumerate() {
            if indices.insert(name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateJointName(name.clone()));
            }
        }
        Ok(Self {
            names: joint_names.to_vec(),
            indices,
        })
    }

    /// Column index of `name`, if it is a robot joint.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// Joint name at column `index`.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Number of robot joints (columns).
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Joint names in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `(name, index)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.names.iter().enumerate().map(|(i, n)| (n.as_str(), i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn preserves_input_order() {
        let map = JointIndexMap::from_names(&names(&["hip", "knee", "ankle"])).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.index_of("hip"), Some(0));
        assert_eq!(map.index_of("knee"), Some(1));
        assert_eq!(map.index_of("ankle"), Some(2));
        assert_eq!(map.names(), names(&["hip", "knee", "ankle"]).as_slice());
    }

    #[test]
    fn reverse_lookup() {
        let map = JointIndexMap::from_names(&names(&["a", "b"])).unwrap();
        assert_eq!(map.name_of(1), Some("b"));
        assert_eq!(map.name_of(2), None);
    }

    #[test]
    fn unknown_joint() {
        let map = JointIndexMap::from_names(&names(&["a"])).unwrap();
        assert_eq!(map.index_of("z"), None);
        assert!(!map.contains("z"));
        assert!(map.contains("a"));
    }

    #[test]
    fn duplicate_joint_rejected() {
        let err = JointIndexMap::from_names(&names(&["a", "b", "a"])).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateJointName(ref n) if n == "a"));
    }

    #[test]
    fn iter_matches_column_order() {
        let map = JointIndexMap::from_names(&names(&["x", "y"])).unwrap();
        let pairs: Vec<_> = map.iter().collect();
        assert_eq!(pairs, vec![("x", 0), ("y", 1)]);
    }

    #[test]
    fn empty_map() {
        let map = JointIndexMap::default();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }
}
