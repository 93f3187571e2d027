//! Task frame fixtures.

use nalgebra::{Isometry3, Matrix6xX, Translation3, UnitQuaternion, Vector3, Vector6};
use wbc_velocity::{TaskFrame, TaskFrameMap};

/// Frame that no joint moves, placed at `(x, y, z)`.
pub fn fixed_frame(x: f64, y: f64, z: f64) -> TaskFrame {
    TaskFrame::fixed(Isometry3::translation(x, y, z))
}

/// Collect `(name, frame)` pairs into a [`TaskFrameMap`].
pub fn frame_map<'a>(frames: impl IntoIterator<Item = (&'a str, TaskFrame)>) -> TaskFrameMap {
    frames
        .into_iter()
        .map(|(name, frame)| (name.to_string(), frame))
        .collect()
}

// ---------------------------------------------------------------------------
// PlanarChain
// ---------------------------------------------------------------------------

/// Serial chain of revolute joints about the base z axis, links along the
/// local x axis. The base sits at the origin.
#[derive(Debug, Clone)]
pub struct PlanarChain {
    joint_names: Vec<String>,
    link_lengths: Vec<f64>,
}

impl PlanarChain {
    /// One joint per link; `joint_names` and `link_lengths` must match.
    pub fn new(joint_names: &[&str], link_lengths: &[f64]) -> Self {
        assert_eq!(
            joint_names.len(),
            link_lengths.len(),
            "one link length per joint"
        );
        Self {
            joint_names: joint_names.iter().map(|s| (*s).to_string()).collect(),
            link_lengths: link_lengths.to_vec(),
        }
    }

    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn dof(&self) -> usize {
        self.joint_names.len()
    }

    /// Joint origins in the base frame plus the tip position and yaw.
    fn forward(&self, q: &[f64]) -> (Vec<Vector3<f64>>, Vector3<f64>, f64) {
        assert_eq!(q.len(), self.dof(), "one position per joint");
        let mut origins = Vec::with_capacity(self.dof());
        let mut p = Vector3::zeros();
        let mut yaw = 0.0_f64;
        for (qi, length) in q.iter().zip(&self.link_lengths) {
            origins.push(p);
            yaw += *qi;
            p += Vector3::new(yaw.cos(), yaw.sin(), 0.0) * *length;
        }
        (origins, p, yaw)
    }

    /// Pose of the chain tip in the base frame.
    pub fn tip_pose(&self, q: &[f64]) -> Isometry3<f64> {
        let (_, tip, yaw) = self.forward(q);
        Isometry3::from_parts(
            Translation3::from(tip),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
        )
    }

    /// Tip task frame: geometric Jacobian with columns `[z × (p − o); z]`.
    pub fn tip_frame(&self, q: &[f64]) -> TaskFrame {
        let (origins, tip, _) = self.forward(q);
        let z = Vector3::z();
        let columns: Vec<Vector6<f64>> = origins
            .iter()
            .map(|o| {
                let linear = z.cross(&(tip - o));
                Vector6::new(linear.x, linear.y, linear.z, z.x, z.y, z.z)
            })
            .collect();
        TaskFrame::new(
            self.joint_names.clone(),
            Matrix6xX::from_columns(&columns),
            self.tip_pose(q),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn straight_chain_tip_on_x_axis() {
        let chain = PlanarChain::new(&["a", "b"], &[1.0, 0.5]);
        let pose = chain.tip_pose(&[0.0, 0.0]);
        assert_relative_eq!(pose.translation.vector, Vector3::new(1.5, 0.0, 0.0));
    }

    #[test]
    fn straight_chain_jacobian() {
        let chain = PlanarChain::new(&["a", "b"], &[1.0, 0.5]);
        let frame = chain.tip_frame(&[0.0, 0.0]);
        assert_eq!(frame.jacobian.ncols(), 2);
        // Both joints push the tip along +y, proportional to lever arm.
        assert_relative_eq!(frame.jacobian[(1, 0)], 1.5);
        assert_relative_eq!(frame.jacobian[(1, 1)], 0.5);
        assert_relative_eq!(frame.jacobian[(5, 0)], 1.0);
        assert_relative_eq!(frame.jacobian[(0, 0)], 0.0);
    }

    #[test]
    fn bent_chain_tip() {
        let chain = PlanarChain::new(&["a", "b"], &[1.0, 1.0]);
        let pose = chain.tip_pose(&[0.0, std::f64::consts::FRAC_PI_2]);
        assert_relative_eq!(
            pose.translation.vector,
            Vector3::new(1.0, 1.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn frame_map_collects_names() {
        let map = frame_map([("base", fixed_frame(0.0, 0.0, 0.0))]);
        assert!(map.contains_key("base"));
    }
}
