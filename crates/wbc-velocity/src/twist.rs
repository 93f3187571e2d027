//! Twist and Jacobian re-expression.
//!
//! Twists are 6-vectors `[vx, vy, vz, wx, wy, wz]`, linear part first.

use nalgebra::{Isometry3, Matrix6, UnitQuaternion, Vector3, Vector6};

/// Move the reference point of a twist by `offset` (from the old point to
/// the new one): `v' = v + w × offset`, `w' = w`.
pub fn change_ref_point(twist: &Vector6<f64>, offset: &Vector3<f64>) -> Vector6<f64> {
    let linear = twist.fixed_rows::<3>(0).into_owned();
    let angular = twist.fixed_rows::<3>(3).into_owned();
    let moved = linear + angular.cross(offset);
    Vector6::new(moved.x, moved.y, moved.z, angular.x, angular.y, angular.z)
}

/// Re-express a twist in a rotated frame. The reference point is unchanged,
/// so a pure rotation stays a pure rotation.
pub fn rotate(rotation: &UnitQuaternion<f64>, twist: &Vector6<f64>) -> Vector6<f64> {
    let linear = rotation * twist.fixed_rows::<3>(0).into_owned();
    let angular = rotation * twist.fixed_rows::<3>(3).into_owned();
    Vector6::new(linear.x, linear.y, linear.z, angular.x, angular.y, angular.z)
}

/// Local Jacobian of a relative tip motion.
///
/// Starts from unit twists referenced at the tip origin, moves their
/// reference point to the origin of `tip_in_root` and rotates them by
/// `root_rotation` only.
pub fn local_jacobian(
    tip_in_root: &Isometry3<f64>,
    root_rotation: &UnitQuaternion<f64>,
) -> Matrix6<f64> {
    let offset = -tip_in_root.translation.vector;
    let mut jacobian = Matrix6::identity();
    for i in 0..6 {
        let column = jacobian.column(i).into_owned();
        let column = rotate(root_rotation, &change_ref_point(&column, &offset));
        jacobian.set_column(i, &column);
    }
    jacobian
}
