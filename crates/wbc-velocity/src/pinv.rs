//! SVD-based pseudo-inverse of the 6×6 local constraint Jacobian.

use nalgebra::{Matrix6, Vector6};
use serde::{Deserialize, Serialize};

/// Pseudo-inverse `H = V Σ⁺ Uᵀ` together with its decomposition.
///
/// Singular values that are not strictly positive contribute nothing, so
/// `H` stays finite for rank-deficient Jacobians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PseudoInverse {
    /// Left singular vectors.
    pub u: Matrix6<f64>,
    /// Singular values, in the order nalgebra returns them.
    pub singular_values: Vector6<f64>,
    /// Right singular vectors.
    pub v: Matrix6<f64>,
    /// The pseudo-inverse itself.
    pub h: Matrix6<f64>,
}

impl Default for PseudoInverse {
    fn default() -> Self {
        Self {
            u: Matrix6::identity(),
            singular_values: Vector6::zeros(),
            v: Matrix6::identity(),
            h: Matrix6::zeros(),
        }
    }
}

impl PseudoInverse {
    /// Decompose `jacobian` and build its pseudo-inverse.
    ///
    /// Returns `None` if the decomposition did not produce singular vectors.
    pub fn compute(jacobian: &Matrix6<f64>) -> Option<Self> {
        let svd = jacobian.svd(true, true);
        let u = svd.u?;
        let v = svd.v_t?.transpose();
        let singular_values = svd.singular_values;

        let mut u_scaled = u;
        for (j, &s) in singular_values.iter().enumerate() {
            if s > 0.0 {
                u_scaled.column_mut(j).scale_mut(1.0 / s);
            } else {
                u_scaled.column_mut(j).fill(0.0);
            }
        }
        let h = v * u_scaled.transpose();

        Some(Self {
            u,
            singular_values,
            v,
            h,
        })
    }

    /// Number of singular values that were inverted.
    pub fn rank(&self) -> usize {
        self.singular_values.iter().filter(|&&s| s > 0.0).count()
    }
}
