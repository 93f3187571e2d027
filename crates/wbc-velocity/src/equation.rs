//! Per-priority weighted linear equation systems.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;

/// `W · (A q̇ − y) → min` for one priority level.
///
/// Row `i` of `task_matrix`, `reference` and `weights` belong together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearEquationSystem {
    /// Per-row weights. Zero rows are inactive.
    pub weights: DVector<f64>,
    /// Rows × robot joints.
    pub task_matrix: DMatrix<f64>,
    /// Desired row values, in the root frame.
    pub reference: DVector<f64>,
}

impl LinearEquationSystem {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            weights: DVector::zeros(rows),
            task_matrix: DMatrix::zeros(rows, cols),
            reference: DVector::zeros(rows),
        }
    }

    pub fn rows(&self) -> usize {
        self.task_matrix.nrows()
    }

    pub fn cols(&self) -> usize {
        self.task_matrix.ncols()
    }

    /// Zero the system, reallocating only if the shape changed.
    pub fn reset(&mut self, rows: usize, cols: usize) {
        if self.task_matrix.shape() == (rows, cols) {
            self.weights.fill(0.0);
            self.task_matrix.fill(0.0);
            self.reference.fill(0.0);
        } else {
            *self = Self::zeros(rows, cols);
        }
    }

    /// Copy an evaluated constraint into the rows starting at `row`.
    pub(crate) fn write_constraint(&mut self, row: usize, constraint: &Constraint) {
        let n = constraint.output_dim();
        let cols = self.cols();
        self.weights
            .rows_mut(row, n)
            .copy_from(&constraint.effective_weights());
        self.task_matrix
            .view_mut((row, 0), (n, cols))
            .copy_from(constraint.task_matrix());
        self.reference
            .rows_mut(row, n)
            .copy_from(constraint.reference_root());
    }
}
