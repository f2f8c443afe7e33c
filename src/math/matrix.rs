use rand::prelude::*;
use std::f32::consts::PI;

use crate::error::InvalidInput;

/// Dense row-major matrix of `f32`.
///
/// Rows are neurons and columns are inputs when used as a layer's weights,
/// so `row(i)` is the weight vector of neuron `i`. The storage order is the
/// same one the device buffers use, which keeps flattening a plain copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Uniform samples in [-1, 1).
    pub fn random(rows: usize, cols: usize, rng: &mut impl Rng) -> Matrix {
        let data = (0..rows * cols).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect();
        Matrix { rows, cols, data }
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal(rng: &mut impl Rng) -> f32 {
        // (0, 1] keeps ln() finite.
        let u1: f32 = 1.0 - rng.gen::<f32>();
        let u2: f32 = 1.0 - rng.gen::<f32>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Xavier (Glorot) initialization: samples from N(0, sqrt(1 / cols)).
    ///
    /// `cols` is the fan-in. Suited to sigmoid-like activations, which is
    /// what the rest of the crate defaults to.
    pub fn xavier(rows: usize, cols: usize, rng: &mut impl Rng) -> Matrix {
        let std_dev = (1.0 / cols.max(1) as f32).sqrt();
        let data = (0..rows * cols)
            .map(|_| Matrix::sample_standard_normal(rng) * std_dev)
            .collect();
        Matrix { rows, cols, data }
    }

    /// Builds a matrix from nested rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Matrix, InvalidInput> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(InvalidInput::RaggedMatrix);
        }
        Ok(Matrix {
            rows: rows.len(),
            cols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Row-major view of all elements.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}
