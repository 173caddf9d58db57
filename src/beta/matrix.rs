//! Dense log-probability arrays

use crate::util::log_add;

/// `[parent][child]` log-probabilities
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryBeta {
    parent: usize,
    child: usize,
    data: Vec<f64>,
}

impl UnaryBeta {
    /// Array of the given shape with every entry set to `value`
    pub fn filled(parent: usize, child: usize, value: f64) -> Self {
        Self {
            parent,
            child,
            data: vec![value; parent * child],
        }
    }

    /// `(parent substates, child substates)`
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.parent, self.child)
    }

    /// Entry `[i][j]`
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.child + j]
    }

    /// Overwrite entry `[i][j]`
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.child + j] = value;
    }

    /// Log-add `value` into entry `[i][j]`
    #[inline]
    pub fn log_accumulate(&mut self, i: usize, j: usize, value: f64) {
        let cell = &mut self.data[i * self.child + j];
        *cell = log_add(*cell, value);
    }

    /// Row of parent substate `i`
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.child..(i + 1) * self.child]
    }

    /// Mutable row of parent substate `i`
    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.child..(i + 1) * self.child]
    }

    /// All entries, row-major
    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

/// `[parent][left][right]` log-probabilities
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryBeta {
    parent: usize,
    left: usize,
    right: usize,
    data: Vec<f64>,
}

impl BinaryBeta {
    /// Array of the given shape with every entry set to `value`
    pub fn filled(parent: usize, left: usize, right: usize, value: f64) -> Self {
        Self {
            parent,
            left,
            right,
            data: vec![value; parent * left * right],
        }
    }

    /// `(parent, left, right)` substate counts
    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.parent, self.left, self.right)
    }

    #[inline]
    fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.left + j) * self.right + k
    }

    /// Entry `[i][j][k]`
    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f64 {
        self.data[self.offset(i, j, k)]
    }

    /// Overwrite entry `[i][j][k]`
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let offset = self.offset(i, j, k);
        self.data[offset] = value;
    }

    /// Log-add `value` into entry `[i][j][k]`
    #[inline]
    pub fn log_accumulate(&mut self, i: usize, j: usize, k: usize, value: f64) {
        let offset = self.offset(i, j, k);
        self.data[offset] = log_add(self.data[offset], value);
    }

    /// `(left, right)` plane of parent substate `i`, row-major
    #[inline]
    pub fn plane(&self, i: usize) -> &[f64] {
        let size = self.left * self.right;
        &self.data[i * size..(i + 1) * size]
    }

    /// Mutable plane of parent substate `i`
    #[inline]
    pub fn plane_mut(&mut self, i: usize) -> &mut [f64] {
        let size = self.left * self.right;
        &mut self.data[i * size..(i + 1) * size]
    }

    /// All entries, row-major
    pub fn values(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::LOG_ZERO;

    #[test]
    fn test_unary_layout() {
        let mut beta = UnaryBeta::filled(2, 3, LOG_ZERO);
        beta.set(1, 2, -0.5);
        assert_eq!(beta.get(1, 2), -0.5);
        assert_eq!(beta.row(1), &[LOG_ZERO, LOG_ZERO, -0.5]);
        assert_eq!(beta.values().len(), 6);
    }

    #[test]
    fn test_binary_layout_and_accumulate() {
        let mut beta = BinaryBeta::filled(2, 2, 3, LOG_ZERO);
        beta.log_accumulate(1, 0, 2, 0.5_f64.ln());
        beta.log_accumulate(1, 0, 2, 0.25_f64.ln());
        assert!((beta.get(1, 0, 2) - 0.75_f64.ln()).abs() < 1e-12);
        assert_eq!(beta.plane(1)[2], beta.get(1, 0, 2));
        assert_eq!(beta.plane(0).len(), 6);
    }
}
