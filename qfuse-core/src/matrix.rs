//! Gate matrix types
//!
//! [`Matrix2`] is the 2×2 matrix carried by every queued gate. [`DenseMatrix`]
//! is the owned square matrix over `k` qubits produced by fusion and consumed
//! by the kernels.
//!
//! Both use little-endian local indices: for a matrix over qubits
//! `[p0, p1, ...]`, bit `l` of a row or column index is the value of qubit
//! `p_l`.

use crate::{QuantumError, Result};
use num_complex::Complex64;
use std::fmt;
use std::ops::{Index, IndexMut};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Row-major 2×2 complex matrix
pub type Matrix2 = [[Complex64; 2]; 2];

/// Multiply two 2×2 complex matrices, C = A * B
///
/// `b` is applied first, `a` second.
#[inline]
pub fn multiply_2x2(a: &Matrix2, b: &Matrix2) -> Matrix2 {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

/// Owned square complex matrix of dimension 2^k, stored row-major
#[derive(Clone, PartialEq)]
pub struct DenseMatrix {
    num_qubits: usize,
    data: Vec<Complex64>,
}

impl DenseMatrix {
    /// Identity over `num_qubits` qubits
    pub fn identity(num_qubits: usize) -> Self {
        Self::scaled_identity(num_qubits, ONE)
    }

    /// `factor` times the identity over `num_qubits` qubits
    pub fn scaled_identity(num_qubits: usize, factor: Complex64) -> Self {
        let dim = 1usize << num_qubits;
        let mut data = vec![ZERO; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = factor;
        }
        Self { num_qubits, data }
    }

    /// Build from row-major data of length 4^k
    ///
    /// # Errors
    /// Returns error if the length is not the square of a power of two.
    pub fn from_row_major(data: Vec<Complex64>) -> Result<Self> {
        let dim = (data.len() as f64).sqrt().round() as usize;
        if dim * dim != data.len() {
            return Err(QuantumError::DataLength {
                expected: dim * dim,
                actual: data.len(),
            });
        }
        if !dim.is_power_of_two() {
            return Err(QuantumError::InvalidDimension { dimension: dim });
        }
        Ok(Self {
            num_qubits: dim.trailing_zeros() as usize,
            data,
        })
    }

    /// Build from column vectors, `columns[c][r]` being element (r, c)
    pub fn from_columns(num_qubits: usize, columns: &[Vec<Complex64>]) -> Self {
        let dim = 1usize << num_qubits;
        debug_assert_eq!(columns.len(), dim);
        let mut data = vec![ZERO; dim * dim];
        for (c, column) in columns.iter().enumerate() {
            debug_assert_eq!(column.len(), dim);
            for (r, &value) in column.iter().enumerate() {
                data[r * dim + c] = value;
            }
        }
        Self { num_qubits, data }
    }

    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Side length 2^k
    #[inline]
    pub fn dimension(&self) -> usize {
        1usize << self.num_qubits
    }

    #[inline]
    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[Complex64] {
        let dim = self.dimension();
        &self.data[r * dim..(r + 1) * dim]
    }

    /// Copy of column `c`
    pub fn column(&self, c: usize) -> Vec<Complex64> {
        let dim = self.dimension();
        (0..dim).map(|r| self.data[r * dim + c]).collect()
    }

    /// Widen with `num_controls` extra qubits appended as the highest local bits
    ///
    /// The result is block diagonal: identity wherever any new qubit is 0 and
    /// `self` on the block where all of them are 1.
    pub fn controlled(&self, num_controls: usize) -> Self {
        if num_controls == 0 {
            return self.clone();
        }
        let old_dim = self.dimension();
        let mut widened = Self::identity(self.num_qubits + num_controls);
        let new_dim = widened.dimension();
        let offset = new_dim - old_dim;

        for r in 0..old_dim {
            for c in 0..old_dim {
                widened.data[(offset + r) * new_dim + offset + c] = self.data[r * old_dim + c];
            }
        }
        widened
    }

    /// Matrix product `self * rhs`
    ///
    /// # Panics
    /// Panics if the dimensions differ.
    pub fn multiply(&self, rhs: &DenseMatrix) -> DenseMatrix {
        assert_eq!(self.num_qubits, rhs.num_qubits, "dimension mismatch");
        let dim = self.dimension();
        let mut data = vec![ZERO; dim * dim];
        for r in 0..dim {
            for k in 0..dim {
                let a = self.data[r * dim + k];
                if a == ZERO {
                    continue;
                }
                for c in 0..dim {
                    data[r * dim + c] += a * rhs.data[k * dim + c];
                }
            }
        }
        DenseMatrix {
            num_qubits: self.num_qubits,
            data,
        }
    }

    /// Element-wise comparison within `epsilon`
    pub fn approx_eq(&self, other: &DenseMatrix, epsilon: f64) -> bool {
        self.num_qubits == other.num_qubits
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).norm() <= epsilon)
    }
}

impl From<&Matrix2> for DenseMatrix {
    fn from(m: &Matrix2) -> Self {
        Self {
            num_qubits: 1,
            data: vec![m[0][0], m[0][1], m[1][0], m[1][1]],
        }
    }
}

impl From<Matrix2> for DenseMatrix {
    fn from(m: Matrix2) -> Self {
        Self::from(&m)
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = Complex64;

    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &Complex64 {
        &self.data[r * self.dimension() + c]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    #[inline]
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut Complex64 {
        let dim = self.dimension();
        &mut self.data[r * dim + c]
    }
}

impl fmt::Debug for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DenseMatrix({} qubits)", self.num_qubits)?;
        for r in 0..self.dimension() {
            writeln!(f, "  {:?}", self.row(r))?;
        }
        Ok(())
    }
}
