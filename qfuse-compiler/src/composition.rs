//! Algebraic composition of a cluster into one dense matrix
//!
//! A [`Composition`] accumulates the gates of one cluster as small matrices
//! over position lists (`items`). Controls shared by every gate stay outside
//! the matrix as a global control set and end up in the kernel's control
//! mask; every other qubit is a target and is part of the fused matrix.
//!
//! When a gate arrives without a control that every earlier gate had, that
//! control is demoted: each existing item is widened block-diagonally with
//! the qubit as a new high bit (identity where it is 0, the old matrix where
//! it is 1) and the qubit becomes a target. Controls of the incoming gate
//! that are not global are folded into the incoming matrix the same way.
//!
//! [`Composition::perform_fusion`] multiplies the items into a
//! `2^targets × 2^targets` matrix, one output column per rayon task.

use num_complex::Complex64;
use qfuse_core::{DenseMatrix, Position};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use tracing::trace;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

type PositionList = SmallVec<[Position; 8]>;

/// One composed gate: `matrix` acting on `positions`, local bit `l` being
/// `positions[l]`
#[derive(Debug, Clone)]
struct Item {
    matrix: DenseMatrix,
    positions: PositionList,
}

/// Result of fusing one cluster
#[derive(Debug, Clone)]
pub struct FusedOperation {
    /// `2^targets.len()` square matrix, local bit `l` being `targets[l]`
    pub matrix: DenseMatrix,

    /// Target positions, ascending
    pub targets: Vec<Position>,

    /// Control positions, ascending; disjoint from `targets`
    pub controls: Vec<Position>,
}

impl FusedOperation {
    /// Amplitude index bits that must all be set for the matrix to apply
    pub fn control_mask(&self) -> usize {
        self.controls.iter().fold(0, |mask, &c| mask | (1 << c))
    }

    /// Total qubits touched (targets plus controls)
    pub fn width(&self) -> usize {
        self.targets.len() + self.controls.len()
    }
}

/// Working state for fusing one cluster
///
/// # Example
///
/// ```
/// use qfuse_compiler::Composition;
/// use qfuse_core::{gates, DenseMatrix};
///
/// let mut composition = Composition::new();
/// composition.insert(&DenseMatrix::from(gates::hadamard()), &[0], &[]);
/// composition.insert(&DenseMatrix::from(gates::pauli_x()), &[1], &[0]);
///
/// let fused = composition.perform_fusion().unwrap();
/// assert_eq!(fused.targets, vec![0, 1]);
/// assert!(fused.controls.is_empty());
/// assert!(composition.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Composition {
    targets: BTreeSet<Position>,
    controls: BTreeSet<Position>,
    global_phase: Complex64,
    phase_applied: bool,
    items: Vec<Item>,
}

impl Composition {
    pub fn new() -> Self {
        Self {
            targets: BTreeSet::new(),
            controls: BTreeSet::new(),
            global_phase: ONE,
            phase_applied: false,
            items: Vec::new(),
        }
    }

    /// Number of composed gates
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn targets(&self) -> &BTreeSet<Position> {
        &self.targets
    }

    #[inline]
    pub fn controls(&self) -> &BTreeSet<Position> {
        &self.controls
    }

    #[inline]
    pub fn global_phase(&self) -> Complex64 {
        self.global_phase
    }

    /// Qubits the fused operation would touch after inserting this gate
    pub fn predict_width(&self, targets: &[Position], controls: &[Position]) -> usize {
        let mut touched: BTreeSet<Position> = self.targets.union(&self.controls).copied().collect();
        touched.extend(targets.iter().copied());
        touched.extend(controls.iter().copied());
        touched.len()
    }

    /// Compose `matrix` on `targets`, gated on `controls`, after everything
    /// inserted so far
    ///
    /// `matrix` must be `2^targets.len()` square; `targets` and `controls`
    /// must be disjoint.
    pub fn insert(&mut self, matrix: &DenseMatrix, targets: &[Position], controls: &[Position]) {
        debug_assert_eq!(matrix.num_qubits(), targets.len());
        debug_assert!(targets.iter().all(|t| !controls.contains(t)));

        let mut item = Item {
            matrix: matrix.clone(),
            positions: targets.iter().copied().collect(),
        };

        if self.items.is_empty() && !self.phase_applied {
            self.controls = controls.iter().copied().collect();
        } else {
            let demoted: PositionList = self
                .controls
                .iter()
                .copied()
                .filter(|c| !controls.contains(c))
                .collect();
            self.demote(&demoted);

            let folded: PositionList = controls
                .iter()
                .copied()
                .filter(|c| !self.controls.contains(c))
                .collect();
            if !folded.is_empty() {
                item.matrix = item.matrix.controlled(folded.len());
                item.positions.extend(folded);
            }
        }

        self.targets.extend(item.positions.iter().copied());
        self.items.push(item);
    }

    /// Multiply the whole composition by a scalar
    ///
    /// A phase cannot sit behind a control, so every global control is
    /// demoted first and later gates carry their controls inside the matrix.
    pub fn apply_global_phase(&mut self, factor: Complex64) {
        if factor == ONE {
            return;
        }
        let demoted: PositionList = self.controls.iter().copied().collect();
        self.demote(&demoted);
        self.global_phase *= factor;
        self.phase_applied = true;
    }

    /// Build the fused matrix and reset to the empty composition
    ///
    /// Returns `None` if nothing was inserted.
    pub fn perform_fusion(&mut self) -> Option<FusedOperation> {
        let state = std::mem::take(self);
        if state.targets.is_empty() {
            return None;
        }

        let targets: Vec<Position> = state.targets.into_iter().collect();
        let controls: Vec<Position> = state.controls.into_iter().collect();
        let num_targets = targets.len();
        let dim = 1usize << num_targets;

        // Local bits of each item inside the fused matrix
        let local_items: Vec<(&DenseMatrix, PositionList)> = state
            .items
            .iter()
            .map(|item| {
                let bits = item
                    .positions
                    .iter()
                    .map(|p| targets.partition_point(|t| t < p))
                    .collect();
                (&item.matrix, bits)
            })
            .collect();

        let phase = state.global_phase;
        let columns: Vec<Vec<Complex64>> = (0..dim)
            .into_par_iter()
            .map(|k| {
                let mut column = vec![ZERO; dim];
                column[k] = phase;
                for (matrix, bits) in &local_items {
                    column = left_multiply(&column, matrix, bits);
                }
                column
            })
            .collect();

        trace!(
            items = state.items.len(),
            targets = num_targets,
            controls = controls.len(),
            "fused cluster"
        );

        Some(FusedOperation {
            matrix: DenseMatrix::from_columns(num_targets, &columns),
            targets,
            controls,
        })
    }

    /// Turn global controls into targets, widening every existing item
    fn demote(&mut self, demoted: &[Position]) {
        if demoted.is_empty() {
            return;
        }
        trace!(?demoted, items = self.items.len(), "demoting global controls");

        for item in self.items.iter_mut() {
            item.matrix = item.matrix.controlled(demoted.len());
            item.positions.extend(demoted.iter().copied());
        }
        for c in demoted {
            self.controls.remove(c);
            self.targets.insert(*c);
        }
    }
}

impl Default for Composition {
    fn default() -> Self {
        Self::new()
    }
}

/// `matrix · column`, with `matrix` acting on the local `bits` of the column
/// index
fn left_multiply(column: &[Complex64], matrix: &DenseMatrix, bits: &[usize]) -> Vec<Complex64> {
    let sub = 1usize << bits.len();
    let offsets: SmallVec<[usize; 128]> = (0..sub)
        .map(|local| {
            bits.iter()
                .enumerate()
                .filter(|(l, _)| (local >> l) & 1 == 1)
                .fold(0usize, |acc, (_, &b)| acc | (1 << b))
        })
        .collect();
    let mask = offsets[sub - 1];

    let mut out = vec![ZERO; column.len()];
    for base in (0..column.len()).filter(|i| i & mask == 0) {
        for (r, &row_offset) in offsets.iter().enumerate() {
            out[base | row_offset] = matrix
                .row(r)
                .iter()
                .zip(offsets.iter())
                .map(|(&m, &col_offset)| m * column[base | col_offset])
                .sum();
        }
    }
    out
}
