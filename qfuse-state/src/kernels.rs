//! Generic k-qubit matrix kernels
//!
//! A `2^k × 2^k` matrix acts on the sub-register named by `positions`, with
//! local bit `l` of a row/column index mapped to amplitude bit `positions[l]`.
//! The amplitude vector splits into `n / 2^k` independent groups: each group
//! fixes every non-target bit, and its `2^k` members differ only in the
//! target bits. Groups whose fixed bits miss the control mask are skipped.
//!
//! Callers validate positions, dimensions and masks; these functions assume
//! well-formed input.

use num_complex::Complex64;
use qfuse_core::{DenseMatrix, Position};
use rayon::prelude::*;

use crate::dispatch::MAX_KERNEL_WIDTH;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// Largest matrix dimension handled by the kernels
const MAX_DIMENSION: usize = 1 << MAX_KERNEL_WIDTH;

/// Minimum number of groups handed to one rayon task
const MIN_GROUPS_PER_TASK: usize = 256;

// Safety wrapper for raw pointers to allow Send+Sync.
// Every task writes only the members of its own groups, and groups partition
// the index space.
#[derive(Copy, Clone)]
struct SendPtr(*mut Complex64);
unsafe impl Send for SendPtr {}
unsafe impl Sync for SendPtr {}

impl SendPtr {
    #[inline]
    fn get(self) -> *mut Complex64 {
        self.0
    }
}

/// Spread `index` over the bits not named in `sorted_positions`
///
/// The returned value has a zero at every listed position, and the bits of
/// `index` fill the remaining positions from low to high.
#[inline]
pub fn insert_zero_bits(mut index: usize, sorted_positions: &[Position]) -> usize {
    for &p in sorted_positions {
        let low = index & ((1usize << p) - 1);
        index = low | ((index >> p) << (p + 1));
    }
    index
}

/// Amplitude offsets of the `2^k` members of a group, in local index order
pub fn member_offsets(positions: &[Position]) -> Vec<usize> {
    let dim = 1usize << positions.len();
    (0..dim)
        .map(|local| {
            positions
                .iter()
                .enumerate()
                .filter(|(l, _)| (local >> l) & 1 == 1)
                .fold(0usize, |acc, (_, &p)| acc | (1usize << p))
        })
        .collect()
}

fn sorted_positions(positions: &[Position]) -> Vec<Position> {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted
}

#[inline]
fn multiply_group(matrix: &DenseMatrix, input: &[Complex64], output: &mut [Complex64]) {
    for (r, out) in output.iter_mut().enumerate() {
        *out = matrix
            .row(r)
            .iter()
            .zip(input)
            .fold(ZERO, |acc, (m, v)| acc + m * v);
    }
}

/// Apply `matrix` to `state` on a single thread
pub fn apply_matrix_sequential(
    state: &mut [Complex64],
    matrix: &DenseMatrix,
    positions: &[Position],
    control_mask: usize,
) {
    let dim = matrix.dimension();
    let num_groups = state.len() >> positions.len();
    let sorted = sorted_positions(positions);
    let offsets = member_offsets(positions);

    let mut input = [ZERO; MAX_DIMENSION];
    let mut output = [ZERO; MAX_DIMENSION];

    for group in 0..num_groups {
        let base = insert_zero_bits(group, &sorted);
        if base & control_mask != control_mask {
            continue;
        }

        for (j, &offset) in offsets.iter().enumerate() {
            input[j] = state[base + offset];
        }
        multiply_group(matrix, &input[..dim], &mut output[..dim]);
        for (j, &offset) in offsets.iter().enumerate() {
            state[base + offset] = output[j];
        }
    }
}

/// Apply `matrix` to `state`, splitting the groups across the current rayon pool
pub fn apply_matrix_parallel(
    state: &mut [Complex64],
    matrix: &DenseMatrix,
    positions: &[Position],
    control_mask: usize,
) {
    let dim = matrix.dimension();
    let num_groups = state.len() >> positions.len();
    let sorted = sorted_positions(positions);
    let offsets = member_offsets(positions);
    let ptr = SendPtr(state.as_mut_ptr());

    (0..num_groups)
        .into_par_iter()
        .with_min_len(MIN_GROUPS_PER_TASK)
        .for_each_init(
            || ([ZERO; MAX_DIMENSION], [ZERO; MAX_DIMENSION]),
            |(input, output), group| {
                let base = insert_zero_bits(group, &sorted);
                if base & control_mask != control_mask {
                    return;
                }

                let ptr = ptr.get();
                // SAFETY: base + offset stays below state.len() for every
                // member, and no two groups share a member index.
                unsafe {
                    for (j, &offset) in offsets.iter().enumerate() {
                        input[j] = *ptr.add(base + offset);
                    }
                    multiply_group(matrix, &input[..dim], &mut output[..dim]);
                    for (j, &offset) in offsets.iter().enumerate() {
                        *ptr.add(base + offset) = output[j];
                    }
                }
            },
        );
}
