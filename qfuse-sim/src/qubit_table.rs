//! Qubit virtualization
//!
//! Callers hold stable [`QubitId`]s. The amplitude vector is indexed by dense
//! positions `0..n`. [`QubitTable`] maps one to the other and keeps the live
//! positions a permutation of `0..n` as qubits come and go: a new qubit takes
//! position `n`, and releasing a qubit shifts every higher position down.

use qfuse_core::{Position, QubitId};
use smallvec::SmallVec;
use tracing::trace;

use crate::error::{Result, SimulatorError};

/// How ids are being handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllocationMode {
    Unset,
    /// Table picks the id
    Implicit,
    /// Caller picks the id
    Explicit,
}

/// Id → position table
#[derive(Debug, Clone)]
pub struct QubitTable {
    /// Indexed by id; `None` for retired ids
    positions: Vec<Option<Position>>,
    num_live: usize,
    mode: AllocationMode,
}

impl QubitTable {
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            num_live: 0,
            mode: AllocationMode::Unset,
        }
    }

    /// Number of live qubits
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_live
    }

    pub fn is_live(&self, id: QubitId) -> bool {
        matches!(self.positions.get(id.index()), Some(Some(_)))
    }

    /// Id the next [`allocate`](Self::allocate) call will return
    ///
    /// The lowest retired id is reused before the table grows.
    ///
    /// # Errors
    /// In debug builds, returns [`SimulatorError::Consistency`] if ids have
    /// been chosen by the caller on this table.
    pub fn next_id(&self) -> Result<QubitId> {
        self.check_mode(AllocationMode::Implicit)?;
        let index = self
            .positions
            .iter()
            .position(Option::is_none)
            .unwrap_or(self.positions.len());
        Ok(QubitId::new(index))
    }

    /// Check that `id` can be allocated with [`allocate_with_id`](Self::allocate_with_id)
    ///
    /// # Errors
    /// - [`SimulatorError::InvalidQubit`] if `id` is live or would leave a
    ///   gap past the end of the table
    /// - [`SimulatorError::Consistency`] (debug builds) if ids have been
    ///   chosen by the table
    pub fn check_id(&self, id: QubitId) -> Result<()> {
        self.check_mode(AllocationMode::Explicit)?;
        let index = id.index();
        if index > self.positions.len() {
            return Err(SimulatorError::invalid_qubit(
                id,
                format!("explicit ids must be dense, next new id is {}", self.positions.len()),
            ));
        }
        if self.is_live(id) {
            return Err(SimulatorError::invalid_qubit(id, "already allocated"));
        }
        Ok(())
    }

    /// Allocate a table-chosen id at the next position
    pub fn allocate(&mut self) -> Result<(QubitId, Position)> {
        let id = self.next_id()?;
        let position = self.bind(id, AllocationMode::Implicit);
        Ok((id, position))
    }

    /// Allocate a caller-chosen id at the next position
    pub fn allocate_with_id(&mut self, id: QubitId) -> Result<Position> {
        self.check_id(id)?;
        Ok(self.bind(id, AllocationMode::Explicit))
    }

    /// Retire `id` and close the gap it leaves in the position space
    ///
    /// # Returns
    /// The position the qubit held before release.
    pub fn release(&mut self, id: QubitId) -> Result<Position> {
        let released = self.position(id)?;
        self.positions[id.index()] = None;
        for position in self.positions.iter_mut().flatten() {
            if *position > released {
                *position -= 1;
            }
        }
        self.num_live -= 1;
        trace!(qubit = %id, position = released, "qubit released");
        Ok(released)
    }

    /// Current position of a live qubit
    pub fn position(&self, id: QubitId) -> Result<Position> {
        self.positions
            .get(id.index())
            .copied()
            .flatten()
            .ok_or_else(|| SimulatorError::invalid_qubit(id, "not allocated"))
    }

    /// Positions of several live qubits, in the given order
    pub fn positions(&self, ids: &[QubitId]) -> Result<SmallVec<[Position; 8]>> {
        ids.iter().map(|&id| self.position(id)).collect()
    }

    /// Live ids, ascending
    pub fn qubit_ids(&self) -> Vec<QubitId> {
        self.positions
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_some())
            .map(|(i, _)| QubitId::new(i))
            .collect()
    }

    /// Forget every qubit and the allocation mode
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn bind(&mut self, id: QubitId, mode: AllocationMode) -> Position {
        let position = self.num_live;
        let index = id.index();
        if index == self.positions.len() {
            self.positions.push(Some(position));
        } else {
            self.positions[index] = Some(position);
        }
        self.num_live += 1;
        self.mode = mode;
        trace!(qubit = %id, position, "qubit allocated");
        position
    }

    fn check_mode(&self, requested: AllocationMode) -> Result<()> {
        if cfg!(debug_assertions) && self.mode != AllocationMode::Unset && self.mode != requested {
            return Err(SimulatorError::Consistency(format!(
                "{:?} allocation requested on a table using {:?} allocation",
                requested, self.mode
            )));
        }
        Ok(())
    }
}

impl Default for QubitTable {
    fn default() -> Self {
        Self::new()
    }
}
