//! Core simulator implementation

use num_complex::Complex64;
use qfuse_compiler::{Cluster, ClusterBuilder, Composition};
use qfuse_core::{DenseMatrix, Matrix2, Position, QubitId, QueuedGate};
use qfuse_state::{AmplitudeStore, DenseKernel, KernelBackend, KernelDispatcher};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::{ThreadPool, ThreadPoolBuilder};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    config::SimulatorConfig,
    error::{Result, SimulatorError},
    qubit_table::QubitTable,
    queue::GateQueue,
    telemetry::FlushStatistics,
};

/// State-vector simulator with deferred, clustered and fused gate application
///
/// Gates are queued on [`apply`](Self::apply) and only reach the amplitude
/// vector on a flush. A flush groups the queue into clusters, fuses each
/// cluster into one dense matrix and makes one kernel pass per cluster.
/// Every operation that reads or reshapes the state flushes first.
///
/// # Example
///
/// ```
/// use qfuse_core::gates;
/// use qfuse_sim::{Simulator, SimulatorConfig};
///
/// let mut sim = Simulator::new(SimulatorConfig::default()).unwrap();
/// let q0 = sim.allocate().unwrap();
/// let q1 = sim.allocate().unwrap();
///
/// sim.apply(&[], q0, gates::hadamard()).unwrap();
/// sim.apply(&[q0], q1, gates::pauli_x()).unwrap();
///
/// let amps = sim.amplitudes().unwrap();
/// assert!((amps[0].re - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
/// assert!((amps[3].re - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
/// ```
pub struct Simulator {
    config: SimulatorConfig,
    pool: ThreadPool,
    dispatcher: Box<dyn KernelDispatcher>,
    clusters: ClusterBuilder,
    store: AmplitudeStore,
    table: QubitTable,
    queue: GateQueue,
    rng: StdRng,
    stats: FlushStatistics,
}

impl Simulator {
    /// Create a simulator using the reference kernel
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or asks for wider
    /// clusters than the kernel supports.
    pub fn new(config: SimulatorConfig) -> Result<Self> {
        let backend = KernelBackend::detect(config.num_threads);
        Self::with_dispatcher(config, Box::new(DenseKernel::new(backend)))
    }

    /// Create a simulator with configuration read from the environment
    pub fn from_env() -> Result<Self> {
        Self::new(SimulatorConfig::from_env()?)
    }

    /// Create a simulator with a caller-supplied kernel dispatcher
    pub fn with_dispatcher(
        config: SimulatorConfig,
        dispatcher: Box<dyn KernelDispatcher>,
    ) -> Result<Self> {
        config.validate()?;
        if config.max_cluster_width > dispatcher.max_width() {
            return Err(SimulatorError::Capacity {
                requested: config.max_cluster_width,
                supported: dispatcher.max_width(),
            });
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .thread_name(|i| format!("qfuse-worker-{}", i))
            .build()
            .map_err(|e| SimulatorError::Configuration(format!("thread pool: {}", e)))?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            max_cluster_width = config.max_cluster_width,
            max_cluster_depth = config.max_cluster_depth,
            max_pending_gates = config.max_pending_gates,
            num_threads = config.num_threads,
            "simulator created"
        );

        Ok(Self {
            clusters: ClusterBuilder::new(config.max_cluster_width, config.max_cluster_depth),
            queue: GateQueue::new(config.max_pending_gates),
            config,
            pool,
            dispatcher,
            store: AmplitudeStore::new(),
            table: QubitTable::new(),
            rng,
            stats: FlushStatistics::new(),
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Counters accumulated over all flushes
    pub fn statistics(&self) -> &FlushStatistics {
        &self.stats
    }

    /// Number of live qubits
    pub fn num_qubits(&self) -> usize {
        self.table.num_qubits()
    }

    /// Live qubit ids, ascending
    pub fn qubit_ids(&self) -> Vec<QubitId> {
        self.table.qubit_ids()
    }

    /// Number of gates waiting for a flush
    pub fn pending_gates(&self) -> usize {
        self.queue.len()
    }

    /// Reseed the measurement RNG
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Allocate a qubit in `|0⟩` with a simulator-chosen id
    ///
    /// The lowest previously released id is reused first.
    pub fn allocate(&mut self) -> Result<QubitId> {
        self.flush()?;
        self.table.next_id()?;
        let position = self.store.grow()?;
        let (id, bound) = self.table.allocate()?;
        debug_assert_eq!(position, bound);
        debug!(qubit = %id, position, "allocated qubit");
        Ok(id)
    }

    /// Allocate a qubit in `|0⟩` under a caller-chosen id
    ///
    /// # Errors
    /// Returns [`SimulatorError::InvalidQubit`] if `id` is live or leaves a gap
    /// past the highest id ever used.
    pub fn allocate_with_id(&mut self, id: QubitId) -> Result<()> {
        self.flush()?;
        self.table.check_id(id)?;
        let position = self.store.grow()?;
        let bound = self.table.allocate_with_id(id)?;
        debug_assert_eq!(position, bound);
        debug!(qubit = %id, position, "allocated qubit");
        Ok(())
    }

    /// Release a qubit that holds a definite classical value
    ///
    /// # Errors
    /// Returns [`SimulatorError::NotClassical`] if the qubit is in
    /// superposition or entangled; the state is left unchanged.
    pub fn release(&mut self, id: QubitId) -> Result<()> {
        self.flush()?;
        let position = self.table.position(id)?;
        let value = self
            .store
            .classical_value(position)?
            .ok_or(SimulatorError::NotClassical(id))?;

        self.store.remove(position, value)?;
        self.table.release(id)?;
        debug!(qubit = %id, position, value, "released qubit");
        Ok(())
    }

    /// Queue `matrix` on `target`, gated on every qubit in `controls`
    ///
    /// Nothing touches the state until the next flush. A call that fails
    /// leaves the queue unchanged.
    pub fn apply(&mut self, controls: &[QubitId], target: QubitId, matrix: Matrix2) -> Result<()> {
        let gate = QueuedGate::new(controls, target, matrix)?;
        self.apply_gate(gate)
    }

    /// Queue an already-built gate
    pub fn apply_gate(&mut self, gate: QueuedGate) -> Result<()> {
        for qubit in gate.qubits() {
            self.table.position(qubit)?;
        }

        if self.queue.push(gate) {
            debug!(pending = self.queue.len(), "pending gate limit reached");
            self.stats.forced_flushes += 1;
            self.flush()?;
        }
        Ok(())
    }

    /// Apply every queued gate to the state
    ///
    /// A no-op when nothing is queued. If a cluster fails, the clusters
    /// already applied stay applied and the gates of the failing cluster and
    /// every later one go back on the queue in order.
    pub fn flush(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }

        let gates = self.queue.take();
        let num_gates = gates.len();
        let mut pending: VecDeque<Cluster> = self.clusters.build(gates).into();
        let num_clusters = pending.len();

        let Self {
            pool,
            dispatcher,
            store,
            table,
            queue,
            stats,
            ..
        } = self;
        let dispatcher: &dyn KernelDispatcher = &**dispatcher;
        let table: &QubitTable = table;

        let outcome = pool.install(|| -> Result<()> {
            while let Some(cluster) = pending.pop_front() {
                if let Err(err) = apply_cluster(&cluster, dispatcher, store, table, stats) {
                    pending.push_front(cluster);
                    return Err(err);
                }
            }
            Ok(())
        });

        if let Err(err) = outcome {
            let unapplied: Vec<QueuedGate> = pending.into_iter().flat_map(Cluster::into_gates).collect();
            warn!(
                error = %err,
                requeued = unapplied.len(),
                "flush aborted, unapplied gates requeued"
            );
            queue.requeue(unapplied);
            return Err(err);
        }

        stats.flushes += 1;
        stats.gates_applied += num_gates;
        debug!(
            gates = num_gates,
            clusters = num_clusters,
            qubits = table.num_qubits(),
            "flushed gate queue"
        );
        Ok(())
    }

    /// Amplitudes of the flushed state
    ///
    /// Bit `b` of an index is the qubit currently at position `b`; use
    /// [`position`](Self::position) to map ids.
    pub fn amplitudes(&mut self) -> Result<&[Complex64]> {
        self.flush()?;
        Ok(self.store.amplitudes())
    }

    /// Current bit position of a live qubit in [`amplitudes`](Self::amplitudes)
    pub fn position(&self, id: QubitId) -> Result<Position> {
        self.table.position(id)
    }

    /// Probability of measuring 1 on `id`
    pub fn probability(&mut self, id: QubitId) -> Result<f64> {
        self.flush()?;
        let position = self.table.position(id)?;
        Ok(self.with_store(|store| store.probability(position))?)
    }

    /// Probability that the parity of `ids` is odd
    pub fn joint_probability(&mut self, ids: &[QubitId]) -> Result<f64> {
        self.flush()?;
        let positions = self.table.positions(ids)?;
        Ok(self.with_store(|store| store.joint_probability(&positions))?)
    }

    /// Whether `id` holds a definite classical value
    pub fn is_classical(&mut self, id: QubitId) -> Result<bool> {
        self.flush()?;
        let position = self.table.position(id)?;
        Ok(self.store.classical_value(position)?.is_some())
    }

    /// Classical value of `id`
    ///
    /// # Errors
    /// Returns [`SimulatorError::NotClassical`] if the qubit has none.
    pub fn classical_value(&mut self, id: QubitId) -> Result<bool> {
        self.flush()?;
        let position = self.table.position(id)?;
        self.store
            .classical_value(position)?
            .ok_or(SimulatorError::NotClassical(id))
    }

    /// Measure `id` in the computational basis, collapsing the state
    pub fn measure(&mut self, id: QubitId) -> Result<bool> {
        self.flush()?;
        let position = self.table.position(id)?;
        let p1 = self.with_store(|store| store.probability(position))?;
        let value = self.rng.gen::<f64>() < p1;
        self.with_store(|store| store.collapse(position, value))?;
        debug!(qubit = %id, p1, value, "measured qubit");
        Ok(value)
    }

    /// Measure the parity of `ids`, collapsing the state onto the outcome
    ///
    /// Returns `true` for odd parity. Individual qubits stay in
    /// superposition where the parity allows it.
    pub fn joint_measure(&mut self, ids: &[QubitId]) -> Result<bool> {
        self.flush()?;
        let positions = self.table.positions(ids)?;
        let p_odd = self.with_store(|store| store.joint_probability(&positions))?;
        let parity = self.rng.gen::<f64>() < p_odd;
        self.with_store(|store| store.joint_collapse(&positions, parity))?;
        debug!(qubits = ids.len(), p_odd, parity, "measured joint parity");
        Ok(parity)
    }

    /// State of `ids` if they are separable from every other qubit
    ///
    /// Local bit `l` of the returned vector is `ids[l]`. The vector is
    /// normalized and defined up to a global phase. Returns `None` when the
    /// qubits are entangled with the rest beyond `tolerance`.
    pub fn subsystem_amplitudes(
        &mut self,
        ids: &[QubitId],
        tolerance: f64,
    ) -> Result<Option<Vec<Complex64>>> {
        self.flush()?;
        let positions = self.table.positions(ids)?;
        Ok(self.with_store(|store| store.subsystem(&positions, tolerance))?)
    }

    /// Run `op` on the amplitude store inside the simulator's pool
    fn with_store<R, F>(&mut self, op: F) -> R
    where
        R: Send,
        F: FnOnce(&mut AmplitudeStore) -> R + Send,
    {
        let Self { pool, store, .. } = self;
        pool.install(|| op(store))
    }

    /// Drop every qubit and queued gate
    pub fn reset(&mut self) {
        self.queue.clear();
        self.store.reset();
        self.table.reset();
        self.stats = FlushStatistics::new();
    }
}

/// Fuse one cluster and apply it
fn apply_cluster(
    cluster: &Cluster,
    dispatcher: &dyn KernelDispatcher,
    store: &mut AmplitudeStore,
    table: &QubitTable,
    stats: &mut FlushStatistics,
) -> Result<()> {
    let started = Instant::now();
    let mut composition = Composition::new();
    for gate in cluster.gates() {
        let target = table.position(gate.target())?;
        let controls: SmallVec<[Position; 8]> = table.positions(gate.controls())?;
        debug_assert!(composition.predict_width(&[target], &controls) <= cluster.width());
        composition.insert(&DenseMatrix::from(gate.matrix()), &[target], &controls);
    }
    let Some(fused) = composition.perform_fusion() else {
        return Ok(());
    };
    stats.composition_time += started.elapsed();

    if fused.targets.len() > dispatcher.max_width() {
        return Err(SimulatorError::Capacity {
            requested: fused.targets.len(),
            supported: dispatcher.max_width(),
        });
    }

    let started = Instant::now();
    store.apply_matrix(dispatcher, &fused.matrix, &fused.targets, fused.control_mask())?;
    stats.kernel_time += started.elapsed();
    stats.record_cluster(fused.targets.len(), fused.controls.len());
    Ok(())
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("config", &self.config)
            .field("num_qubits", &self.table.num_qubits())
            .field("pending_gates", &self.queue.len())
            .finish()
    }
}

/// Dump of the applied state; queued gates are not included
impl fmt::Display for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Simulator with {} qubits, {} pending gates",
            self.table.num_qubits(),
            self.queue.len()
        )?;
        let ids = self.table.qubit_ids();
        if !ids.is_empty() {
            write!(f, "Qubit positions:")?;
            for id in ids {
                if let Ok(position) = self.table.position(id) {
                    write!(f, " {}->{}", id, position)?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "{}", self.store)
    }
}
