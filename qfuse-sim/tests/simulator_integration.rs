//! End-to-end behavior of the simulator

use approx::assert_relative_eq;
use num_complex::Complex64;
use qfuse_core::{gates, Matrix2};
use qfuse_sim::{QubitId, Simulator, SimulatorConfig, SimulatorError};
use std::f64::consts::FRAC_1_SQRT_2;

fn simulator(width: usize) -> Simulator {
    Simulator::new(SimulatorConfig::debug().with_max_cluster_width(width)).unwrap()
}

fn assert_amplitudes(actual: &[Complex64], expected: &[Complex64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert_relative_eq!(a.re, e.re, epsilon = 1e-10);
        assert_relative_eq!(a.im, e.im, epsilon = 1e-10);
    }
}

fn c(re: f64) -> Complex64 {
    Complex64::new(re, 0.0)
}

#[test]
fn test_bell_state() {
    for width in 1..=4 {
        let mut sim = simulator(width);
        let q0 = sim.allocate().unwrap();
        let q1 = sim.allocate().unwrap();
        sim.apply(&[], q0, gates::hadamard()).unwrap();
        sim.apply(&[q0], q1, gates::pauli_x()).unwrap();
        sim.flush().unwrap();

        let amps = sim.amplitudes().unwrap();
        assert_amplitudes(amps, &[c(FRAC_1_SQRT_2), c(0.0), c(0.0), c(FRAC_1_SQRT_2)]);
    }
}

#[test]
fn test_self_inverse_pair_is_identity() {
    let mut sim = simulator(4);
    let q = sim.allocate().unwrap();
    sim.apply(&[], q, gates::pauli_x()).unwrap();
    sim.apply(&[], q, gates::pauli_x()).unwrap();
    sim.flush().unwrap();

    assert_eq!(sim.statistics().clusters, 1);
    assert_amplitudes(sim.amplitudes().unwrap(), &[c(1.0), c(0.0)]);
}

#[test]
fn test_width_one_barrier_keeps_clusters_apart() {
    let mut sim = simulator(1);
    let q0 = sim.allocate().unwrap();
    let q1 = sim.allocate().unwrap();
    sim.apply(&[], q0, gates::hadamard()).unwrap();
    sim.apply(&[q0], q1, gates::pauli_x()).unwrap();
    sim.apply(&[], q1, gates::hadamard()).unwrap();
    sim.flush().unwrap();
    assert_eq!(sim.statistics().clusters, 3);

    let mut wide = simulator(2);
    let p0 = wide.allocate().unwrap();
    let p1 = wide.allocate().unwrap();
    wide.apply(&[], p0, gates::hadamard()).unwrap();
    wide.apply(&[p0], p1, gates::pauli_x()).unwrap();
    wide.apply(&[], p1, gates::hadamard()).unwrap();
    wide.flush().unwrap();
    assert_eq!(wide.statistics().clusters, 1);

    let expected = sim.amplitudes().unwrap().to_vec();
    assert_amplitudes(wide.amplitudes().unwrap(), &expected);
}

#[test]
fn test_flush_is_idempotent() {
    let mut sim = simulator(4);
    let q0 = sim.allocate().unwrap();
    let q1 = sim.allocate().unwrap();
    sim.apply(&[], q0, gates::ry(0.7)).unwrap();
    sim.apply(&[q0], q1, gates::hadamard()).unwrap();

    sim.flush().unwrap();
    let once = sim.amplitudes().unwrap().to_vec();
    sim.flush().unwrap();
    sim.flush().unwrap();
    assert_eq!(sim.amplitudes().unwrap(), once.as_slice());
    assert_eq!(sim.statistics().flushes, 1);
}

#[test]
fn test_allocate_release_roundtrip() {
    let mut sim = simulator(4);
    let ids: Vec<QubitId> = (0..6).map(|_| sim.allocate().unwrap()).collect();
    assert_eq!(sim.num_qubits(), 6);
    assert_eq!(sim.amplitudes().unwrap().len(), 64);

    for id in ids.iter().rev() {
        sim.release(*id).unwrap();
    }
    assert_eq!(sim.num_qubits(), 0);
    assert_eq!(sim.amplitudes().unwrap(), &[c(1.0)]);
}

#[test]
fn test_release_in_any_order_after_uncompute() {
    let mut sim = simulator(3);
    let ids: Vec<QubitId> = (0..4).map(|_| sim.allocate().unwrap()).collect();
    sim.apply(&[], ids[0], gates::hadamard()).unwrap();
    for pair in ids.windows(2) {
        sim.apply(&[pair[0]], pair[1], gates::pauli_x()).unwrap();
    }
    for pair in ids.windows(2).rev() {
        sim.apply(&[pair[0]], pair[1], gates::pauli_x()).unwrap();
    }
    sim.apply(&[], ids[0], gates::hadamard()).unwrap();

    for &i in &[2, 0, 3, 1] {
        sim.release(ids[i]).unwrap();
    }
    assert_amplitudes(sim.amplitudes().unwrap(), &[c(1.0)]);
}

#[test]
fn test_released_id_is_reused() {
    let mut sim = simulator(4);
    let q0 = sim.allocate().unwrap();
    let q1 = sim.allocate().unwrap();
    sim.release(q0).unwrap();
    assert_eq!(sim.qubit_ids(), vec![q1]);
    assert_eq!(sim.allocate().unwrap(), q0);
    assert_eq!(sim.position(q0).unwrap(), 1);
}

#[test]
fn test_explicit_ids() {
    let mut sim = simulator(4);
    sim.allocate_with_id(QubitId::new(0)).unwrap();
    sim.allocate_with_id(QubitId::new(1)).unwrap();
    assert!(matches!(
        sim.allocate_with_id(QubitId::new(1)),
        Err(SimulatorError::InvalidQubit { .. })
    ));
    assert!(matches!(
        sim.allocate_with_id(QubitId::new(4)),
        Err(SimulatorError::InvalidQubit { .. })
    ));
    assert_eq!(sim.num_qubits(), 2);
    assert_eq!(sim.amplitudes().unwrap().len(), 4);
}

#[test]
fn test_disjoint_gates_commute() {
    let run = |first: (usize, Matrix2), second: (usize, Matrix2)| {
        let mut sim = simulator(2);
        let qubits: Vec<QubitId> = (0..3).map(|_| sim.allocate().unwrap()).collect();
        sim.apply(&[], qubits[0], gates::hadamard()).unwrap();
        sim.apply(&[], qubits[first.0], first.1).unwrap();
        sim.apply(&[], qubits[second.0], second.1).unwrap();
        sim.amplitudes().unwrap().to_vec()
    };

    let a = (1, gates::rx(0.3));
    let b = (2, gates::ry(1.1));
    assert_amplitudes(&run(a, b), &run(b, a));
}

#[test]
fn test_shared_qubit_order_matters() {
    let run = |swap: bool| {
        let mut sim = simulator(2);
        let q0 = sim.allocate().unwrap();
        let q1 = sim.allocate().unwrap();
        if swap {
            sim.apply(&[q0], q1, gates::pauli_x()).unwrap();
            sim.apply(&[], q0, gates::hadamard()).unwrap();
        } else {
            sim.apply(&[], q0, gates::hadamard()).unwrap();
            sim.apply(&[q0], q1, gates::pauli_x()).unwrap();
        }
        sim.amplitudes().unwrap().to_vec()
    };

    let a = run(false);
    let b = run(true);
    assert!(a.iter().zip(&b).any(|(x, y)| (x - y).norm() > 1e-6));
}

#[test]
fn test_toffoli_with_fusion() {
    for width in 1..=4 {
        let mut sim = simulator(width);
        let q: Vec<QubitId> = (0..3).map(|_| sim.allocate().unwrap()).collect();
        sim.apply(&[], q[0], gates::pauli_x()).unwrap();
        sim.apply(&[], q[1], gates::pauli_x()).unwrap();
        sim.apply(&[q[0], q[1]], q[2], gates::pauli_x()).unwrap();
        assert!(sim.classical_value(q[2]).unwrap());

        sim.apply(&[], q[1], gates::pauli_x()).unwrap();
        sim.apply(&[q[0], q[1]], q[2], gates::pauli_x()).unwrap();
        assert!(sim.classical_value(q[2]).unwrap());
    }
}

#[test]
fn test_gates_queued_before_release_are_applied() {
    let mut sim = simulator(4);
    let q0 = sim.allocate().unwrap();
    let q1 = sim.allocate().unwrap();
    sim.apply(&[], q1, gates::pauli_x()).unwrap();
    sim.release(q0).unwrap();

    assert!(sim.classical_value(q1).unwrap());
    assert_eq!(sim.amplitudes().unwrap(), &[c(0.0), c(1.0)]);
}

#[test]
fn test_operations_on_released_qubit_fail() {
    let mut sim = simulator(4);
    let q = sim.allocate().unwrap();
    sim.release(q).unwrap();

    assert!(matches!(
        sim.apply(&[], q, gates::hadamard()),
        Err(SimulatorError::InvalidQubit { .. })
    ));
    assert!(sim.measure(q).is_err());
    assert!(sim.release(q).is_err());
}

#[test]
fn test_ghz_parity_and_measurement() {
    let mut sim = Simulator::new(SimulatorConfig::wide().with_seed(3)).unwrap();
    let q: Vec<QubitId> = (0..5).map(|_| sim.allocate().unwrap()).collect();
    sim.apply(&[], q[0], gates::hadamard()).unwrap();
    for i in 1..5 {
        sim.apply(&[q[0]], q[i], gates::pauli_x()).unwrap();
    }

    assert_relative_eq!(sim.joint_probability(&q[..2]).unwrap(), 0.0, epsilon = 1e-12);
    assert_relative_eq!(sim.probability(q[4]).unwrap(), 0.5, epsilon = 1e-12);

    let value = sim.measure(q[2]).unwrap();
    for &id in &q {
        assert_eq!(sim.classical_value(id).unwrap(), value);
    }
}
