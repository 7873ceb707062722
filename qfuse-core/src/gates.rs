//! Standard single-qubit gate matrices
//!
//! All matrices are row-major 2×2 arrays acting on the little-endian basis
//! `|0⟩, |1⟩`.

use crate::Matrix2;
use num_complex::Complex64;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

pub fn identity() -> Matrix2 {
    [[ONE, ZERO], [ZERO, ONE]]
}

pub fn pauli_x() -> Matrix2 {
    [[ZERO, ONE], [ONE, ZERO]]
}

pub fn pauli_y() -> Matrix2 {
    [
        [ZERO, Complex64::new(0.0, -1.0)],
        [Complex64::new(0.0, 1.0), ZERO],
    ]
}

pub fn pauli_z() -> Matrix2 {
    [[ONE, ZERO], [ZERO, -ONE]]
}

pub fn hadamard() -> Matrix2 {
    let h = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
    [[h, h], [h, -h]]
}

/// S = diag(1, i)
pub fn s_gate() -> Matrix2 {
    phase(std::f64::consts::FRAC_PI_2)
}

/// T = diag(1, e^{iπ/4})
pub fn t_gate() -> Matrix2 {
    phase(std::f64::consts::FRAC_PI_4)
}

/// Phase shift diag(1, e^{iθ})
pub fn phase(theta: f64) -> Matrix2 {
    [[ONE, ZERO], [ZERO, Complex64::from_polar(1.0, theta)]]
}

/// RX(θ) = exp(-iθX/2)
pub fn rx(theta: f64) -> Matrix2 {
    let (sin, cos) = (theta / 2.0).sin_cos();
    [
        [Complex64::new(cos, 0.0), Complex64::new(0.0, -sin)],
        [Complex64::new(0.0, -sin), Complex64::new(cos, 0.0)],
    ]
}

/// RY(θ) = exp(-iθY/2)
pub fn ry(theta: f64) -> Matrix2 {
    let (sin, cos) = (theta / 2.0).sin_cos();
    [
        [Complex64::new(cos, 0.0), Complex64::new(-sin, 0.0)],
        [Complex64::new(sin, 0.0), Complex64::new(cos, 0.0)],
    ]
}

/// RZ(θ) = exp(-iθZ/2)
pub fn rz(theta: f64) -> Matrix2 {
    [
        [Complex64::from_polar(1.0, -theta / 2.0), ZERO],
        [ZERO, Complex64::from_polar(1.0, theta / 2.0)],
    ]
}
