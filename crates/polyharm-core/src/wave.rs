//! Plane-wave expansions in regular Helmholtz solutions.

use std::f64::consts::{LN_2, PI, TAU};

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use statrs::function::gamma::ln_gamma;

use crate::error::{HarmonicsError, Result};
use crate::harmonics::{HarmonicsConfig, harmonics};
use crate::layout::{IndexLayout, Layout};
use crate::special::i_pow;
use crate::transform::ExpansionCoefficients;
use crate::tree::CoordinateTree;

/// Coefficient `c_n` of the zonal expansion
/// `e^{i k x·u} = Σ_n c_n f_n(k |x|) C_n^{(λ)}(x̂·u)`, λ = d/2 - 1, where f_n
/// is the regular radial function. For d = 3 this is `i^n (2n + 1)`.
///
/// Requires d >= 3; the Gegenbauer form degenerates on the circle.
pub fn plane_wave_expansion_coef(n: usize, c_ndim: usize) -> Result<Complex64> {
    if c_ndim < 3 {
        return Err(HarmonicsError::Argument(format!(
            "zonal plane-wave coefficients need d >= 3, got {c_ndim}"
        )));
    }
    let d = c_ndim as f64;
    let magnitude = (2.0 * n as f64 + d - 2.0) / (d - 2.0)
        * (ln_gamma(d / 2.0) + LN_2 * (d - 1.0) / 2.0).exp()
        / PI.sqrt();
    Ok(i_pow(n as i64) * magnitude)
}

/// `2 (2π)^{(d-1)/2}`, the weight of each term in
/// `e^{i k x·u} = Σ_n 2 (2π)^{(d-1)/2} i^n f_n(k |x|) Y_n(x̂) conj(Y_n(u))`.
pub fn plane_wave_scale(c_ndim: usize) -> f64 {
    2.0 * TAU.powf((c_ndim as f64 - 1.0) / 2.0)
}

/// Coefficients of `e^{i k x·u}` in the regular solutions `f_n(k r) Y_n`, for
/// the directions `u` given as per-node angles.
///
/// The direction batch becomes the extra axes of the result; the
/// coefficients do not depend on k.
pub fn plane_wave_coefficients(
    tree: &CoordinateTree,
    direction: &[ArrayD<f64>],
    config: &HarmonicsConfig,
) -> Result<ExpansionCoefficients> {
    let basis = harmonics(tree, direction, &config.with_layout(Layout::Flattened))?;
    let index = IndexLayout::new(tree, config.n_end)?;
    let scale = plane_wave_scale(tree.c_ndim());
    let phases: Vec<Complex64> = index
        .degrees()
        .iter()
        .map(|&n| i_pow(n as i64) * scale)
        .collect();
    let weights = ArrayD::from_shape_vec(IxDyn(&[phases.len()]), phases)?;
    let values = &basis.values.mapv(|v| v.conj()) * &weights;
    ExpansionCoefficients {
        tree: tree.clone(),
        n_end: config.n_end,
        phase: config.phase,
        layout: Layout::Flattened,
        values,
    }
    .to_layout(config.layout)
}
