//! Translation coefficients for Helmholtz solutions.
//!
//! A solution centred at the origin, re-expanded about a point shifted by
//! `t`, is a linear combination of solutions centred there:
//!
//! ```text
//! R_n(x + t) = Σ_n' (R|R)_{n n'}(t) R_n'(x)
//! S_n(x + t) = Σ_n' (S|S)_{n n'}(t) S_n'(x)      |x| > |t|
//! S_n(x + t) = Σ_n' (S|R)_{n n'}(t) R_n'(x)      |x| < |t|
//! ```
//!
//! with `(R|R) = (S|S)`. The sum over n' is truncated at `n_end_add`.

use ndarray::{Array2, Array3, ArrayD, Axis, Ix2, Ix3, IxDyn};
use num_complex::Complex64;

use crate::eigen::check_degree;
use crate::error::{HarmonicsError, Result};
use crate::harmonics::{HarmonicsConfig, harmonics};
use crate::helmholtz::{Radial, harmonics_regular_singular_cartesian};
use crate::layout::IndexLayout;
use crate::phase::Phase;
use crate::special::i_pow;
use crate::transform::try_expand;
use crate::tree::CoordinateTree;
use crate::wave::plane_wave_scale;

/// Which pair of solution kinds the coefficients connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranslationKind {
    /// `(R|R) = (S|S)`.
    SameType,
    /// `(S|R)`: singular solutions re-expanded in regular ones.
    SingularToRegular,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TranslationMethod {
    /// Project the translated plane-wave integral. Same-type only.
    PlaneWave,
    /// Sum over triple-product integrals of the basis.
    Triplet,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TranslationConfig {
    /// Degrees of the translated solutions (rows).
    pub n_end: usize,
    /// Degrees summed over (columns).
    pub n_end_add: usize,
    pub k: f64,
    pub phase: Phase,
    pub kind: TranslationKind,
    /// `None` picks the plane-wave method for same-type coefficients and the
    /// triplet method otherwise.
    pub method: Option<TranslationMethod>,
}

impl TranslationConfig {
    pub fn new(n_end: usize, n_end_add: usize, k: f64) -> Self {
        Self {
            n_end,
            n_end_add,
            k,
            phase: Phase::NONE,
            kind: TranslationKind::SameType,
            method: None,
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_kind(mut self, kind: TranslationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_method(mut self, method: TranslationMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// `n_end` of the intermediate expansions both methods need.
    fn n_end_sum(&self) -> usize {
        self.n_end + self.n_end_add - 1
    }
}

/// Translation coefficients for the Cartesian shift `t`.
///
/// Row i is the flattened index of the translated solution (degrees below
/// `n_end`), column j that of the solution summed over (below `n_end_add`).
pub fn translation_coefficients(
    tree: &CoordinateTree,
    t: &[f64],
    config: &TranslationConfig,
) -> Result<Array2<Complex64>> {
    tree.validate()?;
    check_degree(config.n_end)?;
    check_degree(config.n_end_add)?;
    check_degree(config.n_end_sum())?;
    if t.len() != tree.c_ndim() {
        return Err(HarmonicsError::Shape(format!(
            "translation has {} coordinates, tree expects {}",
            t.len(),
            tree.c_ndim()
        )));
    }
    let method = config.method.unwrap_or(match config.kind {
        TranslationKind::SameType => TranslationMethod::PlaneWave,
        TranslationKind::SingularToRegular => TranslationMethod::Triplet,
    });
    let coef = match (method, config.kind) {
        (TranslationMethod::PlaneWave, TranslationKind::SameType) => {
            plane_wave_method(tree, t, config)?
        }
        (TranslationMethod::PlaneWave, TranslationKind::SingularToRegular) => {
            return Err(HarmonicsError::Argument(
                "the plane-wave method only connects solutions of the same kind".into(),
            ));
        }
        (TranslationMethod::Triplet, _) => triplet_method(tree, t, config)?,
    };
    tracing::debug!(
        tree = %tree.branching_types(),
        n_end = config.n_end,
        n_end_add = config.n_end_add,
        kind = ?config.kind,
        method = ?method,
        "computed translation coefficients"
    );
    Ok(coef)
}

/// `(-i)^{deg n - deg n'} ∫ Y_n(u) e^{i k u·t} conj(Y_n'(u)) du`.
fn plane_wave_method(
    tree: &CoordinateTree,
    t: &[f64],
    config: &TranslationConfig,
) -> Result<Array2<Complex64>> {
    let k = config.k;
    if !(k.is_finite() && k > 0.0) {
        return Err(HarmonicsError::Argument(format!(
            "wavenumber must be positive and finite, got {k}"
        )));
    }
    let rows = HarmonicsConfig::new(config.n_end)
        .with_phase(config.phase)
        .with_check_domain(false);
    let projected = try_expand(
        tree,
        |angles| {
            let y = harmonics(tree, angles, &rows)?.values;
            let u = tree.to_cartesian(angles)?;
            let mut dot = ArrayD::<f64>::zeros(IxDyn(angles[0].shape()));
            for (ui, ti) in u.iter().zip(t) {
                dot.scaled_add(k * ti, ui);
            }
            let grid_ndim = dot.ndim();
            let wave = dot
                .mapv(|a| Complex64::from_polar(1.0, a))
                .insert_axis(Axis(grid_ndim));
            Ok(&y * &wave)
        },
        config.n_end_sum(),
        &HarmonicsConfig::new(config.n_end_add).with_phase(config.phase),
    )?;
    let mut coef = projected.values.into_dimensionality::<Ix2>()?;
    let row_deg = IndexLayout::new(tree, config.n_end)?.degrees().to_vec();
    let col_deg = IndexLayout::new(tree, config.n_end_add)?.degrees().to_vec();
    for ((i, j), v) in coef.indexed_iter_mut() {
        *v *= i_pow(col_deg[j] as i64 - row_deg[i] as i64);
    }
    Ok(coef)
}

/// `A Σ_n'' (-i)^{deg n - deg n' - deg n''} F_n''(t) ∫ Y_n conj(Y_n') conj(Y_n'')`
/// with `A = 2 (2π)^{(d-1)/2}` and F regular or singular.
fn triplet_method(
    tree: &CoordinateTree,
    t: &[f64],
    config: &TranslationConfig,
) -> Result<Array2<Complex64>> {
    let radial = match config.kind {
        TranslationKind::SameType => Radial::regular(config.k),
        TranslationKind::SingularToRegular => Radial::singular(config.k),
    };
    let point = ArrayD::from_shape_vec(IxDyn(&[t.len()]), t.to_vec())?;
    let sum_config = HarmonicsConfig::new(config.n_end_sum()).with_phase(config.phase);
    let shifted = harmonics_regular_singular_cartesian(tree, &point, &radial, &sum_config)?.values;
    let triple = triple_product_integrals(tree, config.n_end, config.n_end_add, config.phase)?;

    let row_deg = IndexLayout::new(tree, config.n_end)?.degrees().to_vec();
    let col_deg = IndexLayout::new(tree, config.n_end_add)?.degrees().to_vec();
    let sum_deg = IndexLayout::new(tree, config.n_end_sum())?.degrees().to_vec();
    let scale = plane_wave_scale(tree.c_ndim());

    let mut coef = Array2::zeros((row_deg.len(), col_deg.len()));
    for ((i, j), v) in coef.indexed_iter_mut() {
        let mut acc = Complex64::new(0.0, 0.0);
        for (l, g) in triple.slice(ndarray::s![i, j, ..]).iter().enumerate() {
            let power = (col_deg[j] + sum_deg[l]) as i64 - row_deg[i] as i64;
            acc += i_pow(power) * shifted[[l]] * *g;
        }
        *v = acc * scale;
    }
    Ok(coef)
}

/// `∫ Y_n1 conj(Y_n2) conj(Y_n3)` over the sphere, shape
/// `[count(n_end_1), count(n_end_2), count(n_end_1 + n_end_2 - 1)]`.
///
/// Exact: the quadrature resolves every product of three basis functions.
pub fn triple_product_integrals(
    tree: &CoordinateTree,
    n_end_1: usize,
    n_end_2: usize,
    phase: Phase,
) -> Result<Array3<Complex64>> {
    check_degree(n_end_1)?;
    check_degree(n_end_2)?;
    let n_sum = n_end_1 + n_end_2 - 1;
    check_degree(n_sum)?;
    let first = HarmonicsConfig::new(n_end_1)
        .with_phase(phase)
        .with_check_domain(false);
    let second = HarmonicsConfig::new(n_end_2)
        .with_phase(phase)
        .with_check_domain(false);
    let projected = try_expand(
        tree,
        |angles| {
            let y1 = harmonics(tree, angles, &first)?.values;
            let y2 = harmonics(tree, angles, &second)?.values.mapv(|v| v.conj());
            let ndim = y1.ndim();
            let y1 = y1.insert_axis(Axis(ndim));
            let y2 = y2.insert_axis(Axis(ndim - 1));
            Ok(&y1 * &y2)
        },
        n_sum,
        &HarmonicsConfig::new(n_sum).with_phase(phase),
    )?;
    Ok(projected.values.into_dimensionality::<Ix3>()?)
}
