//! Regular and singular solutions of the Helmholtz equation.
//!
//! A solution of degree n is a radial Bessel factor `f_n(k r)` times the
//! harmonic `Y_n(x / r)`. The regular kind (J) is finite at the origin; the
//! singular kind (first Hankel) radiates outward.

use ndarray::{ArrayD, Axis, IxDyn};
use num_complex::Complex64;
use statrs::function::gamma::ln_gamma;

use crate::assemble::broadcast_shapes;
use crate::eigen::check_degree;
use crate::error::{HarmonicsError, Result};
use crate::harmonics::{HarmonicBasis, HarmonicsConfig, harmonics};
use crate::layout::{IndexLayout, Layout};
use crate::special::hyperspherical_bessel;
use crate::tree::CoordinateTree;

/// Which radial Bessel function multiplies the harmonic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RadialKind {
    J,
    Y,
    H1,
    H2,
}

impl RadialKind {
    pub const REGULAR: RadialKind = RadialKind::J;
    pub const SINGULAR: RadialKind = RadialKind::H1;

    fn combine(self, j: f64, y: f64) -> Complex64 {
        match self {
            RadialKind::J => Complex64::new(j, 0.0),
            RadialKind::Y => Complex64::new(y, 0.0),
            RadialKind::H1 => Complex64::new(j, y),
            RadialKind::H2 => Complex64::new(j, -y),
        }
    }
}

/// Radial factor settings: wavenumber, function kind, and whether to take
/// the derivative with respect to r.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Radial {
    pub k: f64,
    pub kind: RadialKind,
    pub derivative: bool,
}

impl Radial {
    pub fn new(k: f64, kind: RadialKind) -> Self {
        Self {
            k,
            kind,
            derivative: false,
        }
    }

    pub fn regular(k: f64) -> Self {
        Self::new(k, RadialKind::REGULAR)
    }

    pub fn singular(k: f64) -> Self {
        Self::new(k, RadialKind::SINGULAR)
    }

    pub fn with_derivative(mut self, derivative: bool) -> Self {
        self.derivative = derivative;
        self
    }

    fn check(&self) -> Result<()> {
        if !(self.k.is_finite() && self.k > 0.0) {
            return Err(HarmonicsError::Argument(format!(
                "wavenumber must be positive and finite, got {}",
                self.k
            )));
        }
        Ok(())
    }

    /// `f_n(k r)` (or `d/dr f_n(k r)`) for degrees 0..n_end in dimension d.
    pub fn values(&self, c_ndim: usize, n_end: usize, r: f64) -> Result<Vec<Complex64>> {
        self.check()?;
        if !(r.is_finite() && r >= 0.0) {
            return Err(HarmonicsError::Argument(format!(
                "radius must be non-negative and finite, got {r}"
            )));
        }
        let z = self.k * r;
        if !self.derivative {
            let (j, y) = hyperspherical_bessel(c_ndim, n_end, z);
            return Ok(j
                .iter()
                .zip(&y)
                .map(|(j, y)| self.kind.combine(*j, *y))
                .collect());
        }
        if z == 0.0 {
            return Ok((0..n_end)
                .map(|n| self.kind.combine(derivative_at_origin(c_ndim, n), f64::INFINITY))
                .map(|v| v * self.k)
                .collect());
        }
        // f_n' = (n / z) f_n - f_{n+1}
        let (j, y) = hyperspherical_bessel(c_ndim, n_end + 1, z);
        Ok((0..n_end)
            .map(|n| {
                let scale = n as f64 / z;
                let dj = scale * j[n] - j[n + 1];
                let dy = scale * y[n] - y[n + 1];
                self.kind.combine(dj, dy) * self.k
            })
            .collect())
    }
}

/// `d/dz` of the regular radial function at z = 0: only degree one survives.
fn derivative_at_origin(c_ndim: usize, n: usize) -> f64 {
    if n != 1 {
        return 0.0;
    }
    let lambda = c_ndim as f64 / 2.0 - 1.0;
    std::f64::consts::FRAC_PI_2.sqrt()
        * (-(lambda + 1.0) * std::f64::consts::LN_2 - ln_gamma(lambda + 2.0)).exp()
}

/// Radial factor of every flattened basis function. Result shape
/// `radius.shape() ++ [count]`.
pub fn radial_component(
    tree: &CoordinateTree,
    radius: &ArrayD<f64>,
    radial: &Radial,
    n_end: usize,
) -> Result<ArrayD<Complex64>> {
    check_degree(n_end)?;
    let index = IndexLayout::new(tree, n_end)?;
    let degrees = index.degrees();
    let mut data = Vec::with_capacity(radius.len() * degrees.len());
    for r in radius.iter() {
        let per_degree = radial.values(tree.c_ndim(), n_end, *r)?;
        data.extend(degrees.iter().map(|&n| per_degree[n]));
    }
    let mut shape = radius.shape().to_vec();
    shape.push(degrees.len());
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
}

/// Regular or singular solutions `f_n(k r) Y_n(θ)` at points given in
/// polyspherical coordinates. The radius broadcasts with the angles.
pub fn harmonics_regular_singular(
    tree: &CoordinateTree,
    radius: &ArrayD<f64>,
    angles: &[ArrayD<f64>],
    radial: &Radial,
    config: &HarmonicsConfig,
) -> Result<HarmonicBasis> {
    let flat = config.with_layout(Layout::Flattened);
    let basis = harmonics(tree, angles, &flat)?;
    broadcast_shapes(&[basis.batch_shape(), radius.shape()])?;
    let factor = radial_component(tree, radius, radial, config.n_end)?;
    let values = &basis.values * &factor;
    tracing::debug!(
        tree = %tree.branching_types(),
        n_end = config.n_end,
        k = radial.k,
        kind = ?radial.kind,
        "evaluated regular/singular solutions"
    );
    HarmonicBasis { values, ..basis }.to_layout(config.layout)
}

/// [`harmonics_regular_singular`] at Cartesian points with a trailing axis
/// of length d.
pub fn harmonics_regular_singular_cartesian(
    tree: &CoordinateTree,
    points: &ArrayD<f64>,
    radial: &Radial,
    config: &HarmonicsConfig,
) -> Result<HarmonicBasis> {
    let angles = tree.from_cartesian(points)?;
    let last = Axis(points.ndim() - 1);
    let radius = points.map_axis(last, |x| x.dot(&x).sqrt());
    harmonics_regular_singular(tree, &radius, &angles, radial, config)
}
