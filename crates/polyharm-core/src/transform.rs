//! Quadrature expansion onto the basis and synthesis back to point values.

use ndarray::{Array2, ArrayD, Axis, IxDyn, Slice};
use num_complex::Complex64;

use crate::assemble::assemble;
use crate::eigen::{PerNodeArray, check_degree, evaluate_node};
use crate::error::{HarmonicsError, Result};
use crate::harmonics::{HarmonicsConfig, harmonics};
use crate::layout::{IndexLayout, Layout, assume_n_end};
use crate::phase::Phase;
use crate::quadrature::QuadratureRule;
use crate::tree::{CoordinateTree, NodeId};

/// Coefficients of a function in the harmonic basis.
///
/// `values` has shape `extra ++ core`, where `extra` are value axes of the
/// expanded function and core is the structured block or `[count]`.
#[derive(Clone, Debug)]
pub struct ExpansionCoefficients {
    pub tree: CoordinateTree,
    pub n_end: usize,
    pub phase: Phase,
    pub layout: Layout,
    pub values: ArrayD<Complex64>,
}

impl ExpansionCoefficients {
    /// Wrap a raw array, inferring `n_end` from its trailing axes.
    pub fn from_array(
        tree: &CoordinateTree,
        values: ArrayD<Complex64>,
        phase: Phase,
        layout: Layout,
    ) -> Result<Self> {
        let n_end = assume_n_end(tree, values.shape(), layout)?;
        check_degree(n_end)?;
        Ok(Self {
            tree: tree.clone(),
            n_end,
            phase,
            layout,
            values,
        })
    }

    pub fn extra_shape(&self) -> &[usize] {
        let core = match self.layout {
            Layout::Structured => self.tree.len(),
            Layout::Flattened => 1,
        };
        &self.values.shape()[..self.values.ndim() - core]
    }

    pub fn to_layout(&self, layout: Layout) -> Result<Self> {
        let index = IndexLayout::new(&self.tree, self.n_end)?;
        let values = match (self.layout, layout) {
            (a, b) if a == b => self.values.clone(),
            (Layout::Structured, Layout::Flattened) => index.flatten(&self.values)?,
            _ => index.unflatten(&self.values)?,
        };
        Ok(Self {
            layout,
            values,
            ..self.clone()
        })
    }

    /// Truncate to degrees below `n_end`, keeping the layout.
    pub fn cut(&self, n_end: usize) -> Result<Self> {
        check_degree(n_end)?;
        if n_end > self.n_end {
            return Err(HarmonicsError::Degree(format!(
                "cannot cut degree {} coefficients up to {n_end}",
                self.n_end
            )));
        }
        let flat = self.to_layout(Layout::Flattened)?;
        let len = IndexLayout::new(&self.tree, self.n_end)?.cut_len(n_end);
        let last = Axis(flat.values.ndim() - 1);
        let values = flat
            .values
            .slice_axis(last, Slice::from(0..len))
            .to_owned();
        let cut = Self {
            n_end,
            layout: Layout::Flattened,
            values,
            ..self.clone()
        };
        cut.to_layout(self.layout)
    }
}

fn conj_flattened_basis(
    tree: &CoordinateTree,
    angles: &[ArrayD<f64>],
    n_end: usize,
    phase: Phase,
) -> Result<ArrayD<Complex64>> {
    let config = HarmonicsConfig::new(n_end)
        .with_phase(phase)
        .with_layout(Layout::Flattened)
        .with_check_domain(false);
    Ok(harmonics(tree, angles, &config)?.values.mapv(|v| v.conj()))
}

fn from_matrix(matrix: Array2<Complex64>, shape: &[usize]) -> Result<ArrayD<Complex64>> {
    Ok(matrix
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order(IxDyn(shape))?)
}

fn as_matrix(values: &ArrayD<Complex64>, rows: usize, cols: usize) -> Result<Array2<Complex64>> {
    Ok(values
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((rows, cols))?)
}

/// Project `f` onto the basis with an `n`-point-per-node quadrature rule.
///
/// `f` receives one angle array per node, each shaped like the quadrature
/// grid, and returns `grid ++ extra`. Requires `n >= config.n_end`.
pub fn expand<F>(
    tree: &CoordinateTree,
    f: F,
    n: usize,
    config: &HarmonicsConfig,
) -> Result<ExpansionCoefficients>
where
    F: Fn(&[ArrayD<f64>]) -> ArrayD<Complex64>,
{
    try_expand(tree, |angles| Ok(f(angles)), n, config)
}

/// [`expand`] for a fallible `f`; its first error aborts the expansion.
pub fn try_expand<F>(
    tree: &CoordinateTree,
    f: F,
    n: usize,
    config: &HarmonicsConfig,
) -> Result<ExpansionCoefficients>
where
    F: Fn(&[ArrayD<f64>]) -> Result<ArrayD<Complex64>>,
{
    check_degree(config.n_end)?;
    if n < config.n_end {
        return Err(HarmonicsError::Degree(format!(
            "quadrature with {n} points cannot resolve degree {}",
            config.n_end
        )));
    }
    let rule = QuadratureRule::new(tree, n)?;
    let grid = rule.grid_shape();
    let samples = f(&rule.full_grid_angles())?;
    if samples.ndim() < grid.len() || samples.shape()[..grid.len()] != grid[..] {
        return Err(HarmonicsError::Shape(format!(
            "function returned shape {:?}, expected grid {grid:?} first",
            samples.shape()
        )));
    }
    let extra = samples.shape()[grid.len()..].to_vec();
    let n_points: usize = grid.iter().product();
    let n_extra: usize = extra.iter().product();

    let ybar = conj_flattened_basis(tree, &rule.grid_angles(), config.n_end, config.phase)?;
    let count = ybar.shape()[ybar.ndim() - 1];
    let ybar = as_matrix(&ybar, n_points, count)?;

    let weights = rule.grid_weights();
    let mut weighted = as_matrix(&samples, n_points, n_extra)?;
    for (mut row, w) in weighted.outer_iter_mut().zip(weights.iter()) {
        row.mapv_inplace(|v| v * *w);
    }
    let coef = weighted.t().dot(&ybar);

    let mut shape = extra;
    shape.push(count);
    let values = from_matrix(coef, &shape)?;
    tracing::debug!(
        tree = %tree.branching_types(),
        n_end = config.n_end,
        n,
        points = n_points,
        "expanded function"
    );
    ExpansionCoefficients {
        tree: tree.clone(),
        n_end: config.n_end,
        phase: config.phase,
        layout: Layout::Flattened,
        values,
    }
    .to_layout(config.layout)
}

/// Expansion of a product function `f(θ) = Π_k f_k(θ_k)`.
///
/// `f(node, points)` receives a node's one-dimensional quadrature angles and
/// returns that node's factor at each of them. Every node is projected on its
/// own; the projections are then assembled like eigenfunctions.
pub fn expand_separable<F>(
    tree: &CoordinateTree,
    f: F,
    n: usize,
    config: &HarmonicsConfig,
) -> Result<ExpansionCoefficients>
where
    F: Fn(NodeId, &ArrayD<f64>) -> ArrayD<Complex64>,
{
    check_degree(config.n_end)?;
    if n < config.n_end {
        return Err(HarmonicsError::Degree(format!(
            "quadrature with {n} points cannot resolve degree {}",
            config.n_end
        )));
    }
    let rule = QuadratureRule::new(tree, n)?;
    let projections = tree
        .ids()
        .map(|id| -> Result<PerNodeArray> {
            let node_rule = rule.node(id);
            let points =
                ArrayD::from_shape_vec(IxDyn(&[node_rule.len()]), node_rule.points.clone())?;
            let samples = f(id, &points);
            if samples.shape() != [node_rule.len()] {
                return Err(HarmonicsError::Shape(format!(
                    "factor for node {} has shape {:?}, expected [{}]",
                    id.0,
                    samples.shape(),
                    node_rule.len()
                )));
            }
            let eigen = evaluate_node(tree, id, &points, config.n_end, config.phase)?;
            let core_len: usize = eigen.values.shape()[1..].iter().product();
            let ybar = as_matrix(&eigen.values.mapv(|v| v.conj()), node_rule.len(), core_len)?;
            let mut projected = vec![Complex64::new(0.0, 0.0); core_len];
            for ((row, s), w) in ybar.outer_iter().zip(samples.iter()).zip(&node_rule.weights) {
                for (p, y) in projected.iter_mut().zip(row.iter()) {
                    *p += *y * *s * *w;
                }
            }
            Ok(PerNodeArray {
                node: id,
                axes: eigen.axes,
                values: ArrayD::from_shape_vec(IxDyn(&eigen.values.shape()[1..]), projected)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let raw = assemble(&projections, tree.len())?;
    let index = IndexLayout::new(tree, config.n_end)?;
    ExpansionCoefficients {
        tree: tree.clone(),
        n_end: config.n_end,
        phase: config.phase,
        layout: Layout::Flattened,
        values: index.flatten(&raw)?,
    }
    .to_layout(config.layout)
}

/// Synthesis `Σ_k c_k Y_k` at the given angles. Result shape `batch ++ extra`.
pub fn evaluate(
    coef: &ExpansionCoefficients,
    angles: &[ArrayD<f64>],
) -> Result<ArrayD<Complex64>> {
    let flat = coef.to_layout(Layout::Flattened)?;
    let config = HarmonicsConfig::new(coef.n_end)
        .with_phase(coef.phase)
        .with_layout(Layout::Flattened);
    let basis = harmonics(&coef.tree, angles, &config)?;
    let count = basis.values.shape()[basis.values.ndim() - 1];
    let coef_count = flat.values.shape()[flat.values.ndim() - 1];
    if count != coef_count {
        return Err(HarmonicsError::Shape(format!(
            "{coef_count} coefficients for a basis of {count}"
        )));
    }
    let batch = basis.batch_shape().to_vec();
    let extra = flat.extra_shape().to_vec();
    let n_batch: usize = batch.iter().product();
    let n_extra: usize = extra.iter().product();

    let y = as_matrix(&basis.values, n_batch, count)?;
    let c = as_matrix(&flat.values, n_extra, count)?;
    let out = y.dot(&c.t());

    let mut shape = batch;
    shape.extend(extra);
    from_matrix(out, &shape)
}

/// [`evaluate`] for a bare coefficient array; `n_end` is inferred.
pub fn evaluate_array(
    tree: &CoordinateTree,
    values: &ArrayD<Complex64>,
    angles: &[ArrayD<f64>],
    phase: Phase,
    layout: Layout,
) -> Result<ArrayD<Complex64>> {
    let coef = ExpansionCoefficients::from_array(tree, values.clone(), phase, layout)?;
    evaluate(&coef, angles)
}

/// Truncate coefficients to degrees below `n_end`.
pub fn expand_cut(coef: &ExpansionCoefficients, n_end: usize) -> Result<ExpansionCoefficients> {
    coef.cut(n_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn ones(shape: &[usize]) -> ArrayD<Complex64> {
        ArrayD::from_elem(IxDyn(shape), Complex64::new(1.0, 0.0))
    }

    #[test]
    fn test_constant_projects_onto_degree_zero() {
        let tree = CoordinateTree::spherical();
        let coef = expand(
            &tree,
            |angles| ones(angles[0].shape()),
            3,
            &HarmonicsConfig::new(3),
        )
        .unwrap();
        assert_eq!(coef.values.shape(), &[9]);
        // ∫ 1 · Y_00 = sqrt(4π)
        let area = 4.0 * std::f64::consts::PI;
        assert_abs_diff_eq!(coef.values[[0]].re, area.sqrt(), epsilon = 1e-12);
        for k in 1..9 {
            assert_abs_diff_eq!(coef.values[[k]].norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_extra_axes_lead() {
        let tree = CoordinateTree::polar();
        let coef = expand(
            &tree,
            |angles| {
                let shape = angles[0].shape();
                let mut out = ArrayD::from_elem(IxDyn(&[shape[0], 2]), Complex64::new(0.0, 0.0));
                for (i, t) in angles[0].iter().enumerate() {
                    out[[i, 0]] = Complex64::new(1.0, 0.0);
                    out[[i, 1]] = Complex64::from_polar(1.0, *t);
                }
                out
            },
            2,
            &HarmonicsConfig::new(2),
        )
        .unwrap();
        assert_eq!(coef.values.shape(), &[2, 3]);
        assert_eq!(coef.extra_shape(), &[2]);
        let sqrt_tau = std::f64::consts::TAU.sqrt();
        // e^{iθ} = sqrt(2π) Y_1
        assert_abs_diff_eq!(coef.values[[1, 1]].re, sqrt_tau, epsilon = 1e-12);
        assert_abs_diff_eq!(coef.values[[1, 0]].norm(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(coef.values[[0, 0]].re, sqrt_tau, epsilon = 1e-12);
    }

    #[test]
    fn test_too_few_points() {
        let tree = CoordinateTree::spherical();
        let result = expand(&tree, |a| ones(a[0].shape()), 2, &HarmonicsConfig::new(3));
        assert!(matches!(result, Err(HarmonicsError::Degree(_))));
    }

    #[test]
    fn test_try_expand_propagates_callback_error() {
        let tree = CoordinateTree::spherical();
        let result = try_expand(
            &tree,
            |_| Err(HarmonicsError::Argument("no samples".into())),
            3,
            &HarmonicsConfig::new(3),
        );
        assert_eq!(result.unwrap_err(), HarmonicsError::Argument("no samples".into()));
    }

    #[test]
    fn test_bad_function_shape() {
        let tree = CoordinateTree::spherical();
        let result = expand(&tree, |_| ones(&[2]), 3, &HarmonicsConfig::new(3));
        assert!(matches!(result, Err(HarmonicsError::Shape(_))));
    }

    #[test]
    fn test_evaluate_rejects_mismatched_count() {
        let tree = CoordinateTree::spherical();
        let values = ones(&[15]);
        let angles = [arr1(&[0.5]).into_dyn(), arr1(&[1.0]).into_dyn()];
        assert!(matches!(
            evaluate_array(&tree, &values, &angles, Phase::NONE, Layout::Flattened),
            Err(HarmonicsError::Shape(_))
        ));
    }

    #[test]
    fn test_cut_keeps_prefix() {
        let tree = CoordinateTree::spherical();
        let values = ArrayD::from_shape_fn(IxDyn(&[16]), |ix| Complex64::new(ix[0] as f64, 0.0));
        let coef =
            ExpansionCoefficients::from_array(&tree, values, Phase::NONE, Layout::Flattened).unwrap();
        assert_eq!(coef.n_end, 4);
        let cut = expand_cut(&coef, 2).unwrap();
        assert_eq!(cut.n_end, 2);
        assert_eq!(cut.values.shape(), &[4]);
        assert_eq!(cut.values[[3]].re, 3.0);
        assert!(matches!(expand_cut(&coef, 5), Err(HarmonicsError::Degree(_))));

        let structured = coef.to_layout(Layout::Structured).unwrap();
        let cut = structured.cut(3).unwrap();
        assert_eq!(cut.values.shape(), &[3, 5]);
        assert_eq!(cut.layout, Layout::Structured);
    }
}
