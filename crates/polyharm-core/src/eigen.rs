//! Per-node eigenfunctions.
//!
//! Each node's eigenfunction depends only on its own angle and on the
//! quantum numbers of its subtree children. A node's array keeps the angle's
//! batch axes first, then one axis per quantum number it depends on:
//!
//! - azimuthal: `[own]`
//! - polar fusion: `[child, own]`
//! - triple fusion: `[cos child, sin child, own]`

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;

use crate::constants::{INV_SQRT_TAU, MAX_DEGREE};
use crate::error::{HarmonicsError, Result};
use crate::phase::Phase;
use crate::special::{jacobi_all, jacobi_norm};
use crate::tree::{Child, CoordinateTree, NodeId, NodeKind, Side};

/// One node's eigenfunction values over its quantum-number axes.
#[derive(Clone, Debug, PartialEq)]
pub struct PerNodeArray {
    pub node: NodeId,
    /// Nodes owning the trailing axes, in axis order.
    pub axes: Vec<NodeId>,
    pub values: ArrayD<Complex64>,
}

impl PerNodeArray {
    pub fn batch_shape(&self) -> &[usize] {
        &self.values.shape()[..self.values.ndim() - self.axes.len()]
    }
}

/// Length of a node's own quantum-number axis.
pub fn axis_len(kind: NodeKind, n_end: usize) -> usize {
    match kind {
        NodeKind::Azimuthal => (2 * n_end).saturating_sub(1),
        _ => n_end,
    }
}

/// Signed quantum number stored at position `idx` of a node's axis.
///
/// Azimuthal axes hold `[0, 1, .., N-1, -(N-1), .., -1]`; all others hold the
/// degree itself.
pub fn quantum_number(kind: NodeKind, idx: usize, n_end: usize) -> i64 {
    match kind {
        NodeKind::Azimuthal if idx >= n_end => idx as i64 - (2 * n_end as i64 - 1),
        _ => idx as i64,
    }
}

/// Reject degree ranges the evaluator cannot represent.
pub fn check_degree(n_end: usize) -> Result<()> {
    if n_end == 0 {
        return Err(HarmonicsError::Degree("n_end must be positive".into()));
    }
    if n_end > MAX_DEGREE {
        return Err(HarmonicsError::Degree(format!(
            "n_end {n_end} exceeds the supported maximum {MAX_DEGREE}"
        )));
    }
    Ok(())
}

/// Evaluate one node's eigenfunction at the angles `theta` (any batch shape).
pub fn evaluate_node(
    tree: &CoordinateTree,
    id: NodeId,
    theta: &ArrayD<f64>,
    n_end: usize,
    phase: Phase,
) -> Result<PerNodeArray> {
    check_degree(n_end)?;
    let node = tree.node(id);
    let mut axes = Vec::with_capacity(3);
    for child in [node.cos, node.sin] {
        if let Child::Node(c) = child {
            axes.push(c);
        }
    }
    axes.push(id);

    let lens: Vec<usize> = axes
        .iter()
        .map(|&a| axis_len(tree.kind(a), n_end))
        .collect();
    let per_point: usize = lens.iter().product();
    let mut data = Vec::with_capacity(theta.len() * per_point);

    match tree.kind(id) {
        NodeKind::Azimuthal => {
            for &t in theta.iter() {
                azimuthal(t, n_end, phase, &mut data);
            }
        }
        NodeKind::PolarFusion { side } => {
            let child = node.child(side);
            let child_kind = match child {
                Child::Node(c) => tree.kind(c),
                Child::Leaf(_) => unreachable!("polar fusion always has a subtree child"),
            };
            let table = PolarTable::new(tree.child_weight(child), n_end);
            for &t in theta.iter() {
                table.evaluate(t, side, child_kind, &mut data);
            }
        }
        NodeKind::TripleFusion => {
            let (cos_kind, sin_kind) = match (node.cos, node.sin) {
                (Child::Node(c), Child::Node(s)) => (tree.kind(c), tree.kind(s)),
                _ => unreachable!("triple fusion always has two subtree children"),
            };
            let table = TripleTable::new(
                tree.child_weight(node.cos),
                tree.child_weight(node.sin),
                n_end,
            );
            for &t in theta.iter() {
                table.evaluate(t, cos_kind, sin_kind, &mut data);
            }
        }
    }

    let mut shape = theta.shape().to_vec();
    shape.extend_from_slice(&lens);
    let values = ArrayD::from_shape_vec(IxDyn(&shape), data)?;
    Ok(PerNodeArray {
        node: id,
        axes,
        values,
    })
}

fn azimuthal(theta: f64, n_end: usize, phase: Phase, out: &mut Vec<Complex64>) {
    let kind = NodeKind::Azimuthal;
    for idx in 0..axis_len(kind, n_end) {
        let m = quantum_number(kind, idx, n_end);
        let scale = phase.factor(m) * INV_SQRT_TAU;
        out.push(Complex64::from_polar(scale, m as f64 * theta));
    }
}

/// Normalisations for a polar fusion, indexed `[q][l - q]`.
struct PolarTable {
    half_weight: f64,
    n_end: usize,
    norms: Vec<Vec<f64>>,
}

impl PolarTable {
    fn new(child_weight: usize, n_end: usize) -> Self {
        let half_weight = (child_weight as f64 - 1.0) / 2.0;
        let norms = (0..n_end)
            .map(|q| {
                let alpha = q as f64 + half_weight;
                (0..n_end - q).map(|k| jacobi_norm(k, alpha, alpha)).collect()
            })
            .collect();
        Self {
            half_weight,
            n_end,
            norms,
        }
    }

    fn evaluate(&self, theta: f64, side: Side, child_kind: NodeKind, out: &mut Vec<Complex64>) {
        // sin side: (sin^q θ, P(cos θ)); cos side mirrors it
        let (outer, arg) = match side {
            Side::Sin => (theta.sin(), theta.cos()),
            Side::Cos => (theta.cos(), theta.sin()),
        };
        let rows: Vec<Vec<f64>> = (0..self.n_end)
            .map(|q| {
                let alpha = q as f64 + self.half_weight;
                let p = jacobi_all(self.n_end - q, alpha, alpha, arg);
                let lead = outer.powi(q as i32);
                p.iter()
                    .zip(&self.norms[q])
                    .map(|(p, n)| n * lead * p)
                    .collect()
            })
            .collect();
        for child_idx in 0..axis_len(child_kind, self.n_end) {
            let q = quantum_number(child_kind, child_idx, self.n_end).unsigned_abs() as usize;
            for l in 0..self.n_end {
                let value = if l < q { 0.0 } else { rows[q][l - q] };
                out.push(Complex64::new(value, 0.0));
            }
        }
    }
}

/// Normalisations for a triple fusion, indexed `[q_cos][q_sin][n]`.
struct TripleTable {
    half_cos: f64,
    half_sin: f64,
    n_end: usize,
    norms: Vec<Vec<Vec<f64>>>,
}

impl TripleTable {
    fn new(cos_weight: usize, sin_weight: usize, n_end: usize) -> Self {
        let half_cos = (cos_weight as f64 - 1.0) / 2.0;
        let half_sin = (sin_weight as f64 - 1.0) / 2.0;
        let max_n = n_end.div_ceil(2);
        let norms = (0..n_end)
            .map(|qa| {
                (0..n_end)
                    .map(|qb| {
                        let a = qa as f64 + half_cos;
                        let b = qb as f64 + half_sin;
                        let scale = 2f64.powf((a + b) / 2.0 + 1.0);
                        (0..max_n).map(|k| scale * jacobi_norm(k, a, b)).collect()
                    })
                    .collect()
            })
            .collect();
        Self {
            half_cos,
            half_sin,
            n_end,
            norms,
        }
    }

    fn evaluate(
        &self,
        theta: f64,
        cos_kind: NodeKind,
        sin_kind: NodeKind,
        out: &mut Vec<Complex64>,
    ) {
        let (s, c, x) = (theta.sin(), theta.cos(), (2.0 * theta).cos());
        let max_n = self.n_end.div_ceil(2);
        let len_cos = axis_len(cos_kind, self.n_end);
        let len_sin = axis_len(sin_kind, self.n_end);
        for ia in 0..len_cos {
            let qa = quantum_number(cos_kind, ia, self.n_end).unsigned_abs() as usize;
            let a = qa as f64 + self.half_cos;
            for ib in 0..len_sin {
                let qb = quantum_number(sin_kind, ib, self.n_end).unsigned_abs() as usize;
                let b = qb as f64 + self.half_sin;
                // P^{(b, a)}: the sin side carries the (1 - x) weight
                let p = if qa + qb < self.n_end {
                    jacobi_all(max_n, b, a, x)
                } else {
                    Vec::new()
                };
                let lead = s.powi(qb as i32) * c.powi(qa as i32);
                for l in 0..self.n_end {
                    let value = match l.checked_sub(qa + qb) {
                        Some(rest) if rest % 2 == 0 => {
                            let k = rest / 2;
                            self.norms[qa][qb][k] * lead * p[k]
                        }
                        _ => 0.0,
                    };
                    out.push(Complex64::new(value, 0.0));
                }
            }
        }
    }
}
