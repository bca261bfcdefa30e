//! Tensor-product quadrature over S^{d-1}.
//!
//! Each node gets a one-dimensional rule for its own measure; the sphere rule
//! is their outer product, with node k varying along grid axis k.

use std::f64::consts::PI;

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use statrs::function::gamma::ln_gamma;

use crate::assemble::block_len;
use crate::error::{HarmonicsError, Result};
use crate::tree::{CoordinateTree, NodeId, NodeKind, Side};

/// One node's points (angles) and weights.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeRule {
    pub points: Vec<f64>,
    pub weights: Vec<f64>,
}

impl NodeRule {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct QuadratureRule {
    rules: Vec<NodeRule>,
}

impl QuadratureRule {
    /// Rule exact for products of two basis functions of degree < n.
    pub fn new(tree: &CoordinateTree, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(HarmonicsError::Degree(
                "quadrature needs at least one point per node".into(),
            ));
        }
        let rules = tree
            .ids()
            .map(|id| node_rule(tree, id, n))
            .collect::<Vec<_>>();
        let grid: Vec<usize> = rules.iter().map(NodeRule::len).collect();
        let points = block_len(&grid)?;
        tracing::debug!(tree = %tree.branching_types(), n, points, "built quadrature rule");
        Ok(Self { rules })
    }

    pub fn node(&self, id: NodeId) -> &NodeRule {
        &self.rules[id.0]
    }

    pub fn grid_shape(&self) -> Vec<usize> {
        self.rules.iter().map(NodeRule::len).collect()
    }

    /// Per-node angles shaped `[1, .., n_k, .., 1]`, broadcastable to the grid.
    pub fn grid_angles(&self) -> Vec<ArrayD<f64>> {
        let ndim = self.rules.len();
        self.rules
            .iter()
            .enumerate()
            .map(|(k, rule)| {
                let mut shape = vec![1; ndim];
                shape[k] = rule.len();
                ArrayD::from_shape_vec(IxDyn(&shape), rule.points.clone())
                    .unwrap_or_else(|_| unreachable!("shape holds exactly the rule points"))
            })
            .collect()
    }

    /// Per-node angles materialised to the full grid shape.
    pub fn full_grid_angles(&self) -> Vec<ArrayD<f64>> {
        let shape = self.grid_shape();
        self.grid_angles()
            .into_iter()
            .map(|a| match a.broadcast(IxDyn(&shape)) {
                Some(view) => view.to_owned(),
                None => unreachable!("grid axes broadcast to the grid shape"),
            })
            .collect()
    }

    /// Outer product of node weights on the grid.
    pub fn grid_weights(&self) -> ArrayD<f64> {
        let mut acc = vec![1.0];
        for rule in &self.rules {
            acc = acc
                .iter()
                .flat_map(|a| rule.weights.iter().map(move |w| a * w))
                .collect();
        }
        ArrayD::from_shape_vec(IxDyn(&self.grid_shape()), acc)
            .unwrap_or_else(|_| unreachable!("outer product fills the grid"))
    }

    /// Weighted sum over the leading grid axes of `values`
    /// (shape `grid ++ extra`), leaving `extra`.
    pub fn integrate(&self, values: &ArrayD<Complex64>) -> Result<ArrayD<Complex64>> {
        let grid = self.grid_shape();
        if values.ndim() < grid.len() || values.shape()[..grid.len()] != grid[..] {
            return Err(HarmonicsError::Shape(format!(
                "values of shape {:?} do not start with grid shape {grid:?}",
                values.shape()
            )));
        }
        let extra = values.shape()[grid.len()..].to_vec();
        let n_points: usize = grid.iter().product();
        let n_extra: usize = extra.iter().product();
        let weights = self.grid_weights();
        let flat = values
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((n_points, n_extra))?;
        let mut out = vec![Complex64::new(0.0, 0.0); n_extra];
        for (row, w) in flat.outer_iter().zip(weights.iter()) {
            for (o, v) in out.iter_mut().zip(row.iter()) {
                *o += *v * *w;
            }
        }
        Ok(ArrayD::from_shape_vec(IxDyn(&extra), out)?)
    }
}

fn node_rule(tree: &CoordinateTree, id: NodeId, n: usize) -> NodeRule {
    let node = tree.node(id);
    match tree.kind(id) {
        NodeKind::Azimuthal => {
            let count = 2 * n;
            NodeRule {
                points: (0..count).map(|j| PI * j as f64 / n as f64).collect(),
                weights: vec![PI / n as f64; count],
            }
        }
        NodeKind::PolarFusion { side } => {
            let w_child = tree.child_weight(node.child(side));
            let alpha = (w_child as f64 - 1.0) / 2.0;
            let (x, weights) = gauss_jacobi(n, alpha, alpha);
            let points = x
                .iter()
                .map(|&x| match side {
                    Side::Sin => x.clamp(-1.0, 1.0).acos(),
                    Side::Cos => x.clamp(-1.0, 1.0).asin(),
                })
                .collect();
            NodeRule { points, weights }
        }
        NodeKind::TripleFusion => {
            let alpha = (tree.child_weight(node.sin) as f64 - 1.0) / 2.0;
            let beta = (tree.child_weight(node.cos) as f64 - 1.0) / 2.0;
            let (x, w) = gauss_jacobi(n, alpha, beta);
            let scale = 2f64.powf(-(alpha + beta)) / 4.0;
            NodeRule {
                points: x.iter().map(|&x| x.clamp(-1.0, 1.0).acos() / 2.0).collect(),
                weights: w.iter().map(|w| w * scale).collect(),
            }
        }
    }
}

/// n-point Gauss-Jacobi rule for (1-x)^a (1+x)^b on [-1, 1], by Golub-Welsch.
/// Nodes ascending.
pub fn gauss_jacobi(n: usize, a: f64, b: f64) -> (Vec<f64>, Vec<f64>) {
    let ab = a + b;
    let mut jacobi = DMatrix::<f64>::zeros(n, n);
    for k in 0..n {
        let kf = k as f64;
        jacobi[(k, k)] = if k == 0 {
            (b - a) / (ab + 2.0)
        } else {
            (b * b - a * a) / ((2.0 * kf + ab) * (2.0 * kf + ab + 2.0))
        };
    }
    for k in 1..n {
        let kf = k as f64;
        let off = if k == 1 {
            (4.0 * (1.0 + a) * (1.0 + b) / ((2.0 + ab).powi(2) * (3.0 + ab))).sqrt()
        } else {
            let c = 2.0 * kf + ab;
            (4.0 * kf * (kf + a) * (kf + b) * (kf + ab) / (c * c * (c + 1.0) * (c - 1.0))).sqrt()
        };
        jacobi[(k - 1, k)] = off;
        jacobi[(k, k - 1)] = off;
    }

    let mu0 = ((ab + 1.0) * std::f64::consts::LN_2 + ln_gamma(a + 1.0) + ln_gamma(b + 1.0)
        - ln_gamma(ab + 2.0))
    .exp();
    let eigen = SymmetricEigen::new(jacobi);
    let mut pairs: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let v0 = eigen.eigenvectors[(0, i)];
            (eigen.eigenvalues[i], mu0 * v0 * v0)
        })
        .collect();
    pairs.sort_by(|x, y| x.0.total_cmp(&y.0));
    pairs.into_iter().unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Area of S^{d-1}: 2 π^{d/2} / Γ(d/2).
    fn sphere_area(c_ndim: usize) -> f64 {
        let h = c_ndim as f64 / 2.0;
        2.0 * PI.powf(h) / statrs::function::gamma::gamma(h)
    }

    #[test]
    fn test_gauss_legendre_three_points() {
        let (x, w) = gauss_jacobi(3, 0.0, 0.0);
        let r = (3.0f64 / 5.0).sqrt();
        assert_abs_diff_eq!(x[0], -r, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], r, epsilon = 1e-12);
        assert_abs_diff_eq!(w[0], 5.0 / 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[1], 8.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gauss_jacobi_exactness() {
        let (a, b) = (1.0, 2.0);
        let (x, w) = gauss_jacobi(4, a, b);
        let quad: f64 = x.iter().zip(&w).map(|(x, w)| w * x.powi(4)).sum();
        // (1-x)(1+x)^2 = 1 + x - x^2 - x^3; times x^4, odd terms vanish
        let exact = 2.0 / 5.0 - 2.0 / 7.0;
        assert_abs_diff_eq!(quad, exact, epsilon = 1e-12);
    }

    #[test]
    fn test_weights_sum_to_sphere_area() {
        for types in ["a", "ba", "bba", "caa", "bpa", "cbaa"] {
            let tree = CoordinateTree::from_branching_types(types).unwrap();
            let rule = QuadratureRule::new(&tree, 3).unwrap();
            let total: f64 = rule.grid_weights().sum();
            assert_abs_diff_eq!(total, sphere_area(tree.c_ndim()), epsilon = 1e-10);
        }
    }

    #[test]
    fn test_points_inside_domains() {
        let tree = CoordinateTree::from_branching_types("cpaba").unwrap();
        let rule = QuadratureRule::new(&tree, 5).unwrap();
        for id in tree.ids() {
            let points = ndarray::Array1::from(rule.node(id).points.clone()).into_dyn();
            tree.check_angle(id, &points).unwrap();
        }
        assert_eq!(rule.grid_shape(), vec![5, 5, 10, 5, 10]);
    }

    #[test]
    fn test_integrate_constant() {
        let tree = CoordinateTree::spherical();
        let rule = QuadratureRule::new(&tree, 4).unwrap();
        let ones = ArrayD::from_elem(IxDyn(&[4, 8, 2]), Complex64::new(1.0, 0.0));
        let out = rule.integrate(&ones).unwrap();
        assert_eq!(out.shape(), &[2]);
        assert_abs_diff_eq!(out[[0]].re, 4.0 * PI, epsilon = 1e-10);
    }

    #[test]
    fn test_integrate_rejects_wrong_shape() {
        let tree = CoordinateTree::spherical();
        let rule = QuadratureRule::new(&tree, 4).unwrap();
        let bad = ArrayD::from_elem(IxDyn(&[3, 8]), Complex64::new(1.0, 0.0));
        assert!(matches!(rule.integrate(&bad), Err(HarmonicsError::Shape(_))));
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let tree = CoordinateTree::hopf(6).unwrap();
        assert!(matches!(
            QuadratureRule::new(&tree, 4),
            Err(HarmonicsError::Shape(_))
        ));
    }

    #[test]
    fn test_zero_points_rejected() {
        let tree = CoordinateTree::spherical();
        assert!(matches!(
            QuadratureRule::new(&tree, 0),
            Err(HarmonicsError::Degree(_))
        ));
    }
}
