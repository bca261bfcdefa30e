//! Polyspherical coordinate trees.
//!
//! A tree describes how the angles of S^{d-1} are built by repeatedly fusing
//! lower-dimensional spheres. Every angle node has a cos-side and a sin-side
//! child; each child is either a Cartesian leaf or another angle node. Which
//! children are subtrees fixes the node kind:
//!
//! | letter | cos child | sin child | kind                        | domain      |
//! |--------|-----------|-----------|-----------------------------|-------------|
//! | `a`    | leaf      | leaf      | azimuthal                   | [0, 2π)     |
//! | `b`    | leaf      | subtree   | polar fusion, sin side      | [0, π]      |
//! | `p`    | subtree   | leaf      | polar fusion, cos side (b′) | [−π/2, π/2] |
//! | `c`    | subtree   | subtree   | triple fusion               | [0, π/2]    |
//!
//! Nodes live in an arena indexed by [`NodeId`] in pre-order: the root is 0,
//! followed by its cos-side subtree, then its sin-side subtree.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;

use ndarray::{ArrayD, Axis, IxDyn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::ANGLE_TOLERANCE;
use crate::error::{HarmonicsError, Result};

/// Index of an angle node in the arena. Doubles as its core-axis position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// One of the two children of an angle node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Child {
    /// Cartesian coordinate index.
    Leaf(usize),
    Node(NodeId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Cos,
    Sin,
}

/// Node types. Fixed by the mathematics, so the set is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Azimuthal,
    /// One child is a subtree; `side` says which.
    PolarFusion { side: Side },
    TripleFusion,
}

impl NodeKind {
    /// Pre-order letter used by [`CoordinateTree::from_branching_types`].
    pub fn letter(self) -> char {
        match self {
            NodeKind::Azimuthal => 'a',
            NodeKind::PolarFusion { side: Side::Sin } => 'b',
            NodeKind::PolarFusion { side: Side::Cos } => 'p',
            NodeKind::TripleFusion => 'c',
        }
    }

    /// Number of quantum-number axes of the node's eigenfunction.
    pub fn n_axes(self) -> usize {
        match self {
            NodeKind::Azimuthal => 1,
            NodeKind::PolarFusion { .. } => 2,
            NodeKind::TripleFusion => 3,
        }
    }

    /// Angular domain `(low, high)`.
    pub fn domain(self) -> (f64, f64) {
        match self {
            NodeKind::Azimuthal => (0.0, TAU),
            NodeKind::PolarFusion { side: Side::Sin } => (0.0, PI),
            NodeKind::PolarFusion { side: Side::Cos } => (-FRAC_PI_2, FRAC_PI_2),
            NodeKind::TripleFusion => (0.0, FRAC_PI_2),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Azimuthal => write!(f, "azimuthal"),
            NodeKind::PolarFusion { side: Side::Sin } => write!(f, "polar-fusion(sin)"),
            NodeKind::PolarFusion { side: Side::Cos } => write!(f, "polar-fusion(cos)"),
            NodeKind::TripleFusion => write!(f, "triple-fusion"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub cos: Child,
    pub sin: Child,
    /// Dimension of the sub-sphere spanned by this node's subtree.
    pub weight: usize,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match (self.cos, self.sin) {
            (Child::Leaf(_), Child::Leaf(_)) => NodeKind::Azimuthal,
            (Child::Leaf(_), Child::Node(_)) => NodeKind::PolarFusion { side: Side::Sin },
            (Child::Node(_), Child::Leaf(_)) => NodeKind::PolarFusion { side: Side::Cos },
            (Child::Node(_), Child::Node(_)) => NodeKind::TripleFusion,
        }
    }

    pub fn child(&self, side: Side) -> Child {
        match side {
            Side::Cos => self.cos,
            Side::Sin => self.sin,
        }
    }
}

/// Arena-backed polyspherical coordinate tree. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordinateTree {
    nodes: Vec<Node>,
    n_leaves: usize,
}

impl CoordinateTree {
    /// S¹ with a single azimuthal angle.
    pub fn polar() -> Self {
        Self::build("a")
    }

    /// Classical S²: node 0 is θ (polar), node 1 is φ (azimuthal).
    pub fn spherical() -> Self {
        Self::build("ba")
    }

    /// Standard hyperspherical coordinates on S^{s_ndim}: a chain of polar
    /// fusions closed by one azimuthal angle.
    pub fn standard(s_ndim: usize) -> Result<Self> {
        if s_ndim == 0 {
            return Err(HarmonicsError::Topology(
                "standard coordinates need at least one angle".into(),
            ));
        }
        let mut types = "b".repeat(s_ndim - 1);
        types.push('a');
        Self::from_branching_types(&types)
    }

    /// Hopf coordinates on S^{2^q - 1}: balanced triple fusions.
    pub fn hopf(q: usize) -> Result<Self> {
        fn letters(q: usize) -> String {
            if q == 1 {
                "a".to_string()
            } else {
                let half = letters(q - 1);
                format!("c{half}{half}")
            }
        }
        if q == 0 || q > 8 {
            return Err(HarmonicsError::Topology(format!(
                "hopf order must be in 1..=8, got {q}"
            )));
        }
        Self::from_branching_types(&letters(q))
    }

    /// Random tree with `s_ndim` angle nodes.
    pub fn random(s_ndim: usize, rng: &mut impl Rng) -> Result<Self> {
        fn letters(count: usize, rng: &mut impl Rng, out: &mut String) {
            if count == 1 {
                out.push('a');
                return;
            }
            let cos_count = rng.random_range(0..count);
            let sin_count = count - 1 - cos_count;
            out.push(match (cos_count > 0, sin_count > 0) {
                (false, _) => 'b',
                (true, false) => 'p',
                (true, true) => 'c',
            });
            if cos_count > 0 {
                letters(cos_count, rng, out);
            }
            if sin_count > 0 {
                letters(sin_count, rng, out);
            }
        }
        if s_ndim == 0 {
            return Err(HarmonicsError::Topology(
                "a tree needs at least one angle".into(),
            ));
        }
        let mut types = String::with_capacity(s_ndim);
        letters(s_ndim, rng, &mut types);
        Self::from_branching_types(&types)
    }

    /// Parse a pre-order string of node letters (`a`, `b`, `p`, `c`).
    pub fn from_branching_types(types: &str) -> Result<Self> {
        let letters: Vec<char> = types.chars().collect();
        if letters.is_empty() {
            return Err(HarmonicsError::Topology("empty branching string".into()));
        }
        let mut builder = Builder {
            letters: &letters,
            pos: 0,
            nodes: Vec::with_capacity(letters.len()),
            n_leaves: 0,
        };
        builder.node(None)?;
        if builder.pos != letters.len() {
            return Err(HarmonicsError::Topology(format!(
                "trailing input after position {} in '{types}'",
                builder.pos
            )));
        }
        let tree = Self {
            nodes: builder.nodes,
            n_leaves: builder.n_leaves,
        };
        tree.validate()?;
        tracing::trace!(types, s_ndim = tree.len(), "built coordinate tree");
        Ok(tree)
    }

    // Only for literals known to parse.
    fn build(types: &str) -> Self {
        match Self::from_branching_types(types) {
            Ok(tree) => tree,
            Err(e) => unreachable!("built-in tree '{types}' is invalid: {e}"),
        }
    }

    /// Re-check arena invariants: links, pre-order ids, weights, leaves.
    pub fn validate(&self) -> Result<()> {
        let root = self
            .nodes
            .first()
            .ok_or_else(|| HarmonicsError::Topology("tree has no nodes".into()))?;
        if root.parent.is_some() {
            return Err(HarmonicsError::Topology("root has a parent".into()));
        }
        let mut seen_leaves = vec![false; self.n_leaves];
        for (i, node) in self.nodes.iter().enumerate() {
            let mut expected_weight = 1;
            for child in [node.cos, node.sin] {
                match child {
                    Child::Leaf(k) => {
                        let slot = seen_leaves.get_mut(k).ok_or_else(|| {
                            HarmonicsError::Topology(format!("leaf index {k} out of range"))
                        })?;
                        if *slot {
                            return Err(HarmonicsError::Topology(format!(
                                "leaf index {k} used twice"
                            )));
                        }
                        *slot = true;
                    }
                    Child::Node(c) => {
                        let child_node = self.nodes.get(c.0).ok_or_else(|| {
                            HarmonicsError::Topology(format!("child {} out of range", c.0))
                        })?;
                        if c.0 <= i || child_node.parent != Some(NodeId(i)) {
                            return Err(HarmonicsError::Topology(format!(
                                "node {} is not a pre-order child of {i}",
                                c.0
                            )));
                        }
                        expected_weight += child_node.weight;
                    }
                }
            }
            if node.weight != expected_weight {
                return Err(HarmonicsError::Topology(format!(
                    "node {i} has weight {} but its subtree spans {expected_weight}",
                    node.weight
                )));
            }
        }
        if seen_leaves.iter().any(|s| !s) {
            return Err(HarmonicsError::Topology("unused Cartesian leaf".into()));
        }
        if root.weight != self.nodes.len() || self.n_leaves != root.weight + 1 {
            return Err(HarmonicsError::Topology(format!(
                "root weight {} inconsistent with ambient dimension {}",
                root.weight, self.n_leaves
            )));
        }
        Ok(())
    }

    /// Number of angle nodes, i.e. the dimension of the sphere.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ambient Cartesian dimension d.
    pub fn c_ndim(&self) -> usize {
        self.n_leaves
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind()
    }

    /// Sub-sphere dimension below a child (0 for a leaf).
    pub fn child_weight(&self, child: Child) -> usize {
        match child {
            Child::Leaf(_) => 0,
            Child::Node(id) => self.nodes[id.0].weight,
        }
    }

    /// Pre-order letters; the tree's identity for display and serialisation.
    pub fn branching_types(&self) -> String {
        self.nodes.iter().map(|n| n.kind().letter()).collect()
    }

    pub fn angle_domain(&self, id: NodeId) -> (f64, f64) {
        self.kind(id).domain()
    }

    /// Fail with a domain error if any angle lies outside the node's range.
    pub fn check_angle(&self, id: NodeId, angles: &ArrayD<f64>) -> Result<()> {
        let (low, high) = self.angle_domain(id);
        match angles
            .iter()
            .find(|a| !(**a >= low - ANGLE_TOLERANCE && **a <= high + ANGLE_TOLERANCE))
        {
            Some(&value) => Err(HarmonicsError::Domain {
                node: id.0,
                value,
                low,
                high,
            }),
            None => Ok(()),
        }
    }

    /// Map per-node angles (broadcast batch) to Cartesian coordinates on the
    /// unit sphere. Returns one array per leaf, in leaf order.
    pub fn to_cartesian(&self, angles: &[ArrayD<f64>]) -> Result<Vec<ArrayD<f64>>> {
        if angles.len() != self.len() {
            return Err(HarmonicsError::Shape(format!(
                "expected {} angle arrays, got {}",
                self.len(),
                angles.len()
            )));
        }
        let shapes: Vec<&[usize]> = angles.iter().map(|a| a.shape()).collect();
        crate::assemble::broadcast_shapes(&shapes)?;

        let mut out: Vec<Option<ArrayD<f64>>> = vec![None; self.n_leaves];
        let mut stack = vec![(self.root(), ArrayD::from_elem(IxDyn(&[]), 1.0))];
        while let Some((id, scale)) = stack.pop() {
            let theta = &angles[id.0];
            let node = self.node(id);
            for (child, factor) in [
                (node.cos, &scale * &theta.mapv(f64::cos)),
                (node.sin, &scale * &theta.mapv(f64::sin)),
            ] {
                match child {
                    Child::Leaf(k) => out[k] = Some(factor),
                    Child::Node(c) => stack.push((c, factor)),
                }
            }
        }
        out.into_iter()
            .enumerate()
            .map(|(k, v)| {
                v.ok_or_else(|| HarmonicsError::Topology(format!("leaf {k} never reached")))
            })
            .collect()
    }

    /// Inverse of [`to_cartesian`](Self::to_cartesian) for points with a
    /// trailing axis of length d. The radius is discarded.
    pub fn from_cartesian(&self, points: &ArrayD<f64>) -> Result<Vec<ArrayD<f64>>> {
        let last = points.ndim().checked_sub(1).ok_or_else(|| {
            HarmonicsError::Shape("points need a trailing coordinate axis".into())
        })?;
        if points.shape()[last] != self.n_leaves {
            return Err(HarmonicsError::Shape(format!(
                "points have {} coordinates, tree expects {}",
                points.shape()[last],
                self.n_leaves
            )));
        }
        let leaves: Vec<(Vec<usize>, Vec<usize>)> = self
            .nodes
            .iter()
            .map(|n| (self.leaves_under(n.cos), self.leaves_under(n.sin)))
            .collect();

        Ok(self
            .ids()
            .map(|id| {
                let (cos_leaves, sin_leaves) = &leaves[id.0];
                let kind = self.kind(id);
                points.map_axis(Axis(last), |x| {
                    let radius = |ks: &[usize]| ks.iter().map(|&k| x[k] * x[k]).sum::<f64>().sqrt();
                    match kind {
                        NodeKind::Azimuthal => {
                            x[sin_leaves[0]].atan2(x[cos_leaves[0]]).rem_euclid(TAU)
                        }
                        NodeKind::PolarFusion { side: Side::Sin } => {
                            radius(sin_leaves.as_slice()).atan2(x[cos_leaves[0]])
                        }
                        NodeKind::PolarFusion { side: Side::Cos } => {
                            x[sin_leaves[0]].atan2(radius(cos_leaves.as_slice()))
                        }
                        NodeKind::TripleFusion => {
                            radius(sin_leaves.as_slice()).atan2(radius(cos_leaves.as_slice()))
                        }
                    }
                })
            })
            .collect())
    }

    /// Cartesian leaf indices below a child.
    pub fn leaves_under(&self, child: Child) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![child];
        while let Some(c) = stack.pop() {
            match c {
                Child::Leaf(k) => out.push(k),
                Child::Node(id) => {
                    let node = self.node(id);
                    stack.push(node.sin);
                    stack.push(node.cos);
                }
            }
        }
        out
    }
}

impl fmt::Display for CoordinateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (S^{})", self.branching_types(), self.len())
    }
}

struct Builder<'a> {
    letters: &'a [char],
    pos: usize,
    nodes: Vec<Node>,
    n_leaves: usize,
}

impl Builder<'_> {
    fn node(&mut self, parent: Option<NodeId>) -> Result<NodeId> {
        let letter = self.letters.get(self.pos).copied().ok_or_else(|| {
            HarmonicsError::Topology(format!("branching string truncated at {}", self.pos))
        })?;
        self.pos += 1;
        let (cos_subtree, sin_subtree) = match letter {
            'a' => (false, false),
            'b' => (false, true),
            'p' => (true, false),
            'c' => (true, true),
            other => {
                return Err(HarmonicsError::Topology(format!(
                    "unknown branching type '{other}'"
                )));
            }
        };

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            cos: Child::Leaf(usize::MAX),
            sin: Child::Leaf(usize::MAX),
            weight: 1,
        });
        let cos = self.child(id, cos_subtree)?;
        let sin = self.child(id, sin_subtree)?;
        let weight = 1 + self.weight(cos) + self.weight(sin);
        let node = &mut self.nodes[id.0];
        node.cos = cos;
        node.sin = sin;
        node.weight = weight;
        Ok(id)
    }

    fn child(&mut self, parent: NodeId, subtree: bool) -> Result<Child> {
        if subtree {
            Ok(Child::Node(self.node(Some(parent))?))
        } else {
            self.n_leaves += 1;
            Ok(Child::Leaf(self.n_leaves - 1))
        }
    }

    fn weight(&self, child: Child) -> usize {
        match child {
            Child::Leaf(_) => 0,
            Child::Node(id) => self.nodes[id.0].weight,
        }
    }
}

/// Standard normal sample via Box-Muller.
fn gauss_random(rng: &mut impl Rng) -> f64 {
    // Clamp u1 away from 0 to avoid ln(0) = -inf
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// `count` points uniformly distributed on S^{d-1}, shape `[count, d]`.
pub fn random_sphere_points(c_ndim: usize, count: usize, rng: &mut impl Rng) -> ArrayD<f64> {
    let mut points = ArrayD::zeros(IxDyn(&[count, c_ndim]));
    for mut row in points.outer_iter_mut() {
        loop {
            row.mapv_inplace(|_| gauss_random(rng));
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > crate::constants::EPSILON {
                row.mapv_inplace(|v| v / norm);
                break;
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn test_spherical_layout() {
        let tree = CoordinateTree::spherical();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.c_ndim(), 3);
        assert_eq!(tree.kind(NodeId(0)), NodeKind::PolarFusion { side: Side::Sin });
        assert_eq!(tree.kind(NodeId(1)), NodeKind::Azimuthal);
        assert_eq!(tree.node(NodeId(1)).parent, Some(NodeId(0)));
        assert_eq!(tree.node(NodeId(0)).weight, 2);
    }

    #[test]
    fn test_named_constructors() {
        assert_eq!(CoordinateTree::polar().branching_types(), "a");
        assert_eq!(CoordinateTree::standard(4).unwrap().branching_types(), "bbba");
        assert_eq!(CoordinateTree::hopf(2).unwrap().branching_types(), "caa");
        assert_eq!(CoordinateTree::hopf(3).unwrap().branching_types(), "ccaacaa");
        assert_eq!(CoordinateTree::hopf(3).unwrap().c_ndim(), 8);
    }

    #[test]
    fn test_reject_bad_strings() {
        for bad in ["", "b", "aa", "x", "cab"] {
            assert!(
                matches!(
                    CoordinateTree::from_branching_types(bad),
                    Err(HarmonicsError::Topology(_))
                ),
                "'{bad}' should be rejected"
            );
        }
        assert!(CoordinateTree::standard(0).is_err());
        assert!(CoordinateTree::hopf(0).is_err());
    }

    #[test]
    fn test_validate_detects_bad_weight() {
        let mut tree = CoordinateTree::spherical();
        tree.nodes[0].weight = 5;
        assert!(matches!(tree.validate(), Err(HarmonicsError::Topology(_))));
    }

    #[test]
    fn test_random_trees_are_valid() {
        let mut rng = rng();
        for s_ndim in 1..8 {
            let tree = CoordinateTree::random(s_ndim, &mut rng).unwrap();
            assert_eq!(tree.len(), s_ndim);
            assert_eq!(tree.c_ndim(), s_ndim + 1);
            tree.validate().unwrap();
        }
    }

    #[test]
    fn test_to_cartesian_unit_norm() {
        let tree = CoordinateTree::from_branching_types("cpaba").unwrap();
        let angles: Vec<ArrayD<f64>> = tree
            .ids()
            .map(|id| {
                let (lo, hi) = tree.kind(id).domain();
                arr1(&[lo + 0.3 * (hi - lo), lo + 0.8 * (hi - lo)]).into_dyn()
            })
            .collect();
        let x = tree.to_cartesian(&angles).unwrap();
        for i in 0..2 {
            let norm: f64 = x.iter().map(|c| c[[i]] * c[[i]]).sum();
            assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cartesian_roundtrip() {
        let mut rng = rng();
        for types in ["ba", "bpa", "caa", "cbaa", "pba"] {
            let tree = CoordinateTree::from_branching_types(types).unwrap();
            let points = random_sphere_points(tree.c_ndim(), 16, &mut rng);
            let angles = tree.from_cartesian(&points).unwrap();
            for id in tree.ids() {
                tree.check_angle(id, &angles[id.0]).unwrap();
            }
            let back = tree.to_cartesian(&angles).unwrap();
            for (k, coord) in back.iter().enumerate() {
                for i in 0..16 {
                    assert_abs_diff_eq!(coord[[i]], points[[i, k]], epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_check_angle() {
        let tree = CoordinateTree::spherical();
        assert!(tree.check_angle(NodeId(0), &arr1(&[0.0, PI]).into_dyn()).is_ok());
        let err = tree
            .check_angle(NodeId(0), &arr1(&[0.5, 3.5]).into_dyn())
            .unwrap_err();
        assert!(matches!(err, HarmonicsError::Domain { node: 0, .. }));
        assert!(tree.check_angle(NodeId(1), &arr1(&[f64::NAN]).into_dyn()).is_err());
    }

    #[test]
    fn test_leaves_under() {
        let tree = CoordinateTree::hopf(2).unwrap();
        let root = tree.node(tree.root());
        assert_eq!(tree.leaves_under(root.cos), vec![0, 1]);
        assert_eq!(tree.leaves_under(root.sin), vec![2, 3]);
    }
}
