//! Admissibility and the structured/flattened index codec.
//!
//! The structured core block has one axis per node (node k on axis k). The
//! flattened layout keeps only admissible assignments, ordered by total
//! degree and then by row-major position in the structured block.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::assemble::block_len;
use crate::eigen::{axis_len, check_degree, quantum_number};
use crate::error::{HarmonicsError, Result};
use crate::ndim::n_end_from_size;
use crate::tree::{Child, CoordinateTree, NodeKind};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Structured,
    #[default]
    Flattened,
}

/// Whether a signed quantum-number assignment (one per node) is admissible.
///
/// Evaluated as a single conjunction over every node.
pub fn is_admissible(tree: &CoordinateTree, qn: &[i64]) -> bool {
    let q = |child: Child| match child {
        Child::Node(id) => qn[id.0].abs(),
        Child::Leaf(_) => 0,
    };
    tree.ids().all(|id| {
        let node = tree.node(id);
        let l = qn[id.0];
        match tree.kind(id) {
            NodeKind::Azimuthal => true,
            NodeKind::PolarFusion { side } => q(node.child(side)) <= l,
            NodeKind::TripleFusion => {
                let rest = l - q(node.cos) - q(node.sin);
                rest >= 0 && rest % 2 == 0
            }
        }
    })
}

/// Precomputed index tables for one (tree, n_end).
#[derive(Clone, Debug)]
pub struct IndexLayout {
    n_end: usize,
    core_shape: Vec<usize>,
    kinds: Vec<NodeKind>,
    mask: Vec<bool>,
    /// Structured linear position of each flattened index.
    order: Vec<usize>,
    degrees: Vec<usize>,
}

impl IndexLayout {
    pub fn new(tree: &CoordinateTree, n_end: usize) -> Result<Self> {
        check_degree(n_end)?;
        let kinds: Vec<NodeKind> = tree.ids().map(|id| tree.kind(id)).collect();
        let core_shape: Vec<usize> = kinds.iter().map(|&k| axis_len(k, n_end)).collect();
        let size = block_len(&core_shape)?;

        let mut mask = vec![false; size];
        let mut entries: Vec<(usize, usize)> = Vec::new();
        let mut idx = vec![0usize; core_shape.len()];
        let mut qn = vec![0i64; core_shape.len()];
        for (linear, slot) in mask.iter_mut().enumerate() {
            for (k, q) in qn.iter_mut().enumerate() {
                *q = quantum_number(kinds[k], idx[k], n_end);
            }
            if is_admissible(tree, &qn) {
                *slot = true;
                entries.push((qn[0].unsigned_abs() as usize, linear));
            }
            increment(&mut idx, &core_shape);
        }
        entries.sort();
        let (degrees, order): (Vec<usize>, Vec<usize>) = entries.into_iter().unzip();
        tracing::debug!(
            tree = %tree.branching_types(),
            n_end,
            structured = size,
            flattened = order.len(),
            "built index layout"
        );
        Ok(Self {
            n_end,
            core_shape,
            kinds,
            mask,
            order,
            degrees,
        })
    }

    pub fn n_end(&self) -> usize {
        self.n_end
    }

    pub fn core_shape(&self) -> &[usize] {
        &self.core_shape
    }

    /// Number of admissible basis functions.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Total degree per flattened index (non-decreasing).
    pub fn degrees(&self) -> &[usize] {
        &self.degrees
    }

    /// Signed quantum number of every node, per flattened index.
    pub fn quantum_numbers(&self) -> Vec<Vec<i64>> {
        self.order
            .iter()
            .map(|&linear| {
                let mut rem = linear;
                let mut qn = vec![0i64; self.core_shape.len()];
                for k in (0..self.core_shape.len()).rev() {
                    qn[k] = quantum_number(self.kinds[k], rem % self.core_shape[k], self.n_end);
                    rem /= self.core_shape[k];
                }
                qn
            })
            .collect()
    }

    /// Length of the flattened prefix holding degrees below `n_end`.
    pub fn cut_len(&self, n_end: usize) -> usize {
        self.degrees.partition_point(|&d| d < n_end)
    }

    fn split_core(&self, shape: &[usize], core: &[usize]) -> Result<(Vec<usize>, usize)> {
        let k = core.len();
        if shape.len() < k || shape[shape.len() - k..] != *core {
            return Err(HarmonicsError::Shape(format!(
                "array of shape {shape:?} does not end with core shape {core:?}"
            )));
        }
        let batch = shape[..shape.len() - k].to_vec();
        let batch_len = batch.iter().product();
        Ok((batch, batch_len))
    }

    /// Structured `batch ++ core` to flattened `batch ++ [len]`.
    pub fn flatten<T: Clone>(&self, array: &ArrayD<T>) -> Result<ArrayD<T>> {
        let (batch, batch_len) = self.split_core(array.shape(), &self.core_shape)?;
        let size = self.mask.len();
        let rows = array
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((batch_len, size))?;
        let mut data = Vec::with_capacity(batch_len * self.order.len());
        for row in rows.outer_iter() {
            data.extend(self.order.iter().map(|&i| row[i].clone()));
        }
        let mut shape = batch;
        shape.push(self.order.len());
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
    }

    /// Flattened `batch ++ [len]` to structured `batch ++ core`, filling
    /// inadmissible positions with `T::default()`.
    pub fn unflatten<T: Clone + Default>(&self, array: &ArrayD<T>) -> Result<ArrayD<T>> {
        let (batch, batch_len) = self.split_core(array.shape(), &[self.order.len()])?;
        let rows = array
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((batch_len, self.order.len()))?;
        let size = self.mask.len();
        let total = batch_len.checked_mul(size).ok_or_else(|| {
            HarmonicsError::Shape(format!(
                "{batch_len} x {size} structured entries overflow usize"
            ))
        })?;
        let mut data = vec![T::default(); total];
        for (b, row) in rows.outer_iter().enumerate() {
            for (&linear, value) in self.order.iter().zip(row.iter()) {
                data[b * size + linear] = value.clone();
            }
        }
        let mut shape = batch;
        shape.extend_from_slice(&self.core_shape);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
    }

    /// Reset inadmissible structured positions to `T::default()`.
    pub fn mask_structured<T: Clone + Default>(&self, array: &mut ArrayD<T>) -> Result<()> {
        self.split_core(array.shape(), &self.core_shape)?;
        let size = self.mask.len();
        let mut standard = array.as_standard_layout().into_owned();
        if let Some(slice) = standard.as_slice_mut() {
            for (i, value) in slice.iter_mut().enumerate() {
                if !self.mask[i % size] {
                    *value = T::default();
                }
            }
        }
        *array = standard;
        Ok(())
    }
}

fn increment(idx: &mut [usize], shape: &[usize]) {
    for k in (0..idx.len()).rev() {
        idx[k] += 1;
        if idx[k] < shape[k] {
            return;
        }
        idx[k] = 0;
    }
}

/// Infer `n_end` from the trailing axes of an array in the given layout.
pub fn assume_n_end(tree: &CoordinateTree, shape: &[usize], layout: Layout) -> Result<usize> {
    match layout {
        Layout::Flattened => {
            let size = *shape
                .last()
                .ok_or_else(|| HarmonicsError::Shape("array has no axes".into()))?;
            n_end_from_size(size, tree.c_ndim())
        }
        Layout::Structured => {
            let k = tree.len();
            if shape.len() < k {
                return Err(HarmonicsError::Shape(format!(
                    "array of shape {shape:?} has fewer than {k} core axes"
                )));
            }
            let core = &shape[shape.len() - k..];
            let n_end = match tree.kind(tree.root()) {
                NodeKind::Azimuthal => core[0].div_ceil(2),
                _ => core[0],
            };
            let expected: Vec<usize> = tree.ids().map(|id| axis_len(tree.kind(id), n_end)).collect();
            if core != expected.as_slice() {
                return Err(HarmonicsError::Shape(format!(
                    "core shape {core:?} does not match {expected:?} for n_end {n_end}"
                )));
            }
            Ok(n_end)
        }
    }
}
