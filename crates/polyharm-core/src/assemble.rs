//! Broadcast assembly of per-node arrays into the over-complete basis.
//!
//! Core axis k of the assembled array belongs to node k. Batch axes are
//! right-aligned across nodes and broadcast with the usual rules.

use ndarray::{ArrayD, Axis, IxDyn};
use num_complex::Complex64;

use crate::constants::MAX_BLOCK_LEN;
use crate::eigen::PerNodeArray;
use crate::error::{HarmonicsError, Result};

/// Element count of `shape`. Fails on `usize` overflow or when the count
/// exceeds [`MAX_BLOCK_LEN`].
pub fn block_len(shape: &[usize]) -> Result<usize> {
    let len = shape
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| HarmonicsError::Shape(format!("shape {shape:?} overflows usize")))?;
    if len > MAX_BLOCK_LEN {
        return Err(HarmonicsError::Shape(format!(
            "shape {shape:?} holds {len} elements, more than {MAX_BLOCK_LEN}"
        )));
    }
    Ok(len)
}

/// Broadcast shape of several arrays, right-aligned.
pub fn broadcast_shapes(shapes: &[&[usize]]) -> Result<Vec<usize>> {
    let ndim = shapes.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut out = vec![1; ndim];
    for shape in shapes {
        let offset = ndim - shape.len();
        for (i, &len) in shape.iter().enumerate() {
            let slot = &mut out[offset + i];
            if *slot == 1 {
                *slot = len;
            } else if len != 1 && len != *slot {
                return Err(HarmonicsError::Shape(format!(
                    "cannot broadcast shapes {shapes:?}"
                )));
            }
        }
    }
    block_len(&out)?;
    Ok(out)
}

/// Reshape one node's array to `batch_ndim` batch axes followed by one axis
/// per tree node, singleton where the node does not depend on it.
pub fn expand_to_global(
    array: &PerNodeArray,
    batch_ndim: usize,
    n_nodes: usize,
) -> Result<ArrayD<Complex64>> {
    let own_batch = array.values.ndim() - array.axes.len();
    if own_batch > batch_ndim {
        return Err(HarmonicsError::Shape(format!(
            "node {} has {own_batch} batch axes, expected at most {batch_ndim}",
            array.node.0
        )));
    }
    let mut view = array.values.view();
    for _ in own_batch..batch_ndim {
        view.insert_axis_inplace(Axis(0));
    }

    let mut owners: Vec<usize> = array.axes.iter().map(|id| id.0).collect();
    for k in 0..n_nodes {
        if !owners.contains(&k) {
            owners.push(k);
            view.insert_axis_inplace(Axis(view.ndim()));
        }
    }

    let mut perm: Vec<usize> = (0..batch_ndim).collect();
    for k in 0..n_nodes {
        let pos = owners.iter().position(|&o| o == k).ok_or_else(|| {
            HarmonicsError::Shape(format!("node {k} missing from axis owners"))
        })?;
        perm.push(batch_ndim + pos);
    }
    Ok(view.permuted_axes(IxDyn(&perm)).to_owned())
}

/// Elementwise product of all per-node arrays on the global axis set.
pub fn assemble(arrays: &[PerNodeArray], n_nodes: usize) -> Result<ArrayD<Complex64>> {
    let batch_ndim = arrays
        .iter()
        .map(|a| a.values.ndim() - a.axes.len())
        .max()
        .unwrap_or(0);
    let expanded = arrays
        .iter()
        .map(|a| expand_to_global(a, batch_ndim, n_nodes))
        .collect::<Result<Vec<_>>>()?;
    let shapes: Vec<&[usize]> = expanded.iter().map(|a| a.shape()).collect();
    let shape = broadcast_shapes(&shapes)?;
    tracing::trace!(?shape, nodes = arrays.len(), "assembling basis");

    let mut acc = ArrayD::from_elem(IxDyn(&[]), Complex64::new(1.0, 0.0));
    for array in &expanded {
        acc = &acc * array;
    }
    Ok(acc)
}
