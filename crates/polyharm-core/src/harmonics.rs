//! Public entry point: the full harmonic basis at a batch of points.

use ndarray::ArrayD;
use num_complex::Complex64;

use crate::assemble::assemble;
use crate::eigen::{PerNodeArray, check_degree, evaluate_node};
use crate::error::{HarmonicsError, Result};
use crate::layout::{IndexLayout, Layout};
use crate::phase::Phase;
use crate::tree::CoordinateTree;

/// Evaluation options threaded through every call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HarmonicsConfig {
    pub n_end: usize,
    pub phase: Phase,
    pub layout: Layout,
    /// Reject angles outside their node's domain.
    pub check_domain: bool,
}

impl HarmonicsConfig {
    pub fn new(n_end: usize) -> Self {
        Self {
            n_end,
            phase: Phase::NONE,
            layout: Layout::Flattened,
            check_domain: true,
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_check_domain(mut self, check: bool) -> Self {
        self.check_domain = check;
        self
    }
}

/// Basis values tagged with everything needed to interpret the core axes.
#[derive(Clone, Debug)]
pub struct HarmonicBasis {
    pub tree: CoordinateTree,
    pub n_end: usize,
    pub phase: Phase,
    pub layout: Layout,
    /// `batch ++ core`, where core is the structured block or `[count]`.
    pub values: ArrayD<Complex64>,
}

impl HarmonicBasis {
    pub fn batch_shape(&self) -> &[usize] {
        let core = match self.layout {
            Layout::Structured => self.tree.len(),
            Layout::Flattened => 1,
        };
        &self.values.shape()[..self.values.ndim() - core]
    }

    /// Convert to the other layout. Structured-to-flattened drops the
    /// inadmissible positions.
    pub fn to_layout(&self, layout: Layout) -> Result<HarmonicBasis> {
        let index = IndexLayout::new(&self.tree, self.n_end)?;
        let values = match (self.layout, layout) {
            (a, b) if a == b => self.values.clone(),
            (Layout::Structured, Layout::Flattened) => index.flatten(&self.values)?,
            _ => index.unflatten(&self.values)?,
        };
        Ok(HarmonicBasis {
            tree: self.tree.clone(),
            n_end: self.n_end,
            phase: self.phase,
            layout,
            values,
        })
    }
}

fn check_inputs(
    tree: &CoordinateTree,
    angles: &[ArrayD<f64>],
    config: &HarmonicsConfig,
) -> Result<()> {
    tree.validate()?;
    check_degree(config.n_end)?;
    if angles.len() != tree.len() {
        return Err(HarmonicsError::Shape(format!(
            "expected {} angle arrays, got {}",
            tree.len(),
            angles.len()
        )));
    }
    if config.check_domain {
        for id in tree.ids() {
            tree.check_angle(id, &angles[id.0])?;
        }
    }
    Ok(())
}

/// Evaluate every node's eigenfunction without assembling.
pub fn harmonics_per_node(
    tree: &CoordinateTree,
    angles: &[ArrayD<f64>],
    config: &HarmonicsConfig,
) -> Result<Vec<PerNodeArray>> {
    check_inputs(tree, angles, config)?;
    tree.ids()
        .map(|id| evaluate_node(tree, id, &angles[id.0], config.n_end, config.phase))
        .collect()
}

/// Harmonic basis at the points given by per-node angle arrays.
///
/// Angle arrays broadcast against each other; the result has the broadcast
/// batch shape followed by the core axes of `config.layout`. In the
/// structured layout inadmissible positions are zero.
pub fn harmonics(
    tree: &CoordinateTree,
    angles: &[ArrayD<f64>],
    config: &HarmonicsConfig,
) -> Result<HarmonicBasis> {
    let per_node = harmonics_per_node(tree, angles, config)?;
    let raw = assemble(&per_node, tree.len())?;
    let index = IndexLayout::new(tree, config.n_end)?;
    let values = match config.layout {
        Layout::Flattened => index.flatten(&raw)?,
        Layout::Structured => {
            let mut raw = raw;
            index.mask_structured(&mut raw)?;
            raw
        }
    };
    tracing::debug!(
        tree = %tree.branching_types(),
        n_end = config.n_end,
        shape = ?values.shape(),
        "evaluated harmonics"
    );
    Ok(HarmonicBasis {
        tree: tree.clone(),
        n_end: config.n_end,
        phase: config.phase,
        layout: config.layout,
        values,
    })
}
