//! JSON serde for exported coefficients.
//!
//! The wire format uses camelCase field names, stores the tree as its
//! branching-type string and complex values as `[re, im]` pairs in
//! row-major order.

use std::fmt;

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::constants::WIRE_VERSION;
use crate::error::HarmonicsError;
use crate::layout::Layout;
use crate::phase::Phase;
use crate::transform::ExpansionCoefficients;
use crate::tree::CoordinateTree;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct WireCoefficients {
    pub version: String,
    pub tree: String,
    #[serde(rename = "nEnd")]
    pub n_end: usize,
    pub phase: u8,
    #[serde(default)]
    pub layout: Layout,
    pub shape: Vec<usize>,
    pub values: Vec<[f64; 2]>,
}

#[derive(Debug)]
pub enum WireError {
    Json(serde_json::Error),
    /// The file was written by an incompatible format version.
    Version(String),
    Invalid(HarmonicsError),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Json(e) => write!(f, "JSON error: {e}"),
            WireError::Version(v) => {
                write!(f, "unsupported wire version '{v}', expected '{WIRE_VERSION}'")
            }
            WireError::Invalid(e) => write!(f, "invalid coefficients: {e}"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<serde_json::Error> for WireError {
    fn from(e: serde_json::Error) -> Self {
        WireError::Json(e)
    }
}

impl From<HarmonicsError> for WireError {
    fn from(e: HarmonicsError) -> Self {
        WireError::Invalid(e)
    }
}

// --- Conversion: Wire → Domain ---

impl WireCoefficients {
    pub fn into_coefficients(self) -> Result<ExpansionCoefficients, HarmonicsError> {
        let tree = CoordinateTree::from_branching_types(&self.tree)?;
        let phase = Phase::from_bits(self.phase).ok_or_else(|| {
            HarmonicsError::Degree(format!("phase must be in 0..=3, got {}", self.phase))
        })?;
        let values: Vec<Complex64> = self
            .values
            .iter()
            .map(|[re, im]| Complex64::new(*re, *im))
            .collect();
        let array = ArrayD::from_shape_vec(IxDyn(&self.shape), values)?;
        let coef = ExpansionCoefficients::from_array(&tree, array, phase, self.layout)?;
        if coef.n_end != self.n_end {
            return Err(HarmonicsError::Shape(format!(
                "shape {:?} implies n_end {}, file says {}",
                self.shape, coef.n_end, self.n_end
            )));
        }
        Ok(coef)
    }

    // --- Conversion: Domain → Wire ---

    pub fn from_coefficients(coef: &ExpansionCoefficients) -> Self {
        Self {
            version: WIRE_VERSION.to_string(),
            tree: coef.tree.branching_types(),
            n_end: coef.n_end,
            phase: coef.phase.bits(),
            layout: coef.layout,
            shape: coef.values.shape().to_vec(),
            values: coef.values.iter().map(|v| [v.re, v.im]).collect(),
        }
    }
}

/// Deserialize exported coefficients.
pub fn import_json(json: &str) -> Result<ExpansionCoefficients, WireError> {
    let wire: WireCoefficients = serde_json::from_str(json)?;
    if wire.version != WIRE_VERSION {
        return Err(WireError::Version(wire.version));
    }
    Ok(wire.into_coefficients()?)
}

/// Serialize coefficients to the JSON wire format.
pub fn export_json(coef: &ExpansionCoefficients) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&WireCoefficients::from_coefficients(coef))
}
