//! Hyperspherical harmonics on polyspherical coordinate trees.
//!
//! A coordinate tree splits the angles of S^{d-1} into nested fusions of
//! lower-dimensional spheres. The harmonic basis is the product of one
//! eigenfunction per tree node, filtered by the admissibility constraints
//! between neighbouring nodes, and exposed in a structured (one axis per
//! node) or flattened (one axis, ordered by degree) layout. Quadrature
//! expansion and synthesis reuse the same pipeline.
//!
//! On top of the basis sit the Helmholtz solutions (a radial Bessel factor
//! times a harmonic), plane-wave expansions and translation coefficients.
//!
//! Pure math over `ndarray` arrays, zero I/O.

pub mod assemble;
pub mod constants;
pub mod eigen;
pub mod error;
pub mod harmonics;
pub mod helmholtz;
pub mod layout;
pub mod ndim;
pub mod phase;
pub mod quadrature;
pub mod special;
pub mod transform;
pub mod translation;
pub mod tree;
pub mod wave;
pub mod wire;

pub use assemble::{assemble, block_len, broadcast_shapes};
pub use constants::{MAX_DEGREE, WIRE_VERSION};
pub use eigen::{PerNodeArray, evaluate_node};
pub use error::{HarmonicsError, Result};
pub use harmonics::{HarmonicBasis, HarmonicsConfig, harmonics, harmonics_per_node};
pub use helmholtz::{
    Radial, RadialKind, harmonics_regular_singular, harmonics_regular_singular_cartesian,
    radial_component,
};
pub use layout::{IndexLayout, Layout, assume_n_end, is_admissible};
pub use ndim::{harm_n_ndim_eq, harm_n_ndim_le, n_end_from_size};
pub use phase::Phase;
pub use quadrature::QuadratureRule;
pub use transform::{
    ExpansionCoefficients, evaluate, evaluate_array, expand, expand_cut, expand_separable,
    try_expand,
};
pub use translation::{
    TranslationConfig, TranslationKind, TranslationMethod, translation_coefficients,
    triple_product_integrals,
};
pub use tree::{Child, CoordinateTree, NodeId, NodeKind, Side, random_sphere_points};
pub use wave::{plane_wave_coefficients, plane_wave_expansion_coef};
pub use wire::{WireError, export_json, import_json};
