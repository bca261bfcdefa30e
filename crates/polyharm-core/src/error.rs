use std::fmt;

/// Input-contract violations detected by the engine.
///
/// Every failure is synchronous and all-or-nothing: an `Err` never comes with
/// a partially filled result.
#[derive(Debug, Clone, PartialEq)]
pub enum HarmonicsError {
    /// An angle lies outside the declared range of its node.
    Domain {
        node: usize,
        value: f64,
        low: f64,
        high: f64,
    },
    /// A degree or quantum-number range the engine cannot represent.
    Degree(String),
    /// Batch or core axes do not match the expected layout.
    Shape(String),
    /// The coordinate tree is malformed.
    Topology(String),
    /// A physical parameter (wavenumber, radius) is out of range.
    Argument(String),
}

impl fmt::Display for HarmonicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarmonicsError::Domain {
                node,
                value,
                low,
                high,
            } => write!(
                f,
                "domain error: angle {value} at node {node} is outside [{low}, {high}]"
            ),
            HarmonicsError::Degree(msg) => write!(f, "degree error: {msg}"),
            HarmonicsError::Shape(msg) => write!(f, "shape error: {msg}"),
            HarmonicsError::Topology(msg) => write!(f, "topology error: {msg}"),
            HarmonicsError::Argument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for HarmonicsError {}

impl From<ndarray::ShapeError> for HarmonicsError {
    fn from(e: ndarray::ShapeError) -> Self {
        HarmonicsError::Shape(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HarmonicsError>;
