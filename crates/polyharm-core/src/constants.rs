/// 1 / √(2π): normalisation of the azimuthal eigenfunction.
pub const INV_SQRT_TAU: f64 = 0.398_942_280_401_432_7;

/// Euler-Mascheroni constant.
pub const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Above this argument integer-order Bessel functions switch from the power
/// series to the Hankel asymptotic expansion.
pub const BESSEL_ASYMPTOTIC_MIN: f64 = 14.0;

/// Term cap for every special-function series.
pub const SERIES_MAX_TERMS: usize = 500;

/// Slack allowed on angle range checks.
pub const ANGLE_TOLERANCE: f64 = 1e-10;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// Largest supported `n_end`. Jacobi normalisations overflow well before
/// anything useful can be computed beyond this.
pub const MAX_DEGREE: usize = 512;

/// Largest structured block (elements per batch point) the engine will
/// allocate.
pub const MAX_BLOCK_LEN: usize = 1 << 30;

/// Version tag written into exported coefficient files.
pub const WIRE_VERSION: &str = "1";
