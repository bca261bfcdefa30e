//! Closed-form dimension counts for polynomial and harmonic spaces.

use crate::error::{HarmonicsError, Result};

fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1usize, |acc, i| acc * (n - i) / (i + 1))
}

/// Dimension of homogeneous polynomials of degree `n` in `d` variables.
pub fn homogeneous_ndim_eq(n: usize, d: usize) -> usize {
    if d == 0 {
        return usize::from(n == 0);
    }
    binomial(n + d - 1, d - 1)
}

/// Sum of [`homogeneous_ndim_eq`] over degrees below `n_end`.
pub fn homogeneous_ndim_le(n_end: usize, d: usize) -> usize {
    (0..n_end).map(|n| homogeneous_ndim_eq(n, d)).sum()
}

/// Dimension of degree-`n` harmonics on S^{d-1}.
pub fn harm_n_ndim_eq(n: usize, d: usize) -> usize {
    match d {
        0 => 0,
        1 => usize::from(n <= 1),
        2 => {
            if n == 0 {
                1
            } else {
                2
            }
        }
        _ if n < 2 => homogeneous_ndim_eq(n, d),
        _ => homogeneous_ndim_eq(n, d) - homogeneous_ndim_eq(n - 2, d),
    }
}

/// Number of harmonics on S^{d-1} with degree below `n_end`.
pub fn harm_n_ndim_le(n_end: usize, d: usize) -> usize {
    (0..n_end).map(|n| harm_n_ndim_eq(n, d)).sum()
}

/// Invert [`harm_n_ndim_le`]: the `n_end` whose basis has exactly `size`
/// elements in dimension `d`.
pub fn n_end_from_size(size: usize, d: usize) -> Result<usize> {
    if d < 2 {
        return Err(HarmonicsError::Shape(format!(
            "cannot infer degree in dimension {d}"
        )));
    }
    let mut n_end = 0;
    let mut total = 0;
    while total < size {
        total += harm_n_ndim_eq(n_end, d);
        n_end += 1;
    }
    if total == size {
        Ok(n_end)
    } else {
        Err(HarmonicsError::Shape(format!(
            "{size} is not a harmonic basis size in dimension {d}"
        )))
    }
}
