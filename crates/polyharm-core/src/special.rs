//! Orthogonal polynomials and Bessel functions.

use std::f64::consts::{FRAC_1_PI, FRAC_2_PI, FRAC_PI_2, FRAC_PI_4, LN_2};

use num_complex::Complex64;
use statrs::function::gamma::ln_gamma;

use crate::constants::{BESSEL_ASYMPTOTIC_MIN, EULER_GAMMA, SERIES_MAX_TERMS};

/// `(-1)^k` for a signed integer.
#[inline]
pub fn minus_one_pow(k: i64) -> f64 {
    if k.rem_euclid(2) == 0 { 1.0 } else { -1.0 }
}

/// `i^k` without rounding.
#[inline]
pub fn i_pow(k: i64) -> Complex64 {
    match k.rem_euclid(4) {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, 1.0),
        2 => Complex64::new(-1.0, 0.0),
        _ => Complex64::new(0.0, -1.0),
    }
}

/// P_0^{(a,b)}(x) .. P_{n_end-1}^{(a,b)}(x) by the three-term recurrence.
///
/// Stable for the a, b >= -1/2 parameters the eigenfunctions use.
pub fn jacobi_all(n_end: usize, a: f64, b: f64, x: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(n_end);
    if n_end == 0 {
        return out;
    }
    out.push(1.0);
    if n_end == 1 {
        return out;
    }
    out.push((a + 1.0) + (a + b + 2.0) * (x - 1.0) / 2.0);
    for n in 2..n_end {
        let nf = n as f64;
        let c = 2.0 * nf + a + b;
        let lhs = 2.0 * nf * (nf + a + b) * (c - 2.0);
        let p1 = (c - 1.0) * (c * (c - 2.0) * x + a * a - b * b) * out[n - 1];
        let p2 = 2.0 * (nf + a - 1.0) * (nf + b - 1.0) * c * out[n - 2];
        out.push((p1 - p2) / lhs);
    }
    out
}

/// `1 / sqrt(h_n)` where h_n is the squared L2 norm of P_n^{(a,b)} against
/// the weight (1-x)^a (1+x)^b on [-1, 1].
pub fn jacobi_norm(n: usize, a: f64, b: f64) -> f64 {
    let nf = n as f64;
    let ln_h = if n == 0 {
        // closed form; the general one is 0/0 at a + b = -1
        (a + b + 1.0) * std::f64::consts::LN_2 + ln_gamma(a + 1.0) + ln_gamma(b + 1.0)
            - ln_gamma(a + b + 2.0)
    } else {
        (a + b + 1.0) * std::f64::consts::LN_2 - (2.0 * nf + a + b + 1.0).ln()
            + ln_gamma(nf + a + 1.0)
            + ln_gamma(nf + b + 1.0)
            - ln_gamma(nf + a + b + 1.0)
            - ln_gamma(nf + 1.0)
    };
    (-0.5 * ln_h).exp()
}

/// C_0^{(λ)}(x) .. C_{n_end-1}^{(λ)}(x), Gegenbauer polynomials.
pub fn gegenbauer_all(n_end: usize, lambda: f64, x: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(n_end);
    for n in 0..n_end {
        let value = match n {
            0 => 1.0,
            1 => 2.0 * lambda * x,
            _ => {
                let nf = n as f64;
                (2.0 * x * (nf + lambda - 1.0) * out[n - 1] - (nf + 2.0 * lambda - 2.0) * out[n - 2])
                    / nf
            }
        };
        out.push(value);
    }
    out
}

/// J_ν(z) by its power series. Loses digits once z is much larger than ν.
pub fn bessel_j_series(nu: f64, z: f64) -> f64 {
    if z == 0.0 {
        return if nu == 0.0 { 1.0 } else { 0.0 };
    }
    let q = z * z / 4.0;
    let mut term = (nu * (z / 2.0).ln() - ln_gamma(nu + 1.0)).exp();
    let mut sum = term;
    for k in 1..SERIES_MAX_TERMS {
        let kf = k as f64;
        term *= -q / (kf * (kf + nu));
        sum += term;
        if kf > q && term.abs() <= f64::EPSILON * sum.abs() {
            break;
        }
    }
    sum
}

/// `[J_0, J_1, Y_0, Y_1]` at small z from the logarithmic series.
fn bessel_01_series(z: f64) -> [f64; 4] {
    let q = z * z / 4.0;
    let log_half = (z / 2.0).ln();
    let j0 = bessel_j_series(0.0, z);
    let j1 = bessel_j_series(1.0, z);

    // Y_0: harmonic numbers H_k
    let (mut s0, mut t, mut h) = (0.0, 1.0, 0.0);
    for k in 1..SERIES_MAX_TERMS {
        let kf = k as f64;
        t *= q / (kf * kf);
        h += 1.0 / kf;
        let term = minus_one_pow(k as i64 + 1) * h * t;
        s0 += term;
        if kf > q && term.abs() <= f64::EPSILON * s0.abs() {
            break;
        }
    }
    let y0 = FRAC_2_PI * ((log_half + EULER_GAMMA) * j0 + s0);

    // Y_1: digamma pairs ψ(k+1) + ψ(k+2)
    let (mut s1, mut t) = (0.0, z / 2.0);
    let (mut psi1, mut psi2) = (-EULER_GAMMA, 1.0 - EULER_GAMMA);
    for k in 0..SERIES_MAX_TERMS {
        let kf = k as f64;
        if k > 0 {
            t *= -q / (kf * (kf + 1.0));
            psi1 += 1.0 / kf;
            psi2 += 1.0 / (kf + 1.0);
        }
        let term = (psi1 + psi2) * t;
        s1 += term;
        if kf > q && term.abs() <= f64::EPSILON * s1.abs() {
            break;
        }
    }
    let y1 = -FRAC_2_PI / z + FRAC_2_PI * log_half * j1 - FRAC_1_PI * s1;
    [j0, j1, y0, y1]
}

/// `(J_ν, Y_ν)` from the Hankel asymptotic expansion, for large z.
fn bessel_asymptotic(nu: f64, z: f64) -> (f64, f64) {
    let mu = 4.0 * nu * nu;
    let (mut p, mut q) = (0.0, 0.0);
    let mut term = 1.0;
    for k in 0..SERIES_MAX_TERMS {
        match k % 4 {
            0 => p += term,
            1 => q += term,
            2 => p -= term,
            _ => q -= term,
        }
        let kf = (k + 1) as f64;
        let next = term * (mu - (2.0 * kf - 1.0).powi(2)) / (8.0 * kf * z);
        // the series is divergent: stop at its smallest term
        if next.abs() >= term.abs() || next.abs() < 1e-17 {
            break;
        }
        term = next;
    }
    let chi = z - nu * FRAC_PI_2 - FRAC_PI_4;
    let scale = (FRAC_2_PI / z).sqrt();
    (
        scale * (p * chi.cos() - q * chi.sin()),
        scale * (p * chi.sin() + q * chi.cos()),
    )
}

/// `J_{λ+n}(z)` and `Y_{λ+n}(z)` for n in 0..n_end, where λ = d/2 - 1 and
/// z > 0.
///
/// Y runs up the forward recurrence from order 0 (d even) or -1/2 (d odd).
/// J uses the same recurrence while the order stays below z and its power
/// series beyond.
pub fn bessel_ladder(c_ndim: usize, n_end: usize, z: f64) -> (Vec<f64>, Vec<f64>) {
    let (nu0, offset, [j0, j1, y0, y1]) = if c_ndim % 2 == 0 {
        let base = if z <= BESSEL_ASYMPTOTIC_MIN {
            bessel_01_series(z)
        } else {
            let (j0, y0) = bessel_asymptotic(0.0, z);
            let (j1, y1) = bessel_asymptotic(1.0, z);
            [j0, j1, y0, y1]
        };
        (0.0, (c_ndim / 2).saturating_sub(1), base)
    } else {
        // J_{-1/2}, J_{1/2} in closed form; Y_{-1/2} = J_{1/2}, Y_{1/2} = -J_{-1/2}
        let scale = (FRAC_2_PI / z).sqrt();
        let (j_minus, j_plus) = (scale * z.cos(), scale * z.sin());
        (-0.5, (c_ndim - 1) / 2, [j_minus, j_plus, j_plus, -j_minus])
    };
    let total = offset + n_end;
    let mut j = vec![j0, j1];
    let mut y = vec![y0, y1];
    for i in 1..total.saturating_sub(1) {
        let nu = nu0 + i as f64;
        y.push(2.0 * nu / z * y[i] - y[i - 1]);
        let next_j = if nu < z {
            2.0 * nu / z * j[i] - j[i - 1]
        } else {
            bessel_j_series(nu + 1.0, z)
        };
        j.push(next_j);
    }
    (
        j[offset..offset + n_end].to_vec(),
        y[offset..offset + n_end].to_vec(),
    )
}

/// Radial Bessel functions of the d-dimensional Helmholtz equation,
/// `sqrt(π/2) z^{-λ} J_{n+λ}(z)` and the same with Y, λ = d/2 - 1.
///
/// For d = 3 these are the spherical Bessel functions j_n and y_n. At z = 0
/// only the degree-zero J value is non-zero and every Y value is -∞.
pub fn hyperspherical_bessel(c_ndim: usize, n_end: usize, z: f64) -> (Vec<f64>, Vec<f64>) {
    let lambda = c_ndim as f64 / 2.0 - 1.0;
    let scale = FRAC_PI_2.sqrt();
    if z == 0.0 {
        let mut j = vec![0.0; n_end];
        if let Some(first) = j.first_mut() {
            *first = scale * (-lambda * LN_2 - ln_gamma(lambda + 1.0)).exp();
        }
        return (j, vec![f64::NEG_INFINITY; n_end]);
    }
    let (j, y) = bessel_ladder(c_ndim, n_end, z);
    let factor = scale * z.powf(-lambda);
    (
        j.into_iter().map(|v| factor * v).collect(),
        y.into_iter().map(|v| factor * v).collect(),
    )
}
