//! Integration tests across the full pipeline:
//! tree → per-node eigenfunctions → assembly → layout → expand/evaluate.

use approx::assert_abs_diff_eq;
use ndarray::{ArrayD, IxDyn, arr1};
use num_complex::Complex64;
use polyharm_core::{
    CoordinateTree, ExpansionCoefficients, HarmonicsConfig, HarmonicsError, IndexLayout, Layout,
    NodeId, Phase, Radial, TranslationConfig, evaluate, expand, expand_cut, expand_separable,
    export_json, harm_n_ndim_eq, harm_n_ndim_le, harmonics, harmonics_regular_singular_cartesian,
    import_json, plane_wave_coefficients, random_sphere_points, translation_coefficients,
};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

fn rng() -> SmallRng {
    SmallRng::seed_from_u64(42)
}

const TREES: [&str; 7] = ["a", "ba", "bba", "caa", "bpa", "pba", "cbaa"];

fn point(values: &[f64]) -> Vec<ArrayD<f64>> {
    values.iter().map(|&v| arr1(&[v]).into_dyn()).collect()
}

/// Expanding every basis function against the basis yields the Gram matrix.
#[test]
fn basis_is_orthonormal() {
    for types in TREES {
        let tree = CoordinateTree::from_branching_types(types).unwrap();
        for phase in Phase::all() {
            let config = HarmonicsConfig::new(3).with_phase(phase);
            let gram = expand(
                &tree,
                |angles| harmonics(&tree, angles, &config).unwrap().values,
                3,
                &config,
            )
            .unwrap();
            let count = harm_n_ndim_le(3, tree.c_ndim());
            assert_eq!(gram.values.shape(), &[count, count], "{types}");
            for j in 0..count {
                for k in 0..count {
                    let expected = if j == k { 1.0 } else { 0.0 };
                    let v = gram.values[[j, k]];
                    assert!(
                        (v.re - expected).abs() < 1e-10 && v.im.abs() < 1e-10,
                        "{types} phase {}: <Y_{j}, Y_{k}> = {v}",
                        phase.bits()
                    );
                }
            }
        }
    }
}

#[test]
fn counts_per_degree_match_closed_form() {
    for types in TREES.iter().chain(["ccaacaa", "bbbba", "cpaba"].iter()) {
        let tree = CoordinateTree::from_branching_types(types).unwrap();
        let layout = IndexLayout::new(&tree, 4).unwrap();
        for n in 0..4 {
            let count = layout.degrees().iter().filter(|&&d| d == n).count();
            assert_eq!(count, harm_n_ndim_eq(n, tree.c_ndim()), "{types} degree {n}");
        }
    }
}

#[test]
fn classical_spherical_harmonics() {
    let tree = CoordinateTree::spherical();
    let basis = harmonics(&tree, &point(&[0.5, 1.0]), &HarmonicsConfig::new(2)).unwrap();
    let y = &basis.values;
    assert_abs_diff_eq!(y[[0, 0]].re, 0.28, epsilon = 5e-3);
    assert_abs_diff_eq!(y[[0, 1]].re, 0.43, epsilon = 5e-3);
    assert_abs_diff_eq!(y[[0, 2]].re, 0.09, epsilon = 5e-3);
    assert_abs_diff_eq!(y[[0, 2]].im, 0.14, epsilon = 5e-3);
    assert_abs_diff_eq!(y[[0, 3]].re, 0.09, epsilon = 5e-3);
    assert_abs_diff_eq!(y[[0, 3]].im, -0.14, epsilon = 5e-3);
}

#[test]
fn scipy_convention_closed_forms() {
    let tree = CoordinateTree::spherical();
    let (theta, phi) = (0.7, 2.1);
    let config = HarmonicsConfig::new(3).with_phase(Phase::from_bits(3).unwrap());
    let basis = harmonics(&tree, &point(&[theta, phi]), &config).unwrap();
    let layout = IndexLayout::new(&tree, 3).unwrap();
    let index_of = |l: i64, m: i64| {
        layout
            .quantum_numbers()
            .iter()
            .position(|q| q == &vec![l, m])
            .unwrap()
    };
    let (s, c) = (theta.sin(), theta.cos());
    let e = |m: f64| Complex64::from_polar(1.0, m * phi);
    let cases = [
        (1, 1, e(1.0) * (-(3.0 / (8.0 * PI)).sqrt() * s)),
        (1, -1, e(-1.0) * ((3.0 / (8.0 * PI)).sqrt() * s)),
        (2, 1, e(1.0) * (-(15.0 / (8.0 * PI)).sqrt() * s * c)),
        (2, -2, e(-2.0) * (0.25 * (15.0 / (2.0 * PI)).sqrt() * s * s)),
        (2, 0, e(0.0) * (0.25 * (5.0 / PI).sqrt() * (3.0 * c * c - 1.0))),
    ];
    for (l, m, expected) in cases {
        let got = basis.values[[0, index_of(l, m)]];
        assert_abs_diff_eq!(got.re, expected.re, epsilon = 1e-12);
        assert_abs_diff_eq!(got.im, expected.im, epsilon = 1e-12);
    }
}

#[test]
fn condon_shortley_flips_odd_orders() {
    let tree = CoordinateTree::spherical();
    let angles = point(&[1.1, 0.4]);
    let plain = harmonics(&tree, &angles, &HarmonicsConfig::new(4)).unwrap();
    let cs_config = HarmonicsConfig::new(4).with_phase(Phase::from_bits(2).unwrap());
    let cs = harmonics(&tree, &angles, &cs_config).unwrap();
    let layout = IndexLayout::new(&tree, 4).unwrap();
    for (k, qn) in layout.quantum_numbers().iter().enumerate() {
        let ratio = cs.values[[0, k]] / plain.values[[0, k]];
        let sign = if qn[1] % 2 == 0 { 1.0 } else { -1.0 };
        assert_abs_diff_eq!(ratio.re, sign, epsilon = 1e-12);
        assert_abs_diff_eq!(ratio.im, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn phase_never_changes_magnitude() {
    let tree = CoordinateTree::from_branching_types("cbaa").unwrap();
    let angles = point(&[0.3, 2.0, 1.2, 4.0]);
    let reference = harmonics(&tree, &angles, &HarmonicsConfig::new(3)).unwrap();
    for phase in Phase::all() {
        let config = HarmonicsConfig::new(3).with_phase(phase);
        let basis = harmonics(&tree, &angles, &config).unwrap();
        for (a, b) in basis.values.iter().zip(reference.values.iter()) {
            assert_abs_diff_eq!(a.norm(), b.norm(), epsilon = 1e-12);
        }
    }
}

#[test]
fn batch_axes_broadcast() {
    let tree = CoordinateTree::spherical();
    let angles = [arr1(&[0.5, 1.5]).into_dyn(), arr1(&[1.0]).into_dyn()];
    let basis = harmonics(&tree, &angles, &HarmonicsConfig::new(3)).unwrap();
    assert_eq!(basis.values.shape(), &[2, 9]);
    for (row, theta) in [0.5, 1.5].iter().enumerate() {
        let single = harmonics(&tree, &point(&[*theta, 1.0]), &HarmonicsConfig::new(3)).unwrap();
        for k in 0..9 {
            assert_eq!(basis.values[[row, k]], single.values[[0, k]]);
        }
    }
}

#[test]
fn structured_and_flattened_agree() {
    let tree = CoordinateTree::hopf(2).unwrap();
    let angles = point(&[0.4, 1.0, 5.0]);
    let flat = harmonics(&tree, &angles, &HarmonicsConfig::new(3)).unwrap();
    let structured_config = HarmonicsConfig::new(3).with_layout(Layout::Structured);
    let structured = harmonics(&tree, &angles, &structured_config).unwrap();
    assert_eq!(structured.values.shape(), &[1, 3, 5, 5]);
    let converted = structured.to_layout(Layout::Flattened).unwrap();
    assert_eq!(converted.values, flat.values);
}

#[test]
fn finite_combination_roundtrip() {
    let mut rng = rng();
    for types in ["ba", "caa", "pba"] {
        let tree = CoordinateTree::from_branching_types(types).unwrap();
        let count = harm_n_ndim_le(3, tree.c_ndim());
        let values = ArrayD::from_shape_fn(IxDyn(&[count]), |_| {
            Complex64::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5)
        });
        let coef =
            ExpansionCoefficients::from_array(&tree, values, Phase::NONE, Layout::Flattened)
                .unwrap();
        let back = expand(
            &tree,
            |angles| evaluate(&coef, angles).unwrap(),
            4,
            &HarmonicsConfig::new(3),
        )
        .unwrap();
        for (a, b) in back.values.iter().zip(coef.values.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-10);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-10);
        }
    }
}

#[test]
fn separable_matches_full_expansion() {
    let factor = |id: NodeId, t: f64| {
        Complex64::new((0.7 * t).cos().exp(), (id.0 as f64 + 1.0) * t.sin())
    };
    // polar, triple (rank-3 projection) and cos-side polar roots
    for types in ["ba", "cbaa", "pcaa"] {
        let tree = CoordinateTree::from_branching_types(types).unwrap();
        let config = HarmonicsConfig::new(4);
        let full = expand(
            &tree,
            |angles| {
                let mut out = angles[0].mapv(|t| factor(NodeId(0), t));
                for id in tree.ids().skip(1) {
                    out.zip_mut_with(&angles[id.0], |o, &t| *o *= factor(id, t));
                }
                out
            },
            6,
            &config,
        )
        .unwrap();
        let separable =
            expand_separable(&tree, |id, points| points.mapv(|t| factor(id, t)), 6, &config)
                .unwrap();
        assert_eq!(full.values.shape(), separable.values.shape());
        for (a, b) in full.values.iter().zip(separable.values.iter()) {
            assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-10);
            assert_abs_diff_eq!(a.im, b.im, epsilon = 1e-10);
        }
    }
}

#[test]
fn oversized_tree_fails_without_panicking() {
    let tree = CoordinateTree::hopf(6).unwrap();
    let angles = point(&vec![0.3; tree.len()]);
    assert!(matches!(
        harmonics(&tree, &angles, &HarmonicsConfig::new(2)),
        Err(HarmonicsError::Shape(_))
    ));
    assert!(matches!(
        IndexLayout::new(&tree, 2),
        Err(HarmonicsError::Shape(_))
    ));
}

/// Plane wave `exp(i k·x)`: truncation error shrinks as the degree grows.
#[test]
fn plane_wave_converges() {
    let mut rng = rng();
    for types in ["ba", "caa"] {
        let tree = CoordinateTree::from_branching_types(types).unwrap();
        let d = tree.c_ndim();
        let k: Vec<f64> = (0..d).map(|i| i as f64 / d as f64).collect();
        let plane_wave = |cart: &[ArrayD<f64>]| {
            let mut phase = ArrayD::zeros(cart[0].raw_dim());
            for (ki, xi) in k.iter().zip(cart) {
                phase = phase + xi * *ki;
            }
            phase.mapv(|p: f64| Complex64::from_polar(1.0, p))
        };

        let points = random_sphere_points(d, 20, &mut rng);
        let angles = tree.from_cartesian(&points).unwrap();
        let exact = plane_wave(tree.to_cartesian(&angles).unwrap().as_slice());

        let mut errors = Vec::new();
        for n_end in 1..=7 {
            let coef = expand(
                &tree,
                |grid| plane_wave(tree.to_cartesian(grid).unwrap().as_slice()),
                n_end + 2,
                &HarmonicsConfig::new(n_end),
            )
            .unwrap();
            let approx = evaluate(&coef, &angles).unwrap();
            let mae = (&approx - &exact).mapv(|v| v.norm()).mean().unwrap();
            errors.push(mae);
        }
        for pair in errors.windows(2) {
            assert!(pair[1] < pair[0], "{types}: errors not decreasing: {errors:?}");
        }
        assert!(errors[6] < 1e-3, "{types}: final error {}", errors[6]);
    }
}

/// Projecting e^{iκ x·u} on the unit sphere gives the analytic plane-wave
/// coefficients times the regular radial factor at κ.
#[test]
fn plane_wave_coefficients_match_quadrature() {
    let mut rng = rng();
    let kappa = 1.2;
    for types in ["a", "ba", "cbaa"] {
        let tree = CoordinateTree::from_branching_types(types).unwrap();
        let d = tree.c_ndim();
        let direction = tree
            .from_cartesian(&random_sphere_points(d, 1, &mut rng))
            .unwrap();
        let u: Vec<f64> = tree
            .to_cartesian(&direction)
            .unwrap()
            .iter()
            .map(|a| a[[0]])
            .collect();

        let config = HarmonicsConfig::new(4);
        let analytic = plane_wave_coefficients(&tree, &direction, &config).unwrap();
        let radial = Radial::regular(kappa).values(d, 4, 1.0).unwrap();
        let projected = expand(
            &tree,
            |grid| {
                let x = tree.to_cartesian(grid).unwrap();
                let mut phase = ArrayD::zeros(grid[0].raw_dim());
                for (ui, xi) in u.iter().zip(&x) {
                    phase = phase + xi * (kappa * ui);
                }
                phase.mapv(|p: f64| Complex64::from_polar(1.0, p))
            },
            10,
            &config,
        )
        .unwrap();

        let index = IndexLayout::new(&tree, 4).unwrap();
        for (i, deg) in index.degrees().iter().enumerate() {
            let expected = analytic.values[[0, i]] * radial[*deg];
            let got = projected.values[[i]];
            assert!(
                (got - expected).norm() < 1e-9,
                "{types} index {i}: {got} vs {expected}"
            );
        }
    }
}

/// Regular solutions on S^3 re-expanded about a shifted centre.
#[test]
fn translation_on_three_sphere() {
    let tree = CoordinateTree::hopf(2).unwrap();
    let (t, x) = ([0.1, -0.2, 0.15, 0.05], [-0.1, 0.2, 0.1, 0.15]);
    let config = TranslationConfig::new(2, 6, 1.0);
    let coef = translation_coefficients(&tree, &t, &config).unwrap();
    assert_eq!(coef.shape(), &[5, 91]);

    let radial = Radial::regular(1.0);
    let at = |p: &[f64], n_end: usize| {
        harmonics_regular_singular_cartesian(
            &tree,
            &arr1(p).into_dyn(),
            &radial,
            &HarmonicsConfig::new(n_end),
        )
        .unwrap()
        .values
    };
    let shifted: Vec<f64> = x.iter().zip(&t).map(|(x, t)| x + t).collect();
    let exact = at(&shifted, 2);
    let approx = coef.dot(&at(&x, 6).into_dimensionality::<ndarray::Ix1>().unwrap());
    for (a, e) in approx.iter().zip(exact.iter()) {
        assert!((a - e).norm() < 1e-6, "{a} vs {e}");
    }
}

#[test]
fn cut_matches_lower_degree_expansion() {
    let tree = CoordinateTree::from_branching_types("bba").unwrap();
    let f = |angles: &[ArrayD<f64>]| angles[0].mapv(|t| Complex64::new(t.cos().powi(3), 0.0));
    let high = expand(&tree, f, 5, &HarmonicsConfig::new(5)).unwrap();
    let low = expand(&tree, f, 5, &HarmonicsConfig::new(3)).unwrap();
    let cut = expand_cut(&high, 3).unwrap();
    assert_eq!(cut.values.shape(), low.values.shape());
    for (a, b) in cut.values.iter().zip(low.values.iter()) {
        assert_abs_diff_eq!(a.re, b.re, epsilon = 1e-12);
    }
}

#[test]
fn wire_roundtrip_preserves_synthesis() {
    let tree = CoordinateTree::standard(3).unwrap();
    let config = HarmonicsConfig::new(3).with_phase(Phase::from_bits(1).unwrap());
    let coef = expand(
        &tree,
        |angles| angles[2].mapv(|t| Complex64::from_polar(1.0, t)),
        3,
        &config,
    )
    .unwrap();
    let back = import_json(&export_json(&coef).unwrap()).unwrap();
    assert_eq!(back.phase, coef.phase);
    let angles = point(&[0.3, 0.9, 2.0]);
    let a = evaluate(&coef, &angles).unwrap();
    let b = evaluate(&back, &angles).unwrap();
    assert_abs_diff_eq!(a[[0]].re, b[[0]].re, epsilon = 1e-14);
    assert_abs_diff_eq!(a[[0]].im, b[[0]].im, epsilon = 1e-14);
}

fn tree_strategy() -> impl Strategy<Value = CoordinateTree> {
    (1usize..5, any::<u64>()).prop_map(|(s_ndim, seed)| {
        CoordinateTree::random(s_ndim, &mut SmallRng::seed_from_u64(seed)).unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Property: unflatten then flatten is the identity on flattened arrays
    #[test]
    fn prop_flatten_roundtrip(tree in tree_strategy(), n_end in 1usize..4, seed in any::<u64>()) {
        let layout = IndexLayout::new(&tree, n_end).unwrap();
        let mut rng = SmallRng::seed_from_u64(seed);
        let flat = ArrayD::from_shape_fn(IxDyn(&[2, layout.len()]), |_| rng.random_range(1..1000i64));
        let structured = layout.unflatten(&flat).unwrap();
        prop_assert_eq!(layout.flatten(&structured).unwrap(), flat);
        prop_assert_eq!(layout.unflatten(&layout.flatten(&structured).unwrap()).unwrap(), structured);
    }

    /// Property: the flattened size equals the harmonic dimension
    #[test]
    fn prop_size_matches_dimension(tree in tree_strategy(), n_end in 1usize..5) {
        let layout = IndexLayout::new(&tree, n_end).unwrap();
        prop_assert_eq!(layout.len(), harm_n_ndim_le(n_end, tree.c_ndim()));
        prop_assert!(layout.degrees().windows(2).all(|w| w[0] <= w[1]));
    }
}
