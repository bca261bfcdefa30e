mod config;
mod spec;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use ndarray::{ArrayD, Dimension, arr1};
use num_complex::Complex64;
use polyharm_core::{
    CoordinateTree, HarmonicsConfig, IndexLayout, Layout, Phase, evaluate, expand, export_json,
    harm_n_ndim_eq, harmonics, import_json, random_sphere_points,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::config::Config;
use crate::spec::{parse_angles, parse_tree};

#[derive(Parser)]
#[command(name = "polyharm", about = "Hyperspherical harmonics on polyspherical coordinates")]
struct Cli {
    /// Config file (defaults to $POLYHARM_CONFIG or ./polyharm.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Describe a coordinate tree
    Tree {
        #[arg(long)]
        tree: Option<String>,
    },

    /// Number of harmonics per degree on S^{dim-1}
    Count {
        /// Ambient dimension d
        #[arg(long)]
        dim: usize,

        #[arg(long)]
        degree: Option<usize>,
    },

    /// Evaluate the basis at one point
    Basis {
        #[arg(long)]
        tree: Option<String>,

        #[arg(long)]
        degree: Option<usize>,

        /// Phase convention bits (0..=3)
        #[arg(long)]
        phase: Option<u8>,

        /// Comma-separated angles, one per node in pre-order
        #[arg(long, allow_hyphen_values = true)]
        angles: String,

        /// Print the structured block instead of the flattened basis
        #[arg(long)]
        structured: bool,
    },

    /// Expand a test function and write the coefficients as JSON
    Expand {
        #[arg(long)]
        tree: Option<String>,

        #[arg(long)]
        degree: Option<usize>,

        #[arg(long)]
        phase: Option<u8>,

        #[arg(long, value_enum, default_value_t = TestFunction::PlaneWave)]
        function: TestFunction,

        /// Output file path
        #[arg(long)]
        out: PathBuf,
    },

    /// Evaluate exported coefficients at one point
    Evaluate {
        /// Coefficient file written by `expand`
        #[arg(long)]
        input: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        angles: String,
    },

    /// Plane-wave truncation error against degree at random points
    Convergence {
        #[arg(long)]
        tree: Option<String>,

        /// Largest n_end to try
        #[arg(long)]
        degree: Option<usize>,

        #[arg(long, default_value_t = 100)]
        points: usize,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TestFunction {
    /// exp(i k·x) with k_j = j / d
    PlaneWave,
    Constant,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Tree { tree } => cmd_tree(&config, tree.as_deref()),
        Commands::Count { dim, degree } => cmd_count(&config, *dim, *degree),
        Commands::Basis {
            tree,
            degree,
            phase,
            angles,
            structured,
        } => cmd_basis(&config, tree.as_deref(), *degree, *phase, angles, *structured),
        Commands::Expand {
            tree,
            degree,
            phase,
            function,
            out,
        } => cmd_expand(&config, tree.as_deref(), *degree, *phase, *function, out),
        Commands::Evaluate { input, angles } => cmd_evaluate(input, angles),
        Commands::Convergence {
            tree,
            degree,
            points,
        } => cmd_convergence(&config, tree.as_deref(), *degree, *points),
    }
}

fn resolve_tree(config: &Config, tree: Option<&str>) -> Result<CoordinateTree> {
    let spec = tree.unwrap_or(&config.tree);
    parse_tree(spec).with_context(|| format!("failed to build tree from '{spec}'"))
}

fn resolve_phase(config: &Config, phase: Option<u8>) -> Result<Phase> {
    let bits = phase.unwrap_or(config.phase);
    match Phase::from_bits(bits) {
        Some(phase) => Ok(phase),
        None => bail!("phase must be in 0..=3, got {bits}"),
    }
}

fn format_complex(v: Complex64) -> String {
    format!("{:.6}{:+.6}i", v.re, v.im)
}

fn point_angles(angles: &[f64]) -> Vec<ArrayD<f64>> {
    angles.iter().map(|&a| arr1(&[a]).into_dyn()).collect()
}

/// Sampled on Cartesian coordinates, one array per leaf.
fn sample(function: TestFunction, cartesian: &[ArrayD<f64>]) -> ArrayD<Complex64> {
    match function {
        TestFunction::Constant => cartesian[0].mapv(|_| Complex64::new(1.0, 0.0)),
        TestFunction::PlaneWave => {
            let d = cartesian.len() as f64;
            let mut phase = cartesian[0].mapv(|_| 0.0);
            for (j, x) in cartesian.iter().enumerate() {
                phase = phase + x * (j as f64 / d);
            }
            phase.mapv(|p| Complex64::from_polar(1.0, p))
        }
    }
}

fn cmd_tree(config: &Config, tree: Option<&str>) -> Result<()> {
    let tree = resolve_tree(config, tree)?;
    println!("tree:       {}", tree.branching_types());
    println!("sphere:     S^{}", tree.len());
    println!("cartesian:  {}", tree.c_ndim());
    for id in tree.ids() {
        let node = tree.node(id);
        let (low, high) = tree.angle_domain(id);
        let parent = node
            .parent
            .map_or_else(|| "-".to_string(), |p| p.0.to_string());
        println!(
            "node {}: {:<18} parent={parent} weight={} domain=[{low:.6}, {high:.6}]",
            id.0,
            tree.kind(id).to_string(),
            node.weight
        );
    }
    Ok(())
}

fn cmd_count(config: &Config, dim: usize, degree: Option<usize>) -> Result<()> {
    if dim < 2 {
        bail!("dimension must be at least 2, got {dim}");
    }
    let n_end = degree.unwrap_or(config.degree);
    let mut total = 0;
    for n in 0..n_end {
        let count = harm_n_ndim_eq(n, dim);
        total += count;
        println!("degree {n}: {count}");
    }
    println!("total: {total}");
    Ok(())
}

fn cmd_basis(
    config: &Config,
    tree: Option<&str>,
    degree: Option<usize>,
    phase: Option<u8>,
    angles: &str,
    structured: bool,
) -> Result<()> {
    let tree = resolve_tree(config, tree)?;
    let angles = parse_angles(angles, &tree)?;
    let n_end = degree.unwrap_or(config.degree);
    let layout = if structured {
        Layout::Structured
    } else {
        Layout::Flattened
    };
    let harmonics_config = HarmonicsConfig::new(n_end)
        .with_phase(resolve_phase(config, phase)?)
        .with_layout(layout);
    let basis = harmonics(&tree, &point_angles(&angles), &harmonics_config)
        .context("failed to evaluate harmonics")?;

    match layout {
        Layout::Flattened => {
            let index = IndexLayout::new(&tree, n_end)?;
            for (qn, value) in index.quantum_numbers().iter().zip(basis.values.iter()) {
                println!("{qn:?}  {}", format_complex(*value));
            }
        }
        Layout::Structured => {
            println!("shape {:?}", basis.values.shape());
            for (ix, value) in basis.values.indexed_iter() {
                println!("{:?}  {}", ix.slice(), format_complex(*value));
            }
        }
    }
    Ok(())
}

fn cmd_expand(
    config: &Config,
    tree: Option<&str>,
    degree: Option<usize>,
    phase: Option<u8>,
    function: TestFunction,
    out: &Path,
) -> Result<()> {
    let tree = resolve_tree(config, tree)?;
    let n_end = degree.unwrap_or(config.degree);
    let harmonics_config = HarmonicsConfig::new(n_end).with_phase(resolve_phase(config, phase)?);
    let n = n_end + config.oversampling;
    let coef = expand(
        &tree,
        |angles| match tree.to_cartesian(angles) {
            Ok(cartesian) => sample(function, &cartesian),
            Err(e) => unreachable!("quadrature grid angles always broadcast: {e}"),
        },
        n,
        &harmonics_config,
    )
    .context("failed to expand function")?;

    let json = export_json(&coef).context("failed to serialize coefficients")?;
    std::fs::write(out, &json).with_context(|| format!("failed to write {}", out.display()))?;
    println!(
        "expanded {function:?} on {} with n_end={n_end} ({} coefficients) to {}",
        tree.branching_types(),
        coef.values.len(),
        out.display()
    );
    Ok(())
}

fn cmd_evaluate(input: &Path, angles: &str) -> Result<()> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let coef = import_json(&json).context("failed to import coefficients")?;
    let angles = parse_angles(angles, &coef.tree)?;
    let values = evaluate(&coef, &point_angles(&angles)).context("failed to evaluate")?;
    for value in values.iter() {
        println!("{}", format_complex(*value));
    }
    Ok(())
}

fn cmd_convergence(
    config: &Config,
    tree: Option<&str>,
    degree: Option<usize>,
    points: usize,
) -> Result<()> {
    let tree = resolve_tree(config, tree)?;
    let max_degree = degree.unwrap_or(config.degree);
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let cartesian_points = random_sphere_points(tree.c_ndim(), points, &mut rng);
    let angles = tree.from_cartesian(&cartesian_points)?;
    let exact = sample(TestFunction::PlaneWave, &tree.to_cartesian(&angles)?);

    println!("n_end  mae");
    for n_end in 1..=max_degree {
        let coef = expand(
            &tree,
            |grid| match tree.to_cartesian(grid) {
                Ok(cartesian) => sample(TestFunction::PlaneWave, &cartesian),
                Err(e) => unreachable!("quadrature grid angles always broadcast: {e}"),
            },
            n_end + config.oversampling,
            &HarmonicsConfig::new(n_end),
        )?;
        let approx = evaluate(&coef, &angles)?;
        let mae = (&approx - &exact)
            .mapv(|v| v.norm())
            .mean()
            .unwrap_or(f64::NAN);
        tracing::debug!(n_end, mae, "convergence step");
        println!("{n_end:>5}  {mae:.3e}");
    }
    Ok(())
}
