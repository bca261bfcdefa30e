//! `polyharm.toml` settings.
//!
//! Lookup order: `--config`, then `$POLYHARM_CONFIG`, then `./polyharm.toml`.
//! An explicitly named file must exist; otherwise a missing file means
//! defaults. Command-line flags override every value.
//!
//! ```toml
//! tree = "hopf:2"
//! degree = 6
//! phase = 3
//! oversampling = 2
//! seed = 7
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FILE: &str = "polyharm.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Tree spec, e.g. `spherical` or `standard:4`
    pub tree: String,
    /// Default `n_end`
    pub degree: usize,
    /// Phase convention bits, 0..=3
    pub phase: u8,
    /// Quadrature points per node beyond `n_end`
    pub oversampling: usize,
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tree: "spherical".to_string(),
            degree: 4,
            phase: 0,
            oversampling: 2,
            seed: 42,
        }
    }
}

impl Config {
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        if let Ok(path) = std::env::var("POLYHARM_CONFIG") {
            return Self::read(Path::new(&path));
        }
        let local = PathBuf::from(DEFAULT_FILE);
        if local.is_file() {
            return Self::read(&local);
        }
        tracing::debug!("no config file, using defaults");
        Ok(Self::default())
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }
}
