//! Parsing of command-line tree and angle arguments.

use std::sync::LazyLock;

use anyhow::{Result, bail};
use polyharm_core::CoordinateTree;
use regex::Regex;

static TREE_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(polar|spherical)|standard:(\d+)|hopf:(\d+)|types:([abpc]+))$").unwrap()
});

/// `polar`, `spherical`, `standard:<s>`, `hopf:<q>` or `types:<letters>`.
pub fn parse_tree(spec: &str) -> Result<CoordinateTree> {
    let Some(caps) = TREE_SPEC.captures(spec.trim()) else {
        bail!(
            "invalid tree spec '{spec}' (expected polar, spherical, standard:<n>, hopf:<n> or types:<abpc...>)"
        );
    };
    let tree = if let Some(name) = caps.get(1) {
        match name.as_str() {
            "polar" => CoordinateTree::polar(),
            _ => CoordinateTree::spherical(),
        }
    } else if let Some(s) = caps.get(2) {
        CoordinateTree::standard(s.as_str().parse()?)?
    } else if let Some(q) = caps.get(3) {
        CoordinateTree::hopf(q.as_str().parse()?)?
    } else if let Some(types) = caps.get(4) {
        CoordinateTree::from_branching_types(types.as_str())?
    } else {
        bail!("invalid tree spec '{spec}'");
    };
    Ok(tree)
}

/// Comma-separated angles, one per node.
pub fn parse_angles(text: &str, tree: &CoordinateTree) -> Result<Vec<f64>> {
    let angles = text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("invalid angle '{part}': {e}"))
        })
        .collect::<Result<Vec<_>>>()?;
    if angles.len() != tree.len() {
        bail!(
            "tree {} has {} angles, got {}",
            tree.branching_types(),
            tree.len(),
            angles.len()
        );
    }
    Ok(angles)
}
