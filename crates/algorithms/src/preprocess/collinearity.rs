//! Collinearity screening
//!
//! Pearson correlation between every pair of layers, complete-linkage
//! clustering on `1 - |r|`, and a cut at `1 - cutoff`: layers in the same
//! group are correlated at `|r| >= cutoff` with every other member.

use crate::ordination::collect_cells;
use crate::rng::SpeciesRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use virtualspecies_core::{EnvironmentalStack, Error, Result};

/// Parameters for [`remove_collinearity`]
#[derive(Debug, Clone)]
pub struct CollinearityParams {
    /// Absolute correlation above which layers are grouped (default: 0.7)
    pub cutoff: f64,
    /// Correlate on a random subset of cells instead of all of them
    pub sample_points: Option<usize>,
    /// Pick one random layer per group (default: false)
    pub select_representatives: bool,
}

impl Default for CollinearityParams {
    fn default() -> Self {
        Self {
            cutoff: 0.7,
            sample_points: None,
            select_representatives: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollinearityResult {
    /// Layer names in stack order
    pub variables: Vec<String>,
    /// Pearson correlation matrix
    pub correlation: Vec<Vec<f64>>,
    /// Groups of intercorrelated layers; singletons included
    pub groups: Vec<Vec<String>>,
    /// One layer per group when requested
    pub representatives: Option<Vec<String>>,
}

/// Group the layers of `stack` by correlation.
///
/// `rng` is drawn from only for cell subsampling and representative
/// selection.
pub fn remove_collinearity(
    stack: &EnvironmentalStack,
    params: &CollinearityParams,
    rng: &mut SpeciesRng,
) -> Result<CollinearityResult> {
    if !(params.cutoff > 0.0 && params.cutoff <= 1.0) {
        return Err(Error::config(
            "collinearity cutoff",
            format!("must lie in (0, 1], got {}", params.cutoff),
        ));
    }
    if stack.len() < 2 {
        return Err(Error::config("collinearity", "need at least 2 layers"));
    }
    if params.sample_points == Some(0) {
        return Err(Error::config("collinearity", "sample size must be positive"));
    }

    let variables: Vec<String> = stack.names().into_iter().map(String::from).collect();
    let cells = collect_cells(stack, params.sample_points, rng);
    if cells.len() < 3 {
        return Err(Error::InvalidInput(format!(
            "need at least 3 jointly valid cells, found {}",
            cells.len()
        )));
    }

    let p = variables.len();
    let mut correlation = vec![vec![1.0; p]; p];
    for i in 0..p {
        for j in (i + 1)..p {
            let r = pearson(&cells, i, j).ok_or_else(|| {
                Error::DegenerateRaster(format!(
                    "cannot correlate '{}' and '{}': a layer is constant",
                    variables[i], variables[j]
                ))
            })?;
            correlation[i][j] = r;
            correlation[j][i] = r;
        }
    }

    let clusters = complete_linkage(&correlation, 1.0 - params.cutoff);
    let groups: Vec<Vec<String>> = clusters
        .iter()
        .map(|members| members.iter().map(|&m| variables[m].clone()).collect())
        .collect();

    let representatives = if params.select_representatives {
        Some(
            groups
                .iter()
                .filter_map(|g| g.choose(rng).cloned())
                .collect(),
        )
    } else {
        None
    };

    tracing::info!(
        layers = p,
        groups = groups.len(),
        cutoff = params.cutoff,
        "collinearity groups computed"
    );

    Ok(CollinearityResult {
        variables,
        correlation,
        groups,
        representatives,
    })
}

/// Pearson correlation of columns `a` and `b`; `None` when either is constant
fn pearson(cells: &[Vec<f64>], a: usize, b: usize) -> Option<f64> {
    let n = cells.len() as f64;
    let (mut sum_a, mut sum_b) = (0.0, 0.0);
    for c in cells {
        sum_a += c[a];
        sum_b += c[b];
    }
    let (mean_a, mean_b) = (sum_a / n, sum_b / n);

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for c in cells {
        let (da, db) = (c[a] - mean_a, c[b] - mean_b);
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denom = (var_a * var_b).sqrt();
    if denom > 1e-15 {
        Some((cov / denom).clamp(-1.0, 1.0))
    } else {
        None
    }
}

/// Agglomerate while the closest pair of clusters (largest member distance)
/// is within `height`. Clusters come back ordered by their first member.
fn complete_linkage(correlation: &[Vec<f64>], height: f64) -> Vec<Vec<usize>> {
    let dist = |i: usize, j: usize| 1.0 - correlation[i][j].abs();
    let mut clusters: Vec<Vec<usize>> = (0..correlation.len()).map(|i| vec![i]).collect();

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for x in 0..clusters.len() {
            for y in (x + 1)..clusters.len() {
                let d = clusters[x]
                    .iter()
                    .flat_map(|&i| clusters[y].iter().map(move |&j| (i, j)))
                    .map(|(i, j)| dist(i, j))
                    .fold(0.0, f64::max);
                if best.map_or(true, |(_, _, bd)| d < bd) {
                    best = Some((x, y, d));
                }
            }
        }
        match best {
            Some((x, y, d)) if d <= height => {
                let merged = clusters.remove(y);
                clusters[x].extend(merged);
                clusters[x].sort_unstable();
            }
            _ => break,
        }
    }

    clusters.sort_by_key(|c| c[0]);
    clusters
}
