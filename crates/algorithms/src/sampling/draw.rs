//! Weighted cell draws

use crate::rng::SpeciesRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index;
use virtualspecies_core::{Error, Result};

/// Draw `k` cells from `candidates` (flat indices) with probability
/// proportional to `weights[cell]`.
///
/// Cells with zero weight are never drawn. Without replacement, asking for
/// more cells than carry positive weight fails.
pub(crate) fn draw_cells(
    candidates: &[usize],
    weights: &[f64],
    k: usize,
    replacement: bool,
    rng: &mut SpeciesRng,
) -> Result<Vec<usize>> {
    if k == 0 {
        return Ok(Vec::new());
    }
    if candidates.is_empty() || (!replacement && k > candidates.len()) {
        return Err(Error::InsufficientCells {
            requested: k,
            available: candidates.len(),
        });
    }

    let eligible: Vec<(usize, f64)> = candidates
        .iter()
        .map(|&c| (c, weights[c]))
        .filter(|(_, w)| *w > 0.0)
        .collect();
    if eligible.is_empty() {
        return Err(Error::DegenerateWeights(format!(
            "all {} eligible cells have zero sampling weight",
            candidates.len()
        )));
    }

    if replacement {
        let dist = WeightedIndex::new(eligible.iter().map(|(_, w)| *w))
            .map_err(|e| Error::DegenerateWeights(e.to_string()))?;
        Ok((0..k).map(|_| eligible[dist.sample(rng)].0).collect())
    } else {
        if k > eligible.len() {
            return Err(Error::InsufficientCells {
                requested: k,
                available: eligible.len(),
            });
        }
        let picked = index::sample_weighted(rng, eligible.len(), |i| eligible[i].1, k)
            .map_err(|e| Error::DegenerateWeights(e.to_string()))?;
        Ok(picked.into_iter().map(|i| eligible[i].0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;
    use std::collections::HashSet;

    #[test]
    fn test_without_replacement_unique() {
        let candidates: Vec<usize> = (0..40).collect();
        let weights = vec![1.0; 40];
        let mut rng = seeded(1);
        let cells = draw_cells(&candidates, &weights, 40, false, &mut rng).unwrap();
        let unique: HashSet<_> = cells.iter().collect();
        assert_eq!(unique.len(), 40);
    }

    #[test]
    fn test_zero_weight_cells_never_drawn() {
        let candidates: Vec<usize> = (0..10).collect();
        let mut weights = vec![0.0; 10];
        weights[3] = 1.0;
        weights[7] = 2.0;
        let mut rng = seeded(2);
        let cells = draw_cells(&candidates, &weights, 200, true, &mut rng).unwrap();
        assert!(cells.iter().all(|c| *c == 3 || *c == 7));
        let sevens = cells.iter().filter(|c| **c == 7).count();
        assert!(sevens > 100);
    }

    #[test]
    fn test_errors() {
        let candidates = [0, 1, 2];
        let mut rng = seeded(3);
        assert!(matches!(
            draw_cells(&candidates, &[1.0; 3], 4, false, &mut rng),
            Err(Error::InsufficientCells { requested: 4, available: 3 })
        ));
        assert!(matches!(
            draw_cells(&candidates, &[0.0; 3], 2, true, &mut rng),
            Err(Error::DegenerateWeights(_))
        ));
        assert!(matches!(
            draw_cells(&candidates, &[0.0, 1.0, 0.0], 2, false, &mut rng),
            Err(Error::InsufficientCells { requested: 2, available: 1 })
        ));
    }
}
