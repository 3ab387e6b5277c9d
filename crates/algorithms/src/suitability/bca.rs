//! Suitability from a Gaussian niche on a two-period ordination
//!
//! The PCA is fitted on the pooled cells of a current and a future stack,
//! so both periods share one environmental space. The niche drawn in that
//! space yields a current and a future suitability surface.

use crate::ordination::{collect_cells, pca_from_cells};
use crate::rescale::{rescale_with, RescaleRange};
use crate::rng::{RngSnapshot, SpeciesRng};
use crate::species::{BcaDetails, SpeciesDetails, VirtualSpecies};
use crate::suitability::niche::{GaussianNiche, NicheBreadth};
use crate::suitability::pca::check_axes;
use crate::suitability::PcaSpeciesParams;
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{EnvironmentalStack, Error, Result};

/// Parameters for [`generate_from_bca`]
#[derive(Debug, Clone)]
pub struct BcaSpeciesParams {
    /// Rescale both surfaces to [0, 1] with their joint range (default: true)
    pub rescale: bool,
    pub niche_breadth: NicheBreadth,
    pub axes: Vec<usize>,
    pub means: Option<Vec<f64>>,
    pub sds: Option<Vec<f64>>,
    /// Fit on a random subset of each period's cells (default: false)
    pub sample_points: bool,
    /// Cells drawn per period when `sample_points` is set (default: 10000)
    pub nb_points: usize,
}

impl Default for BcaSpeciesParams {
    fn default() -> Self {
        let pca = PcaSpeciesParams::default();
        Self {
            rescale: pca.rescale,
            niche_breadth: pca.niche_breadth,
            axes: pca.axes,
            means: None,
            sds: None,
            sample_points: pca.sample_points,
            nb_points: pca.nb_points,
        }
    }
}

/// Generate a virtual species from current and future environmental stacks.
///
/// Both stacks must hold the same variable names; their grids may differ.
/// The species' suitability is the current surface; the future surface is
/// kept in [`BcaDetails::future_suitability`].
pub fn generate_from_bca(
    current: &EnvironmentalStack,
    future: &EnvironmentalStack,
    params: BcaSpeciesParams,
    rng: &mut SpeciesRng,
) -> Result<VirtualSpecies> {
    if current.is_empty() {
        return Err(Error::config("BCA species", "current stack is empty"));
    }
    let future = reorder_like(current, future)?;
    GaussianNiche::check_request(&params.axes, params.means.as_deref(), params.sds.as_deref())?;
    check_axes(&params.axes, current.len())?;
    if params.sample_points && params.nb_points == 0 {
        return Err(Error::config("nb_points", "must be positive when sampling points"));
    }
    let sample_size = params.sample_points.then_some(params.nb_points);

    let rng_snapshot = RngSnapshot::capture(rng);

    let mut cells = collect_cells(current, sample_size, rng);
    let n_current = cells.len();
    cells.extend(collect_cells(&future, sample_size, rng));
    let stack_lengths = [n_current, cells.len() - n_current];
    tracing::info!(
        current = stack_lengths[0],
        future = stack_lengths[1],
        "fitting PCA on pooled current and future cells"
    );

    let names = current.names().into_iter().map(String::from).collect();
    let model = pca_from_cells(names, &cells)?;

    let current_scores = model.scores(current, &params.axes)?;
    let future_scores = model.scores(&future, &params.axes)?;

    let ranges = current_scores
        .iter()
        .zip(&future_scores)
        .zip(&params.axes)
        .map(|((c, f), axis)| {
            let what = format!("BCA axis {}", axis);
            Ok(RescaleRange::of(c, &what)?.union(RescaleRange::of(f, &what)?))
        })
        .collect::<Result<Vec<_>>>()?;

    let niche = GaussianNiche::resolve(
        &params.axes,
        &ranges,
        params.niche_breadth,
        params.means,
        params.sds,
        rng,
    )?;

    let current_raw = niche.suitability(&current_scores)?;
    let future_raw = niche.suitability(&future_scores)?;

    let (suitability, future_suitability, suitability_range) = if params.rescale {
        let range = RescaleRange::of(&current_raw, "current suitability")?
            .union(RescaleRange::of(&future_raw, "future suitability")?);
        (
            rescale_with(&current_raw, range, "current suitability")?,
            rescale_with(&future_raw, range, "future suitability")?,
            Some(range),
        )
    } else {
        (current_raw, future_raw, None)
    };

    let details = BcaDetails {
        model,
        niche,
        niche_breadth: params.niche_breadth,
        stack_lengths,
        future_suitability,
        rescale: params.rescale,
        suitability_range,
        rng_snapshot,
    };
    Ok(VirtualSpecies::new(SpeciesDetails::Bca(details), suitability))
}

/// Copy of `future` with its layers in `current`'s order
fn reorder_like(current: &EnvironmentalStack, future: &EnvironmentalStack) -> Result<EnvironmentalStack> {
    if current.len() != future.len() {
        return Err(Error::config(
            "BCA stacks",
            format!("current has {} layers, future has {}", current.len(), future.len()),
        ));
    }
    let layers: Vec<(String, Raster<f64>)> = current
        .names()
        .into_iter()
        .map(|name| {
            future
                .get(name)
                .cloned()
                .map(|r| (name.to_string(), r))
                .ok_or_else(|| Error::config("BCA stacks", format!("future stack has no layer '{}'", name)))
        })
        .collect::<Result<_>>()?;
    EnvironmentalStack::from_layers(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;

    fn band(rows: usize, cols: usize, f: impl Fn(f64, f64) -> f64) -> Raster<f64> {
        let data = (0..rows * cols)
            .map(|i| f((i / cols) as f64, (i % cols) as f64))
            .collect();
        Raster::from_vec(data, rows, cols).unwrap()
    }

    fn stacks() -> (EnvironmentalStack, EnvironmentalStack) {
        let current = EnvironmentalStack::from_layers(vec![
            ("temp", band(10, 10, |r, c| r + 0.5 * c)),
            ("prec", band(10, 10, |r, c| 100.0 - 3.0 * c + r)),
        ])
        .unwrap();
        // warmer and drier, listed in a different order
        let future = EnvironmentalStack::from_layers(vec![
            ("prec", band(8, 9, |r, c| 90.0 - 3.0 * c + r)),
            ("temp", band(8, 9, |r, c| r + 0.5 * c + 2.0)),
        ])
        .unwrap();
        (current, future)
    }

    #[test]
    fn test_joint_rescale_and_lengths() {
        let (current, future) = stacks();
        let mut rng = seeded(8);
        let sp = generate_from_bca(&current, &future, BcaSpeciesParams::default(), &mut rng).unwrap();
        let d = match sp.details() {
            SpeciesDetails::Bca(d) => d,
            other => panic!("unexpected details {:?}", other),
        };
        assert_eq!(d.stack_lengths, [100, 72]);
        assert_eq!(d.future_suitability.shape(), (8, 9));

        let (cmin, cmax) = sp.suitability().min_max().unwrap();
        let (fmin, fmax) = d.future_suitability.min_max().unwrap();
        assert!(cmin >= 0.0 && fmin >= 0.0 && cmax <= 1.0 && fmax <= 1.0);
        // joint range: 0 and 1 are reached somewhere across the two periods
        assert_eq!(cmin.min(fmin), 0.0);
        assert_eq!(cmax.max(fmax), 1.0);
    }

    #[test]
    fn test_mismatched_variables() {
        let (current, _) = stacks();
        let future = EnvironmentalStack::from_layers(vec![
            ("temp", band(4, 4, |r, _| r)),
            ("elev", band(4, 4, |_, c| c)),
        ])
        .unwrap();
        let mut rng = seeded(1);
        let err = generate_from_bca(&current, &future, BcaSpeciesParams::default(), &mut rng).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_axis_beyond_variables() {
        let (current, future) = stacks();
        let params = BcaSpeciesParams {
            axes: vec![0, 2],
            ..Default::default()
        };
        let mut rng = seeded(1);
        let err = generate_from_bca(&current, &future, params, &mut rng).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
