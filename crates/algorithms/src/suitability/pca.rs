//! Suitability from a Gaussian niche in PCA space

use crate::ordination::{pca, PcaModel, PcaParams};
use crate::rescale::{rescale_named, RescaleRange};
use crate::rng::{RngSnapshot, SpeciesRng};
use crate::species::{PcaDetails, SpeciesDetails, VirtualSpecies};
use crate::suitability::niche::{GaussianNiche, NicheBreadth};
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{EnvironmentalStack, Error, Result};

/// Parameters for [`generate_from_pca`]
#[derive(Debug, Clone)]
pub struct PcaSpeciesParams {
    /// Rescale suitability to [0, 1] (default: true)
    pub rescale: bool,
    pub niche_breadth: NicheBreadth,
    /// 0-based PCA axes the niche is defined on (default: first two)
    pub axes: Vec<usize>,
    /// Niche centre per axis; drawn within the axis score range when `None`
    pub means: Option<Vec<f64>>,
    /// Niche sd per axis; drawn from the breadth window when `None`
    pub sds: Option<Vec<f64>>,
    /// Pre-fitted PCA; fitted on `stack` when `None`
    pub pca: Option<PcaModel>,
    /// Fit the PCA on a random subset of cells (default: false)
    pub sample_points: bool,
    /// Subset size when `sample_points` is set (default: 10000)
    pub nb_points: usize,
}

impl Default for PcaSpeciesParams {
    fn default() -> Self {
        Self {
            rescale: true,
            niche_breadth: NicheBreadth::Any,
            axes: vec![0, 1],
            means: None,
            sds: None,
            pca: None,
            sample_points: false,
            nb_points: 10_000,
        }
    }
}

impl PcaSpeciesParams {
    pub(crate) fn pca_params(&self) -> Result<PcaParams> {
        if self.sample_points && self.nb_points == 0 {
            return Err(Error::config("nb_points", "must be positive when sampling points"));
        }
        Ok(PcaParams {
            sample_size: self.sample_points.then_some(self.nb_points),
        })
    }
}

/// Generate a virtual species from a Gaussian niche on PCA axes.
///
/// Suitability at a cell is the product of `exp(-z^2 / 2)` over the selected
/// axes, `z` being the cell's standardised distance to the niche mean. The
/// rescale runs over the whole grid even when the PCA was fitted on a
/// subsample.
pub fn generate_from_pca(
    stack: &EnvironmentalStack,
    params: PcaSpeciesParams,
    rng: &mut SpeciesRng,
) -> Result<VirtualSpecies> {
    if stack.is_empty() {
        return Err(Error::config("PCA species", "environmental stack is empty"));
    }
    GaussianNiche::check_request(&params.axes, params.means.as_deref(), params.sds.as_deref())?;
    let pca_params = params.pca_params()?;
    let n_axes = params.pca.as_ref().map_or(stack.len(), PcaModel::n_axes);
    check_axes(&params.axes, n_axes)?;

    let rng_snapshot = RngSnapshot::capture(rng);

    let model = match params.pca {
        Some(model) => model,
        None => pca(stack, pca_params, rng)?,
    };

    let scores = model.scores(stack, &params.axes)?;
    let ranges = scores
        .iter()
        .zip(&params.axes)
        .map(|(s, axis)| RescaleRange::of(s, &format!("PCA axis {}", axis)))
        .collect::<Result<Vec<_>>>()?;

    let niche = GaussianNiche::resolve(
        &params.axes,
        &ranges,
        params.niche_breadth,
        params.means,
        params.sds,
        rng,
    )?;
    tracing::debug!(axes = ?niche.axes, means = ?niche.means, sds = ?niche.sds, "PCA niche");

    let raw = niche.suitability(&scores)?;
    let (suitability, suitability_range) = finish(raw, params.rescale)?;

    let fitted_cells = model.fitted_cells();
    let details = PcaDetails {
        model,
        scores,
        niche,
        niche_breadth: params.niche_breadth,
        rescale: params.rescale,
        suitability_range,
        fitted_cells,
        rng_snapshot,
    };
    Ok(VirtualSpecies::new(SpeciesDetails::Pca(details), suitability))
}

/// A correlation PCA has one axis per variable
pub(crate) fn check_axes(axes: &[usize], n_axes: usize) -> Result<()> {
    match axes.iter().find(|&&a| a >= n_axes) {
        Some(bad) => Err(Error::config(
            "PCA projection",
            format!("axis {} requested but only {} axes exist", bad, n_axes),
        )),
        None => Ok(()),
    }
}

pub(crate) fn finish(raw: Raster<f64>, rescale: bool) -> Result<(Raster<f64>, Option<RescaleRange>)> {
    if rescale {
        let (out, range) = rescale_named(&raw, "niche suitability")?;
        Ok((out, Some(range)))
    } else {
        Ok((raw, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;
    use approx::assert_abs_diff_eq;
    use rand::RngCore;

    fn stack() -> EnvironmentalStack {
        let (rows, cols) = (12, 12);
        let band = |f: &dyn Fn(f64, f64) -> f64| {
            let data = (0..rows * cols)
                .map(|i| f((i / cols) as f64, (i % cols) as f64))
                .collect();
            Raster::from_vec(data, rows, cols).unwrap()
        };
        EnvironmentalStack::from_layers(vec![
            ("a", band(&|r, c| r + 0.3 * c)),
            ("b", band(&|r, c| c - 0.2 * r)),
            ("c", band(&|r, c| (r * c).sqrt())),
        ])
        .unwrap()
    }

    #[test]
    fn test_rescaled_suitability_in_unit_interval() {
        let mut rng = seeded(11);
        let sp = generate_from_pca(&stack(), PcaSpeciesParams::default(), &mut rng).unwrap();
        let (min, max) = sp.suitability().min_max().unwrap();
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn test_supplied_niche_is_kept() {
        let mut rng = seeded(1);
        let params = PcaSpeciesParams {
            means: Some(vec![0.0, 0.0]),
            sds: Some(vec![1.0, 2.0]),
            rescale: false,
            ..Default::default()
        };
        let sp = generate_from_pca(&stack(), params, &mut rng).unwrap();
        match sp.details() {
            SpeciesDetails::Pca(d) => {
                assert_eq!(d.niche.means, vec![0.0, 0.0]);
                assert_eq!(d.niche.sds, vec![1.0, 2.0]);
                assert!(d.suitability_range.is_none());
                // suitability is exp(-z^2/2) products, at most 1
                let (_, max) = sp.suitability().min_max().unwrap();
                assert!(max <= 1.0);
                let scores: Vec<f64> = d.scores.iter().map(|s| s.get(3, 4).unwrap()).collect();
                assert_abs_diff_eq!(
                    sp.suitability().get(3, 4).unwrap(),
                    d.niche.density(&scores),
                    epsilon = 1e-12
                );
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_single_axis_rejected() {
        let mut rng = seeded(1);
        let params = PcaSpeciesParams {
            axes: vec![0],
            ..Default::default()
        };
        let err = generate_from_pca(&stack(), params, &mut rng).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_axis_beyond_model_rejected_before_fitting() {
        let mut rng = seeded(1);
        let params = PcaSpeciesParams {
            axes: vec![0, 5],
            sample_points: true,
            nb_points: 20,
            ..Default::default()
        };
        let err = generate_from_pca(&stack(), params, &mut rng).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        // no cells were drawn for a fit
        assert_eq!(rng.next_u64(), seeded(1).next_u64());
    }

    #[test]
    fn test_reproducible_from_snapshot() {
        let mut rng = seeded(99);
        let first = generate_from_pca(&stack(), PcaSpeciesParams::default(), &mut rng).unwrap();
        let snapshot = match first.details() {
            SpeciesDetails::Pca(d) => d.rng_snapshot.clone(),
            _ => unreachable!(),
        };
        let mut replay = snapshot.restore();
        let second = generate_from_pca(&stack(), PcaSpeciesParams::default(), &mut replay).unwrap();
        assert_eq!(first.suitability().to_vec(), second.suitability().to_vec());
    }

    #[test]
    fn test_sampled_fit_records_cell_count() {
        let mut rng = seeded(5);
        let params = PcaSpeciesParams {
            sample_points: true,
            nb_points: 50,
            ..Default::default()
        };
        let sp = generate_from_pca(&stack(), params, &mut rng).unwrap();
        match sp.details() {
            SpeciesDetails::Pca(d) => assert_eq!(d.fitted_cells, 50),
            _ => unreachable!(),
        }
        // rescale covers the full grid
        assert_eq!(sp.suitability().min_max(), Some((0.0, 1.0)));
    }
}
