//! Gaussian niches in ordination space

use crate::rescale::RescaleRange;
use crate::rng::SpeciesRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{Error, Result};

/// How wide a randomly drawn niche is along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NicheBreadth {
    /// sd between 1% and 50% of the axis range
    #[default]
    Any,
    /// sd between 1% and 10% of the axis range
    Narrow,
    /// sd between 10% and 50% of the axis range
    Wide,
}

impl NicheBreadth {
    /// Window for sd as fractions of the axis range
    pub fn sd_window(self) -> (f64, f64) {
        match self {
            NicheBreadth::Any => (0.01, 0.5),
            NicheBreadth::Narrow => (0.01, 0.1),
            NicheBreadth::Wide => (0.1, 0.5),
        }
    }
}

/// Independent Gaussian along each selected axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNiche {
    pub axes: Vec<usize>,
    pub means: Vec<f64>,
    pub sds: Vec<f64>,
}

impl GaussianNiche {
    /// Validate the axis selection and any supplied means/sds
    pub(crate) fn check_request(axes: &[usize], means: Option<&[f64]>, sds: Option<&[f64]>) -> Result<()> {
        if axes.len() < 2 {
            return Err(Error::config(
                "niche axes",
                format!("at least 2 axes are required, got {}", axes.len()),
            ));
        }
        if axes.iter().enumerate().any(|(i, a)| axes[..i].contains(a)) {
            return Err(Error::config("niche axes", format!("duplicate axis in {:?}", axes)));
        }
        if let Some(means) = means {
            if means.len() != axes.len() {
                return Err(Error::config(
                    "niche means",
                    format!("{} means for {} axes", means.len(), axes.len()),
                ));
            }
            if means.iter().any(|m| !m.is_finite()) {
                return Err(Error::config("niche means", "means must be finite"));
            }
        }
        if let Some(sds) = sds {
            if sds.len() != axes.len() {
                return Err(Error::config(
                    "niche sds",
                    format!("{} sds for {} axes", sds.len(), axes.len()),
                ));
            }
            if sds.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
                return Err(Error::config("niche sds", "sds must be positive and finite"));
            }
        }
        Ok(())
    }

    /// Use supplied means/sds or draw them from the axis score ranges.
    ///
    /// Means are uniform within each axis range; sds uniform within the
    /// breadth window times the range.
    pub(crate) fn resolve(
        axes: &[usize],
        ranges: &[RescaleRange],
        breadth: NicheBreadth,
        means: Option<Vec<f64>>,
        sds: Option<Vec<f64>>,
        rng: &mut SpeciesRng,
    ) -> Result<Self> {
        Self::check_request(axes, means.as_deref(), sds.as_deref())?;

        let means = match means {
            Some(m) => m,
            None => ranges.iter().map(|r| uniform(rng, r.min, r.max)).collect(),
        };
        let sds = match sds {
            Some(s) => s,
            None => {
                let (lo, hi) = breadth.sd_window();
                ranges
                    .iter()
                    .map(|r| {
                        let sd = uniform(rng, lo * r.span(), hi * r.span());
                        if sd > 0.0 {
                            Ok(sd)
                        } else {
                            Err(Error::DegenerateRaster(
                                "niche axis has no spread, cannot draw a standard deviation".into(),
                            ))
                        }
                    })
                    .collect::<Result<Vec<f64>>>()?
            }
        };

        Ok(Self {
            axes: axes.to_vec(),
            means,
            sds,
        })
    }

    /// Un-normalised Gaussian product at one point in axis space
    #[inline]
    pub fn density(&self, scores: &[f64]) -> f64 {
        scores
            .iter()
            .zip(self.means.iter().zip(&self.sds))
            .map(|(s, (m, sd))| {
                let z = (s - m) / sd;
                (-0.5 * z * z).exp()
            })
            .product()
    }

    /// Suitability raster from per-axis score rasters (same order as `axes`)
    pub fn suitability(&self, scores: &[Raster<f64>]) -> Result<Raster<f64>> {
        let first = scores
            .first()
            .ok_or_else(|| Error::InvalidInput("no score rasters".into()))?;
        let cells = first.len();
        let mut point = vec![0.0; scores.len()];
        let data: Vec<f64> = (0..cells)
            .map(|i| {
                for (p, s) in point.iter_mut().zip(scores) {
                    *p = s.get_flat(i).unwrap_or(f64::NAN);
                }
                if point.iter().any(|v| v.is_nan()) {
                    f64::NAN
                } else {
                    self.density(&point)
                }
            })
            .collect();
        let mut raster = first.with_data(data)?;
        raster.set_nodata(Some(f64::NAN));
        Ok(raster)
    }
}

fn uniform(rng: &mut SpeciesRng, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        rng.gen_range(lo..=hi)
    } else {
        lo
    }
}
