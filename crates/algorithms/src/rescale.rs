//! Min-max rescaling of suitability surfaces
//!
//! `(v - min) / (max - min)` over valid cells. The cells holding the global
//! minimum and maximum map to exactly 0 and 1, and rescaling an already
//! rescaled surface returns it unchanged.

use serde::{Deserialize, Serialize};
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{Algorithm, Error, Result};

/// Range a raster was rescaled from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RescaleRange {
    pub min: f64,
    pub max: f64,
}

impl RescaleRange {
    /// Observed range of `raster`'s valid cells
    pub fn of(raster: &Raster<f64>, what: &str) -> Result<Self> {
        let (min, max) = raster.min_max().ok_or_else(|| {
            Error::DegenerateRaster(format!("{} has no valid cells", what))
        })?;
        Ok(Self { min, max })
    }

    /// Union of two ranges
    pub fn union(self, other: RescaleRange) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Rescale `raster` to [0, 1] using its own range.
///
/// Fails with [`Error::DegenerateRaster`] when the raster is constant or
/// entirely NA.
pub fn rescale(raster: &Raster<f64>) -> Result<(Raster<f64>, RescaleRange)> {
    rescale_named(raster, "raster")
}

/// [`rescale`] with a name for error messages
pub fn rescale_named(raster: &Raster<f64>, what: &str) -> Result<(Raster<f64>, RescaleRange)> {
    let range = RescaleRange::of(raster, what)?;
    let out = rescale_with(raster, range, what)?;
    Ok((out, range))
}

/// Rescale `raster` with an externally supplied range
pub fn rescale_with(raster: &Raster<f64>, range: RescaleRange, what: &str) -> Result<Raster<f64>> {
    let span = range.span();
    if !span.is_finite() || span <= 0.0 {
        return Err(Error::DegenerateRaster(format!(
            "{} is constant (min = max = {}), cannot rescale",
            what, range.min
        )));
    }
    Ok(raster.map_valid(|v| (v - range.min) / span))
}

/// Min-max rescaling as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Rescale;

impl Algorithm for Rescale {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Rescale"
    }

    fn description(&self) -> &'static str {
        "Min-max normalisation of a raster to [0, 1]"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        rescale(&input).map(|(r, _)| r)
    }
}
