//! Per-cell sampling weights

use virtualspecies_core::raster::Raster;
use virtualspecies_core::{Area, BoundaryProvider, Error, Result};

/// Spatial sampling bias
#[derive(Debug, Clone, Default)]
pub enum Bias {
    /// Every eligible cell has weight 1
    #[default]
    None,
    /// Weight `strength` inside `area`, 1 elsewhere
    Area { area: Area, strength: f64 },
    /// User-supplied weights (NA counts as 0)
    Manual(Raster<f64>),
}

impl Bias {
    pub fn is_active(&self) -> bool {
        !matches!(self, Bias::None)
    }

    pub fn describe(&self) -> String {
        match self {
            Bias::None => "no bias".to_string(),
            Bias::Area { area, strength } => format!("{} (strength {})", area.describe(), strength),
            Bias::Manual(_) => "manual weights".to_string(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Bias::None => Ok(()),
            Bias::Area { strength, .. } => {
                if strength.is_finite() && *strength >= 0.0 {
                    Ok(())
                } else {
                    Err(Error::config(
                        "bias strength",
                        format!("must be finite and non-negative, got {}", strength),
                    ))
                }
            }
            Bias::Manual(weights) => {
                if weights.data().iter().any(|w| w.is_finite() && *w < 0.0) {
                    Err(Error::InvalidInput("manual sampling weights must be non-negative".into()))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Row-major weight per cell of `template`
    pub(crate) fn weights(
        &self,
        template: &Raster<f64>,
        provider: Option<&dyn BoundaryProvider>,
    ) -> Result<Vec<f64>> {
        match self {
            Bias::None => Ok(vec![1.0; template.len()]),
            Bias::Area { area, strength } => {
                let mask = area.to_mask(template, provider)?;
                Ok(mask
                    .data()
                    .iter()
                    .map(|inside| if *inside == 1 { *strength } else { 1.0 })
                    .collect())
            }
            Bias::Manual(weights) => {
                template.check_aligned(weights)?;
                Ok(weights
                    .data()
                    .iter()
                    .map(|w| if weights.is_nodata(*w) { 0.0 } else { *w })
                    .collect())
            }
        }
    }
}
