//! The virtual species record
//!
//! A species is created by one of the suitability generators, then
//! augmented by presence-absence conversion and optionally by distribution
//! limiting. Augmentation adds fields and never rewrites the suitability
//! surface or the generation details.

use crate::conversion::PaConversion;
use crate::limitation::DistributionLimit;
use crate::ordination::PcaModel;
use crate::rescale::RescaleRange;
use crate::response::ResponseParameterBlock;
use crate::rng::RngSnapshot;
use crate::suitability::{Combination, GaussianNiche, NicheBreadth};
use serde::{Deserialize, Serialize};
use std::fmt;
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{Error, Result};

/// Generation approach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Approach {
    Response,
    Pca,
    Bca,
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Approach::Response => "response",
            Approach::Pca => "pca",
            Approach::Bca => "bca",
        })
    }
}

/// Details of a species built from per-variable responses
#[derive(Debug, Clone)]
pub struct ResponseDetails {
    pub combination: Combination,
    /// Parameter blocks in stack order, with observed layer ranges filled in
    pub parameters: Vec<(String, ResponseParameterBlock)>,
    pub rescale: bool,
    pub rescale_each_response: bool,
    /// Range of each response before per-response rescaling
    pub response_ranges: Vec<(String, RescaleRange)>,
    /// Range of the combined surface before final rescaling
    pub suitability_range: Option<RescaleRange>,
}

/// Details of a species built in PCA space
#[derive(Debug, Clone)]
pub struct PcaDetails {
    pub model: PcaModel,
    /// Score rasters for the niche axes, in `niche.axes` order
    pub scores: Vec<Raster<f64>>,
    pub niche: GaussianNiche,
    pub niche_breadth: NicheBreadth,
    pub rescale: bool,
    pub suitability_range: Option<RescaleRange>,
    /// Number of cells the PCA was fitted on
    pub fitted_cells: usize,
    pub rng_snapshot: RngSnapshot,
}

/// Details of a species built in a two-period (current/future) ordination
#[derive(Debug, Clone)]
pub struct BcaDetails {
    pub model: PcaModel,
    pub niche: GaussianNiche,
    pub niche_breadth: NicheBreadth,
    /// Number of cells contributed by the current and future stacks
    pub stack_lengths: [usize; 2],
    pub future_suitability: Raster<f64>,
    pub rescale: bool,
    pub suitability_range: Option<RescaleRange>,
    pub rng_snapshot: RngSnapshot,
}

/// Approach-specific generation record
#[derive(Debug, Clone)]
pub enum SpeciesDetails {
    Response(ResponseDetails),
    Pca(PcaDetails),
    Bca(BcaDetails),
}

/// A generated virtual species
#[derive(Debug, Clone)]
pub struct VirtualSpecies {
    details: SpeciesDetails,
    suitability: Raster<f64>,
    conversion: Option<PaConversion>,
    limitation: Option<DistributionLimit>,
}

impl VirtualSpecies {
    pub(crate) fn new(details: SpeciesDetails, suitability: Raster<f64>) -> Self {
        Self {
            details,
            suitability,
            conversion: None,
            limitation: None,
        }
    }

    pub fn approach(&self) -> Approach {
        match self.details {
            SpeciesDetails::Response(_) => Approach::Response,
            SpeciesDetails::Pca(_) => Approach::Pca,
            SpeciesDetails::Bca(_) => Approach::Bca,
        }
    }

    pub fn details(&self) -> &SpeciesDetails {
        &self.details
    }

    pub fn suitability(&self) -> &Raster<f64> {
        &self.suitability
    }

    pub fn conversion(&self) -> Option<&PaConversion> {
        self.conversion.as_ref()
    }

    pub fn limitation(&self) -> Option<&DistributionLimit> {
        self.limitation.as_ref()
    }

    pub fn pa_raster(&self) -> Option<&Raster<f64>> {
        self.conversion.as_ref().map(|c| &c.pa_raster)
    }

    pub fn probability_of_occurrence(&self) -> Option<&Raster<f64>> {
        self.conversion.as_ref().map(|c| &c.probability_of_occurrence)
    }

    pub fn occupied_area(&self) -> Option<&Raster<f64>> {
        self.limitation.as_ref().map(|l| &l.occupied_area)
    }

    /// Presence-absence raster to sample from: the occupied area when the
    /// distribution was limited, else the converted presence-absence raster
    pub fn distribution(&self) -> Result<&Raster<f64>> {
        self.occupied_area()
            .or_else(|| self.pa_raster())
            .ok_or_else(|| {
                Error::InvalidInput(
                    "species has no presence-absence raster; convert it before sampling".into(),
                )
            })
    }

    /// Attach a conversion. A previous limitation is kept and re-applied to
    /// the new presences.
    pub(crate) fn set_conversion(&mut self, conversion: PaConversion) {
        if let Some(limit) = self.limitation.as_mut() {
            tracing::debug!(area = %limit.area, "re-applying distribution limit to new conversion");
            limit.reapply(&conversion.pa_raster);
        }
        self.conversion = Some(conversion);
    }

    pub(crate) fn set_limitation(&mut self, limitation: DistributionLimit) {
        self.limitation = Some(limitation);
    }
}
