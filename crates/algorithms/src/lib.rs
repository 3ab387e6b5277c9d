//! # Virtual species algorithms
//!
//! Generation of virtual species from environmental raster stacks.
//!
//! ## Pipeline
//!
//! - **response** / **suitability**: per-variable response functions, or a
//!   Gaussian niche in PCA space, combined into a suitability surface
//! - **rescale**: min-max normalisation to [0, 1]
//! - **conversion**: suitability to presence-absence (threshold, logistic or
//!   linear), optionally fitted to a target prevalence
//! - **limitation**: restrict presences to a geographic area
//! - **sampling**: presence-only or presence-absence occurrence records with
//!   bias, detection and error probabilities
//! - **preprocess**: NA synchronisation and collinearity screening
//!
//! Randomised operations take an explicit [`rng::SpeciesRng`] and record the
//! generator state they started from.

pub(crate) mod maybe_rayon;

pub mod conversion;
pub mod limitation;
pub mod ordination;
pub mod preprocess;
pub mod rescale;
pub mod response;
pub mod rng;
pub mod sampling;
pub mod special;
pub mod species;
pub mod suitability;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::conversion::{
        convert_suitability, convert_to_pa, AppliedCurve, Beta, ConversionMethod,
        ConversionParams, PaConversion,
    };
    pub use crate::limitation::{limit_distribution, DistributionLimit};
    pub use crate::ordination::{pca, PcaModel, PcaParams};
    pub use crate::preprocess::{
        remove_collinearity, synchronise_na, CollinearityParams, CollinearityResult,
    };
    pub use crate::rescale::{rescale, Rescale, RescaleRange};
    pub use crate::response::{
        CustomResponse, ResponseFunction, ResponseParameterBlock, ResponseRegistry,
    };
    pub use crate::rng::{seeded, RngSnapshot, SpeciesRng};
    pub use crate::sampling::{
        sample_occurrences, Bias, OccurrencePoint, SampleResult, SampleType, SamplingParams,
        SamplingSource,
    };
    pub use crate::species::{Approach, SpeciesDetails, VirtualSpecies};
    pub use crate::suitability::{
        generate_from_bca, generate_from_pca, generate_from_responses, generate_random_species,
        BcaSpeciesParams, Combination, NicheBreadth, PcaSpeciesParams, RandomApproach,
        RandomRelation, RandomSpeciesParams, ResponseParameters, ResponseSpeciesParams,
    };
    pub use virtualspecies_core::prelude::*;
}
