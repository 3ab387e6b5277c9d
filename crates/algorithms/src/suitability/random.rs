//! Random virtual species
//!
//! Picks an approach, draws its parameters from the observed layer ranges,
//! and by default converts the result to presence-absence.

use crate::conversion::{convert_to_pa, ConversionParams};
use crate::response::{ResponseParameterBlock, ResponseRegistry};
use crate::rng::SpeciesRng;
use crate::species::VirtualSpecies;
use crate::suitability::niche::NicheBreadth;
use crate::suitability::pca::{generate_from_pca, PcaSpeciesParams};
use crate::suitability::response::{
    generate_from_responses, Combination, ResponseParameters, ResponseSpeciesParams,
};
use rand::seq::SliceRandom;
use rand::Rng;
use virtualspecies_core::{EnvironmentalStack, Error, Result};

/// Layers above which the automatic choice switches to PCA
const PCA_LAYER_THRESHOLD: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RandomApproach {
    /// PCA for more than six layers, responses otherwise
    #[default]
    Automatic,
    Response,
    Pca,
}

/// Response shapes a random species may draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomRelation {
    Gaussian,
    Linear,
    Logistic,
    Quadratic,
}

/// Parameters for [`generate_random_species`]
#[derive(Debug, Clone)]
pub struct RandomSpeciesParams {
    pub approach: RandomApproach,
    pub rescale: bool,
    pub rescale_each_response: bool,
    /// Shapes drawn per layer for the response approach
    pub relations: Vec<RandomRelation>,
    /// Quadratic responses are bell-shaped rather than of random sign
    pub realistic_sp: bool,
    /// Fixed combination; product or sum at random when `None`
    pub species_type: Option<Combination>,
    pub niche_breadth: NicheBreadth,
    pub sample_points: bool,
    pub nb_points: usize,
    /// Convert to presence-absence after generation (default: true)
    pub convert_to_pa: bool,
    pub conversion: ConversionParams,
}

impl Default for RandomSpeciesParams {
    fn default() -> Self {
        Self {
            approach: RandomApproach::Automatic,
            rescale: true,
            rescale_each_response: true,
            relations: vec![
                RandomRelation::Gaussian,
                RandomRelation::Linear,
                RandomRelation::Logistic,
                RandomRelation::Quadratic,
            ],
            realistic_sp: true,
            species_type: None,
            niche_breadth: NicheBreadth::Any,
            sample_points: false,
            nb_points: 10_000,
            convert_to_pa: true,
            conversion: ConversionParams::default(),
        }
    }
}

/// Generate a virtual species with randomly drawn parameters
pub fn generate_random_species(
    stack: &EnvironmentalStack,
    params: RandomSpeciesParams,
    rng: &mut SpeciesRng,
) -> Result<VirtualSpecies> {
    if stack.is_empty() {
        return Err(Error::config("random species", "environmental stack is empty"));
    }
    let use_pca = match params.approach {
        RandomApproach::Automatic => stack.len() > PCA_LAYER_THRESHOLD,
        RandomApproach::Response => false,
        RandomApproach::Pca => true,
    };
    if use_pca && stack.len() < 2 {
        return Err(Error::config("random species", "the PCA approach needs at least 2 layers"));
    }
    if !use_pca && params.relations.is_empty() {
        return Err(Error::config("random species", "no response relations to draw from"));
    }

    let species = if use_pca {
        tracing::info!(layers = stack.len(), "random species: PCA approach");
        let pca_params = PcaSpeciesParams {
            rescale: params.rescale,
            niche_breadth: params.niche_breadth,
            sample_points: params.sample_points,
            nb_points: params.nb_points,
            ..Default::default()
        };
        generate_from_pca(stack, pca_params, rng)?
    } else {
        tracing::info!(layers = stack.len(), "random species: response approach");
        let mut parameters = ResponseParameters::new();
        for (name, layer) in stack.iter() {
            let (min, max) = layer
                .min_max()
                .ok_or_else(|| Error::DegenerateRaster(format!("layer '{}' has no valid cells", name)))?;
            if max <= min {
                return Err(Error::DegenerateRaster(format!(
                    "layer '{}' is constant, cannot draw a response",
                    name
                )));
            }
            let relation = *params
                .relations
                .choose(rng)
                .ok_or_else(|| Error::config("random species", "no response relations to draw from"))?;
            parameters.insert(
                name.to_string(),
                draw_response(relation, min, max, params.realistic_sp, rng),
            );
        }
        let combination = match params.species_type.clone() {
            Some(c) => c,
            None if rng.gen_bool(0.5) => Combination::Multiplicative,
            None => Combination::Additive,
        };
        let response_params = ResponseSpeciesParams {
            rescale: params.rescale,
            rescale_each_response: params.rescale_each_response,
            combination,
        };
        generate_from_responses(stack, &parameters, response_params, &ResponseRegistry::default())?
    };

    if params.convert_to_pa {
        convert_to_pa(&species, &params.conversion, rng)
    } else {
        Ok(species)
    }
}

/// Draw one response within the observed range `[min, max]`
fn draw_response(relation: RandomRelation, min: f64, max: f64, realistic: bool, rng: &mut SpeciesRng) -> ResponseParameterBlock {
    let span = max - min;
    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    match relation {
        RandomRelation::Gaussian => {
            let mean = rng.gen_range(min..=max);
            let sd = rng.gen_range(span / 100.0..=span / 2.0);
            ResponseParameterBlock::gaussian(mean, sd)
        }
        RandomRelation::Linear => ResponseParameterBlock::linear(sign / span, 0.0),
        RandomRelation::Logistic => {
            let beta = rng.gen_range(min..=max);
            let alpha = sign * rng.gen_range(span / 100.0..=span / 10.0);
            ResponseParameterBlock::logistic(alpha, beta)
        }
        RandomRelation::Quadratic => {
            // a (x - v)^2 + k, peaked at v when a < 0
            let vertex = rng.gen_range(min..=max);
            let a = (if realistic { -1.0 } else { sign }) / (span * span);
            let k = if a < 0.0 { 1.0 } else { 0.0 };
            ResponseParameterBlock::quadratic(a, -2.0 * a * vertex, a * vertex * vertex + k)
        }
    }
}
