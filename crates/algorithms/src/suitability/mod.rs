//! Suitability generation
//!
//! Four ways to build a virtual species' suitability surface:
//! - **response**: one response function per environmental layer, combined
//!   by product, sum or formula
//! - **pca**: Gaussian niche on the principal components of the stack
//! - **bca**: Gaussian niche on a PCA pooled over current and future stacks
//! - **random**: approach and parameters drawn at random

mod bca;
mod formula;
mod niche;
mod pca;
mod random;
mod response;

pub use bca::{generate_from_bca, BcaSpeciesParams};
pub use formula::{BoundFormula, Formula};
pub use niche::{GaussianNiche, NicheBreadth};
pub use pca::{generate_from_pca, PcaSpeciesParams};
pub use random::{generate_random_species, RandomApproach, RandomRelation, RandomSpeciesParams};
pub use response::{generate_from_responses, Combination, ResponseParameters, ResponseSpeciesParams};
