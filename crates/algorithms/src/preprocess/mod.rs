//! Environmental stack preparation
//!
//! - **synchronise_na**: propagate NA cells across all layers
//! - **remove_collinearity**: group intercorrelated layers

mod collinearity;
mod na;

pub use collinearity::{remove_collinearity, CollinearityParams, CollinearityResult};
pub use na::{synchronise_na, SynchroniseNa};
