//! # Virtual species core
//!
//! Core types shared by the virtual species generators.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid
//! - `GeoTransform` and `CRS`: grid georeferencing metadata
//! - `EnvironmentalStack`: named, co-registered environmental layers
//! - `Area`: extents, polygons and named boundaries rasterised to masks
//! - The `Algorithm` trait for deterministic raster transforms

pub mod crs;
pub mod error;
pub mod raster;
pub mod stack;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use stack::EnvironmentalStack;
pub use vector::{Area, AreaScope, BoundaryProvider, Extent, StaticBoundaries};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::stack::EnvironmentalStack;
    pub use crate::vector::{Area, AreaScope, BoundaryProvider, Extent};
    pub use crate::Algorithm;
}

/// Deterministic raster transform with named parameters.
///
/// Randomised operations take an explicit generator instead and do not
/// implement this trait.
pub trait Algorithm {
    type Input;
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    type Error: std::error::Error;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
