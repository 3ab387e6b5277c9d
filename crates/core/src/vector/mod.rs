//! Geographic areas used to restrict or bias a distribution
//!
//! Areas are resolved to a cell mask on a template grid. A cell belongs to
//! an area when its centre lies inside (or on the boundary of) the area.

use crate::error::{Error, Result};
use crate::raster::Raster;
use geo::{Intersects, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Axis-aligned rectangle in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Administrative scope of a named boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaScope {
    Country,
    Region,
    Continent,
}

impl fmt::Display for AreaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AreaScope::Country => "country",
            AreaScope::Region => "region",
            AreaScope::Continent => "continent",
        };
        f.write_str(s)
    }
}

/// Lookup from boundary names to polygon geometry.
///
/// World-boundary datasets live outside this crate; callers plug one in.
pub trait BoundaryProvider {
    fn boundary(&self, scope: AreaScope, name: &str) -> Option<MultiPolygon<f64>>;
}

/// In-memory boundary provider
#[derive(Debug, Clone, Default)]
pub struct StaticBoundaries {
    entries: HashMap<(AreaScope, String), MultiPolygon<f64>>,
}

impl StaticBoundaries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, scope: AreaScope, name: impl Into<String>, geometry: MultiPolygon<f64>) {
        self.entries.insert((scope, name.into()), geometry);
    }
}

impl BoundaryProvider for StaticBoundaries {
    fn boundary(&self, scope: AreaScope, name: &str) -> Option<MultiPolygon<f64>> {
        self.entries.get(&(scope, name.to_string())).cloned()
    }
}

/// A geographic area
#[derive(Debug, Clone)]
pub enum Area {
    Extent(Extent),
    Polygon(MultiPolygon<f64>),
    /// Union of named boundaries resolved through a [`BoundaryProvider`]
    Named { scope: AreaScope, names: Vec<String> },
    /// Raster whose valid, non-zero cells are inside
    Mask(Raster<f64>),
}

impl Area {
    pub fn polygon(polygon: Polygon<f64>) -> Self {
        Area::Polygon(MultiPolygon::new(vec![polygon]))
    }

    pub fn countries<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Area::Named {
            scope: AreaScope::Country,
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Short description for result records
    pub fn describe(&self) -> String {
        match self {
            Area::Extent(e) => format!(
                "extent [{}, {}] x [{}, {}]",
                e.min_x, e.max_x, e.min_y, e.max_y
            ),
            Area::Polygon(mp) => format!("polygon ({} parts)", mp.0.len()),
            Area::Named { scope, names } => format!("{} {}", scope, names.join(", ")),
            Area::Mask(_) => "raster mask".to_string(),
        }
    }

    /// Rasterise the area onto `template`: 1 inside, 0 outside.
    ///
    /// Named areas need a provider; unknown names are configuration errors.
    pub fn to_mask<T: crate::RasterElement>(
        &self,
        template: &Raster<T>,
        provider: Option<&dyn BoundaryProvider>,
    ) -> Result<Raster<u8>> {
        let (rows, cols) = template.shape();
        let mut mask: Raster<u8> = template.with_same_meta();

        match self {
            Area::Extent(extent) => {
                if extent.min_x > extent.max_x || extent.min_y > extent.max_y {
                    return Err(Error::config("area", "extent minimum exceeds maximum"));
                }
                fill_mask(&mut mask, rows, cols, |x, y| extent.contains(x, y))
            }
            Area::Polygon(mp) => fill_mask(&mut mask, rows, cols, |x, y| mp.intersects(&Point::new(x, y))),
            Area::Named { scope, names } => {
                let provider = provider.ok_or_else(|| {
                    Error::config("area", format!("no boundary provider to resolve {} names", scope))
                })?;
                if names.is_empty() {
                    return Err(Error::config("area", format!("empty {} list", scope)));
                }
                let mut parts = Vec::new();
                for name in names {
                    let geometry = provider.boundary(*scope, name).ok_or_else(|| {
                        Error::config("area", format!("unknown {} '{}'", scope, name))
                    })?;
                    parts.extend(geometry.0);
                }
                let union = MultiPolygon::new(parts);
                fill_mask(&mut mask, rows, cols, |x, y| union.intersects(&Point::new(x, y)))
            }
            Area::Mask(raster) => {
                template.check_aligned(raster)?;
                for ((r, c), cell) in mask.data_mut().indexed_iter_mut() {
                    let v = raster.data()[(r, c)];
                    *cell = u8::from(!raster.is_nodata(v) && v != 0.0);
                }
            }
        }

        Ok(mask)
    }
}

fn fill_mask<F>(mask: &mut Raster<u8>, rows: usize, cols: usize, inside: F)
where
    F: Fn(f64, f64) -> bool,
{
    let transform = *mask.transform();
    for row in 0..rows {
        for col in 0..cols {
            let (x, y) = transform.pixel_to_geo(col, row);
            mask.data_mut()[(row, col)] = u8::from(inside(x, y));
        }
    }
}
