//! Distribution limiting
//!
//! Restricts a converted species' presences to a geographic area, e.g. the
//! countries it is known from or a dispersal extent. Presences outside the
//! area become absences; NA cells stay NA.

use crate::species::VirtualSpecies;
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{Area, BoundaryProvider, Error, Result};

/// Result of limiting a distribution
#[derive(Debug, Clone)]
pub struct DistributionLimit {
    /// Description of the area applied
    pub area: String,
    /// 1 inside the area, 0 outside
    pub mask: Raster<u8>,
    /// Presence-absence raster restricted to the area
    pub occupied_area: Raster<f64>,
    /// Fraction of valid cells still present
    pub occupied_prevalence: f64,
}

impl DistributionLimit {
    pub(crate) fn new(area: String, mask: Raster<u8>, pa: &Raster<f64>) -> Self {
        let mut limit = Self {
            area,
            mask,
            occupied_area: pa.clone(),
            occupied_prevalence: 0.0,
        };
        limit.reapply(pa);
        limit
    }

    /// Rebuild the occupied area from a new presence-absence raster
    pub(crate) fn reapply(&mut self, pa: &Raster<f64>) {
        let mut occupied = pa.clone();
        let mut valid = 0usize;
        let mut present = 0usize;
        for (cell, inside) in occupied.data_mut().iter_mut().zip(self.mask.data().iter()) {
            if cell.is_nan() {
                continue;
            }
            valid += 1;
            if *inside == 0 {
                *cell = 0.0;
            }
            present += (*cell == 1.0) as usize;
        }
        if present == 0 {
            tracing::warn!(area = %self.area, "no presences left inside the limiting area");
        }
        self.occupied_area = occupied;
        self.occupied_prevalence = if valid > 0 { present as f64 / valid as f64 } else { 0.0 };
    }
}

/// Limit a converted species to `area`.
///
/// Named areas are resolved through `provider`.
///
/// # Errors
/// - [`Error::InvalidInput`] if the species has no presence-absence raster
/// - [`Error::Configuration`] for unknown area names or a missing provider
pub fn limit_distribution(
    species: &VirtualSpecies,
    area: &Area,
    provider: Option<&dyn BoundaryProvider>,
) -> Result<VirtualSpecies> {
    let pa = species.pa_raster().ok_or_else(|| {
        Error::InvalidInput("species must be converted to presence-absence before limiting".into())
    })?;
    let mask = area.to_mask(pa, provider)?;
    let limit = DistributionLimit::new(area.describe(), mask, pa);
    let mut out = species.clone();
    out.set_limitation(limit);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{convert_to_pa, Beta, ConversionMethod, ConversionParams};
    use crate::rescale::rescale;
    use crate::rng::seeded;
    use crate::species::{ResponseDetails, SpeciesDetails};
    use crate::suitability::Combination;
    use geo::{coord, LineString, Polygon};
    use virtualspecies_core::{AreaScope, Extent, GeoTransform, StaticBoundaries};

    fn converted() -> VirtualSpecies {
        // 4x4 grid on x in [0, 4], y in [0, 4]; suitability grows with column
        let mut s = Raster::from_vec((0..16).map(|i| (i % 4) as f64).collect(), 4, 4).unwrap();
        s.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        s.set(0, 0, f64::NAN).unwrap();
        let (s, range) = rescale(&s).unwrap();
        let details = SpeciesDetails::Response(ResponseDetails {
            combination: Combination::Multiplicative,
            parameters: vec![],
            rescale: true,
            rescale_each_response: true,
            response_ranges: vec![],
            suitability_range: Some(range),
        });
        let sp = VirtualSpecies::new(details, s);
        let params = ConversionParams {
            method: ConversionMethod::Threshold { beta: Beta::Value(0.5) },
            ..Default::default()
        };
        convert_to_pa(&sp, &params, &mut seeded(0)).unwrap()
    }

    #[test]
    fn test_extent_limit() {
        let sp = converted();
        // left three columns only
        let area = Area::Extent(Extent::new(0.0, 0.0, 3.0, 4.0));
        let limited = limit_distribution(&sp, &area, None).unwrap();
        let occ = limited.occupied_area().unwrap();

        for row in 0..4 {
            assert_eq!(occ.get(row, 3).unwrap(), 0.0);
            assert_eq!(occ.get(row, 2).unwrap(), 1.0);
        }
        assert!(occ.get(0, 0).unwrap().is_nan());
        // conversion record kept
        assert!(limited.pa_raster().is_some());
        assert_eq!(limited.distribution().unwrap().to_vec()[3], 0.0);
    }

    #[test]
    fn test_named_area() {
        let sp = converted();
        let mut boundaries = StaticBoundaries::new();
        let square = Polygon::new(
            LineString::from(vec![
                coord! { x: 2.0, y: 2.0 },
                coord! { x: 4.0, y: 2.0 },
                coord! { x: 4.0, y: 4.0 },
                coord! { x: 2.0, y: 4.0 },
                coord! { x: 2.0, y: 2.0 },
            ]),
            vec![],
        );
        boundaries.insert(AreaScope::Country, "Northeast", geo::MultiPolygon::new(vec![square]));

        let limited = limit_distribution(&sp, &Area::countries(["Northeast"]), Some(&boundaries)).unwrap();
        let limit = limited.limitation().unwrap();
        // top two rows, right two columns: 4 presences out of 15 valid cells
        assert!((limit.occupied_prevalence - 4.0 / 15.0).abs() < 1e-12);

        let err = limit_distribution(&sp, &Area::countries(["Atlantis"]), Some(&boundaries)).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_requires_conversion() {
        let sp = converted();
        let bare = VirtualSpecies::new(sp.details().clone(), sp.suitability().clone());
        let area = Area::Extent(Extent::new(0.0, 0.0, 1.0, 1.0));
        assert!(matches!(
            limit_distribution(&bare, &area, None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_limit_survives_reconversion() {
        let sp = converted();
        // left two columns only
        let area = Area::Extent(Extent::new(0.0, 0.0, 2.0, 4.0));
        let limited = limit_distribution(&sp, &area, None).unwrap();
        assert!(limited.occupied_area().unwrap().to_vec().iter().all(|v| *v != 1.0));

        let params = ConversionParams {
            method: ConversionMethod::Threshold { beta: Beta::Value(0.0) },
            ..Default::default()
        };
        let again = convert_to_pa(&limited, &params, &mut seeded(0)).unwrap();
        let limit = again.limitation().unwrap();
        assert_eq!(limit.mask.to_vec(), limited.limitation().unwrap().mask.to_vec());

        let occ = limit.occupied_area.clone();
        for row in 0..4 {
            assert_eq!(occ.get(row, 1).unwrap(), 1.0);
            assert_eq!(occ.get(row, 2).unwrap(), 0.0);
            assert_eq!(occ.get(row, 3).unwrap(), 0.0);
        }
        assert!(occ.get(0, 0).unwrap().is_nan());
        // column 0 minus the NA cell, plus column 1
        assert!((limit.occupied_prevalence - 7.0 / 15.0).abs() < 1e-12);
        // the new conversion itself is unrestricted
        assert_eq!(again.pa_raster().unwrap().get(0, 3).unwrap(), 1.0);
        assert_eq!(again.distribution().unwrap().get(0, 3).unwrap(), 0.0);
    }
}
