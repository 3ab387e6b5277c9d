//! Occurrence sampling
//!
//! Draws presence-only or presence-absence records from a presence-absence
//! raster, with optional spatial bias, imperfect detection and false
//! positives.
//!
//! Observation model per record:
//! 1. a true presence is detected with probability `detection_probability`
//!    (times the cell's probability of occurrence when
//!    `correct_by_suitability` is set)
//! 2. any record not observed present so far is flipped to an observed
//!    presence with probability `error_probability`
//!
//! For presence-only samples, `Binomial(n, error_probability)` of the `n`
//! records are first drawn from absence cells as outright false positives,
//! capped at the number of absence cells when drawing without replacement.

mod draw;
mod weights;

pub use weights::Bias;

use crate::rng::{RngSnapshot, SpeciesRng};
use crate::species::VirtualSpecies;
use draw::draw_cells;
use rand::distributions::Distribution;
use rand::Rng;
use rand_distr::Binomial;
use serde::{Deserialize, Serialize};
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{Area, BoundaryProvider, Error, Result};

/// Kind of occurrence sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleType {
    #[default]
    PresenceOnly,
    PresenceAbsence,
}

/// Raster the records were drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// The species' distribution limited to an area
    OccupiedArea,
    /// The species' converted presence-absence raster
    PaRaster,
    /// A presence-absence raster supplied directly
    External,
}

/// What to sample from
#[derive(Debug, Clone, Copy)]
pub enum SamplingSource<'a> {
    Species(&'a VirtualSpecies),
    Raster(&'a Raster<f64>),
}

/// Parameters for [`sample_occurrences`]
#[derive(Debug, Clone)]
pub struct SamplingParams {
    /// Number of records
    pub n: usize,
    pub sample_type: SampleType,
    /// Probability a true presence is recorded (default: 1)
    pub detection_probability: f64,
    /// Scale detection by the cell's probability of occurrence
    pub correct_by_suitability: bool,
    /// Probability of a false-positive record (default: 0)
    pub error_probability: f64,
    pub bias: Bias,
    /// Restrict sampling to cells inside this area
    pub sampling_area: Option<Area>,
    /// Fraction of presences among presence-absence records
    pub sample_prevalence: Option<f64>,
    pub replacement: bool,
    /// Attach the probability of occurrence to each record
    pub extract_probability: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            n: 100,
            sample_type: SampleType::PresenceOnly,
            detection_probability: 1.0,
            correct_by_suitability: false,
            error_probability: 0.0,
            bias: Bias::None,
            sampling_area: None,
            sample_prevalence: None,
            replacement: false,
            extract_probability: false,
        }
    }
}

/// One sampled occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrencePoint {
    pub x: f64,
    pub y: f64,
    pub row: usize,
    pub col: usize,
    /// True state of the cell
    #[serde(rename = "Real")]
    pub real: u8,
    /// Recorded state; `None` for an undetected presence in a presence-only sample
    #[serde(rename = "Observed")]
    pub observed: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_probability: Option<f64>,
}

/// Output of [`sample_occurrences`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleResult {
    pub sample_type: SampleType,
    pub points: Vec<OccurrencePoint>,
    pub detection_probability: f64,
    pub correct_by_suitability: bool,
    pub error_probability: f64,
    /// Human-readable bias description
    pub bias: String,
    pub replacement: bool,
    pub source: SourceKind,
    pub sample_prevalence: Option<f64>,
    /// Fraction of records that are true presences
    pub true_prevalence: f64,
    /// Fraction of recorded states (NA excluded) that are presences
    pub observed_prevalence: f64,
    pub rng_snapshot: RngSnapshot,
}

/// Sample occurrence records.
///
/// # Errors
/// - [`Error::InvalidInput`] if the source is not a 0/1/NA raster, or a
///   species has not been converted to presence-absence
/// - [`Error::Configuration`] for out-of-range probabilities, unknown area
///   names, or options that need a species when sampling a bare raster
/// - [`Error::InsufficientCells`] / [`Error::DegenerateWeights`] when the
///   eligible cells cannot supply the draw
pub fn sample_occurrences(
    source: SamplingSource<'_>,
    params: &SamplingParams,
    provider: Option<&dyn BoundaryProvider>,
    rng: &mut SpeciesRng,
) -> Result<SampleResult> {
    validate(params)?;

    let (pa, probability, source_kind) = match source {
        SamplingSource::Species(species) => {
            let kind = if species.occupied_area().is_some() {
                SourceKind::OccupiedArea
            } else {
                SourceKind::PaRaster
            };
            (species.distribution()?, species.probability_of_occurrence(), kind)
        }
        SamplingSource::Raster(raster) => (raster, None, SourceKind::External),
    };
    if probability.is_none() && (params.correct_by_suitability || params.extract_probability) {
        return Err(Error::config(
            "sampling",
            "correct_by_suitability and extract_probability need a converted species",
        ));
    }
    if let Some(prob) = probability {
        pa.check_aligned(prob)?;
        if params.correct_by_suitability
            && prob.data().iter().any(|p| p.is_finite() && !(0.0..=1.0).contains(p))
        {
            return Err(Error::InvalidInput(
                "probability of occurrence must lie in [0, 1] to scale detection".into(),
            ));
        }
    }

    let states = read_states(pa)?;
    let inside = match &params.sampling_area {
        Some(area) => Some(area.to_mask(pa, provider)?),
        None => None,
    };
    let weights = params.bias.weights(pa, provider)?;

    let mut presences = Vec::new();
    let mut absences = Vec::new();
    for (i, state) in states.iter().enumerate() {
        if let Some(mask) = &inside {
            if mask.get_flat(i) != Some(1) {
                continue;
            }
        }
        match state {
            Some(1) => presences.push(i),
            Some(_) => absences.push(i),
            None => {}
        }
    }

    let rng_snapshot = RngSnapshot::capture(rng);

    // (cell, false-positive draw)
    let drawn: Vec<(usize, bool)> = match params.sample_type {
        SampleType::PresenceOnly => {
            let mut n_err = if params.error_probability > 0.0 {
                Binomial::new(params.n as u64, params.error_probability)
                    .map_err(|e| Error::config("error_probability", e.to_string()))?
                    .sample(rng) as usize
            } else {
                0
            };
            if n_err > 0 && absences.is_empty() {
                tracing::warn!(n_err, "no absence cells to draw false positives from");
                n_err = 0;
            } else if !params.replacement && n_err > absences.len() {
                tracing::warn!(
                    n_err,
                    available = absences.len(),
                    "false positives capped at the number of absence cells"
                );
                n_err = absences.len();
            }
            if n_err > 0 {
                tracing::debug!(n_err, "presence-only sample includes false positives");
            }
            let mut cells: Vec<(usize, bool)> =
                draw_cells(&presences, &weights, params.n - n_err, params.replacement, rng)?
                    .into_iter()
                    .map(|c| (c, false))
                    .collect();
            cells.extend(
                draw_cells(&absences, &weights, n_err, params.replacement, rng)?
                    .into_iter()
                    .map(|c| (c, true)),
            );
            cells
        }
        SampleType::PresenceAbsence => match params.sample_prevalence {
            Some(prevalence) => {
                if params.bias.is_active() {
                    tracing::warn!("sample_prevalence overrides part of the sampling bias");
                }
                let n_pres = (prevalence * params.n as f64).round() as usize;
                let mut cells = draw_cells(&presences, &weights, n_pres, params.replacement, rng)?;
                cells.extend(draw_cells(
                    &absences,
                    &weights,
                    params.n - n_pres,
                    params.replacement,
                    rng,
                )?);
                cells.into_iter().map(|c| (c, false)).collect()
            }
            None => {
                let mut valid: Vec<usize> = presences.iter().chain(&absences).copied().collect();
                valid.sort_unstable();
                draw_cells(&valid, &weights, params.n, params.replacement, rng)?
                    .into_iter()
                    .map(|c| (c, false))
                    .collect()
            }
        },
    };

    let points: Vec<OccurrencePoint> = drawn
        .into_iter()
        .map(|(cell, false_positive)| {
            let real = states[cell].unwrap_or(0);
            let p_occ = probability.and_then(|r| r.get_flat(cell));
            let observed = if false_positive {
                Some(1)
            } else {
                observe(real, p_occ, params, rng)
            };
            let (row, col) = (cell / pa.cols(), cell % pa.cols());
            let (x, y) = pa.pixel_to_geo(col, row);
            OccurrencePoint {
                x,
                y,
                row,
                col,
                real,
                observed,
                true_probability: if params.extract_probability { p_occ } else { None },
            }
        })
        .collect();

    let true_prevalence = fraction(points.iter().map(|p| Some(p.real)));
    let observed_prevalence = fraction(points.iter().map(|p| p.observed));
    tracing::info!(
        n = points.len(),
        true_prevalence,
        observed_prevalence,
        "occurrences sampled"
    );

    Ok(SampleResult {
        sample_type: params.sample_type,
        points,
        detection_probability: params.detection_probability,
        correct_by_suitability: params.correct_by_suitability,
        error_probability: params.error_probability,
        bias: params.bias.describe(),
        replacement: params.replacement,
        source: source_kind,
        sample_prevalence: params.sample_prevalence,
        true_prevalence,
        observed_prevalence,
        rng_snapshot,
    })
}

fn validate(params: &SamplingParams) -> Result<()> {
    if params.n == 0 {
        return Err(Error::config("n", "must be positive"));
    }
    for (name, p) in [
        ("detection_probability", params.detection_probability),
        ("error_probability", params.error_probability),
    ] {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::config(name, format!("must lie in [0, 1], got {}", p)));
        }
    }
    if let Some(prev) = params.sample_prevalence {
        if params.sample_type != SampleType::PresenceAbsence {
            return Err(Error::config(
                "sample_prevalence",
                "only applies to presence-absence samples",
            ));
        }
        if !(0.0..=1.0).contains(&prev) {
            return Err(Error::config("sample_prevalence", format!("must lie in [0, 1], got {}", prev)));
        }
    }
    params.bias.validate()
}

/// Cell states of a presence-absence raster: `Some(0|1)` or `None` for NA
fn read_states(pa: &Raster<f64>) -> Result<Vec<Option<u8>>> {
    pa.data()
        .iter()
        .map(|v| {
            if pa.is_nodata(*v) {
                Ok(None)
            } else if *v == 0.0 {
                Ok(Some(0))
            } else if *v == 1.0 {
                Ok(Some(1))
            } else {
                Err(Error::InvalidInput(format!(
                    "sampling source must be a presence-absence raster (0, 1 or NA), found {}",
                    v
                )))
            }
        })
        .collect()
}

/// Detection then error draw for one record
fn observe(real: u8, p_occ: Option<f64>, params: &SamplingParams, rng: &mut SpeciesRng) -> Option<u8> {
    if real == 1 {
        let detection = match (params.correct_by_suitability, p_occ) {
            (true, Some(p)) if p.is_finite() => params.detection_probability * p,
            _ => params.detection_probability,
        };
        if rng.gen_bool(detection) {
            return Some(1);
        }
    }
    if params.error_probability > 0.0 && rng.gen_bool(params.error_probability) {
        return Some(1);
    }
    match params.sample_type {
        SampleType::PresenceAbsence => Some(0),
        SampleType::PresenceOnly => None,
    }
}

fn fraction(states: impl Iterator<Item = Option<u8>>) -> f64 {
    let (ones, known) = states
        .flatten()
        .fold((0usize, 0usize), |(ones, known), s| (ones + (s == 1) as usize, known + 1));
    if known == 0 {
        0.0
    } else {
        ones as f64 / known as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{AppliedCurve, PaConversion};
    use crate::rng::{seeded, RngSnapshot};
    use crate::species::{ResponseDetails, SpeciesDetails};
    use crate::suitability::Combination;
    use std::collections::HashSet;
    use virtualspecies_core::{Extent, GeoTransform};

    /// 10x10 grid over [0, 10] x [0, 10]: presences in the left half, one NA
    fn pa_grid() -> Raster<f64> {
        let data = (0..100)
            .map(|i| if i == 99 { f64::NAN } else if i % 10 < 5 { 1.0 } else { 0.0 })
            .collect();
        let mut r = Raster::from_vec(data, 10, 10).unwrap();
        r.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        r
    }

    fn params(n: usize) -> SamplingParams {
        SamplingParams {
            n,
            ..Default::default()
        }
    }

    #[test]
    fn test_presence_only_draws_presences() {
        let mut rng = seeded(1);
        let res = sample_occurrences(SamplingSource::Raster(&pa_grid()), &params(30), None, &mut rng).unwrap();
        assert_eq!(res.points.len(), 30);
        assert!(res.points.iter().all(|p| p.real == 1 && p.observed == Some(1)));
        assert!(res.points.iter().all(|p| p.x < 5.0));
        let cells: HashSet<_> = res.points.iter().map(|p| (p.row, p.col)).collect();
        assert_eq!(cells.len(), 30);
        assert_eq!(res.true_prevalence, 1.0);
    }

    #[test]
    fn test_presence_absence_never_samples_na() {
        let mut rng = seeded(2);
        let p = SamplingParams {
            n: 99,
            sample_type: SampleType::PresenceAbsence,
            ..Default::default()
        };
        let res = sample_occurrences(SamplingSource::Raster(&pa_grid()), &p, None, &mut rng).unwrap();
        assert!(res.points.iter().all(|p| !(p.row == 9 && p.col == 9)));
        assert!((res.true_prevalence - 50.0 / 99.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_prevalence_split() {
        let mut rng = seeded(3);
        let p = SamplingParams {
            n: 40,
            sample_type: SampleType::PresenceAbsence,
            sample_prevalence: Some(0.25),
            ..Default::default()
        };
        let res = sample_occurrences(SamplingSource::Raster(&pa_grid()), &p, None, &mut rng).unwrap();
        assert_eq!(res.points.iter().filter(|p| p.real == 1).count(), 10);
        assert_eq!(res.true_prevalence, 0.25);
    }

    #[test]
    fn test_zero_detection_gives_na_in_presence_only() {
        let mut rng = seeded(4);
        let p = SamplingParams {
            n: 10,
            detection_probability: 0.0,
            ..Default::default()
        };
        let res = sample_occurrences(SamplingSource::Raster(&pa_grid()), &p, None, &mut rng).unwrap();
        assert!(res.points.iter().all(|p| p.observed.is_none()));

        let p = SamplingParams {
            sample_type: SampleType::PresenceAbsence,
            ..p
        };
        let res = sample_occurrences(SamplingSource::Raster(&pa_grid()), &p, None, &mut rng).unwrap();
        assert!(res.points.iter().all(|p| p.observed == Some(0)));
        assert_eq!(res.observed_prevalence, 0.0);
    }

    #[test]
    fn test_full_error_marks_everything_observed() {
        let mut rng = seeded(5);
        let p = SamplingParams {
            n: 20,
            error_probability: 1.0,
            ..Default::default()
        };
        let res = sample_occurrences(SamplingSource::Raster(&pa_grid()), &p, None, &mut rng).unwrap();
        // every record is a false positive drawn from an absence cell
        assert!(res.points.iter().all(|p| p.real == 0 && p.observed == Some(1)));
    }

    #[test]
    fn test_bias_concentrates_draws() {
        let mut rng = seeded(6);
        let p = SamplingParams {
            n: 2000,
            replacement: true,
            bias: Bias::Area {
                area: Area::Extent(Extent::new(0.0, 5.0, 5.0, 10.0)),
                strength: 50.0,
            },
            ..Default::default()
        };
        let res = sample_occurrences(SamplingSource::Raster(&pa_grid()), &p, None, &mut rng).unwrap();
        // 25 biased presence cells at weight 50 against 25 at weight 1
        let inside = res.points.iter().filter(|p| p.y > 5.0).count() as f64 / 2000.0;
        assert!(inside > 0.95);
    }

    #[test]
    fn test_sampling_area_restricts_cells() {
        let mut rng = seeded(7);
        let p = SamplingParams {
            n: 5,
            sampling_area: Some(Area::Extent(Extent::new(0.0, 9.0, 10.0, 10.0))),
            ..Default::default()
        };
        let res = sample_occurrences(SamplingSource::Raster(&pa_grid()), &p, None, &mut rng).unwrap();
        assert!(res.points.iter().all(|p| p.row == 0));

        let too_many = SamplingParams { n: 6, ..p };
        assert!(matches!(
            sample_occurrences(SamplingSource::Raster(&pa_grid()), &too_many, None, &mut rng),
            Err(Error::InsufficientCells { requested: 6, available: 5 })
        ));
    }

    #[test]
    fn test_rejects_non_binary_source() {
        let mut rng = seeded(8);
        let s = Raster::from_vec(vec![0.0, 0.5, 1.0, 1.0], 2, 2).unwrap();
        assert!(matches!(
            sample_occurrences(SamplingSource::Raster(&s), &params(1), None, &mut rng),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_raster_source_cannot_extract_probability() {
        let mut rng = seeded(9);
        let p = SamplingParams {
            n: 1,
            extract_probability: true,
            ..Default::default()
        };
        assert!(matches!(
            sample_occurrences(SamplingSource::Raster(&pa_grid()), &p, None, &mut rng),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_point_table_serialises_column_names() {
        let point = OccurrencePoint {
            x: 1.5,
            y: 2.5,
            row: 0,
            col: 1,
            real: 1,
            observed: None,
            true_probability: None,
        };
        let json = serde_json::to_string(&point).unwrap();
        assert!(json.contains("\"Real\":1"));
        assert!(json.contains("\"Observed\":null"));
        assert!(!json.contains("true_probability"));
    }

    #[test]
    fn test_false_positives_without_absences() {
        let all_present = Raster::filled(5, 5, 1.0);
        let p = SamplingParams {
            n: 10,
            error_probability: 0.3,
            ..Default::default()
        };
        for seed in 0..20 {
            let res = sample_occurrences(SamplingSource::Raster(&all_present), &p, None, &mut seeded(seed)).unwrap();
            assert_eq!(res.points.len(), 10);
            assert!(res.points.iter().all(|p| p.real == 1 && p.observed == Some(1)));
        }
    }

    #[test]
    fn test_false_positives_capped_by_absences() {
        // two absence cells among 25
        let mut pa = Raster::filled(5, 5, 1.0);
        pa.set(0, 0, 0.0).unwrap();
        pa.set(4, 4, 0.0).unwrap();
        let p = SamplingParams {
            n: 10,
            error_probability: 1.0,
            ..Default::default()
        };
        let res = sample_occurrences(SamplingSource::Raster(&pa), &p, None, &mut seeded(3)).unwrap();
        assert_eq!(res.points.len(), 10);
        assert_eq!(res.points.iter().filter(|p| p.real == 0).count(), 2);
        assert!(res.points.iter().all(|p| p.observed == Some(1)));
    }

    #[test]
    fn test_undetected_presence_can_be_false_positive() {
        let mut rng = seeded(10);
        let p = SamplingParams {
            n: 40,
            sample_type: SampleType::PresenceAbsence,
            detection_probability: 0.0,
            error_probability: 1.0,
            ..Default::default()
        };
        let res = sample_occurrences(SamplingSource::Raster(&pa_grid()), &p, None, &mut rng).unwrap();
        assert!(res.points.iter().any(|p| p.real == 1));
        assert!(res.points.iter().any(|p| p.real == 0));
        assert!(res.points.iter().all(|p| p.observed == Some(1)));
        assert_eq!(res.observed_prevalence, 1.0);
    }

    /// Species present everywhere on a 2x5 grid; probability of occurrence
    /// is 0 on the top row and 1 on the bottom row
    fn species_with_probability() -> VirtualSpecies {
        let suitability = Raster::from_vec((0..10).map(|i| (i / 5) as f64).collect(), 2, 5).unwrap();
        let details = SpeciesDetails::Response(ResponseDetails {
            combination: Combination::Multiplicative,
            parameters: vec![],
            rescale: false,
            rescale_each_response: false,
            response_ranges: vec![],
            suitability_range: None,
        });
        let mut sp = VirtualSpecies::new(details, suitability.clone());
        sp.set_conversion(PaConversion {
            curve: AppliedCurve::Linear { a: 1.0, b: 0.0 },
            target_prevalence: None,
            pa_raster: Raster::filled(2, 5, 1.0),
            probability_of_occurrence: suitability,
            realized_prevalence: 1.0,
            expected_prevalence: 0.5,
            rng_snapshot: RngSnapshot::capture(&seeded(0)),
        });
        sp
    }

    #[test]
    fn test_correct_by_suitability_scales_detection() {
        let sp = species_with_probability();
        let p = SamplingParams {
            n: 10,
            correct_by_suitability: true,
            extract_probability: true,
            ..Default::default()
        };
        let res = sample_occurrences(SamplingSource::Species(&sp), &p, None, &mut seeded(12)).unwrap();
        assert_eq!(res.points.len(), 10);
        for point in &res.points {
            match point.row {
                0 => assert_eq!(point.observed, None),
                _ => assert_eq!(point.observed, Some(1)),
            }
            assert_eq!(point.true_probability, Some(point.row as f64));
        }

        // without the correction every presence is detected
        let p = SamplingParams {
            correct_by_suitability: false,
            ..p
        };
        let res = sample_occurrences(SamplingSource::Species(&sp), &p, None, &mut seeded(12)).unwrap();
        assert!(res.points.iter().all(|p| p.observed == Some(1)));
    }
}
