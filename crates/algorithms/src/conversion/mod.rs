//! Presence-absence conversion
//!
//! Turns a continuous suitability surface into a binary presence-absence
//! raster, either with a hard threshold or by drawing presences from a
//! probability-of-occurrence curve:
//!
//! - **threshold**: presence where `suitability >= beta`
//! - **logistic**: `p = 1 / (1 + exp(-(suitability - beta) / alpha))`
//! - **linear**: `p = clamp(a * suitability + b, 0, 1)`
//!
//! Any method can instead be fitted to a target species prevalence.
//! Probabilistic methods draw one uniform `u` per valid cell before the
//! curve is applied and mark a presence where `p > u`, so the number of
//! presences is monotone in the fitted parameter.

mod solver;

use crate::rng::{RngSnapshot, SpeciesRng};
use crate::species::VirtualSpecies;
use rand::Rng;
use serde::{Deserialize, Serialize};
use solver::{CountSearch, Monotone};
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{Error, Result};

/// Width of the logistic search bracket beyond the suitability range, in units of alpha
const LOGISTIC_BRACKET: f64 = 40.0;

/// Alpha candidates, as fractions of the suitability range, tried when both
/// alpha and beta are fitted to a prevalence
const ALPHA_FACTORS: [f64; 6] = [0.1, 0.05, 0.025, 0.01, 0.2, 0.5];

/// Threshold or inflection point of a conversion curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Beta {
    Value(f64),
    /// Uniform within the suitability range
    Random,
}

/// Conversion curve and its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConversionMethod {
    Threshold {
        beta: Beta,
    },
    Logistic {
        /// Slope scale (> 0); 10% of the suitability range when `None`
        alpha: Option<f64>,
        beta: Beta,
    },
    Linear {
        /// Defaults to `1 / (max - min)`
        a: Option<f64>,
        /// Defaults to `-a * min`
        b: Option<f64>,
    },
}

impl Default for ConversionMethod {
    fn default() -> Self {
        ConversionMethod::Logistic {
            alpha: None,
            beta: Beta::Random,
        }
    }
}

/// Parameters for [`convert_to_pa`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionParams {
    pub method: ConversionMethod,
    /// Target fraction of valid cells to mark present. When set, beta (or b
    /// for the linear method) is solved and any supplied value ignored.
    pub species_prevalence: Option<f64>,
    /// Accepted prevalence error; never tighter than one cell (default: 0)
    pub prevalence_tolerance: f64,
    /// Bisection budget per solve (default: 200)
    pub max_iterations: usize,
}

impl Default for ConversionParams {
    fn default() -> Self {
        Self {
            method: ConversionMethod::default(),
            species_prevalence: None,
            prevalence_tolerance: 0.0,
            max_iterations: 200,
        }
    }
}

/// Curve actually applied, with every parameter resolved
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AppliedCurve {
    Threshold { beta: f64 },
    Logistic { alpha: f64, beta: f64 },
    Linear { a: f64, b: f64 },
}

impl AppliedCurve {
    /// Probability of occurrence at suitability `s`
    #[inline]
    pub fn probability(&self, s: f64) -> f64 {
        match *self {
            AppliedCurve::Threshold { beta } => {
                if s >= beta {
                    1.0
                } else {
                    0.0
                }
            }
            AppliedCurve::Logistic { alpha, beta } => 1.0 / (1.0 + (-(s - beta) / alpha).exp()),
            AppliedCurve::Linear { a, b } => (a * s + b).clamp(0.0, 1.0),
        }
    }

    fn is_threshold(&self) -> bool {
        matches!(self, AppliedCurve::Threshold { .. })
    }
}

/// Result of a presence-absence conversion
#[derive(Debug, Clone)]
pub struct PaConversion {
    pub curve: AppliedCurve,
    pub target_prevalence: Option<f64>,
    /// 1 = presence, 0 = absence, NaN where suitability is NA
    pub pa_raster: Raster<f64>,
    /// Probability each presence was drawn with (the PA raster for thresholds)
    pub probability_of_occurrence: Raster<f64>,
    /// Fraction of valid cells marked present
    pub realized_prevalence: f64,
    /// Mean probability of occurrence over valid cells
    pub expected_prevalence: f64,
    pub rng_snapshot: RngSnapshot,
}

/// Convert a species' suitability to presence-absence.
///
/// Returns the species augmented with the conversion. A species that was
/// already converted gets the new conversion, and any previous distribution
/// limit is re-applied to it.
pub fn convert_to_pa(
    species: &VirtualSpecies,
    params: &ConversionParams,
    rng: &mut SpeciesRng,
) -> Result<VirtualSpecies> {
    let conversion = convert_suitability(species.suitability(), params, rng)?;
    let mut out = species.clone();
    out.set_conversion(conversion);
    Ok(out)
}

/// Convert a bare suitability raster to presence-absence
pub fn convert_suitability(
    suitability: &Raster<f64>,
    params: &ConversionParams,
    rng: &mut SpeciesRng,
) -> Result<PaConversion> {
    validate(params)?;

    let cells: Vec<(usize, f64)> = suitability
        .data()
        .iter()
        .enumerate()
        .filter(|(_, v)| !suitability.is_nodata(**v))
        .map(|(i, v)| (i, *v))
        .collect();
    if cells.is_empty() {
        return Err(Error::DegenerateRaster("suitability has no valid cells".into()));
    }
    let (min, max) = cells
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));

    let rng_snapshot = RngSnapshot::capture(rng);
    let problem = Problem {
        values: cells.iter().map(|(_, v)| *v).collect(),
        min,
        max,
        params,
    };

    let (curve, uniforms) = match params.method {
        ConversionMethod::Threshold { beta } => (problem.threshold(beta, rng)?, None),
        ConversionMethod::Logistic { alpha, beta } => {
            let beta = problem.pre_draw_beta(beta, rng);
            let u = draw_uniforms(problem.values.len(), rng);
            (problem.logistic(alpha, beta, &u)?, Some(u))
        }
        ConversionMethod::Linear { a, b } => {
            let u = draw_uniforms(problem.values.len(), rng);
            (problem.linear(a, b, &u)?, Some(u))
        }
    };

    let mut pa = vec![f64::NAN; suitability.len()];
    let mut prob = vec![f64::NAN; suitability.len()];
    let mut presences = 0usize;
    let mut prob_sum = 0.0;
    for (k, (index, s)) in cells.iter().enumerate() {
        let p = curve.probability(*s);
        let present = match &uniforms {
            Some(u) => p > u[k],
            None => p >= 1.0,
        };
        pa[*index] = if present { 1.0 } else { 0.0 };
        prob[*index] = p;
        presences += present as usize;
        prob_sum += p;
    }

    let mut pa_raster = suitability.with_data(pa)?;
    pa_raster.set_nodata(Some(f64::NAN));
    let probability_of_occurrence = if curve.is_threshold() {
        pa_raster.clone()
    } else {
        let mut r = suitability.with_data(prob)?;
        r.set_nodata(Some(f64::NAN));
        r
    };

    let n = cells.len() as f64;
    let realized_prevalence = presences as f64 / n;
    tracing::info!(
        curve = ?curve,
        realized_prevalence,
        "suitability converted to presence-absence"
    );

    Ok(PaConversion {
        curve,
        target_prevalence: params.species_prevalence,
        pa_raster,
        probability_of_occurrence,
        realized_prevalence,
        expected_prevalence: prob_sum / n,
        rng_snapshot,
    })
}

fn validate(params: &ConversionParams) -> Result<()> {
    if let Some(p) = params.species_prevalence {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::config(
                "species_prevalence",
                format!("must lie in [0, 1], got {}", p),
            ));
        }
    }
    if !(params.prevalence_tolerance.is_finite() && params.prevalence_tolerance >= 0.0) {
        return Err(Error::config("prevalence_tolerance", "must be finite and non-negative"));
    }
    if params.max_iterations == 0 {
        return Err(Error::config("max_iterations", "must be positive"));
    }
    let finite = |name: &str, v: Option<f64>| match v {
        Some(x) if !x.is_finite() => Err(Error::config(name, format!("must be finite, got {}", x))),
        _ => Ok(()),
    };
    match params.method {
        ConversionMethod::Threshold { beta } => finite("beta", beta_value(beta)),
        ConversionMethod::Logistic { alpha, beta } => {
            finite("beta", beta_value(beta))?;
            match alpha {
                Some(a) if !(a.is_finite() && a > 0.0) => Err(Error::config(
                    "alpha",
                    format!("must be positive and finite, got {}", a),
                )),
                _ => Ok(()),
            }
        }
        ConversionMethod::Linear { a, b } => {
            finite("a", a)?;
            finite("b", b)
        }
    }
}

fn beta_value(beta: Beta) -> Option<f64> {
    match beta {
        Beta::Value(v) => Some(v),
        Beta::Random => None,
    }
}

fn draw_uniforms(n: usize, rng: &mut SpeciesRng) -> Vec<f64> {
    (0..n).map(|_| rng.gen::<f64>()).collect()
}

/// Valid suitability values and the conversion request
struct Problem<'a> {
    values: Vec<f64>,
    min: f64,
    max: f64,
    params: &'a ConversionParams,
}

impl Problem<'_> {
    fn total(&self) -> usize {
        self.values.len()
    }

    fn search(&self, lo: f64, hi: f64, direction: Monotone, prevalence: f64) -> CountSearch {
        let n = self.total() as f64;
        CountSearch {
            lo,
            hi,
            direction,
            target: (prevalence * n).round() as usize,
            tolerance: ((self.params.prevalence_tolerance * n).round() as usize).max(1),
            total: self.total(),
            max_iterations: self.params.max_iterations,
        }
    }

    fn span(&self, what: &str) -> Result<f64> {
        let span = self.max - self.min;
        if span > 0.0 {
            Ok(span)
        } else {
            Err(Error::DegenerateRaster(format!(
                "suitability is constant ({}), cannot derive {}",
                self.min, what
            )))
        }
    }

    fn random_beta(&self, rng: &mut SpeciesRng) -> f64 {
        if self.max > self.min {
            rng.gen_range(self.min..=self.max)
        } else {
            self.min
        }
    }

    /// Resolve a random beta before the uniforms are drawn, unless beta is
    /// going to be solved
    fn pre_draw_beta(&self, beta: Beta, rng: &mut SpeciesRng) -> Option<f64> {
        match (beta, self.params.species_prevalence) {
            (_, Some(_)) => {
                if let Beta::Value(v) = beta {
                    tracing::warn!(beta = v, "species_prevalence given: beta is solved and the supplied value ignored");
                }
                None
            }
            (Beta::Value(v), None) => Some(v),
            (Beta::Random, None) => Some(self.random_beta(rng)),
        }
    }

    fn count_present(&self, curve: AppliedCurve, u: &[f64]) -> usize {
        self.values
            .iter()
            .zip(u)
            .filter(|(s, u)| curve.probability(**s) > **u)
            .count()
    }

    fn threshold(&self, beta: Beta, rng: &mut SpeciesRng) -> Result<AppliedCurve> {
        let beta = match (self.params.species_prevalence, beta) {
            (Some(prevalence), beta) => {
                if let Beta::Value(v) = beta {
                    tracing::warn!(beta = v, "species_prevalence given: beta is solved and the supplied value ignored");
                }
                let count = |b: f64| self.values.iter().filter(|s| **s >= b).count();
                self.search(self.min, self.max, Monotone::Decreasing, prevalence)
                    .solve(count)?
                    .value
            }
            (None, Beta::Value(v)) => v,
            (None, Beta::Random) => self.random_beta(rng),
        };
        Ok(AppliedCurve::Threshold { beta })
    }

    fn logistic(&self, alpha: Option<f64>, beta: Option<f64>, u: &[f64]) -> Result<AppliedCurve> {
        match (self.params.species_prevalence, alpha, beta) {
            (Some(prevalence), Some(alpha), _) => self.solve_logistic_beta(alpha, prevalence, u),
            (Some(prevalence), None, _) => self.solve_logistic_both(prevalence, u),
            (None, alpha, Some(beta)) => {
                let alpha = match alpha {
                    Some(a) => a,
                    None => 0.1 * self.span("logistic alpha")?,
                };
                Ok(AppliedCurve::Logistic { alpha, beta })
            }
            (None, _, None) => Err(Error::Other("logistic beta was not resolved".into())),
        }
    }

    fn solve_logistic_beta(&self, alpha: f64, prevalence: f64, u: &[f64]) -> Result<AppliedCurve> {
        let pad = LOGISTIC_BRACKET * alpha;
        let count = |beta: f64| self.count_present(AppliedCurve::Logistic { alpha, beta }, u);
        let sol = self
            .search(self.min - pad, self.max + pad, Monotone::Decreasing, prevalence)
            .solve(count)?;
        Ok(AppliedCurve::Logistic { alpha, beta: sol.value })
    }

    /// Try alpha candidates from the default outwards; keep the first whose
    /// beta lands inside the suitability range, else the first that solved.
    fn solve_logistic_both(&self, prevalence: f64, u: &[f64]) -> Result<AppliedCurve> {
        let span = self.span("logistic alpha")?;
        let mut first_solved = None;
        let mut first_error = None;
        for factor in ALPHA_FACTORS {
            match self.solve_logistic_beta(factor * span, prevalence, u) {
                Ok(curve @ AppliedCurve::Logistic { beta, .. }) if beta >= self.min && beta <= self.max => {
                    return Ok(curve);
                }
                Ok(curve) => {
                    first_solved.get_or_insert(curve);
                }
                Err(e) => {
                    tracing::debug!(factor, error = %e, "logistic alpha candidate failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        match (first_solved, first_error) {
            (Some(curve), _) => Ok(curve),
            (None, Some(e)) => Err(e),
            (None, None) => Err(Error::Other("no logistic alpha candidate evaluated".into())),
        }
    }

    fn linear(&self, a: Option<f64>, b: Option<f64>, u: &[f64]) -> Result<AppliedCurve> {
        let a = match a {
            Some(a) => a,
            None => 1.0 / self.span("linear slope")?,
        };
        let b = match (self.params.species_prevalence, b) {
            (Some(prevalence), b) => {
                if let Some(v) = b {
                    tracing::warn!(b = v, "species_prevalence given: intercept is solved and the supplied value ignored");
                }
                let (lo_as, hi_as) = self
                    .values
                    .iter()
                    .map(|s| a * s)
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
                let count = |b: f64| self.count_present(AppliedCurve::Linear { a, b }, u);
                self.search(-hi_as, 1.0 - lo_as, Monotone::Increasing, prevalence)
                    .solve(count)?
                    .value
            }
            (None, Some(b)) => b,
            (None, None) => -a * self.min,
        };
        Ok(AppliedCurve::Linear { a, b })
    }
}
