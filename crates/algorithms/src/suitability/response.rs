//! Suitability from per-variable response functions
//!
//! Each environmental layer is passed through its response function; the
//! responses are optionally rescaled to [0, 1] one by one, then combined by
//! product, sum or an explicit formula, and the result optionally rescaled.

use std::collections::BTreeMap;

use crate::maybe_rayon::*;
use crate::rescale::{rescale_named, RescaleRange};
use crate::response::{BoundResponse, ResponseParameterBlock, ResponseRegistry};
use crate::species::{ResponseDetails, SpeciesDetails, VirtualSpecies};
use crate::suitability::formula::{BoundFormula, Formula};
use serde::{Deserialize, Serialize};
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{EnvironmentalStack, Error, Result};

/// Parameter blocks keyed by variable name
pub type ResponseParameters = BTreeMap<String, ResponseParameterBlock>;

/// How responses are combined into one suitability
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Combination {
    /// Elementwise product
    #[default]
    Multiplicative,
    /// Elementwise sum
    Additive,
    /// Arithmetic formula over the variable names
    Formula(String),
}

/// Parameters for [`generate_from_responses`]
#[derive(Debug, Clone)]
pub struct ResponseSpeciesParams {
    /// Rescale the final suitability to [0, 1] (default: true)
    pub rescale: bool,
    /// Rescale each response to [0, 1] before combining (default: true)
    pub rescale_each_response: bool,
    pub combination: Combination,
}

impl Default for ResponseSpeciesParams {
    fn default() -> Self {
        Self {
            rescale: true,
            rescale_each_response: true,
            combination: Combination::Multiplicative,
        }
    }
}

enum Combiner {
    Product,
    Sum,
    Formula(BoundFormula),
}

impl Combiner {
    fn combine(&self, values: &[f64]) -> f64 {
        match self {
            Combiner::Product => values.iter().product(),
            Combiner::Sum => values.iter().sum(),
            Combiner::Formula(f) => f.eval(values),
        }
    }
}

/// Generate a virtual species from per-variable response functions.
///
/// `parameters` must name exactly the layers of `stack` (order does not
/// matter). All validation happens before any layer is evaluated.
///
/// # Errors
/// - [`Error::Configuration`] for variable-name mismatches, unknown
///   functions or arguments, and formulas whose variables differ from the
///   layer names
/// - [`Error::DegenerateRaster`] when a rescaled surface is constant
pub fn generate_from_responses(
    stack: &EnvironmentalStack,
    parameters: &ResponseParameters,
    params: ResponseSpeciesParams,
    registry: &ResponseRegistry,
) -> Result<VirtualSpecies> {
    let names = stack.names();
    check_names(&names, parameters)?;

    let bound: Vec<BoundResponse> = names
        .iter()
        .map(|name| {
            let block = parameters
                .get(*name)
                .ok_or_else(|| Error::config(format!("variable '{}'", name), "no parameter block"))?;
            registry.bind(name, block)
        })
        .collect::<Result<_>>()?;

    let combiner = match &params.combination {
        Combination::Multiplicative => Combiner::Product,
        Combination::Additive => Combiner::Sum,
        Combination::Formula(text) => Combiner::Formula(Formula::parse(text)?.bind(&names)?),
    };

    let mut responses = Vec::with_capacity(names.len());
    let mut response_ranges = Vec::with_capacity(names.len());
    let mut blocks = Vec::with_capacity(names.len());

    for ((name, layer), response) in stack.iter().zip(&bound) {
        let mut block = parameters[name].clone();
        if let Some((min, max)) = layer.min_max() {
            block.observed_min = Some(min);
            block.observed_max = Some(max);
        }
        blocks.push((name.to_string(), block));

        let raw = apply_response(layer, response)?;
        let raster = if params.rescale_each_response {
            let (rescaled, range) = rescale_named(&raw, &format!("response of '{}'", name))?;
            response_ranges.push((name.to_string(), range));
            rescaled
        } else {
            if let Ok(range) = RescaleRange::of(&raw, name) {
                response_ranges.push((name.to_string(), range));
            }
            raw
        };
        responses.push(raster);
    }

    let combined = combine(&responses, &combiner)?;

    let (suitability, suitability_range) = if params.rescale {
        tracing::debug!("rescaling final suitability to [0, 1]");
        let (rescaled, range) = rescale_named(&combined, "combined suitability")?;
        (rescaled, Some(range))
    } else {
        (combined, None)
    };

    let details = ResponseDetails {
        combination: params.combination,
        parameters: blocks,
        rescale: params.rescale,
        rescale_each_response: params.rescale_each_response,
        response_ranges,
        suitability_range,
    };

    Ok(VirtualSpecies::new(SpeciesDetails::Response(details), suitability))
}

fn check_names(names: &[&str], parameters: &ResponseParameters) -> Result<()> {
    if names.is_empty() {
        return Err(Error::config("response parameters", "environmental stack is empty"));
    }
    if names.len() != parameters.len() {
        return Err(Error::config(
            "response parameters",
            format!(
                "{} layers but {} parameter blocks",
                names.len(),
                parameters.len()
            ),
        ));
    }
    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| !parameters.contains_key(*n))
        .collect();
    let extra: Vec<&str> = parameters
        .keys()
        .map(String::as_str)
        .filter(|k| !names.contains(k))
        .collect();
    if !missing.is_empty() || !extra.is_empty() {
        return Err(Error::config(
            "response parameters",
            format!(
                "variable names differ from layer names (no parameters for {:?}, no layer for {:?})",
                missing, extra
            ),
        ));
    }
    Ok(())
}

/// Apply a response function to every valid cell
fn apply_response(layer: &Raster<f64>, response: &BoundResponse) -> Result<Raster<f64>> {
    let (rows, cols) = layer.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let v = layer.data()[(row, col)];
                if layer.is_nodata(v) {
                    continue;
                }
                let r = response.eval(v);
                if r.is_finite() {
                    *out = r;
                }
            }
            row_data
        })
        .collect();

    let mut out = layer.with_data(data)?;
    out.set_nodata(Some(f64::NAN));
    Ok(out)
}

fn combine(responses: &[Raster<f64>], combiner: &Combiner) -> Result<Raster<f64>> {
    let template = responses
        .first()
        .ok_or_else(|| Error::InvalidInput("no responses to combine".into()))?;
    let (rows, cols) = template.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut values = vec![0.0; responses.len()];
            'cell: for (col, out) in row_data.iter_mut().enumerate() {
                for (v, r) in values.iter_mut().zip(responses) {
                    let x = r.data()[(row, col)];
                    if x.is_nan() {
                        continue 'cell;
                    }
                    *v = x;
                }
                *out = combiner.combine(&values);
            }
            row_data
        })
        .collect();

    let mut out = template.with_data(data)?;
    out.set_nodata(Some(f64::NAN));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid(values: Vec<f64>) -> Raster<f64> {
        Raster::from_vec(values, 2, 3).unwrap()
    }

    fn two_layer_stack() -> EnvironmentalStack {
        EnvironmentalStack::from_layers(vec![
            ("temp", grid(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])),
            ("prec", grid(vec![10.0, 20.0, 30.0, 40.0, 50.0, f64::NAN])),
        ])
        .unwrap()
    }

    fn linear_params() -> ResponseParameters {
        let mut p = ResponseParameters::new();
        p.insert("temp".into(), ResponseParameterBlock::linear(1.0, 0.0));
        p.insert("prec".into(), ResponseParameterBlock::linear(1.0, 0.0));
        p
    }

    #[test]
    fn test_multiplicative_rescaled() {
        let sp = generate_from_responses(
            &two_layer_stack(),
            &linear_params(),
            ResponseSpeciesParams::default(),
            &ResponseRegistry::default(),
        )
        .unwrap();

        let s = sp.suitability();
        // NA propagates from 'prec'
        assert!(s.get(1, 2).unwrap().is_nan());
        assert_eq!(s.min_max(), Some((0.0, 1.0)));
        // products 0, .05, .2, .45, .8; the largest sits at (1, 1)
        assert_eq!(s.get(1, 1).unwrap(), 1.0);
    }

    #[test]
    fn test_additive_without_rescale() {
        let params = ResponseSpeciesParams {
            rescale: false,
            rescale_each_response: false,
            combination: Combination::Additive,
        };
        let sp = generate_from_responses(&two_layer_stack(), &linear_params(), params, &ResponseRegistry::default()).unwrap();
        assert_eq!(sp.suitability().get(0, 1).unwrap(), 21.0);

        match sp.details() {
            SpeciesDetails::Response(d) => {
                assert_eq!(d.parameters[0].1.observed_min, Some(0.0));
                assert_eq!(d.parameters[0].1.observed_max, Some(5.0));
                assert!(d.suitability_range.is_none());
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_formula_combination() {
        let params = ResponseSpeciesParams {
            rescale: false,
            rescale_each_response: false,
            combination: Combination::Formula("2 * temp - prec / 10".into()),
        };
        let sp = generate_from_responses(&two_layer_stack(), &linear_params(), params, &ResponseRegistry::default()).unwrap();
        assert_abs_diff_eq!(sp.suitability().get(1, 0).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_formula_with_wrong_variables() {
        let params = ResponseSpeciesParams {
            combination: Combination::Formula("temp * elev".into()),
            ..Default::default()
        };
        let err = generate_from_responses(&two_layer_stack(), &linear_params(), params, &ResponseRegistry::default())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_name_mismatch() {
        let mut params = linear_params();
        params.remove("prec");
        params.insert("elev".into(), ResponseParameterBlock::linear(1.0, 0.0));
        let err = generate_from_responses(&two_layer_stack(), &params, ResponseSpeciesParams::default(), &ResponseRegistry::default())
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_count_mismatch() {
        let mut params = linear_params();
        params.remove("prec");
        assert!(generate_from_responses(&two_layer_stack(), &params, ResponseSpeciesParams::default(), &ResponseRegistry::default()).is_err());
    }

    #[test]
    fn test_constant_response_is_degenerate() {
        let mut params = linear_params();
        params.insert("temp".into(), ResponseParameterBlock::linear(0.0, 1.0));
        let err = generate_from_responses(&two_layer_stack(), &params, ResponseSpeciesParams::default(), &ResponseRegistry::default())
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateRaster(_)));
    }
}
