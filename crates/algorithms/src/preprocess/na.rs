//! NA synchronisation across layers

use virtualspecies_core::raster::Raster;
use virtualspecies_core::{Algorithm, EnvironmentalStack, Error, Result};

/// Set a cell to NA in every layer when it is NA in any layer.
///
/// Response and PCA species are NA wherever any layer is NA; synchronising
/// the stack up front makes the layers themselves agree with that.
pub fn synchronise_na(stack: &EnvironmentalStack) -> Result<EnvironmentalStack> {
    let valid = stack.valid_mask();
    let dropped = valid.iter().filter(|ok| !**ok).count();

    let layers: Vec<(String, Raster<f64>)> = stack
        .iter()
        .map(|(name, layer)| {
            let data = layer
                .data()
                .iter()
                .zip(&valid)
                .map(|(v, ok)| if *ok && !layer.is_nodata(*v) { *v } else { f64::NAN })
                .collect();
            let mut out = layer.with_data(data)?;
            out.set_nodata(Some(f64::NAN));
            Ok((name.to_string(), out))
        })
        .collect::<Result<_>>()?;

    tracing::debug!(na_cells = dropped, "NA cells synchronised across layers");
    EnvironmentalStack::from_layers(layers)
}

/// [`synchronise_na`] as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct SynchroniseNa;

impl Algorithm for SynchroniseNa {
    type Input = EnvironmentalStack;
    type Output = EnvironmentalStack;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "SynchroniseNa"
    }

    fn description(&self) -> &'static str {
        "Set cells to NA in every layer where any layer is NA"
    }

    fn execute(&self, input: Self::Input, _params: ()) -> Result<Self::Output> {
        synchronise_na(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_na_propagates() {
        let a = Raster::from_vec(vec![1.0, f64::NAN, 3.0, 4.0], 2, 2).unwrap();
        let b = Raster::from_vec(vec![5.0, 6.0, 7.0, f64::INFINITY], 2, 2).unwrap();
        let stack = EnvironmentalStack::from_layers(vec![("a", a), ("b", b)]).unwrap();

        let synced = SynchroniseNa.execute_default(stack).unwrap();
        for (_, layer) in synced.iter() {
            assert_eq!(layer.valid_count(), 2);
            assert!(layer.get(0, 1).unwrap().is_nan());
            assert!(layer.get(1, 1).unwrap().is_nan());
        }
        assert_eq!(synced.get("a").unwrap().get(1, 0).unwrap(), 3.0);
    }
}
