//! Named, co-registered stack of environmental layers

use crate::error::{Error, Result};
use crate::raster::Raster;

/// Ordered mapping of variable name to environmental layer.
///
/// All layers share shape, transform and CRS, and names are unique.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentalStack {
    layers: Vec<(String, Raster<f64>)>,
}

impl EnvironmentalStack {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Build a stack from `(name, layer)` pairs, validating names and alignment
    pub fn from_layers<S, I>(layers: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Raster<f64>)>,
    {
        let mut stack = Self::new();
        for (name, raster) in layers {
            stack.push(name, raster)?;
        }
        Ok(stack)
    }

    /// Append a layer
    pub fn push(&mut self, name: impl Into<String>, raster: Raster<f64>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::config("environmental stack", "layer names must not be empty"));
        }
        if self.get(&name).is_some() {
            return Err(Error::config(
                "environmental stack",
                format!("duplicate layer name '{}'", name),
            ));
        }
        if let Some(template) = self.template() {
            template.check_aligned(&raster)?;
        }
        self.layers.push((name, raster));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer names in stack order
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Raster<f64>> {
        self.layers.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Raster<f64>)> {
        self.layers.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// First layer, used as the grid template for derived rasters
    pub fn template(&self) -> Option<&Raster<f64>> {
        self.layers.first().map(|(_, r)| r)
    }

    /// Common (rows, cols), `(0, 0)` for an empty stack
    pub fn shape(&self) -> (usize, usize) {
        self.template().map_or((0, 0), |r| r.shape())
    }

    /// Per-cell flag: true where every layer holds a valid value
    pub fn valid_mask(&self) -> Vec<bool> {
        let (rows, cols) = self.shape();
        let mut mask = vec![!self.is_empty(); rows * cols];
        for (_, layer) in &self.layers {
            for (flag, value) in mask.iter_mut().zip(layer.data().iter()) {
                if layer.is_nodata(*value) {
                    *flag = false;
                }
            }
        }
        mask
    }

    /// Values of every layer at a flat cell index, in stack order
    pub fn cell_values(&self, index: usize) -> Option<Vec<f64>> {
        self.layers
            .iter()
            .map(|(_, r)| r.get_flat(index))
            .collect()
    }

    pub fn into_layers(self) -> Vec<(String, Raster<f64>)> {
        self.layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(values: Vec<f64>) -> Raster<f64> {
        Raster::from_vec(values, 2, 2).unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut stack = EnvironmentalStack::new();
        stack.push("bio1", layer(vec![1.0; 4])).unwrap();
        let err = stack.push("bio1", layer(vec![2.0; 4])).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_misaligned_layer_rejected() {
        let mut stack = EnvironmentalStack::new();
        stack.push("bio1", layer(vec![1.0; 4])).unwrap();
        let wide = Raster::from_vec(vec![1.0; 6], 2, 3).unwrap();
        assert!(stack.push("bio12", wide).is_err());
    }

    #[test]
    fn test_valid_mask_and_cell_values() {
        let stack = EnvironmentalStack::from_layers(vec![
            ("a", layer(vec![1.0, f64::NAN, 3.0, 4.0])),
            ("b", layer(vec![5.0, 6.0, f64::NAN, 8.0])),
        ])
        .unwrap();

        assert_eq!(stack.names(), vec!["a", "b"]);
        assert_eq!(stack.valid_mask(), vec![true, false, false, true]);
        assert_eq!(stack.cell_values(3), Some(vec![4.0, 8.0]));
    }
}
