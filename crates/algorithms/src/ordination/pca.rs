//! Principal Component Analysis of an environmental stack
//!
//! Variables are centred and scaled to unit variance (correlation PCA), the
//! correlation matrix is diagonalised via Jacobi iteration, and cells are
//! projected onto the resulting axes. Fitting may use a random subsample of
//! cells; projection always covers the full grid.

use crate::maybe_rayon::*;
use crate::rng::SpeciesRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use virtualspecies_core::raster::Raster;
use virtualspecies_core::{EnvironmentalStack, Error, Result};

/// Parameters for PCA fitting
#[derive(Debug, Clone, Default)]
pub struct PcaParams {
    /// Fit on a random sample of this many valid cells instead of all cells
    pub sample_size: Option<usize>,
}

/// Fitted correlation PCA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaModel {
    variables: Vec<String>,
    centers: Vec<f64>,
    scales: Vec<f64>,
    eigenvalues: Vec<f64>,
    variance_explained: Vec<f64>,
    /// `loadings[variable][axis]`
    loadings: Vec<Vec<f64>>,
    fitted_cells: usize,
}

impl PcaModel {
    /// Fit on row vectors (one per cell, values in `variables` order)
    pub fn fit(variables: Vec<String>, cells: &[Vec<f64>]) -> Result<Self> {
        let n_vars = variables.len();
        if n_vars == 0 {
            return Err(Error::config("PCA", "at least one variable is required"));
        }
        let n = cells.len();
        if n < 2 {
            return Err(Error::InvalidInput(format!(
                "PCA needs at least 2 valid cells, got {}",
                n
            )));
        }

        let mut centers = vec![0.0; n_vars];
        for cell in cells {
            for (m, v) in centers.iter_mut().zip(cell) {
                *m += v;
            }
        }
        for m in &mut centers {
            *m /= n as f64;
        }

        let mut scales = vec![0.0; n_vars];
        for cell in cells {
            for ((s, v), m) in scales.iter_mut().zip(cell).zip(&centers) {
                *s += (v - m) * (v - m);
            }
        }
        for (i, s) in scales.iter_mut().enumerate() {
            *s = (*s / (n - 1) as f64).sqrt();
            if !(*s > 0.0) {
                return Err(Error::DegenerateRaster(format!(
                    "variable '{}' is constant over the fitted cells",
                    variables[i]
                )));
            }
        }

        // Correlation matrix
        let mut corr = vec![vec![0.0; n_vars]; n_vars];
        for cell in cells {
            for i in 0..n_vars {
                let zi = (cell[i] - centers[i]) / scales[i];
                for j in i..n_vars {
                    corr[i][j] += zi * (cell[j] - centers[j]) / scales[j];
                }
            }
        }
        for i in 0..n_vars {
            for j in i..n_vars {
                corr[i][j] /= (n - 1) as f64;
                corr[j][i] = corr[i][j];
            }
        }

        let (eigenvalues, eigenvectors) = jacobi_eigen(corr);

        let mut order: Vec<usize> = (0..n_vars).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let total: f64 = eigenvalues.iter().sum();
        let sorted_eigenvalues: Vec<f64> = order.iter().map(|&k| eigenvalues[k].max(0.0)).collect();
        let variance_explained = sorted_eigenvalues
            .iter()
            .map(|ev| if total > 0.0 { ev / total } else { 0.0 })
            .collect();

        let mut loadings = vec![vec![0.0; n_vars]; n_vars];
        for (axis, &k) in order.iter().enumerate() {
            // Orient each axis so its largest loading is positive
            let pivot = (0..n_vars)
                .max_by(|&a, &b| eigenvectors[a][k].abs().total_cmp(&eigenvectors[b][k].abs()))
                .unwrap_or(0);
            let sign = if eigenvectors[pivot][k] < 0.0 { -1.0 } else { 1.0 };
            for var in 0..n_vars {
                loadings[var][axis] = sign * eigenvectors[var][k];
            }
        }

        Ok(Self {
            variables,
            centers,
            scales,
            eigenvalues: sorted_eigenvalues,
            variance_explained,
            loadings,
            fitted_cells: n,
        })
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn n_axes(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    pub fn variance_explained(&self) -> &[f64] {
        &self.variance_explained
    }

    pub fn loadings(&self) -> &[Vec<f64>] {
        &self.loadings
    }

    /// Number of cells the model was fitted on
    pub fn fitted_cells(&self) -> usize {
        self.fitted_cells
    }

    /// Score of one cell (values in `variables` order) on `axis`
    pub fn project_axis(&self, values: &[f64], axis: usize) -> f64 {
        values
            .iter()
            .enumerate()
            .map(|(var, v)| (v - self.centers[var]) / self.scales[var] * self.loadings[var][axis])
            .sum()
    }

    /// Layers of `stack` in model variable order.
    ///
    /// The stack must hold exactly the model's variables.
    pub fn layers_for<'a>(&self, stack: &'a EnvironmentalStack) -> Result<Vec<&'a Raster<f64>>> {
        if stack.len() != self.variables.len() {
            return Err(Error::config(
                "PCA projection",
                format!(
                    "model has {} variables but stack has {} layers",
                    self.variables.len(),
                    stack.len()
                ),
            ));
        }
        self.variables
            .iter()
            .map(|name| {
                stack.get(name).ok_or_else(|| {
                    Error::config("PCA projection", format!("stack has no layer '{}'", name))
                })
            })
            .collect()
    }

    /// Score rasters of `stack` on the requested axes (NA where any layer is NA)
    pub fn scores(&self, stack: &EnvironmentalStack, axes: &[usize]) -> Result<Vec<Raster<f64>>> {
        let layers = self.layers_for(stack)?;
        if let Some(&bad) = axes.iter().find(|&&a| a >= self.n_axes()) {
            return Err(Error::config(
                "PCA projection",
                format!("axis {} requested but only {} axes exist", bad, self.n_axes()),
            ));
        }
        let template = layers[0];
        let (rows, cols) = template.shape();

        axes.iter()
            .map(|&axis| {
                let data: Vec<f64> = (0..rows)
                    .into_par_iter()
                    .flat_map(|row| {
                        let mut row_data = vec![f64::NAN; cols];
                        let mut values = vec![0.0; layers.len()];
                        'cell: for (col, out) in row_data.iter_mut().enumerate() {
                            for (v, layer) in values.iter_mut().zip(&layers) {
                                let x = layer.data()[(row, col)];
                                if layer.is_nodata(x) {
                                    continue 'cell;
                                }
                                *v = x;
                            }
                            *out = self.project_axis(&values, axis);
                        }
                        row_data
                    })
                    .collect();
                let mut raster = template.with_data(data)?;
                raster.set_nodata(Some(f64::NAN));
                Ok(raster)
            })
            .collect()
    }
}

/// Valid cells of a stack as row vectors, optionally subsampled
pub(crate) fn collect_cells(
    stack: &EnvironmentalStack,
    sample_size: Option<usize>,
    rng: &mut SpeciesRng,
) -> Vec<Vec<f64>> {
    let valid: Vec<usize> = stack
        .valid_mask()
        .iter()
        .enumerate()
        .filter_map(|(i, ok)| ok.then_some(i))
        .collect();

    let chosen: Vec<usize> = match sample_size {
        Some(k) if k < valid.len() => {
            let mut picked: Vec<usize> = index::sample(rng, valid.len(), k)
                .into_iter()
                .map(|i| valid[i])
                .collect();
            picked.sort_unstable();
            picked
        }
        _ => valid,
    };

    chosen
        .into_iter()
        .filter_map(|i| stack.cell_values(i))
        .collect()
}

/// Fit a correlation PCA on the cells of `stack`.
///
/// `rng` is only drawn from when `params.sample_size` is smaller than the
/// number of valid cells.
pub fn pca(stack: &EnvironmentalStack, params: PcaParams, rng: &mut SpeciesRng) -> Result<PcaModel> {
    if stack.is_empty() {
        return Err(Error::config("PCA", "environmental stack is empty"));
    }
    if params.sample_size == Some(0) {
        return Err(Error::config("PCA", "sample size must be positive"));
    }
    let cells = collect_cells(stack, params.sample_size, rng);
    if params.sample_size.is_some() {
        tracing::info!(cells = cells.len(), "PCA fitted on a random subsample of cells");
    }
    let names = stack.names().into_iter().map(String::from).collect();
    PcaModel::fit(names, &cells)
}

/// Fit a correlation PCA on pre-collected cell vectors
pub fn pca_from_cells(variables: Vec<String>, cells: &[Vec<f64>]) -> Result<PcaModel> {
    PcaModel::fit(variables, cells)
}

/// Jacobi eigenvalue algorithm for symmetric matrices.
///
/// Returns eigenvalues and eigenvectors as columns (`v[row][k]`).
fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let max_iter = 100 * n * n;
    let eps = 1e-12;

    let mut v = vec![vec![0.0; n]; n];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _ in 0..max_iter {
        // Largest off-diagonal element
        let mut max_val = 0.0;
        let (mut p, mut q) = (0, 1);
        for i in 0..n {
            for j in (i + 1)..n {
                if a[i][j].abs() > max_val {
                    max_val = a[i][j].abs();
                    p = i;
                    q = j;
                }
            }
        }

        if max_val < eps {
            break;
        }

        let theta = if (a[p][p] - a[q][q]).abs() < eps {
            std::f64::consts::FRAC_PI_4
        } else {
            0.5 * (2.0 * a[p][q] / (a[p][p] - a[q][q])).atan()
        };
        let (sin_t, cos_t) = theta.sin_cos();

        for i in 0..n {
            if i != p && i != q {
                let aip = a[i][p];
                let aiq = a[i][q];
                a[i][p] = cos_t * aip + sin_t * aiq;
                a[p][i] = a[i][p];
                a[i][q] = -sin_t * aip + cos_t * aiq;
                a[q][i] = a[i][q];
            }
        }
        let (app, aqq, apq) = (a[p][p], a[q][q], a[p][q]);
        a[p][p] = cos_t * cos_t * app + 2.0 * sin_t * cos_t * apq + sin_t * sin_t * aqq;
        a[q][q] = sin_t * sin_t * app - 2.0 * sin_t * cos_t * apq + cos_t * cos_t * aqq;
        a[p][q] = 0.0;
        a[q][p] = 0.0;

        for row in v.iter_mut() {
            let vip = row[p];
            let viq = row[q];
            row[p] = cos_t * vip + sin_t * viq;
            row[q] = -sin_t * vip + cos_t * viq;
        }
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}
