//! Ordination of environmental stacks
//!
//! - **PCA**: correlation-based principal component analysis used to build
//!   niches in reduced environmental space

mod pca;

pub use pca::{pca, pca_from_cells, PcaModel, PcaParams};
pub(crate) use pca::collect_cells;
