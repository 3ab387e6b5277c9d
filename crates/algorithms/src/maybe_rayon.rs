/// Rayon/sequential switch for elementwise raster evaluation.
///
/// With the `parallel` feature this re-exports rayon's parallel iterators;
/// without it, `into_par_iter()` falls back to `into_iter()` so the same
/// row-wise `flat_map(...).collect()` chains compile for single-threaded
/// builds. Random draws never go through this module.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    /// Sequential stand-in for `rayon::prelude::IntoParallelIterator`
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
