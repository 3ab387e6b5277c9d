//! Bisection on a monotone presence count
//!
//! Every prevalence-matching conversion reduces to one question: which
//! parameter value yields `target` presences, given a count function that is
//! monotone in that parameter. The count is an integer step function, so
//! the search stops as soon as it lands within `tolerance` cells.

use virtualspecies_core::{Error, Result};

/// Direction in which the presence count moves as the parameter grows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Monotone {
    Increasing,
    Decreasing,
}

/// Search problem over `[lo, hi]`
#[derive(Debug, Clone, Copy)]
pub(crate) struct CountSearch {
    pub lo: f64,
    pub hi: f64,
    pub direction: Monotone,
    /// Presences wanted
    pub target: usize,
    /// Accepted distance from `target`, in cells (at least 1)
    pub tolerance: usize,
    /// Valid cells, used to report prevalences
    pub total: usize,
    pub max_iterations: usize,
}

/// Parameter value and the count it produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Solution {
    pub value: f64,
    pub count: usize,
    pub iterations: usize,
}

impl CountSearch {
    fn prevalence(&self, count: usize) -> f64 {
        count as f64 / self.total as f64
    }

    fn accepts(&self, count: usize) -> bool {
        count.abs_diff(self.target) <= self.tolerance
    }

    /// Bisect until the count is within tolerance.
    ///
    /// # Errors
    /// - [`Error::PrevalenceUnreachable`] when the bracket end counts cannot
    ///   enclose the target
    /// - [`Error::ConversionNotConverged`] when the iterations run out or the
    ///   bracket collapses without reaching the target (ties in the input)
    pub fn solve<F>(&self, count: F) -> Result<Solution>
    where
        F: Fn(f64) -> usize,
    {
        let (mut lo, mut hi) = (self.lo, self.hi);
        let c_lo = count(lo);
        let c_hi = count(hi);

        if self.accepts(c_lo) {
            return Ok(Solution { value: lo, count: c_lo, iterations: 0 });
        }
        if self.accepts(c_hi) {
            return Ok(Solution { value: hi, count: c_hi, iterations: 0 });
        }

        let (reach_min, reach_max) = (c_lo.min(c_hi), c_lo.max(c_hi));
        if self.target < reach_min || self.target > reach_max {
            return Err(Error::PrevalenceUnreachable {
                target: self.prevalence(self.target),
                reachable_min: self.prevalence(reach_min),
                reachable_max: self.prevalence(reach_max),
            });
        }

        let mut best = if c_lo.abs_diff(self.target) <= c_hi.abs_diff(self.target) {
            c_lo
        } else {
            c_hi
        };

        for iteration in 1..=self.max_iterations {
            let mid = lo + (hi - lo) / 2.0;
            if mid <= lo || mid >= hi {
                tracing::debug!(iteration, lo, hi, "prevalence bracket collapsed");
                break;
            }
            let c = count(mid);
            if self.accepts(c) {
                tracing::debug!(iteration, value = mid, count = c, "prevalence matched");
                return Ok(Solution { value: mid, count: c, iterations: iteration });
            }
            if c.abs_diff(self.target) < best.abs_diff(self.target) {
                best = c;
            }
            let too_many = c > self.target;
            match (self.direction, too_many) {
                (Monotone::Increasing, true) | (Monotone::Decreasing, false) => hi = mid,
                (Monotone::Increasing, false) | (Monotone::Decreasing, true) => lo = mid,
            }
        }

        Err(Error::ConversionNotConverged {
            iterations: self.max_iterations,
            target: self.prevalence(self.target),
            achieved: self.prevalence(best),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(lo: f64, hi: f64, direction: Monotone, target: usize, total: usize) -> CountSearch {
        CountSearch {
            lo,
            hi,
            direction,
            target,
            tolerance: 0,
            total,
            max_iterations: 200,
        }
    }

    #[test]
    fn test_decreasing_threshold_count() {
        let values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let count = |beta: f64| values.iter().filter(|v| **v >= beta).count();
        let sol = search(1.0, 100.0, Monotone::Decreasing, 30, 100).solve(count).unwrap();
        assert_eq!(sol.count, 30);
        assert!(sol.value > 70.0 && sol.value <= 71.0);
    }

    #[test]
    fn test_increasing_count() {
        let values: Vec<f64> = (0..50).map(|v| v as f64 / 49.0).collect();
        let count = |b: f64| values.iter().filter(|v| **v + b >= 1.0).count();
        let sol = search(0.0, 1.0, Monotone::Increasing, 20, 50).solve(count).unwrap();
        assert_eq!(sol.count, 20);
    }

    #[test]
    fn test_unreachable_target() {
        let count = |_: f64| 5usize;
        let err = search(0.0, 1.0, Monotone::Decreasing, 9, 10).solve(count).unwrap_err();
        match err {
            Error::PrevalenceUnreachable { target, reachable_min, reachable_max } => {
                assert_eq!(target, 0.9);
                assert_eq!(reachable_min, 0.5);
                assert_eq!(reachable_max, 0.5);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_ties_do_not_converge() {
        // 4 tied cells jump the count from 2 to 6
        let values = [0.1, 0.2, 0.5, 0.5, 0.5, 0.5, 0.9, 0.95];
        let count = |beta: f64| values.iter().filter(|v| **v >= beta).count();
        let err = search(0.1, 0.95, Monotone::Decreasing, 4, 8).solve(count).unwrap_err();
        assert!(matches!(err, Error::ConversionNotConverged { .. }));
    }

    #[test]
    fn test_tolerance_accepts_nearby_count() {
        let values = [0.1, 0.2, 0.5, 0.5, 0.5, 0.5, 0.9, 0.95];
        let count = |beta: f64| values.iter().filter(|v| **v >= beta).count();
        let mut s = search(0.1, 0.95, Monotone::Decreasing, 5, 8);
        s.tolerance = 1;
        let sol = s.solve(count).unwrap();
        assert!(sol.count == 6 || sol.count == 4);
    }
}
