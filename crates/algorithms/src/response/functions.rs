//! Built-in response functions

use super::{ParameterSpec, ResponseFunction};
use crate::special::{normal_cdf, normal_pdf, normal_quantile};

/// `a*x + b`
#[derive(Debug, Clone, Copy, Default)]
pub struct Linear;

impl ResponseFunction for Linear {
    fn name(&self) -> &str {
        "linear"
    }

    fn parameters(&self) -> &[ParameterSpec] {
        const P: &[ParameterSpec] = &[ParameterSpec::required("a"), ParameterSpec::required("b")];
        P
    }

    fn evaluate(&self, x: f64, args: &[f64]) -> f64 {
        args[0] * x + args[1]
    }
}

/// `a*x² + b*x + c`
#[derive(Debug, Clone, Copy, Default)]
pub struct Quadratic;

impl ResponseFunction for Quadratic {
    fn name(&self) -> &str {
        "quadratic"
    }

    fn parameters(&self) -> &[ParameterSpec] {
        const P: &[ParameterSpec] = &[
            ParameterSpec::required("a"),
            ParameterSpec::required("b"),
            ParameterSpec::required("c"),
        ];
        P
    }

    fn evaluate(&self, x: f64, args: &[f64]) -> f64 {
        (args[0] * x + args[1]) * x + args[2]
    }
}

/// `1 / (1 + exp((x - beta) / alpha))`
///
/// Decreasing for `alpha > 0`, increasing for `alpha < 0`; `beta` is the
/// inflection point.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logistic;

impl ResponseFunction for Logistic {
    fn name(&self) -> &str {
        "logistic"
    }

    fn parameters(&self) -> &[ParameterSpec] {
        const P: &[ParameterSpec] = &[ParameterSpec::required("alpha"), ParameterSpec::required("beta")];
        P
    }

    fn validate(&self, args: &[f64]) -> Result<(), String> {
        if args[0] == 0.0 {
            return Err("logistic 'alpha' must be non-zero".into());
        }
        Ok(())
    }

    fn evaluate(&self, x: f64, args: &[f64]) -> f64 {
        1.0 / (1.0 + ((x - args[1]) / args[0]).exp())
    }
}

/// Normal density, skewed when `extreme_value != 0`.
///
/// With `z = (x - mean) / sd` the skewed form is the skew-normal density
/// `2/sd * phi(z) * Phi(extreme_value * z)`; a positive `extreme_value`
/// stretches the upper tail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gaussian;

impl ResponseFunction for Gaussian {
    fn name(&self) -> &str {
        "gaussian"
    }

    fn parameters(&self) -> &[ParameterSpec] {
        const P: &[ParameterSpec] = &[
            ParameterSpec::required("mean"),
            ParameterSpec::required("sd"),
            ParameterSpec::optional("extreme_value", 0.0),
        ];
        P
    }

    fn validate(&self, args: &[f64]) -> Result<(), String> {
        if args[1] <= 0.0 {
            return Err(format!("gaussian 'sd' must be positive, got {}", args[1]));
        }
        Ok(())
    }

    fn evaluate(&self, x: f64, args: &[f64]) -> f64 {
        let (mean, sd, shape) = (args[0], args[1], args[2]);
        let density = normal_pdf(x, mean, sd);
        if shape == 0.0 {
            density
        } else {
            2.0 * density * normal_cdf(shape * (x - mean) / sd)
        }
    }
}

/// Normal density whose sd puts `prob` of the mass inside `mean ± diff`
#[derive(Debug, Clone, Copy, Default)]
pub struct Custnorm;

impl Custnorm {
    fn sd(diff: f64, prob: f64) -> f64 {
        diff / normal_quantile(0.5 + prob / 2.0)
    }
}

impl ResponseFunction for Custnorm {
    fn name(&self) -> &str {
        "custnorm"
    }

    fn parameters(&self) -> &[ParameterSpec] {
        const P: &[ParameterSpec] = &[
            ParameterSpec::required("mean"),
            ParameterSpec::required("diff"),
            ParameterSpec::required("prob"),
        ];
        P
    }

    fn validate(&self, args: &[f64]) -> Result<(), String> {
        if args[1] <= 0.0 {
            return Err(format!("custnorm 'diff' must be positive, got {}", args[1]));
        }
        if !(args[2] > 0.0 && args[2] < 1.0) {
            return Err(format!("custnorm 'prob' must lie in (0, 1), got {}", args[2]));
        }
        Ok(())
    }

    fn evaluate(&self, x: f64, args: &[f64]) -> f64 {
        normal_pdf(x, args[0], Self::sd(args[1], args[2]))
    }
}

/// `(x - p1)^alpha * (p2 - x)^gamma` on `(p1, p2)`, 0 elsewhere
#[derive(Debug, Clone, Copy, Default)]
pub struct BetaResponse;

impl ResponseFunction for BetaResponse {
    fn name(&self) -> &str {
        "beta_response"
    }

    fn parameters(&self) -> &[ParameterSpec] {
        const P: &[ParameterSpec] = &[
            ParameterSpec::required("p1"),
            ParameterSpec::required("p2"),
            ParameterSpec::required("alpha"),
            ParameterSpec::required("gamma"),
        ];
        P
    }

    fn validate(&self, args: &[f64]) -> Result<(), String> {
        if args[0] >= args[1] {
            return Err(format!("beta_response needs p1 < p2, got {} >= {}", args[0], args[1]));
        }
        if args[2] <= 0.0 || args[3] <= 0.0 {
            return Err("beta_response 'alpha' and 'gamma' must be positive".into());
        }
        Ok(())
    }

    fn evaluate(&self, x: f64, args: &[f64]) -> f64 {
        let (p1, p2, alpha, gamma) = (args[0], args[1], args[2], args[3]);
        if x <= p1 || x >= p2 {
            return 0.0;
        }
        (x - p1).powf(alpha) * (p2 - x).powf(gamma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quadratic() {
        assert_eq!(Quadratic.evaluate(2.0, &[1.0, -3.0, 2.0]), 0.0);
        assert_eq!(Quadratic.evaluate(0.0, &[1.0, -3.0, 2.0]), 2.0);
    }

    #[test]
    fn test_logistic_inflection() {
        assert_abs_diff_eq!(Logistic.evaluate(5.0, &[1.0, 5.0]), 0.5, epsilon = 1e-12);
        assert!(Logistic.evaluate(10.0, &[1.0, 5.0]) < 0.01);
        assert!(Logistic.evaluate(10.0, &[-1.0, 5.0]) > 0.99);
        assert!(Logistic.validate(&[0.0, 1.0]).is_err());
    }

    #[test]
    fn test_gaussian_symmetric_without_shape() {
        let args = [10.0, 2.0, 0.0];
        assert_abs_diff_eq!(
            Gaussian.evaluate(8.0, &args),
            Gaussian.evaluate(12.0, &args),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(Gaussian.evaluate(10.0, &args), 0.199_471_14, epsilon = 1e-7);
    }

    #[test]
    fn test_gaussian_skew() {
        let args = [0.0, 1.0, 4.0];
        // Positive shape moves mass above the mean
        assert!(Gaussian.evaluate(1.0, &args) > Gaussian.evaluate(-1.0, &args));
    }

    #[test]
    fn test_custnorm_window() {
        // 95% within ±1.96 implies sd = 1
        let args = [0.0, 1.959_964, 0.95];
        assert_abs_diff_eq!(Custnorm.evaluate(0.0, &args), normal_pdf(0.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_beta_response_support() {
        let args = [0.0, 10.0, 1.0, 1.0];
        assert_eq!(BetaResponse.evaluate(-1.0, &args), 0.0);
        assert_eq!(BetaResponse.evaluate(5.0, &args), 25.0);
        assert_eq!(BetaResponse.evaluate(10.0, &args), 0.0);
        assert!(BetaResponse.validate(&[5.0, 1.0, 1.0, 1.0]).is_err());
    }
}
