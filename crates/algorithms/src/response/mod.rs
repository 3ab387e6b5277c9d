//! Response functions: environmental value -> response
//!
//! Functions are looked up by name in a [`ResponseRegistry`]. Each function
//! declares its named parameters; argument mappings are validated against
//! that declaration before any raster is touched.
//!
//! Built-ins:
//! - **linear** `a*x + b`
//! - **quadratic** `a*x² + b*x + c`
//! - **logistic** `1 / (1 + exp((x - beta) / alpha))`
//! - **gaussian** normal density, optionally skewed by `extreme_value`
//! - **custnorm** normal density with sd set from a probability window
//! - **beta_response** `(x-p1)^alpha * (p2-x)^gamma` on `(p1, p2)`

mod functions;

pub use functions::{BetaResponse, Custnorm, Gaussian, Linear, Logistic, Quadratic};

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use virtualspecies_core::{Error, Result};

/// Named parameter of a response function
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: Cow<'static, str>,
    /// Value used when the argument mapping omits this parameter
    pub default: Option<f64>,
}

impl ParameterSpec {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            default: None,
        }
    }

    pub const fn optional(name: &'static str, default: f64) -> Self {
        Self {
            name: Cow::Borrowed(name),
            default: Some(default),
        }
    }
}

/// A scalar response curve.
///
/// `evaluate` receives the arguments in `parameters()` order.
pub trait ResponseFunction: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn parameters(&self) -> &[ParameterSpec];

    /// Check argument values; the message names the offending parameter
    fn validate(&self, _args: &[f64]) -> std::result::Result<(), String> {
        Ok(())
    }

    fn evaluate(&self, x: f64, args: &[f64]) -> f64;
}

type ResponseFn = dyn Fn(f64, &[f64]) -> f64 + Send + Sync;

/// User-supplied response function
#[derive(Clone)]
pub struct CustomResponse {
    name: String,
    parameters: Vec<ParameterSpec>,
    f: Arc<ResponseFn>,
}

impl CustomResponse {
    /// `f` receives the value and the arguments in `parameters` order
    pub fn new<F>(name: impl Into<String>, parameters: &[&str], f: F) -> Self
    where
        F: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: parameters
                .iter()
                .map(|p| ParameterSpec {
                    name: Cow::Owned((*p).to_string()),
                    default: None,
                })
                .collect(),
            f: Arc::new(f),
        }
    }

    /// Give a parameter a default value.
    ///
    /// # Errors
    /// [`Error::Configuration`] if the function has no such parameter
    pub fn with_default(mut self, parameter: &str, default: f64) -> Result<Self> {
        match self.parameters.iter_mut().find(|p| p.name == parameter) {
            Some(spec) => {
                spec.default = Some(default);
                Ok(self)
            }
            None => Err(Error::config(
                format!("response function '{}'", self.name),
                format!("no parameter '{}' to give a default", parameter),
            )),
        }
    }
}

impl fmt::Debug for CustomResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomResponse")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ResponseFunction for CustomResponse {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    fn evaluate(&self, x: f64, args: &[f64]) -> f64 {
        (self.f)(x, args)
    }
}

/// Per-variable response specification: function name, arguments and the
/// observed range of the environmental layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseParameterBlock {
    pub function: String,
    pub args: BTreeMap<String, f64>,
    pub observed_min: Option<f64>,
    pub observed_max: Option<f64>,
}

impl ResponseParameterBlock {
    pub fn new<S: Into<String>>(function: impl Into<String>, args: impl IntoIterator<Item = (S, f64)>) -> Self {
        Self {
            function: function.into(),
            args: args.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            observed_min: None,
            observed_max: None,
        }
    }

    pub fn linear(a: f64, b: f64) -> Self {
        Self::new("linear", [("a", a), ("b", b)])
    }

    pub fn quadratic(a: f64, b: f64, c: f64) -> Self {
        Self::new("quadratic", [("a", a), ("b", b), ("c", c)])
    }

    pub fn logistic(alpha: f64, beta: f64) -> Self {
        Self::new("logistic", [("alpha", alpha), ("beta", beta)])
    }

    pub fn gaussian(mean: f64, sd: f64) -> Self {
        Self::new("gaussian", [("mean", mean), ("sd", sd)])
    }
}

/// A response function with its arguments resolved
#[derive(Debug, Clone)]
pub struct BoundResponse {
    function: Arc<dyn ResponseFunction>,
    args: Vec<f64>,
}

impl BoundResponse {
    pub fn function_name(&self) -> &str {
        self.function.name()
    }

    pub fn args(&self) -> &[f64] {
        &self.args
    }

    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.function.evaluate(x, &self.args)
    }
}

/// Name -> response function mapping
#[derive(Debug, Clone)]
pub struct ResponseRegistry {
    functions: BTreeMap<String, Arc<dyn ResponseFunction>>,
}

impl Default for ResponseRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ResponseRegistry {
    /// Registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        let builtins: [Arc<dyn ResponseFunction>; 6] = [
            Arc::new(Linear),
            Arc::new(Quadratic),
            Arc::new(Logistic),
            Arc::new(Gaussian),
            Arc::new(Custnorm),
            Arc::new(BetaResponse),
        ];
        for f in builtins {
            registry.functions.insert(f.name().to_string(), f);
        }
        registry
    }

    /// Register a function, replacing any function of the same name.
    ///
    /// Parameter names must be non-empty and unique.
    pub fn register<F: ResponseFunction + 'static>(&mut self, function: F) -> Result<()> {
        let name = function.name().to_string();
        if name.is_empty() {
            return Err(Error::config("response registry", "function name must not be empty"));
        }
        let params = function.parameters();
        for (i, p) in params.iter().enumerate() {
            if p.name.is_empty() {
                return Err(Error::config(
                    format!("response function '{}'", name),
                    "parameter names must not be empty",
                ));
            }
            if params[..i].iter().any(|q| q.name == p.name) {
                return Err(Error::config(
                    format!("response function '{}'", name),
                    format!("duplicate parameter '{}'", p.name),
                ));
            }
        }
        self.functions.insert(name, Arc::new(function));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ResponseFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    /// Resolve a parameter block for `variable` into a callable response.
    ///
    /// Fails with a configuration error naming the variable when the
    /// function is unknown, an argument is not a parameter of the function,
    /// a required parameter is missing, or a value is rejected.
    pub fn bind(&self, variable: &str, block: &ResponseParameterBlock) -> Result<BoundResponse> {
        let context = || format!("variable '{}'", variable);
        let function = self.get(&block.function).ok_or_else(|| {
            Error::config(
                context(),
                format!("unknown response function '{}' (available: {:?})", block.function, self.names()),
            )
        })?;

        let params = function.parameters();
        if let Some(unknown) = block.args.keys().find(|k| !params.iter().any(|p| p.name == k.as_str())) {
            let accepted: Vec<&str> = params.iter().map(|p| p.name.as_ref()).collect();
            return Err(Error::config(
                context(),
                format!(
                    "argument '{}' is not a parameter of '{}' (accepted: {:?})",
                    unknown, block.function, accepted
                ),
            ));
        }

        let mut args = Vec::with_capacity(params.len());
        for p in params {
            let value = block.args.get(&*p.name).copied().or(p.default).ok_or_else(|| {
                Error::config(
                    context(),
                    format!("missing argument '{}' for '{}'", p.name, block.function),
                )
            })?;
            if !value.is_finite() {
                return Err(Error::config(
                    context(),
                    format!("argument '{}' must be finite, got {}", p.name, value),
                ));
            }
            args.push(value);
        }

        function.validate(&args).map_err(|reason| Error::config(context(), reason))?;

        Ok(BoundResponse { function, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_builtin() {
        let registry = ResponseRegistry::default();
        let bound = registry.bind("bio1", &ResponseParameterBlock::linear(2.0, 1.0)).unwrap();
        assert_eq!(bound.eval(3.0), 7.0);
        assert_eq!(bound.function_name(), "linear");
    }

    #[test]
    fn test_unknown_argument_names_variable() {
        let registry = ResponseRegistry::default();
        let block = ResponseParameterBlock::new("linear", [("a", 1.0), ("slope", 2.0)]);
        match registry.bind("bio12", &block) {
            Err(Error::Configuration { context, reason }) => {
                assert!(context.contains("bio12"));
                assert!(reason.contains("slope"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_function() {
        let registry = ResponseRegistry::default();
        let block = ResponseParameterBlock::new("cubic", [("a", 1.0)]);
        assert!(matches!(
            registry.bind("bio1", &block),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_missing_required_argument() {
        let registry = ResponseRegistry::default();
        let block = ResponseParameterBlock::new("gaussian", [("mean", 1.0)]);
        assert!(registry.bind("bio1", &block).is_err());
    }

    #[test]
    fn test_custom_function_substitutes_builtin() {
        let mut registry = ResponseRegistry::default();
        registry
            .register(CustomResponse::new("linear", &["k"], |x, args| args[0] * x))
            .unwrap();
        let bound = registry
            .bind("bio1", &ResponseParameterBlock::new("linear", [("k", 3.0)]))
            .unwrap();
        assert_eq!(bound.eval(2.0), 6.0);
    }

    #[test]
    fn test_custom_default_parameter() {
        let mut registry = ResponseRegistry::empty();
        registry
            .register(
                CustomResponse::new("threshold", &["cut", "high"], |x, a| if x >= a[0] { a[1] } else { 0.0 })
                    .with_default("high", 1.0)
                    .unwrap(),
            )
            .unwrap();
        let bound = registry
            .bind("v", &ResponseParameterBlock::new("threshold", [("cut", 5.0)]))
            .unwrap();
        assert_eq!(bound.eval(6.0), 1.0);
        assert_eq!(bound.eval(4.0), 0.0);
    }

    #[test]
    fn test_default_for_unknown_parameter() {
        let err = CustomResponse::new("step", &["cut"], |x, a| if x >= a[0] { 1.0 } else { 0.0 })
            .with_default("hight", 1.0)
            .unwrap_err();
        match err {
            Error::Configuration { context, reason } => {
                assert!(context.contains("step"));
                assert!(reason.contains("hight"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_register_rejects_duplicate_parameters() {
        let mut registry = ResponseRegistry::empty();
        let err = registry
            .register(CustomResponse::new("bad", &["a", "a"], |x, _| x))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
