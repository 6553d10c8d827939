//! Hyperparameter search space and objective definitions

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::SearchError;

/// A concrete hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Non-negative integer view; floats must be whole numbers
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Int(v) if *v >= 0 => Some(*v as usize),
            Self::Float(v) if *v >= 0.0 && v.fract() == 0.0 => Some(*v as usize),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Sampling rule for one hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterDomain {
    /// Always the same value
    Fixed { value: ParameterValue },
    /// Uniform float in [low, high]
    Uniform { low: f64, high: f64 },
    /// Float in [low, high], uniform in log space
    LogUniform { low: f64, high: f64 },
    /// Uniform integer in [low, high]
    IntRange { low: i64, high: i64 },
    /// Uniform choice from a categorical set
    Choice { choices: Vec<ParameterValue> },
}

impl ParameterDomain {
    pub fn fixed(value: ParameterValue) -> Self {
        Self::Fixed { value }
    }

    pub fn uniform(low: f64, high: f64) -> Self {
        Self::Uniform { low, high }
    }

    pub fn log_uniform(low: f64, high: f64) -> Self {
        Self::LogUniform { low, high }
    }

    pub fn int_range(low: i64, high: i64) -> Self {
        Self::IntRange { low, high }
    }

    pub fn choice(choices: Vec<ParameterValue>) -> Self {
        Self::Choice { choices }
    }

    /// Draw a value; the domain must have passed `validate`
    pub fn sample<R: Rng>(&self, rng: &mut R) -> ParameterValue {
        match self {
            Self::Fixed { value } => value.clone(),
            Self::Uniform { low, high } => ParameterValue::Float(rng.gen_range(*low..=*high)),
            Self::LogUniform { low, high } => {
                let log_value = rng.gen_range(low.ln()..=high.ln());
                ParameterValue::Float(log_value.exp().clamp(*low, *high))
            }
            Self::IntRange { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
            Self::Choice { choices } => {
                let idx = rng.gen_range(0..choices.len());
                choices[idx].clone()
            }
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), SearchError> {
        match self {
            Self::Fixed { .. } => Ok(()),
            Self::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(SearchError::invalid_parameter(
                        name,
                        format!("uniform range [{}, {}] is not a finite, ordered range", low, high),
                    ));
                }
                // the sampler needs a finite width, not just finite bounds
                if !(high - low).is_finite() {
                    return Err(SearchError::invalid_parameter(
                        name,
                        format!("uniform range [{}, {}] is too wide to sample", low, high),
                    ));
                }
                Ok(())
            }
            Self::LogUniform { low, high } => {
                if !low.is_finite() || !high.is_finite() || *low <= 0.0 || low > high {
                    return Err(SearchError::invalid_parameter(
                        name,
                        format!("log-uniform range [{}, {}] must be positive and ordered", low, high),
                    ));
                }
                Ok(())
            }
            Self::IntRange { low, high } => {
                if low > high {
                    return Err(SearchError::invalid_parameter(
                        name,
                        format!("integer range [{}, {}] is empty", low, high),
                    ));
                }
                Ok(())
            }
            Self::Choice { choices } => {
                if choices.is_empty() {
                    return Err(SearchError::invalid_parameter(name, "choice set is empty"));
                }
                Ok(())
            }
        }
    }
}

/// Mapping from hyperparameter name to its sampling rule
///
/// Iteration order is the sorted parameter name, which keeps sampling
/// reproducible for a fixed seed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HyperparameterSpace {
    params: BTreeMap<String, ParameterDomain>,
}

impl HyperparameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, domain: ParameterDomain) -> Self {
        self.insert(name, domain);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, domain: ParameterDomain) {
        self.params.insert(name.into(), domain);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDomain> {
        self.params.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterDomain)> {
        self.params.iter()
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.params.is_empty() {
            return Err(SearchError::EmptySpace);
        }

        for (name, domain) in &self.params {
            domain.validate(name)?;
        }

        Ok(())
    }

    /// Draw one assignment for every parameter
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Hyperparameters {
        Hyperparameters(
            self.params
                .iter()
                .map(|(name, domain)| (name.clone(), domain.sample(rng)))
                .collect(),
        )
    }
}

/// One sampled hyperparameter assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters(BTreeMap<String, ParameterValue>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Whether lower or higher objective scores are better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Minimize,
    Maximize,
}

impl Direction {
    /// Strict improvement, so the earliest trial wins ties
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Minimize => candidate < incumbent,
            Self::Maximize => candidate > incumbent,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimize => write!(f, "minimize"),
            Self::Maximize => write!(f, "maximize"),
        }
    }
}

/// The metric trials are ranked by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    pub metric: String,
    pub direction: Direction,
}

impl Objective {
    pub fn minimize(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            direction: Direction::Minimize,
        }
    }

    pub fn maximize(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            direction: Direction::Maximize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn space() -> HyperparameterSpace {
        HyperparameterSpace::new()
            .with("learning_rate", ParameterDomain::log_uniform(1e-4, 1e-1))
            .with("epochs", ParameterDomain::int_range(1, 10))
            .with("dropout", ParameterDomain::uniform(0.0, 0.5))
            .with(
                "optimizer",
                ParameterDomain::choice(vec![
                    ParameterValue::Text("sgd".to_string()),
                    ParameterValue::Text("adam".to_string()),
                ]),
            )
            .with("batch_size", ParameterDomain::fixed(ParameterValue::Int(32)))
    }

    #[test]
    fn test_samples_stay_in_domain() {
        let space = space();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let hp = space.sample(&mut rng);
            let lr = hp.get("learning_rate").and_then(|v| v.as_f64()).unwrap();
            assert!((1e-4..=1e-1).contains(&lr));

            let epochs = hp.get("epochs").and_then(|v| v.as_usize()).unwrap();
            assert!((1..=10).contains(&epochs));

            let dropout = hp.get("dropout").and_then(|v| v.as_f64()).unwrap();
            assert!((0.0..=0.5).contains(&dropout));

            assert_eq!(hp.get("batch_size"), Some(&ParameterValue::Int(32)));
        }
    }

    #[test]
    fn test_same_seed_same_samples() {
        let space = space();
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);

        for _ in 0..10 {
            assert_eq!(space.sample(&mut a), space.sample(&mut b));
        }
    }

    #[test]
    fn test_validate_rejects_bad_domains() {
        assert_eq!(HyperparameterSpace::new().validate(), Err(SearchError::EmptySpace));

        let bad = HyperparameterSpace::new().with("lr", ParameterDomain::log_uniform(0.0, 1.0));
        assert!(matches!(bad.validate(), Err(SearchError::InvalidParameter { .. })));

        let bad = HyperparameterSpace::new().with("k", ParameterDomain::int_range(5, 1));
        assert!(bad.validate().is_err());

        let bad = HyperparameterSpace::new().with("opt", ParameterDomain::choice(vec![]));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_uniform_span_must_be_finite() {
        let wide = HyperparameterSpace::new().with("l2", ParameterDomain::uniform(-1e308, 1e308));
        let err = wide.validate().unwrap_err();
        assert!(matches!(err, SearchError::InvalidParameter { .. }));
        assert!(err.to_string().contains("too wide"));

        let edge = HyperparameterSpace::new().with("l2", ParameterDomain::uniform(-1e307, 1e307));
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn test_domain_deserialization() {
        let json = r#"{
            "learning_rate": {"type": "log_uniform", "low": 0.001, "high": 0.1},
            "epochs": {"type": "int_range", "low": 5, "high": 20},
            "batch_size": {"type": "choice", "choices": [16, 32, 64]},
            "l2": {"type": "fixed", "value": 0.0}
        }"#;

        let space: HyperparameterSpace = serde_json::from_str(json).unwrap();
        assert_eq!(space.len(), 4);
        assert_eq!(
            space.get("batch_size"),
            Some(&ParameterDomain::choice(vec![
                ParameterValue::Int(16),
                ParameterValue::Int(32),
                ParameterValue::Int(64),
            ]))
        );
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_direction_is_strict() {
        assert!(Direction::Minimize.is_better(0.1, 0.2));
        assert!(!Direction::Minimize.is_better(0.2, 0.2));
        assert!(Direction::Maximize.is_better(0.9, 0.8));
        assert!(!Direction::Maximize.is_better(0.8, 0.8));
    }

    #[test]
    fn test_parameter_value_views() {
        assert_eq!(ParameterValue::Int(8).as_usize(), Some(8));
        assert_eq!(ParameterValue::Float(8.0).as_usize(), Some(8));
        assert_eq!(ParameterValue::Float(8.5).as_usize(), None);
        assert_eq!(ParameterValue::Int(-1).as_usize(), None);
        assert_eq!(ParameterValue::Text("a".to_string()).as_f64(), None);
    }
}
