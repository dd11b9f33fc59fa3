//! Sampling decisions.
//!
//! A decision, once recorded on a context, is sticky: children inherit it and
//! [`Sampler::should_sample`] returns it unchanged. Without one, the sampler
//! consults, in order, the never list, the always list, the per-operation
//! rate and finally the default rate.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use ticketry_core::{Validate, ValidationError, ValidationErrors};
use tracing::debug;

use crate::context::TraceContext;
use crate::error::{Result, TraceError};

/// Sampling configuration.
///
/// Can be built in code or loaded from YAML:
///
/// ```yaml
/// default_rate: 0.1
/// operation_rates:
///   ticket.update: 0.5
/// always_sample: [ticket.delete]
/// never_sample: [health.check]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Probability of sampling an operation with no specific rule.
    pub default_rate: f64,

    /// Per-operation sampling probabilities.
    pub operation_rates: BTreeMap<String, f64>,

    /// Operations that are always sampled.
    pub always_sample: BTreeSet<String>,

    /// Operations that are never sampled. Takes precedence over `always_sample`.
    pub never_sample: BTreeSet<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            default_rate: 1.0,
            operation_rates: BTreeMap::new(),
            always_sample: BTreeSet::new(),
            never_sample: BTreeSet::new(),
        }
    }
}

impl SamplingConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> SamplingConfigBuilder {
        SamplingConfigBuilder::default()
    }

    /// Parses and validates a YAML configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or a rate is outside `[0, 1]`.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or contains
    /// an out-of-range rate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| TraceError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }
}

fn check_rate(field: &str, rate: f64) -> std::result::Result<(), ValidationError> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(ValidationError::range(
            field,
            format!("sampling rate must be within [0, 1], got {rate}"),
        ))
    }
}

impl Validate for SamplingConfig {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(check_rate("default_rate", self.default_rate));
        for (operation, rate) in &self.operation_rates {
            errors.check(check_rate(&format!("operation_rates.{operation}"), *rate));
        }
        errors.finish()
    }
}

/// Builder for [`SamplingConfig`].
#[derive(Debug, Default)]
pub struct SamplingConfigBuilder {
    config: SamplingConfig,
}

impl SamplingConfigBuilder {
    /// Sets the default sampling rate.
    #[must_use]
    pub const fn default_rate(mut self, rate: f64) -> Self {
        self.config.default_rate = rate;
        self
    }

    /// Sets the sampling rate of one operation.
    #[must_use]
    pub fn operation_rate(mut self, operation: impl Into<String>, rate: f64) -> Self {
        self.config.operation_rates.insert(operation.into(), rate);
        self
    }

    /// Always samples `operation`.
    #[must_use]
    pub fn always(mut self, operation: impl Into<String>) -> Self {
        self.config.always_sample.insert(operation.into());
        self
    }

    /// Never samples `operation`.
    #[must_use]
    pub fn never(mut self, operation: impl Into<String>) -> Self {
        self.config.never_sample.insert(operation.into());
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any rate is outside `[0, 1]`.
    pub fn build(self) -> Result<SamplingConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Makes sampling decisions from a validated [`SamplingConfig`].
#[derive(Debug, Clone, Default)]
pub struct Sampler {
    config: SamplingConfig,
}

impl Sampler {
    /// Creates a sampler.
    ///
    /// # Errors
    ///
    /// Returns an error if any rate in `config` is outside `[0, 1]`.
    pub fn new(config: SamplingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// A sampler that samples everything not explicitly excluded.
    #[must_use]
    pub fn always_on() -> Self {
        Self::default()
    }

    /// Returns the configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Decides whether `operation` should be sampled.
    ///
    /// An explicit decision on `ctx` wins. Otherwise this is an independent
    /// random draw per call; record the result with
    /// [`TraceContext::with_sampled`] to make it stick.
    #[must_use]
    pub fn should_sample(&self, ctx: Option<&TraceContext>, operation: &str) -> bool {
        self.should_sample_with(ctx, operation, &mut rand::thread_rng())
    }

    /// Same as [`should_sample`](Self::should_sample) with a caller-supplied RNG.
    #[must_use]
    pub fn should_sample_with<R: Rng + ?Sized>(
        &self,
        ctx: Option<&TraceContext>,
        operation: &str,
        rng: &mut R,
    ) -> bool {
        if let Some(sampled) = ctx.and_then(TraceContext::sampled) {
            return sampled;
        }

        if self.config.never_sample.contains(operation) {
            debug!(operation, "Not sampled: operation on never list");
            return false;
        }
        if self.config.always_sample.contains(operation) {
            debug!(operation, "Sampled: operation on always list");
            return true;
        }

        let rate = self
            .config
            .operation_rates
            .get(operation)
            .copied()
            .unwrap_or(self.config.default_rate);
        let sampled = bernoulli(rate, rng);
        debug!(operation, rate, sampled, "Sampling decision");
        sampled
    }

    /// Returns `ctx` with a sampling decision recorded.
    ///
    /// Contexts that already carry a decision are returned unchanged.
    #[must_use]
    pub fn decide(&self, ctx: TraceContext, operation: &str) -> TraceContext {
        if ctx.sampled().is_some() {
            return ctx;
        }
        let sampled = self.should_sample(Some(&ctx), operation);
        ctx.with_sampled(sampled)
    }
}

fn bernoulli<R: Rng + ?Sized>(rate: f64, rng: &mut R) -> bool {
    if rate >= 1.0 {
        true
    } else if rate <= 0.0 {
        false
    } else {
        rng.gen::<f64>() < rate
    }
}

impl TraceContext {
    /// Starts a new trace with a sampling decision for `operation` recorded.
    #[must_use]
    pub fn root_sampled(sampler: &Sampler, operation: &str) -> Self {
        sampler.decide(Self::root(), operation)
    }
}
