// # Pool Settings
//
// Immutable tunables for the session pool: capacity bounds, timeouts,
// the leak scanner period, and the load thresholds and factors that
// drive elastic sizing.
//
// Two providers are shipped:
// - `PoolSettings::default()` for hardcoded defaults
// - `PoolSettings::from_properties_file()` for `key = value` files

pub mod file;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PoolError, Result};

/// Configuration for the session pool.
///
/// Validated on construction by both providers and by
/// [`PoolSettingsBuilder::build`]; a pool never observes an inconsistent
/// settings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Floor capacity; the pool never shrinks below this
    pub baseline_capacity: usize,

    /// Number of sessions opened eagerly at startup
    pub initial_fill: usize,

    /// Hard ceiling; the pool never grows beyond this
    pub max_capacity: usize,

    /// Maximum wait on an empty free queue during acquire
    pub acquire_timeout: Duration,

    /// Budget for a single liveness probe
    pub validation_timeout: Duration,

    /// A session held longer than this is considered leaked
    pub leak_threshold: Duration,

    /// Period of the background leak scanner
    pub leak_scan_interval: Duration,

    /// Active/capacity at or above this triggers a capacity grow
    pub high_load_ratio: f64,

    /// Active/capacity below this is a shrink candidate
    pub low_load_ratio: f64,

    /// Capacity multiplier when growing (> 1)
    pub grow_factor: f64,

    /// Fraction of capacity opened when the free queue empties (0, 1]
    pub top_up_factor: f64,

    /// Hard cap on a single top-up batch
    pub max_top_up: usize,

    /// Capacity multiplier when shrinking (0, 1)
    pub shrink_factor: f64,

    /// Consecutive low-load readings required before a shrink
    pub low_load_hysteresis: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            baseline_capacity: 10,
            initial_fill: 10,
            max_capacity: 100,
            acquire_timeout: Duration::from_secs(30),
            validation_timeout: Duration::from_secs(5),
            leak_threshold: Duration::from_secs(300),
            leak_scan_interval: Duration::from_secs(30),
            high_load_ratio: 0.75,
            low_load_ratio: 0.25,
            grow_factor: 2.0,
            top_up_factor: 0.25,
            max_top_up: 10,
            shrink_factor: 0.5,
            low_load_hysteresis: 3,
        }
    }
}

impl PoolSettings {
    /// Validate the settings table.
    pub fn validate(&self) -> Result<()> {
        if self.baseline_capacity == 0 {
            return Err(PoolError::ConfigInvalid(
                "baseline_capacity must be at least 1".to_string(),
            ));
        }

        if self.baseline_capacity > self.max_capacity {
            return Err(PoolError::ConfigInvalid(format!(
                "baseline_capacity ({}) > max_capacity ({})",
                self.baseline_capacity, self.max_capacity
            )));
        }

        if self.initial_fill > self.max_capacity {
            return Err(PoolError::ConfigInvalid(format!(
                "initial_fill ({}) > max_capacity ({})",
                self.initial_fill, self.max_capacity
            )));
        }

        if !(self.low_load_ratio > 0.0 && self.low_load_ratio < self.high_load_ratio) {
            return Err(PoolError::ConfigInvalid(format!(
                "load ratios must satisfy 0 < low ({}) < high ({})",
                self.low_load_ratio, self.high_load_ratio
            )));
        }

        if self.high_load_ratio > 1.0 {
            return Err(PoolError::ConfigInvalid(format!(
                "high_load_ratio ({}) > 1.0",
                self.high_load_ratio
            )));
        }

        if self.grow_factor <= 1.0 {
            return Err(PoolError::ConfigInvalid(format!(
                "grow_factor ({}) must be > 1",
                self.grow_factor
            )));
        }

        if !(self.top_up_factor > 0.0 && self.top_up_factor <= 1.0) {
            return Err(PoolError::ConfigInvalid(format!(
                "top_up_factor ({}) must be in (0, 1]",
                self.top_up_factor
            )));
        }

        if self.max_top_up == 0 {
            return Err(PoolError::ConfigInvalid(
                "max_top_up must be at least 1".to_string(),
            ));
        }

        if !(self.shrink_factor > 0.0 && self.shrink_factor < 1.0) {
            return Err(PoolError::ConfigInvalid(format!(
                "shrink_factor ({}) must be in (0, 1)",
                self.shrink_factor
            )));
        }

        if self.low_load_hysteresis == 0 {
            return Err(PoolError::ConfigInvalid(
                "low_load_hysteresis must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Create a builder seeded with the default settings.
    pub fn builder() -> PoolSettingsBuilder {
        PoolSettingsBuilder::default()
    }
}

/// Builder for pool settings.
#[derive(Default)]
pub struct PoolSettingsBuilder {
    settings: PoolSettings,
}

impl PoolSettingsBuilder {
    pub fn baseline_capacity(mut self, capacity: usize) -> Self {
        self.settings.baseline_capacity = capacity;
        self
    }

    pub fn initial_fill(mut self, fill: usize) -> Self {
        self.settings.initial_fill = fill;
        self
    }

    pub fn max_capacity(mut self, capacity: usize) -> Self {
        self.settings.max_capacity = capacity;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.settings.acquire_timeout = timeout;
        self
    }

    pub fn validation_timeout(mut self, timeout: Duration) -> Self {
        self.settings.validation_timeout = timeout;
        self
    }

    pub fn leak_threshold(mut self, threshold: Duration) -> Self {
        self.settings.leak_threshold = threshold;
        self
    }

    pub fn leak_scan_interval(mut self, interval: Duration) -> Self {
        self.settings.leak_scan_interval = interval;
        self
    }

    pub fn high_load_ratio(mut self, ratio: f64) -> Self {
        self.settings.high_load_ratio = ratio;
        self
    }

    pub fn low_load_ratio(mut self, ratio: f64) -> Self {
        self.settings.low_load_ratio = ratio;
        self
    }

    pub fn grow_factor(mut self, factor: f64) -> Self {
        self.settings.grow_factor = factor;
        self
    }

    pub fn top_up_factor(mut self, factor: f64) -> Self {
        self.settings.top_up_factor = factor;
        self
    }

    pub fn max_top_up(mut self, count: usize) -> Self {
        self.settings.max_top_up = count;
        self
    }

    pub fn shrink_factor(mut self, factor: f64) -> Self {
        self.settings.shrink_factor = factor;
        self
    }

    pub fn low_load_hysteresis(mut self, count: u32) -> Self {
        self.settings.low_load_hysteresis = count;
        self
    }

    pub fn build(self) -> Result<PoolSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(PoolSettings::default().validate().is_ok());
    }

    #[test]
    fn builder_produces_validated_settings() {
        let settings = PoolSettings::builder()
            .baseline_capacity(4)
            .initial_fill(2)
            .max_capacity(32)
            .acquire_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(settings.baseline_capacity, 4);
        assert_eq!(settings.initial_fill, 2);
        assert_eq!(settings.max_capacity, 32);
    }

    #[test]
    fn rejects_zero_baseline() {
        let result = PoolSettings::builder().baseline_capacity(0).build();
        assert!(matches!(result, Err(PoolError::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_baseline_above_max() {
        let result = PoolSettings::builder()
            .baseline_capacity(50)
            .max_capacity(10)
            .build();
        assert!(matches!(result, Err(PoolError::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_inverted_load_ratios() {
        let result = PoolSettings::builder()
            .low_load_ratio(0.9)
            .high_load_ratio(0.5)
            .build();
        assert!(matches!(result, Err(PoolError::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_shrink_factor_of_one() {
        let result = PoolSettings::builder().shrink_factor(1.0).build();
        assert!(matches!(result, Err(PoolError::ConfigInvalid(_))));
    }

    #[test]
    fn rejects_grow_factor_of_one() {
        let result = PoolSettings::builder().grow_factor(1.0).build();
        assert!(matches!(result, Err(PoolError::ConfigInvalid(_))));
    }
}
