// # Properties-File Settings Provider
//
// The external form is a line-oriented `key = value` file. Blank lines
// and `#` comments are skipped and unknown keys are ignored; absence of
// any required key is fatal.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{PoolError, Result};
use crate::settings::PoolSettings;

const KEY_BASELINE_CAPACITY: &str = "initial.max.pool.size";
const KEY_INITIAL_FILL: &str = "initial.pool.size";
const KEY_MAX_CAPACITY: &str = "maximum.pool.size";
const KEY_ACQUIRE_TIMEOUT_AMOUNT: &str = "connection.timeout.amount";
const KEY_ACQUIRE_TIMEOUT_UNIT: &str = "connection.timeout.unit";
const KEY_LEAK_THRESHOLD_AMOUNT: &str = "connection.leak.threshold.amount";
const KEY_LEAK_THRESHOLD_UNIT: &str = "connection.leak.threshold.unit";
const KEY_VALIDATION_TIMEOUT_SECONDS: &str = "connection.validation.timeout.seconds";
const KEY_LEAK_SCAN_INTERVAL: &str = "connection.leak.detector.service.interval";
const KEY_LEAK_SCAN_INTERVAL_UNIT: &str = "connection.leak.detector.service.interval.unit";
const KEY_HIGH_LOAD_RATIO: &str = "high.load.threshold";
const KEY_LOW_LOAD_RATIO: &str = "low.load.threshold";
const KEY_GROW_FACTOR: &str = "high.load.growth.factor";
const KEY_TOP_UP_FACTOR: &str = "high.load.connection.growth.factor";
const KEY_MAX_TOP_UP: &str = "maximum.connection.growth.amount";
const KEY_SHRINK_FACTOR: &str = "low.load.pool.shrink.factor";
const KEY_LOW_LOAD_HYSTERESIS: &str = "low.load.hysteresis.count";

impl PoolSettings {
    /// Load and validate settings from a `key = value` properties file.
    pub fn from_properties_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PoolError::Io(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_properties(&parse_properties(&text))
    }

    fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let settings = Self {
            baseline_capacity: required_usize(props, KEY_BASELINE_CAPACITY)?,
            initial_fill: required_usize(props, KEY_INITIAL_FILL)?,
            max_capacity: required_usize(props, KEY_MAX_CAPACITY)?,
            acquire_timeout: required_duration(
                props,
                KEY_ACQUIRE_TIMEOUT_AMOUNT,
                KEY_ACQUIRE_TIMEOUT_UNIT,
            )?,
            validation_timeout: Duration::from_secs(required_u64(
                props,
                KEY_VALIDATION_TIMEOUT_SECONDS,
            )?),
            leak_threshold: required_duration(
                props,
                KEY_LEAK_THRESHOLD_AMOUNT,
                KEY_LEAK_THRESHOLD_UNIT,
            )?,
            leak_scan_interval: required_duration(
                props,
                KEY_LEAK_SCAN_INTERVAL,
                KEY_LEAK_SCAN_INTERVAL_UNIT,
            )?,
            high_load_ratio: required_f64(props, KEY_HIGH_LOAD_RATIO)?,
            low_load_ratio: required_f64(props, KEY_LOW_LOAD_RATIO)?,
            grow_factor: required_f64(props, KEY_GROW_FACTOR)?,
            top_up_factor: required_f64(props, KEY_TOP_UP_FACTOR)?,
            max_top_up: required_usize(props, KEY_MAX_TOP_UP)?,
            shrink_factor: required_f64(props, KEY_SHRINK_FACTOR)?,
            low_load_hysteresis: required_u64(props, KEY_LOW_LOAD_HYSTERESIS)? as u32,
        };

        settings.validate()?;
        Ok(settings)
    }
}

/// Parse `key = value` lines into a map. Blank lines and `#` comments are
/// skipped; everything after the first `=` belongs to the value.
pub(crate) fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            props.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    props
}

pub(crate) fn required<'a>(props: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    props
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| PoolError::ConfigMissing {
            key: key.to_string(),
        })
}

fn required_u64(props: &HashMap<String, String>, key: &str) -> Result<u64> {
    let raw = required(props, key)?;
    raw.parse()
        .map_err(|_| PoolError::ConfigInvalid(format!("{key}: not an integer: {raw}")))
}

fn required_usize(props: &HashMap<String, String>, key: &str) -> Result<usize> {
    Ok(required_u64(props, key)? as usize)
}

fn required_f64(props: &HashMap<String, String>, key: &str) -> Result<f64> {
    let raw = required(props, key)?;
    raw.parse()
        .map_err(|_| PoolError::ConfigInvalid(format!("{key}: not a number: {raw}")))
}

fn required_duration(
    props: &HashMap<String, String>,
    amount_key: &str,
    unit_key: &str,
) -> Result<Duration> {
    let amount = required_u64(props, amount_key)?;
    let unit = required(props, unit_key)?;
    duration_from(amount, unit)
        .ok_or_else(|| PoolError::ConfigInvalid(format!("{unit_key}: unknown time unit: {unit}")))
}

fn duration_from(amount: u64, unit: &str) -> Option<Duration> {
    let duration = match unit.to_ascii_uppercase().as_str() {
        "NANOS" | "NANOSECONDS" => Duration::from_nanos(amount),
        "MICROS" | "MICROSECONDS" => Duration::from_micros(amount),
        "MILLIS" | "MILLISECONDS" => Duration::from_millis(amount),
        "SECONDS" => Duration::from_secs(amount),
        "MINUTES" => Duration::from_secs(amount * 60),
        "HOURS" => Duration::from_secs(amount * 3600),
        "DAYS" => Duration::from_secs(amount * 86_400),
        _ => return None,
    };
    Some(duration)
}
