//! Environment sensor: best-effort readings for header metadata

use std::path::PathBuf;

use kac_core::EnvironmentSnapshot;
use serde::Deserialize;

pub trait EnvironmentSensor: Send + Sync {
    /// Current reading, or `None` if the sensor is absent or failing.
    fn sample(&self) -> Option<EnvironmentSnapshot>;
}

/// No sensor fitted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSensor;

impl EnvironmentSensor for NoSensor {
    fn sample(&self) -> Option<EnvironmentSnapshot> {
        None
    }
}

/// Reads the latest `{temperature, humidity, pressure}` snapshot that an
/// external sampler keeps up to date.
#[derive(Debug, Clone)]
pub struct SnapshotFileSensor {
    path: PathBuf,
}

#[derive(Deserialize)]
struct RawReading {
    temperature: f64,
    humidity: f64,
    pressure: f64,
}

impl SnapshotFileSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EnvironmentSensor for SnapshotFileSensor {
    fn sample(&self) -> Option<EnvironmentSnapshot> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "no sensor snapshot");
                return None;
            }
        };
        match serde_json::from_str::<RawReading>(&content) {
            Ok(r) if r.temperature.is_finite() && r.humidity.is_finite() && r.pressure.is_finite() => {
                Some(EnvironmentSnapshot::from_reading(
                    r.temperature,
                    r.humidity,
                    r.pressure,
                ))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "unreadable sensor snapshot");
                None
            }
        }
    }
}
