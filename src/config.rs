use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::knn::DEFAULT_K;
use crate::simulator::SimulatorConfig;
use crate::types::{CONTROL_RATE_HZ, EMG_SAMPLE_RATE};

/// Configuración de la aplicación. Cualquier campo ausente en el JSON toma
/// su valor por defecto.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub control: ControlConfig,
    pub sensor: SensorConfig,
    pub classifier: ClassifierConfig,
    pub simulator: SimulatorConfig,
}

/// Lazo de control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub rate_hz: u32,
}

/// Banda y canal de eventos
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub discovery_timeout_ms: u64,
    pub emg_sample_rate_hz: f64,
    pub channel_capacity: usize,
}

/// k-NN y dataset de entrenamiento
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub k: usize,
    pub dataset_path: PathBuf,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            rate_hz: CONTROL_RATE_HZ,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: 10_000,
            emg_sample_rate_hz: EMG_SAMPLE_RATE,
            channel_capacity: 1024,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            dataset_path: PathBuf::from("myoscopio_dataset.csv"),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Carga `path` si se indica; si no, valores por defecto
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control.rate_hz == 0 {
            return Err(ConfigError::Invalid(
                "control.rate_hz debe ser positivo".to_string(),
            ));
        }
        if self.sensor.emg_sample_rate_hz <= 0.0 {
            return Err(ConfigError::Invalid(
                "sensor.emg_sample_rate_hz debe ser positivo".to_string(),
            ));
        }
        if self.sensor.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "sensor.channel_capacity debe ser positivo".to_string(),
            ));
        }
        if self.classifier.k == 0 {
            return Err(ConfigError::Invalid("classifier.k debe ser positivo".to_string()));
        }
        if self.simulator.emg_rate_hz <= 0.0 || self.simulator.orientation_rate_hz <= 0.0 {
            return Err(ConfigError::Invalid(
                "las frecuencias del simulador deben ser positivas".to_string(),
            ));
        }
        Ok(())
    }

    pub fn control_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.control.rate_hz as f64)
    }

    pub fn discovery_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sensor.discovery_timeout_ms)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuración inválida: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_match_control_constants() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.control_interval(), Duration::from_millis(20));
        assert_eq!(config.discovery_timeout(), Duration::from_secs(10));
        assert_eq!(config.classifier.k, 5);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "classifier": { "k": 3 }, "simulator": { "seed": 9 } }"#)
                .unwrap();
        assert_eq!(config.classifier.k, 3);
        assert_eq!(
            config.classifier.dataset_path,
            PathBuf::from("myoscopio_dataset.csv")
        );
        assert_eq!(config.simulator.seed, Some(9));
        assert_eq!(config.control.rate_hz, 50);
    }

    #[test]
    fn zero_rates_are_rejected() {
        let mut config = AppConfig::default();
        config.control.rate_hz = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.classifier.k = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn save_then_load_from_disk() {
        let path = std::env::temp_dir().join(format!("myoscopio_config_{}.json", std::process::id()));
        let mut config = AppConfig::default();
        config.sensor.discovery_timeout_ms = 2500;
        config.save_to_file(&path).unwrap();

        let loaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.sensor.discovery_timeout_ms, 2500);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_json_is_reported() {
        let path = std::env::temp_dir().join(format!("myoscopio_bad_{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(&path),
            Err(ConfigError::Json(_))
        ));
        let _ = std::fs::remove_file(&path);
    }
}
