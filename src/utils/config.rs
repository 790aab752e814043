//! Configuration surface
//!
//! One file covers the whole pipeline: data, model and training sections.
//! Validation happens before anything is constructed and names the offending
//! field.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AaeError, Result};
use crate::model::{Modality, ModelConfig};
use crate::training::TrainingConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelConfig,
    /// Training configuration
    pub training: TrainSection,
}

/// Data-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Number of synthetic samples to generate
    pub num_samples: usize,
    /// Batch size
    pub batch_size: usize,
    /// Sub-window length for the consistency views (time-series mode)
    pub window_length: usize,
    /// Whether to shuffle each epoch
    pub shuffle: bool,
    /// Whether to drop the last incomplete batch
    pub drop_last: bool,
}

/// Training-related configuration as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSection {
    /// Number of epochs
    pub epochs: usize,
    /// Encoder learning rate
    pub encoder_lr: f64,
    /// Decoder learning rate
    pub decoder_lr: f64,
    /// Discriminator learning rate
    pub disc_lr: f64,
    /// Weight λ₁ of the adversarial generator term
    pub lambda_adv: f64,
    /// Weight λ₂ of the consistency term (ignored in image mode)
    pub lambda_consistency: f64,
    /// Contrastive loss temperature
    pub temperature: f64,
    /// Use label smoothing on the discriminator's real side
    pub label_smoothing: bool,
    /// Smoothed label for prior samples
    pub smooth_real: f64,
    /// Checkpoint save frequency in epochs (0 disables)
    pub checkpoint_every: usize,
    /// Checkpoint directory
    pub checkpoint_dir: String,
    /// Device: "cpu" or "cuda"
    pub device: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig {
                num_samples: 2048,
                batch_size: 64,
                window_length: 20,
                shuffle: true,
                drop_last: true,
            },
            model: ModelConfig::default(),
            training: TrainSection {
                epochs: 100,
                encoder_lr: 2e-4,
                decoder_lr: 2e-4,
                disc_lr: 1e-4,
                lambda_adv: 0.5,
                lambda_consistency: 0.5,
                temperature: 0.5,
                label_smoothing: false,
                smooth_real: 0.9,
                checkpoint_every: 10,
                checkpoint_dir: "checkpoints".to_string(),
                device: "cpu".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_toml(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| AaeError::config("config", e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save_toml(&self, path: &str) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| AaeError::config("config", e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn from_json(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| AaeError::config("config", e.to_string()))
    }

    /// Save configuration to a JSON file
    pub fn save_json(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AaeError::config("config", e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from file if it exists, otherwise write defaults there
    pub fn ensure_exists(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            if path.ends_with(".toml") {
                Self::from_toml(path)
            } else {
                Self::from_json(path)
            }
        } else {
            let config = Self::default();
            if path.ends_with(".toml") {
                config.save_toml(path)?;
            } else {
                config.save_json(path)?;
            }
            Ok(config)
        }
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        match self.training.device.to_lowercase().as_str() {
            "cuda" | "gpu" => {
                if tch::Cuda::is_available() {
                    tch::Device::Cuda(0)
                } else {
                    tracing::warn!("CUDA requested but not available, falling back to CPU");
                    tch::Device::Cpu
                }
            }
            _ => tch::Device::Cpu,
        }
    }

    /// Validate all sections, reporting the offending field
    pub fn validate(&self) -> Result<()> {
        if self.data.num_samples == 0 {
            return Err(AaeError::config("data.num_samples", "must be > 0"));
        }
        if self.data.batch_size == 0 {
            return Err(AaeError::config("data.batch_size", "must be > 0"));
        }
        if self.model.modality == Modality::TimeSeries {
            let seq_len = self.model.sequence_length as usize;
            if self.data.window_length == 0 || self.data.window_length > seq_len {
                return Err(AaeError::config(
                    "data.window_length",
                    format!(
                        "must be in 1..={seq_len}, got {}",
                        self.data.window_length
                    ),
                ));
            }
        }

        self.model.validate()?;

        if self.training.epochs == 0 {
            return Err(AaeError::config("training.epochs", "must be > 0"));
        }
        for (field, lr) in [
            ("training.encoder_lr", self.training.encoder_lr),
            ("training.decoder_lr", self.training.decoder_lr),
            ("training.disc_lr", self.training.disc_lr),
        ] {
            if lr <= 0.0 {
                return Err(AaeError::config(field, format!("must be > 0, got {lr}")));
            }
        }
        if self.training.lambda_adv < 0.0 {
            return Err(AaeError::config(
                "training.lambda_adv",
                format!("must be >= 0, got {}", self.training.lambda_adv),
            ));
        }
        if self.training.lambda_consistency < 0.0 {
            return Err(AaeError::config(
                "training.lambda_consistency",
                format!("must be >= 0, got {}", self.training.lambda_consistency),
            ));
        }
        if self.training.temperature <= 0.0 {
            return Err(AaeError::config(
                "training.temperature",
                format!("must be > 0, got {}", self.training.temperature),
            ));
        }
        Ok(())
    }

    /// Runtime training configuration for the trainer
    pub fn to_training_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.training.epochs,
            encoder_lr: self.training.encoder_lr,
            decoder_lr: self.training.decoder_lr,
            disc_lr: self.training.disc_lr,
            lambda_adv: self.training.lambda_adv,
            // Image mode has no consistency term; force λ₂ to zero
            lambda_consistency: match self.model.modality {
                Modality::Image => 0.0,
                Modality::TimeSeries => self.training.lambda_consistency,
            },
            temperature: self.training.temperature,
            label_smoothing: self.training.label_smoothing,
            smooth_real: self.training.smooth_real,
            checkpoint_every: self.training.checkpoint_every,
            checkpoint_dir: self.training.checkpoint_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validation_names_offending_field() {
        let mut config = Config::default();
        config.data.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("data.batch_size"));

        let mut config = Config::default();
        config.training.temperature = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("training.temperature"));
    }

    #[test]
    fn test_window_checked_in_time_series_mode() {
        let mut config = Config::default();
        config.model.modality = Modality::TimeSeries;
        config.model.sequence_length = 50;
        config.data.window_length = 51;
        assert!(config.validate().is_err());

        config.data.window_length = 20;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.data.batch_size, loaded.data.batch_size);
        assert_eq!(config.model.latent_dim, loaded.model.latent_dim);
        assert_eq!(config.model.prior, loaded.model.prior);
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config::default();
        config.save_toml(path.to_str().unwrap()).unwrap();

        let loaded = Config::from_toml(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.training.epochs, config.training.epochs);
    }

    #[test]
    fn test_image_mode_forces_zero_consistency_weight() {
        let config = Config::default();
        assert_eq!(config.model.modality, Modality::Image);
        assert_eq!(config.to_training_config().lambda_consistency, 0.0);
    }
}
