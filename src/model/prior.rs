//! Prior distribution over the latent space
//!
//! The aggregated posterior is pushed towards this distribution by the
//! adversarial game. The family is explicit configuration; draws happen
//! fresh per training step and are never persisted.

use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};

/// Prior distribution family and parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum PriorConfig {
    /// Isotropic Gaussian with the given standard deviation
    Gaussian { std: f64 },
    /// Uniform over [low, high) per dimension
    Uniform { low: f64, high: f64 },
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self::Gaussian { std: 1.0 }
    }
}

impl PriorConfig {
    /// Draw a fresh batch of prior samples with the given shape
    pub fn draw(&self, shape: &[i64], device: Device) -> Tensor {
        match self {
            PriorConfig::Gaussian { std } => {
                Tensor::randn(shape, (Kind::Float, device)) * *std
            }
            PriorConfig::Uniform { low, high } => {
                Tensor::rand(shape, (Kind::Float, device)) * (*high - *low) + *low
            }
        }
    }

    /// Validate the parameters, reporting the offending field
    pub fn validate(&self) -> crate::error::Result<()> {
        match self {
            PriorConfig::Gaussian { std } if *std <= 0.0 => Err(
                crate::error::AaeError::config("prior.std", format!("must be > 0, got {std}")),
            ),
            PriorConfig::Uniform { low, high } if high <= low => {
                Err(crate::error::AaeError::config(
                    "prior.high",
                    format!("must be > low ({low}), got {high}"),
                ))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_draw_shape() {
        let prior = PriorConfig::Gaussian { std: 1.0 };
        let z = prior.draw(&[16, 8], Device::Cpu);
        assert_eq!(z.size(), vec![16, 8]);
    }

    #[test]
    fn test_uniform_draw_bounds() {
        let prior = PriorConfig::Uniform { low: -2.0, high: 2.0 };
        let z = prior.draw(&[64, 4], Device::Cpu);
        assert!(z.min().double_value(&[]) >= -2.0);
        assert!(z.max().double_value(&[]) <= 2.0);
    }

    #[test]
    fn test_validate_rejects_bad_params() {
        assert!(PriorConfig::Gaussian { std: 0.0 }.validate().is_err());
        assert!(PriorConfig::Uniform { low: 1.0, high: 0.0 }.validate().is_err());
        assert!(PriorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_serde_tagged_family() {
        let json = r#"{"family":"gaussian","std":1.5}"#;
        let prior: PriorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(prior, PriorConfig::Gaussian { std: 1.5 });
    }
}
