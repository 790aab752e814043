//! Training module for the adversarial autoencoder
//!
//! This module provides:
//! - Loss functions (reconstruction, adversarial, instance consistency)
//! - The alternating-phase trainer
//! - Training configuration and metrics

mod losses;
mod metrics;
mod trainer;

pub use losses::{
    adversarial_discriminator_loss, adversarial_generator_loss, instance_contrastive_loss,
    reconstruction_loss, ReconstructionLoss,
};
pub use metrics::TrainingMetrics;
pub use trainer::{Phase, StepReport, Trainer, TrainingConfig};
