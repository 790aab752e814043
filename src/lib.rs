//! # Adversarial Autoencoders for Images and Time Series
//!
//! This crate provides a modular implementation of adversarial autoencoders
//! (AAE): an encoder/decoder pair whose latent space is pushed towards a
//! prior distribution by a discriminator-based adversarial game. Two
//! modalities are supported behind one interface: single-channel images with
//! a flat latent code, and multivariate time series with a disentangled
//! (instance, local) code and a contrastive consistency loss.
//!
//! ## Modules
//!
//! - `data`: batch sources, normalization and synthetic datasets
//! - `model`: encoder/decoder/discriminator triad and the `Aae` wrapper
//! - `training`: alternating-phase training loop, losses and metrics
//! - `utils`: configuration and checkpointing
//! - `error`: error taxonomy

pub mod data;
pub mod error;
pub mod model;
pub mod training;
pub mod utils;

pub use data::{
    normalize_sequences, synthetic_images, synthetic_sequences, Batch, BatchSource, ImageLoader,
    SequenceBatch, SequenceLoader,
};
pub use error::{AaeError, Result};
pub use model::{Aae, DisentangledCode, LatentCode, Modality, ModelConfig, PriorConfig};
pub use training::{Phase, StepReport, Trainer, TrainingConfig, TrainingMetrics};
pub use utils::{find_latest_checkpoint, load_checkpoint, save_checkpoint, Config, TrainingState};
