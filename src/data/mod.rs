//! Data module for batching training samples
//!
//! This module provides:
//! - The `BatchSource` trait consumed by the training loop
//! - In-memory loaders for image and sequence datasets
//! - Normalization utilities
//! - Synthetic dataset generators used by the CLI and tests

mod loader;
mod preprocessing;
mod synthetic;

pub use loader::{Batch, BatchSource, ImageLoader, SequenceBatch, SequenceLoader};
pub use preprocessing::{denormalize_sequences, normalize_sequences, NormalizationParams};
pub use synthetic::{synthetic_images, synthetic_sequences};
