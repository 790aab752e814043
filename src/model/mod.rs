//! Model module containing the AAE architecture components
//!
//! This module provides:
//! - Latent code types (flat and disentangled)
//! - Prior distribution sampling
//! - Image and sequence encoder/decoder pairs
//! - Latent discriminator
//! - `Aae` wrapper combining the triad behind one interface

mod aae;
mod decoder;
mod discriminator;
mod encoder;
mod latent;
mod prior;

pub use aae::{Aae, AaeNetworks, Modality, ModelConfig};
pub use decoder::{ImageDecoder, SequenceDecoder};
pub use discriminator::LatentDiscriminator;
pub use encoder::{ImageEncoder, SequenceEncoder};
pub use latent::{DisentangledCode, LatentCode};
pub use prior::PriorConfig;
