//! AAE wrapper combining encoder, decoder and discriminator
//!
//! `Aae` owns three disjoint `VarStore`s, one per parameter set, so each
//! network can be bound to its own optimizer. The modality-specific networks
//! sit behind the `AaeNetworks` trait: two implementations selected by
//! configuration, one uniform Sample -> Latent Code -> Sample contract.

use serde::{Deserialize, Serialize};
use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device, Kind, Tensor};

use crate::error::{AaeError, Result};

use super::decoder::{ImageDecoder, SequenceDecoder};
use super::discriminator::LatentDiscriminator;
use super::encoder::{ImageEncoder, SequenceEncoder};
use super::latent::{DisentangledCode, LatentCode};
use super::prior::PriorConfig;

/// Data modality selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    /// Single-channel images, flat latent code
    Image,
    /// Multivariate sequences, disentangled latent code
    TimeSeries,
}

/// Model configuration covering both modalities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which modality this model handles
    pub modality: Modality,
    /// Flat latent dimensionality (image mode)
    pub latent_dim: i64,
    /// Instance component dimensionality (time-series mode)
    pub instance_dim: i64,
    /// Local component dimensionality (time-series mode)
    pub local_dim: i64,
    /// Image height and width (image mode, divisible by 4)
    pub image_size: i64,
    /// Sequence length (time-series mode)
    pub sequence_length: i64,
    /// Channels per timestep (time-series mode)
    pub num_channels: i64,
    /// GRU hidden size (time-series mode)
    pub hidden_dim: i64,
    /// Base conv filters (image mode)
    pub base_filters: i64,
    /// Discriminator hidden size
    pub disc_hidden: i64,
    /// Discriminator dropout rate
    pub dropout: f64,
    /// Whether to also regularize the local codes against the prior
    pub regularize_local: bool,
    /// Prior distribution over the latent space
    pub prior: PriorConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            modality: Modality::Image,
            latent_dim: 8,
            instance_dim: 4,
            local_dim: 4,
            image_size: 28,
            sequence_length: 50,
            num_channels: 3,
            hidden_dim: 64,
            base_filters: 32,
            disc_hidden: 128,
            dropout: 0.2,
            regularize_local: true,
            prior: PriorConfig::default(),
        }
    }
}

impl ModelConfig {
    /// Validate dimensions, reporting the offending field
    pub fn validate(&self) -> Result<()> {
        match self.modality {
            Modality::Image => {
                if self.latent_dim <= 0 {
                    return Err(AaeError::config(
                        "model.latent_dim",
                        format!("must be > 0, got {}", self.latent_dim),
                    ));
                }
                if self.image_size <= 0 || self.image_size % 4 != 0 {
                    return Err(AaeError::config(
                        "model.image_size",
                        format!("must be > 0 and divisible by 4, got {}", self.image_size),
                    ));
                }
                if self.base_filters <= 0 {
                    return Err(AaeError::config(
                        "model.base_filters",
                        format!("must be > 0, got {}", self.base_filters),
                    ));
                }
            }
            Modality::TimeSeries => {
                if self.instance_dim <= 0 {
                    return Err(AaeError::config(
                        "model.instance_dim",
                        format!("must be > 0, got {}", self.instance_dim),
                    ));
                }
                if self.local_dim <= 0 {
                    return Err(AaeError::config(
                        "model.local_dim",
                        format!("must be > 0, got {}", self.local_dim),
                    ));
                }
                if self.sequence_length <= 0 {
                    return Err(AaeError::config(
                        "model.sequence_length",
                        format!("must be > 0, got {}", self.sequence_length),
                    ));
                }
                if self.num_channels <= 0 {
                    return Err(AaeError::config(
                        "model.num_channels",
                        format!("must be > 0, got {}", self.num_channels),
                    ));
                }
                if self.hidden_dim <= 0 {
                    return Err(AaeError::config(
                        "model.hidden_dim",
                        format!("must be > 0, got {}", self.hidden_dim),
                    ));
                }
            }
        }
        if self.disc_hidden <= 0 {
            return Err(AaeError::config(
                "model.disc_hidden",
                format!("must be > 0, got {}", self.disc_hidden),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(AaeError::config(
                "model.dropout",
                format!("must be in [0, 1), got {}", self.dropout),
            ));
        }
        self.prior.validate()
    }
}

/// Modality-specific network triad behind a uniform interface
pub trait AaeNetworks {
    /// Encode samples into latent codes
    fn encode(&self, xs: &Tensor, train: bool) -> LatentCode;

    /// Decode latent codes back into sample space
    fn decode(&self, code: &LatentCode, train: bool) -> Tensor;

    /// Discriminator logits for every prior-regularized component
    fn discriminate(&self, code: &LatentCode, train: bool) -> Vec<Tensor>;

    /// Draw a fresh prior code shaped like this modality's latent
    fn sample_prior(&self, batch_size: i64, prior: &PriorConfig, device: Device) -> LatentCode;

    /// Instance codes for a pair of sub-window views, if the modality
    /// supports the consistency loss
    fn window_instance_codes(&self, window_a: &Tensor, window_b: &Tensor)
        -> Option<(Tensor, Tensor)>;
}

/// Image-mode networks: conv encoder/decoder, one latent discriminator
struct ImageNetworks {
    encoder: ImageEncoder,
    decoder: ImageDecoder,
    discriminator: LatentDiscriminator,
    latent_dim: i64,
}

impl ImageNetworks {
    fn new(enc: &nn::Path, dec: &nn::Path, disc: &nn::Path, config: &ModelConfig) -> Self {
        Self {
            encoder: ImageEncoder::new(enc, config.image_size, config.latent_dim, config.base_filters),
            decoder: ImageDecoder::new(dec, config.image_size, config.latent_dim, config.base_filters),
            discriminator: LatentDiscriminator::new(
                disc,
                config.latent_dim,
                config.disc_hidden,
                config.dropout,
            ),
            latent_dim: config.latent_dim,
        }
    }
}

impl AaeNetworks for ImageNetworks {
    fn encode(&self, xs: &Tensor, _train: bool) -> LatentCode {
        LatentCode::Flat(self.encoder.forward(xs))
    }

    fn decode(&self, code: &LatentCode, _train: bool) -> Tensor {
        match code {
            LatentCode::Flat(z) => self.decoder.forward(z),
            LatentCode::Disentangled(_) => unreachable!("image decoder expects a flat code"),
        }
    }

    fn discriminate(&self, code: &LatentCode, train: bool) -> Vec<Tensor> {
        match code {
            LatentCode::Flat(z) => vec![self.discriminator.forward_t(z, train)],
            LatentCode::Disentangled(_) => {
                unreachable!("image discriminator expects a flat code")
            }
        }
    }

    fn sample_prior(&self, batch_size: i64, prior: &PriorConfig, device: Device) -> LatentCode {
        LatentCode::Flat(prior.draw(&[batch_size, self.latent_dim], device))
    }

    fn window_instance_codes(&self, _a: &Tensor, _b: &Tensor) -> Option<(Tensor, Tensor)> {
        None
    }
}

/// Time-series networks: GRU encoder/decoder, instance discriminator and an
/// optional per-timestep local discriminator
struct SequenceNetworks {
    encoder: SequenceEncoder,
    decoder: SequenceDecoder,
    instance_disc: LatentDiscriminator,
    local_disc: Option<LatentDiscriminator>,
    instance_dim: i64,
    local_dim: i64,
    sequence_length: i64,
}

impl SequenceNetworks {
    fn new(enc: &nn::Path, dec: &nn::Path, disc: &nn::Path, config: &ModelConfig) -> Self {
        let encoder = SequenceEncoder::new(
            enc,
            config.num_channels,
            config.hidden_dim,
            config.instance_dim,
            config.local_dim,
        );
        let decoder = SequenceDecoder::new(
            dec,
            config.num_channels,
            config.hidden_dim,
            config.instance_dim,
            config.local_dim,
        );
        let instance_disc = LatentDiscriminator::new(
            &(disc / "instance"),
            config.instance_dim,
            config.disc_hidden,
            config.dropout,
        );
        let local_disc = config.regularize_local.then(|| {
            LatentDiscriminator::new(
                &(disc / "local"),
                config.local_dim,
                config.disc_hidden,
                config.dropout,
            )
        });

        Self {
            encoder,
            decoder,
            instance_disc,
            local_disc,
            instance_dim: config.instance_dim,
            local_dim: config.local_dim,
            sequence_length: config.sequence_length,
        }
    }
}

impl AaeNetworks for SequenceNetworks {
    fn encode(&self, xs: &Tensor, _train: bool) -> LatentCode {
        LatentCode::Disentangled(self.encoder.forward(xs))
    }

    fn decode(&self, code: &LatentCode, _train: bool) -> Tensor {
        match code {
            LatentCode::Disentangled(pair) => self.decoder.forward(pair),
            LatentCode::Flat(_) => unreachable!("sequence decoder expects a disentangled code"),
        }
    }

    fn discriminate(&self, code: &LatentCode, train: bool) -> Vec<Tensor> {
        match code {
            LatentCode::Disentangled(pair) => {
                let mut logits = vec![self.instance_disc.forward_t(&pair.instance, train)];
                if let Some(local_disc) = &self.local_disc {
                    // Every timestep code is scored as an independent sample
                    let flat = pair.local.reshape([-1, self.local_dim]);
                    logits.push(local_disc.forward_t(&flat, train));
                }
                logits
            }
            LatentCode::Flat(_) => unreachable!("sequence discriminator expects a disentangled code"),
        }
    }

    fn sample_prior(&self, batch_size: i64, prior: &PriorConfig, device: Device) -> LatentCode {
        LatentCode::Disentangled(DisentangledCode {
            instance: prior.draw(&[batch_size, self.instance_dim], device),
            local: prior.draw(&[batch_size, self.sequence_length, self.local_dim], device),
        })
    }

    fn window_instance_codes(&self, window_a: &Tensor, window_b: &Tensor)
        -> Option<(Tensor, Tensor)> {
        Some((
            self.encoder.encode_window(window_a),
            self.encoder.encode_window(window_b),
        ))
    }
}

/// Complete adversarial autoencoder
///
/// Owns three disjoint parameter sets; the trainer binds one optimizer to
/// each and never mixes them.
pub struct Aae {
    networks: Box<dyn AaeNetworks>,
    /// Variable store for the encoder
    pub encoder_vs: VarStore,
    /// Variable store for the decoder
    pub decoder_vs: VarStore,
    /// Variable store for the discriminator(s)
    pub discriminator_vs: VarStore,
    config: ModelConfig,
    device: Device,
}

impl std::fmt::Debug for Aae {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aae")
            .field("config", &self.config)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl Aae {
    /// Create a new model, validating the configuration and verifying at
    /// construction time that decode(encode(x)) reproduces the sample shape
    pub fn new(config: ModelConfig, device: Device) -> Result<Self> {
        config.validate()?;

        let encoder_vs = VarStore::new(device);
        let decoder_vs = VarStore::new(device);
        let discriminator_vs = VarStore::new(device);

        let networks: Box<dyn AaeNetworks> = match config.modality {
            Modality::Image => Box::new(ImageNetworks::new(
                &encoder_vs.root(),
                &decoder_vs.root(),
                &discriminator_vs.root(),
                &config,
            )),
            Modality::TimeSeries => Box::new(SequenceNetworks::new(
                &encoder_vs.root(),
                &decoder_vs.root(),
                &discriminator_vs.root(),
                &config,
            )),
        };

        let model = Self {
            networks,
            encoder_vs,
            decoder_vs,
            discriminator_vs,
            config,
            device,
        };
        model.verify_shapes()?;
        Ok(model)
    }

    /// Dry-run forward pass proving the round-trip shape invariant
    fn verify_shapes(&self) -> Result<()> {
        tch::no_grad(|| {
            let dummy = match self.config.modality {
                Modality::Image => Tensor::zeros(
                    [2, 1, self.config.image_size, self.config.image_size],
                    (Kind::Float, self.device),
                ),
                Modality::TimeSeries => Tensor::zeros(
                    [2, self.config.sequence_length, self.config.num_channels],
                    (Kind::Float, self.device),
                ),
            };
            let code = self.networks.encode(&dummy, false);
            let recon = self.networks.decode(&code, false);
            if recon.size() != dummy.size() {
                let field = match self.config.modality {
                    Modality::Image => "model.image_size",
                    Modality::TimeSeries => "model.sequence_length",
                };
                return Err(AaeError::config(
                    field,
                    format!(
                        "decoder output shape {:?} does not match sample shape {:?}",
                        recon.size(),
                        dummy.size()
                    ),
                ));
            }
            Ok(())
        })
    }

    /// Encode a batch of samples
    pub fn encode(&self, xs: &Tensor, train: bool) -> LatentCode {
        self.networks.encode(xs, train)
    }

    /// Decode latent codes
    pub fn decode(&self, code: &LatentCode, train: bool) -> Tensor {
        self.networks.decode(code, train)
    }

    /// Discriminator logits for each regularized latent component
    pub fn discriminate(&self, code: &LatentCode, train: bool) -> Vec<Tensor> {
        self.networks.discriminate(code, train)
    }

    /// Draw a fresh prior code for a batch of the given size
    pub fn sample_prior(&self, batch_size: i64) -> LatentCode {
        self.networks
            .sample_prior(batch_size, &self.config.prior, self.device)
    }

    /// Instance codes for two sub-window views (time-series mode only)
    pub fn window_instance_codes(&self, window_a: &Tensor, window_b: &Tensor)
        -> Option<(Tensor, Tensor)> {
        self.networks.window_instance_codes(window_a, window_b)
    }

    /// Generate novel samples from prior draws, independent of training
    pub fn sample(&self, num_samples: i64) -> Tensor {
        tch::no_grad(|| {
            let code = self.sample_prior(num_samples);
            self.networks.decode(&code, false)
        })
    }

    /// Round-trip a batch through encoder and decoder without gradients
    pub fn reconstruct(&self, xs: &Tensor) -> Tensor {
        tch::no_grad(|| {
            let code = self.networks.encode(xs, false);
            self.networks.decode(&code, false)
        })
    }

    /// Adam optimizer over the encoder parameters only
    pub fn encoder_optimizer(&self, lr: f64) -> Result<nn::Optimizer> {
        Ok(gan_adam().build(&self.encoder_vs, lr)?)
    }

    /// Adam optimizer over the decoder parameters only
    pub fn decoder_optimizer(&self, lr: f64) -> Result<nn::Optimizer> {
        Ok(gan_adam().build(&self.decoder_vs, lr)?)
    }

    /// Adam optimizer over the discriminator parameters only
    pub fn discriminator_optimizer(&self, lr: f64) -> Result<nn::Optimizer> {
        Ok(gan_adam().build(&self.discriminator_vs, lr)?)
    }

    /// Save the three parameter sets to the given paths
    pub fn save(&self, encoder: &str, decoder: &str, discriminator: &str) -> Result<()> {
        self.encoder_vs.save(encoder)?;
        self.decoder_vs.save(decoder)?;
        self.discriminator_vs.save(discriminator)?;
        Ok(())
    }

    /// Load the three parameter sets from the given paths
    pub fn load(&mut self, encoder: &str, decoder: &str, discriminator: &str) -> Result<()> {
        self.encoder_vs.load(encoder)?;
        self.decoder_vs.load(decoder)?;
        self.discriminator_vs.load(discriminator)?;
        Ok(())
    }

    /// Device the model lives on
    pub fn device(&self) -> Device {
        self.device
    }

    /// Model configuration
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

/// Adam with the momentum schedule customary for adversarial training
fn gan_adam() -> nn::Adam {
    nn::Adam {
        beta1: 0.5,
        beta2: 0.999,
        wd: 0.0,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_config() -> ModelConfig {
        ModelConfig {
            modality: Modality::Image,
            latent_dim: 8,
            image_size: 28,
            base_filters: 16,
            ..Default::default()
        }
    }

    fn sequence_config() -> ModelConfig {
        ModelConfig {
            modality: Modality::TimeSeries,
            instance_dim: 4,
            local_dim: 4,
            sequence_length: 50,
            num_channels: 3,
            hidden_dim: 32,
            ..Default::default()
        }
    }

    #[test]
    fn test_image_roundtrip_shape() {
        let model = Aae::new(image_config(), Device::Cpu).unwrap();
        let xs = Tensor::full(&[32, 1, 28, 28], 0.5, (Kind::Float, Device::Cpu));
        let recon = model.reconstruct(&xs);
        assert_eq!(recon.size(), vec![32, 1, 28, 28]);
    }

    #[test]
    fn test_sequence_latent_shapes() {
        let model = Aae::new(sequence_config(), Device::Cpu).unwrap();
        let xs = Tensor::randn([16, 50, 3], (Kind::Float, Device::Cpu));
        match model.encode(&xs, false) {
            LatentCode::Disentangled(code) => {
                assert_eq!(code.instance.size(), vec![16, 4]);
                assert_eq!(code.local.size(), vec![16, 50, 4]);
            }
            LatentCode::Flat(_) => panic!("expected a disentangled code"),
        }
    }

    #[test]
    fn test_sample_matches_sample_space() {
        let model = Aae::new(sequence_config(), Device::Cpu).unwrap();
        let generated = model.sample(5);
        assert_eq!(generated.size(), vec![5, 50, 3]);
    }

    #[test]
    fn test_invalid_config_reports_field() {
        let mut config = image_config();
        config.latent_dim = 0;
        let err = Aae::new(config, Device::Cpu).unwrap_err();
        assert!(err.to_string().contains("latent_dim"));
    }

    #[test]
    fn test_image_size_must_be_divisible_by_four() {
        let mut config = image_config();
        config.image_size = 30;
        let err = Aae::new(config, Device::Cpu).unwrap_err();
        assert!(err.to_string().contains("image_size"));
    }

    #[test]
    fn test_discriminate_component_count() {
        let mut config = sequence_config();
        config.regularize_local = false;
        let model = Aae::new(config, Device::Cpu).unwrap();
        let code = model.sample_prior(4);
        assert_eq!(model.discriminate(&code, false).len(), 1);

        let mut config = sequence_config();
        config.regularize_local = true;
        let model = Aae::new(config, Device::Cpu).unwrap();
        let code = model.sample_prior(4);
        assert_eq!(model.discriminate(&code, false).len(), 2);
    }
}
