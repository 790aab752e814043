//! Alternating-phase training loop
//!
//! One step per batch, phases in strict order: the autoencoder phase
//! (reconstruction + adversarial generator + consistency, one backward pass,
//! encoder and decoder parameters only), then the discriminator phase (fresh
//! prior draws against re-encoded detached codes, discriminator parameters
//! only). A non-finite loss in any phase halts the run with the step index
//! and phase; there are no retries.

use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, Device, Kind, Tensor};
use tracing::{info, warn};

use crate::data::{Batch, BatchSource};
use crate::error::{AaeError, Result};
use crate::model::Aae;
use crate::utils::{save_checkpoint, TrainingState};

use super::losses::{
    adversarial_discriminator_loss, adversarial_generator_loss, instance_contrastive_loss,
    reconstruction_loss, ReconstructionLoss,
};
use super::metrics::TrainingMetrics;

/// Phase of the per-step state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Between steps
    Idle,
    /// Computing the reconstruction term
    Reconstruction,
    /// Computing the adversarial generator and consistency terms
    AdversarialGenerator,
    /// Updating the discriminator against fresh prior draws
    AdversarialDiscriminator,
    /// Step finished, about to return to `Idle`
    StepComplete,
}

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Learning rate for the encoder optimizer
    pub encoder_lr: f64,
    /// Learning rate for the decoder optimizer
    pub decoder_lr: f64,
    /// Learning rate for the discriminator optimizer
    pub disc_lr: f64,
    /// Weight λ₁ of the adversarial generator term
    pub lambda_adv: f64,
    /// Weight λ₂ of the instance-consistency term (ignored in image mode)
    pub lambda_consistency: f64,
    /// Temperature of the contrastive loss
    pub temperature: f64,
    /// Whether to smooth the discriminator's real-side labels
    pub label_smoothing: bool,
    /// Smoothed label for prior samples (e.g. 0.9)
    pub smooth_real: f64,
    /// Save a checkpoint every N epochs (0 disables)
    pub checkpoint_every: usize,
    /// Directory to save checkpoints
    pub checkpoint_dir: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
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
        }
    }
}

/// Loss values produced by one training step
#[derive(Debug, Clone)]
pub struct StepReport {
    pub recon_loss: f64,
    pub adv_gen_loss: f64,
    /// Present only in time-series mode
    pub consistency_loss: Option<f64>,
    pub autoencoder_loss: f64,
    pub disc_loss: f64,
    pub disc_real_acc: f64,
    pub disc_fake_acc: f64,
}

struct AutoencoderPhaseReport {
    recon_loss: f64,
    adv_gen_loss: f64,
    consistency_loss: Option<f64>,
    total_loss: f64,
}

struct DiscriminatorPhaseReport {
    loss: f64,
    real_acc: f64,
    fake_acc: f64,
}

/// AAE trainer driving the alternating optimization
pub struct Trainer {
    config: TrainingConfig,
    device: Device,
    metrics: TrainingMetrics,
    phase: Phase,
    step: usize,
    start_epoch: usize,
}

impl Trainer {
    /// Create a new trainer
    pub fn new(config: TrainingConfig, device: Device) -> Self {
        Self {
            config,
            device,
            metrics: TrainingMetrics::new(),
            phase: Phase::Idle,
            step: 0,
            start_epoch: 0,
        }
    }

    /// Continue a previous run from a restored training state
    pub fn resume(&mut self, state: &TrainingState, metrics: TrainingMetrics) {
        self.start_epoch = state.epoch;
        self.step = state.step;
        self.metrics = metrics;
    }

    /// Train the model over the batch source
    ///
    /// Returns the collected metrics, or the first fatal error (divergence,
    /// malformed batch, checkpoint failure is only warned about).
    pub fn train(&mut self, model: &Aae, source: &mut dyn BatchSource) -> Result<&TrainingMetrics> {
        let mut enc_opt = model.encoder_optimizer(self.config.encoder_lr)?;
        let mut dec_opt = model.decoder_optimizer(self.config.decoder_lr)?;
        let mut disc_opt = model.discriminator_optimizer(self.config.disc_lr)?;

        let num_batches = source.num_batches();
        info!(
            "starting training for {} epochs, {} batches per epoch",
            self.config.epochs, num_batches
        );

        for epoch in self.start_epoch..self.config.epochs {
            let mut epoch_recon = 0.0;
            let mut epoch_adv = 0.0;
            let mut epoch_consistency = 0.0;
            let mut epoch_disc = 0.0;
            let mut epoch_real_acc = 0.0;
            let mut epoch_fake_acc = 0.0;
            let mut batch_count = 0usize;

            let pb = ProgressBar::new(num_batches as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("##-"),
            );

            while let Some(batch) = source.next_batch()? {
                let report =
                    self.train_step(model, &batch, &mut enc_opt, &mut dec_opt, &mut disc_opt)?;

                epoch_recon += report.recon_loss;
                epoch_adv += report.adv_gen_loss;
                epoch_consistency += report.consistency_loss.unwrap_or(0.0);
                epoch_disc += report.disc_loss;
                epoch_real_acc += report.disc_real_acc;
                epoch_fake_acc += report.disc_fake_acc;
                batch_count += 1;

                pb.set_message(format!(
                    "recon: {:.4}, D: {:.4}",
                    report.recon_loss, report.disc_loss
                ));
                pb.inc(1);
            }
            pb.finish_with_message("done");

            if batch_count == 0 {
                return Err(AaeError::Data("batch source yielded no batches".to_string()));
            }

            let n = batch_count as f64;
            self.metrics.record_epoch(
                epoch_recon / n,
                epoch_adv / n,
                epoch_consistency / n,
                epoch_disc / n,
                epoch_real_acc / n,
                epoch_fake_acc / n,
            );

            info!(
                "epoch {}/{}: recon={:.4}, adv={:.4}, D={:.4}, real_acc={:.2}%, fake_acc={:.2}%",
                epoch + 1,
                self.config.epochs,
                epoch_recon / n,
                epoch_adv / n,
                epoch_disc / n,
                epoch_real_acc / n * 100.0,
                epoch_fake_acc / n * 100.0
            );

            if self.metrics.check_mode_collapse(10) {
                warn!("possible mode collapse detected; consider adjusting learning rates");
            }

            if self.config.checkpoint_every > 0 && (epoch + 1) % self.config.checkpoint_every == 0 {
                let state = TrainingState {
                    epoch: epoch + 1,
                    step: self.step,
                };
                if let Err(e) =
                    save_checkpoint(model, &self.metrics, &state, &self.config.checkpoint_dir)
                {
                    warn!("failed to save checkpoint: {e}");
                }
            }

            source.reset();
        }

        Ok(&self.metrics)
    }

    /// Execute one full training step on a batch
    pub fn train_step(
        &mut self,
        model: &Aae,
        batch: &Batch,
        enc_opt: &mut nn::Optimizer,
        dec_opt: &mut nn::Optimizer,
        disc_opt: &mut nn::Optimizer,
    ) -> Result<StepReport> {
        let ae = self.autoencoder_phase(model, batch, enc_opt, dec_opt)?;
        let disc = self.discriminator_phase(model, batch, disc_opt)?;

        self.phase = Phase::StepComplete;
        self.step += 1;
        self.phase = Phase::Idle;

        Ok(StepReport {
            recon_loss: ae.recon_loss,
            adv_gen_loss: ae.adv_gen_loss,
            consistency_loss: ae.consistency_loss,
            autoencoder_loss: ae.total_loss,
            disc_loss: disc.loss,
            disc_real_acc: disc.real_acc,
            disc_fake_acc: disc.fake_acc,
        })
    }

    /// Combined reconstruction + adversarial generator phase
    ///
    /// One backward pass; only encoder and decoder parameters step. The
    /// gradient that reaches the discriminator's weights here is discarded
    /// by its own `zero_grad` before the discriminator phase backward.
    fn autoencoder_phase(
        &mut self,
        model: &Aae,
        batch: &Batch,
        enc_opt: &mut nn::Optimizer,
        dec_opt: &mut nn::Optimizer,
    ) -> Result<AutoencoderPhaseReport> {
        self.phase = Phase::Reconstruction;
        let xs = batch.input().to_device(self.device);
        let recon_kind = match batch {
            Batch::Image(_) => ReconstructionLoss::Bce,
            Batch::Sequence(_) => ReconstructionLoss::Mse,
        };

        let code = model.encode(&xs, true);
        let recon = model.decode(&code, true);
        let recon_loss = reconstruction_loss(&recon, &xs, recon_kind);
        let recon_value = self.check_finite(&recon_loss, "reconstruction")?;

        self.phase = Phase::AdversarialGenerator;
        let fake_logits = model.discriminate(&code, true);
        let adv_loss = adversarial_generator_loss(&fake_logits);
        let adv_value = self.check_finite(&adv_loss, "adversarial generator")?;

        let consistency = match batch {
            Batch::Sequence(sb) => {
                let window_a = sb.window_a.to_device(self.device);
                let window_b = sb.window_b.to_device(self.device);
                model
                    .window_instance_codes(&window_a, &window_b)
                    .map(|(a, b)| instance_contrastive_loss(&a, &b, self.config.temperature))
            }
            Batch::Image(_) => None,
        };
        let consistency_value = match &consistency {
            Some(loss) => Some(self.check_finite(loss, "consistency")?),
            None => None,
        };

        let mut total = &recon_loss + &adv_loss * self.config.lambda_adv;
        if let Some(loss) = &consistency {
            total = total + loss * self.config.lambda_consistency;
        }
        let total_value = self.check_finite(&total, "autoencoder objective")?;

        enc_opt.zero_grad();
        dec_opt.zero_grad();
        total.backward();
        enc_opt.step();
        dec_opt.step();

        Ok(AutoencoderPhaseReport {
            recon_loss: recon_value,
            adv_gen_loss: adv_value,
            consistency_loss: consistency_value,
            total_loss: total_value,
        })
    }

    /// Discriminator phase
    ///
    /// Re-encodes the same batch without gradients, draws a fresh prior
    /// batch, and steps the discriminator optimizer only.
    fn discriminator_phase(
        &mut self,
        model: &Aae,
        batch: &Batch,
        disc_opt: &mut nn::Optimizer,
    ) -> Result<DiscriminatorPhaseReport> {
        self.phase = Phase::AdversarialDiscriminator;
        let xs = batch.input().to_device(self.device);
        let batch_size = xs.size()[0];

        let posterior = tch::no_grad(|| model.encode(&xs, false)).detach();
        let prior = model.sample_prior(batch_size);

        let real_logits = model.discriminate(&prior, true);
        let fake_logits = model.discriminate(&posterior, true);

        let smooth = self.config.label_smoothing.then_some(self.config.smooth_real);
        let disc_loss = adversarial_discriminator_loss(&real_logits, &fake_logits, smooth);
        let loss_value = self.check_finite(&disc_loss, "discriminator")?;

        disc_opt.zero_grad();
        disc_loss.backward();
        disc_opt.step();

        Ok(DiscriminatorPhaseReport {
            loss: loss_value,
            real_acc: mean_accuracy(&real_logits, true),
            fake_acc: mean_accuracy(&fake_logits, false),
        })
    }

    /// Extract the scalar loss value, halting on NaN/Inf
    fn check_finite(&self, loss: &Tensor, name: &'static str) -> Result<f64> {
        let value = loss.double_value(&[]);
        if !value.is_finite() {
            return Err(AaeError::Divergence {
                step: self.step,
                phase: self.phase,
                loss: name,
            });
        }
        Ok(value)
    }

    /// Get training metrics
    pub fn metrics(&self) -> &TrainingMetrics {
        &self.metrics
    }

    /// Get configuration
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Global step counter
    pub fn step(&self) -> usize {
        self.step
    }
}

/// Fraction of logits classified correctly, averaged over components
fn mean_accuracy(logit_sets: &[Tensor], real: bool) -> f64 {
    let mut total = 0.0;
    for logits in logit_sets {
        let probs = logits.sigmoid();
        let correct = if real { probs.ge(0.5) } else { probs.lt(0.5) };
        total += correct
            .to_kind(Kind::Float)
            .mean(Kind::Float)
            .double_value(&[]);
    }
    total / logit_sets.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SequenceBatch;
    use crate::model::{Modality, ModelConfig};
    use tch::nn::VarStore;

    fn image_model() -> Aae {
        let config = ModelConfig {
            modality: Modality::Image,
            latent_dim: 8,
            image_size: 28,
            base_filters: 16,
            ..Default::default()
        };
        Aae::new(config, Device::Cpu).unwrap()
    }

    fn sequence_model() -> Aae {
        let config = ModelConfig {
            modality: Modality::TimeSeries,
            instance_dim: 4,
            local_dim: 4,
            sequence_length: 50,
            num_channels: 3,
            hidden_dim: 32,
            ..Default::default()
        };
        Aae::new(config, Device::Cpu).unwrap()
    }

    fn sequence_batch(model_seq_len: i64) -> Batch {
        let xs = Tensor::rand([8, model_seq_len, 3], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
        let window_a = xs.narrow(1, 0, 20);
        let window_b = xs.narrow(1, 25, 20);
        Batch::Sequence(SequenceBatch {
            sequences: xs,
            window_a,
            window_b,
        })
    }

    fn snapshot(vs: &VarStore) -> Vec<(String, Tensor)> {
        vs.variables()
            .iter()
            .map(|(name, t)| (name.clone(), t.detach().copy()))
            .collect()
    }

    fn unchanged(before: &[(String, Tensor)], vs: &VarStore) -> bool {
        let now = vs.variables();
        before.iter().all(|(name, t)| t.equal(&now[name]))
    }

    fn optimizers(model: &Aae) -> (nn::Optimizer, nn::Optimizer, nn::Optimizer) {
        (
            model.encoder_optimizer(1e-3).unwrap(),
            model.decoder_optimizer(1e-3).unwrap(),
            model.discriminator_optimizer(1e-3).unwrap(),
        )
    }

    #[test]
    fn test_image_step_losses_finite() {
        let model = image_model();
        let mut trainer = Trainer::new(TrainingConfig::default(), Device::Cpu);
        let (mut enc_opt, mut dec_opt, mut disc_opt) = optimizers(&model);

        let batch = Batch::Image(Tensor::full(
            &[32, 1, 28, 28],
            0.5,
            (Kind::Float, Device::Cpu),
        ));
        let report = trainer
            .train_step(&model, &batch, &mut enc_opt, &mut dec_opt, &mut disc_opt)
            .unwrap();

        assert!(report.recon_loss.is_finite());
        assert!(report.recon_loss >= 0.0);
        assert!(report.disc_loss.is_finite());
        assert!(report.consistency_loss.is_none());
        assert_eq!(trainer.step(), 1);

        let recon = model.reconstruct(batch.input());
        assert_eq!(recon.size(), vec![32, 1, 28, 28]);
    }

    #[test]
    fn test_sequence_step_losses_finite() {
        let model = sequence_model();
        let mut trainer = Trainer::new(TrainingConfig::default(), Device::Cpu);
        let (mut enc_opt, mut dec_opt, mut disc_opt) = optimizers(&model);

        let batch = sequence_batch(50);
        let report = trainer
            .train_step(&model, &batch, &mut enc_opt, &mut dec_opt, &mut disc_opt)
            .unwrap();

        assert!(report.recon_loss.is_finite());
        assert!(report.consistency_loss.unwrap().is_finite());
        assert!(report.autoencoder_loss.is_finite());
    }

    #[test]
    fn test_generator_phase_leaves_discriminator_untouched() {
        let model = image_model();
        let mut trainer = Trainer::new(TrainingConfig::default(), Device::Cpu);
        let (mut enc_opt, mut dec_opt, _) = optimizers(&model);

        let disc_before = snapshot(&model.discriminator_vs);
        let batch = Batch::Image(Tensor::rand([16, 1, 28, 28], (Kind::Float, Device::Cpu)));
        trainer
            .autoencoder_phase(&model, &batch, &mut enc_opt, &mut dec_opt)
            .unwrap();

        assert!(unchanged(&disc_before, &model.discriminator_vs));
    }

    #[test]
    fn test_discriminator_phase_leaves_autoencoder_untouched() {
        let model = image_model();
        let mut trainer = Trainer::new(TrainingConfig::default(), Device::Cpu);
        let (_, _, mut disc_opt) = optimizers(&model);

        let enc_before = snapshot(&model.encoder_vs);
        let dec_before = snapshot(&model.decoder_vs);
        let batch = Batch::Image(Tensor::rand([16, 1, 28, 28], (Kind::Float, Device::Cpu)));
        trainer
            .discriminator_phase(&model, &batch, &mut disc_opt)
            .unwrap();

        assert!(unchanged(&enc_before, &model.encoder_vs));
        assert!(unchanged(&dec_before, &model.decoder_vs));
    }

    #[test]
    fn test_train_records_metrics_per_epoch() {
        let config = ModelConfig {
            modality: Modality::TimeSeries,
            instance_dim: 3,
            local_dim: 3,
            sequence_length: 30,
            num_channels: 2,
            hidden_dim: 16,
            disc_hidden: 32,
            ..Default::default()
        };
        let model = Aae::new(config, Device::Cpu).unwrap();

        let raw = crate::data::synthetic_sequences(16, 30, 2);
        let (normalized, _) = crate::data::normalize_sequences(&raw);
        let mut source =
            crate::data::SequenceLoader::new(normalized, 30, 2, 10, 4, true, true).unwrap();

        let training_config = TrainingConfig {
            epochs: 2,
            checkpoint_every: 0,
            ..Default::default()
        };
        let mut trainer = Trainer::new(training_config, Device::Cpu);
        let metrics = trainer.train(&model, &mut source).unwrap();

        assert_eq!(metrics.num_epochs(), 2);
        assert!(metrics.recon_losses.iter().all(|v| v.is_finite()));
        assert!(metrics.disc_losses.iter().all(|v| v.is_finite()));
        assert!(metrics.consistency_losses.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_divergent_batch_halts_before_discriminator_phase() {
        let model = image_model();
        let mut trainer = Trainer::new(TrainingConfig::default(), Device::Cpu);
        let (mut enc_opt, mut dec_opt, mut disc_opt) = optimizers(&model);

        let disc_before = snapshot(&model.discriminator_vs);
        let bad = Batch::Image(Tensor::full(
            &[4, 1, 28, 28],
            f64::INFINITY,
            (Kind::Float, Device::Cpu),
        ));
        let err = trainer
            .train_step(&model, &bad, &mut enc_opt, &mut dec_opt, &mut disc_opt)
            .unwrap_err();

        match err {
            AaeError::Divergence { step, phase, .. } => {
                assert_eq!(step, 0);
                assert_eq!(phase, Phase::Reconstruction);
            }
            other => panic!("expected divergence error, got {other}"),
        }
        // The discriminator phase never ran
        assert!(unchanged(&disc_before, &model.discriminator_vs));
        assert_eq!(trainer.step(), 0);
    }
}
