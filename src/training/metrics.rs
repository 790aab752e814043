//! Training metrics for monitoring the adversarial game
//!
//! Tracks per-epoch averages of every loss term plus discriminator
//! accuracies, with moving-average diagnostics for mode collapse and
//! generator/discriminator balance.

use crate::error::{AaeError, Result};

/// Metrics collected during training
#[derive(Debug, Clone, Default)]
pub struct TrainingMetrics {
    /// Reconstruction losses per epoch
    pub recon_losses: Vec<f64>,
    /// Adversarial generator losses per epoch
    pub adv_gen_losses: Vec<f64>,
    /// Instance-consistency losses per epoch (zero in image mode)
    pub consistency_losses: Vec<f64>,
    /// Discriminator losses per epoch
    pub disc_losses: Vec<f64>,
    /// Discriminator accuracy on prior samples
    pub disc_real_acc: Vec<f64>,
    /// Discriminator accuracy on encoder codes
    pub disc_fake_acc: Vec<f64>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record epoch averages
    #[allow(clippy::too_many_arguments)]
    pub fn record_epoch(
        &mut self,
        recon_loss: f64,
        adv_gen_loss: f64,
        consistency_loss: f64,
        disc_loss: f64,
        real_acc: f64,
        fake_acc: f64,
    ) {
        self.recon_losses.push(recon_loss);
        self.adv_gen_losses.push(adv_gen_loss);
        self.consistency_losses.push(consistency_loss);
        self.disc_losses.push(disc_loss);
        self.disc_real_acc.push(real_acc);
        self.disc_fake_acc.push(fake_acc);
    }

    /// Get number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.recon_losses.len()
    }

    /// Get latest reconstruction loss
    pub fn latest_recon_loss(&self) -> Option<f64> {
        self.recon_losses.last().copied()
    }

    /// Get latest discriminator loss
    pub fn latest_disc_loss(&self) -> Option<f64> {
        self.disc_losses.last().copied()
    }

    /// Moving average of the adversarial generator loss
    pub fn adv_gen_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.adv_gen_losses, window)
    }

    /// Moving average of the discriminator loss
    pub fn disc_loss_ma(&self, window: usize) -> f64 {
        moving_average(&self.disc_losses, window)
    }

    /// Check if the adversarial game appears to have collapsed
    ///
    /// Collapse indicators: the discriminator separates posterior from prior
    /// with near-zero loss while the encoder cannot fool it at all.
    pub fn check_mode_collapse(&self, window: usize) -> bool {
        if self.num_epochs() < window {
            return false;
        }
        self.disc_loss_ma(window) < 0.1 && self.adv_gen_loss_ma(window) > 5.0
    }

    /// Check if the adversarial game is balanced
    ///
    /// A healthy discriminator sits well away from both chance and
    /// perfection on both sides.
    pub fn is_balanced(&self, window: usize) -> bool {
        if self.num_epochs() < window {
            return true;
        }

        let avg_real = moving_average(&self.disc_real_acc, window);
        let avg_fake = moving_average(&self.disc_fake_acc, window);
        (0.3..0.9).contains(&avg_real) && (0.3..0.9).contains(&avg_fake)
    }

    /// Save metrics to CSV file
    pub fn save_csv(&self, path: &str) -> Result<()> {
        let mut writer =
            csv::Writer::from_path(path).map_err(|e| AaeError::Checkpoint(e.to_string()))?;

        writer
            .write_record([
                "epoch",
                "recon_loss",
                "adv_gen_loss",
                "consistency_loss",
                "disc_loss",
                "real_acc",
                "fake_acc",
            ])
            .map_err(|e| AaeError::Checkpoint(e.to_string()))?;

        for i in 0..self.num_epochs() {
            writer
                .write_record([
                    (i + 1).to_string(),
                    self.recon_losses[i].to_string(),
                    self.adv_gen_losses[i].to_string(),
                    self.consistency_losses[i].to_string(),
                    self.disc_losses[i].to_string(),
                    self.disc_real_acc[i].to_string(),
                    self.disc_fake_acc[i].to_string(),
                ])
                .map_err(|e| AaeError::Checkpoint(e.to_string()))?;
        }

        writer
            .flush()
            .map_err(|e| AaeError::Checkpoint(e.to_string()))?;
        Ok(())
    }

    /// Load metrics from CSV file
    pub fn load_csv(path: &str) -> Result<Self> {
        let mut reader =
            csv::Reader::from_path(path).map_err(|e| AaeError::Checkpoint(e.to_string()))?;
        let mut metrics = Self::new();

        for result in reader.records() {
            let record = result.map_err(|e| AaeError::Checkpoint(e.to_string()))?;
            let parse = |i: usize| -> Result<f64> {
                record[i]
                    .parse()
                    .map_err(|e| AaeError::Checkpoint(format!("bad metrics field: {e}")))
            };
            metrics.recon_losses.push(parse(1)?);
            metrics.adv_gen_losses.push(parse(2)?);
            metrics.consistency_losses.push(parse(3)?);
            metrics.disc_losses.push(parse(4)?);
            metrics.disc_real_acc.push(parse(5)?);
            metrics.disc_fake_acc.push(parse(6)?);
        }

        Ok(metrics)
    }
}

/// Moving average of the last `window` values
fn moving_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = window.min(values.len());
    let sum: f64 = values.iter().rev().take(n).sum();
    sum / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_latest() {
        let mut metrics = TrainingMetrics::new();
        metrics.record_epoch(0.8, 0.7, 0.5, 1.2, 0.6, 0.65);
        metrics.record_epoch(0.6, 0.72, 0.45, 1.1, 0.62, 0.64);

        assert_eq!(metrics.num_epochs(), 2);
        assert_eq!(metrics.latest_recon_loss(), Some(0.6));
        assert_eq!(metrics.latest_disc_loss(), Some(1.1));
    }

    #[test]
    fn test_mode_collapse_detection() {
        let mut metrics = TrainingMetrics::new();
        for _ in 0..10 {
            metrics.record_epoch(0.5, 8.0, 0.0, 0.01, 0.99, 0.99);
        }
        assert!(metrics.check_mode_collapse(5));
        assert!(!metrics.is_balanced(5));
    }

    #[test]
    fn test_csv_roundtrip() {
        let mut metrics = TrainingMetrics::new();
        metrics.record_epoch(0.8, 0.7, 0.5, 1.2, 0.6, 0.65);
        metrics.record_epoch(0.6, 0.72, 0.45, 1.1, 0.62, 0.64);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        metrics.save_csv(path.to_str().unwrap()).unwrap();

        let loaded = TrainingMetrics::load_csv(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.num_epochs(), 2);
        assert_eq!(loaded.recon_losses, metrics.recon_losses);
        assert_eq!(loaded.disc_fake_acc, metrics.disc_fake_acc);
    }
}
