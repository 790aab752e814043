//! Loss functions for AAE training
//!
//! Reconstruction distortion, the two sides of the adversarial game over the
//! latent space, and the contrastive instance-consistency term for the
//! time-series modality.

use tch::{Kind, Tensor};

/// Elementwise distortion measure for the reconstruction term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconstructionLoss {
    /// Binary cross entropy, for data in [0, 1] (images)
    Bce,
    /// Mean squared error, for data in [-1, 1] (sequences)
    Mse,
}

/// Reconstruction loss between a decoded batch and the original samples
pub fn reconstruction_loss(recon: &Tensor, target: &Tensor, kind: ReconstructionLoss) -> Tensor {
    match kind {
        ReconstructionLoss::Bce => {
            recon.binary_cross_entropy::<Tensor>(target, None, tch::Reduction::Mean)
        }
        ReconstructionLoss::Mse => recon.mse_loss(target, tch::Reduction::Mean),
    }
}

/// Adversarial generator loss over encoder-produced codes
///
/// Non-saturating objective: the encoder wants the discriminator to label
/// its codes "real", so fake logits are scored against ones. Components
/// (instance, local) are averaged so the weight λ₁ applies uniformly.
pub fn adversarial_generator_loss(fake_logits: &[Tensor]) -> Tensor {
    let total = fake_logits
        .iter()
        .map(|logits| {
            let targets = Tensor::ones_like(logits);
            logits.binary_cross_entropy_with_logits::<Tensor>(
                &targets,
                None,
                None,
                tch::Reduction::Mean,
            )
        })
        .reduce(|a, b| a + b)
        .expect("at least one discriminator component");
    total / fake_logits.len() as f64
}

/// Adversarial discriminator loss
///
/// Prior draws are labelled real, detached encoder codes fake. Optional
/// one-sided label smoothing keeps the discriminator from saturating.
pub fn adversarial_discriminator_loss(
    real_logits: &[Tensor],
    fake_logits: &[Tensor],
    smooth_real: Option<f64>,
) -> Tensor {
    debug_assert_eq!(real_logits.len(), fake_logits.len());
    let total = real_logits
        .iter()
        .zip(fake_logits.iter())
        .map(|(real, fake)| {
            let real_targets = match smooth_real {
                Some(smooth) => Tensor::full_like(real, smooth),
                None => Tensor::ones_like(real),
            };
            let real_loss = real.binary_cross_entropy_with_logits::<Tensor>(
                &real_targets,
                None,
                None,
                tch::Reduction::Mean,
            );
            let fake_targets = Tensor::zeros_like(fake);
            let fake_loss = fake.binary_cross_entropy_with_logits::<Tensor>(
                &fake_targets,
                None,
                None,
                tch::Reduction::Mean,
            );
            real_loss + fake_loss
        })
        .reduce(|a, b| a + b)
        .expect("at least one discriminator component");
    total / real_logits.len() as f64
}

/// Contrastive consistency loss over instance codes of paired sub-windows
///
/// NT-Xent over L2-normalized codes: windows from the same sequence are the
/// positive pair, every other sequence in the batch is a negative.
/// Symmetrized over both view directions.
pub fn instance_contrastive_loss(codes_a: &Tensor, codes_b: &Tensor, temperature: f64) -> Tensor {
    let a_norm = codes_a / codes_a.norm_scalaropt_dim(2.0, [1], true).clamp_min(1e-8);
    let b_norm = codes_b / codes_b.norm_scalaropt_dim(2.0, [1], true).clamp_min(1e-8);

    let logits = a_norm.matmul(&b_norm.transpose(0, 1)) / temperature;
    let batch_size = codes_a.size()[0];
    let targets = Tensor::arange(batch_size, (Kind::Int64, codes_a.device()));

    let loss_ab = logits.cross_entropy_for_logits(&targets);
    let loss_ba = logits.transpose(0, 1).cross_entropy_for_logits(&targets);
    (loss_ab + loss_ba) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    #[test]
    fn test_reconstruction_mse_zero_for_identical() {
        let xs = Tensor::randn([4, 10, 3], (Kind::Float, Device::Cpu));
        let loss = reconstruction_loss(&xs, &xs, ReconstructionLoss::Mse);
        assert!(loss.double_value(&[]).abs() < 1e-8);
    }

    #[test]
    fn test_reconstruction_bce_positive() {
        let recon = Tensor::full(&[4, 1, 8, 8], 0.5, (Kind::Float, Device::Cpu));
        let target = Tensor::zeros([4, 1, 8, 8], (Kind::Float, Device::Cpu));
        let loss = reconstruction_loss(&recon, &target, ReconstructionLoss::Bce);
        assert!(loss.double_value(&[]) > 0.0);
    }

    #[test]
    fn test_generator_loss_positive() {
        let fake = Tensor::randn([8, 1], (Kind::Float, Device::Cpu));
        let loss = adversarial_generator_loss(&[fake]);
        assert_eq!(loss.size(), Vec::<i64>::new());
        assert!(loss.double_value(&[]) > 0.0);
    }

    #[test]
    fn test_discriminator_loss_small_when_confident() {
        // High confidence on real priors, low on fake codes
        let real = Tensor::full(&[8, 1], 10.0, (Kind::Float, Device::Cpu));
        let fake = Tensor::full(&[8, 1], -10.0, (Kind::Float, Device::Cpu));
        let loss = adversarial_discriminator_loss(&[real], &[fake], None);
        assert!(loss.double_value(&[]) < 0.1);
    }

    #[test]
    fn test_discriminator_loss_multi_component() {
        let real = vec![
            Tensor::randn([8, 1], (Kind::Float, Device::Cpu)),
            Tensor::randn([40, 1], (Kind::Float, Device::Cpu)),
        ];
        let fake = vec![
            Tensor::randn([8, 1], (Kind::Float, Device::Cpu)),
            Tensor::randn([40, 1], (Kind::Float, Device::Cpu)),
        ];
        let loss = adversarial_discriminator_loss(&real, &fake, Some(0.9));
        assert!(loss.double_value(&[]).is_finite());
    }

    #[test]
    fn test_contrastive_prefers_matched_windows() {
        tch::manual_seed(7);
        let codes = Tensor::randn([16, 4], (Kind::Float, Device::Cpu));
        // Aligned views: each sequence matched with itself
        let aligned = instance_contrastive_loss(&codes, &codes, 0.5);
        // Shuffled views: positives no longer on the diagonal
        let shuffled = codes.flip([0]);
        let misaligned = instance_contrastive_loss(&codes, &shuffled, 0.5);
        assert!(aligned.double_value(&[]) < misaligned.double_value(&[]));
    }
}
