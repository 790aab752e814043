//! Latent discriminator
//!
//! Classifies latent vectors as prior draws ("real") or encoder outputs
//! ("fake"). Works on whatever vector dimensionality it is built for, so the
//! same network type serves the flat image code, the instance component and
//! the per-timestep local codes.

use tch::{nn, nn::Module, nn::ModuleT, Tensor};

/// MLP discriminator over a single latent vector
#[derive(Debug)]
pub struct LatentDiscriminator {
    fc1: nn::Linear,
    fc2: nn::Linear,
    fc3: nn::Linear,
    dropout: f64,
}

impl LatentDiscriminator {
    /// Create a new discriminator for `input_dim`-dimensional codes
    pub fn new(vs: &nn::Path, input_dim: i64, hidden_dim: i64, dropout: f64) -> Self {
        let fc1 = nn::linear(vs / "fc1", input_dim, hidden_dim, Default::default());
        let fc2 = nn::linear(vs / "fc2", hidden_dim, hidden_dim, Default::default());
        let fc3 = nn::linear(vs / "fc3", hidden_dim, 1, Default::default());
        Self {
            fc1,
            fc2,
            fc3,
            dropout,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    ///
    /// * `codes` - Tensor of shape (batch, input_dim)
    /// * `train` - Whether in training mode (affects dropout)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch, 1) with logits (not sigmoid)
    pub fn forward_t(&self, codes: &Tensor, train: bool) -> Tensor {
        let x = self.fc1.forward(codes).leaky_relu();
        let x = x.dropout(self.dropout, train);
        let x = self.fc2.forward(&x).leaky_relu();
        let x = x.dropout(self.dropout, train);
        self.fc3.forward(&x)
    }

    /// Probability of a code being a prior draw (after sigmoid)
    pub fn classify(&self, codes: &Tensor) -> Tensor {
        self.forward_t(codes, false).sigmoid()
    }
}

impl ModuleT for LatentDiscriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        LatentDiscriminator::forward_t(self, xs, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn test_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let disc = LatentDiscriminator::new(&vs.root(), 8, 64, 0.2);

        let codes = Tensor::randn([4, 8], (Kind::Float, Device::Cpu));
        let logits = disc.forward_t(&codes, false);

        assert_eq!(logits.size(), vec![4, 1]);
    }

    #[test]
    fn test_classify_probabilities() {
        let vs = VarStore::new(Device::Cpu);
        let disc = LatentDiscriminator::new(&vs.root(), 4, 32, 0.0);

        let codes = Tensor::randn([16, 4], (Kind::Float, Device::Cpu));
        let probs = disc.classify(&codes);

        let min_val: f64 = probs.min().double_value(&[]);
        let max_val: f64 = probs.max().double_value(&[]);
        assert!(min_val >= 0.0 && max_val <= 1.0);
    }
}
