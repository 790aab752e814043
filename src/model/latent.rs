//! Latent code representations
//!
//! The disentangled variant is a tagged record, not a flat vector with an
//! implicit split: downstream consumers address the instance and local
//! components by name.

use tch::Tensor;

/// Disentangled latent code for the time-series modality
#[derive(Debug)]
pub struct DisentangledCode {
    /// Instance-level component of shape (batch, instance_dim); invariant to
    /// which sub-window of the sequence is encoded
    pub instance: Tensor,
    /// Local component of shape (batch, seq_len, local_dim); varies per
    /// timestep
    pub local: Tensor,
}

/// Latent code produced by an encoder, one variant per modality
#[derive(Debug)]
pub enum LatentCode {
    /// Flat code of shape (batch, latent_dim)
    Flat(Tensor),
    /// Structured (instance, local) pair
    Disentangled(DisentangledCode),
}

impl LatentCode {
    /// Number of samples in the code
    pub fn batch_size(&self) -> i64 {
        match self {
            LatentCode::Flat(z) => z.size()[0],
            LatentCode::Disentangled(code) => code.instance.size()[0],
        }
    }

    /// Detach all components from the autograd graph
    pub fn detach(&self) -> Self {
        match self {
            LatentCode::Flat(z) => LatentCode::Flat(z.detach()),
            LatentCode::Disentangled(code) => LatentCode::Disentangled(DisentangledCode {
                instance: code.instance.detach(),
                local: code.local.detach(),
            }),
        }
    }
}
