//! Decoder networks
//!
//! Both decoders satisfy the same contract: Latent Code -> reconstruction
//! with the exact shape of the input sample. The image decoder mirrors the
//! encoder with transposed convolutions and ends in sigmoid (data in [0, 1]);
//! the sequence decoder broadcasts the instance component over time, merges
//! it with the local codes and ends in tanh (data in [-1, 1]).

use tch::{nn, nn::Module, nn::RNN, Tensor};

use super::latent::DisentangledCode;

/// Transposed-convolution decoder for single-channel images
#[derive(Debug)]
pub struct ImageDecoder {
    fc: nn::Linear,
    deconv1: nn::ConvTranspose2D,
    deconv2: nn::ConvTranspose2D,
    base_filters: i64,
    reduced_size: i64,
}

impl ImageDecoder {
    /// Create a new image decoder mirroring `ImageEncoder`
    pub fn new(vs: &nn::Path, image_size: i64, latent_dim: i64, base_filters: i64) -> Self {
        let reduced_size = image_size / 4;
        let flat_size = base_filters * 2 * reduced_size * reduced_size;
        let fc = nn::linear(vs / "fc", latent_dim, flat_size, Default::default());

        // kernel 4, stride 2, padding 1 exactly doubles the spatial size
        let deconv_config = nn::ConvTransposeConfig {
            stride: 2,
            padding: 1,
            ..Default::default()
        };
        let deconv1 = nn::conv_transpose2d(
            vs / "deconv1",
            base_filters * 2,
            base_filters,
            4,
            deconv_config,
        );
        let deconv2 = nn::conv_transpose2d(vs / "deconv2", base_filters, 1, 4, deconv_config);

        Self {
            fc,
            deconv1,
            deconv2,
            base_filters,
            reduced_size,
        }
    }

    /// Decode latent codes into images
    ///
    /// # Arguments
    ///
    /// * `codes` - Tensor of shape (batch, latent_dim)
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch, 1, image_size, image_size), values in [0, 1]
    pub fn forward(&self, codes: &Tensor) -> Tensor {
        let batch_size = codes.size()[0];
        let x = self.fc.forward(codes).leaky_relu();
        let x = x.view([
            batch_size,
            self.base_filters * 2,
            self.reduced_size,
            self.reduced_size,
        ]);
        let x = self.deconv1.forward(&x).leaky_relu();
        self.deconv2.forward(&x).sigmoid()
    }
}

/// Recurrent decoder for multivariate sequences
///
/// The instance component is repeated along the time axis and concatenated
/// with the local codes, so every timestep sees both the sequence identity
/// and its own dynamics.
#[derive(Debug)]
pub struct SequenceDecoder {
    input_proj: nn::Linear,
    gru: nn::GRU,
    output_proj: nn::Linear,
}

impl SequenceDecoder {
    /// Create a new sequence decoder
    pub fn new(
        vs: &nn::Path,
        num_channels: i64,
        hidden_dim: i64,
        instance_dim: i64,
        local_dim: i64,
    ) -> Self {
        let rnn_config = nn::RNNConfig {
            batch_first: true,
            ..Default::default()
        };
        let input_proj = nn::linear(
            vs / "input_proj",
            instance_dim + local_dim,
            hidden_dim,
            Default::default(),
        );
        let gru = nn::gru(&(vs / "gru"), hidden_dim, hidden_dim, rnn_config);
        let output_proj = nn::linear(vs / "output_proj", hidden_dim, num_channels, Default::default());

        Self {
            input_proj,
            gru,
            output_proj,
        }
    }

    /// Decode an (instance, local) pair into sequences
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch, seq_len, channels), values in [-1, 1]
    pub fn forward(&self, code: &DisentangledCode) -> Tensor {
        let seq_len = code.local.size()[1];
        let instance = code.instance.unsqueeze(1).repeat([1, seq_len, 1]);
        let joined = Tensor::cat(&[&instance, &code.local], 2);
        let x = self.input_proj.forward(&joined).leaky_relu();
        let (hidden, _) = self.gru.seq(&x);
        self.output_proj.forward(&hidden).tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    #[test]
    fn test_image_decoder_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let dec = ImageDecoder::new(&vs.root(), 28, 8, 32);

        let codes = Tensor::randn([4, 8], (Kind::Float, Device::Cpu));
        let images = dec.forward(&codes);

        assert_eq!(images.size(), vec![4, 1, 28, 28]);
    }

    #[test]
    fn test_image_decoder_output_range() {
        let vs = VarStore::new(Device::Cpu);
        let dec = ImageDecoder::new(&vs.root(), 28, 8, 32);

        let codes = Tensor::randn([2, 8], (Kind::Float, Device::Cpu));
        let images = dec.forward(&codes);

        assert!(images.min().double_value(&[]) >= 0.0);
        assert!(images.max().double_value(&[]) <= 1.0);
    }

    #[test]
    fn test_sequence_decoder_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let dec = SequenceDecoder::new(&vs.root(), 3, 32, 4, 4);

        let code = DisentangledCode {
            instance: Tensor::randn([16, 4], (Kind::Float, Device::Cpu)),
            local: Tensor::randn([16, 50, 4], (Kind::Float, Device::Cpu)),
        };
        let sequences = dec.forward(&code);

        assert_eq!(sequences.size(), vec![16, 50, 3]);
    }
}
