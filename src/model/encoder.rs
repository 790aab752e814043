//! Encoder networks
//!
//! Both encoders satisfy the same contract: Sample -> Latent Code,
//! differentiable end-to-end. The image encoder is a strided convolution
//! stack; the sequence encoder runs a GRU and splits its hidden states into
//! an instance component (pooled over time) and a per-timestep local
//! component.

use tch::{nn, nn::Module, nn::RNN, Kind, Tensor};

use super::latent::DisentangledCode;

/// Convolutional encoder for single-channel images
///
/// Architecture: two strided Conv2d layers with LeakyReLU, then a dense
/// projection to the latent code. Each conv halves the spatial size, so the
/// image side must be divisible by 4.
#[derive(Debug)]
pub struct ImageEncoder {
    conv1: nn::Conv2D,
    conv2: nn::Conv2D,
    fc: nn::Linear,
}

impl ImageEncoder {
    /// Create a new image encoder
    ///
    /// # Arguments
    ///
    /// * `image_size` - Height and width of input images (divisible by 4)
    /// * `latent_dim` - Dimensionality of the flat latent code
    /// * `base_filters` - Channel count after the first convolution
    pub fn new(vs: &nn::Path, image_size: i64, latent_dim: i64, base_filters: i64) -> Self {
        let conv_config = nn::ConvConfig {
            stride: 2,
            padding: 1,
            ..Default::default()
        };

        let conv1 = nn::conv2d(vs / "conv1", 1, base_filters, 4, conv_config);
        let conv2 = nn::conv2d(vs / "conv2", base_filters, base_filters * 2, 4, conv_config);

        let reduced = image_size / 4;
        let flat_size = base_filters * 2 * reduced * reduced;
        let fc = nn::linear(vs / "fc", flat_size, latent_dim, Default::default());

        Self { conv1, conv2, fc }
    }

    /// Encode a batch of images
    ///
    /// # Arguments
    ///
    /// * `xs` - Tensor of shape (batch, 1, image_size, image_size)
    ///
    /// # Returns
    ///
    /// Latent codes of shape (batch, latent_dim)
    pub fn forward(&self, xs: &Tensor) -> Tensor {
        let x = self.conv1.forward(xs).leaky_relu();
        let x = self.conv2.forward(&x).leaky_relu();
        let batch_size = x.size()[0];
        let x = x.view([batch_size, -1]);
        self.fc.forward(&x)
    }
}

/// Recurrent encoder for multivariate sequences
///
/// The GRU hidden states feed two heads: the instance head pools over time
/// before projecting, so its output is stable across sub-windows of the same
/// sequence; the local head projects each timestep independently.
#[derive(Debug)]
pub struct SequenceEncoder {
    gru: nn::GRU,
    instance_head: nn::Linear,
    local_head: nn::Linear,
}

impl SequenceEncoder {
    /// Create a new sequence encoder
    ///
    /// # Arguments
    ///
    /// * `num_channels` - Input channels per timestep
    /// * `hidden_dim` - GRU hidden size
    /// * `instance_dim` - Dimensionality of the instance component
    /// * `local_dim` - Dimensionality of the per-timestep local component
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
        let gru = nn::gru(&(vs / "gru"), num_channels, hidden_dim, rnn_config);
        let instance_head = nn::linear(vs / "instance_head", hidden_dim, instance_dim, Default::default());
        let local_head = nn::linear(vs / "local_head", hidden_dim, local_dim, Default::default());

        Self {
            gru,
            instance_head,
            local_head,
        }
    }

    /// Encode a batch of full sequences into an (instance, local) pair
    ///
    /// # Arguments
    ///
    /// * `xs` - Tensor of shape (batch, seq_len, channels)
    ///
    /// # Returns
    ///
    /// Code with instance (batch, instance_dim) and local
    /// (batch, seq_len, local_dim) components
    pub fn forward(&self, xs: &Tensor) -> DisentangledCode {
        let (hidden, _) = self.gru.seq(xs);
        let local = self.local_head.forward(&hidden);
        let pooled = hidden.mean_dim(1, false, Kind::Float);
        let instance = self.instance_head.forward(&pooled);
        DisentangledCode { instance, local }
    }

    /// Instance component of a contiguous sub-window
    ///
    /// Uses the same GRU and pooling as the full-sequence path, so training
    /// pulls window codes of one sequence towards each other.
    pub fn encode_window(&self, window: &Tensor) -> Tensor {
        let (hidden, _) = self.gru.seq(window);
        let pooled = hidden.mean_dim(1, false, Kind::Float);
        self.instance_head.forward(&pooled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device};

    #[test]
    fn test_image_encoder_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let enc = ImageEncoder::new(&vs.root(), 28, 8, 32);

        let xs = Tensor::randn([4, 1, 28, 28], (Kind::Float, Device::Cpu));
        let codes = enc.forward(&xs);

        assert_eq!(codes.size(), vec![4, 8]);
    }

    #[test]
    fn test_sequence_encoder_output_shapes() {
        let vs = VarStore::new(Device::Cpu);
        let enc = SequenceEncoder::new(&vs.root(), 3, 32, 4, 4);

        let xs = Tensor::randn([16, 50, 3], (Kind::Float, Device::Cpu));
        let code = enc.forward(&xs);

        assert_eq!(code.instance.size(), vec![16, 4]);
        assert_eq!(code.local.size(), vec![16, 50, 4]);
    }

    #[test]
    fn test_window_codes_shape() {
        let vs = VarStore::new(Device::Cpu);
        let enc = SequenceEncoder::new(&vs.root(), 2, 16, 6, 3);

        let window = Tensor::randn([8, 20, 2], (Kind::Float, Device::Cpu));
        let codes = enc.encode_window(&window);

        assert_eq!(codes.size(), vec![8, 6]);
    }
}
