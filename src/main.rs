//! Adversarial autoencoder training and generation
//!
//! CLI entry point providing:
//! - Training on synthetic data for either modality
//! - Sampling novel data from a trained model
//! - Reconstruction round-trips with distortion reporting

use anyhow::Result;
use clap::{Parser, Subcommand};
use tch::Tensor;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rust_aae::{
    data::{normalize_sequences, synthetic_images, synthetic_sequences, ImageLoader, SequenceLoader},
    model::{Aae, Modality},
    training::Trainer,
    utils::{find_latest_checkpoint, load_checkpoint, Config},
    BatchSource,
};

/// Adversarial autoencoders for images and multivariate time series
#[derive(Parser)]
#[command(name = "aae")]
#[command(version = "0.1.0")]
#[command(about = "Train adversarial autoencoders and sample from them")]
struct Cli {
    /// Path to configuration file (.toml or .json)
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model on synthetic data
    Train {
        /// Resume from the latest checkpoint in the checkpoint directory
        #[arg(short, long)]
        resume: bool,
    },

    /// Sample novel data from prior draws through the decoder
    Generate {
        /// Checkpoint directory to load (defaults to latest)
        #[arg(long)]
        checkpoint: Option<String>,

        /// Number of samples to generate
        #[arg(short, long, default_value = "16")]
        num: i64,

        /// Output JSON file
        #[arg(short, long, default_value = "samples.json")]
        output: String,
    },

    /// Round-trip a synthetic batch and report distortion
    Reconstruct {
        /// Checkpoint directory to load (defaults to latest)
        #[arg(long)]
        checkpoint: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::ensure_exists(&cli.config)?;
    config.validate()?;
    let device = config.get_device();

    match cli.command {
        Commands::Train { resume } => {
            let mut model = Aae::new(config.model.clone(), device)?;
            let mut trainer = Trainer::new(config.to_training_config(), device);

            if resume {
                match find_latest_checkpoint(&config.training.checkpoint_dir) {
                    Some(dir) => {
                        let (state, metrics) = load_checkpoint(&mut model, &dir)?;
                        info!("resuming from epoch {}", state.epoch);
                        trainer.resume(&state, metrics);
                    }
                    None => info!("no checkpoint found, starting fresh"),
                }
            }

            let mut source = build_source(&config)?;
            let metrics = trainer.train(&model, source.as_mut())?;
            info!(
                "training complete: final recon loss {:.4}",
                metrics.latest_recon_loss().unwrap_or(f64::NAN)
            );
        }

        Commands::Generate {
            checkpoint,
            num,
            output,
        } => {
            let mut model = Aae::new(config.model.clone(), device)?;
            load_into(&mut model, checkpoint, &config)?;

            let samples = model.sample(num);
            write_tensor_json(&samples, &output)?;
            info!("wrote {num} samples of shape {:?} to {output}", samples.size());
        }

        Commands::Reconstruct { checkpoint } => {
            let mut model = Aae::new(config.model.clone(), device)?;
            load_into(&mut model, checkpoint, &config)?;

            let batch = sample_batch(&config)?;
            let recon = model.reconstruct(&batch);
            let mse = recon.mse_loss(&batch, tch::Reduction::Mean).double_value(&[]);
            info!("reconstruction MSE over {} samples: {mse:.6}", batch.size()[0]);
        }
    }

    Ok(())
}

/// Build the synthetic batch source for the configured modality
fn build_source(config: &Config) -> Result<Box<dyn BatchSource>> {
    let source: Box<dyn BatchSource> = match config.model.modality {
        Modality::Image => {
            let images = synthetic_images(config.data.num_samples, config.model.image_size as usize);
            Box::new(ImageLoader::new(
                images,
                config.model.image_size as usize,
                config.data.batch_size,
                config.data.shuffle,
                config.data.drop_last,
            )?)
        }
        Modality::TimeSeries => {
            let raw = synthetic_sequences(
                config.data.num_samples,
                config.model.sequence_length as usize,
                config.model.num_channels as usize,
            );
            let (normalized, _) = normalize_sequences(&raw);
            Box::new(SequenceLoader::new(
                normalized,
                config.model.sequence_length as usize,
                config.model.num_channels as usize,
                config.data.window_length,
                config.data.batch_size,
                config.data.shuffle,
                config.data.drop_last,
            )?)
        }
    };
    Ok(source)
}

/// One synthetic batch-sized tensor for reconstruction reporting
fn sample_batch(config: &Config) -> Result<Tensor> {
    let mut source = build_source(config)?;
    let batch = source
        .next_batch()?
        .ok_or_else(|| anyhow::anyhow!("batch source yielded no batches"))?;
    Ok(batch.input().shallow_clone())
}

/// Load the given (or latest) checkpoint into the model
fn load_into(model: &mut Aae, checkpoint: Option<String>, config: &Config) -> Result<()> {
    let dir = checkpoint.or_else(|| find_latest_checkpoint(&config.training.checkpoint_dir));
    match dir {
        Some(dir) => {
            load_checkpoint(model, &dir)?;
        }
        None => info!("no checkpoint found, using untrained weights"),
    }
    Ok(())
}

/// Dump a tensor as JSON with explicit shape
fn write_tensor_json(tensor: &Tensor, path: &str) -> Result<()> {
    let flat = tensor.reshape(-1);
    let values: Vec<f64> = Vec::try_from(&flat)?;
    let payload = serde_json::json!({
        "shape": tensor.size(),
        "values": values,
    });
    std::fs::write(path, serde_json::to_string(&payload)?)?;
    Ok(())
}
