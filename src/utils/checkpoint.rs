//! Checkpoint save/restore
//!
//! A snapshot is the three parameter sets (encoder, decoder, discriminator)
//! plus the training state and metrics. Save followed by restore resumes the
//! run with bit-identical parameters.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AaeError, Result};
use crate::model::{Aae, ModelConfig};
use crate::training::TrainingMetrics;

/// Mutable training state carried across a save/restore cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingState {
    /// Completed epochs
    pub epoch: usize,
    /// Global step counter
    pub step: usize,
}

/// Checkpoint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Training state at the checkpoint
    pub state: TrainingState,
    /// Reconstruction loss at the checkpoint
    pub recon_loss: f64,
    /// Discriminator loss at the checkpoint
    pub disc_loss: f64,
    /// Timestamp of checkpoint
    pub timestamp: String,
    /// Model configuration, for compatibility checks on restore
    pub model: ModelConfig,
}

/// Save a complete checkpoint (parameters + state + metrics)
///
/// # Returns
///
/// Path to the checkpoint directory
pub fn save_checkpoint(
    model: &Aae,
    metrics: &TrainingMetrics,
    state: &TrainingState,
    dir: &str,
) -> Result<String> {
    let checkpoint_dir = format!("{}/checkpoint_epoch_{:04}", dir, state.epoch);
    std::fs::create_dir_all(&checkpoint_dir)?;

    model.save(
        &format!("{checkpoint_dir}/encoder.pt"),
        &format!("{checkpoint_dir}/decoder.pt"),
        &format!("{checkpoint_dir}/discriminator.pt"),
    )?;

    let meta = CheckpointMeta {
        state: state.clone(),
        recon_loss: metrics.latest_recon_loss().unwrap_or(0.0),
        disc_loss: metrics.latest_disc_loss().unwrap_or(0.0),
        timestamp: chrono::Utc::now().to_rfc3339(),
        model: model.config().clone(),
    };
    let meta_json = serde_json::to_string_pretty(&meta)
        .map_err(|e| AaeError::Checkpoint(e.to_string()))?;
    std::fs::write(format!("{checkpoint_dir}/meta.json"), meta_json)?;

    metrics.save_csv(&format!("{checkpoint_dir}/metrics.csv"))?;

    tracing::info!("saved checkpoint to {checkpoint_dir}");
    Ok(checkpoint_dir)
}

/// Load checkpoint metadata
pub fn load_checkpoint_meta(checkpoint_dir: &str) -> Result<CheckpointMeta> {
    let content = std::fs::read_to_string(format!("{checkpoint_dir}/meta.json"))?;
    serde_json::from_str(&content).map_err(|e| AaeError::Checkpoint(e.to_string()))
}

/// Load a complete checkpoint into an existing model
///
/// # Returns
///
/// The restored training state and metrics
pub fn load_checkpoint(
    model: &mut Aae,
    checkpoint_dir: &str,
) -> Result<(TrainingState, TrainingMetrics)> {
    model.load(
        &format!("{checkpoint_dir}/encoder.pt"),
        &format!("{checkpoint_dir}/decoder.pt"),
        &format!("{checkpoint_dir}/discriminator.pt"),
    )?;

    let meta = load_checkpoint_meta(checkpoint_dir)?;

    let metrics_path = format!("{checkpoint_dir}/metrics.csv");
    let metrics = if Path::new(&metrics_path).exists() {
        TrainingMetrics::load_csv(&metrics_path)?
    } else {
        TrainingMetrics::new()
    };

    tracing::info!(
        "loaded checkpoint from {checkpoint_dir} (epoch {})",
        meta.state.epoch
    );
    Ok((meta.state, metrics))
}

/// Find the latest checkpoint in a directory
pub fn find_latest_checkpoint(dir: &str) -> Option<String> {
    let path = Path::new(dir);
    if !path.exists() {
        return None;
    }

    let mut checkpoints: Vec<_> = std::fs::read_dir(path)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().ok().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with("checkpoint_epoch_"))
                .unwrap_or(false)
        })
        .collect();

    checkpoints.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    checkpoints
        .first()
        .map(|e| e.path().to_string_lossy().to_string())
}
