//! Utility module
//!
//! This module provides:
//! - Configuration loading and validation
//! - Checkpoint save/restore

mod checkpoint;
mod config;

pub use checkpoint::{
    find_latest_checkpoint, load_checkpoint, save_checkpoint, CheckpointMeta, TrainingState,
};
pub use config::{Config, DataConfig, TrainSection};
