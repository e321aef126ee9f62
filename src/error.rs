use std::path::PathBuf;

use tch::TchError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GanError>;

#[derive(Debug, Error)]
pub enum GanError {
  #[error(transparent)]
  Tch(#[from] TchError),

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
  ShapeMismatch { expected: Vec<i64>, actual: Vec<i64> },

  #[error("{network} loss is not finite ({value}) at iteration {iteration}")]
  NonFiniteLoss {
    network: &'static str,
    value: f64,
    iteration: i64,
  },

  #[error("failed to load dataset from {}: {reason}", path.display())]
  Dataset { path: PathBuf, reason: String },

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),
}
