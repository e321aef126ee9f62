//! Adversarial training of a convolutional generator against a discriminator.
//!
//! Three objectives are supported through [`GanType`]: the standard (cross-entropy) GAN,
//! the least-squares GAN and the weight-clipped Wasserstein GAN.

pub mod data;
pub mod discriminator;
pub mod error;
pub mod generator;
pub mod losses;
pub mod network;
pub mod solver;
pub mod train;
pub mod visualize;

pub use data::{deprocess_img, preprocess_img, sample_noise, BatchSource, ImageDataset};
pub use discriminator::{Discriminator, DiscriminatorBuilder};
pub use error::{GanError, Result};
pub use generator::{Generator, GeneratorBuilder};
pub use losses::GanType;
pub use network::Network;
pub use solver::{Solver, SolverKind};
pub use train::{GanTrainer, StepLosses, TrainConfig, TrainSummary};
pub use visualize::{CallbackVisualizer, ImageGridWriter, NullVisualizer, Visualizer};
