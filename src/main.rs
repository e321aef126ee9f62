use std::fs;
use std::path::PathBuf;

use adversarial::{
  DiscriminatorBuilder, GanTrainer, GanType, GeneratorBuilder, ImageDataset, ImageGridWriter,
  Solver, SolverKind, TrainConfig,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use tch::Device;

/// Train a DCGAN-style generator and discriminator on a folder of images or on MNIST.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
  /// Directory of training images (any format libtorch can decode)
  #[arg(long, conflicts_with = "mnist_dir")]
  image_dir: Option<PathBuf>,

  /// Directory holding the MNIST idx files
  #[arg(long)]
  mnist_dir: Option<PathBuf>,

  /// JSON file with training settings; flags given on the command line override it
  #[arg(long)]
  config: Option<PathBuf>,

  #[arg(long, value_enum)]
  gan_type: Option<GanType>,

  #[arg(long)]
  epochs: Option<i64>,

  #[arg(long)]
  batch_size: Option<i64>,

  #[arg(long)]
  noise_size: Option<i64>,

  #[arg(long)]
  show_every: Option<i64>,

  /// Wasserstein weight clipping bound
  #[arg(long)]
  clipping_param: Option<f64>,

  /// Optimizer for both networks (default depends on the GAN type)
  #[arg(long, value_enum)]
  solver: Option<SolverKind>,

  #[arg(long)]
  learning_rate: Option<f64>,

  /// Side length images are resized to; only 64 matches the networks
  #[arg(long, default_value_t = IMAGE_SIZE)]
  image_size: i64,

  /// Where sample grids are written
  #[arg(long, default_value = "samples")]
  out_dir: PathBuf,

  #[arg(long)]
  seed: Option<i64>,

  /// Train on the CPU even if CUDA is available
  #[arg(long)]
  cpu: bool,
}

const IMAGE_SIZE: i64 = 64;

impl Args {
  fn validate(&self) -> Result<()> {
    if self.image_size != IMAGE_SIZE {
      bail!(
        "--image-size must be {}: the networks map {}x{} images to one score",
        IMAGE_SIZE,
        IMAGE_SIZE,
        IMAGE_SIZE
      );
    }
    Ok(())
  }

  fn train_config(&self) -> Result<TrainConfig> {
    let mut config = match &self.config {
      Some(path) => {
        let text = fs::read_to_string(path)
          .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
      }
      None => TrainConfig::default(),
    };
    if let Some(gan_type) = self.gan_type {
      config.gan_type = gan_type;
    }
    if let Some(epochs) = self.epochs {
      config.num_epochs = epochs;
    }
    if let Some(batch_size) = self.batch_size {
      config.batch_size = batch_size;
    }
    if let Some(noise_size) = self.noise_size {
      config.noise_size = noise_size;
    }
    if let Some(show_every) = self.show_every {
      config.show_every = show_every;
    }
    if let Some(clipping_param) = self.clipping_param {
      config.clipping_param = clipping_param;
    }
    Ok(config)
  }

  fn solver(&self, gan_type: GanType) -> Solver {
    let kind = self.solver.unwrap_or(Solver::for_gan_type(gan_type).kind);
    let learning_rate = self.learning_rate.unwrap_or(kind.default_learning_rate());
    Solver::new(kind, learning_rate)
  }
}

fn main() -> Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let args = Args::parse();
  args.validate()?;
  let device = if args.cpu {
    Device::Cpu
  } else {
    Device::cuda_if_available()
  };
  if let Some(seed) = args.seed {
    tch::manual_seed(seed);
  }

  let config = args.train_config()?;
  config.validate()?;
  let solver = args.solver(config.gan_type);
  info!("device: {:?}", device);
  info!("config: {}", serde_json::to_string(&config)?);
  info!("solver: {:?}", solver);

  // Loading the data
  let dataset = match (&args.image_dir, &args.mnist_dir) {
    (Some(dir), _) => ImageDataset::from_image_dir(dir, args.image_size)?,
    (None, Some(dir)) => ImageDataset::from_mnist_dir(dir, args.image_size)?,
    (None, None) => bail!("one of --image-dir or --mnist-dir is required"),
  };
  let [channels, _, _] = dataset.image_shape();

  // Creating the models
  let discriminator = DiscriminatorBuilder::new(device)
    .input_channels(channels)
    .build();
  let generator = GeneratorBuilder::new(device)
    .noise_dim(config.noise_size)
    .output_channels(channels)
    .build();

  let mut visualizer = ImageGridWriter::new(&args.out_dir)?;
  let mut trainer = GanTrainer::with_solvers(discriminator, generator, &solver, &solver, config)?;

  // Training the models
  let summary = trainer.run(&dataset, &mut visualizer)?;
  if let Some(last) = summary.last {
    info!(
      "finished {} epochs, {} iterations, D: {:.4}, G: {:.4}",
      summary.epochs, summary.iterations, last.discriminator, last.generator
    );
  }

  let samples = trainer.generator().sample(trainer.config().sample_count);
  let path = args.out_dir.join("final.png");
  visualizer.save(&adversarial::deprocess_img(&samples), &path)?;
  info!("wrote final samples to {}", path.display());
  Ok(())
}
