use derivative::Derivative;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tch::nn::{self, ModuleT};
use tch::Tensor;

use crate::data::{deprocess_img, preprocess_img, sample_noise, BatchSource};
use crate::discriminator::Discriminator;
use crate::error::{GanError, Result};
use crate::generator::Generator;
use crate::losses::GanType;
use crate::network::Network;
use crate::solver::Solver;
use crate::visualize::Visualizer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
  /// Log losses and render samples every this many iterations.
  pub show_every: i64,
  pub batch_size: i64,
  /// Latent dimension fed to the generator.
  pub noise_size: i64,
  pub num_epochs: i64,
  pub gan_type: GanType,
  /// Symmetric bound for Wasserstein weight clipping.
  pub clipping_param: f64,
  /// Number of generated images handed to the visualizer per checkpoint.
  pub sample_count: i64,
}

impl Default for TrainConfig {
  fn default() -> Self {
    TrainConfig {
      show_every: 250,
      batch_size: 128,
      noise_size: 100,
      num_epochs: 10,
      gan_type: GanType::Standard,
      clipping_param: 0.01,
      sample_count: 16,
    }
  }
}

impl TrainConfig {
  pub fn validate(&self) -> Result<()> {
    let positive = [
      ("show_every", self.show_every),
      ("batch_size", self.batch_size),
      ("noise_size", self.noise_size),
      ("num_epochs", self.num_epochs),
      ("sample_count", self.sample_count),
    ];
    for (name, value) in positive {
      if value <= 0 {
        return Err(GanError::InvalidConfig(format!(
          "{} must be positive, got {}",
          name, value
        )));
      }
    }
    if !(self.clipping_param > 0.0 && self.clipping_param.is_finite()) {
      return Err(GanError::InvalidConfig(format!(
        "clipping_param must be a positive number, got {}",
        self.clipping_param
      )));
    }
    Ok(())
  }
}

/// Loss values from one discriminator step and the generator step that followed it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepLosses {
  pub discriminator: f64,
  pub generator: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TrainSummary {
  pub epochs: i64,
  pub iterations: i64,
  pub last: Option<StepLosses>,
  /// Losses at each logging checkpoint, keyed by iteration.
  pub history: Vec<(i64, StepLosses)>,
}

/**
 * Alternating discriminator/generator optimization.
 *
 * Each network has its own optimizer built over its own variable store, so a step of one
 * can never move the other's weights. Every iteration runs, in order:
 *
 * 1. a discriminator step on a real batch and a batch of fakes generated without gradient
 *    tracking, followed (Wasserstein only) by clamping every discriminator parameter;
 * 2. a generator step on freshly drawn noise, with gradients flowing back through the
 *    discriminator into the generator;
 * 3. every `show_every` iterations, a log line and a sample grid.
 */
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GanTrainer {
  discriminator: Discriminator,
  generator: Generator,
  #[derivative(Debug = "ignore")]
  d_solver: nn::Optimizer,
  #[derivative(Debug = "ignore")]
  g_solver: nn::Optimizer,
  config: TrainConfig,
  iter_count: i64,
  epoch: i64,
}

impl GanTrainer {
  /**
   * # Arguments
   * - `d_solver`: optimizer built over `discriminator.var_store()`
   * - `g_solver`: optimizer built over `generator.var_store()`
   */
  pub fn new(
    discriminator: Discriminator,
    generator: Generator,
    d_solver: nn::Optimizer,
    g_solver: nn::Optimizer,
    config: TrainConfig,
  ) -> Result<Self> {
    config.validate()?;
    if generator.noise_dim() != config.noise_size {
      return Err(GanError::InvalidConfig(format!(
        "generator expects noise of size {}, config samples {}",
        generator.noise_dim(),
        config.noise_size
      )));
    }
    if generator.output_channels() != discriminator.input_channels() {
      return Err(GanError::InvalidConfig(format!(
        "generator emits {} channels but discriminator reads {}",
        generator.output_channels(),
        discriminator.input_channels()
      )));
    }
    debug!(
      "discriminator: {} parameters, generator: {} parameters",
      discriminator.parameter_count(),
      generator.parameter_count()
    );
    Ok(GanTrainer {
      discriminator,
      generator,
      d_solver,
      g_solver,
      config,
      iter_count: 0,
      epoch: 0,
    })
  }

  /// Builds one optimizer per network from the given solver settings.
  pub fn with_solvers(
    discriminator: Discriminator,
    generator: Generator,
    d_solver: &Solver,
    g_solver: &Solver,
    config: TrainConfig,
  ) -> Result<Self> {
    let d_opt = d_solver.build(discriminator.var_store())?;
    let g_opt = g_solver.build(generator.var_store())?;
    Self::new(discriminator, generator, d_opt, g_opt, config)
  }

  pub fn discriminator(&self) -> &Discriminator {
    &self.discriminator
  }

  pub fn generator(&self) -> &Generator {
    &self.generator
  }

  pub fn config(&self) -> &TrainConfig {
    &self.config
  }

  pub fn iteration(&self) -> i64 {
    self.iter_count
  }

  pub fn epoch(&self) -> i64 {
    self.epoch
  }

  fn finite(&self, network: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
      Ok(value)
    } else {
      Err(GanError::NonFiniteLoss {
        network,
        value,
        iteration: self.iter_count,
      })
    }
  }

  /**
   * One discriminator update on `real`, already normalized to `[-1, 1]`.
   *
   * The fakes are produced without gradient tracking, so the generator sees neither
   * gradients nor an update here.
   */
  pub fn discriminator_step(&mut self, real: &Tensor) -> Result<f64> {
    let device = self.discriminator.device();
    let real = real.to_device(device);
    let batch_size = real.size()[0];

    self.d_solver.zero_grad();
    let fake = {
      let _guard = tch::no_grad_guard();
      let noise = sample_noise(batch_size, self.config.noise_size, device);
      self.generator.generate(&noise, true)
    };
    if fake.size() != real.size() {
      return Err(GanError::ShapeMismatch {
        expected: real.size(),
        actual: fake.size(),
      });
    }

    let scores_real = self.discriminator.forward_t(&real, true);
    let scores_fake = self.discriminator.forward_t(&fake, true);
    let loss = self
      .config
      .gan_type
      .discriminator_loss(&scores_real, &scores_fake);
    let value = self.finite("discriminator", loss.double_value(&[]))?;

    loss.backward();
    self.d_solver.step();
    if self.config.gan_type.clips_weights() {
      self.discriminator.clamp_parameters(self.config.clipping_param);
    }
    Ok(value)
  }

  /**
   * One generator update from `batch_size` fresh noise vectors.
   *
   * # Returns
   * - the generator loss and the (detached) fakes it was computed on, in `[-1, 1]`.
   */
  pub fn generator_step(&mut self, batch_size: i64) -> Result<(f64, Tensor)> {
    let device = self.generator.device();

    self.g_solver.zero_grad();
    let noise = sample_noise(batch_size, self.config.noise_size, device);
    let fake = self.generator.generate(&noise, true);
    let scores_fake = self.discriminator.forward_t(&fake, true);
    let loss = self.config.gan_type.generator_loss(&scores_fake);
    let value = self.finite("generator", loss.double_value(&[]))?;

    loss.backward();
    self.g_solver.step();
    Ok((value, fake.detach()))
  }

  /**
   * Runs one full iteration on a batch of real images with values in `[0, 1]`.
   */
  pub fn train_batch(&mut self, images: &Tensor) -> Result<(StepLosses, Tensor)> {
    let real = preprocess_img(&images.to_device(self.discriminator.device()));
    let batch_size = real.size()[0];
    let discriminator = self.discriminator_step(&real)?;
    let (generator, fake) = self.generator_step(batch_size)?;
    Ok((
      StepLosses {
        discriminator,
        generator,
      },
      fake,
    ))
  }

  /**
   * Trains for `num_epochs` passes over `source`.
   *
   * Any error ends the run immediately; there is no retry.
   */
  pub fn run<S, V>(&mut self, source: &S, visualizer: &mut V) -> Result<TrainSummary>
  where
    S: BatchSource,
    V: Visualizer,
  {
    let mut summary = TrainSummary::default();
    for _ in 0..self.config.num_epochs {
      self.epoch += 1;
      info!("EPOCH: {}", self.epoch);

      for (images, _) in source.epoch_batches(self.config.batch_size) {
        let (losses, fake) = self.train_batch(&images)?;

        if self.iter_count % self.config.show_every == 0 {
          info!(
            "Iter: {}, D: {:.4}, G: {:.4}",
            self.iter_count, losses.discriminator, losses.generator
          );
          let n = self.config.sample_count.min(fake.size()[0]);
          visualizer.show(&deprocess_img(&fake.narrow(0, 0, n)), self.iter_count)?;
          summary.history.push((self.iter_count, losses));
        }

        summary.last = Some(losses);
        self.iter_count += 1;
      }
    }
    summary.epochs = self.epoch;
    summary.iterations = self.iter_count;
    Ok(summary)
  }
}
