use tch::nn::{self, ModuleT, VarStore};
use tch::{Device, Tensor};

use crate::data::sample_noise;
use crate::network::Network;

/**
 * Transposed-convolution generator mapping noise `(N, noise_dim, 1, 1)` to images
 * `(N, C, 64, 64)` in `[-1, 1]`.
 */
#[derive(Debug)]
pub struct Generator {
  vs: VarStore,
  net: nn::SequentialT,
  noise_dim: i64,
  output_channels: i64,
}

impl Generator {
  pub fn new(device: Device, noise_dim: i64, output_channels: i64) -> Self {
    GeneratorBuilder::new(device)
      .noise_dim(noise_dim)
      .output_channels(output_channels)
      .build()
  }

  pub fn noise_dim(&self) -> i64 {
    self.noise_dim
  }

  pub fn output_channels(&self) -> i64 {
    self.output_channels
  }

  pub fn device(&self) -> Device {
    self.vs.device()
  }

  /**
   * Runs the generator on a flat `(N, noise_dim)` or spatial `(N, noise_dim, 1, 1)` noise batch.
   */
  pub fn generate(&self, noise: &Tensor, train: bool) -> Tensor {
    let noise = noise.view([-1, self.noise_dim, 1, 1]);
    self.forward_t(&noise, train)
  }

  /**
   * Draws `n` images from fresh noise in inference mode, without recording gradients.
   */
  pub fn sample(&self, n: i64) -> Tensor {
    let _guard = tch::no_grad_guard();
    let noise = sample_noise(n, self.noise_dim, self.device());
    self.generate(&noise, false)
  }
}

impl ModuleT for Generator {
  fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
    self.net.forward_t(xs, train)
  }
}

impl Network for Generator {
  fn var_store(&self) -> &VarStore {
    &self.vs
  }
}

pub struct GeneratorBuilder {
  device: Device,
  noise_dim: i64,
  output_channels: i64,
  base_channels: i64,
}

impl GeneratorBuilder {
  pub fn new(device: Device) -> GeneratorBuilder {
    GeneratorBuilder {
      device,
      noise_dim: 100,
      output_channels: 3,
      base_channels: 128,
    }
  }

  pub fn noise_dim(mut self, dim: i64) -> GeneratorBuilder {
    self.noise_dim = dim;
    self
  }

  pub fn output_channels(mut self, channels: i64) -> GeneratorBuilder {
    self.output_channels = channels;
    self
  }

  /// Width of the last hidden stage; earlier stages use 8x, 4x and 2x this.
  pub fn base_channels(mut self, channels: i64) -> GeneratorBuilder {
    self.base_channels = channels;
    self
  }

  pub fn build(self) -> Generator {
    let GeneratorBuilder {
      device,
      noise_dim,
      output_channels,
      base_channels,
    } = self;

    let vs = VarStore::new(device);
    let root = vs.root();

    // 1x1 -> 4x4
    let project = nn::ConvTransposeConfig {
      stride: 1,
      padding: 0,
      ..Default::default()
    };
    let up = nn::ConvTransposeConfig {
      stride: 2,
      padding: 1,
      ..Default::default()
    };

    let mut net = nn::seq_t();
    let mut in_channels = noise_dim;
    for stage in 0..4 {
      let out_channels = base_channels << (3 - stage);
      let config = if stage == 0 { project } else { up };
      let path = &root / format!("up_{}", stage);
      net = net
        .add(nn::conv_transpose2d(&path / "deconv", in_channels, out_channels, 4, config))
        .add(nn::batch_norm2d(&path / "norm", out_channels, Default::default()))
        .add_fn(|xs| xs.relu());
      in_channels = out_channels;
    }

    net = net
      .add(nn::conv_transpose2d(&root / "image", in_channels, output_channels, 4, up))
      .add_fn(|xs| xs.tanh());

    Generator {
      vs,
      net,
      noise_dim,
      output_channels,
    }
  }
}
