use tch::nn::{self, ModuleT, VarStore};
use tch::{Device, Tensor};

use crate::network::{leaky_relu, Network};

/**
 * Convolutional critic mapping an image batch `(N, C, 64, 64)` to raw scores `(N, 1, 1, 1)`.
 *
 * Four stride-2 convolutions halve the resolution while doubling the width
 * (base, 2·base, 4·base, 8·base), every one but the first followed by batch norm, all
 * followed by a leaky ReLU. A final 4x4 valid convolution collapses the remaining 4x4 map
 * to a single logit with no activation.
 */
#[derive(Debug)]
pub struct Discriminator {
  vs: VarStore,
  net: nn::SequentialT,
  input_channels: i64,
}

impl Discriminator {
  pub fn new(device: Device, input_channels: i64) -> Self {
    DiscriminatorBuilder::new(device)
      .input_channels(input_channels)
      .build()
  }

  pub fn input_channels(&self) -> i64 {
    self.input_channels
  }

  pub fn device(&self) -> Device {
    self.vs.device()
  }
}

impl ModuleT for Discriminator {
  fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
    self.net.forward_t(xs, train)
  }
}

impl Network for Discriminator {
  fn var_store(&self) -> &VarStore {
    &self.vs
  }
}

pub struct DiscriminatorBuilder {
  device: Device,
  input_channels: i64,
  base_channels: i64,
  negative_slope: f64,
}

impl DiscriminatorBuilder {
  pub fn new(device: Device) -> DiscriminatorBuilder {
    DiscriminatorBuilder {
      device,
      input_channels: 3,
      base_channels: 128,
      negative_slope: 0.2,
    }
  }

  pub fn input_channels(mut self, channels: i64) -> DiscriminatorBuilder {
    self.input_channels = channels;
    self
  }

  /// Width of the first convolution; the following stages use 2x, 4x and 8x this.
  pub fn base_channels(mut self, channels: i64) -> DiscriminatorBuilder {
    self.base_channels = channels;
    self
  }

  pub fn negative_slope(mut self, slope: f64) -> DiscriminatorBuilder {
    self.negative_slope = slope;
    self
  }

  pub fn build(self) -> Discriminator {
    let DiscriminatorBuilder {
      device,
      input_channels,
      base_channels,
      negative_slope,
    } = self;

    let vs = VarStore::new(device);
    let root = vs.root();
    let down = nn::ConvConfig {
      stride: 2,
      padding: 1,
      ..Default::default()
    };

    let mut net = nn::seq_t();
    let mut in_channels = input_channels;
    for stage in 0..4 {
      let out_channels = base_channels << stage;
      let path = &root / format!("down_{}", stage);
      net = net.add(nn::conv2d(&path / "conv", in_channels, out_channels, 4, down));
      if stage > 0 {
        net = net.add(nn::batch_norm2d(&path / "norm", out_channels, Default::default()));
      }
      net = net.add_fn(move |xs| leaky_relu(xs, negative_slope));
      in_channels = out_channels;
    }

    let score = nn::ConvConfig {
      stride: 1,
      padding: 0,
      ..Default::default()
    };
    net = net.add(nn::conv2d(&root / "score", in_channels, 1, 4, score));

    Discriminator {
      vs,
      net,
      input_channels,
    }
  }
}

#[cfg(test)]
mod tests {
  use tch::Kind;

  use super::*;

  #[test]
  fn scores_one_logit_per_image() {
    let d = Discriminator::new(Device::Cpu, 3);
    let xs = Tensor::rand([2, 3, 64, 64], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
    let scores = d.forward_t(&xs, true);
    assert_eq!(scores.size(), vec![2, 1, 1, 1]);
  }

  #[test]
  fn channel_ladder_follows_base_width() {
    let d = DiscriminatorBuilder::new(Device::Cpu).input_channels(1).base_channels(8).build();
    // conv weights + biases, three batch norms (weight + bias), score conv
    let expected = (1 * 8 * 16 + 8)
      + (8 * 16 * 16 + 16)
      + (16 * 32 * 16 + 32)
      + (32 * 64 * 16 + 64)
      + 2 * (16 + 32 + 64)
      + (64 * 16 + 1);
    assert_eq!(d.parameter_count(), expected);
    assert_eq!(d.input_channels(), 1);
  }

  #[test]
  fn final_score_is_not_squashed() {
    let d = DiscriminatorBuilder::new(Device::Cpu).base_channels(8).build();
    {
      let _guard = tch::no_grad_guard();
      for mut var in d.var_store().trainable_variables() {
        let _ = var.g_mul_scalar_(10.0);
      }
    }
    let xs = Tensor::rand([4, 3, 64, 64], (Kind::Float, Device::Cpu)) * 2.0 - 1.0;
    let scores = d.forward_t(&xs, false);
    let peak = scores.abs().max().double_value(&[]);
    assert!(peak > 1.0, "scores look bounded: peak {}", peak);
  }

  #[test]
  fn clamp_bounds_every_parameter() {
    let d = DiscriminatorBuilder::new(Device::Cpu).base_channels(8).build();
    d.clamp_parameters(0.01);
    for var in d.var_store().trainable_variables() {
      let peak = var.abs().max().double_value(&[]);
      assert!(peak <= 0.01 + 1e-7, "parameter escaped clamp: {}", peak);
    }
    let xs = Tensor::rand([2, 3, 64, 64], (Kind::Float, Device::Cpu));
    assert_eq!(d.forward_t(&xs, true).size(), vec![2, 1, 1, 1]);
  }
}
