use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tch::nn::{self, OptimizerConfig, VarStore};
use tch::TchError;

use crate::losses::GanType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SolverKind {
  Adam,
  RmsProp,
  Sgd,
}

impl SolverKind {
  pub fn default_learning_rate(&self) -> f64 {
    match self {
      SolverKind::Adam => 1e-3,
      SolverKind::RmsProp => 5e-5,
      SolverKind::Sgd => 1e-2,
    }
  }
}

/**
 * Optimizer choice and learning rate for one network.
 *
 * # Hyper-parameters
 *
 * - Adam uses `beta1 = 0.5`, `beta2 = 0.999`, the usual DCGAN setting.
 * - RMSProp uses libtorch defaults, as in weight-clipped WGAN training.
 * - SGD uses momentum `0.9`.
 */
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Solver {
  pub kind: SolverKind,
  pub learning_rate: f64,
}

impl Solver {
  pub fn new(kind: SolverKind, learning_rate: f64) -> Self {
    Solver {
      kind,
      learning_rate,
    }
  }

  pub fn adam(learning_rate: f64) -> Self {
    Self::new(SolverKind::Adam, learning_rate)
  }

  pub fn rms_prop(learning_rate: f64) -> Self {
    Self::new(SolverKind::RmsProp, learning_rate)
  }

  /**
   * The default solver for a GAN variant: Adam at `1e-3` for the standard and
   * least-squares objectives, RMSProp at `5e-5` for Wasserstein.
   */
  pub fn for_gan_type(gan_type: GanType) -> Self {
    let kind = match gan_type {
      GanType::Wasserstein => SolverKind::RmsProp,
      GanType::Standard | GanType::LeastSquares => SolverKind::Adam,
    };
    Self::new(kind, kind.default_learning_rate())
  }

  /**
   * Builds an optimizer over every trainable variable of `vs`, and nothing else.
   */
  pub fn build(&self, vs: &VarStore) -> Result<nn::Optimizer, TchError> {
    match self.kind {
      SolverKind::Adam => nn::Adam {
        beta1: 0.5,
        beta2: 0.999,
        ..Default::default()
      }
      .build(vs, self.learning_rate),
      SolverKind::RmsProp => nn::RmsProp::default().build(vs, self.learning_rate),
      SolverKind::Sgd => nn::Sgd {
        momentum: 0.9,
        ..Default::default()
      }
      .build(vs, self.learning_rate),
    }
  }
}

#[cfg(test)]
mod tests {
  use tch::{Device, Kind};

  use super::*;

  #[test]
  fn wasserstein_defaults_to_rms_prop() {
    assert_eq!(Solver::for_gan_type(GanType::Wasserstein).kind, SolverKind::RmsProp);
    assert_eq!(Solver::for_gan_type(GanType::Standard), Solver::adam(1e-3));
  }

  #[test]
  fn optimizer_only_moves_its_own_store() {
    let owned = VarStore::new(Device::Cpu);
    let other = VarStore::new(Device::Cpu);
    let w = owned.root().randn_standard("w", &[4]);
    let v = other.root().randn_standard("v", &[4]);
    let v_before = v.detach().copy();

    for kind in [SolverKind::Adam, SolverKind::RmsProp, SolverKind::Sgd] {
      let mut opt = Solver::new(kind, 1e-2).build(&owned).unwrap();
      let w_before = w.detach().copy();
      let loss = (&w * &v).sum(Kind::Float);
      opt.backward_step(&loss);
      assert!(!w.equal(&w_before), "{:?} did not update its parameters", kind);
      assert!(v.equal(&v_before), "{:?} touched a foreign store", kind);
    }
  }
}
