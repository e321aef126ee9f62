use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tch::{Kind, Reduction, Tensor};

/**
 * Mean binary cross-entropy between `logits` and a constant `target` label.
 *
 * Goes through libtorch's fused logit form, which stays finite for large scores.
 */
fn bce_with_logits(logits: &Tensor, target: f64) -> Tensor {
  let target = logits.ones_like() * target;
  logits.binary_cross_entropy_with_logits(&target, None::<Tensor>, None::<Tensor>, Reduction::Mean)
}

/**
 * Mean squared distance between `scores` and a constant `target`.
 */
fn mse_to(scores: &Tensor, target: f64) -> Tensor {
  let target = scores.ones_like() * target;
  scores.mse_loss(&target, Reduction::Mean)
}

/**
 * Standard GAN loss for the discriminator.
 *
 * # Arguments
 * - `logits_real`: discriminator logits for real images, any shape with one entry per sample
 * - `logits_fake`: discriminator logits for generated images
 *
 * # Returns
 * - Tensor : scalar, BCE of reals against label 1 plus BCE of fakes against label 0.
 */
pub fn discriminator_loss(logits_real: &Tensor, logits_fake: &Tensor) -> Tensor {
  bce_with_logits(logits_real, 1.0) + bce_with_logits(logits_fake, 0.0)
}

/**
 * Standard GAN loss for the generator: BCE of the fake logits against label 1.
 */
pub fn generator_loss(logits_fake: &Tensor) -> Tensor {
  bce_with_logits(logits_fake, 1.0)
}

/**
 * Least-squares GAN loss for the discriminator.
 *
 * `0.5 * mean((real - 1)²) + 0.5 * mean(fake²)`
 */
pub fn ls_discriminator_loss(scores_real: &Tensor, scores_fake: &Tensor) -> Tensor {
  (mse_to(scores_real, 1.0) + mse_to(scores_fake, 0.0)) * 0.5
}

/**
 * Least-squares GAN loss for the generator: `0.5 * mean((fake - 1)²)`.
 */
pub fn ls_generator_loss(scores_fake: &Tensor) -> Tensor {
  mse_to(scores_fake, 1.0) * 0.5
}

/**
 * Wasserstein critic loss, `-(mean(real) - mean(fake))`.
 *
 * Minimizing it maximizes the critic's estimate of the earth-mover distance.
 */
pub fn wasserstein_discriminator_loss(score_real: &Tensor, score_fake: &Tensor) -> Tensor {
  -(score_real.mean(Kind::Float) - score_fake.mean(Kind::Float))
}

pub fn wasserstein_generator_loss(score_fake: &Tensor) -> Tensor {
  -score_fake.mean(Kind::Float)
}

/**
 * The adversarial objective being trained.
 *
 * Selects the pair of loss functions and whether the critic weights are clipped after
 * each discriminator update.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GanType {
  #[default]
  #[value(alias = "gan")]
  Standard,
  #[value(alias = "lsgan")]
  LeastSquares,
  #[value(alias = "wgan")]
  Wasserstein,
}

impl GanType {
  pub fn discriminator_loss(&self, scores_real: &Tensor, scores_fake: &Tensor) -> Tensor {
    match self {
      GanType::Standard => discriminator_loss(scores_real, scores_fake),
      GanType::LeastSquares => ls_discriminator_loss(scores_real, scores_fake),
      GanType::Wasserstein => wasserstein_discriminator_loss(scores_real, scores_fake),
    }
  }

  pub fn generator_loss(&self, scores_fake: &Tensor) -> Tensor {
    match self {
      GanType::Standard => generator_loss(scores_fake),
      GanType::LeastSquares => ls_generator_loss(scores_fake),
      GanType::Wasserstein => wasserstein_generator_loss(scores_fake),
    }
  }

  /// Whether discriminator weights are clamped after every discriminator step.
  pub fn clips_weights(&self) -> bool {
    matches!(self, GanType::Wasserstein)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn scores(values: &[f32]) -> Tensor {
    Tensor::from_slice(values)
  }

  fn value(t: &Tensor) -> f64 {
    t.double_value(&[])
  }

  fn softplus(x: f64) -> f64 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
  }

  #[test]
  fn standard_discriminator_loss_is_sum_of_two_bce_terms() {
    let real = [-3.0f32, 0.0, 2.5];
    let fake = [1.0f32, -1.0];

    // BCE(x, 1) = softplus(-x), BCE(x, 0) = softplus(x)
    let expected_real = real.iter().map(|&x| softplus(-(x as f64))).sum::<f64>() / 3.0;
    let expected_fake = fake.iter().map(|&x| softplus(x as f64)).sum::<f64>() / 2.0;

    let loss = value(&discriminator_loss(&scores(&real), &scores(&fake)));
    assert!(loss >= 0.0);
    assert_abs_diff_eq!(loss, expected_real + expected_fake, epsilon = 1e-5);
  }

  #[test]
  fn standard_losses_stay_finite_for_large_logits() {
    let confident = value(&discriminator_loss(&scores(&[1000.0]), &scores(&[-1000.0])));
    assert_abs_diff_eq!(confident, 0.0, epsilon = 1e-6);

    let wrong = value(&discriminator_loss(&scores(&[-1000.0]), &scores(&[1000.0])));
    assert!(wrong.is_finite());
    assert_abs_diff_eq!(wrong, 2000.0, epsilon = 1e-2);

    let g = value(&generator_loss(&scores(&[-500.0, 500.0])));
    assert!(g.is_finite());
    assert_abs_diff_eq!(g, 250.0, epsilon = 1e-2);
  }

  #[test]
  fn standard_generator_loss_at_zero_logit_is_ln2() {
    let loss = value(&generator_loss(&scores(&[0.0, 0.0])));
    assert_abs_diff_eq!(loss, std::f64::consts::LN_2, epsilon = 1e-6);
  }

  #[test]
  fn least_squares_losses_vanish_on_targets() {
    assert_abs_diff_eq!(value(&ls_generator_loss(&scores(&[1.0, 1.0, 1.0]))), 0.0);
    assert_abs_diff_eq!(
      value(&ls_discriminator_loss(&scores(&[1.0]), &scores(&[0.0]))),
      0.0
    );
  }

  #[test]
  fn least_squares_discriminator_loss_halves_each_term() {
    // 0.5 * (0 - 1)² + 0.5 * 2²
    let loss = value(&ls_discriminator_loss(&scores(&[0.0]), &scores(&[2.0])));
    assert_abs_diff_eq!(loss, 2.5, epsilon = 1e-6);
  }

  #[test]
  fn wasserstein_losses() {
    let d = value(&wasserstein_discriminator_loss(&scores(&[5.0]), &scores(&[2.0])));
    assert_abs_diff_eq!(d, -3.0, epsilon = 1e-6);

    let g = value(&wasserstein_generator_loss(&scores(&[2.0])));
    assert_abs_diff_eq!(g, -2.0, epsilon = 1e-6);
  }

  #[test]
  fn losses_accept_discriminator_shaped_scores() {
    let real = Tensor::from_slice(&[5.0f32, 3.0]).view([2, 1, 1, 1]);
    let fake = Tensor::from_slice(&[2.0f32, 0.0]).view([2, 1, 1, 1]);
    let d = value(&GanType::Wasserstein.discriminator_loss(&real, &fake));
    assert_abs_diff_eq!(d, -3.0, epsilon = 1e-6);
  }

  #[test]
  fn losses_keep_gradient_history() {
    let mut fake = Tensor::from_slice(&[0.5f32, -0.5]).set_requires_grad(true);
    for gan_type in [GanType::Standard, GanType::LeastSquares, GanType::Wasserstein] {
      fake.zero_grad();
      let loss = gan_type.generator_loss(&fake);
      assert!(loss.requires_grad());
      loss.backward();
      assert!(fake.grad().defined());
    }
  }

  #[test]
  fn gan_type_dispatch_matches_free_functions() {
    let real = scores(&[0.3, -1.2]);
    let fake = scores(&[2.0, 0.1]);

    let pairs = [
      (GanType::Standard, discriminator_loss(&real, &fake), generator_loss(&fake)),
      (GanType::LeastSquares, ls_discriminator_loss(&real, &fake), ls_generator_loss(&fake)),
      (
        GanType::Wasserstein,
        wasserstein_discriminator_loss(&real, &fake),
        wasserstein_generator_loss(&fake),
      ),
    ];
    for (gan_type, d, g) in pairs {
      assert_abs_diff_eq!(value(&gan_type.discriminator_loss(&real, &fake)), value(&d));
      assert_abs_diff_eq!(value(&gan_type.generator_loss(&fake)), value(&g));
    }
    assert!(GanType::Wasserstein.clips_weights());
    assert!(!GanType::Standard.clips_weights());
    assert!(!GanType::LeastSquares.clips_weights());
  }

  #[test]
  fn gan_type_parses_cli_names() {
    assert_eq!(GanType::from_str("wgan", true), Ok(GanType::Wasserstein));
    assert_eq!(GanType::from_str("least-squares", true), Ok(GanType::LeastSquares));
    assert_eq!(GanType::from_str("gan", true), Ok(GanType::Standard));
  }
}
