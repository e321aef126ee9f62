use tch::{nn::VarStore, Tensor};

/**
 * A model that owns its parameters in a dedicated variable store.
 *
 * Keeping one store per network means an optimizer built over `var_store()` can only
 * ever update this network's weights.
 */
pub trait Network: tch::nn::ModuleT {
  fn var_store(&self) -> &VarStore;

  /**
   * Clamps every trainable parameter element into `[-bound, bound]`, in place.
   *
   * Batch-norm running statistics are buffers, not parameters, and are left alone.
   */
  fn clamp_parameters(&self, bound: f64) {
    let _guard = tch::no_grad_guard();
    for mut var in self.var_store().trainable_variables() {
      let _ = var.clamp_(-bound, bound);
    }
  }

  /**
   * Detached copies of every trainable parameter, in creation order.
   */
  fn parameter_snapshot(&self) -> Vec<Tensor> {
    self
      .var_store()
      .trainable_variables()
      .iter()
      .map(|v| v.detach().copy())
      .collect()
  }

  fn parameter_count(&self) -> i64 {
    self
      .var_store()
      .trainable_variables()
      .iter()
      .map(|v| v.numel() as i64)
      .sum()
  }
}

/// Leaky rectifier with an explicit negative slope.
pub(crate) fn leaky_relu(xs: &Tensor, negative_slope: f64) -> Tensor {
  xs.relu() - (-xs).relu() * negative_slope
}
