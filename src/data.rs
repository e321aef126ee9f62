use std::path::Path;

use log::info;
use tch::data::Iter2;
use tch::{Device, Kind, Tensor};

use crate::error::{GanError, Result};

/**
 * Latent noise for the generator, uniform on `[-1, 1]`.
 *
 * # Returns
 * - Tensor : shape `[batch_size, dim]`
 */
pub fn sample_noise(batch_size: i64, dim: i64, device: Device) -> Tensor {
  Tensor::rand([batch_size, dim], (Kind::Float, device)) * 2.0 - 1.0
}

/// Maps images from `[0, 1]` into the `[-1, 1]` training range.
pub fn preprocess_img(xs: &Tensor) -> Tensor {
  xs * 2.0 - 1.0
}

/// Maps generator output from `[-1, 1]` back to `[0, 1]` for display.
pub fn deprocess_img(xs: &Tensor) -> Tensor {
  (xs + 1.0) / 2.0
}

/**
 * Anything that can hand out one epoch of `(images, labels)` batches.
 *
 * Images are expected as floats in `[0, 1]` with shape `[batch, channels, height, width]`.
 * Labels are carried along but never read by the trainer.
 */
pub trait BatchSource {
  type Batches: Iterator<Item = (Tensor, Tensor)>;

  fn epoch_batches(&self, batch_size: i64) -> Self::Batches;
}

/**
 * An in-memory image set, shuffled into mini-batches once per epoch.
 */
#[derive(Debug)]
pub struct ImageDataset {
  images: Tensor,
  labels: Tensor,
}

impl ImageDataset {
  /**
   * Wraps an image tensor of shape `[N, C, H, W]` with values in `[0, 1]`.
   * Labels default to zeros.
   */
  pub fn new(images: Tensor) -> Result<Self> {
    let size = images.size();
    if size.len() != 4 {
      return Err(GanError::InvalidConfig(format!(
        "images must be [N, C, H, W], got {:?}",
        size
      )));
    }
    let labels = Tensor::zeros([size[0]], (Kind::Int64, images.device()));
    Ok(ImageDataset {
      images: images.to_kind(Kind::Float),
      labels,
    })
  }

  /**
   * Loads every image in `dir`, resized to `image_size x image_size`.
   */
  pub fn from_image_dir<P: AsRef<Path>>(dir: P, image_size: i64) -> Result<Self> {
    let dir = dir.as_ref();
    let images = tch::vision::image::load_dir(dir, image_size, image_size).map_err(|e| {
      GanError::Dataset {
        path: dir.to_path_buf(),
        reason: e.to_string(),
      }
    })?;
    info!("loaded {} images from {}", images.size()[0], dir.display());
    Self::new(images.to_kind(Kind::Float) / 255.0)
  }

  /**
   * Loads the MNIST training split from `dir` and upsamples it to `image_size x image_size`.
   */
  pub fn from_mnist_dir<P: AsRef<Path>>(dir: P, image_size: i64) -> Result<Self> {
    let dir = dir.as_ref();
    let mnist = tch::vision::mnist::load_dir(dir).map_err(|e| GanError::Dataset {
      path: dir.to_path_buf(),
      reason: e.to_string(),
    })?;
    let images = mnist.train_images.view([-1, 1, 28, 28]).upsample_bilinear2d(
      [image_size, image_size],
      false,
      None::<f64>,
      None::<f64>,
    );
    info!("loaded {} MNIST digits from {}", images.size()[0], dir.display());
    let mut dataset = Self::new(images.clamp(0.0, 1.0))?;
    dataset.labels = mnist.train_labels;
    Ok(dataset)
  }

  pub fn len(&self) -> i64 {
    self.images.size()[0]
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// `[channels, height, width]` of a single image.
  pub fn image_shape(&self) -> [i64; 3] {
    let size = self.images.size();
    [size[1], size[2], size[3]]
  }

  pub fn to_device(&self, device: Device) -> ImageDataset {
    ImageDataset {
      images: self.images.to_device(device),
      labels: self.labels.to_device(device),
    }
  }
}

impl BatchSource for ImageDataset {
  type Batches = Iter2;

  fn epoch_batches(&self, batch_size: i64) -> Iter2 {
    let mut iter = Iter2::new(&self.images, &self.labels, batch_size);
    iter.shuffle().return_smaller_last_batch();
    iter
  }
}
