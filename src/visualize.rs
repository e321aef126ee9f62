use std::fs;
use std::path::{Path, PathBuf};

use derivative::Derivative;
use log::debug;
use tch::{Device, Kind, Tensor};

use crate::error::Result;

/**
 * Receives a batch of generated images, already mapped to `[0, 1]`, at each logging
 * checkpoint. Purely observational: nothing flows back into training.
 */
pub trait Visualizer {
  fn show(&mut self, images: &Tensor, iteration: i64) -> Result<()>;
}

/**
 * Tiles a batch `[N, C, H, W]` into a single `[3, rows * H, nrow * W]` image.
 *
 * Grayscale batches are replicated across three channels. When `N` does not fill the last
 * row the remaining tiles are black.
 */
pub fn image_grid(images: &Tensor, nrow: i64) -> Tensor {
  let size = images.size();
  let (n, c, h, w) = (size[0], size[1], size[2], size[3]);
  let nrow = nrow.max(1);
  let rows = (n + nrow - 1) / nrow;

  let missing = rows * nrow - n;
  let images = if missing > 0 {
    let pad = Tensor::zeros([missing, c, h, w], (images.kind(), images.device()));
    Tensor::cat(&[images.shallow_clone(), pad], 0)
  } else {
    images.shallow_clone()
  };

  let grid = images
    .view([rows, nrow, c, h, w])
    .permute([2, 0, 3, 1, 4])
    .reshape([c, rows * h, nrow * w]);
  if c == 1 {
    grid.repeat([3, 1, 1])
  } else {
    grid
  }
}

/// Side length of the square grid that fits `n` tiles.
fn grid_side(n: i64) -> i64 {
  (n as f64).sqrt().ceil() as i64
}

/**
 * Writes each checkpoint's samples as a PNG grid, `iter_<n>.png`, under one directory.
 */
#[derive(Debug)]
pub struct ImageGridWriter {
  dir: PathBuf,
}

impl ImageGridWriter {
  pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
    let dir = dir.as_ref().to_path_buf();
    fs::create_dir_all(&dir)?;
    Ok(ImageGridWriter { dir })
  }

  pub fn path_for(&self, iteration: i64) -> PathBuf {
    self.dir.join(format!("iter_{:06}.png", iteration))
  }

  pub fn save(&self, images: &Tensor, path: &Path) -> Result<()> {
    let n = images.size()[0];
    let grid = image_grid(&images.to_device(Device::Cpu), grid_side(n));
    let pixels = (grid.clamp(0.0, 1.0) * 255.0).round().to_kind(Kind::Uint8);
    tch::vision::image::save(&pixels, path)?;
    debug!("wrote {} samples to {}", n, path.display());
    Ok(())
  }
}

impl Visualizer for ImageGridWriter {
  fn show(&mut self, images: &Tensor, iteration: i64) -> Result<()> {
    let path = self.path_for(iteration);
    self.save(images, &path)
  }
}

fn fmt_callback<F>(_: &F, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
  write!(fmt, "Callback")
}

/**
 * Forwards samples to a closure.
 */
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CallbackVisualizer<F>
where
  F: FnMut(&Tensor, i64),
{
  #[derivative(Debug(format_with = "fmt_callback", bound = ""))]
  callback: F,
}

impl<F: FnMut(&Tensor, i64)> CallbackVisualizer<F> {
  pub fn new(callback: F) -> Self {
    CallbackVisualizer { callback }
  }
}

impl<F: FnMut(&Tensor, i64)> Visualizer for CallbackVisualizer<F> {
  fn show(&mut self, images: &Tensor, iteration: i64) -> Result<()> {
    (self.callback)(images, iteration);
    Ok(())
  }
}

#[derive(Debug, Default)]
pub struct NullVisualizer;

impl Visualizer for NullVisualizer {
  fn show(&mut self, _images: &Tensor, _iteration: i64) -> Result<()> {
    Ok(())
  }
}
