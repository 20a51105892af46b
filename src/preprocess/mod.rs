//! # Tensor Codec
//!
//! Turns an image file into the fixed-shape, normalized tensor every model
//! session expects: `(1, 3, 256, 256)` of `f32`, channel-first, normalized
//! per channel with the ImageNet mean and standard deviation.

use std::path::Path;

use image::imageops::{self, FilterType};
use ndarray::Array4;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Model input tensor, shape `(batch, channel, height, width)`.
pub type Tensor = Array4<f32>;

/// Side length images are resized to.
pub const INPUT_SIZE: u32 = 256;

/// Extensions accepted by [`ImageTensorCodec`], compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Per-channel mean, in R, G, B order.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel standard deviation, in R, G, B order.
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Order of the colour planes in the produced tensor.
///
/// The normalization constants are always applied by plane position, so with
/// `Bgr` the blue plane is normalized with the first mean/std pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Bgr,
    Rgb,
}

/// Decodes an image file into a model-ready tensor.
pub trait TensorCodec: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Tensor>;
}

/// Returns true when `path` carries one of the [`IMAGE_EXTENSIONS`].
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// [`TensorCodec`] backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTensorCodec {
    pub channel_order: ChannelOrder,
}

impl ImageTensorCodec {
    pub fn new(channel_order: ChannelOrder) -> Self {
        Self { channel_order }
    }
}

impl TensorCodec for ImageTensorCodec {
    fn decode(&self, path: &Path) -> Result<Tensor> {
        if !has_image_extension(path) {
            let extension = path
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
                .unwrap_or_default();
            return Err(Error::Format { path: path.to_path_buf(), extension });
        }

        let decoded = image::open(path).map_err(|e| Error::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rgb = decoded.to_rgb8();
        let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

        let side = INPUT_SIZE as usize;
        let mut tensor = Tensor::zeros((1, 3, side, side));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for (plane, source) in self.plane_sources().into_iter().enumerate() {
                let value = pixel.0[source] as f32 / 255.0;
                tensor[[0, plane, y as usize, x as usize]] = (value - MEAN[plane]) / STD[plane];
            }
        }
        Ok(tensor)
    }
}

impl ImageTensorCodec {
    /// RGB channel index feeding each output plane.
    fn plane_sources(&self) -> [usize; 3] {
        match self.channel_order {
            ChannelOrder::Bgr => [2, 1, 0],
            ChannelOrder::Rgb => [0, 1, 2],
        }
    }
}
