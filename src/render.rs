// 该文件是 Shanan （山南西风） 项目的一部分。
// src/render.rs - 图像解码、编码与骨架叠加
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{fmt, io::Cursor};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{ImageFormat, RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use tracing::debug;

use crate::scale::{Dimensions, ScaleError};

mod skeleton;
pub use self::skeleton::{DrawStats, OverlayMetrics, OverlayStyle, SkeletonRenderer};

/// 裁剪输出使用的 JPEG 质量
pub const JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum RenderError {
  #[error("图像解码失败: {0}")]
  ImageDecode(#[source] image::ImageError),
  #[error("图像编码失败: {0}")]
  ImageEncode(#[source] image::ImageError),
  #[error("坐标缩放错误: {0}")]
  Scale(#[from] ScaleError),
}

/// 解码后的图像，独占其像素数据
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
  image: RgbImage,
}

impl Raster {
  pub fn decode(bytes: &[u8]) -> Result<Self, RenderError> {
    let image = image::load_from_memory(bytes)
      .map_err(RenderError::ImageDecode)?
      .to_rgb8();
    debug!(
      "图像解码完成: {}x{} ({} 字节)",
      image.width(),
      image.height(),
      bytes.len()
    );
    Ok(Self { image })
  }

  pub fn from_image(image: RgbImage) -> Self {
    Self { image }
  }

  pub fn dimensions(&self) -> Dimensions {
    Dimensions::new(self.image.width(), self.image.height())
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }

  pub fn encode_png(&self) -> Result<EncodedImage, RenderError> {
    let mut bytes = Vec::new();
    self
      .image
      .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
      .map_err(RenderError::ImageEncode)?;
    Ok(EncodedImage::new(bytes, ImageFormat::Png, self.dimensions()))
  }

  pub fn encode_jpeg(&self, quality: u8) -> Result<EncodedImage, RenderError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
      .encode_image(&self.image)
      .map_err(RenderError::ImageEncode)?;
    Ok(EncodedImage::new(bytes, ImageFormat::Jpeg, self.dimensions()))
  }
}

/// 自包含的已编码图像，可直接展示而无需再次获取
#[derive(Clone, PartialEq)]
pub struct EncodedImage {
  bytes: Vec<u8>,
  format: ImageFormat,
  dimensions: Dimensions,
}

impl fmt::Debug for EncodedImage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EncodedImage")
      .field("format", &self.format)
      .field("dimensions", &self.dimensions)
      .field("len", &self.bytes.len())
      .finish()
  }
}

impl EncodedImage {
  pub fn new(bytes: Vec<u8>, format: ImageFormat, dimensions: Dimensions) -> Self {
    Self {
      bytes,
      format,
      dimensions,
    }
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.bytes
  }

  pub fn format(&self) -> ImageFormat {
    self.format
  }

  pub fn dimensions(&self) -> Dimensions {
    self.dimensions
  }

  pub fn mime_type(&self) -> &'static str {
    self.format.to_mime_type()
  }

  pub fn extension(&self) -> &'static str {
    self.format.extensions_str().first().copied().unwrap_or("bin")
  }

  pub fn to_data_uri(&self) -> String {
    data_uri(self.mime_type(), &self.bytes)
  }
}

/// `data:<mime>;base64,<payload>`
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
  format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// 按内容探测格式生成 data URI，无法识别时按 JPEG 处理
pub fn data_uri_for(bytes: &[u8]) -> String {
  let mime = image::guess_format(bytes)
    .map(|f| f.to_mime_type())
    .unwrap_or("image/jpeg");
  data_uri(mime, bytes)
}
