// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 从文件读取照片
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

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use super::SourceImage;
use crate::{FromUrl, FromUrlWithScheme, url_file_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法识别的图像格式: {0}")]
  UnknownFormat(String),
  #[error("无效的文件路径: {0}")]
  InvalidPath(String),
}

/// `image:///path/to/photo.jpg`
pub struct ImageFileInput {
  source: SourceImage,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = url_file_path(url)
      .ok_or_else(|| ImageFileInputError::InvalidPath(url.path().to_string()))?;
    let bytes = std::fs::read(&path)?;
    // 只检查格式，解码留给后续流程
    let format = image::guess_format(&bytes)
      .map_err(|_| ImageFileInputError::UnknownFormat(path.display().to_string()))?;
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    info!("读取照片 {} ({:?}, {} 字节)", name, format, bytes.len());

    Ok(ImageFileInput {
      source: SourceImage::new(name, bytes),
    })
  }
}

impl ImageFileInput {
  pub fn into_source(self) -> SourceImage {
    self.source
  }
}
