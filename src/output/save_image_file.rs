// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/save_image_file.rs - 保存结果到指定文件
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  crop::CroppedImage,
  output::{Render, write_analysis, write_crops},
  task::AnalysisResult,
  url_file_path,
};

/// `image:///path/to/result.png`：分析结果写为 `result-standing.png`、
/// `result-flexion.png` 与 `result.json`；裁剪结果写入同一目录
pub struct SaveImageFileOutput {
  path: PathBuf,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("输出路径为空")]
  EmptyPath,
  #[error("无效的输出路径: {0}")]
  InvalidPath(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }
    let path =
      url_file_path(uri).ok_or_else(|| SaveImageFileError::InvalidPath(uri.path().to_string()))?;
    if path.file_name().is_none() {
      return Err(SaveImageFileError::EmptyPath);
    }

    Ok(SaveImageFileOutput { path })
  }
}

impl SaveImageFileOutput {
  fn stem(&self) -> PathBuf {
    match self.path.file_stem() {
      Some(stem) => self.path.with_file_name(stem),
      None => self.path.clone(),
    }
  }

  fn directory(&self) -> &Path {
    self.path.parent().unwrap_or(Path::new("."))
  }
}

impl Render<AnalysisResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, result: &AnalysisResult) -> Result<(), Self::Error> {
    let written = write_analysis(&self.stem(), result)?;
    warn!("保存分析结果到文件: {}", self.path.display());
    for path in written {
      debug!("  {}", path.display());
    }
    Ok(())
  }
}

impl Render<[CroppedImage]> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, result: &[CroppedImage]) -> Result<(), Self::Error> {
    write_crops(self.directory(), "", result)?;
    Ok(())
  }
}
