// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output.rs - 分析结果输出
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

use std::{
  fs,
  io,
  path::{Path, PathBuf},
};

use serde_json::json;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{FromUrl, crop::CroppedImage, task::AnalysisResult};
#[cfg(any(feature = "save_image_file", feature = "directory_record"))]
use crate::FromUrlWithScheme;

pub trait Render<Output: ?Sized>: Sized {
  type Error;
  fn render_result(&self, result: &Output) -> Result<(), Self::Error>;
}

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 写出一次分析的全部产物：`<stem>-standing.png`、`<stem>-flexion.png` 与
/// `<stem>.json`，返回写出的文件路径
pub(crate) fn write_analysis(stem: &Path, result: &AnalysisResult) -> io::Result<Vec<PathBuf>> {
  ensure_parent(stem)?;
  let standing = with_suffix(stem, "-standing", result.annotated_standing.extension());
  let flexion = with_suffix(stem, "-flexion", result.annotated_flexion.extension());
  let report = with_suffix(stem, "", "json");

  fs::write(&standing, result.annotated_standing.bytes())?;
  fs::write(&flexion, result.annotated_flexion.bytes())?;

  let mut value = serde_json::to_value(result).map_err(io::Error::other)?;
  if let Some(map) = value.as_object_mut() {
    map.insert("rom_label".into(), json!(result.rom_assessment.label()));
    map.insert("annotated_standing".into(), json!(file_name(&standing)));
    map.insert("annotated_flexion".into(), json!(file_name(&flexion)));
  }
  let text = serde_json::to_string_pretty(&value).map_err(io::Error::other)?;
  fs::write(&report, text)?;

  info!("分析结果已保存: {}", report.display());
  Ok(vec![standing, flexion, report])
}

/// 将裁剪结果按各自的文件名写入目录，`prefix` 非空时加在文件名前
pub(crate) fn write_crops(
  directory: &Path,
  prefix: &str,
  crops: &[CroppedImage],
) -> io::Result<Vec<PathBuf>> {
  fs::create_dir_all(directory)?;
  let mut written = Vec::with_capacity(crops.len());
  for crop in crops {
    let path = directory.join(format!("{}{}", prefix, crop.file_name));
    fs::write(&path, crop.image.bytes())?;
    info!("裁剪图像已保存: {}", path.display());
    written.push(path);
  }
  Ok(written)
}

fn ensure_parent(path: &Path) -> io::Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent)?;
  }
  Ok(())
}

fn with_suffix(stem: &Path, suffix: &str, extension: &str) -> PathBuf {
  let name = stem
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();
  stem.with_file_name(format!("{}{}.{}", name, suffix, extension))
}

fn file_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default()
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => {
        let output = DirectoryRecordOutput::from_url(url)?;
        Ok(OutputWrapper::DirectoryRecordOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Render<AnalysisResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, result: &AnalysisResult) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(result)
        .map_err(OutputError::from),
    }
  }
}

impl Render<[CroppedImage]> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, result: &[CroppedImage]) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(result)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecordOutput(output) => output
        .render_result(result)
        .map_err(OutputError::from),
    }
  }
}
