// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 按日期目录归档结果
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

use chrono::{DateTime, Datelike, Local, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  crop::CroppedImage,
  output::{Render, write_analysis, write_crops},
  task::AnalysisResult,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的目录路径: {0}")]
  InvalidPath(String),
}

/// `folder:///records[?local]`：结果写入 `records/YYYY/MM/DD/`，文件名以
/// `HH-MM-SS-序号` 开头，同一进程内序号递增
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record_counter: AtomicU16,
  local_time: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let local_time = uri.query_pairs().any(|(k, _)| k == "local");
    let directory = url_file_path(uri)
      .ok_or_else(|| DirectoryRecordOutputError::InvalidPath(uri.path().to_string()))?;

    Ok(DirectoryRecordOutput {
      directory,
      record_counter: AtomicU16::new(0),
      local_time,
    })
  }
}

impl DirectoryRecordOutput {
  fn record_id(&self) -> u16 {
    self.record_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn now(&self) -> DateTime<chrono::FixedOffset> {
    if self.local_time {
      Local::now().fixed_offset()
    } else {
      Utc::now().fixed_offset()
    }
  }

  /// 当天目录与本条记录的文件名前缀
  fn record_prefix(&self) -> (PathBuf, String) {
    let now = self.now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    let prefix = format!("{}-{:04X}", now.format("%H-%M-%S"), self.record_id());
    debug!("记录目录: {}, 前缀: {}", directory.display(), prefix);
    (directory, prefix)
  }
}

impl Render<AnalysisResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, result: &AnalysisResult) -> Result<(), Self::Error> {
    let (directory, prefix) = self.record_prefix();
    write_analysis(&directory.join(prefix), result)?;
    Ok(())
  }
}

impl Render<[CroppedImage]> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, result: &[CroppedImage]) -> Result<(), Self::Error> {
    let (directory, prefix) = self.record_prefix();
    write_crops(&directory, &format!("{}-", prefix), result)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::output::tests::{sample_result, scratch_dir};

  #[test]
  fn records_land_in_dated_tree_with_increasing_ids() {
    let dir = scratch_dir("folder");
    let url = url::Url::parse(&format!("folder://{}", dir.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&sample_result()).unwrap();
    output.render_result(&sample_result()).unwrap();

    let mut reports: Vec<PathBuf> = Vec::new();
    let mut stack = vec![dir.clone()];
    while let Some(next) = stack.pop() {
      for entry in std::fs::read_dir(next).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == "json") {
          reports.push(path);
        }
      }
    }
    reports.sort();
    assert_eq!(reports.len(), 2);
    // records/YYYY/MM/DD/HH-MM-SS-0001.json
    let relative = reports[0].strip_prefix(&dir).unwrap();
    assert_eq!(relative.components().count(), 4);
    let names: Vec<String> = reports
      .iter()
      .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
      .collect();
    assert!(names.iter().any(|n| n.ends_with("-0001")));
    assert!(names.iter().any(|n| n.ends_with("-0002")));
    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn encoded_directory_is_decoded() {
    let url = url::Url::parse("folder:///srv/记录 存档?local").unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    assert_eq!(output.directory, PathBuf::from("/srv/记录 存档"));
    assert!(output.local_time);
  }

  #[test]
  fn image_scheme_is_not_a_folder() {
    let url = url::Url::parse("image:///tmp/out.png").unwrap();
    assert!(matches!(
      DirectoryRecordOutput::from_url(&url),
      Err(DirectoryRecordOutputError::SchemeMismatch)
    ));
  }
}
