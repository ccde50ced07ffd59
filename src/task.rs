// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 姿态分析任务
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Instant,
};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  analysis::{AngleError, Auxiliary, Capture, RomBand, RomClassifier, measure_rom},
  input::SourceImage,
  preview::{PreviewHandle, PreviewRegistry},
  render::{EncodedImage, Raster, RenderError, SkeletonRenderer},
  service::{DetectionRequest, PoseService, ServiceError},
};

/// 跨线程共享的取消标记
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
  cancelled: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
  #[error("{capture}照片解码失败: {source}")]
  Decode {
    capture: Capture,
    #[source]
    source: RenderError,
  },
  #[error("角度计算失败: {0}")]
  Angle(#[from] AngleError),
  #[error("检测服务错误: {0}")]
  Service(#[from] ServiceError),
  #[error("骨架绘制失败: {0}")]
  Render(#[from] RenderError),
  #[error("分析已取消")]
  Abandoned,
}

impl AnalysisError {
  /// 仅网络类服务失败值得重试
  pub fn is_retryable(&self) -> bool {
    match self {
      AnalysisError::Service(err) => err.is_retryable(),
      _ => false,
    }
  }
}

/// 待分析的照片，持有其预览句柄直到分析结束
#[derive(Debug)]
pub struct SourcePhoto {
  source: SourceImage,
  _preview: PreviewHandle,
}

impl SourcePhoto {
  pub fn new(source: SourceImage, registry: &PreviewRegistry) -> Self {
    let preview = registry.acquire(source.name().to_string());
    Self {
      source,
      _preview: preview,
    }
  }

  pub fn source(&self) -> &SourceImage {
    &self.source
  }
}

/// 站立位与前屈位照片，二者无先后顺序
#[derive(Debug)]
pub struct PhotoPair {
  pub standing: SourcePhoto,
  pub flexion: SourcePhoto,
}

impl PhotoPair {
  pub fn new(standing: SourceImage, flexion: SourceImage, registry: &PreviewRegistry) -> Self {
    Self {
      standing: SourcePhoto::new(standing, registry),
      flexion: SourcePhoto::new(flexion, registry),
    }
  }
}

/// 一次完整分析的结果。标注图像已编码，可独立展示。
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
  pub standing_angle: f64,
  pub flexion_angle: f64,
  pub rom_degrees: f64,
  pub rom_assessment: RomBand,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub compensations: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub recommendations: Option<String>,
  #[serde(skip)]
  pub annotated_standing: EncodedImage,
  #[serde(skip)]
  pub annotated_flexion: EncodedImage,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub auxiliary: Option<Auxiliary>,
}

pub struct Analyzer<S> {
  service: S,
  classifier: RomClassifier,
  renderer: SkeletonRenderer,
  cancel: CancelToken,
}

impl<S: PoseService> Analyzer<S> {
  pub fn new(service: S) -> Self {
    Self {
      service,
      classifier: RomClassifier::default(),
      renderer: SkeletonRenderer::default(),
      cancel: CancelToken::new(),
    }
  }

  pub fn with_classifier(mut self, classifier: RomClassifier) -> Self {
    self.classifier = classifier;
    self
  }

  pub fn with_renderer(mut self, renderer: SkeletonRenderer) -> Self {
    self.renderer = renderer;
    self
  }

  pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn cancel_token(&self) -> CancelToken {
    self.cancel.clone()
  }

  /// 解码 → 检测 → 计算角度 → 分级 → 绘制。
  ///
  /// 照片对在此被消耗，其预览句柄在任何返回路径上都会释放。取消只在挂起点
  /// （解码、服务调用）之后检查，被放弃的分析不产生部分结果。
  pub fn run(&self, photos: PhotoPair) -> Result<AnalysisResult, AnalysisError> {
    info!("开始姿态分析...");
    let PhotoPair { standing, flexion } = photos;

    let standing_raster = decode(&standing, Capture::Standing)?;
    let flexion_raster = decode(&flexion, Capture::Flexion)?;
    self.checkpoint()?;

    let now = Instant::now();
    let request = DetectionRequest::new(standing.source().bytes(), flexion.source().bytes());
    let detection = self.service.detect(&request)?;
    info!("检测服务返回，耗时: {:.2?}", now.elapsed());
    self.checkpoint()?;

    let measurement = measure_rom(
      (&detection.standing, standing_raster.dimensions()),
      (&detection.flexion, flexion_raster.dimensions()),
    )?;
    if let Some(reported) = detection.reported.rom_degrees
      && (reported - measurement.rom_degrees).abs() > 1.0
    {
      warn!(
        "服务报告的 ROM {:.2}° 与本地计算 {:.2}° 不一致，以本地结果为准",
        reported, measurement.rom_degrees
      );
    }

    let assessment = self.classifier.classify(
      measurement.rom_degrees,
      detection.compensations,
      detection.recommendations,
    );
    info!(
      "站立位 {:.2}°, 前屈位 {:.2}°, ROM {:.2}° ({})",
      measurement.standing.trunk, measurement.flexion.trunk, measurement.rom_degrees, assessment.band
    );

    let annotated_standing = self
      .renderer
      .render(&standing_raster, &detection.standing)?
      .encode_png()?;
    let annotated_flexion = self
      .renderer
      .render(&flexion_raster, &detection.flexion)?
      .encode_png()?;
    self.checkpoint()?;

    debug!("姿态分析完成");
    Ok(AnalysisResult {
      standing_angle: measurement.standing.trunk,
      flexion_angle: measurement.flexion.trunk,
      rom_degrees: measurement.rom_degrees,
      rom_assessment: assessment.band,
      compensations: assessment.compensations,
      recommendations: assessment.recommendations,
      annotated_standing,
      annotated_flexion,
      auxiliary: measurement.auxiliary(),
    })
  }

  fn checkpoint(&self) -> Result<(), AnalysisError> {
    if self.cancel.is_cancelled() {
      warn!("分析已被取消，丢弃中间结果");
      return Err(AnalysisError::Abandoned);
    }
    Ok(())
  }
}

fn decode(photo: &SourcePhoto, capture: Capture) -> Result<Raster, AnalysisError> {
  Raster::decode(photo.source().bytes()).map_err(|source| AnalysisError::Decode { capture, source })
}
