// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/posture_flow.rs - 分析与裁剪流程
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

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use shanan_rom::{
  analysis::{Anchor, AngleError, Capture, RomBand},
  crop::{CropRect, CropSession},
  input::SourceImage,
  landmark::{Landmark, LandmarkSet},
  preview::PreviewRegistry,
  service::{Detection, DetectionRequest, PoseService, ReportedAngles, ServiceError, mediapipe},
  task::{AnalysisError, Analyzer, PhotoPair},
};

fn png(width: u32, height: u32) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb([180, 180, 180]));
  let mut bytes = Vec::new();
  image
    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
    .unwrap();
  bytes
}

/// 髋在 (0.5, 0.7)，肩沿与竖直方向成 `degrees` 的方向偏离
fn pose(degrees: f64, with_hips: bool) -> LandmarkSet {
  let rad = degrees.to_radians();
  let (sx, sy) = (0.5 + 0.3 * rad.sin(), 0.7 - 0.3 * rad.cos());
  let mut points = vec![
    (11, Landmark::with_visibility(sx - 0.01, sy, 0.95)),
    (12, Landmark::with_visibility(sx + 0.01, sy, 0.95)),
    (27, Landmark::with_visibility(0.49, 0.97, 0.95)),
    (28, Landmark::with_visibility(0.51, 0.97, 0.95)),
  ];
  if with_hips {
    points.push((23, Landmark::with_visibility(0.49, 0.7, 0.95)));
    points.push((24, Landmark::with_visibility(0.51, 0.7, 0.95)));
  }
  LandmarkSet::full(points)
}

struct FixedPoses(LandmarkSet, LandmarkSet);

impl PoseService for FixedPoses {
  fn detect(&self, _request: &DetectionRequest<'_>) -> Result<Detection, ServiceError> {
    Ok(Detection {
      standing: self.0.clone(),
      flexion: self.1.clone(),
      reported: ReportedAngles::default(),
      compensations: None,
      recommendations: Some("加强腘绳肌柔韧性训练".into()),
    })
  }
}

fn pair(registry: &PreviewRegistry) -> PhotoPair {
  PhotoPair::new(
    SourceImage::new("standing.png", png(1000, 1000)),
    SourceImage::new("flexion.png", png(1000, 1000)),
    registry,
  )
}

#[test]
fn sixty_degree_range_is_severely_limited() {
  let registry = PreviewRegistry::new();
  let analyzer = Analyzer::new(FixedPoses(pose(5.0, true), pose(65.0, true)));

  let result = analyzer.run(pair(&registry)).unwrap();
  assert!((result.rom_degrees - 60.0).abs() < 0.02);
  assert_eq!(result.rom_assessment, RomBand::SeverelyLimited);
  assert_eq!(result.recommendations.as_deref(), Some("加强腘绳肌柔韧性训练"));
  assert_eq!(result.annotated_flexion.mime_type(), "image/png");
  assert_eq!(registry.live(), 0);
}

#[test]
fn missing_hip_reports_the_capture() {
  let registry = PreviewRegistry::new();
  let analyzer = Analyzer::new(FixedPoses(pose(5.0, false), pose(65.0, true)));

  let err = analyzer.run(pair(&registry)).unwrap_err();
  assert!(matches!(
    err,
    AnalysisError::Angle(AngleError::MissingAnchor {
      capture: Capture::Standing,
      anchor: Anchor::Hip,
    })
  ));
  assert_eq!(registry.live(), 0);
  assert_eq!(registry.issued(), 2);
}

#[test]
fn rejected_detection_is_not_retryable() {
  let err = mediapipe::parse_response(r#"{"success": false, "error": "No pose detected"}"#)
    .unwrap_err();
  assert_eq!(err, ServiceError::Rejected("No pose detected".into()));
  assert!(!err.is_retryable());
}

#[test]
fn two_regions_split_the_photo() {
  let registry = PreviewRegistry::new();
  let mut session = CropSession::new(registry.clone());
  session.load("report.png", &png(200, 100)).unwrap();
  assert_eq!(registry.live(), 1);

  session.complete_drag(CropRect::percent(0.0, 0.0, 50.0, 100.0)).unwrap();
  session.add_region().unwrap();
  session.complete_drag(CropRect::percent(50.0, 0.0, 50.0, 100.0)).unwrap();
  assert!(session.add_region().is_err());

  let crops = session.apply().unwrap();
  assert_eq!(crops.len(), 2);
  for crop in &crops {
    assert_eq!(crop.image.dimensions().width, 100);
    assert_eq!(crop.image.dimensions().height, 100);
  }
  assert!(crops[0].file_name.starts_with("cropped_area1_"));
  assert!(!session.is_editing());
  assert_eq!(registry.live(), 0);
}
