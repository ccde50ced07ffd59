// 该文件是 Shanan （山南西风） 项目的一部分。
// src/analysis.rs - 躯干角度与活动范围计算
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

//! 躯干角度以髋关节为轴心，取髋→肩向量与竖直方向的夹角。
//! 所有角度在目标图像的像素空间中计算，避免归一化坐标在非正方形图像上的畸变。

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
  landmark::{FullJoint, JointKey, LandmarkSet, LegacyJoint},
  scale::{Dimensions, PixelPoint, ScaleError, scale_landmark},
};

mod classify;
pub use self::classify::{ClassifyError, RomAssessment, RomBand, RomClassifier, RomThresholds};

/// ROM 上限
pub const MAX_ROM_DEGREES: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capture {
  Standing,
  Flexion,
}

impl fmt::Display for Capture {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Capture::Standing => write!(f, "站立位"),
      Capture::Flexion => write!(f, "前屈位"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
  Shoulder,
  Hip,
}

impl fmt::Display for Anchor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Anchor::Shoulder => write!(f, "肩"),
      Anchor::Hip => write!(f, "髋"),
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AngleError {
  #[error("{capture}缺少{anchor}关键点，无法计算躯干角度")]
  MissingAnchor { capture: Capture, anchor: Anchor },
  #[error("坐标缩放错误: {0}")]
  Scale(#[from] ScaleError),
}

/// 单次拍摄的角度
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaptureAngles {
  pub trunk: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pelvic_tilt: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub knee: Option<f64>,
}

/// 辅助角度，缺失的关节对应项省略而不是填零
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Auxiliary {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub standing_pelvic_tilt: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub flexion_pelvic_tilt: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub standing_knee_angle: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub flexion_knee_angle: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RomMeasurement {
  pub standing: CaptureAngles,
  pub flexion: CaptureAngles,
  pub rom_degrees: f64,
}

impl RomMeasurement {
  pub fn auxiliary(&self) -> Option<Auxiliary> {
    let aux = Auxiliary {
      standing_pelvic_tilt: self.standing.pelvic_tilt,
      flexion_pelvic_tilt: self.flexion.pelvic_tilt,
      standing_knee_angle: self.standing.knee,
      flexion_knee_angle: self.flexion.knee,
    };
    let any = aux.standing_pelvic_tilt.is_some()
      || aux.flexion_pelvic_tilt.is_some()
      || aux.standing_knee_angle.is_some()
      || aux.flexion_knee_angle.is_some();
    any.then_some(aux)
  }
}

fn round2(value: f64) -> f64 {
  (value * 100.0).round() / 100.0
}

fn resolve(
  set: &LandmarkSet,
  key: impl Into<JointKey>,
  dims: Dimensions,
) -> Result<Option<PixelPoint>, ScaleError> {
  let space = set.schema().reference_space();
  set
    .get_usable(key)
    .map(|lm| scale_landmark(lm, space, dims))
    .transpose()
}

// 左右成对的关节取中点，只有一侧可用时取该侧
fn resolve_pair(
  set: &LandmarkSet,
  left: FullJoint,
  right: FullJoint,
  dims: Dimensions,
) -> Result<Option<PixelPoint>, ScaleError> {
  let left = resolve(set, left, dims)?;
  let right = resolve(set, right, dims)?;
  Ok(match (left, right) {
    (Some(l), Some(r)) => Some(l.midpoint(&r)),
    (one, other) => one.or(other),
  })
}

fn anchor_point(
  set: &LandmarkSet,
  anchor: Anchor,
  dims: Dimensions,
) -> Result<Option<PixelPoint>, ScaleError> {
  match (set, anchor) {
    (LandmarkSet::Legacy { .. }, Anchor::Shoulder) => resolve(set, LegacyJoint::Shoulder, dims),
    (LandmarkSet::Legacy { .. }, Anchor::Hip) => resolve(set, LegacyJoint::Hip, dims),
    (LandmarkSet::Full { .. }, Anchor::Shoulder) => {
      resolve_pair(set, FullJoint::LeftShoulder, FullJoint::RightShoulder, dims)
    }
    (LandmarkSet::Full { .. }, Anchor::Hip) => {
      resolve_pair(set, FullJoint::LeftHip, FullJoint::RightHip, dims)
    }
  }
}

/// 躯干与竖直方向的夹角（度），0 表示直立
pub fn trunk_angle(
  set: &LandmarkSet,
  dims: Dimensions,
  capture: Capture,
) -> Result<f64, AngleError> {
  let shoulder = anchor_point(set, Anchor::Shoulder, dims)?.ok_or(AngleError::MissingAnchor {
    capture,
    anchor: Anchor::Shoulder,
  })?;
  let hip = anchor_point(set, Anchor::Hip, dims)?.ok_or(AngleError::MissingAnchor {
    capture,
    anchor: Anchor::Hip,
  })?;

  let dx = shoulder.x - hip.x;
  // 图像 y 轴向下；加 0.0 把 -0.0 归一为 +0.0
  let up = -(shoulder.y - hip.y) + 0.0;
  Ok(round2(dx.atan2(up).to_degrees().abs()))
}

/// 骨盆倾斜：左髋→右髋连线与水平方向的夹角，仅全身模型可用
pub fn pelvic_tilt(set: &LandmarkSet, dims: Dimensions) -> Result<Option<f64>, ScaleError> {
  if let LandmarkSet::Legacy { .. } = set {
    return Ok(None);
  }
  let left = resolve(set, FullJoint::LeftHip, dims)?;
  let right = resolve(set, FullJoint::RightHip, dims)?;
  Ok(match (left, right) {
    (Some(l), Some(r)) => Some(round2((r.y - l.y).atan2(r.x - l.x).to_degrees())),
    _ => None,
  })
}

// 以 vertex 为顶点的夹角
fn interior_angle(a: PixelPoint, vertex: PixelPoint, b: PixelPoint) -> Option<f64> {
  let (v1x, v1y) = (a.x - vertex.x, a.y - vertex.y);
  let (v2x, v2y) = (b.x - vertex.x, b.y - vertex.y);
  let norm = (v1x.hypot(v1y)) * (v2x.hypot(v2y));
  if norm == 0.0 {
    return None;
  }
  let cos = ((v1x * v2x + v1y * v2y) / norm).clamp(-1.0, 1.0);
  Some(cos.acos().to_degrees())
}

fn leg_angle(
  set: &LandmarkSet,
  (hip, knee, ankle): (JointKey, JointKey, JointKey),
  dims: Dimensions,
) -> Result<Option<f64>, ScaleError> {
  let (Some(h), Some(k), Some(a)) = (
    resolve(set, hip, dims)?,
    resolve(set, knee, dims)?,
    resolve(set, ankle, dims)?,
  ) else {
    return Ok(None);
  };
  Ok(interior_angle(h, k, a))
}

/// 膝关节角（髋-膝-踝），180 表示伸直；全身模型取两侧平均
pub fn knee_angle(set: &LandmarkSet, dims: Dimensions) -> Result<Option<f64>, ScaleError> {
  let legs: Vec<(JointKey, JointKey, JointKey)> = match set {
    LandmarkSet::Legacy { .. } => vec![(
      LegacyJoint::Hip.into(),
      LegacyJoint::Knee.into(),
      LegacyJoint::Ankle.into(),
    )],
    LandmarkSet::Full { .. } => vec![
      (
        FullJoint::LeftHip.into(),
        FullJoint::LeftKnee.into(),
        FullJoint::LeftAnkle.into(),
      ),
      (
        FullJoint::RightHip.into(),
        FullJoint::RightKnee.into(),
        FullJoint::RightAnkle.into(),
      ),
    ],
  };

  let mut angles = Vec::with_capacity(legs.len());
  for leg in legs {
    if let Some(angle) = leg_angle(set, leg, dims)? {
      angles.push(angle);
    }
  }

  if angles.is_empty() {
    return Ok(None);
  }
  Ok(Some(round2(angles.iter().sum::<f64>() / angles.len() as f64)))
}

pub fn capture_angles(
  set: &LandmarkSet,
  dims: Dimensions,
  capture: Capture,
) -> Result<CaptureAngles, AngleError> {
  let angles = CaptureAngles {
    trunk: trunk_angle(set, dims, capture)?,
    pelvic_tilt: pelvic_tilt(set, dims)?,
    knee: knee_angle(set, dims)?,
  };
  debug!("{} 角度: {:?}", capture, angles);
  Ok(angles)
}

/// `|flexion - standing|`，限制在 [0, 180]
pub fn rom_degrees(standing_angle: f64, flexion_angle: f64) -> f64 {
  round2((flexion_angle - standing_angle).abs()).clamp(0.0, MAX_ROM_DEGREES)
}

/// 站立位与前屈位两组关键点计算 ROM，任一侧缺少锚点即整体失败
pub fn measure_rom(
  standing: (&LandmarkSet, Dimensions),
  flexion: (&LandmarkSet, Dimensions),
) -> Result<RomMeasurement, AngleError> {
  let standing = capture_angles(standing.0, standing.1, Capture::Standing)?;
  let flexion = capture_angles(flexion.0, flexion.1, Capture::Flexion)?;
  Ok(RomMeasurement {
    standing,
    flexion,
    rom_degrees: rom_degrees(standing.trunk, flexion.trunk),
  })
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::landmark::{LEGACY_REFERENCE_FRAME, Landmark};

  const DIMS: Dimensions = Dimensions::new(1000, 1000);

  /// 髋位于 (0.5, 0.7)，躯干长 0.3，与竖直方向成 `degrees` 度的全身关键点
  pub(crate) fn full_pose_at(degrees: f64) -> LandmarkSet {
    let (hip_x, hip_y, len) = (0.5, 0.7, 0.3);
    let rad = degrees.to_radians();
    let sx = hip_x + len * rad.sin();
    let sy = hip_y - len * rad.cos();
    LandmarkSet::full([
      (11, Landmark::with_visibility(sx - 0.02, sy, 0.9)),
      (12, Landmark::with_visibility(sx + 0.02, sy, 0.9)),
      (23, Landmark::with_visibility(hip_x - 0.02, hip_y, 0.9)),
      (24, Landmark::with_visibility(hip_x + 0.02, hip_y, 0.9)),
      (25, Landmark::with_visibility(hip_x - 0.02, 0.85, 0.9)),
      (26, Landmark::with_visibility(hip_x + 0.02, 0.85, 0.9)),
      (27, Landmark::with_visibility(hip_x - 0.02, 0.98, 0.9)),
      (28, Landmark::with_visibility(hip_x + 0.02, 0.98, 0.9)),
    ])
  }

  #[test]
  fn shoulder_above_hip_is_zero_degrees() {
    let set = LandmarkSet::legacy(
      LEGACY_REFERENCE_FRAME,
      [
        (LegacyJoint::Shoulder, Landmark::new(960.0, 200.0)),
        (LegacyJoint::Hip, Landmark::new(960.0, 600.0)),
      ],
    );
    let angle = trunk_angle(&set, Dimensions::new(1920, 1080), Capture::Standing).unwrap();
    assert_eq!(angle, 0.0);
  }

  #[test]
  fn equal_offsets_give_forty_five_degrees() {
    let set = LandmarkSet::legacy(
      LEGACY_REFERENCE_FRAME,
      [
        (LegacyJoint::Shoulder, Landmark::new(1300.0, 300.0)),
        (LegacyJoint::Hip, Landmark::new(1000.0, 600.0)),
      ],
    );
    let angle = trunk_angle(&set, Dimensions::new(1920, 1080), Capture::Flexion).unwrap();
    assert_eq!(angle, 45.0);

    // 向后倾同样取绝对值
    let set = LandmarkSet::legacy(
      LEGACY_REFERENCE_FRAME,
      [
        (LegacyJoint::Shoulder, Landmark::new(700.0, 300.0)),
        (LegacyJoint::Hip, Landmark::new(1000.0, 600.0)),
      ],
    );
    let angle = trunk_angle(&set, Dimensions::new(1920, 1080), Capture::Flexion).unwrap();
    assert_eq!(angle, 45.0);
  }

  #[test]
  fn angle_is_measured_in_pixel_space() {
    // 归一化偏移相等，但图像宽是高的两倍，因此像素空间下不是 45 度
    let set = LandmarkSet::full([
      (11, Landmark::new(0.6, 0.4)),
      (23, Landmark::new(0.5, 0.5)),
    ]);
    let angle = trunk_angle(&set, Dimensions::new(2000, 1000), Capture::Standing).unwrap();
    assert_eq!(angle, round2(2.0f64.atan().to_degrees()));
  }

  #[test]
  fn full_schema_uses_shoulder_and_hip_midpoints() {
    let set = full_pose_at(30.0);
    let angle = trunk_angle(&set, DIMS, Capture::Standing).unwrap();
    assert_eq!(angle, 30.0);
  }

  #[test]
  fn missing_or_invisible_anchor_is_fatal() {
    let set = LandmarkSet::legacy(
      LEGACY_REFERENCE_FRAME,
      [(LegacyJoint::Shoulder, Landmark::new(960.0, 200.0))],
    );
    assert_eq!(
      trunk_angle(&set, DIMS, Capture::Standing),
      Err(AngleError::MissingAnchor {
        capture: Capture::Standing,
        anchor: Anchor::Hip
      })
    );

    let set = LandmarkSet::full([
      (11, Landmark::with_visibility(0.5, 0.3, 0.2)),
      (12, Landmark::with_visibility(0.5, 0.3, 0.3)),
      (23, Landmark::new(0.5, 0.7)),
    ]);
    assert_eq!(
      trunk_angle(&set, DIMS, Capture::Flexion),
      Err(AngleError::MissingAnchor {
        capture: Capture::Flexion,
        anchor: Anchor::Shoulder
      })
    );
  }

  #[test]
  fn zero_dimensions_surface_as_scale_error() {
    let set = full_pose_at(10.0);
    assert!(matches!(
      trunk_angle(&set, Dimensions::new(0, 0), Capture::Standing),
      Err(AngleError::Scale(ScaleError::Dimension { .. }))
    ));
  }

  #[test]
  fn rom_is_absolute_difference() {
    assert_eq!(rom_degrees(5.0, 65.0), 60.0);
    assert_eq!(rom_degrees(65.0, 5.0), 60.0);
    assert_eq!(rom_degrees(12.5, 12.5), 0.0);
    for (s, f) in [(0.0, 180.0), (90.0, 3.3), (179.99, 0.01)] {
      let rom = rom_degrees(s, f);
      assert!(rom >= 0.0 && rom <= MAX_ROM_DEGREES);
      assert!((rom - (f - s).abs()).abs() < 0.01);
    }
  }

  #[test]
  fn measure_rom_from_two_captures() {
    let m = measure_rom((&full_pose_at(5.0), DIMS), (&full_pose_at(65.0), DIMS)).unwrap();
    assert_eq!(m.standing.trunk, 5.0);
    assert_eq!(m.flexion.trunk, 65.0);
    assert_eq!(m.rom_degrees, 60.0);
    assert_eq!(m.rom_degrees, (m.flexion.trunk - m.standing.trunk).abs());
  }

  #[test]
  fn auxiliary_angles_are_computed_when_present() {
    let set = full_pose_at(0.0);
    assert_eq!(pelvic_tilt(&set, DIMS).unwrap(), Some(0.0));
    assert_eq!(knee_angle(&set, DIMS).unwrap(), Some(180.0));

    let legacy = LandmarkSet::legacy(
      LEGACY_REFERENCE_FRAME,
      [
        (LegacyJoint::Hip, Landmark::new(1000.0, 500.0)),
        (LegacyJoint::Knee, Landmark::new(1000.0, 700.0)),
        (LegacyJoint::Ankle, Landmark::new(1200.0, 700.0)),
      ],
    );
    let dims = Dimensions::new(1920, 1080);
    assert_eq!(knee_angle(&legacy, dims).unwrap(), Some(90.0));
    assert_eq!(pelvic_tilt(&legacy, dims).unwrap(), None);
  }

  #[test]
  fn auxiliary_is_omitted_not_zero_filled() {
    let bare = |deg: f64| {
      let rad = deg.to_radians();
      LandmarkSet::full([
        (11, Landmark::new(0.5 + 0.3 * rad.sin(), 0.7 - 0.3 * rad.cos())),
        (23, Landmark::new(0.5, 0.7)),
      ])
    };
    let m = measure_rom((&bare(0.0), DIMS), (&bare(40.0), DIMS)).unwrap();
    assert_eq!(m.standing.pelvic_tilt, None);
    assert_eq!(m.flexion.knee, None);
    assert_eq!(m.auxiliary(), None);

    let m = measure_rom((&full_pose_at(0.0), DIMS), (&bare(40.0), DIMS)).unwrap();
    let aux = m.auxiliary().unwrap();
    assert_eq!(aux.standing_knee_angle, Some(180.0));
    assert_eq!(aux.flexion_knee_angle, None);
  }

  #[test]
  fn engine_is_deterministic() {
    let a = measure_rom((&full_pose_at(7.0), DIMS), (&full_pose_at(71.0), DIMS)).unwrap();
    let b = measure_rom((&full_pose_at(7.0), DIMS), (&full_pose_at(71.0), DIMS)).unwrap();
    assert_eq!(a, b);
  }
}
