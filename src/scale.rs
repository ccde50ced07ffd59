// 该文件是 Shanan （山南西风） 项目的一部分。
// src/scale.rs - 坐标空间缩放
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

//! 关键点坐标从检测空间到任意图像原生像素空间的映射。
//!
//! 旧版四点模型以固定分辨率的参考帧给出像素坐标，
//! 33 点模型给出 [0, 1] 的归一化坐标。两者都在这里换算为目标图像的像素坐标，
//! 目标尺寸必须在图像解码之后才能得知。

use thiserror::Error;

use crate::landmark::Landmark;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ScaleError {
  #[error("目标图像尺寸未知或无效: {width}x{height}")]
  Dimension { width: u32, height: u32 },
  #[error("参考坐标系尺寸无效: {width}x{height}")]
  ReferenceFrame { width: f64, height: f64 },
}

/// 图像的原生宽高
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
  pub width: u32,
  pub height: u32,
}

impl Dimensions {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn min_side(&self) -> u32 {
    self.width.min(self.height)
  }

  fn checked(self) -> Result<Self, ScaleError> {
    if self.width == 0 || self.height == 0 {
      return Err(ScaleError::Dimension {
        width: self.width,
        height: self.height,
      });
    }
    Ok(self)
  }
}

impl From<(u32, u32)> for Dimensions {
  fn from((width, height): (u32, u32)) -> Self {
    Self { width, height }
  }
}

/// 固定分辨率的参考帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
  pub width: f64,
  pub height: f64,
}

/// 检测服务报告坐标所用的坐标系
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceSpace {
  /// 参考帧内的像素坐标
  Frame(ReferenceFrame),
  /// 相对源图像的 [0, 1] 比例
  Normalized,
}

impl ReferenceSpace {
  // 每个参考单位对应的目标像素数
  fn factors(&self, target: Dimensions) -> Result<(f64, f64), ScaleError> {
    let target = target.checked()?;
    let (w, h) = (target.width as f64, target.height as f64);
    match *self {
      ReferenceSpace::Frame(frame) => {
        if !(frame.width > 0.0 && frame.height > 0.0) {
          return Err(ScaleError::ReferenceFrame {
            width: frame.width,
            height: frame.height,
          });
        }
        Ok((w / frame.width, h / frame.height))
      }
      ReferenceSpace::Normalized => Ok((w, h)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPoint {
  pub x: f64,
  pub y: f64,
}

impl PixelPoint {
  pub fn midpoint(&self, other: &PixelPoint) -> PixelPoint {
    PixelPoint {
      x: (self.x + other.x) / 2.0,
      y: (self.y + other.y) / 2.0,
    }
  }

  pub fn to_i32(self) -> (i32, i32) {
    (self.x.round() as i32, self.y.round() as i32)
  }
}

/// 将参考空间坐标换算为目标图像像素坐标
pub fn to_pixel(
  x: f64,
  y: f64,
  space: ReferenceSpace,
  target: Dimensions,
) -> Result<PixelPoint, ScaleError> {
  let (sx, sy) = space.factors(target)?;
  Ok(PixelPoint {
    x: x * sx,
    y: y * sy,
  })
}

/// `to_pixel` 的逆变换
pub fn from_pixel(
  point: PixelPoint,
  space: ReferenceSpace,
  target: Dimensions,
) -> Result<(f64, f64), ScaleError> {
  let (sx, sy) = space.factors(target)?;
  Ok((point.x / sx, point.y / sy))
}

pub fn scale_landmark(
  landmark: &Landmark,
  space: ReferenceSpace,
  target: Dimensions,
) -> Result<PixelPoint, ScaleError> {
  to_pixel(landmark.x, landmark.y, space, target)
}

/// 原生像素空间中的整数矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

/// 将矩形按 `(sx, sy)` 缩放到原生像素空间并裁剪到图像边界内。
///
/// 裁剪后面积为零时返回 `Ok(None)`。
pub fn scale_rect(
  x: f64,
  y: f64,
  width: f64,
  height: f64,
  (sx, sy): (f64, f64),
  bounds: Dimensions,
) -> Result<Option<PixelRect>, ScaleError> {
  let bounds = bounds.checked()?;
  let (bw, bh) = (bounds.width as f64, bounds.height as f64);

  let x0 = (x * sx).round().clamp(0.0, bw);
  let y0 = (y * sy).round().clamp(0.0, bh);
  let x1 = ((x + width) * sx).round().clamp(0.0, bw);
  let y1 = ((y + height) * sy).round().clamp(0.0, bh);

  // NaN 在比较中恒为假，与零面积一同排除
  if !(x1 > x0 && y1 > y0) {
    return Ok(None);
  }

  Ok(Some(PixelRect {
    x: x0 as u32,
    y: y0 as u32,
    width: (x1 - x0) as u32,
    height: (y1 - y0) as u32,
  }))
}
