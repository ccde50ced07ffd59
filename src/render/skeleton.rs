// 该文件是 Shanan （山南西风） 项目的一部分。
// src/render/skeleton.rs - 骨架叠加绘制
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

use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_polygon_mut},
  point::Point,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EncodedImage, Raster, RenderError};
use crate::{
  landmark::{
    LandmarkSet,
    topology::{connections, is_salient},
  },
  scale::{Dimensions, PixelPoint, ScaleError, scale_landmark},
};

// 颜色常量
const LINE_COLOR: [u8; 3] = [0x34, 0xD3, 0x99];
const POINT_COLOR: [u8; 3] = [0x10, 0xB9, 0x81];
const SALIENT_COLOR: [u8; 3] = [0xEF, 0x44, 0x44];
const OUTLINE_COLOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// 叠加样式。线宽与半径随图像短边等比变化，并各有下限。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
  pub line_color: [u8; 3],
  pub point_color: [u8; 3],
  pub salient_color: [u8; 3],
  pub outline_color: [u8; 3],
  pub line_divisor: f32,
  pub min_line_width: f32,
  pub radius_divisor: f32,
  pub min_radius: f32,
  pub outline_divisor: f32,
  pub min_outline: f32,
  pub salient_scale: f32,
}

impl Default for OverlayStyle {
  fn default() -> Self {
    Self {
      line_color: LINE_COLOR,
      point_color: POINT_COLOR,
      salient_color: SALIENT_COLOR,
      outline_color: OUTLINE_COLOR,
      line_divisor: 300.0,
      min_line_width: 3.0,
      radius_divisor: 200.0,
      min_radius: 4.0,
      outline_divisor: 600.0,
      min_outline: 1.5,
      salient_scale: 1.5,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayMetrics {
  pub line_width: f32,
  pub radius: f32,
  pub salient_radius: f32,
  pub outline: f32,
}

impl OverlayStyle {
  pub fn metrics(&self, dims: Dimensions) -> OverlayMetrics {
    let side = dims.min_side() as f32;
    let scaled = |divisor: f32, floor: f32| {
      if divisor > 0.0 {
        (side / divisor).max(floor)
      } else {
        floor
      }
    };
    let radius = scaled(self.radius_divisor, self.min_radius);
    OverlayMetrics {
      line_width: scaled(self.line_divisor, self.min_line_width),
      radius,
      salient_radius: radius * self.salient_scale.max(1.0),
      outline: scaled(self.outline_divisor, self.min_outline),
    }
  }
}

/// 一次绘制实际画出的线段与关节数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawStats {
  pub segments: usize,
  pub markers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SkeletonRenderer {
  style: OverlayStyle,
}

impl SkeletonRenderer {
  pub fn new(style: OverlayStyle) -> Self {
    Self { style }
  }

  pub fn style(&self) -> &OverlayStyle {
    &self.style
  }

  /// 在源图像的副本上绘制骨架，源图像不被修改
  pub fn render(&self, source: &Raster, set: &LandmarkSet) -> Result<Raster, RenderError> {
    let mut image = source.image().clone();
    let stats = self.draw_on_image(&mut image, set)?;
    debug!(
      "骨架绘制完成: {} 条连线, {} 个关节",
      stats.segments, stats.markers
    );
    Ok(Raster::from_image(image))
  }

  /// 解码、绘制并编码为 PNG
  pub fn render_bytes(&self, bytes: &[u8], set: &LandmarkSet) -> Result<EncodedImage, RenderError> {
    let source = Raster::decode(bytes)?;
    self.render(&source, set)?.encode_png()
  }

  pub fn draw_on_image(
    &self,
    image: &mut RgbImage,
    set: &LandmarkSet,
  ) -> Result<DrawStats, ScaleError> {
    let dims = Dimensions::new(image.width(), image.height());
    let space = set.schema().reference_space();
    let metrics = self.style.metrics(dims);
    let mut stats = DrawStats::default();

    for (a, b) in connections(set.schema()) {
      let (Some(la), Some(lb)) = (set.get_usable(a), set.get_usable(b)) else {
        continue;
      };
      let pa = onto_canvas(scale_landmark(la, space, dims)?, dims);
      let pb = onto_canvas(scale_landmark(lb, space, dims)?, dims);
      draw_thick_segment(image, pa, pb, metrics.line_width, Rgb(self.style.line_color));
      stats.segments += 1;
    }

    for (key, landmark) in set.usable() {
      let center = onto_canvas(scale_landmark(landmark, space, dims)?, dims);
      let (radius, color) = if is_salient(key) {
        (metrics.salient_radius, self.style.salient_color)
      } else {
        (metrics.radius, self.style.point_color)
      };
      let center = center.to_i32();
      draw_filled_circle_mut(
        image,
        center,
        (radius + metrics.outline).round() as i32,
        Rgb(self.style.outline_color),
      );
      draw_filled_circle_mut(image, center, radius.round() as i32, Rgb(color));
      stats.markers += 1;
    }

    Ok(stats)
  }
}

// 画面外的点收拢到一圈边距内，绘制时的整数运算不会溢出
fn onto_canvas(point: PixelPoint, dims: Dimensions) -> PixelPoint {
  let margin = dims.width.max(dims.height) as f64;
  PixelPoint {
    x: point.x.clamp(-margin, dims.width as f64 + margin),
    y: point.y.clamp(-margin, dims.height as f64 + margin),
  }
}

// 以四边形填充加圆形端帽绘制粗线段
fn draw_thick_segment(image: &mut RgbImage, a: PixelPoint, b: PixelPoint, width: f32, color: Rgb<u8>) {
  let half = (width as f64 / 2.0).max(0.5);
  let (dx, dy) = (b.x - a.x, b.y - a.y);
  let length = dx.hypot(dy);

  if length >= 1.0 {
    let (nx, ny) = (-dy / length * half, dx / length * half);
    let corner = |p: PixelPoint, sign: f64| {
      Point::new(
        (p.x + sign * nx).round() as i32,
        (p.y + sign * ny).round() as i32,
      )
    };
    let polygon = [corner(a, 1.0), corner(b, 1.0), corner(b, -1.0), corner(a, -1.0)];
    if polygon[0] != polygon[3] {
      draw_polygon_mut(image, &polygon, color);
    }
  }

  let cap = half.round().max(1.0) as i32;
  draw_filled_circle_mut(image, a.to_i32(), cap, color);
  draw_filled_circle_mut(image, b.to_i32(), cap, color);
}
