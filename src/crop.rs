// 该文件是 Shanan （山南西风） 项目的一部分。
// src/crop.rs - 多区域裁剪会话
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

use image::imageops;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  preview::{PreviewHandle, PreviewRegistry},
  render::{EncodedImage, JPEG_QUALITY, Raster, RenderError},
  scale::{Dimensions, PixelRect, ScaleError, scale_rect},
};

/// 每个会话最多允许的裁剪区域数
pub const MAX_REGIONS: usize = 2;

const FIRST_REGION: CropRect = CropRect::percent(10.0, 10.0, 80.0, 80.0);
const ADDED_REGION: CropRect = CropRect::percent(20.0, 20.0, 60.0, 60.0);

#[derive(Error, Debug)]
pub enum CropError {
  #[error("尚未载入待裁剪图像")]
  NotLoaded,
  #[error("没有已完成的裁剪区域")]
  Incomplete,
  #[error("裁剪区域数量已达上限 ({})", MAX_REGIONS)]
  RegionLimit,
  #[error("至少需要保留一个裁剪区域")]
  LastRegion,
  #[error("裁剪区域索引越界: {index} (共 {len} 个)")]
  IndexOutOfRange { index: usize, len: usize },
  #[error("裁剪区域 #{id} 与图像无交集")]
  EmptyRegion { id: u32 },
  #[error("坐标缩放错误: {0}")]
  Scale(#[from] ScaleError),
  #[error("图像处理错误: {0}")]
  Render(#[from] RenderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RectUnit {
  /// 相对图像原生尺寸的百分比
  Percent,
  /// 显示尺寸下的像素
  Pixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
  pub unit: RectUnit,
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

impl CropRect {
  pub const fn percent(x: f64, y: f64, width: f64, height: f64) -> Self {
    Self {
      unit: RectUnit::Percent,
      x,
      y,
      width,
      height,
    }
  }

  pub const fn pixel(x: f64, y: f64, width: f64, height: f64) -> Self {
    Self {
      unit: RectUnit::Pixel,
      x,
      y,
      width,
      height,
    }
  }

  /// 换算到原生像素空间并裁剪到图像范围内
  pub fn to_natural(
    &self,
    natural: Dimensions,
    displayed: Option<Dimensions>,
  ) -> Result<Option<PixelRect>, ScaleError> {
    let factors = match self.unit {
      RectUnit::Percent => (natural.width as f64 / 100.0, natural.height as f64 / 100.0),
      RectUnit::Pixel => {
        let displayed = displayed
          .filter(|d| d.width > 0 && d.height > 0)
          .ok_or(ScaleError::Dimension {
            width: displayed.map_or(0, |d| d.width),
            height: displayed.map_or(0, |d| d.height),
          })?;
        (
          natural.width as f64 / displayed.width as f64,
          natural.height as f64 / displayed.height as f64,
        )
      }
    };
    scale_rect(self.x, self.y, self.width, self.height, factors, natural)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRegion {
  pub id: u32,
  /// 拖动中的矩形
  pub rect: CropRect,
  /// 最近一次拖动结束时冻结的矩形
  pub completed: Option<CropRect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CroppedImage {
  pub region_id: u32,
  pub file_name: String,
  pub image: EncodedImage,
}

#[derive(Debug)]
struct Editing {
  source: Raster,
  name: String,
  // 随编辑状态一同释放
  _preview: PreviewHandle,
  displayed: Option<Dimensions>,
  regions: Vec<CropRegion>,
  active: usize,
  next_id: u32,
}

impl Editing {
  fn active_region(&mut self) -> &mut CropRegion {
    &mut self.regions[self.active]
  }
}

#[derive(Debug, Default)]
enum SessionState {
  #[default]
  Idle,
  Editing(Box<Editing>),
}

/// 单张图像上的 1..=2 个裁剪区域，任一时刻只有一个活动区域
#[derive(Debug, Default)]
pub struct CropSession {
  registry: PreviewRegistry,
  state: SessionState,
}

impl CropSession {
  pub fn new(registry: PreviewRegistry) -> Self {
    Self {
      registry,
      state: SessionState::Idle,
    }
  }

  pub fn is_editing(&self) -> bool {
    matches!(self.state, SessionState::Editing(_))
  }

  /// 载入新图像并以默认区域开始编辑，替换之前的编辑状态。
  ///
  /// 解码失败时保留原状态。
  pub fn load(&mut self, name: impl Into<String>, bytes: &[u8]) -> Result<(), CropError> {
    let name = name.into();
    let source = Raster::decode(bytes)?;
    info!(
      "载入裁剪图像 {}: {}x{}",
      name,
      source.dimensions().width,
      source.dimensions().height
    );
    let preview = self.registry.acquire(format!("crop:{}", name));
    self.state = SessionState::Editing(Box::new(Editing {
      source,
      name,
      _preview: preview,
      displayed: None,
      regions: vec![CropRegion {
        id: 1,
        rect: FIRST_REGION,
        completed: None,
      }],
      active: 0,
      next_id: 2,
    }));
    Ok(())
  }

  /// 记录图像当前的显示尺寸，用于像素单位矩形的换算
  pub fn set_displayed_size(&mut self, displayed: Dimensions) -> Result<(), CropError> {
    self.editing_mut()?.displayed = Some(displayed);
    Ok(())
  }

  /// 新增区域并设为活动区域，返回其索引
  pub fn add_region(&mut self) -> Result<usize, CropError> {
    let editing = self.editing_mut()?;
    if editing.regions.len() >= MAX_REGIONS {
      return Err(CropError::RegionLimit);
    }
    let id = editing.next_id;
    editing.next_id += 1;
    editing.regions.push(CropRegion {
      id,
      rect: ADDED_REGION,
      completed: None,
    });
    editing.active = editing.regions.len() - 1;
    debug!("新增裁剪区域 #{}", id);
    Ok(editing.active)
  }

  pub fn switch_region(&mut self, index: usize) -> Result<(), CropError> {
    let editing = self.editing_mut()?;
    let len = editing.regions.len();
    if index >= len {
      return Err(CropError::IndexOutOfRange { index, len });
    }
    editing.active = index;
    Ok(())
  }

  pub fn remove_region(&mut self, index: usize) -> Result<(), CropError> {
    let editing = self.editing_mut()?;
    let len = editing.regions.len();
    if index >= len {
      return Err(CropError::IndexOutOfRange { index, len });
    }
    if len <= 1 {
      return Err(CropError::LastRegion);
    }
    let removed = editing.regions.remove(index);
    if editing.active >= index && editing.active > 0 {
      editing.active -= 1;
    }
    editing.active = editing.active.min(editing.regions.len() - 1);
    debug!("移除裁剪区域 #{}", removed.id);
    Ok(())
  }

  /// 拖动过程中更新活动区域
  pub fn update_rect(&mut self, rect: CropRect) -> Result<(), CropError> {
    self.editing_mut()?.active_region().rect = rect;
    Ok(())
  }

  /// 拖动结束，冻结活动区域的矩形
  pub fn complete_drag(&mut self, rect: CropRect) -> Result<(), CropError> {
    let region = self.editing_mut()?.active_region();
    region.rect = rect;
    region.completed = Some(rect);
    Ok(())
  }

  pub fn regions(&self) -> &[CropRegion] {
    match &self.state {
      SessionState::Editing(editing) => &editing.regions,
      SessionState::Idle => &[],
    }
  }

  pub fn active_index(&self) -> Option<usize> {
    match &self.state {
      SessionState::Editing(editing) => Some(editing.active),
      SessionState::Idle => None,
    }
  }

  pub fn can_apply(&self) -> bool {
    self.regions().iter().any(|r| r.completed.is_some())
  }

  /// 按每个已完成区域从原生分辨率图像中裁剪，输出 JPEG。
  ///
  /// 成功后会话回到 `Idle` 并释放预览句柄；失败时保持编辑状态。
  pub fn apply(&mut self) -> Result<Vec<CroppedImage>, CropError> {
    let editing = match &self.state {
      SessionState::Editing(editing) => editing,
      SessionState::Idle => return Err(CropError::NotLoaded),
    };

    let completed: Vec<(u32, CropRect)> = editing
      .regions
      .iter()
      .filter_map(|r| r.completed.map(|rect| (r.id, rect)))
      .collect();
    if completed.is_empty() {
      return Err(CropError::Incomplete);
    }

    let natural = editing.source.dimensions();
    let many = completed.len() > 1;
    let mut outputs = Vec::with_capacity(completed.len());
    for (n, (id, rect)) in completed.into_iter().enumerate() {
      let Some(px) = rect.to_natural(natural, editing.displayed)? else {
        warn!("裁剪区域 #{} 超出图像范围", id);
        return Err(CropError::EmptyRegion { id });
      };
      let cropped =
        imageops::crop_imm(editing.source.image(), px.x, px.y, px.width, px.height).to_image();
      let image = Raster::from_image(cropped).encode_jpeg(JPEG_QUALITY)?;
      let file_name = if many {
        format!("cropped_area{}_{}", n + 1, editing.name)
      } else {
        format!("cropped_{}", editing.name)
      };
      debug!(
        "裁剪区域 #{} -> {} ({}x{}+{}+{})",
        id, file_name, px.width, px.height, px.x, px.y
      );
      outputs.push(CroppedImage {
        region_id: id,
        file_name,
        image,
      });
    }

    info!("裁剪完成，共输出 {} 张图像", outputs.len());
    self.state = SessionState::Idle;
    Ok(outputs)
  }

  /// 放弃编辑，回到 `Idle`
  pub fn cancel(&mut self) {
    if matches!(std::mem::take(&mut self.state), SessionState::Editing(_)) {
      debug!("裁剪会话已取消");
    }
  }

  fn editing_mut(&mut self) -> Result<&mut Editing, CropError> {
    match &mut self.state {
      SessionState::Editing(editing) => Ok(editing.as_mut()),
      SessionState::Idle => Err(CropError::NotLoaded),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::render::tests::solid_png;

  fn session(registry: &PreviewRegistry) -> CropSession {
    let mut session = CropSession::new(registry.clone());
    session
      .load("photo.png", &solid_png(200, 100, [90, 120, 150]))
      .unwrap();
    session
  }

  #[test]
  fn load_starts_with_one_default_region() {
    let registry = PreviewRegistry::new();
    let s = session(&registry);
    assert!(s.is_editing());
    assert_eq!(s.regions().len(), 1);
    assert_eq!(s.regions()[0].rect, FIRST_REGION);
    assert_eq!(s.active_index(), Some(0));
    assert!(!s.can_apply());
    assert_eq!(registry.live(), 1);
  }

  #[test]
  fn at_most_two_regions() {
    let registry = PreviewRegistry::new();
    let mut s = session(&registry);
    assert_eq!(s.add_region().unwrap(), 1);
    assert_eq!(s.active_index(), Some(1));
    assert_eq!(s.regions()[1].rect, ADDED_REGION);
    assert!(matches!(s.add_region(), Err(CropError::RegionLimit)));
    assert_eq!(s.regions().len(), MAX_REGIONS);
  }

  #[test]
  fn removal_keeps_active_index_valid() {
    let registry = PreviewRegistry::new();
    for (active, removed, expected) in [(0, 1, 0), (1, 0, 0), (1, 1, 0), (0, 0, 0)] {
      let mut s = session(&registry);
      s.add_region().unwrap();
      s.switch_region(active).unwrap();
      s.remove_region(removed).unwrap();
      assert_eq!(s.regions().len(), 1);
      assert_eq!(s.active_index(), Some(expected));
      assert!(s.active_index().unwrap() < s.regions().len());
    }

    let mut s = session(&registry);
    assert!(matches!(s.remove_region(0), Err(CropError::LastRegion)));
    assert!(matches!(
      s.remove_region(3),
      Err(CropError::IndexOutOfRange { index: 3, len: 1 })
    ));
  }

  #[test]
  fn editing_touches_only_the_active_region() {
    let registry = PreviewRegistry::new();
    let mut s = session(&registry);
    s.add_region().unwrap();
    s.switch_region(0).unwrap();
    let rect = CropRect::percent(0.0, 0.0, 50.0, 50.0);
    s.update_rect(rect).unwrap();
    assert_eq!(s.regions()[0].rect, rect);
    assert_eq!(s.regions()[0].completed, None);
    assert_eq!(s.regions()[1].rect, ADDED_REGION);

    s.complete_drag(rect).unwrap();
    assert_eq!(s.regions()[0].completed, Some(rect));
    assert_eq!(s.regions()[1].completed, None);
    assert!(s.can_apply());
  }

  #[test]
  fn apply_requires_a_completed_region() {
    let registry = PreviewRegistry::new();
    let mut s = session(&registry);
    assert!(matches!(s.apply(), Err(CropError::Incomplete)));
    assert!(s.is_editing());
    assert_eq!(registry.live(), 1);
  }

  #[test]
  fn percent_regions_map_to_natural_pixels() {
    let registry = PreviewRegistry::new();
    let mut s = session(&registry);
    s.complete_drag(CropRect::percent(10.0, 10.0, 50.0, 50.0))
      .unwrap();
    s.add_region().unwrap();
    s.complete_drag(CropRect::percent(0.0, 0.0, 25.0, 100.0))
      .unwrap();

    let out = s.apply().unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].file_name, "cropped_area1_photo.png");
    assert_eq!(out[1].file_name, "cropped_area2_photo.png");
    assert_eq!(out[0].image.dimensions(), Dimensions::new(100, 50));
    assert_eq!(out[1].image.dimensions(), Dimensions::new(50, 100));
    assert_eq!(out[0].image.format(), image::ImageFormat::Jpeg);

    assert!(!s.is_editing());
    assert_eq!(registry.live(), 0);
  }

  #[test]
  fn pixel_regions_need_displayed_size() {
    let registry = PreviewRegistry::new();
    let mut s = session(&registry);
    s.complete_drag(CropRect::pixel(0.0, 0.0, 50.0, 25.0)).unwrap();
    assert!(matches!(s.apply(), Err(CropError::Scale(_))));

    s.set_displayed_size(Dimensions::new(100, 50)).unwrap();
    let out = s.apply().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].file_name, "cropped_photo.png");
    assert_eq!(out[0].image.dimensions(), Dimensions::new(100, 50));
  }

  #[test]
  fn regions_outside_the_image_are_rejected() {
    let registry = PreviewRegistry::new();
    let mut s = session(&registry);
    s.complete_drag(CropRect::percent(120.0, 0.0, 10.0, 10.0))
      .unwrap();
    assert!(matches!(s.apply(), Err(CropError::EmptyRegion { id: 1 })));
  }

  #[test]
  fn nan_region_is_empty_not_an_encode_failure() {
    let registry = PreviewRegistry::new();
    let mut s = session(&registry);
    s.complete_drag(CropRect::percent(f64::NAN, 0.0, 50.0, 50.0))
      .unwrap();
    assert!(matches!(s.apply(), Err(CropError::EmptyRegion { id: 1 })));
  }

  #[test]
  fn cancel_and_reload_release_previews() {
    let registry = PreviewRegistry::new();
    let mut s = session(&registry);
    s.load("other.png", &solid_png(10, 10, [0, 0, 0])).unwrap();
    assert_eq!(registry.live(), 1);

    assert!(matches!(s.load("bad.png", b"nope"), Err(CropError::Render(_))));
    assert!(s.is_editing());

    s.cancel();
    assert!(!s.is_editing());
    assert!(s.regions().is_empty());
    assert_eq!(registry.live(), 0);
    assert!(matches!(s.add_region(), Err(CropError::NotLoaded)));
  }
}
