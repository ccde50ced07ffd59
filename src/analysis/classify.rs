// 该文件是 Shanan （山南西风） 项目的一部分。
// src/analysis/classify.rs - ROM 分级
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

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
  #[error("ROM 分级阈值必须为非负且严格递增: {normal_max} < {mild_max} < {moderate_max}")]
  UnorderedThresholds {
    normal_max: f64,
    mild_max: f64,
    moderate_max: f64,
  },
}

/// 四级有序严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RomBand {
  Normal,
  MildlyLimited,
  ModeratelyLimited,
  SeverelyLimited,
}

impl RomBand {
  pub fn ordinal(&self) -> u8 {
    *self as u8
  }

  pub fn label(&self) -> &'static str {
    match self {
      RomBand::Normal => "正常",
      RomBand::MildlyLimited => "轻度受限",
      RomBand::ModeratelyLimited => "中度受限",
      RomBand::SeverelyLimited => "重度受限",
    }
  }
}

impl fmt::Display for RomBand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// 各级的闭区间上界（度），边界值归入较轻的一级
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RomThresholds {
  pub normal_max: f64,
  pub mild_max: f64,
  pub moderate_max: f64,
}

impl Default for RomThresholds {
  fn default() -> Self {
    Self {
      normal_max: 20.0,
      mild_max: 35.0,
      moderate_max: 50.0,
    }
  }
}

impl RomThresholds {
  pub fn validate(&self) -> Result<(), ClassifyError> {
    let ordered = [self.normal_max, self.mild_max, self.moderate_max]
      .iter()
      .all(|v| v.is_finite())
      && 0.0 <= self.normal_max
      && self.normal_max < self.mild_max
      && self.mild_max < self.moderate_max;
    if !ordered {
      return Err(ClassifyError::UnorderedThresholds {
        normal_max: self.normal_max,
        mild_max: self.mild_max,
        moderate_max: self.moderate_max,
      });
    }
    Ok(())
  }
}

/// 分级结果，代偿与建议文本来自外部服务，此处只做透传
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RomAssessment {
  pub band: RomBand,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub compensations: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub recommendations: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RomClassifier {
  thresholds: RomThresholds,
}

impl RomClassifier {
  pub fn new(thresholds: RomThresholds) -> Result<Self, ClassifyError> {
    thresholds.validate()?;
    Ok(Self { thresholds })
  }

  pub fn thresholds(&self) -> &RomThresholds {
    &self.thresholds
  }

  pub fn band(&self, rom_degrees: f64) -> RomBand {
    let t = &self.thresholds;
    if rom_degrees <= t.normal_max {
      RomBand::Normal
    } else if rom_degrees <= t.mild_max {
      RomBand::MildlyLimited
    } else if rom_degrees <= t.moderate_max {
      RomBand::ModeratelyLimited
    } else {
      RomBand::SeverelyLimited
    }
  }

  pub fn classify(
    &self,
    rom_degrees: f64,
    compensations: Option<String>,
    recommendations: Option<String>,
  ) -> RomAssessment {
    let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
    RomAssessment {
      band: self.band(rom_degrees),
      compensations: non_empty(compensations),
      recommendations: non_empty(recommendations),
    }
  }
}
