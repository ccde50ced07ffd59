// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - TOML 配置
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

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
  analysis::{ClassifyError, RomClassifier, RomThresholds},
  render::{OverlayStyle, SkeletonRenderer},
  service::DEFAULT_TIMEOUT,
};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("读取配置文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("解析配置文件失败: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("分级阈值无效: {0}")]
  Thresholds(#[from] ClassifyError),
  #[error("服务超时必须为正数秒: {0}")]
  Timeout(f64),
}

/// 所有字段均有默认值，空文件即默认配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub classifier: RomThresholds,
  #[serde(default)]
  pub render: OverlayStyle,
  #[serde(default)]
  pub service: ServiceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// 服务 URL 未指定 `timeout` 时的请求超时（秒）
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: f64,
}

fn default_timeout_secs() -> f64 {
  DEFAULT_TIMEOUT.as_secs_f64()
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl ServiceConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    match Duration::try_from_secs_f64(self.timeout_secs) {
      Ok(d) if !d.is_zero() => Ok(()),
      _ => Err(ConfigError::Timeout(self.timeout_secs)),
    }
  }

  /// 未经校验的取值回退到默认超时
  pub fn timeout(&self) -> Duration {
    Duration::try_from_secs_f64(self.timeout_secs)
      .ok()
      .filter(|d| !d.is_zero())
      .unwrap_or(DEFAULT_TIMEOUT)
  }
}

impl Config {
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let content = fs::read_to_string(&path)?;
    let config = Self::parse(&content)?;
    info!("载入配置文件: {}", path.as_ref().display());
    Ok(config)
  }

  pub fn parse(content: &str) -> Result<Self, ConfigError> {
    let config: Config = toml::from_str(content)?;
    config.classifier.validate()?;
    config.service.validate()?;
    Ok(config)
  }

  pub fn classifier(&self) -> Result<RomClassifier, ConfigError> {
    Ok(RomClassifier::new(self.classifier)?)
  }

  pub fn renderer(&self) -> SkeletonRenderer {
    SkeletonRenderer::new(self.render)
  }
}
