// 该文件是 Shanan （山南西风） 项目的一部分。
// src/service.rs - 姿态检测服务接口
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

use std::time::Duration;

use thiserror::Error;

use crate::landmark::LandmarkSet;

pub mod legacy;
pub mod mediapipe;

#[cfg(feature = "http_service")]
mod http;

#[cfg(feature = "http_service")]
pub use self::{legacy::LegacyLlmService, mediapipe::MediaPipeService};

/// 未在 URL 中指定时的请求超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
  #[error("检测服务不可用: {0}")]
  Unavailable(String),
  #[error("检测服务超时 ({0:?})")]
  Timeout(Duration),
  #[error("检测服务返回异常状态码: {0}")]
  Status(u16),
  #[error("检测服务拒绝请求: {0}")]
  Rejected(String),
  #[error("检测服务响应格式无效: {0}")]
  InvalidResponse(String),
  #[error("检测服务地址无效: {0}")]
  InvalidUrl(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl ServiceError {
  /// 网络类失败可以重试，服务明确拒绝或响应无效则不能
  pub fn is_retryable(&self) -> bool {
    match self {
      ServiceError::Unavailable(_) | ServiceError::Timeout(_) => true,
      ServiceError::Status(code) => *code >= 500,
      _ => false,
    }
  }
}

/// 一次检测请求：站立位与前屈位两张原始照片
#[derive(Debug, Clone, Copy)]
pub struct DetectionRequest<'a> {
  pub standing: &'a [u8],
  pub flexion: &'a [u8],
  pub calculate_rom: bool,
  pub detect_compensations: bool,
}

impl<'a> DetectionRequest<'a> {
  pub fn new(standing: &'a [u8], flexion: &'a [u8]) -> Self {
    Self {
      standing,
      flexion,
      calculate_rom: true,
      detect_compensations: true,
    }
  }
}

/// 服务自行报告的角度，仅用于日志比对，结果始终由本地关键点重新计算
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportedAngles {
  pub standing_trunk: Option<f64>,
  pub flexion_trunk: Option<f64>,
  pub rom_degrees: Option<f64>,
  pub rom_assessment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub standing: LandmarkSet,
  pub flexion: LandmarkSet,
  pub reported: ReportedAngles,
  pub compensations: Option<String>,
  pub recommendations: Option<String>,
}

pub trait PoseService {
  fn detect(&self, request: &DetectionRequest<'_>) -> Result<Detection, ServiceError>;
}

impl<T: PoseService + ?Sized> PoseService for &T {
  fn detect(&self, request: &DetectionRequest<'_>) -> Result<Detection, ServiceError> {
    (**self).detect(request)
  }
}

impl<T: PoseService + ?Sized> PoseService for Box<T> {
  fn detect(&self, request: &DetectionRequest<'_>) -> Result<Detection, ServiceError> {
    (**self).detect(request)
  }
}

#[cfg(feature = "http_service")]
pub use self::wrapper::ServiceWrapper;

#[cfg(feature = "http_service")]
mod wrapper {
  use std::time::Duration;

  use url::Url;

  use super::{
    DEFAULT_TIMEOUT, Detection, DetectionRequest, LegacyLlmService, MediaPipeService, PoseService,
    ServiceError,
  };
  use crate::{FromUrl, FromUrlWithScheme};

  /// 按 URL 方案选择的检测服务
  pub enum ServiceWrapper {
    MediaPipe(MediaPipeService),
    Llm(LegacyLlmService),
  }

  impl ServiceWrapper {
    /// URL 未携带 `timeout` 参数时使用给定的超时
    pub fn with_default_timeout(url: &Url, timeout: Duration) -> Result<Self, ServiceError> {
      match url.scheme() {
        MediaPipeService::SCHEME => Ok(ServiceWrapper::MediaPipe(
          MediaPipeService::with_default_timeout(url, timeout)?,
        )),
        LegacyLlmService::SCHEME => Ok(ServiceWrapper::Llm(
          LegacyLlmService::with_default_timeout(url, timeout)?,
        )),
        other => Err(ServiceError::SchemeMismatch(format!(
          "不支持的检测服务方案 '{}'",
          other
        ))),
      }
    }
  }

  impl FromUrl for ServiceWrapper {
    type Error = ServiceError;

    fn from_url(url: &Url) -> Result<Self, Self::Error> {
      Self::with_default_timeout(url, DEFAULT_TIMEOUT)
    }
  }

  impl PoseService for ServiceWrapper {
    fn detect(&self, request: &DetectionRequest<'_>) -> Result<Detection, ServiceError> {
      match self {
        ServiceWrapper::MediaPipe(service) => service.detect(request),
        ServiceWrapper::Llm(service) => service.detect(request),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn network_failures_are_retryable() {
    assert!(ServiceError::Unavailable("connection refused".into()).is_retryable());
    assert!(ServiceError::Timeout(DEFAULT_TIMEOUT).is_retryable());
    assert!(ServiceError::Status(503).is_retryable());
    assert!(!ServiceError::Status(400).is_retryable());
    assert!(!ServiceError::Rejected("No pose detected".into()).is_retryable());
    assert!(!ServiceError::InvalidResponse("eof".into()).is_retryable());
  }

  #[cfg(feature = "http_service")]
  #[test]
  fn wrapper_dispatches_on_scheme() {
    use crate::FromUrl;
    use url::Url;

    let url = Url::parse("mediapipe://localhost:5002/pose/analyze-static").unwrap();
    assert!(matches!(
      ServiceWrapper::from_url(&url),
      Ok(ServiceWrapper::MediaPipe(_))
    ));
    let url = Url::parse("llm://localhost:8080/invoke?timeout=5").unwrap();
    assert!(matches!(ServiceWrapper::from_url(&url), Ok(ServiceWrapper::Llm(_))));
    let url = Url::parse("ftp://localhost/").unwrap();
    assert!(matches!(
      ServiceWrapper::from_url(&url),
      Err(ServiceError::SchemeMismatch(_))
    ));
  }
}
