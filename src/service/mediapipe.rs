// 该文件是 Shanan （山南西风） 项目的一部分。
// src/service/mediapipe.rs - MediaPipe 姿态服务协议
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

//! 33 点全身模型服务。请求以 data URI 携带两张照片，响应中的关键点为
//! 归一化坐标并带可见度。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Detection, DetectionRequest, ReportedAngles, ServiceError};
use crate::{
  landmark::{LandmarkSet, Schema},
  render::data_uri_for,
};

pub const DEFAULT_PATH: &str = "/pose/analyze-static";

#[derive(Debug, Serialize)]
pub struct AnalyzeRequest {
  pub standing_image: String,
  pub flexion_image: String,
  pub calculate_rom: bool,
  pub detect_compensations: bool,
}

impl From<&DetectionRequest<'_>> for AnalyzeRequest {
  fn from(request: &DetectionRequest<'_>) -> Self {
    Self {
      standing_image: data_uri_for(request.standing),
      flexion_image: data_uri_for(request.flexion),
      calculate_rom: request.calculate_rom,
      detect_compensations: request.detect_compensations,
    }
  }
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
  success: bool,
  #[serde(default)]
  error: Option<String>,
  #[serde(default)]
  standing_analysis: Option<CaptureAnalysis>,
  #[serde(default)]
  flexion_analysis: Option<CaptureAnalysis>,
  #[serde(default)]
  rom_analysis: Option<RomAnalysis>,
}

#[derive(Debug, Deserialize)]
struct CaptureAnalysis {
  #[serde(default)]
  landmarks: Value,
  #[serde(default)]
  trunk_angle: Option<f64>,
  #[serde(default)]
  image_info: Option<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
  width: Option<u32>,
  height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RomAnalysis {
  #[serde(default)]
  rom_degrees: Option<f64>,
  #[serde(default)]
  rom_assessment: Option<String>,
  #[serde(default)]
  compensations: Option<String>,
  #[serde(default)]
  recommendations: Option<String>,
}

/// 解析服务响应。`success: false` 视为服务拒绝，而不是空结果。
pub fn parse_response(body: &str) -> Result<Detection, ServiceError> {
  let response: AnalyzeResponse =
    serde_json::from_str(body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

  if !response.success {
    return Err(ServiceError::Rejected(
      response.error.unwrap_or_else(|| "未知错误".to_string()),
    ));
  }

  let (Some(standing), Some(flexion)) = (response.standing_analysis, response.flexion_analysis)
  else {
    return Err(ServiceError::InvalidResponse(
      "缺少 standing_analysis 或 flexion_analysis".to_string(),
    ));
  };

  for (label, capture) in [("站立位", &standing), ("前屈位", &flexion)] {
    if let Some(ImageInfo {
      width: Some(w),
      height: Some(h),
    }) = &capture.image_info
    {
      debug!("服务端{}图像尺寸: {}x{}", label, w, h);
    }
  }

  let rom = response.rom_analysis.unwrap_or_default();

  Ok(Detection {
    standing: LandmarkSet::from_json(Schema::Full, &standing.landmarks),
    flexion: LandmarkSet::from_json(Schema::Full, &flexion.landmarks),
    reported: ReportedAngles {
      standing_trunk: standing.trunk_angle,
      flexion_trunk: flexion.trunk_angle,
      rom_degrees: rom.rom_degrees,
      rom_assessment: rom.rom_assessment,
    },
    compensations: rom.compensations,
    recommendations: rom.recommendations,
  })
}

/// 非 2xx 响应：若响应体为 `success: false` 则保留服务给出的原因
#[cfg_attr(not(feature = "http_service"), allow(dead_code))]
fn status_error(status: u16, body: &str) -> ServiceError {
  match parse_response(body) {
    Err(rejected @ ServiceError::Rejected(_)) => rejected,
    _ => ServiceError::Status(status),
  }
}

#[cfg(feature = "http_service")]
pub use self::client::MediaPipeService;

#[cfg(feature = "http_service")]
mod client {
  use std::time::Duration;

  use tracing::info;
  use url::Url;

  use super::{AnalyzeRequest, DEFAULT_PATH, parse_response, status_error};
  use crate::{
    FromUrl, FromUrlWithScheme,
    service::{
      DEFAULT_TIMEOUT, Detection, DetectionRequest, PoseService, ServiceError, http::HttpEndpoint,
    },
  };

  pub struct MediaPipeService {
    endpoint: HttpEndpoint,
  }

  impl FromUrlWithScheme for MediaPipeService {
    const SCHEME: &'static str = "mediapipe";
  }

  impl FromUrl for MediaPipeService {
    type Error = ServiceError;

    fn from_url(url: &Url) -> Result<Self, Self::Error> {
      Self::with_default_timeout(url, DEFAULT_TIMEOUT)
    }
  }

  impl MediaPipeService {
    pub fn with_default_timeout(url: &Url, timeout: Duration) -> Result<Self, ServiceError> {
      if url.scheme() != Self::SCHEME {
        return Err(ServiceError::SchemeMismatch(format!(
          "期望服务方案 '{}', 实际服务方案 '{}'",
          Self::SCHEME,
          url.scheme()
        )));
      }
      Ok(Self {
        endpoint: HttpEndpoint::from_url(url, DEFAULT_PATH, timeout)?,
      })
    }
  }

  impl PoseService for MediaPipeService {
    fn detect(&self, request: &DetectionRequest<'_>) -> Result<Detection, ServiceError> {
      info!(
        "请求 MediaPipe 姿态分析: {} (超时 {:?})",
        self.endpoint.endpoint(),
        self.endpoint.timeout()
      );
      let reply = self.endpoint.post_json(&AnalyzeRequest::from(request))?;
      if !reply.is_success() {
        return Err(status_error(reply.status, &reply.body));
      }
      parse_response(&reply.body)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::landmark::FullJoint;
  use serde_json::json;

  fn landmarks(visibility: f64) -> Value {
    Value::Array(
      (0..33)
        .map(|i| json!({"x": 0.3 + i as f64 * 0.01, "y": 0.5, "z": -0.1, "visibility": visibility}))
        .collect(),
    )
  }

  #[test]
  fn full_response_is_parsed() {
    let body = json!({
      "success": true,
      "standing_analysis": {
        "landmarks": landmarks(0.98),
        "trunk_angle": 2.5,
        "pelvic_tilt": -1.2,
        "knee_angle": 178.5,
        "image_info": {"width": 1080, "height": 1920}
      },
      "flexion_analysis": {"landmarks": landmarks(0.4), "trunk_angle": 85.3},
      "rom_analysis": {
        "rom_degrees": 82.8,
        "rom_assessment": "正常",
        "compensations": "无明显代偿动作",
        "recommendations": "活动范围正常，继续保持"
      }
    })
    .to_string();

    let detection = parse_response(&body).unwrap();
    assert_eq!(detection.standing.len(), 33);
    assert_eq!(detection.standing.usable().count(), 33);
    assert_eq!(detection.flexion.usable().count(), 0);
    let hip = detection.standing.get(FullJoint::LeftHip).unwrap();
    assert!((hip.x - 0.53).abs() < 1e-9);
    assert_eq!(detection.reported.flexion_trunk, Some(85.3));
    assert_eq!(detection.reported.rom_assessment.as_deref(), Some("正常"));
    assert_eq!(detection.compensations.as_deref(), Some("无明显代偿动作"));
  }

  #[test]
  fn unsuccessful_response_is_rejected() {
    let body = json!({"success": false, "error": "No pose detected in image"}).to_string();
    assert_eq!(
      parse_response(&body),
      Err(ServiceError::Rejected("No pose detected in image".into()))
    );
    assert_eq!(
      status_error(400, &body),
      ServiceError::Rejected("No pose detected in image".into())
    );
    assert_eq!(status_error(502, "<html>"), ServiceError::Status(502));
  }

  #[test]
  fn malformed_bodies_are_invalid() {
    assert!(matches!(
      parse_response("not json"),
      Err(ServiceError::InvalidResponse(_))
    ));
    assert!(matches!(
      parse_response(r#"{"success": true}"#),
      Err(ServiceError::InvalidResponse(_))
    ));
  }

  #[test]
  fn missing_landmarks_yield_empty_sets() {
    let body = json!({
      "success": true,
      "standing_analysis": {},
      "flexion_analysis": {"landmarks": "garbage"}
    })
    .to_string();
    let detection = parse_response(&body).unwrap();
    assert!(detection.standing.is_empty());
    assert!(detection.flexion.is_empty());
    assert_eq!(detection.compensations, None);
  }

  #[test]
  fn request_carries_data_uris() {
    let standing = crate::render::tests::solid_png(4, 4, [1, 1, 1]);
    let request = DetectionRequest::new(&standing, b"\xff\xd8\xff");
    let body = serde_json::to_value(AnalyzeRequest::from(&request)).unwrap();
    assert!(
      body["standing_image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,")
    );
    assert!(
      body["flexion_image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,")
    );
    assert_eq!(body["calculate_rom"], json!(true));
    assert_eq!(body["detect_compensations"], json!(true));
  }
}
