// 该文件是 Shanan （山南西风） 项目的一部分。
// src/service/legacy.rs - 旧版 LLM 姿态分析协议
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

//! 旧版路径：由大模型直接返回每张照片的肩、髋、膝、踝四个关键点，坐标位于
//! 1920×1080 参考画面中，不带可见度。

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Detection, DetectionRequest, ReportedAngles, ServiceError};
use crate::{
  landmark::{LEGACY_REFERENCE_FRAME, LandmarkSet, Schema},
  render::data_uri_for,
};

pub const DEFAULT_PATH: &str = "/invoke";

const PROMPT: &str = "\
你是生物力学与物理治疗方面的专家。请分析两张侧面姿势照片：图片1为自然站立位，图片2为最大前屈位。
1. 在两张图片中分别标出肩关节中心(shoulder)、髋关节中心(hip)、膝关节中心(knee)、踝关节中心(ankle)的坐标 (x, y)，原点为图片左上角，无法识别的点返回 null。
2. 以髋关节为轴心，计算髋-肩连线与垂直线的夹角，记为 standing_trunk_angle 与 flexion_trunk_angle，并给出 rom_degrees = |flexion_trunk_angle - standing_trunk_angle|。
3. 给出 rom_assessment（正常、轻度受限、中度受限、重度受限），描述观察到的代偿动作(compensations)，并给出简短建议(recommendations)。
按指定的 JSON 结构返回全部结果。";

#[derive(Debug, Serialize)]
pub struct InvokeRequest {
  pub prompt: &'static str,
  pub file_urls: Vec<String>,
  pub response_json_schema: Value,
}

impl From<&DetectionRequest<'_>> for InvokeRequest {
  fn from(request: &DetectionRequest<'_>) -> Self {
    Self {
      prompt: PROMPT,
      file_urls: vec![data_uri_for(request.standing), data_uri_for(request.flexion)],
      response_json_schema: response_schema(),
    }
  }
}

fn response_schema() -> Value {
  let point = json!({
    "type": "object",
    "properties": {"x": {"type": "number"}, "y": {"type": "number"}}
  });
  let keypoints = json!({
    "type": "object",
    "properties": {
      "shoulder": point.clone(),
      "hip": point.clone(),
      "knee": point.clone(),
      "ankle": point
    }
  });
  json!({
    "type": "object",
    "properties": {
      "standing_trunk_angle": {"type": "number"},
      "flexion_trunk_angle": {"type": "number"},
      "rom_degrees": {"type": "number"},
      "rom_assessment": {"type": "string", "enum": ["正常", "轻度受限", "中度受限", "重度受限"]},
      "compensations": {"type": "string"},
      "recommendations": {"type": "string"},
      "standing_keypoints": keypoints.clone(),
      "flexion_keypoints": keypoints
    }
  })
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
  #[serde(default)]
  standing_trunk_angle: Option<f64>,
  #[serde(default)]
  flexion_trunk_angle: Option<f64>,
  #[serde(default)]
  rom_degrees: Option<f64>,
  #[serde(default)]
  rom_assessment: Option<String>,
  #[serde(default)]
  compensations: Option<String>,
  #[serde(default)]
  recommendations: Option<String>,
  #[serde(default)]
  standing_keypoints: Value,
  #[serde(default)]
  flexion_keypoints: Value,
}

pub fn parse_response(body: &str) -> Result<Detection, ServiceError> {
  let response: InvokeResponse =
    serde_json::from_str(body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
  let schema = Schema::Legacy(LEGACY_REFERENCE_FRAME);

  Ok(Detection {
    standing: LandmarkSet::from_json(schema, &response.standing_keypoints),
    flexion: LandmarkSet::from_json(schema, &response.flexion_keypoints),
    reported: ReportedAngles {
      standing_trunk: response.standing_trunk_angle,
      flexion_trunk: response.flexion_trunk_angle,
      rom_degrees: response.rom_degrees,
      rom_assessment: response.rom_assessment,
    },
    compensations: response.compensations,
    recommendations: response.recommendations,
  })
}

#[cfg(feature = "http_service")]
pub use self::client::LegacyLlmService;

#[cfg(feature = "http_service")]
mod client {
  use std::time::Duration;

  use tracing::info;
  use url::Url;

  use super::{DEFAULT_PATH, InvokeRequest, parse_response};
  use crate::{
    FromUrl, FromUrlWithScheme,
    service::{
      DEFAULT_TIMEOUT, Detection, DetectionRequest, PoseService, ServiceError, http::HttpEndpoint,
    },
  };

  pub struct LegacyLlmService {
    endpoint: HttpEndpoint,
  }

  impl FromUrlWithScheme for LegacyLlmService {
    const SCHEME: &'static str = "llm";
  }

  impl FromUrl for LegacyLlmService {
    type Error = ServiceError;

    fn from_url(url: &Url) -> Result<Self, Self::Error> {
      Self::with_default_timeout(url, DEFAULT_TIMEOUT)
    }
  }

  impl LegacyLlmService {
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

  impl PoseService for LegacyLlmService {
    fn detect(&self, request: &DetectionRequest<'_>) -> Result<Detection, ServiceError> {
      info!(
        "请求 LLM 姿态分析: {} (超时 {:?})",
        self.endpoint.endpoint(),
        self.endpoint.timeout()
      );
      let reply = self.endpoint.post_json(&InvokeRequest::from(request))?;
      if !reply.is_success() {
        return Err(ServiceError::Status(reply.status));
      }
      parse_response(&reply.body)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::landmark::LegacyJoint;

  #[test]
  fn keypoints_land_in_reference_frame() {
    let body = json!({
      "standing_trunk_angle": 5.0,
      "flexion_trunk_angle": 65.0,
      "rom_degrees": 60.0,
      "rom_assessment": "正常",
      "compensations": "腰椎代偿",
      "standing_keypoints": {
        "shoulder": {"x": 960, "y": 300},
        "hip": {"x": 955, "y": 600},
        "knee": null,
        "ankle": {"x": 950, "y": 1000}
      },
      "flexion_keypoints": {"shoulder": {"x": 1300, "y": 500}, "hip": {"x": 960, "y": 620}}
    })
    .to_string();

    let detection = parse_response(&body).unwrap();
    assert_eq!(detection.standing.schema(), Schema::Legacy(LEGACY_REFERENCE_FRAME));
    assert_eq!(detection.standing.len(), 3);
    assert!(detection.standing.get(LegacyJoint::Knee).is_none());
    let hip = detection.standing.get(LegacyJoint::Hip).unwrap();
    assert_eq!((hip.x, hip.y, hip.visibility), (955.0, 600.0, None));
    assert_eq!(detection.flexion.len(), 2);
    assert_eq!(detection.reported.rom_degrees, Some(60.0));
    assert_eq!(detection.recommendations, None);
  }

  #[test]
  fn missing_keypoints_are_empty_not_errors() {
    let detection = parse_response("{}").unwrap();
    assert!(detection.standing.is_empty());
    assert!(detection.flexion.is_empty());
    assert!(matches!(
      parse_response("\"done\""),
      Err(ServiceError::InvalidResponse(_))
    ));
  }

  #[test]
  fn request_lists_both_photos() {
    let request = DetectionRequest::new(b"\xff\xd8\xffa", b"\xff\xd8\xffb");
    let body = serde_json::to_value(InvokeRequest::from(&request)).unwrap();
    assert_eq!(body["file_urls"].as_array().unwrap().len(), 2);
    assert!(body["response_json_schema"]["properties"]["standing_keypoints"].is_object());
  }
}
