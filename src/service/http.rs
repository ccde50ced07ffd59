// 该文件是 Shanan （山南西风） 项目的一部分。
// src/service/http.rs - 检测服务 HTTP 传输
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

use std::{
  io,
  time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use super::ServiceError;

/// 任意状态码的响应；传输层失败已转换为 `ServiceError`
#[derive(Debug)]
pub(crate) struct HttpReply {
  pub status: u16,
  pub body: String,
}

impl HttpReply {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

pub(crate) struct HttpEndpoint {
  endpoint: String,
  timeout: Duration,
  agent: ureq::Agent,
}

impl HttpEndpoint {
  /// `scheme://host[:port][/path][?timeout=秒][&tls]` 转换为 HTTP(S) 地址
  pub fn from_url(url: &Url, default_path: &str, default_timeout: Duration) -> Result<Self, ServiceError> {
    let host = url
      .host_str()
      .filter(|h| !h.is_empty())
      .ok_or_else(|| ServiceError::InvalidUrl(format!("缺少主机名: {}", url)))?;
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    let path = match url.path() {
      "" | "/" => default_path,
      path => path,
    };

    let mut timeout = default_timeout;
    let mut tls = false;
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "timeout" => {
          timeout = v
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
            .ok_or_else(|| ServiceError::InvalidUrl(format!("无效的超时参数: {}", v)))?;
        }
        "tls" => tls = v != "false",
        _ => warn!("忽略未知的服务参数: {}={}", k, v),
      }
    }

    let endpoint = format!(
      "{}://{}{}{}",
      if tls { "https" } else { "http" },
      host,
      port,
      path
    );
    info!("检测服务地址: {} (超时 {:?})", endpoint, timeout);

    Ok(Self {
      endpoint,
      timeout,
      agent: ureq::AgentBuilder::new().timeout(timeout).build(),
    })
  }

  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }

  pub fn post_json(&self, body: &impl Serialize) -> Result<HttpReply, ServiceError> {
    let now = Instant::now();
    let reply = match self.agent.post(&self.endpoint).send_json(body) {
      Ok(response) => {
        let status = response.status();
        let body = response
          .into_string()
          .map_err(|e| self.io_error(&e))?;
        HttpReply { status, body }
      }
      Err(ureq::Error::Status(status, response)) => {
        // 错误响应体可能为空或不可读，此时仅保留状态码
        let body = response.into_string().unwrap_or_default();
        HttpReply { status, body }
      }
      Err(ureq::Error::Transport(transport)) => return Err(self.transport_error(&transport)),
    };
    debug!(
      "检测服务响应: HTTP {} ({} 字节)，耗时: {:.2?}",
      reply.status,
      reply.body.len(),
      now.elapsed()
    );
    Ok(reply)
  }

  fn transport_error(&self, transport: &ureq::Transport) -> ServiceError {
    let timed_out = std::error::Error::source(transport)
      .and_then(|source| source.downcast_ref::<io::Error>())
      .is_some_and(is_timeout);
    if timed_out {
      ServiceError::Timeout(self.timeout)
    } else {
      ServiceError::Unavailable(transport.to_string())
    }
  }

  fn io_error(&self, err: &io::Error) -> ServiceError {
    if is_timeout(err) {
      ServiceError::Timeout(self.timeout)
    } else {
      ServiceError::Unavailable(err.to_string())
    }
  }
}

fn is_timeout(err: &io::Error) -> bool {
  matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}
