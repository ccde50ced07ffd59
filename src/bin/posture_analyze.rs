// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/posture_analyze.rs - 站立位/前屈位姿态分析
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

use std::{path::PathBuf, thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use url::Url;

use shanan_rom::{
  FromUrl,
  config::Config,
  input::InputWrapper,
  output::{OutputWrapper, Render},
  preview::PreviewRegistry,
  service::ServiceWrapper,
  task::{Analyzer, CancelToken, PhotoPair},
};

/// 前屈活动范围分析参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 站立位照片，如 image:///data/standing.jpg
  #[arg(long, value_name = "SOURCE")]
  pub standing: Url,
  /// 前屈位照片
  #[arg(long, value_name = "SOURCE")]
  pub flexion: Url,
  /// 姿态检测服务
  /// - mediapipe://host:port/pose/analyze-static?timeout=30
  /// - llm://host:port/invoke
  #[arg(long, value_name = "SERVICE")]
  pub service: Url,
  /// 输出位置，image:///out/result.png 或 folder:///records
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// TOML 配置文件
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("站立位照片: {}", args.standing);
  info!("前屈位照片: {}", args.flexion);
  info!("检测服务: {}", args.service);
  info!("输出路径: {}", args.output);

  let config = match &args.config {
    Some(path) => Config::load(path)?,
    None => Config::default(),
  };

  let standing = InputWrapper::from_url(&args.standing)?.into_source();
  let flexion = InputWrapper::from_url(&args.flexion)?.into_source();
  let service = ServiceWrapper::with_default_timeout(&args.service, config.service.timeout())?;
  let output = OutputWrapper::from_url(&args.output)?;

  let cancel = CancelToken::new();
  {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，放弃本次分析...");
      cancel.cancel();
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
  }

  let registry = PreviewRegistry::new();
  let analyzer = Analyzer::new(service)
    .with_classifier(config.classifier()?)
    .with_renderer(config.renderer())
    .with_cancel_token(cancel);

  let now = std::time::Instant::now();
  let result = match analyzer.run(PhotoPair::new(standing, flexion, &registry)) {
    Ok(result) => result,
    Err(err) => {
      if err.is_retryable() {
        error!("分析失败（可重试）: {}", err);
      } else {
        error!("分析失败: {}", err);
      }
      return Err(err.into());
    }
  };
  info!("分析完成，耗时: {:.2?}", now.elapsed());

  output.render_result(&result)?;
  info!(
    "ROM: {:.2}° ({})",
    result.rom_degrees, result.rom_assessment
  );

  Ok(())
}
