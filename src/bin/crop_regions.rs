// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/crop_regions.rs - 按百分比区域裁剪照片
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

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;
use url::Url;

use shanan_rom::{
  FromUrl,
  crop::{CropRect, CropSession, MAX_REGIONS},
  input::InputWrapper,
  output::{OutputWrapper, Render},
  preview::PreviewRegistry,
};

/// 多区域裁剪参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 待裁剪照片，如 image:///data/report.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 裁剪区域（百分比）x,y,宽,高，可重复，最多两个；省略时使用默认区域
  #[arg(long, value_name = "X,Y,W,H", value_parser = parse_rect)]
  pub region: Vec<CropRect>,
  /// 输出位置，image:///out/ 下的文件名或 folder:///records
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

fn parse_rect(value: &str) -> Result<CropRect, String> {
  let parts = value
    .split(',')
    .map(|p| p.trim().parse::<f64>())
    .collect::<Result<Vec<_>, _>>()
    .map_err(|e| format!("无效的数值: {}", e))?;
  match parts.as_slice() {
    &[x, y, w, h] if w > 0.0 && h > 0.0 => Ok(CropRect::percent(x, y, w, h)),
    &[_, _, _, _] => Err("宽和高必须为正数".to_string()),
    _ => Err("需要四个数值: x,y,宽,高".to_string()),
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  if args.region.len() > MAX_REGIONS {
    bail!("最多只能指定 {} 个裁剪区域", MAX_REGIONS);
  }

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let source = InputWrapper::from_url(&args.input)?.into_source();
  let output = OutputWrapper::from_url(&args.output)?;

  let registry = PreviewRegistry::new();
  let mut session = CropSession::new(registry.clone());
  session.load(source.name(), source.bytes())?;

  if args.region.is_empty()
    && let Some(region) = session.regions().first().copied()
  {
    session.complete_drag(region.rect)?;
  }
  for (i, rect) in args.region.iter().enumerate() {
    if i > 0 {
      session.add_region()?;
    }
    session.complete_drag(*rect)?;
  }

  let crops = session.apply()?;
  output.render_result(crops.as_slice())?;
  info!("共保存 {} 张裁剪图像", crops.len());

  Ok(())
}
