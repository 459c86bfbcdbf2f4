// 该文件是 Shibie （识别） 项目的一部分。
// src/bin/submit_image.rs - 直接发送图像和标签
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use shibie::{
  FromUrl,
  capture::{Camera, CameraWrapper},
  dialog::resolve_label,
  submit::{SubmissionClient, SubmissionConfig},
};
use tracing::info;

/// 不经过模型，把一张图像和给定标签发送到服务器
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 相机，通常是 image:///path/to/photo.jpg
  #[arg(long, value_name = "CAMERA")]
  pub camera: Url,
  /// 标签，可带置信度，如 cat_0.91
  #[arg(long, value_name = "LABEL")]
  pub label: String,
  /// 发送地址
  #[arg(long, value_name = "URL")]
  pub target: Url,
  /// 发送失败后的重试次数
  #[arg(long, default_value_t = 0, value_name = "COUNT")]
  pub retries: u32,
  /// 发送超时（秒）
  #[arg(long, value_name = "SECONDS")]
  pub timeout_secs: Option<u64>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let description = resolve_label(None, &args.label)?;
  info!("名称: {}，置信度: {}", description.name, description.confidence);

  let mut camera = CameraWrapper::from_url(&args.camera)?;
  camera.start()?;
  let picture = camera.capture_image()?;
  camera.stop()?;

  let client = SubmissionClient::new(SubmissionConfig {
    retries: args.retries,
    timeout: args.timeout_secs.map(Duration::from_secs),
    ..SubmissionConfig::default()
  })?;

  info!("发送 {} 字节到 {}", picture.len(), args.target);
  let report = client.submit(&args.target, &description, &picture)?;
  info!(
    "发送完成: {} (共 {} 次)，响应: {}",
    report.status, report.attempts, report.body
  );

  Ok(())
}
