// 该文件是 Shibie （识别） 项目的一部分。
// src/bin/oneshot.rs - 单张图像识别
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use shibie::{
  FromUrl,
  capture::{Camera, CameraWrapper, decode_and_resize},
  model::{Classifier, ClassifierBuilder, ModelBuilderWrapper},
};
use tracing::info;

/// 拍一张照片并输出识别结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类模型
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 相机
  #[arg(long, value_name = "CAMERA")]
  pub camera: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型: {}", args.model);
  info!("相机: {}", args.camera);

  let classifier = ModelBuilderWrapper::from_url(&args.model)?.build()?;
  let mut camera = CameraWrapper::from_url(&args.camera)?;

  camera.start()?;
  let picture = camera.capture_image()?;
  camera.stop()?;
  info!("拍照完成: {} 字节", picture.len());

  info!("开始推理...");
  let now = std::time::Instant::now();
  let frame = decode_and_resize(&picture, classifier.input_size())?;
  let result = classifier.recognize_image(&frame)?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  for (index, item) in result.iter().enumerate() {
    println!("{}. {} ({:.2}%)", index, item.label, item.confidence * 100.0);
  }

  classifier.close()?;
  Ok(())
}
