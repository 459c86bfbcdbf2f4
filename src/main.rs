// 该文件是 Shibie （识别） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::sync::atomic::Ordering;
use std::{thread, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use shibie::{
  FromUrl,
  capture::CameraWrapper,
  model::ModelBuilderWrapper,
  prompt::TerminalPrompt,
  session::Session,
  submit::SubmissionClient,
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型: {}", args.model);
  info!("相机: {}", args.camera);
  info!("默认发送地址: {}", args.target);
  info!("重试次数: {}", args.retries);

  let builder = ModelBuilderWrapper::from_url(&args.model)?;
  let camera = CameraWrapper::from_url(&args.camera)?;
  let client = SubmissionClient::new(args.submission_config())?;

  let session = Session::start(
    builder,
    camera,
    TerminalPrompt::stdio(),
    client,
    args.target.clone(),
  )?;

  let interrupted = session.interrupt_flag();
  let grace = Duration::from_secs(args.interrupt_grace_secs);
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    interrupted.store(true, Ordering::SeqCst);
    thread::spawn(move || {
      thread::sleep(grace);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })
  .context("无法设置中断处理")?;

  let summary = session.run()?;

  info!(
    "拍照 {} 次，识别 {} 次，失败 {} 次，确认 {} 次，发送成功 {} 次，发送失败 {} 次",
    summary.captures,
    summary.recognized,
    summary.failed,
    summary.confirmed,
    summary.submitted,
    summary.submit_failed
  );

  Ok(())
}
