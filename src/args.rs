// 该文件是 Shibie （识别） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use shibie::submit::SubmissionConfig;
use url::Url;

const DEFAULT_MODEL: &str = "tensorflow:///usr/share/shibie/tensorflow_inception_graph.pb?labels=/usr/share/shibie/imagenet_comp_graph_label_strings.txt&size=224&mean=117&std=1&input=input&output=output";
const DEFAULT_TARGET: &str = "http://192.168.50.100:8070/tunnel/192.168.50.100:45000/";

/// Shibie 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 分类模型
  /// 支持格式:
  /// - tensorflow:///path/graph.pb?labels=/path/labels.txt&size=224&mean=117&std=1&input=input&output=output
  /// - fixed://?cat_0.91=0.91&dog_0.04=0.04
  #[arg(long, value_name = "MODEL", default_value = DEFAULT_MODEL)]
  pub model: Url,

  /// 相机
  /// 支持格式:
  /// - 图片文件: image:///path/to/photo.jpg
  /// - V4L2: v4l:///dev/video0?width=640&height=480
  #[arg(long, value_name = "CAMERA")]
  pub camera: Url,

  /// 默认发送地址，每次确认时可修改
  #[arg(long, value_name = "URL", default_value = DEFAULT_TARGET)]
  pub target: Url,

  /// 发送失败后的重试次数
  #[arg(long, default_value_t = 0, value_name = "COUNT")]
  pub retries: u32,

  /// 重试间隔（毫秒）
  #[arg(long, default_value_t = 1000, value_name = "MILLIS")]
  pub retry_delay_ms: u64,

  /// 发送超时（秒），不指定时使用默认值
  #[arg(long, value_name = "SECONDS")]
  pub timeout_secs: Option<u64>,

  /// 不使用系统代理
  #[arg(long)]
  pub no_proxy: bool,

  /// 收到中断信号后强制退出前的等待时间（秒）
  #[arg(long, default_value_t = 10, value_name = "SECONDS")]
  pub interrupt_grace_secs: u64,
}

impl Args {
  pub fn submission_config(&self) -> SubmissionConfig {
    SubmissionConfig {
      retries: self.retries,
      retry_delay: Duration::from_millis(self.retry_delay_ms),
      timeout: self.timeout_secs.map(Duration::from_secs),
      proxy: !self.no_proxy,
    }
  }
}
