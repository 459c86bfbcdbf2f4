// 该文件是 Shibie （识别） 项目的一部分。
// src/event.rs - 投递给交互线程的事件
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

use url::Url;

use crate::{
  model::RecognitionList,
  submit::{SubmissionReport, SubmitError},
};

/// 拍照任务在推理队列中的序号
pub type Ticket = u64;

/// 后台线程投递给交互线程的事件，只投递不等待
#[derive(Debug)]
pub enum Event {
  /// 分类器初始化完成，可以开始拍照
  Ready { input_size: u32 },
  /// 分类器初始化失败，不可恢复
  InitFailed(anyhow::Error),
  Recognized {
    ticket: Ticket,
    recognitions: RecognitionList,
    picture: Vec<u8>,
  },
  RecognizeFailed {
    ticket: Ticket,
    error: anyhow::Error,
  },
  /// 分类器已关闭，推理线程即将退出
  Closed,
  Submitted {
    name: String,
    target: Url,
    result: Result<SubmissionReport, SubmitError>,
  },
}
