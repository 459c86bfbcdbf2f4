// 该文件是 Shibie （识别） 项目的一部分。
// src/session.rs - 拍照、识别、确认、发送的交互流程
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

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use tracing::{error, info, warn};
use url::Url;

use crate::{
  capture::Camera,
  dialog::SelectionDialog,
  event::{Event, Ticket},
  executor::InferenceExecutor,
  model::{ClassifierBuilder, RecognitionList},
  prompt::{Action, DialogButton, Prompt},
  submit::{SubmissionClient, SubmissionReport, SubmitError},
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionSummary {
  pub captures: usize,
  pub recognized: usize,
  pub failed: usize,
  pub confirmed: usize,
  pub submitted: usize,
  pub submit_failed: usize,
}

/// 交互线程上的主循环
///
/// 推理在 [`InferenceExecutor`] 的线程上进行，发送在各自的线程上进行，
/// 它们的结果都以 [`Event`] 的形式投递回来。
pub struct Session<C, P> {
  camera: C,
  prompt: P,
  executor: InferenceExecutor,
  sender: Sender<Event>,
  events: Receiver<Event>,
  client: SubmissionClient,
  default_target: Url,
  interrupted: Arc<AtomicBool>,
  pending: Vec<JoinHandle<()>>,
  summary: SessionSummary,
}

/// 丢弃已经结束的发送线程
fn reap_finished(pending: &mut Vec<JoinHandle<()>>) {
  pending.retain(|handle| !handle.is_finished());
}

fn report_submission<P: Prompt>(
  prompt: &mut P,
  summary: &mut SessionSummary,
  name: &str,
  target: &Url,
  result: Result<SubmissionReport, SubmitError>,
) -> anyhow::Result<()> {
  match result {
    Ok(report) => {
      summary.submitted += 1;
      prompt.notify(&format!(
        "\"{}\" 已发送到 {} ({})",
        name, target, report.status
      ))?;
    }
    Err(e) => {
      summary.submit_failed += 1;
      prompt.notify(&format!("\"{}\" 发送到 {} 失败: {}", name, target, e))?;
    }
  }
  Ok(())
}

impl<C: Camera, P: Prompt> Session<C, P> {
  /// 启动推理线程并开始初始化分类器
  pub fn start<B>(
    builder: B,
    camera: C,
    prompt: P,
    client: SubmissionClient,
    default_target: Url,
  ) -> anyhow::Result<Self>
  where
    B: ClassifierBuilder + Send + 'static,
  {
    let (sender, events) = mpsc::channel();
    let executor = InferenceExecutor::spawn(builder, sender.clone())?;
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut prompt = prompt;
    prompt.watch_interrupt(interrupted.clone());
    Ok(Self {
      camera,
      prompt,
      executor,
      sender,
      events,
      client,
      default_target,
      interrupted,
      pending: Vec::new(),
      summary: SessionSummary::default(),
    })
  }

  /// 置位后会话结束，正在等待的用户输入也随之结束
  pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
    self.interrupted.clone()
  }

  fn is_interrupted(&self) -> bool {
    self.interrupted.load(Ordering::SeqCst)
  }

  /// 运行到用户退出或收到中断信号
  ///
  /// 无论循环是否出错，都会停止相机、关闭分类器并等待已确认的发送完成，
  /// 出错时返回循环中的错误。
  pub fn run(mut self) -> anyhow::Result<SessionSummary> {
    let outcome = self.serve();
    let finished = self.finish();
    match outcome {
      Ok(()) => finished,
      Err(error) => {
        if let Err(e) = finished {
          warn!("清理会话失败: {:#}", e);
        }
        Err(error)
      }
    }
  }

  fn serve(&mut self) -> anyhow::Result<()> {
    self.wait_ready()?;
    self.camera.start().context("无法启动相机")?;

    loop {
      self.drain_submissions()?;
      if self.is_interrupted() {
        warn!("收到中断信号，结束会话");
        break;
      }
      match self.prompt.next_action()? {
        Action::Quit => break,
        Action::Capture if self.is_interrupted() => {
          warn!("收到中断信号，放弃本次拍照");
          break;
        }
        Action::Capture => self.capture()?,
      }
    }
    Ok(())
  }

  /// 取下一个事件，推理线程意外退出时报错
  fn next_event(&mut self) -> anyhow::Result<Event> {
    loop {
      match self.events.recv_timeout(POLL_INTERVAL) {
        Ok(event) => return Ok(event),
        Err(RecvTimeoutError::Timeout) if self.executor.is_finished() => {
          // 线程退出前投递的事件可能刚刚到达
          return self
            .events
            .try_recv()
            .map_err(|_| anyhow!("推理线程意外退出"));
        }
        Err(RecvTimeoutError::Timeout) => continue,
        Err(RecvTimeoutError::Disconnected) => bail!("事件通道已断开"),
      }
    }
  }

  fn wait_ready(&mut self) -> anyhow::Result<()> {
    info!("等待分类器初始化...");
    loop {
      match self.next_event()? {
        Event::Ready { input_size } => {
          info!("分类器就绪，输入尺寸 {}x{}", input_size, input_size);
          self.prompt.notify("分类器已就绪，可以拍照")?;
          return Ok(());
        }
        Event::InitFailed(error) => {
          error!("分类器初始化失败: {:#}", error);
          return Err(error);
        }
        other => warn!("初始化期间收到意外事件: {:?}", other),
      }
    }
  }

  fn drain_submissions(&mut self) -> anyhow::Result<()> {
    reap_finished(&mut self.pending);
    while let Ok(event) = self.events.try_recv() {
      self.handle_background(event)?;
    }
    Ok(())
  }

  fn handle_background(&mut self, event: Event) -> anyhow::Result<()> {
    match event {
      Event::Submitted {
        name,
        target,
        result,
      } => report_submission(&mut self.prompt, &mut self.summary, &name, &target, result),
      other => {
        warn!("忽略事件: {:?}", other);
        Ok(())
      }
    }
  }

  fn capture(&mut self) -> anyhow::Result<()> {
    let picture = match self.camera.capture_image() {
      Ok(picture) => picture,
      Err(e) => {
        error!("拍照失败: {}", e);
        self.summary.failed += 1;
        self.prompt.notify(&format!("拍照失败: {}", e))?;
        return Ok(());
      }
    };
    self.summary.captures += 1;
    info!("拍照完成: {} 字节", picture.len());

    let ticket = self.executor.classify(picture)?;
    self.prompt.notify("正在识别...")?;
    self.wait_result(ticket)
  }

  fn wait_result(&mut self, ticket: Ticket) -> anyhow::Result<()> {
    loop {
      match self.next_event()? {
        Event::Recognized {
          ticket: done,
          recognitions,
          picture,
        } if done == ticket => return self.present(recognitions, picture),
        Event::RecognizeFailed {
          ticket: done,
          error,
        } if done == ticket => {
          self.summary.failed += 1;
          self.prompt.notify(&format!("识别失败: {:#}", error))?;
          return Ok(());
        }
        Event::Closed => bail!("分类器已关闭"),
        other => self.handle_background(other)?,
      }
    }
  }

  fn present(&mut self, recognitions: RecognitionList, picture: Vec<u8>) -> anyhow::Result<()> {
    self.summary.recognized += 1;
    self.prompt.notify(&format!("识别结果: {}", recognitions))?;

    let mut dialog = SelectionDialog::new(&recognitions, &self.default_target);
    let confirmation = loop {
      match self.prompt.edit_dialog(&mut dialog)? {
        DialogButton::Cancel => {
          info!("用户取消，丢弃本次结果");
          return Ok(());
        }
        DialogButton::Confirm => match dialog.confirm() {
          Ok(confirmation) => break confirmation,
          Err(e) => {
            warn!("输入无效: {}", e);
            self.prompt.notify(&format!("输入无效: {}", e))?;
          }
        },
      }
    };

    self.summary.confirmed += 1;
    self.prompt.notify(&format!(
      "已选择 \"{}\"，正在发送到服务器: {}",
      confirmation.label, confirmation.target
    ))?;

    let sender = self.sender.clone();
    let name = confirmation.description.submission_name();
    let target = confirmation.target.clone();
    let handle = self.client.submit_in_background(
      confirmation.target,
      confirmation.description,
      picture,
      move |result| {
        let _ = sender.send(Event::Submitted {
          name,
          target,
          result,
        });
      },
    );
    self.pending.push(handle);
    Ok(())
  }

  fn finish(self) -> anyhow::Result<SessionSummary> {
    let Session {
      mut camera,
      mut prompt,
      executor,
      events,
      pending,
      mut summary,
      ..
    } = self;

    if let Err(e) = camera.stop() {
      warn!("停止相机失败: {}", e);
    }
    let shutdown = executor.shutdown();

    for handle in pending {
      if handle.join().is_err() {
        warn!("发送线程异常退出");
      }
    }
    for event in events.try_iter() {
      match event {
        Event::Submitted {
          name,
          target,
          result,
        } => {
          if let Err(e) = report_submission(&mut prompt, &mut summary, &name, &target, result) {
            warn!("无法报告发送结果: {:#}", e);
          }
        }
        Event::Closed => info!("推理线程已退出"),
        other => warn!("忽略事件: {:?}", other),
      }
    }

    shutdown?;
    info!("会话结束: {:?}", summary);
    Ok(summary)
  }
}
