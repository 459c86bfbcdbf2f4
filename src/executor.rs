// 该文件是 Shibie （识别） 项目的一部分。
// src/executor.rs - 单线程推理队列
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

//! # 推理队列
//!
//! 分类器的初始化、推理和关闭全部在同一个后台线程上按提交顺序执行：
//!
//! 1. [`InferenceExecutor::spawn`] 启动线程并立即执行一次初始化，
//!    成功投递 [`Event::Ready`]，失败投递 [`Event::InitFailed`] 后线程退出；
//! 2. [`InferenceExecutor::classify`] 把拍到的图像排入队列，
//!    线程解码、缩放、推理后投递 [`Event::Recognized`] 或 [`Event::RecognizeFailed`]；
//! 3. [`InferenceExecutor::shutdown`] 把关闭任务排在所有已提交任务之后，
//!    并等待线程退出。它会消耗执行器本身，所以关闭之后不可能再提交任务。
//!
//! 分类器只被这个线程持有，不需要加锁。

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  capture::decode_and_resize,
  event::{Event, Ticket},
  model::{Classifier, ClassifierBuilder},
};

#[derive(Error, Debug)]
pub enum ExecutorError {
  #[error("无法启动推理线程: {0}")]
  Spawn(#[from] std::io::Error),
  #[error("推理线程已退出")]
  WorkerGone,
  #[error("推理线程异常退出")]
  WorkerPanicked,
}

enum Job {
  Classify { ticket: Ticket, picture: Vec<u8> },
  Close,
}

pub struct InferenceExecutor {
  jobs: Sender<Job>,
  worker: JoinHandle<()>,
  next_ticket: Ticket,
}

impl InferenceExecutor {
  pub fn spawn<B>(builder: B, events: Sender<Event>) -> Result<Self, ExecutorError>
  where
    B: ClassifierBuilder + Send + 'static,
  {
    let (jobs, receiver) = mpsc::channel();
    let worker = thread::Builder::new()
      .name("inference".to_string())
      .spawn(move || run_worker(builder, receiver, events))?;

    Ok(Self {
      jobs,
      worker,
      next_ticket: 0,
    })
  }

  /// 提交一张拍到的图像，返回它在队列中的序号
  pub fn classify(&mut self, picture: Vec<u8>) -> Result<Ticket, ExecutorError> {
    let ticket = self.next_ticket;
    self
      .jobs
      .send(Job::Classify { ticket, picture })
      .map_err(|_| ExecutorError::WorkerGone)?;
    self.next_ticket += 1;
    Ok(ticket)
  }

  pub fn is_finished(&self) -> bool {
    self.worker.is_finished()
  }

  /// 在所有已提交任务之后关闭分类器，并等待推理线程退出
  pub fn shutdown(self) -> Result<(), ExecutorError> {
    // 线程已经退出时发送会失败，直接等待即可
    let _ = self.jobs.send(Job::Close);
    drop(self.jobs);
    self
      .worker
      .join()
      .map_err(|_| ExecutorError::WorkerPanicked)
  }
}

fn post(events: &Sender<Event>, event: Event) {
  // 交互线程已经不在时丢弃事件
  let _ = events.send(event);
}

fn run_worker<B: ClassifierBuilder>(builder: B, jobs: Receiver<Job>, events: Sender<Event>) {
  info!("初始化分类器...");
  let now = Instant::now();
  let classifier = match builder.build() {
    Ok(classifier) => classifier,
    Err(e) => {
      error!("分类器初始化失败: {}", e);
      // 先断开任务队列，之后的提交会立即失败
      drop(jobs);
      post(
        &events,
        Event::InitFailed(anyhow::Error::new(e).context("初始化分类器失败")),
      );
      return;
    }
  };
  let input_size = classifier.input_size();
  info!(
    "分类器初始化完成，耗时: {:.2?}，输入尺寸: {}x{}",
    now.elapsed(),
    input_size,
    input_size
  );
  post(&events, Event::Ready { input_size });

  for job in jobs.iter() {
    match job {
      Job::Classify { ticket, picture } => {
        let now = Instant::now();
        let result = decode_and_resize(&picture, input_size)
          .map_err(anyhow::Error::from)
          .and_then(|frame| {
            classifier
              .recognize_image(&frame)
              .map_err(anyhow::Error::from)
          });
        match result {
          Ok(recognitions) => {
            info!(
              "({})推理完成，耗时: {:.2?}，结果: {}",
              ticket,
              now.elapsed(),
              recognitions
            );
            post(
              &events,
              Event::Recognized {
                ticket,
                recognitions,
                picture,
              },
            );
          }
          Err(error) => {
            error!("({})推理失败: {:#}", ticket, error);
            post(&events, Event::RecognizeFailed { ticket, error });
          }
        }
      }
      Job::Close => break,
    }
  }

  // 收到关闭任务，或执行器被丢弃
  match classifier.close() {
    Ok(()) => info!("分类器已关闭"),
    Err(e) => warn!("关闭分类器失败: {}", e),
  }
  post(&events, Event::Closed);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::RgbNhwcFrame;
  use crate::model::{Recognition, RecognitionList};
  use image::{DynamicImage, ImageFormat, RgbImage};
  use std::io::Cursor;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  #[derive(Error, Debug)]
  #[error("测试错误: {0}")]
  struct TestError(String);

  #[derive(Default)]
  struct Journal {
    entries: Mutex<Vec<(String, Instant, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
  }

  impl Journal {
    fn record(&self, name: String) {
      let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
      self.max_in_flight.fetch_max(now, Ordering::SeqCst);
      let start = Instant::now();
      thread::sleep(Duration::from_millis(5));
      let end = Instant::now();
      self.in_flight.fetch_sub(1, Ordering::SeqCst);
      self.entries.lock().unwrap().push((name, start, end));
    }
  }

  struct RecordingBuilder {
    journal: Arc<Journal>,
    fail: bool,
  }

  struct RecordingClassifier {
    journal: Arc<Journal>,
    calls: AtomicUsize,
  }

  impl ClassifierBuilder for RecordingBuilder {
    type Classifier = RecordingClassifier;
    type Error = TestError;

    fn build(self) -> Result<Self::Classifier, Self::Error> {
      self.journal.record("init".to_string());
      if self.fail {
        return Err(TestError("模型不存在".to_string()));
      }
      Ok(RecordingClassifier {
        journal: self.journal,
        calls: AtomicUsize::new(0),
      })
    }
  }

  impl Classifier for RecordingClassifier {
    type Error = TestError;

    fn input_size(&self) -> u32 {
      8
    }

    fn recognize_image(&self, frame: &RgbNhwcFrame) -> Result<RecognitionList, Self::Error> {
      assert_eq!((frame.width(), frame.height()), (8, 8));
      let call = self.calls.fetch_add(1, Ordering::SeqCst);
      self.journal.record(format!("classify-{}", call));
      Ok(vec![Recognition::new("cat_0.91", 0.91)].into())
    }

    fn close(self) -> Result<(), Self::Error> {
      self.journal.record("close".to_string());
      Ok(())
    }
  }

  fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
      .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
      .unwrap();
    bytes
  }

  fn spawn(fail: bool) -> (InferenceExecutor, Receiver<Event>, Arc<Journal>) {
    let journal = Arc::new(Journal::default());
    let (events, receiver) = mpsc::channel();
    let executor = InferenceExecutor::spawn(
      RecordingBuilder {
        journal: journal.clone(),
        fail,
      },
      events,
    )
    .unwrap();
    (executor, receiver, journal)
  }

  #[test]
  fn runs_jobs_one_at_a_time_in_enqueue_order() {
    let (mut executor, events, journal) = spawn(false);

    // 初始化尚未完成时就提交，任务应排在初始化之后
    assert_eq!(executor.classify(png(32, 16)).unwrap(), 0);
    assert_eq!(executor.classify(png(16, 32)).unwrap(), 1);
    executor.shutdown().unwrap();

    let entries = journal.entries.lock().unwrap();
    let names: Vec<&str> = entries.iter().map(|(name, _, _)| name.as_str()).collect();
    assert_eq!(names, vec!["init", "classify-0", "classify-1", "close"]);
    for pair in entries.windows(2) {
      assert!(pair[0].2 <= pair[1].1, "{} overlaps {}", pair[0].0, pair[1].0);
    }
    assert_eq!(journal.max_in_flight.load(Ordering::SeqCst), 1);

    let events: Vec<Event> = events.try_iter().collect();
    assert!(matches!(events[0], Event::Ready { input_size: 8 }));
    assert!(matches!(events[1], Event::Recognized { ticket: 0, .. }));
    assert!(matches!(events[2], Event::Recognized { ticket: 1, .. }));
    assert!(matches!(events[3], Event::Closed));
    assert_eq!(events.len(), 4);
  }

  #[test]
  fn recognized_event_hands_back_captured_bytes() {
    let (mut executor, events, _) = spawn(false);
    let picture = png(10, 10);
    executor.classify(picture.clone()).unwrap();
    executor.shutdown().unwrap();

    let recognized = events
      .try_iter()
      .find_map(|event| match event {
        Event::Recognized {
          recognitions,
          picture,
          ..
        } => Some((recognitions, picture)),
        _ => None,
      })
      .unwrap();
    assert_eq!(recognized.1, picture);
    assert_eq!(recognized.0.labels().collect::<Vec<_>>(), vec!["cat_0.91"]);
  }

  #[test]
  fn decode_failure_is_reported_and_worker_survives() {
    let (mut executor, events, _) = spawn(false);
    executor.classify(b"not an image".to_vec()).unwrap();
    executor.classify(png(8, 8)).unwrap();
    executor.shutdown().unwrap();

    let events: Vec<Event> = events.try_iter().collect();
    assert!(matches!(events[1], Event::RecognizeFailed { ticket: 0, .. }));
    assert!(matches!(events[2], Event::Recognized { ticket: 1, .. }));
    assert!(matches!(events[3], Event::Closed));
  }

  #[test]
  fn init_failure_stops_worker() {
    let (mut executor, events, journal) = spawn(true);

    match events.recv().unwrap() {
      Event::InitFailed(error) => assert!(format!("{:#}", error).contains("模型不存在")),
      other => panic!("unexpected event: {:?}", other),
    }
    assert!(matches!(
      executor.classify(png(8, 8)),
      Err(ExecutorError::WorkerGone)
    ));
    executor.shutdown().unwrap();

    let entries = journal.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert!(events.try_recv().is_err());
  }

  #[test]
  fn dropping_executor_still_closes_classifier() {
    let (executor, events, journal) = spawn(false);
    drop(executor);

    let mut closed = false;
    while let Ok(event) = events.recv_timeout(Duration::from_secs(5)) {
      if matches!(event, Event::Closed) {
        closed = true;
        break;
      }
    }
    assert!(closed);
    let entries = journal.entries.lock().unwrap();
    assert_eq!(entries.last().unwrap().0, "close");
  }
}
