// 该文件是 Shibie （识别） 项目的一部分。
// tests/common/mod.rs - 集成测试共用工具
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

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, RgbImage};
use shibie::{
  dialog::SelectionDialog,
  prompt::{Action, DialogButton, Prompt},
  submit::{SubmissionClient, SubmissionConfig},
};
use tempfile::TempDir;
use url::Url;

/// 一次对话框操作
#[derive(Debug, Clone)]
pub struct DialogStep {
  pub select: Option<usize>,
  pub override_text: Option<String>,
  pub target: Option<String>,
  pub button: DialogButton,
}

impl DialogStep {
  pub fn confirm() -> Self {
    Self {
      select: None,
      override_text: None,
      target: None,
      button: DialogButton::Confirm,
    }
  }

  pub fn cancel() -> Self {
    Self {
      button: DialogButton::Cancel,
      ..Self::confirm()
    }
  }

  pub fn select(mut self, index: usize) -> Self {
    self.select = Some(index);
    self
  }

  pub fn override_text(mut self, text: &str) -> Self {
    self.override_text = Some(text.to_string());
    self
  }

  pub fn target(mut self, target: &Url) -> Self {
    self.target = Some(target.to_string());
    self
  }
}

/// 按脚本回答的界面，记录所有提示和看到的候选项
#[derive(Default)]
pub struct ScriptedPrompt {
  actions: VecDeque<Action>,
  dialogs: VecDeque<DialogStep>,
  pub notes: Arc<Mutex<Vec<String>>>,
  pub entries: Arc<Mutex<Vec<Vec<String>>>>,
  notify_limit: Option<usize>,
}

impl ScriptedPrompt {
  pub fn new(actions: Vec<Action>, dialogs: Vec<DialogStep>) -> Self {
    Self {
      actions: actions.into(),
      dialogs: dialogs.into(),
      ..Self::default()
    }
  }

  /// 成功提示 `limit` 次之后，之后的提示都失败
  pub fn fail_notify_after(mut self, limit: usize) -> Self {
    self.notify_limit = Some(limit);
    self
  }
}

impl Prompt for ScriptedPrompt {
  fn next_action(&mut self) -> io::Result<Action> {
    Ok(self.actions.pop_front().unwrap_or(Action::Quit))
  }

  fn edit_dialog(&mut self, dialog: &mut SelectionDialog) -> io::Result<DialogButton> {
    self.entries.lock().unwrap().push(dialog.entries().to_vec());
    let Some(step) = self.dialogs.pop_front() else {
      return Ok(DialogButton::Cancel);
    };
    if let Some(index) = step.select {
      dialog.select(index).unwrap();
    }
    if let Some(text) = step.override_text {
      dialog.set_override(text);
    }
    if let Some(target) = step.target {
      dialog.set_target(target);
    }
    Ok(step.button)
  }

  fn notify(&mut self, message: &str) -> io::Result<()> {
    let mut notes = self.notes.lock().unwrap();
    if self.notify_limit.is_some_and(|limit| notes.len() >= limit) {
      return Err(io::Error::new(io::ErrorKind::BrokenPipe, "终端已关闭"));
    }
    notes.push(message.to_string());
    Ok(())
  }
}

pub struct CapturedRequest {
  pub head: String,
  pub body: Vec<u8>,
}

impl CapturedRequest {
  pub fn header(&self, name: &str) -> Option<&str> {
    self.head.lines().find_map(|line| {
      let (key, value) = line.split_once(':')?;
      key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
  }
}

fn read_request(stream: &TcpStream) -> CapturedRequest {
  let mut reader = BufReader::new(stream);
  let mut head = String::new();
  loop {
    let mut line = String::new();
    if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
      break;
    }
    head.push_str(&line);
  }
  let request = CapturedRequest {
    head,
    body: Vec::new(),
  };
  let length = request
    .header("content-length")
    .map(|v| v.parse().unwrap())
    .unwrap_or(0);
  let mut body = vec![0; length];
  reader.read_exact(&mut body).unwrap();
  CapturedRequest { body, ..request }
}

/// 接受 `count` 个请求，全部以 200 应答
pub fn serve(count: usize) -> (Url, JoinHandle<Vec<CapturedRequest>>) {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let url = Url::parse(&format!("http://{}/upload", listener.local_addr().unwrap())).unwrap();
  let handle = thread::spawn(move || {
    (0..count)
      .map(|_| {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&stream);
        write!(
          stream,
          "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok"
        )
        .unwrap();
        request
      })
      .collect()
  });
  (url, handle)
}

pub fn unreachable_url() -> Url {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);
  Url::parse(&format!("http://{}/upload", addr)).unwrap()
}

pub fn client() -> SubmissionClient {
  SubmissionClient::new(SubmissionConfig {
    retries: 0,
    retry_delay: Duration::from_millis(10),
    timeout: Some(Duration::from_secs(5)),
    proxy: false,
  })
  .unwrap()
}

/// 在临时目录中写一张 JPEG，返回目录、路径和文件内容
pub fn jpeg_file(width: u32, height: u32) -> (TempDir, PathBuf, Vec<u8>) {
  let image = RgbImage::from_fn(width, height, |x, y| {
    image::Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, 128])
  });
  let mut bytes = Vec::new();
  DynamicImage::ImageRgb8(image)
    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
    .unwrap();
  write_file("photo.jpg", bytes)
}

pub fn write_file(name: &str, bytes: Vec<u8>) -> (TempDir, PathBuf, Vec<u8>) {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join(name);
  std::fs::write(&path, &bytes).unwrap();
  (dir, path, bytes)
}

/// 可以在会话结束后读取的输出
#[derive(Clone, Default)]
pub struct SharedOutput(pub Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }
}

impl Write for SharedOutput {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

/// 一个连接着但永远没有数据的输入，返回的第二个连接需要保持打开
pub fn silent_input() -> (BufReader<TcpStream>, TcpStream) {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
  let (server, _) = listener.accept().unwrap();
  (BufReader::new(client), server)
}
