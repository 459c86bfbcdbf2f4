// 该文件是 Shibie （识别） 项目的一部分。
// src/prompt.rs - 交互提示
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

use std::io::{self, BufRead, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::dialog::SelectionDialog;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Capture,
  Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogButton {
  Confirm,
  Cancel,
}

/// 交互线程上的用户界面
pub trait Prompt {
  /// 等待用户触发拍照或退出
  fn next_action(&mut self) -> io::Result<Action>;
  /// 让用户修改对话框，返回按下的按钮
  fn edit_dialog(&mut self, dialog: &mut SelectionDialog) -> io::Result<DialogButton>;
  fn notify(&mut self, message: &str) -> io::Result<()>;
  /// 标志置位后正在等待的输入立即结束：`next_action` 返回退出，`edit_dialog` 返回取消
  fn watch_interrupt(&mut self, _interrupted: Arc<AtomicBool>) {}
}

/// 基于行输入的终端界面
///
/// 输入在单独的线程上逐行读取，等待输入时仍能响应中断标志。
pub struct TerminalPrompt<W> {
  lines: Receiver<io::Result<String>>,
  output: W,
  interrupted: Option<Arc<AtomicBool>>,
}

/// 逐行读取输入并投递，输入结束、出错或接收端关闭时线程退出
fn spawn_reader<R, F>(open: F) -> Receiver<io::Result<String>>
where
  R: BufRead,
  F: FnOnce() -> R + Send + 'static,
{
  let (sender, receiver) = mpsc::channel();
  thread::spawn(move || {
    let mut input = open();
    loop {
      let mut line = String::new();
      match input.read_line(&mut line) {
        Ok(0) => break,
        Ok(_) => {
          if sender.send(Ok(line)).is_err() {
            break;
          }
        }
        Err(e) => {
          let _ = sender.send(Err(e));
          break;
        }
      }
    }
  });
  receiver
}

impl TerminalPrompt<Stdout> {
  pub fn stdio() -> Self {
    Self {
      lines: spawn_reader(|| io::stdin().lock()),
      output: io::stdout(),
      interrupted: None,
    }
  }
}

impl<W: Write> TerminalPrompt<W> {
  pub fn new<R: BufRead + Send + 'static>(input: R, output: W) -> Self {
    Self {
      lines: spawn_reader(move || input),
      output,
      interrupted: None,
    }
  }

  fn is_interrupted(&self) -> bool {
    self
      .interrupted
      .as_ref()
      .is_some_and(|flag| flag.load(Ordering::SeqCst))
  }

  pub fn into_output(self) -> W {
    self.output
  }

  /// 打印提示并读取一行，输入结束或收到中断时返回 None
  fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
    write!(self.output, "{}", question)?;
    self.output.flush()?;
    loop {
      if self.is_interrupted() {
        writeln!(self.output)?;
        return Ok(None);
      }
      match self.lines.recv_timeout(POLL_INTERVAL) {
        Ok(line) => return Ok(Some(line?.trim_end_matches(['\r', '\n']).to_string())),
        Err(RecvTimeoutError::Timeout) => continue,
        Err(RecvTimeoutError::Disconnected) => return Ok(None),
      }
    }
  }
}

impl<W: Write> Prompt for TerminalPrompt<W> {
  fn next_action(&mut self) -> io::Result<Action> {
    loop {
      let Some(line) = self.ask("[拍照] 回车拍照，q 退出: ")? else {
        return Ok(Action::Quit);
      };
      match line.trim() {
        "" | "c" => return Ok(Action::Capture),
        "q" | "quit" => return Ok(Action::Quit),
        other => writeln!(self.output, "未知命令: {}", other)?,
      }
    }
  }

  fn edit_dialog(&mut self, dialog: &mut SelectionDialog) -> io::Result<DialogButton> {
    writeln!(self.output, "请选择正确的选项，并填写发送地址:")?;
    if dialog.entries().is_empty() {
      writeln!(self.output, "  (没有候选项)")?;
    }
    for (index, entry) in dialog.entries().iter().enumerate() {
      let mark = if index == dialog.selected() { '*' } else { ' ' };
      writeln!(self.output, "  {} {}. {}", mark, index, entry)?;
    }

    if !dialog.entries().is_empty() {
      loop {
        let question = format!("选项序号 [{}]: ", dialog.selected());
        let Some(line) = self.ask(&question)? else {
          return Ok(DialogButton::Cancel);
        };
        let line = line.trim();
        if line.is_empty() {
          break;
        }
        match line.parse::<usize>() {
          Ok(index) => match dialog.select(index) {
            Ok(()) => break,
            Err(e) => writeln!(self.output, "{}", e)?,
          },
          Err(_) => writeln!(self.output, "请输入数字序号")?,
        }
      }
    }

    let question = format!(
      "自定义标签 (没有合适的选项时填写) [{}]: ",
      dialog.override_text()
    );
    let Some(line) = self.ask(&question)? else {
      return Ok(DialogButton::Cancel);
    };
    if !line.trim().is_empty() {
      dialog.set_override(line.trim());
    }

    let question = format!("发送地址 [{}]: ", dialog.target());
    let Some(line) = self.ask(&question)? else {
      return Ok(DialogButton::Cancel);
    };
    if !line.trim().is_empty() {
      dialog.set_target(line.trim());
    }

    loop {
      let Some(line) = self.ask("确认发送? [Y/n]: ")? else {
        return Ok(DialogButton::Cancel);
      };
      match line.trim().to_lowercase().as_str() {
        "" | "y" | "yes" => return Ok(DialogButton::Confirm),
        "n" | "no" => return Ok(DialogButton::Cancel),
        _ => writeln!(self.output, "请输入 y 或 n")?,
      }
    }
  }

  fn notify(&mut self, message: &str) -> io::Result<()> {
    writeln!(self.output, "{}", message)?;
    self.output.flush()
  }

  fn watch_interrupt(&mut self, interrupted: Arc<AtomicBool>) {
    self.interrupted = Some(interrupted);
  }
}
