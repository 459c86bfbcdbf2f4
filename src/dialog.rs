// 该文件是 Shibie （识别） 项目的一部分。
// src/dialog.rs - 识别结果确认对话框
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

use thiserror::Error;
use url::Url;

use crate::model::RecognitionList;

/// 标签中名称与置信度之间的分隔符
pub const SEPARATOR: char = '_';
/// 用户自己输入、不带置信度的标签使用的置信度
pub const FULL_CONFIDENCE: &str = "(100%)";

/// 用户最终确认的标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescription {
  pub name: String,
  pub confidence: String,
}

impl ObjectDescription {
  pub fn new(name: impl Into<String>, confidence: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      confidence: confidence.into(),
    }
  }

  /// 发送给服务器的名称，空格替换为下划线
  pub fn submission_name(&self) -> String {
    self.name.replace(' ', "_")
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
  #[error("没有可选的候选项，请填写自定义标签")]
  MissingChoice,
  #[error("选项序号 {index} 超出范围 (共 {len} 项)")]
  IndexOutOfRange { index: usize, len: usize },
  #[error("发送地址无效: {0}")]
  InvalidTarget(String),
}

/// 由选中项和自定义输入得出最终标签
///
/// 自定义输入非空时优先。标签含分隔符时拆成名称和置信度两部分，
/// 否则整个标签作为名称，置信度为 [`FULL_CONFIDENCE`]。
pub fn resolve_label(
  selected: Option<&str>,
  override_text: &str,
) -> Result<ObjectDescription, ValidationError> {
  let override_text = override_text.trim();
  let chosen = if override_text.is_empty() {
    selected.ok_or(ValidationError::MissingChoice)?
  } else {
    override_text
  };

  // 只在第一个分隔符处拆分，fire_truck_0.5 的置信度部分是 truck_0.5
  Ok(match chosen.split_once(SEPARATOR) {
    Some((name, confidence)) if !confidence.is_empty() => ObjectDescription::new(name, confidence),
    Some((name, _)) => ObjectDescription::new(name, FULL_CONFIDENCE),
    None => ObjectDescription::new(chosen, FULL_CONFIDENCE),
  })
}

/// 确认后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
  /// 用户选中或输入的原始标签
  pub label: String,
  pub description: ObjectDescription,
  pub target: Url,
}

/// 对话框状态：候选列表、当前选中项、自定义输入和发送地址
///
/// 确认失败时状态保持不变，对话框继续收集输入；取消时直接丢弃。
#[derive(Debug, Clone)]
pub struct SelectionDialog {
  entries: Vec<String>,
  selected: usize,
  override_text: String,
  target: String,
}

impl SelectionDialog {
  pub fn new(recognitions: &RecognitionList, default_target: &Url) -> Self {
    Self {
      entries: recognitions.labels().map(str::to_string).collect(),
      selected: 0,
      override_text: String::new(),
      target: default_target.to_string(),
    }
  }

  pub fn entries(&self) -> &[String] {
    &self.entries
  }

  pub fn selected(&self) -> usize {
    self.selected
  }

  pub fn override_text(&self) -> &str {
    &self.override_text
  }

  pub fn target(&self) -> &str {
    &self.target
  }

  pub fn select(&mut self, index: usize) -> Result<(), ValidationError> {
    if index >= self.entries.len() {
      return Err(ValidationError::IndexOutOfRange {
        index,
        len: self.entries.len(),
      });
    }
    self.selected = index;
    Ok(())
  }

  pub fn set_override(&mut self, text: impl Into<String>) {
    self.override_text = text.into();
  }

  pub fn set_target(&mut self, target: impl Into<String>) {
    self.target = target.into();
  }

  pub fn confirm(&self) -> Result<Confirmation, ValidationError> {
    let selected = self.entries.get(self.selected).map(String::as_str);
    let description = resolve_label(selected, &self.override_text)?;

    let target = self.target.trim();
    let target = Url::parse(target)
      .map_err(|e| ValidationError::InvalidTarget(format!("{}: {}", target, e)))?;
    if !matches!(target.scheme(), "http" | "https") {
      return Err(ValidationError::InvalidTarget(format!(
        "{}: 只支持 http/https",
        target
      )));
    }

    let label = match self.override_text.trim() {
      "" => selected.unwrap_or_default().to_string(),
      text => text.to_string(),
    };

    Ok(Confirmation {
      label,
      description,
      target,
    })
  }
}
