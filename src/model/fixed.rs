// 该文件是 Shibie （识别） 项目的一部分。
// src/model/fixed.rs - 固定结果分类器
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
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  model::{Classifier, ClassifierBuilder, Recognition, RecognitionList},
};

pub const DEFAULT_INPUT_SIZE: u32 = 224;

#[derive(Error, Debug)]
pub enum FixedClassifierError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数无效: {0}")]
  InvalidParameter(String),
  #[error("输入尺寸不匹配: 期望 {expected}x{expected}, 实际 {width}x{height}")]
  InputSizeMismatch {
    expected: u32,
    width: usize,
    height: usize,
  },
}

/// 不论输入什么图像都给出同一组结果，用于演示和测试
///
/// URL 形如 `fixed://?cat_0.91=0.91&dog_0.04=0.04`，每个查询参数是一个标签及其置信度。
#[derive(Debug, Clone)]
pub struct FixedClassifierBuilder {
  recognitions: Vec<Recognition>,
  input_size: u32,
}

impl FromUrlWithScheme for FixedClassifierBuilder {
  const SCHEME: &'static str = "fixed";
}

impl FromUrl for FixedClassifierBuilder {
  type Error = FixedClassifierError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(FixedClassifierError::SchemeMismatch);
    }

    let mut recognitions = Vec::new();
    for (label, confidence) in url.query_pairs() {
      let confidence: f32 = confidence.parse().map_err(|_| {
        FixedClassifierError::InvalidParameter(format!("{}={}", label, confidence))
      })?;
      recognitions.push(Recognition::new(label.into_owned(), confidence));
    }

    Self::new(recognitions)
  }
}

impl FixedClassifierBuilder {
  pub fn new(mut recognitions: Vec<Recognition>) -> Result<Self, FixedClassifierError> {
    if let Some(item) = recognitions
      .iter()
      .find(|item| !(0.0..=1.0).contains(&item.confidence))
    {
      return Err(FixedClassifierError::InvalidParameter(format!(
        "置信度超出 [0, 1]: {}={}",
        item.label, item.confidence
      )));
    }
    recognitions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    Ok(Self {
      recognitions,
      input_size: DEFAULT_INPUT_SIZE,
    })
  }

  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }
}

impl ClassifierBuilder for FixedClassifierBuilder {
  type Classifier = FixedClassifier;
  type Error = FixedClassifierError;

  fn build(self) -> Result<Self::Classifier, Self::Error> {
    info!("固定分类器就绪, 共 {} 个候选", self.recognitions.len());
    Ok(FixedClassifier {
      recognitions: self.recognitions.into(),
      input_size: self.input_size,
    })
  }
}

pub struct FixedClassifier {
  recognitions: RecognitionList,
  input_size: u32,
}

impl Classifier for FixedClassifier {
  type Error = FixedClassifierError;

  fn input_size(&self) -> u32 {
    self.input_size
  }

  fn recognize_image(&self, frame: &RgbNhwcFrame) -> Result<RecognitionList, Self::Error> {
    let expected = self.input_size as usize;
    if frame.width() != expected || frame.height() != expected {
      return Err(FixedClassifierError::InputSizeMismatch {
        expected: self.input_size,
        width: frame.width(),
        height: frame.height(),
      });
    }
    debug!("固定分类器返回: {}", self.recognitions);
    Ok(self.recognitions.clone())
  }

  fn close(self) -> Result<(), Self::Error> {
    info!("固定分类器已关闭");
    Ok(())
  }
}
