// 该文件是 Shibie （识别） 项目的一部分。
// src/model.rs - 分类模型
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

use std::fmt::{Display, Formatter};

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::RgbNhwcFrame};

/// 图像分类器
///
/// 分类器只在推理线程上创建、使用和关闭，因此不要求 `Sync`。
pub trait Classifier {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 模型要求的正方形输入边长
  fn input_size(&self) -> u32;
  /// 返回按置信度从高到低排列的识别结果
  fn recognize_image(&self, frame: &RgbNhwcFrame) -> Result<RecognitionList, Self::Error>;
  fn close(self) -> Result<(), Self::Error>
  where
    Self: Sized;
}

/// 分类器的一次性初始化
pub trait ClassifierBuilder {
  type Classifier: Classifier;
  type Error: std::error::Error + Send + Sync + 'static;

  fn build(self) -> Result<Self::Classifier, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
  pub label: String,
  pub confidence: f32,
}

impl Recognition {
  pub fn new(label: impl Into<String>, confidence: f32) -> Self {
    Self {
      label: label.into(),
      confidence,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognitionList {
  pub items: Box<[Recognition]>,
}

impl RecognitionList {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Recognition> {
    self.items.iter()
  }

  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.items.iter().map(|item| item.label.as_str())
  }
}

impl From<Vec<Recognition>> for RecognitionList {
  fn from(items: Vec<Recognition>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl Display for RecognitionList {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    if self.items.is_empty() {
      return write!(f, "(无识别结果)");
    }
    for (index, item) in self.items.iter().enumerate() {
      if index > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{} ({:.1}%)", item.label, item.confidence * 100.0)?;
    }
    Ok(())
  }
}

mod fixed;
pub use self::fixed::{FixedClassifier, FixedClassifierBuilder, FixedClassifierError};

#[cfg(feature = "model_tensorflow")]
mod tensorflow;
#[cfg(feature = "model_tensorflow")]
pub use self::tensorflow::{TensorflowClassifier, TensorflowClassifierBuilder, TensorflowError};

#[derive(Error, Debug)]
pub enum ModelError {
  #[cfg(feature = "model_tensorflow")]
  #[error("TensorFlow 模型错误: {0}")]
  TensorflowError(#[from] TensorflowError),
  #[error("固定分类器错误: {0}")]
  FixedClassifierError(#[from] FixedClassifierError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 根据 URL 方案选择的分类器构建器
pub enum ModelBuilderWrapper {
  #[cfg(feature = "model_tensorflow")]
  Tensorflow(TensorflowClassifierBuilder),
  Fixed(FixedClassifierBuilder),
}

pub enum ModelWrapper {
  #[cfg(feature = "model_tensorflow")]
  Tensorflow(TensorflowClassifier),
  Fixed(FixedClassifier),
}

impl FromUrl for ModelBuilderWrapper {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "model_tensorflow")]
      TensorflowClassifierBuilder::SCHEME => Ok(ModelBuilderWrapper::Tensorflow(
        TensorflowClassifierBuilder::from_url(url)?,
      )),
      FixedClassifierBuilder::SCHEME => Ok(ModelBuilderWrapper::Fixed(
        FixedClassifierBuilder::from_url(url)?,
      )),
      other => Err(ModelError::SchemeMismatch(other.to_string())),
    }
  }
}

impl ClassifierBuilder for ModelBuilderWrapper {
  type Classifier = ModelWrapper;
  type Error = ModelError;

  fn build(self) -> Result<Self::Classifier, Self::Error> {
    match self {
      #[cfg(feature = "model_tensorflow")]
      ModelBuilderWrapper::Tensorflow(builder) => Ok(ModelWrapper::Tensorflow(builder.build()?)),
      ModelBuilderWrapper::Fixed(builder) => Ok(ModelWrapper::Fixed(builder.build()?)),
    }
  }
}

impl Classifier for ModelWrapper {
  type Error = ModelError;

  fn input_size(&self) -> u32 {
    match self {
      #[cfg(feature = "model_tensorflow")]
      ModelWrapper::Tensorflow(classifier) => classifier.input_size(),
      ModelWrapper::Fixed(classifier) => classifier.input_size(),
    }
  }

  fn recognize_image(&self, frame: &RgbNhwcFrame) -> Result<RecognitionList, Self::Error> {
    match self {
      #[cfg(feature = "model_tensorflow")]
      ModelWrapper::Tensorflow(classifier) => classifier
        .recognize_image(frame)
        .map_err(ModelError::from),
      ModelWrapper::Fixed(classifier) => classifier
        .recognize_image(frame)
        .map_err(ModelError::from),
    }
  }

  fn close(self) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "model_tensorflow")]
      ModelWrapper::Tensorflow(classifier) => classifier.close().map_err(ModelError::from),
      ModelWrapper::Fixed(classifier) => classifier.close().map_err(ModelError::from),
    }
  }
}
