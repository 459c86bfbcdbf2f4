// 该文件是 Shibie （识别） 项目的一部分。
// src/model/tensorflow.rs - TensorFlow 冻结图分类器
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
use tracing::{debug, info, warn};
use tract_tensorflow::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, decoded_path,
  frame::RgbNhwcFrame,
  model::{Classifier, ClassifierBuilder, Recognition, RecognitionList},
};

const MAX_RESULTS: usize = 3;
const THRESHOLD: f32 = 0.1;

const DEFAULT_INPUT_SIZE: u32 = 224;
const DEFAULT_IMAGE_MEAN: f32 = 117.0;
const DEFAULT_IMAGE_STD: f32 = 1.0;
const DEFAULT_INPUT_NAME: &str = "input";
const DEFAULT_OUTPUT_NAME: &str = "output";

#[derive(Error, Debug)]
pub enum TensorflowError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("参数无效: {0}")]
  InvalidParameter(String),
  #[error("标签文件读取错误: {0}")]
  LabelLoadError(#[from] std::io::Error),
  #[error("推理引擎错误: {0}")]
  TractError(String),
  #[error("输入尺寸不匹配: 期望 {expected}x{expected}, 实际 {width}x{height}")]
  InputSizeMismatch {
    expected: u32,
    width: usize,
    height: usize,
  },
}

impl TensorflowError {
  fn tract(err: impl std::fmt::Display) -> Self {
    TensorflowError::TractError(err.to_string())
  }
}

/// 冻结图分类器的构建参数
///
/// URL 形如
/// `tensorflow:///path/graph.pb?labels=/path/labels.txt&size=224&mean=117&std=1&input=input&output=output`，
/// 除 `labels` 外都有默认值。
#[derive(Debug, Clone)]
pub struct TensorflowClassifierBuilder {
  model_path: String,
  label_path: String,
  input_size: u32,
  image_mean: f32,
  image_std: f32,
  input_name: String,
  output_name: String,
}

impl FromUrlWithScheme for TensorflowClassifierBuilder {
  const SCHEME: &'static str = "tensorflow";
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, TensorflowError> {
  value
    .parse()
    .map_err(|_| TensorflowError::InvalidParameter(format!("{}={}", key, value)))
}

impl FromUrl for TensorflowClassifierBuilder {
  type Error = TensorflowError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TensorflowError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = TensorflowClassifierBuilder {
      model_path: decoded_path(url),
      label_path: String::new(),
      input_size: DEFAULT_INPUT_SIZE,
      image_mean: DEFAULT_IMAGE_MEAN,
      image_std: DEFAULT_IMAGE_STD,
      input_name: DEFAULT_INPUT_NAME.to_string(),
      output_name: DEFAULT_OUTPUT_NAME.to_string(),
    };

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "labels" => builder.label_path = value.into_owned(),
        "size" => builder.input_size = parse_param(&key, &value)?,
        "mean" => builder.image_mean = parse_param(&key, &value)?,
        "std" => builder.image_std = parse_param(&key, &value)?,
        "input" => builder.input_name = value.into_owned(),
        "output" => builder.output_name = value.into_owned(),
        other => warn!("忽略未知参数: {}", other),
      }
    }

    if builder.model_path.is_empty() || builder.model_path == "/" {
      return Err(TensorflowError::ModelPathError("缺少模型文件路径".to_string()));
    }
    if builder.label_path.is_empty() {
      return Err(TensorflowError::InvalidParameter(
        "缺少 labels 参数".to_string(),
      ));
    }
    if builder.input_size == 0 {
      return Err(TensorflowError::InvalidParameter("size=0".to_string()));
    }
    if builder.image_std == 0.0 {
      return Err(TensorflowError::InvalidParameter("std=0".to_string()));
    }

    Ok(builder)
  }
}

impl ClassifierBuilder for TensorflowClassifierBuilder {
  type Classifier = TensorflowClassifier;
  type Error = TensorflowError;

  fn build(self) -> Result<Self::Classifier, Self::Error> {
    info!("加载标签文件: {}", self.label_path);
    let labels: Vec<String> = std::fs::read_to_string(&self.label_path)?
      .lines()
      .map(|line| line.trim_end().to_string())
      .collect();
    debug!("标签数量: {}", labels.len());

    info!("加载模型文件: {}", self.model_path);
    let size = self.input_size as usize;
    let model = tract_tensorflow::tensorflow()
      .model_for_path(&self.model_path)
      .map_err(TensorflowError::tract)?
      .with_input_names([self.input_name.as_str()])
      .map_err(TensorflowError::tract)?
      .with_output_names([self.output_name.as_str()])
      .map_err(TensorflowError::tract)?
      .with_input_fact(0, f32::fact([1, size, size, 3]).into())
      .map_err(TensorflowError::tract)?
      .into_optimized()
      .map_err(TensorflowError::tract)?
      .into_runnable()
      .map_err(TensorflowError::tract)?;
    info!(
      "模型加载完成: 输入 {} ({}x{}), 输出 {}",
      self.input_name, size, size, self.output_name
    );

    Ok(TensorflowClassifier {
      model,
      labels,
      input_size: self.input_size,
      image_mean: self.image_mean,
      image_std: self.image_std,
    })
  }
}

pub struct TensorflowClassifier {
  model: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
  labels: Vec<String>,
  input_size: u32,
  image_mean: f32,
  image_std: f32,
}

impl TensorflowClassifier {
  fn preprocess(&self, frame: &RgbNhwcFrame) -> Tensor {
    let (height, width) = (frame.height(), frame.width());
    let data = frame.as_nhwc();
    tract_ndarray::Array4::from_shape_fn((1, height, width, 3), |(_, y, x, c)| {
      (data[(y * width + x) * 3 + c] as f32 - self.image_mean) / self.image_std
    })
    .into_tensor()
  }
}

/// 取置信度不低于阈值的前若干项，按置信度从高到低排列
fn top_recognitions(scores: &[f32], labels: &[String]) -> RecognitionList {
  let mut ranked: Vec<(usize, f32)> = scores
    .iter()
    .copied()
    .enumerate()
    .filter(|(_, score)| *score > THRESHOLD)
    .collect();
  ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
  ranked.truncate(MAX_RESULTS);

  ranked
    .into_iter()
    .map(|(index, score)| {
      let label = labels
        .get(index)
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
      Recognition::new(label, score)
    })
    .collect::<Vec<_>>()
    .into()
}

impl Classifier for TensorflowClassifier {
  type Error = TensorflowError;

  fn input_size(&self) -> u32 {
    self.input_size
  }

  fn recognize_image(&self, frame: &RgbNhwcFrame) -> Result<RecognitionList, Self::Error> {
    let expected = self.input_size as usize;
    if frame.width() != expected || frame.height() != expected {
      return Err(TensorflowError::InputSizeMismatch {
        expected: self.input_size,
        width: frame.width(),
        height: frame.height(),
      });
    }

    let input = self.preprocess(frame);
    let outputs = self
      .model
      .run(tvec!(input.into_tvalue()))
      .map_err(TensorflowError::tract)?;
    let scores = outputs[0]
      .to_array_view::<f32>()
      .map_err(TensorflowError::tract)?;
    let scores: Vec<f32> = scores.iter().copied().collect();

    let result = top_recognitions(&scores, &self.labels);
    debug!("识别结果: {}", result);
    Ok(result)
  }

  fn close(self) -> Result<(), Self::Error> {
    info!("模型已关闭");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
  }

  #[test]
  fn top_recognitions_filters_sorts_and_truncates() {
    let scores = [0.05, 0.3, 0.12, 0.4, 0.11, 0.02];
    let result = top_recognitions(&scores, &labels(&["a", "b", "c", "d", "e", "f"]));

    assert_eq!(result.labels().collect::<Vec<_>>(), vec!["d", "b", "c"]);
    assert_eq!(result.items[0].confidence, 0.4);
  }

  #[test]
  fn top_recognitions_names_missing_labels_unknown() {
    let result = top_recognitions(&[0.2, 0.8], &labels(&["only"]));
    assert_eq!(result.labels().collect::<Vec<_>>(), vec!["unknown", "only"]);
  }

  #[test]
  fn top_recognitions_below_threshold_is_empty() {
    assert!(top_recognitions(&[0.01, 0.1], &labels(&["a", "b"])).is_empty());
  }

  #[test]
  fn from_url_reads_all_parameters() {
    let url = Url::parse(
      "tensorflow:///models/graph.pb?labels=/models/labels.txt&size=299&mean=128&std=128&input=Mul&output=final_result",
    )
    .unwrap();
    let builder = TensorflowClassifierBuilder::from_url(&url).unwrap();

    assert_eq!(builder.model_path, "/models/graph.pb");
    assert_eq!(builder.label_path, "/models/labels.txt");
    assert_eq!(builder.input_size, 299);
    assert_eq!(builder.image_mean, 128.0);
    assert_eq!(builder.image_std, 128.0);
    assert_eq!(builder.input_name, "Mul");
    assert_eq!(builder.output_name, "final_result");
  }

  #[test]
  fn from_url_uses_defaults() {
    let url = Url::parse("tensorflow:///models/graph.pb?labels=/models/labels.txt").unwrap();
    let builder = TensorflowClassifierBuilder::from_url(&url).unwrap();

    assert_eq!(builder.input_size, DEFAULT_INPUT_SIZE);
    assert_eq!(builder.image_mean, DEFAULT_IMAGE_MEAN);
    assert_eq!(builder.image_std, DEFAULT_IMAGE_STD);
    assert_eq!(builder.input_name, DEFAULT_INPUT_NAME);
    assert_eq!(builder.output_name, DEFAULT_OUTPUT_NAME);
  }

  #[test]
  fn from_url_requires_labels() {
    let url = Url::parse("tensorflow:///models/graph.pb").unwrap();
    assert!(matches!(
      TensorflowClassifierBuilder::from_url(&url),
      Err(TensorflowError::InvalidParameter(_))
    ));
  }

  #[test]
  fn build_fails_without_label_file() {
    let url =
      Url::parse("tensorflow:///nonexistent/graph.pb?labels=/nonexistent/labels.txt").unwrap();
    let builder = TensorflowClassifierBuilder::from_url(&url).unwrap();
    assert!(matches!(
      builder.build(),
      Err(TensorflowError::LabelLoadError(_))
    ));
  }
}
