// 该文件是 Shibie （识别） 项目的一部分。
// src/capture/image_file.rs - 图像文件相机
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, capture::Camera, decoded_path};

#[derive(Error, Debug)]
pub enum ImageFileCameraError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Camera is not started")]
  NotStarted,
}

/// 把磁盘上的一张图片当作相机，每次拍照都返回文件原始字节
pub struct ImageFileCamera {
  path: PathBuf,
  started: bool,
}

impl FromUrlWithScheme for ImageFileCamera {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileCamera {
  type Error = ImageFileCameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileCameraError::SchemaMismatch);
    }

    Ok(ImageFileCamera {
      path: PathBuf::from(decoded_path(url)),
      started: false,
    })
  }
}

impl ImageFileCamera {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      started: false,
    }
  }
}

impl Camera for ImageFileCamera {
  type Error = ImageFileCameraError;

  fn start(&mut self) -> Result<(), Self::Error> {
    let metadata = std::fs::metadata(&self.path)?;
    info!(
      "图像文件相机已启动: {} ({} 字节)",
      self.path.display(),
      metadata.len()
    );
    self.started = true;
    Ok(())
  }

  fn stop(&mut self) -> Result<(), Self::Error> {
    self.started = false;
    Ok(())
  }

  fn capture_image(&mut self) -> Result<Vec<u8>, Self::Error> {
    if !self.started {
      return Err(ImageFileCameraError::NotStarted);
    }
    Ok(std::fs::read(&self.path)?)
  }
}
