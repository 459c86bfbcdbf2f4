// 该文件是 Shibie （识别） 项目的一部分。
// src/capture.rs - 拍照输入与预处理
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

use image::imageops::{self, FilterType};
use thiserror::Error;
use tracing::debug;

use crate::{FromUrl, frame::RgbNhwcFrame};

/// 相机：每次拍照给出一张编码后的图像（通常是 JPEG）
pub trait Camera {
  type Error: std::error::Error + Send + Sync + 'static;

  fn start(&mut self) -> Result<(), Self::Error>;
  fn stop(&mut self) -> Result<(), Self::Error>;
  fn capture_image(&mut self) -> Result<Vec<u8>, Self::Error>;
}

#[cfg(feature = "read_image_file")]
mod image_file;
#[cfg(feature = "read_image_file")]
pub use self::image_file::{ImageFileCamera, ImageFileCameraError};

#[cfg(feature = "v4l_camera")]
mod v4l_camera;
#[cfg(feature = "v4l_camera")]
pub use self::v4l_camera::{V4lCamera, V4lCameraError};

#[derive(Error, Debug)]
pub enum CaptureError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件相机错误: {0}")]
  ImageFileCameraError(#[from] ImageFileCameraError),
  #[cfg(feature = "v4l_camera")]
  #[error("V4L 相机错误: {0}")]
  V4lCameraError(#[from] V4lCameraError),
  #[error("图像解码错误: {0}")]
  Decode(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把拍到的字节解码，并缩放为 edge x edge 的正方形帧
///
/// 缩放不保持宽高比，使用最近邻插值。
pub fn decode_and_resize(picture: &[u8], edge: u32) -> Result<RgbNhwcFrame, CaptureError> {
  let image = image::load_from_memory(picture)?.to_rgb8();
  debug!(
    "解码完成: {}x{} -> {}x{}",
    image.width(),
    image.height(),
    edge,
    edge
  );
  let resized = imageops::resize(&image, edge, edge, FilterType::Nearest);
  Ok(RgbNhwcFrame::from(resized))
}

pub enum CameraWrapper {
  #[cfg(feature = "read_image_file")]
  ImageFile(ImageFileCamera),
  #[cfg(feature = "v4l_camera")]
  V4l(V4lCamera),
}

impl FromUrl for CameraWrapper {
  type Error = CaptureError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileCamera::SCHEME {
        return Ok(CameraWrapper::ImageFile(ImageFileCamera::from_url(url)?));
      }
    }
    #[cfg(feature = "v4l_camera")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == V4lCamera::SCHEME {
        return Ok(CameraWrapper::V4l(V4lCamera::from_url(url)?));
      }
    }
    Err(CaptureError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl Camera for CameraWrapper {
  type Error = CaptureError;

  fn start(&mut self) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "read_image_file")]
      CameraWrapper::ImageFile(camera) => camera.start().map_err(CaptureError::from),
      #[cfg(feature = "v4l_camera")]
      CameraWrapper::V4l(camera) => camera.start().map_err(CaptureError::from),
    }
  }

  fn stop(&mut self) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "read_image_file")]
      CameraWrapper::ImageFile(camera) => camera.stop().map_err(CaptureError::from),
      #[cfg(feature = "v4l_camera")]
      CameraWrapper::V4l(camera) => camera.stop().map_err(CaptureError::from),
    }
  }

  fn capture_image(&mut self) -> Result<Vec<u8>, Self::Error> {
    match self {
      #[cfg(feature = "read_image_file")]
      CameraWrapper::ImageFile(camera) => camera.capture_image().map_err(CaptureError::from),
      #[cfg(feature = "v4l_camera")]
      CameraWrapper::V4l(camera) => camera.capture_image().map_err(CaptureError::from),
    }
  }
}
