// 该文件是 Shibie （识别） 项目的一部分。
// src/capture/v4l_camera.rs - V4L2 相机
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
use tracing::{error, info, warn};
use url::Url;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::{FromUrl, FromUrlWithScheme, capture::Camera, decoded_path};

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const CAPTURE_BUFFERS: u32 = 2;

#[derive(Error, Debug)]
pub enum V4lCameraError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Invalid parameter: {0}")]
  InvalidParameter(String),
  #[error("Unsupported pixel format: {0}")]
  UnsupportedPixelFormat(String),
  #[error("Camera is not started")]
  NotStarted,
}

/// V4L2 摄像头，以 MJPEG 格式拍照，拍到的每一帧就是一张 JPEG
pub struct V4lCamera {
  device_path: String,
  width: u32,
  height: u32,
  device: Option<Device>,
}

impl FromUrlWithScheme for V4lCamera {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lCamera {
  type Error = V4lCameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lCameraError::SchemaMismatch);
    }

    // v4l:///dev/video0?width=640&height=480
    let device_path = match decoded_path(url).as_str() {
      "" | "/" => DEFAULT_DEVICE.to_string(),
      path => path.to_string(),
    };

    let mut width = DEFAULT_WIDTH;
    let mut height = DEFAULT_HEIGHT;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "width" => {
          width = value
            .parse()
            .map_err(|_| V4lCameraError::InvalidParameter(format!("width={}", value)))?
        }
        "height" => {
          height = value
            .parse()
            .map_err(|_| V4lCameraError::InvalidParameter(format!("height={}", value)))?
        }
        other => warn!("忽略未知参数: {}", other),
      }
    }

    Ok(V4lCamera {
      device_path,
      width,
      height,
      device: None,
    })
  }
}

impl Camera for V4lCamera {
  type Error = V4lCameraError;

  fn start(&mut self) -> Result<(), Self::Error> {
    let device = Device::with_path(&self.device_path)?;

    let mut format = device.format()?;
    format.width = self.width;
    format.height = self.height;
    format.fourcc = FourCC::new(b"MJPG");
    let format = device.set_format(&format)?;

    if format.fourcc != FourCC::new(b"MJPG") {
      return Err(V4lCameraError::UnsupportedPixelFormat(
        format.fourcc.to_string(),
      ));
    }

    info!(
      "V4L2 相机已启动: {} {}x{}",
      self.device_path, format.width, format.height
    );
    self.device = Some(device);
    Ok(())
  }

  fn stop(&mut self) -> Result<(), Self::Error> {
    if self.device.take().is_some() {
      info!("V4L2 相机已停止: {}", self.device_path);
    }
    Ok(())
  }

  fn capture_image(&mut self) -> Result<Vec<u8>, Self::Error> {
    let device = self.device.as_ref().ok_or(V4lCameraError::NotStarted)?;

    // 单张拍照，每次重建流即可
    let mut stream = Stream::with_buffers(device, Type::VideoCapture, CAPTURE_BUFFERS)?;
    let (buffer, metadata) = CaptureStream::next(&mut stream)?;
    let used = match metadata.bytesused as usize {
      0 => buffer.len(),
      n => n.min(buffer.len()),
    };
    Ok(buffer[..used].to_vec())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_url_reads_device_and_size() {
    let url = Url::parse("v4l:///dev/video2?width=1280&height=720").unwrap();
    let camera = V4lCamera::from_url(&url).unwrap();
    assert_eq!(camera.device_path, "/dev/video2");
    assert_eq!((camera.width, camera.height), (1280, 720));
  }

  #[test]
  fn from_url_defaults() {
    let url = Url::parse("v4l:///").unwrap();
    let camera = V4lCamera::from_url(&url).unwrap();
    assert_eq!(camera.device_path, DEFAULT_DEVICE);
    assert_eq!((camera.width, camera.height), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
  }

  #[test]
  fn from_url_rejects_bad_width() {
    let url = Url::parse("v4l:///dev/video0?width=wide").unwrap();
    assert!(matches!(
      V4lCamera::from_url(&url),
      Err(V4lCameraError::InvalidParameter(_))
    ));
  }
}
