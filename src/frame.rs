// 该文件是 Shibie （识别） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use image::RgbImage;

const RGB_CHANNELS: usize = 3;

/// 按 NHWC 排列的 RGB 帧，batch 固定为 1
#[derive(Debug, Clone)]
pub struct RgbNhwcFrame {
  data: Box<[u8]>,
  height: usize,
  width: usize,
}

impl RgbNhwcFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let data = vec![0u8; RGB_CHANNELS * height * width].into_boxed_slice();
    Self {
      data,
      height,
      width,
    }
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  /// 读取 (x, y) 处的像素
  pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
    let index = (y * self.width + x) * RGB_CHANNELS;
    [self.data[index], self.data[index + 1], self.data[index + 2]]
  }
}

impl AsMut<[u8]> for RgbNhwcFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl From<RgbImage> for RgbNhwcFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    // RgbImage 本身就是 HWC 排列
    Self {
      data: image.into_raw().into_boxed_slice(),
      height: height as usize,
      width: width as usize,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_rgb_image_keeps_hwc_layout() {
    let mut image = RgbImage::new(3, 2);
    image.put_pixel(2, 1, image::Rgb([10, 20, 30]));
    image.put_pixel(0, 1, image::Rgb([1, 2, 3]));

    let frame = RgbNhwcFrame::from(image);

    assert_eq!(frame.width(), 3);
    assert_eq!(frame.height(), 2);
    assert_eq!(frame.as_nhwc().len(), 3 * 2 * 3);
    assert_eq!(frame.pixel(2, 1), [10, 20, 30]);
    assert_eq!(frame.pixel(0, 1), [1, 2, 3]);
    assert_eq!(frame.pixel(0, 0), [0, 0, 0]);
  }

  #[test]
  fn with_shape_is_zeroed() {
    let mut frame = RgbNhwcFrame::with_shape(4, 5);
    assert!(frame.as_nhwc().iter().all(|v| *v == 0));
    frame.as_mut()[0] = 7;
    assert_eq!(frame.pixel(0, 0), [7, 0, 0]);
  }
}
