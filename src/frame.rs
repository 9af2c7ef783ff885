// 该文件是 Mangguo （芒果） 项目的一部分。
// src/frame.rs - RGBA 帧定义
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

use image::{ImageBuffer, Rgba, RgbaImage};
use thiserror::Error;

pub const RGBA_CHANNELS: usize = 4;

/// `width * height * 4`，溢出时为 `None`
fn rgba_len(width: u32, height: u32) -> Option<usize> {
  RGBA_CHANNELS
    .checked_mul(width as usize)?
    .checked_mul(height as usize)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
  #[error("帧尺寸无效: {width}x{height}")]
  ZeroDimension { width: u32, height: u32 },
  #[error("帧尺寸过大: {width}x{height}")]
  TooLarge { width: u32, height: u32 },
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  BufferSizeMismatch { expected: usize, actual: usize },
}

/// 帧来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
  /// 摄像头等实时来源
  Live,
  /// 单张图片
  Static,
}

/// 交错排列的 8 位 RGBA 帧
#[derive(Debug, Clone)]
pub struct Frame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
  kind: SourceKind,
}

impl Frame {
  /// 从原始 RGBA 数据构造帧，数据长度必须等于 `width * height * 4`
  pub fn from_rgba(
    width: u32,
    height: u32,
    data: Vec<u8>,
    kind: SourceKind,
  ) -> Result<Self, FrameError> {
    let expected = rgba_len(width, height).ok_or(FrameError::TooLarge { width, height })?;
    if data.len() != expected {
      return Err(FrameError::BufferSizeMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
      kind,
    })
  }

  pub fn from_image(image: RgbaImage, kind: SourceKind) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
      kind,
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn kind(&self) -> SourceKind {
    self.kind
  }

  pub fn as_rgba(&self) -> &[u8] {
    &self.data
  }

  /// 检查帧是否可用于推理
  pub fn validate(&self) -> Result<(), FrameError> {
    if self.width == 0 || self.height == 0 {
      return Err(FrameError::ZeroDimension {
        width: self.width,
        height: self.height,
      });
    }
    Ok(())
  }

  /// 以借用方式查看为 `image` 缓冲区，不复制像素
  pub fn as_image(&self) -> Result<ImageBuffer<Rgba<u8>, &[u8]>, FrameError> {
    self.validate()?;
    ImageBuffer::from_raw(self.width, self.height, self.as_rgba()).ok_or(
      FrameError::BufferSizeMismatch {
        expected: rgba_len(self.width, self.height).unwrap_or(usize::MAX),
        actual: self.data.len(),
      },
    )
  }

  pub fn to_rgba_image(&self) -> Result<RgbaImage, FrameError> {
    self.validate()?;
    RgbaImage::from_raw(self.width, self.height, self.data.to_vec()).ok_or(
      FrameError::BufferSizeMismatch {
        expected: rgba_len(self.width, self.height).unwrap_or(usize::MAX),
        actual: self.data.len(),
      },
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_mismatched_buffer() {
    let err = Frame::from_rgba(2, 2, vec![0; 15], SourceKind::Live).unwrap_err();
    assert_eq!(
      err,
      FrameError::BufferSizeMismatch {
        expected: 16,
        actual: 15
      }
    );
  }

  #[test]
  fn zero_sized_frame_is_invalid() {
    let frame = Frame::from_rgba(0, 4, Vec::new(), SourceKind::Static).unwrap();
    assert!(matches!(
      frame.validate(),
      Err(FrameError::ZeroDimension {
        width: 0,
        height: 4
      })
    ));
    assert!(frame.as_image().is_err());
  }

  #[test]
  fn image_round_trip_keeps_pixels() {
    let mut image = RgbaImage::new(3, 2);
    image.put_pixel(2, 1, Rgba([1, 2, 3, 4]));
    let frame = Frame::from_image(image, SourceKind::Static);
    assert_eq!(frame.width(), 3);
    assert_eq!(frame.height(), 2);
    assert_eq!(frame.kind(), SourceKind::Static);
    let back = frame.to_rgba_image().unwrap();
    assert_eq!(back.get_pixel(2, 1), &Rgba([1, 2, 3, 4]));
  }

  #[test]
  fn rejects_overflowing_dimensions() {
    let err = Frame::from_rgba(u32::MAX, u32::MAX, Vec::new(), SourceKind::Live).unwrap_err();
    assert_eq!(
      err,
      FrameError::TooLarge {
        width: u32::MAX,
        height: u32::MAX
      }
    );
  }
}
