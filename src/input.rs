// 该文件是 Mangguo （芒果） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use crate::{
  FromUrl,
  frame::{Frame, SourceKind},
};

/// 帧源。
///
/// 实时来源在每收到一帧完整数据后报告一次就绪；静态来源恰好就绪一次。
pub trait FrameSource {
  fn kind(&self) -> SourceKind;

  /// 当前帧宽度，尚无帧时为 0
  fn width(&self) -> u32;

  /// 当前帧高度，尚无帧时为 0
  fn height(&self) -> u32;

  /// 是否有一帧新的、完整缓冲的帧可取
  fn is_ready(&self) -> bool;

  /// 取走就绪的帧；未就绪时返回 `None`
  fn take_frame(&mut self) -> Option<Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
  fn kind(&self) -> SourceKind {
    (**self).kind()
  }

  fn width(&self) -> u32 {
    (**self).width()
  }

  fn height(&self) -> u32 {
    (**self).height()
  }

  fn is_ready(&self) -> bool {
    (**self).is_ready()
  }

  fn take_frame(&mut self) -> Option<Frame> {
    (**self).take_frame()
  }
}

mod frame_slot;
pub use self::frame_slot::{FrameSlot, FrameSlotWriter};

/// 已在内存中的单帧静态来源
#[derive(Debug, Clone)]
pub struct StillFrame {
  width: u32,
  height: u32,
  frame: Option<Frame>,
}

impl StillFrame {
  pub fn new(frame: Frame) -> Self {
    Self {
      width: frame.width(),
      height: frame.height(),
      frame: Some(frame),
    }
  }
}

impl FrameSource for StillFrame {
  fn kind(&self) -> SourceKind {
    SourceKind::Static
  }

  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn is_ready(&self) -> bool {
    self.frame.is_some()
  }

  fn take_frame(&mut self) -> Option<Frame> {
    self.frame.take()
  }
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    let _ = url;
    Err(InputError::SchemeMismatch)
  }
}

impl InputWrapper {
  pub fn into_source(self) -> Box<dyn FrameSource + Send> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => Box::new(input),
    }
  }
}
