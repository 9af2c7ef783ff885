// 该文件是 Mangguo （芒果） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, FrameError},
  model::Detection,
  output::Render,
};

// 边框线宽（像素）
const BOX_THICKNESS: i32 = 3;

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("帧错误: {0}")]
  FrameError(#[from] FrameError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 在帧上绘制检测框并保存为图像文件
///
/// 只绘制按类别着色的边框，不绘制类别名与置信度标签（没有随附字体）。
pub struct SaveImageFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(Self::new(uri.path()))
  }
}

/// 类别颜色，0 号类别为绿色，其余按色相错开
pub fn class_color(class_id: usize) -> Rgba<u8> {
  let hue = (120.0 + class_id as f32 * 137.5) % 360.0;
  hsv_to_rgba(hue, 0.8, 0.9)
}

fn hsv_to_rgba(h: f32, s: f32, v: f32) -> Rgba<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgba([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
    255,
  ])
}

/// 在图像上绘制检测框，超出图像的部分被裁掉
pub fn draw_detections(image: &mut RgbaImage, detections: &[Detection]) {
  let (img_w, img_h) = (image.width() as f32, image.height() as f32);

  for det in detections {
    let color = class_color(det.class_id);

    let x_min = det.x.max(0.0);
    let y_min = det.y.max(0.0);
    let x_max = det.right().min(img_w);
    let y_max = det.bottom().min(img_h);
    if x_max - x_min < 1.0 || y_max - y_min < 1.0 {
      continue;
    }

    let (x, y) = (x_min as i32, y_min as i32);
    let (w, h) = ((x_max - x_min) as i32, (y_max - y_min) as i32);
    for t in 0..BOX_THICKNESS {
      let (tw, th) = (w - 2 * t, h - 2 * t);
      if tw <= 0 || th <= 0 {
        break;
      }
      let rect = Rect::at(x + t, y + t).of_size(tw as u32, th as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  fn save_image(&self, image: RgbaImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    DynamicImage::ImageRgba8(image).to_rgb8().save(&self.path)?;

    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render<Frame, Vec<Detection>> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &Vec<Detection>) -> Result<(), Self::Error> {
    let mut image = frame.to_rgba_image()?;
    draw_detections(&mut image, result);
    self.save_image(image)
  }
}
