// 该文件是 Mangguo （芒果） 项目的一部分。
// src/model/rescale.rs - 坐标还原
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

use crate::model::Detection;

/// 模型输入坐标系到原图坐标系的两轴缩放比例
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
  pub x: f32,
  pub y: f32,
}

impl Scale {
  pub fn new(model_input_size: u32, source_width: u32, source_height: u32) -> Self {
    let size = model_input_size as f32;
    Self {
      x: source_width as f32 / size,
      y: source_height as f32 / size,
    }
  }

  pub fn apply(&self, detection: Detection) -> Detection {
    Detection {
      x: detection.x * self.x,
      y: detection.y * self.y,
      w: detection.w * self.x,
      h: detection.h * self.y,
      ..detection
    }
  }
}

/// 将单个检测框从 `S x S` 坐标系映射回原图；结果不裁剪到图像边界
pub fn rescale(
  detection: Detection,
  model_input_size: u32,
  source_width: u32,
  source_height: u32,
) -> Detection {
  Scale::new(model_input_size, source_width, source_height).apply(detection)
}
