// 该文件是 Mangguo （芒果） 项目的一部分。
// src/preprocess.rs - 帧预处理
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
use tracing::debug;

use crate::{
  frame::{Frame, FrameError, RGBA_CHANNELS},
  tensor::Tensor,
};

/// 将帧整体拉伸到 `size x size` 并转换为平面归一化张量。
///
/// 不保持宽高比，水平与垂直方向分别缩放，坐标还原时同样按两个方向
/// 各自的比例处理。alpha 通道被丢弃。
pub fn preprocess(frame: &Frame, size: u32) -> Result<Tensor, FrameError> {
  let view = frame.as_image()?;
  if size == 0 {
    return Err(FrameError::ZeroDimension {
      width: size,
      height: size,
    });
  }

  debug!(
    "预处理: {}x{} -> {}x{}",
    frame.width(),
    frame.height(),
    size,
    size
  );

  let side = size as usize;
  let plane = side * side;
  let mut data = vec![0.0f32; 3 * plane];

  if frame.width() == size && frame.height() == size {
    planarize(frame.as_rgba(), plane, &mut data);
  } else {
    let resized = imageops::resize(&view, size, size, FilterType::Triangle);
    planarize(resized.as_raw(), plane, &mut data);
  }

  Ok(Tensor::from_planar(data, side))
}

// RGBA 交错 -> RRR..GGG..BBB..
fn planarize(rgba: &[u8], plane: usize, out: &mut [f32]) {
  let (red, rest) = out.split_at_mut(plane);
  let (green, blue) = rest.split_at_mut(plane);
  for (i, px) in rgba.chunks_exact(RGBA_CHANNELS).enumerate() {
    red[i] = px[0] as f32 / 255.0;
    green[i] = px[1] as f32 / 255.0;
    blue[i] = px[2] as f32 / 255.0;
  }
}
