// 该文件是 Mangguo （芒果） 项目的一部分。
// src/tensor.rs - 模型输入输出张量
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

const RGB_CHANNELS: usize = 3;

/// 四个边框回归行：cx, cy, w, h
pub const BOX_ROWS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
  #[error("输出维度错误: 期望 3 维 [1, 4+C, N], 实际 {0:?}")]
  Rank(Vec<usize>),
  #[error("批大小必须为 1, 实际为 {0}")]
  Batch(usize),
  #[error("输出行数不匹配: 期望 {expected}, 实际 {actual}")]
  Rows { expected: usize, actual: usize },
  #[error("输出形状 {0:?} 的元素数超出可寻址范围")]
  Overflow(Vec<usize>),
  #[error("数据长度不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际 {actual}")]
  Length {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
}

/// 模型输入张量，形状 `[1, 3, S, S]`，平面 RGB，取值范围 `[0, 1]`
#[derive(Debug, Clone)]
pub struct Tensor {
  data: Box<[f32]>,
  size: usize,
}

impl Tensor {
  pub(crate) fn from_planar(data: Vec<f32>, size: usize) -> Self {
    debug_assert_eq!(data.len(), RGB_CHANNELS * size * size);
    Self {
      data: data.into_boxed_slice(),
      size,
    }
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.size, self.size]
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  /// 第 `c` 个通道平面
  pub fn channel(&self, c: usize) -> &[f32] {
    let plane = self.size * self.size;
    &self.data[c * plane..(c + 1) * plane]
  }

  pub fn into_data(self) -> Box<[f32]> {
    self.data
  }
}

/// 推理引擎返回的单个输出张量
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

impl OutputTensor {
  pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
    Self { shape, data }
  }
}

/// 检测头原始输出的只读视图，形状 `[1, 4+C, N]`，
/// 元素 `(row, n)` 位于 `row * N + n`
#[derive(Debug, Clone, Copy)]
pub struct RawOutput<'a> {
  data: &'a [f32],
  num_classes: usize,
  anchors: usize,
}

impl<'a> RawOutput<'a> {
  pub fn new(tensor: &'a OutputTensor, num_classes: usize) -> Result<Self, ShapeError> {
    let [batch, rows, anchors] = match tensor.shape.as_slice() {
      &[b, r, n] => [b, r, n],
      other => return Err(ShapeError::Rank(other.to_vec())),
    };

    if batch != 1 {
      return Err(ShapeError::Batch(batch));
    }

    let expected_rows = BOX_ROWS + num_classes;
    if rows != expected_rows {
      return Err(ShapeError::Rows {
        expected: expected_rows,
        actual: rows,
      });
    }

    let expected = rows
      .checked_mul(anchors)
      .ok_or_else(|| ShapeError::Overflow(tensor.shape.clone()))?;
    if tensor.data.len() != expected {
      return Err(ShapeError::Length {
        shape: tensor.shape.clone(),
        expected,
        actual: tensor.data.len(),
      });
    }

    Ok(Self {
      data: &tensor.data,
      num_classes,
      anchors,
    })
  }

  pub fn anchors(&self) -> usize {
    self.anchors
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  /// 第 `row` 行全部 N 个候选的数值
  pub fn row(&self, row: usize) -> &'a [f32] {
    &self.data[row * self.anchors..(row + 1) * self.anchors]
  }

  #[inline]
  pub fn at(&self, row: usize, n: usize) -> f32 {
    self.data[row * self.anchors + n]
  }
}
