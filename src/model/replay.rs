// 该文件是 Mangguo （芒果） 项目的一部分。
// src/model/replay.rs - 回放推理引擎
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
use tracing::{debug, info};

use crate::{
  config::ModelConfig,
  model::{EngineOutputs, InferenceEngine, LoadEngine},
  tensor::{BOX_ROWS, OutputTensor, Tensor},
};

const REPLAY_OUTPUT_NAME: &str = "output0";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
  #[error("输出文件长度 {0} 字节不是 4 的倍数")]
  Unaligned(usize),
  #[error("输出文件包含 {values} 个数值, 无法按 {rows} 行划分")]
  Rows { values: usize, rows: usize },
  #[error("输入张量形状错误: 期望 {expected:?}, 实际 {actual:?}")]
  InputShape {
    expected: [usize; 4],
    actual: [usize; 4],
  },
}

/// 回放一次记录下来的检测头输出。
///
/// 记录文件为小端 f32 序列，按 `[1, 4+C, N]` 行主序排列。
/// 每次推理都返回同一份输出，用于离线调试后处理流程。
#[derive(Debug, Clone)]
pub struct ReplayEngine {
  output: OutputTensor,
  input_size: Option<usize>,
}

impl ReplayEngine {
  pub fn new(output: OutputTensor) -> Self {
    Self {
      output,
      input_size: None,
    }
  }

  pub fn from_dump(bytes: &[u8], num_classes: usize) -> Result<Self, ReplayError> {
    if bytes.len() % 4 != 0 {
      return Err(ReplayError::Unaligned(bytes.len()));
    }

    let data: Vec<f32> = bytes
      .chunks_exact(4)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect();

    let rows = BOX_ROWS + num_classes;
    if data.is_empty() || data.len() % rows != 0 {
      return Err(ReplayError::Rows {
        values: data.len(),
        rows,
      });
    }

    let anchors = data.len() / rows;
    debug!("回放输出: [1, {}, {}]", rows, anchors);
    Ok(Self::new(OutputTensor::new(vec![1, rows, anchors], data)))
  }

  /// 要求输入张量边长为 `size`
  pub fn with_input_size(mut self, size: usize) -> Self {
    self.input_size = Some(size);
    self
  }
}

impl InferenceEngine for ReplayEngine {
  type Error = ReplayError;

  fn run(&self, _name: &str, input: Tensor) -> Result<EngineOutputs, Self::Error> {
    if let Some(size) = self.input_size {
      let expected = [1, 3, size, size];
      if input.shape() != expected {
        return Err(ReplayError::InputShape {
          expected,
          actual: input.shape(),
        });
      }
    }
    Ok(EngineOutputs::new().with(REPLAY_OUTPUT_NAME, self.output.clone()))
  }
}

impl LoadEngine for ReplayEngine {
  fn load(model: &[u8], config: &ModelConfig) -> Result<Self, Self::Error> {
    info!("加载回放输出: {} 字节", model.len());
    Ok(Self::from_dump(model, config.num_classes)?.with_input_size(config.input_size as usize))
  }
}
