// 该文件是 Mangguo （芒果） 项目的一部分。
// src/model.rs - 模型与推理引擎接口
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

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::{
  config::ModelConfig,
  frame::FrameError,
  tensor::{OutputTensor, ShapeError, Tensor},
};

/// 模型输入张量的默认名称
pub const DEFAULT_INPUT_NAME: &str = "images";

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 外部推理引擎。
///
/// 引擎内部不透明，只约定：接收一个命名输入张量，返回按声明顺序排列的
/// 命名输出张量。调度器会在后台线程调用 [`InferenceEngine::run`]，
/// 因此要求 `Send + Sync`。
pub trait InferenceEngine: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn input_name(&self) -> &str {
    DEFAULT_INPUT_NAME
  }

  fn run(&self, name: &str, input: Tensor) -> Result<EngineOutputs, Self::Error>;
}

/// 可以从模型文件内容构造的引擎
pub trait LoadEngine: InferenceEngine + Sized {
  fn load(model: &[u8], config: &ModelConfig) -> Result<Self, Self::Error>;
}

/// 按声明顺序排列的输出张量
#[derive(Debug, Clone, Default)]
pub struct EngineOutputs {
  outputs: Vec<(String, OutputTensor)>,
}

impl EngineOutputs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(mut self, name: impl Into<String>, tensor: OutputTensor) -> Self {
    self.push(name, tensor);
    self
  }

  pub fn push(&mut self, name: impl Into<String>, tensor: OutputTensor) {
    self.outputs.push((name.into(), tensor));
  }

  /// 第一个声明的输出，检测流水线只使用它
  pub fn first(&self) -> Option<(&str, &OutputTensor)> {
    self.outputs.first().map(|(n, t)| (n.as_str(), t))
  }

  pub fn get(&self, name: &str) -> Option<&OutputTensor> {
    self
      .outputs
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, t)| t)
  }

  pub fn len(&self) -> usize {
    self.outputs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outputs.is_empty()
  }
}

/// 单个检测结果，`x, y` 为左上角
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub x: f32,
  pub y: f32,
  pub w: f32,
  pub h: f32,
  pub score: f32,
  pub class_id: usize,
  pub class_name: Arc<str>,
}

impl Detection {
  pub fn area(&self) -> f32 {
    self.w * self.h
  }

  pub fn right(&self) -> f32 {
    self.x + self.w
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.h
  }
}

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("帧无效: {0}")]
  InvalidFrame(#[from] FrameError),
  #[error("推理失败: {0}")]
  Inference(Box<dyn std::error::Error + Send + Sync>),
  #[error("推理引擎没有返回任何输出")]
  MissingOutput,
  #[error("输出张量形状错误: {0}")]
  MalformedOutput(#[from] ShapeError),
}

impl DetectError {
  pub fn inference<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    DetectError::Inference(Box::new(e))
  }
}

mod detector;
pub mod nms;
mod replay;
pub mod rescale;
pub mod yolo;

pub use self::detector::{Detector, DetectorBuilder, DetectorError, postprocess};
pub use self::nms::{iou, suppress};
pub use self::replay::{ReplayEngine, ReplayError};
pub use self::rescale::{Scale, rescale};
pub use self::yolo::decode;
