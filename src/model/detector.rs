// 该文件是 Mangguo （芒果） 项目的一部分。
// src/model/detector.rs - 检测器句柄
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

use std::{path::PathBuf, sync::Arc, time::Instant};

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::{ConfigError, ModelConfig},
  frame::Frame,
  model::{
    DetectError, Detection, EngineOutputs, InferenceEngine, LoadEngine, Model, Scale, decode,
    suppress,
  },
  preprocess::preprocess,
  tensor::{OutputTensor, RawOutput, ShapeError, Tensor},
};

/// 未指定配置文件时，在模型文件同目录下查找的文件名
pub const DEFAULT_CONFIG_FILE: &str = "model_config.json";

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("模型配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("模型加载错误: {0}")]
  ModelLoad(#[from] std::io::Error),
  #[error("推理引擎初始化失败: {0}")]
  Engine(Box<dyn std::error::Error + Send + Sync>),
  #[error("模型路径错误: {0}")]
  ModelPath(String),
}

/// 显式构造的检测器句柄：推理引擎 + 模型配置。
///
/// 构造一次后按值克隆共享，克隆只增加引用计数。
pub struct Detector<E> {
  engine: Arc<E>,
  config: Arc<ModelConfig>,
}

impl<E> Clone for Detector<E> {
  fn clone(&self) -> Self {
    Self {
      engine: Arc::clone(&self.engine),
      config: Arc::clone(&self.config),
    }
  }
}

impl<E: InferenceEngine> Detector<E> {
  pub fn new(engine: E, config: ModelConfig) -> Result<Self, DetectorError> {
    config.validate()?;
    Ok(Self {
      engine: Arc::new(engine),
      config: Arc::new(config),
    })
  }

  pub fn config(&self) -> &ModelConfig {
    &self.config
  }

  pub fn engine(&self) -> &Arc<E> {
    &self.engine
  }

  /// 预处理：帧 → `[1, 3, S, S]` 张量
  pub fn prepare(&self, frame: &Frame) -> Result<Tensor, DetectError> {
    Ok(preprocess(frame, self.config.input_size)?)
  }

  /// 调用推理引擎，张量在此被消费
  pub fn run(&self, tensor: Tensor) -> Result<EngineOutputs, DetectError> {
    run_engine(&*self.engine, tensor)
  }

  /// 后处理：取第一个输出，解码、还原坐标、NMS
  pub fn finish(
    &self,
    outputs: &EngineOutputs,
    source_width: u32,
    source_height: u32,
  ) -> Result<Vec<Detection>, DetectError> {
    let (name, output) = outputs.first().ok_or(DetectError::MissingOutput)?;
    debug!("使用输出 {} {:?}", name, output.shape);
    Ok(postprocess(
      output,
      &self.config,
      source_width,
      source_height,
    )?)
  }
}

fn run_engine<E: InferenceEngine>(
  engine: &E,
  tensor: Tensor,
) -> Result<EngineOutputs, DetectError> {
  let now = Instant::now();
  let outputs = engine
    .run(engine.input_name(), tensor)
    .map_err(DetectError::inference)?;
  debug!("推理完成，耗时: {:.2?}", now.elapsed());
  Ok(outputs)
}

/// 检测头输出 → 原图坐标系下的最终检测结果
pub fn postprocess(
  output: &OutputTensor,
  config: &ModelConfig,
  source_width: u32,
  source_height: u32,
) -> Result<Vec<Detection>, ShapeError> {
  let raw = RawOutput::new(output, config.num_classes)?;
  let scale = Scale::new(config.input_size, source_width, source_height);
  let candidates = decode(&raw, config)
    .into_iter()
    .map(|d| scale.apply(d))
    .collect();
  Ok(suppress(candidates, config.iou_threshold))
}

impl<E: InferenceEngine> Model for Detector<E> {
  type Input = Frame;
  type Output = Vec<Detection>;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = self.prepare(input)?;
    let outputs = self.run(tensor)?;
    self.finish(&outputs, input.width(), input.height())
  }
}

/// 从模型文件与配置文件构造 [`Detector`]
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
  model_path: PathBuf,
  config_path: PathBuf,
}

impl FromUrlWithScheme for DetectorBuilder {
  const SCHEME: &'static str = "model";
}

impl FromUrl for DetectorBuilder {
  type Error = DetectorError;

  /// `model:///models/model.onnx?config=/models/model_config.json`，
  /// 省略 `config` 时使用模型同目录下的 `model_config.json`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::ModelPath(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let builder = DetectorBuilder::new(url.path());
    Ok(
      match url.query_pairs().find(|(k, _)| *k == "config") {
        Some((_, v)) => builder.config(v.into_owned()),
        None => builder,
      },
    )
  }
}

impl DetectorBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    let model_path = model_path.into();
    let config_path = model_path.with_file_name(DEFAULT_CONFIG_FILE);
    Self {
      model_path,
      config_path,
    }
  }

  pub fn config(mut self, config_path: impl Into<PathBuf>) -> Self {
    self.config_path = config_path.into();
    self
  }

  pub fn build<E: LoadEngine>(self) -> Result<Detector<E>, DetectorError> {
    info!("加载模型配置: {}", self.config_path.display());
    let config = ModelConfig::from_path(&self.config_path)?;
    debug!("模型配置: {:?}", config);

    info!("加载模型文件: {}", self.model_path.display());
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let engine = E::load(&model_data, &config).map_err(|e| {
      error!("推理引擎初始化失败: {}", e);
      DetectorError::Engine(Box::new(e))
    })?;
    info!("模型加载完成");

    Detector::new(engine, config)
  }
}
