// 该文件是 Mangguo （芒果） 项目的一部分。
// src/config.rs - 模型配置
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

use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置文件读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("配置项无效: {field} = {value}")]
  Invalid { field: &'static str, value: String },
}

/// 与模型一同发布的 JSON 配置
///
/// ```json
/// {
///   "input_size": 640,
///   "num_classes": 2,
///   "class_names": ["mangoTree", "notMangoTree"],
///   "confidence_threshold": 0.5,
///   "iou_threshold": 0.45
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
  /// 模型输入边长 S
  pub input_size: u32,
  /// 类别数量 C
  pub num_classes: usize,
  /// 类别名称，长度为 C
  pub class_names: Vec<Arc<str>>,
  /// 置信度阈值，开区间 (0, 1)
  pub confidence_threshold: f32,
  /// NMS IoU 阈值，区间 (0, 1]
  pub iou_threshold: f32,
}

impl ModelConfig {
  pub fn from_json(text: &str) -> Result<Self, ConfigError> {
    let config: ModelConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    debug!("读取模型配置: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Self::from_json(&text).inspect_err(|e| error!("模型配置 {} 无效: {}", path.display(), e))
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    fn invalid(field: &'static str, value: impl ToString) -> ConfigError {
      ConfigError::Invalid {
        field,
        value: value.to_string(),
      }
    }

    if self.input_size == 0 {
      return Err(invalid("input_size", self.input_size));
    }
    if self.num_classes == 0 {
      return Err(invalid("num_classes", self.num_classes));
    }
    if self.class_names.len() != self.num_classes {
      return Err(invalid(
        "class_names",
        format!(
          "{} 个名称, 但 num_classes 为 {}",
          self.class_names.len(),
          self.num_classes
        ),
      ));
    }
    if !(self.confidence_threshold > 0.0 && self.confidence_threshold < 1.0) {
      return Err(invalid("confidence_threshold", self.confidence_threshold));
    }
    if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
      return Err(invalid("iou_threshold", self.iou_threshold));
    }
    Ok(())
  }

  pub fn class_name(&self, class_id: usize) -> Option<&Arc<str>> {
    self.class_names.get(class_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const MANGO: &str = r#"{
    "input_size": 640,
    "num_classes": 2,
    "class_names": ["mangoTree", "notMangoTree"],
    "confidence_threshold": 0.5,
    "iou_threshold": 0.45
  }"#;

  #[test]
  fn parses_valid_config() {
    let config = ModelConfig::from_json(MANGO).unwrap();
    assert_eq!(config.input_size, 640);
    assert_eq!(config.num_classes, 2);
    assert_eq!(config.class_name(1).map(|s| &**s), Some("notMangoTree"));
    assert_eq!(config.class_name(2), None);
  }

  #[test]
  fn rejects_class_name_count_mismatch() {
    let text = MANGO.replace(r#"["mangoTree", "notMangoTree"]"#, r#"["mangoTree"]"#);
    assert!(matches!(
      ModelConfig::from_json(&text),
      Err(ConfigError::Invalid {
        field: "class_names",
        ..
      })
    ));
  }

  #[test]
  fn rejects_out_of_range_thresholds() {
    for (from, to, field) in [
      ("\"confidence_threshold\": 0.5", "\"confidence_threshold\": 1.0", "confidence_threshold"),
      ("\"confidence_threshold\": 0.5", "\"confidence_threshold\": 0.0", "confidence_threshold"),
      ("\"iou_threshold\": 0.45", "\"iou_threshold\": 0.0", "iou_threshold"),
      ("\"iou_threshold\": 0.45", "\"iou_threshold\": 1.5", "iou_threshold"),
      ("\"input_size\": 640", "\"input_size\": 0", "input_size"),
    ] {
      let text = MANGO.replace(from, to);
      match ModelConfig::from_json(&text) {
        Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(f, field),
        other => panic!("{} 应当无效, 实际 {:?}", to, other),
      }
    }
  }

  #[test]
  fn iou_threshold_of_one_is_allowed() {
    let text = MANGO.replace("\"iou_threshold\": 0.45", "\"iou_threshold\": 1.0");
    assert!(ModelConfig::from_json(&text).is_ok());
  }

  #[test]
  fn missing_key_is_parse_error() {
    let text = MANGO.replace("\"input_size\": 640,", "");
    assert!(matches!(
      ModelConfig::from_json(&text),
      Err(ConfigError::Parse(_))
    ));
  }
}
