// 该文件是 Mangguo （芒果） 项目的一部分。
// src/model/yolo.rs - YOLO 检测头解码
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

use tracing::debug;

use crate::{
  config::ModelConfig,
  model::Detection,
  tensor::{BOX_ROWS, RawOutput},
};

/// 将 `[1, 4+C, N]` 输出解码为候选框（模型输入坐标系，未做 NMS）。
///
/// 每个候选取最高类别分数（并列时取最小类别号），分数严格大于
/// `confidence_threshold` 才保留。输出按候选序号 `n` 升序排列。
pub fn decode(raw: &RawOutput, config: &ModelConfig) -> Vec<Detection> {
  let anchors = raw.anchors();
  let threshold = config.confidence_threshold;

  let (cx, cy, cw, ch) = (raw.row(0), raw.row(1), raw.row(2), raw.row(3));
  let class_rows: Vec<&[f32]> = (0..raw.num_classes())
    .map(|c| raw.row(BOX_ROWS + c))
    .collect();
  if class_rows.is_empty() {
    return Vec::new();
  }

  let mut items = Vec::new();
  for n in 0..anchors {
    let (score, class_id) = {
      let mut max_score = class_rows[0][n];
      let mut cls_idx = 0usize;
      for (c, row) in class_rows.iter().enumerate().skip(1) {
        if row[n] > max_score {
          max_score = row[n];
          cls_idx = c;
        }
      }
      (max_score, cls_idx)
    };

    if !(score > threshold) {
      continue;
    }

    let (w, h) = (cw[n], ch[n]);
    items.push(Detection {
      x: cx[n] - w / 2.0,
      y: cy[n] - h / 2.0,
      w,
      h,
      score,
      class_id,
      class_name: config
        .class_name(class_id)
        .cloned()
        .unwrap_or_else(|| Arc::from("unknown")),
    });
  }

  debug!("解码 {} 个候选, 超过阈值 {} 个", anchors, items.len());
  items
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tensor::OutputTensor;

  fn config(threshold: f32) -> ModelConfig {
    ModelConfig {
      input_size: 640,
      num_classes: 2,
      class_names: vec![Arc::from("mangoTree"), Arc::from("notMangoTree")],
      confidence_threshold: threshold,
      iou_threshold: 0.45,
    }
  }

  // 按列（候选）给出 [cx, cy, w, h, s0, s1]，组装成行主序输出
  fn output(columns: &[[f32; 6]]) -> OutputTensor {
    let n = columns.len();
    let mut data = vec![0.0; 6 * n];
    for (i, col) in columns.iter().enumerate() {
      for (row, v) in col.iter().enumerate() {
        data[row * n + i] = *v;
      }
    }
    OutputTensor::new(vec![1, 6, n], data)
  }

  #[test]
  fn keeps_only_candidates_above_threshold() {
    let tensor = output(&[
      [100.0, 100.0, 50.0, 40.0, 0.1, 0.9],
      [300.0, 300.0, 20.0, 20.0, 0.1, 0.05],
    ]);
    let raw = RawOutput::new(&tensor, 2).unwrap();
    let items = decode(&raw, &config(0.5));

    assert_eq!(items.len(), 1);
    let d = &items[0];
    assert_eq!(d.score, 0.9);
    assert_eq!(d.class_id, 1);
    assert_eq!(&*d.class_name, "notMangoTree");
    assert_eq!((d.x, d.y, d.w, d.h), (75.0, 80.0, 50.0, 40.0));
  }

  #[test]
  fn threshold_is_strict() {
    let tensor = output(&[[10.0, 10.0, 2.0, 2.0, 0.5, 0.2]]);
    let raw = RawOutput::new(&tensor, 2).unwrap();
    assert!(decode(&raw, &config(0.5)).is_empty());
  }

  #[test]
  fn ties_pick_lowest_class() {
    let tensor = output(&[[10.0, 10.0, 2.0, 2.0, 0.7, 0.7]]);
    let raw = RawOutput::new(&tensor, 2).unwrap();
    let items = decode(&raw, &config(0.5));
    assert_eq!(items[0].class_id, 0);
  }

  #[test]
  fn emits_in_anchor_order() {
    let tensor = output(&[
      [10.0, 10.0, 2.0, 2.0, 0.6, 0.0],
      [20.0, 20.0, 2.0, 2.0, 0.0, 0.0],
      [30.0, 30.0, 2.0, 2.0, 0.0, 0.95],
      [40.0, 40.0, 2.0, 2.0, 0.8, 0.0],
    ]);
    let raw = RawOutput::new(&tensor, 2).unwrap();
    let xs: Vec<f32> = decode(&raw, &config(0.5)).iter().map(|d| d.x).collect();
    assert_eq!(xs, vec![9.0, 29.0, 39.0]);
  }

  #[test]
  fn every_emitted_score_exceeds_threshold() {
    let columns: Vec<[f32; 6]> = (0..64)
      .map(|i| {
        let s = i as f32 / 64.0;
        [i as f32, i as f32, 4.0, 4.0, s, 1.0 - s]
      })
      .collect();
    let tensor = output(&columns);
    let raw = RawOutput::new(&tensor, 2).unwrap();
    for threshold in [0.1, 0.5, 0.75, 0.99] {
      let cfg = config(threshold);
      assert!(decode(&raw, &cfg).iter().all(|d| d.score > threshold));
    }
  }
}
