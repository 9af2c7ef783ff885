// 该文件是 Mangguo （芒果） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use tracing::debug;

use crate::model::Detection;

/// 计算两个边界框的 IoU
#[inline]
pub fn iou(a: &Detection, b: &Detection) -> f32 {
  let x1 = a.x.max(b.x);
  let y1 = a.y.max(b.y);
  let x2 = a.right().min(b.right());
  let y2 = a.bottom().min(b.bottom());

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.area() + b.area() - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 跨类别的非极大值抑制。
///
/// 按分数降序稳定排序（同分保持输入顺序），依次保留未被抑制的框，
/// 并抑制其后所有 IoU 大于 `iou_threshold` 的框，不区分类别。
/// 排在已保留框之前的条目此时都已确定（保留或被抑制），且已保留的框
/// 与当前框的 IoU 不超过阈值，因此只需向后扫描。
/// 输出按保留顺序排列。
pub fn suppress(candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  let total = candidates.len();
  if total < 2 {
    return candidates;
  }

  let mut order: Vec<usize> = (0..total).collect();
  order.sort_by(|&a, &b| {
    candidates[b]
      .score
      .partial_cmp(&candidates[a].score)
      .unwrap_or(Ordering::Equal)
  });

  let mut suppressed = vec![false; total];
  let mut kept = Vec::new();

  for (pos, &i) in order.iter().enumerate() {
    if suppressed[i] {
      continue;
    }
    kept.push(i);

    let best = &candidates[i];
    for &j in &order[pos + 1..] {
      if !suppressed[j] && iou(best, &candidates[j]) > iou_threshold {
        suppressed[j] = true;
      }
    }
  }

  debug!("NMS: {} 个候选, 保留 {} 个", total, kept.len());

  let mut slots: Vec<Option<Detection>> = candidates.into_iter().map(Some).collect();
  kept.into_iter().filter_map(|i| slots[i].take()).collect()
}
