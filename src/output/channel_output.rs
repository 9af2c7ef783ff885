// 该文件是 Mangguo （芒果） 项目的一部分。
// src/output/channel_output.rs - 通道输出
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

use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;

use crate::{
  frame::Frame,
  model::Detection,
  output::{DetectionSummary, Render},
};

#[derive(Error, Debug)]
pub enum ChannelOutputError {
  #[error("接收端已关闭")]
  Disconnected,
}

/// 交给界面线程的一次检测结果
#[derive(Debug, Clone)]
pub struct DetectionMessage {
  pub width: u32,
  pub height: u32,
  pub detections: Vec<Detection>,
  pub summary: DetectionSummary,
}

/// 通过 `mpsc` 通道把结果交给绘制线程，帧本身不随结果发送
#[derive(Clone)]
pub struct ChannelOutput {
  tx: Sender<DetectionMessage>,
}

impl ChannelOutput {
  pub fn new() -> (Self, Receiver<DetectionMessage>) {
    let (tx, rx) = mpsc::channel();
    (Self { tx }, rx)
  }
}

impl Render<Frame, Vec<Detection>> for ChannelOutput {
  type Error = ChannelOutputError;

  fn render_result(&self, frame: &Frame, result: &Vec<Detection>) -> Result<(), Self::Error> {
    self
      .tx
      .send(DetectionMessage {
        width: frame.width(),
        height: frame.height(),
        detections: result.clone(),
        summary: DetectionSummary::of(result),
      })
      .map_err(|_| ChannelOutputError::Disconnected)
  }
}
