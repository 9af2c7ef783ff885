// 该文件是 Mangguo （芒果） 项目的一部分。
// src/task.rs - 检测任务
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

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{
  frame::{Frame, SourceKind},
  input::FrameSource,
  model::{Detection, Detector, InferenceEngine, Model},
  output::Render,
  scheduler::FrameScheduler,
};

/// 停止后等待在途推理返回的最长时间
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 取一帧，同步检测一次，交付渲染
pub struct OneShotTask;

impl<
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: FrameSource,
  M: Model<Input = Frame, Output = D, Error = ME>,
  O: Render<Frame, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input
      .take_frame()
      .ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!(
      "输入帧获取成功 ({}x{})，开始推理...",
      frame.width(),
      frame.height()
    );
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 由 [`FrameScheduler`] 驱动的流式检测，直到收到停止请求、
/// 完成指定数量的周期，或静态来源处理完毕
#[derive(Debug, Clone)]
pub struct ContinuousTask {
  interval: Duration,
  frame_number: Option<u64>,
  stop: Arc<AtomicBool>,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      interval: Duration::from_millis(5),
      frame_number: None,
      stop: Arc::new(AtomicBool::new(false)),
    }
  }
}

impl ContinuousTask {
  /// 两次 `tick` 之间的间隔
  pub fn with_interval(mut self, interval: Duration) -> Self {
    self.interval = interval;
    self
  }

  /// 完成（含失败）这么多个周期后退出
  pub fn with_frame_number(mut self, frame_number: Option<u64>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 置位后任务在下一次 `tick` 前退出
  pub fn stop_flag(&self) -> Arc<AtomicBool> {
    Arc::clone(&self.stop)
  }
}

impl<E, S, R> Task<S, Detector<E>, R> for ContinuousTask
where
  E: InferenceEngine,
  S: FrameSource,
  R: Render<Frame, Vec<Detection>>,
  R::Error: std::fmt::Display,
{
  type Error = anyhow::Error;

  fn run_task(self, input: S, model: Detector<E>, output: R) -> Result<(), Self::Error> {
    info!("开始任务...");
    let mut scheduler = FrameScheduler::new(model, input, output)?;
    scheduler.start();

    let mut reported = 0;
    loop {
      if self.stop.load(Ordering::Relaxed) {
        warn!("收到停止请求，退出任务循环");
        break;
      }

      scheduler.tick();

      let stats = scheduler.stats();
      let cycles = stats.completed + stats.failed;
      if cycles != reported {
        reported = cycles;
        info!(
          "第 {} 个周期结束, FPS: {:.1}",
          cycles,
          stats.fps.unwrap_or_default()
        );
      }

      if self.frame_number.is_some_and(|n| cycles >= n) {
        info!("达到指定帧数 {}, 退出任务循环", cycles);
        break;
      }

      let source = scheduler.source();
      if source.kind() == SourceKind::Static && !source.is_ready() && !scheduler.is_in_flight() {
        info!("静态来源处理完毕, 退出任务循环");
        break;
      }

      thread::sleep(self.interval);
    }

    scheduler.stop();
    if !scheduler.settle(SETTLE_TIMEOUT) {
      warn!("在途推理未在 {:.0?} 内返回", SETTLE_TIMEOUT);
    }

    let stats = scheduler.stats();
    info!(
      "任务完成: 成功 {} / 失败 {} / 忙碌跳过 {} / 丢弃 {}",
      stats.completed, stats.failed, stats.skipped_busy, stats.discarded
    );
    Ok(())
  }
}
