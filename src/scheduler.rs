// 该文件是 Mangguo （芒果） 项目的一部分。
// src/scheduler.rs - 逐帧检测调度
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

//! 流式检测的调度器。
//!
//! 调度器运行在调用方的单一上下文中，由宿主周期性调用 [`FrameScheduler::tick`]。
//! 推理在后台线程执行，是一个周期内唯一的挂起点；预处理、解码、NMS、
//! 坐标还原与渲染都在 `tick` 所在的上下文中同步完成。
//!
//! - 同一时刻最多一个检测周期在途，在途期间到达的帧被跳过而不是排队。
//! - `stop()` 不等待在途推理；其结果按代号比对后被丢弃。

use std::{
  fmt::Display,
  sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
  thread,
  time::{Duration, Instant},
};

use tracing::{debug, error, info, trace, warn};

use crate::{
  frame::Frame,
  input::FrameSource,
  model::{DetectError, Detection, Detector, EngineOutputs, InferenceEngine},
  output::Render,
  tensor::Tensor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
  Idle,
  Streaming,
}

/// 一次 `tick` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
  /// 调度器未在流式运行
  Idle,
  /// 帧源没有新帧
  NotReady,
  /// 已有周期在途，本次跳过
  Busy,
  /// 新周期已提交推理
  Dispatched,
  /// 周期在提交前失败（例如帧无效），已计为一次完成
  Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerStats {
  /// 成功完成并交付渲染的周期
  pub completed: u64,
  /// 失败的周期（帧无效、推理失败、输出形状错误）
  pub failed: u64,
  /// 因已有周期在途而跳过的 tick
  pub skipped_busy: u64,
  /// 因帧源未就绪而跳过的 tick
  pub skipped_not_ready: u64,
  /// 停止后到达而被丢弃的推理结果
  pub discarded: u64,
  /// 最近一次周期结束时的 FPS 采样
  pub fps: Option<f64>,
}

struct Job {
  generation: u64,
  tensor: Tensor,
}

struct Completion {
  generation: u64,
  result: Result<EngineOutputs, DetectError>,
}

struct InFlight {
  generation: u64,
  frame: Frame,
}

pub struct FrameScheduler<E, S, R> {
  detector: Detector<E>,
  source: S,
  render: R,
  state: SchedulerState,
  generation: u64,
  in_flight: Option<InFlight>,
  outstanding: usize,
  last_cycle_end: Instant,
  stats: SchedulerStats,
  jobs: Sender<Job>,
  done: Receiver<Completion>,
}

impl<E, S, R> FrameScheduler<E, S, R>
where
  E: InferenceEngine,
  S: FrameSource,
  R: Render<Frame, Vec<Detection>>,
  R::Error: Display,
{
  /// 创建调度器并启动推理线程，初始状态为 `Idle`
  pub fn new(detector: Detector<E>, source: S, render: R) -> std::io::Result<Self> {
    let (jobs, job_rx) = mpsc::channel::<Job>();
    let (done_tx, done) = mpsc::channel::<Completion>();
    let worker = detector.clone();

    thread::Builder::new()
      .name("mangguo-infer".to_string())
      .spawn(move || {
        for job in job_rx {
          let result = worker.run(job.tensor);
          if done_tx
            .send(Completion {
              generation: job.generation,
              result,
            })
            .is_err()
          {
            break;
          }
        }
        debug!("推理线程退出");
      })?;

    Ok(Self {
      detector,
      source,
      render,
      state: SchedulerState::Idle,
      generation: 0,
      in_flight: None,
      outstanding: 0,
      last_cycle_end: Instant::now(),
      stats: SchedulerStats::default(),
      jobs,
      done,
    })
  }

  pub fn state(&self) -> SchedulerState {
    self.state
  }

  pub fn stats(&self) -> &SchedulerStats {
    &self.stats
  }

  pub fn fps(&self) -> Option<f64> {
    self.stats.fps
  }

  pub fn is_in_flight(&self) -> bool {
    self.in_flight.is_some()
  }

  pub fn detector(&self) -> &Detector<E> {
    &self.detector
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  pub fn source_mut(&mut self) -> &mut S {
    &mut self.source
  }

  pub fn render(&self) -> &R {
    &self.render
  }

  /// Idle → Streaming
  pub fn start(&mut self) {
    if self.state == SchedulerState::Streaming {
      return;
    }
    info!("开始流式检测");
    self.state = SchedulerState::Streaming;
    self.last_cycle_end = Instant::now();
  }

  /// Streaming → Idle，不等待在途推理
  pub fn stop(&mut self) {
    if self.state == SchedulerState::Idle {
      return;
    }
    info!("停止流式检测");
    self.state = SchedulerState::Idle;
    self.generation += 1;
    if self.in_flight.take().is_some() {
      debug!("在途周期被取消, 其结果将被丢弃");
    }
  }

  /// 处理已完成的推理结果，然后在条件允许时为新帧提交一个检测周期
  pub fn tick(&mut self) -> TickOutcome {
    self.poll_completions();

    if self.state != SchedulerState::Streaming {
      return TickOutcome::Idle;
    }

    if !self.source.is_ready() {
      self.stats.skipped_not_ready += 1;
      return TickOutcome::NotReady;
    }

    if self.in_flight.is_some() {
      self.stats.skipped_busy += 1;
      trace!("检测周期在途, 跳过本帧");
      return TickOutcome::Busy;
    }

    match self.source.take_frame() {
      Some(frame) => self.dispatch(frame),
      None => {
        self.stats.skipped_not_ready += 1;
        TickOutcome::NotReady
      }
    }
  }

  /// 阻塞等待所有已提交的推理返回并处理其结果
  ///
  /// 超时返回 `false`。
  pub fn settle(&mut self, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while self.outstanding > 0 {
      let remaining = deadline.saturating_duration_since(Instant::now());
      if remaining.is_zero() {
        return false;
      }
      match self.done.recv_timeout(remaining) {
        Ok(completion) => self.handle_completion(completion),
        Err(RecvTimeoutError::Timeout) => return false,
        Err(RecvTimeoutError::Disconnected) => {
          self.worker_lost();
          break;
        }
      }
    }
    true
  }

  fn dispatch(&mut self, frame: Frame) -> TickOutcome {
    let tensor = match self.detector.prepare(&frame) {
      Ok(tensor) => tensor,
      Err(e) => {
        warn!("跳过无效帧: {}", e);
        self.finish_cycle(false);
        return TickOutcome::Failed;
      }
    };

    let generation = self.generation;
    if self.jobs.send(Job { generation, tensor }).is_err() {
      error!("推理线程已退出, 无法提交检测周期");
      self.finish_cycle(false);
      return TickOutcome::Failed;
    }

    trace!("提交检测周期 (代号 {})", generation);
    self.outstanding += 1;
    self.in_flight = Some(InFlight { generation, frame });
    TickOutcome::Dispatched
  }

  fn poll_completions(&mut self) {
    while self.outstanding > 0 {
      match self.done.try_recv() {
        Ok(completion) => self.handle_completion(completion),
        Err(TryRecvError::Empty) => break,
        Err(TryRecvError::Disconnected) => {
          self.worker_lost();
          break;
        }
      }
    }
  }

  fn handle_completion(&mut self, completion: Completion) {
    self.outstanding = self.outstanding.saturating_sub(1);

    let current = self.state == SchedulerState::Streaming
      && matches!(&self.in_flight, Some(f) if f.generation == completion.generation);
    if !current {
      self.stats.discarded += 1;
      debug!("丢弃过期的推理结果 (代号 {})", completion.generation);
      return;
    }

    let Some(InFlight { frame, .. }) = self.in_flight.take() else {
      return;
    };

    let detections = completion
      .result
      .and_then(|outputs| {
        self
          .detector
          .finish(&outputs, frame.width(), frame.height())
      });

    match detections {
      Ok(detections) => {
        debug!("检测到 {} 个对象", detections.len());
        if let Err(e) = self.render.render_result(&frame, &detections) {
          warn!("渲染失败: {}", e);
        }
        self.finish_cycle(true);
      }
      Err(e) => {
        error!("检测周期失败: {}", e);
        self.finish_cycle(false);
      }
    }
  }

  fn worker_lost(&mut self) {
    error!("推理线程异常退出");
    self.outstanding = 0;
    if self.in_flight.take().is_some() {
      self.finish_cycle(false);
    }
  }

  fn finish_cycle(&mut self, ok: bool) {
    let now = Instant::now();
    let elapsed = now.duration_since(self.last_cycle_end).as_secs_f64();
    if elapsed > 0.0 {
      self.stats.fps = Some(1.0 / elapsed);
    }
    self.last_cycle_end = now;

    if ok {
      self.stats.completed += 1;
    } else {
      self.stats.failed += 1;
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::{
    config::ModelConfig,
    frame::SourceKind,
    input::{FrameSlot, StillFrame},
    model::ReplayEngine,
    output::ChannelOutput,
    tensor::OutputTensor,
  };

  fn config() -> ModelConfig {
    ModelConfig {
      input_size: 8,
      num_classes: 1,
      class_names: vec![Arc::from("mangoTree")],
      confidence_threshold: 0.5,
      iou_threshold: 0.45,
    }
  }

  // 一个锚点：中心 (4, 4)，4x4，得分 0.9
  fn detector() -> Detector<ReplayEngine> {
    let output = OutputTensor::new(vec![1, 5, 1], vec![4.0, 4.0, 4.0, 4.0, 0.9]);
    Detector::new(ReplayEngine::new(output), config()).unwrap()
  }

  fn frame(width: u32, height: u32) -> Frame {
    let len = (width * height * 4) as usize;
    Frame::from_rgba(width, height, vec![128; len], SourceKind::Live).unwrap()
  }

  #[test]
  fn idle_scheduler_leaves_frames_in_source() {
    let (output, rx) = ChannelOutput::new();
    let source = StillFrame::new(frame(8, 8));
    let mut scheduler = FrameScheduler::new(detector(), source, output).unwrap();

    assert_eq!(scheduler.tick(), TickOutcome::Idle);
    assert!(scheduler.source().is_ready());
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn completed_cycle_renders_in_source_coordinates() {
    let (output, rx) = ChannelOutput::new();
    let source = StillFrame::new(frame(16, 8));
    let mut scheduler = FrameScheduler::new(detector(), source, output).unwrap();

    scheduler.start();
    assert_eq!(scheduler.tick(), TickOutcome::Dispatched);
    assert!(scheduler.is_in_flight());
    assert!(scheduler.settle(Duration::from_secs(5)));
    assert!(!scheduler.is_in_flight());

    let message = rx.try_recv().unwrap();
    assert_eq!((message.width, message.height), (16, 8));
    assert_eq!(message.detections.len(), 1);
    let det = &message.detections[0];
    assert!((det.x - 4.0).abs() < 1e-5);
    assert!((det.y - 2.0).abs() < 1e-5);
    assert!((det.w - 8.0).abs() < 1e-5);
    assert!((det.h - 4.0).abs() < 1e-5);

    assert_eq!(scheduler.stats().completed, 1);
    assert!(scheduler.fps().is_some_and(|fps| fps > 0.0));
    assert_eq!(scheduler.tick(), TickOutcome::NotReady);
  }

  #[test]
  fn stop_discards_in_flight_result() {
    let (output, rx) = ChannelOutput::new();
    let (slot, writer) = FrameSlot::new();
    let mut scheduler = FrameScheduler::new(detector(), slot, output).unwrap();

    scheduler.start();
    writer.push(frame(8, 8));
    assert_eq!(scheduler.tick(), TickOutcome::Dispatched);
    scheduler.stop();
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert!(!scheduler.is_in_flight());

    assert!(scheduler.settle(Duration::from_secs(5)));
    assert!(rx.try_recv().is_err());
    assert_eq!(scheduler.stats().discarded, 1);
    assert_eq!(scheduler.stats().completed, 0);
  }

  #[test]
  fn malformed_output_fails_cycle_without_render() {
    let output = OutputTensor::new(vec![1, 7, 1], vec![0.0; 7]);
    let detector = Detector::new(ReplayEngine::new(output), config()).unwrap();
    let (render, rx) = ChannelOutput::new();
    let (slot, writer) = FrameSlot::new();
    let mut scheduler = FrameScheduler::new(detector, slot, render).unwrap();

    scheduler.start();
    writer.push(frame(8, 8));
    assert_eq!(scheduler.tick(), TickOutcome::Dispatched);
    assert!(scheduler.settle(Duration::from_secs(5)));

    assert!(rx.try_recv().is_err());
    assert_eq!(scheduler.stats().failed, 1);
    assert!(scheduler.fps().is_some());

    writer.push(frame(8, 8));
    assert_eq!(scheduler.tick(), TickOutcome::Dispatched);
  }
}
