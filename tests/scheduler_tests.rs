// 该文件是 Mangguo （芒果） 项目的一部分。
// tests/scheduler_tests.rs - 调度器并发行为测试
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
  io,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
    mpsc::{self, Receiver, Sender},
  },
  time::Duration,
};

use mangguo::{
  config::ModelConfig,
  frame::{Frame, SourceKind},
  input::{FrameSlot, FrameSlotWriter},
  model::{Detector, EngineOutputs, InferenceEngine},
  output::{ChannelOutput, DetectionMessage},
  scheduler::{FrameScheduler, SchedulerState, TickOutcome},
  tensor::{OutputTensor, Tensor},
};

const WAIT: Duration = Duration::from_secs(5);

/// 每次调用都先报告“已进入”，再阻塞到测试放行
struct GatedEngine {
  calls: Arc<AtomicUsize>,
  entered: Mutex<Sender<()>>,
  release: Mutex<Receiver<Result<(), String>>>,
}

impl InferenceEngine for GatedEngine {
  type Error = io::Error;

  fn run(&self, _name: &str, input: Tensor) -> Result<EngineOutputs, Self::Error> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let pixels = input.into_data();
    if pixels.len() != 3 * 8 * 8 {
      return Err(io::Error::other(format!("unexpected input length {}", pixels.len())));
    }
    let _ = self.entered.lock().unwrap().send(());
    let verdict = self
      .release
      .lock()
      .unwrap()
      .recv()
      .map_err(|_| io::Error::other("gate dropped"))?;
    verdict.map_err(io::Error::other)?;

    // 一个锚点：中心 (4, 4)，4x4，mangoTree 0.9
    let output = OutputTensor::new(vec![1, 5, 1], vec![4.0, 4.0, 4.0, 4.0, 0.9]);
    Ok(EngineOutputs::new().with("output0", output))
  }
}

struct Harness {
  scheduler: FrameScheduler<GatedEngine, FrameSlot, ChannelOutput>,
  writer: FrameSlotWriter,
  calls: Arc<AtomicUsize>,
  entered: Receiver<()>,
  release: Sender<Result<(), String>>,
  rendered: Receiver<DetectionMessage>,
}

impl Harness {
  fn new() -> Self {
    let calls = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered) = mpsc::channel();
    let (release, release_rx) = mpsc::channel();
    let engine = GatedEngine {
      calls: Arc::clone(&calls),
      entered: Mutex::new(entered_tx),
      release: Mutex::new(release_rx),
    };
    let config = ModelConfig {
      input_size: 8,
      num_classes: 1,
      class_names: vec![Arc::from("mangoTree")],
      confidence_threshold: 0.5,
      iou_threshold: 0.45,
    };
    let detector = Detector::new(engine, config).unwrap();
    let (slot, writer) = FrameSlot::new();
    let (output, rendered) = ChannelOutput::new();
    let scheduler = FrameScheduler::new(detector, slot, output).unwrap();

    Self {
      scheduler,
      writer,
      calls,
      entered,
      release,
      rendered,
    }
  }

  fn push_frame(&self) {
    self
      .writer
      .push(Frame::from_rgba(8, 8, vec![64; 8 * 8 * 4], SourceKind::Live).unwrap());
  }

  fn wait_entered(&self) {
    self.entered.recv_timeout(WAIT).unwrap();
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[test]
fn busy_ticks_never_start_a_second_inference() {
  let mut h = Harness::new();
  h.scheduler.start();

  h.push_frame();
  assert_eq!(h.scheduler.tick(), TickOutcome::Dispatched);
  h.wait_entered();
  assert_eq!(h.calls(), 1);

  for _ in 0..3 {
    h.push_frame();
    assert_eq!(h.scheduler.tick(), TickOutcome::Busy);
  }
  assert_eq!(h.calls(), 1);
  assert_eq!(h.scheduler.stats().skipped_busy, 3);
  assert_eq!(h.scheduler.source().overwritten(), 2);

  h.release.send(Ok(())).unwrap();
  assert!(h.scheduler.settle(WAIT));
  assert_eq!(h.rendered.try_iter().count(), 1);
  assert_eq!(h.scheduler.stats().completed, 1);

  // 忙碌期间到达的最后一帧仍在槽里
  assert_eq!(h.scheduler.tick(), TickOutcome::Dispatched);
  h.wait_entered();
  assert_eq!(h.calls(), 2);

  h.release.send(Ok(())).unwrap();
  assert!(h.scheduler.settle(WAIT));
  assert_eq!(h.rendered.try_iter().count(), 1);
}

#[test]
fn stop_while_in_flight_suppresses_render() {
  let mut h = Harness::new();
  h.scheduler.start();

  h.push_frame();
  assert_eq!(h.scheduler.tick(), TickOutcome::Dispatched);
  h.wait_entered();

  h.scheduler.stop();
  assert_eq!(h.scheduler.state(), SchedulerState::Idle);

  h.release.send(Ok(())).unwrap();
  assert!(h.scheduler.settle(WAIT));

  assert!(h.rendered.try_recv().is_err());
  assert_eq!(h.scheduler.stats().discarded, 1);
  assert_eq!(h.scheduler.stats().completed, 0);

  h.push_frame();
  assert_eq!(h.scheduler.tick(), TickOutcome::Idle);
  assert_eq!(h.calls(), 1);
}

#[test]
fn restart_ignores_result_from_previous_run() {
  let mut h = Harness::new();
  h.scheduler.start();

  h.push_frame();
  assert_eq!(h.scheduler.tick(), TickOutcome::Dispatched);
  h.wait_entered();

  h.scheduler.stop();
  h.scheduler.start();
  h.push_frame();
  assert_eq!(h.scheduler.tick(), TickOutcome::Dispatched);

  h.release.send(Ok(())).unwrap();
  h.wait_entered();
  h.release.send(Ok(())).unwrap();
  assert!(h.scheduler.settle(WAIT));

  assert_eq!(h.calls(), 2);
  assert_eq!(h.scheduler.stats().discarded, 1);
  assert_eq!(h.scheduler.stats().completed, 1);
  assert_eq!(h.rendered.try_iter().count(), 1);
}

#[test]
fn inference_failure_ends_cycle_and_frees_scheduler() {
  let mut h = Harness::new();
  h.scheduler.start();

  h.push_frame();
  assert_eq!(h.scheduler.tick(), TickOutcome::Dispatched);
  h.wait_entered();
  h.release.send(Err("engine fault".to_string())).unwrap();
  assert!(h.scheduler.settle(WAIT));

  assert!(h.rendered.try_recv().is_err());
  assert_eq!(h.scheduler.stats().failed, 1);
  assert!(h.scheduler.fps().is_some());
  assert!(!h.scheduler.is_in_flight());

  h.push_frame();
  assert_eq!(h.scheduler.tick(), TickOutcome::Dispatched);
  h.wait_entered();
  h.release.send(Ok(())).unwrap();
  assert!(h.scheduler.settle(WAIT));
  assert_eq!(h.rendered.try_iter().count(), 1);
}

#[test]
fn settle_times_out_while_engine_is_blocked() {
  let mut h = Harness::new();
  h.scheduler.start();

  h.push_frame();
  assert_eq!(h.scheduler.tick(), TickOutcome::Dispatched);
  h.wait_entered();
  assert!(!h.scheduler.settle(Duration::from_millis(20)));
  assert!(h.scheduler.is_in_flight());

  h.release.send(Ok(())).unwrap();
  assert!(h.scheduler.settle(WAIT));
}

#[test]
fn empty_source_is_not_ready() {
  let mut h = Harness::new();
  h.scheduler.start();
  assert_eq!(h.scheduler.tick(), TickOutcome::NotReady);
  assert_eq!(h.scheduler.stats().skipped_not_ready, 1);
  assert_eq!(h.calls(), 0);
}

#[test]
fn invalid_frame_fails_cycle_and_next_frame_dispatches() {
  let mut h = Harness::new();
  h.scheduler.start();

  h.writer
    .push(Frame::from_rgba(0, 0, Vec::new(), SourceKind::Live).unwrap());
  assert_eq!(h.scheduler.tick(), TickOutcome::Failed);
  assert!(!h.scheduler.is_in_flight());
  assert!(h.rendered.try_recv().is_err());
  assert_eq!(h.scheduler.stats().failed, 1);
  assert!(h.scheduler.fps().is_some());
  assert_eq!(h.calls(), 0);

  h.push_frame();
  assert_eq!(h.scheduler.tick(), TickOutcome::Dispatched);
  h.wait_entered();
  h.release.send(Ok(())).unwrap();
  assert!(h.scheduler.settle(WAIT));
  assert_eq!(h.rendered.try_iter().count(), 1);
  assert_eq!(h.scheduler.stats().completed, 1);
}
