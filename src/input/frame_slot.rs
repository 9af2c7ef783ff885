// 该文件是 Mangguo （芒果） 项目的一部分。
// src/input/frame_slot.rs - 实时帧槽
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

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::trace;

use crate::{
  frame::{Frame, SourceKind},
  input::FrameSource,
};

#[derive(Default)]
struct SlotState {
  latest: Option<Frame>,
  width: u32,
  height: u32,
  overwritten: u64,
}

fn lock(state: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
  state.lock().unwrap_or_else(|e| e.into_inner())
}

/// 只保存最新一帧的实时帧源。
///
/// 采集线程通过 [`FrameSlotWriter`] 推入帧，新帧直接覆盖尚未取走的旧帧，
/// 不排队。
pub struct FrameSlot {
  state: Arc<Mutex<SlotState>>,
}

/// [`FrameSlot`] 的写入端，可跨线程克隆
#[derive(Clone)]
pub struct FrameSlotWriter {
  state: Arc<Mutex<SlotState>>,
}

impl FrameSlot {
  pub fn new() -> (Self, FrameSlotWriter) {
    let state = Arc::new(Mutex::new(SlotState::default()));
    (
      Self {
        state: Arc::clone(&state),
      },
      FrameSlotWriter { state },
    )
  }

  /// 未被取走就被覆盖的帧数
  pub fn overwritten(&self) -> u64 {
    lock(&self.state).overwritten
  }
}

impl FrameSlotWriter {
  pub fn push(&self, frame: Frame) {
    let mut state = lock(&self.state);
    state.width = frame.width();
    state.height = frame.height();
    if state.latest.replace(frame).is_some() {
      state.overwritten += 1;
      trace!("覆盖未处理的帧");
    }
  }
}

impl FrameSource for FrameSlot {
  fn kind(&self) -> SourceKind {
    SourceKind::Live
  }

  fn width(&self) -> u32 {
    lock(&self.state).width
  }

  fn height(&self) -> u32 {
    lock(&self.state).height
  }

  fn is_ready(&self) -> bool {
    lock(&self.state).latest.is_some()
  }

  fn take_frame(&mut self) -> Option<Frame> {
    lock(&self.state).latest.take()
  }
}
