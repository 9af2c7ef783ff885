// 该文件是 Mangguo （芒果） 项目的一部分。
// src/bin/simple_continueshot.rs - 以固定帧率回放图像的流式检测
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  sync::atomic::Ordering,
  thread,
  time::Duration,
};

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use mangguo::{
  FromUrl,
  frame::{Frame, SourceKind},
  input::{FrameSlot, FrameSource, InputWrapper},
  model::{Detector, DetectorBuilder, ReplayEngine},
  output::OutputWrapper,
  task::{ContinuousTask, Task},
};

/// Mangguo 流式检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型文件，例如 model:///models/dump.f32?config=/models/model_config.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 作为实时来源回放的图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出：log:、json:///path/out.jsonl 或 image:///path/out.png
  #[arg(long, value_name = "OUTPUT", default_value = "log:")]
  pub output: Url,
  /// 回放帧率
  #[arg(long, value_name = "FPS", default_value_t = 30)]
  pub fps: u32,
  /// 完成这么多个检测周期后退出
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<u64>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let mut still = InputWrapper::from_url(&args.input)?.into_source();
  let image = still
    .take_frame()
    .ok_or_else(|| anyhow!("没有输入帧"))?
    .to_rgba_image()?;
  let frame = Frame::from_image(image, SourceKind::Live);

  let model: Detector<ReplayEngine> = DetectorBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let task = ContinuousTask::default().with_frame_number(args.frame_number);

  let stop = task.stop_flag();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    stop.store(true, Ordering::Relaxed);
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  let (slot, writer) = FrameSlot::new();
  let period = Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1)));
  let stop = task.stop_flag();
  let feeder = thread::Builder::new()
    .name("mangguo-replay".to_string())
    .spawn(move || {
      while !stop.load(Ordering::Relaxed) {
        writer.push(frame.clone());
        thread::sleep(period);
      }
    })?;

  let stop = task.stop_flag();
  let result = task.run_task(slot, model, output);
  stop.store(true, Ordering::Relaxed);
  if feeder.join().is_err() {
    warn!("回放线程异常退出");
  }

  result
}
