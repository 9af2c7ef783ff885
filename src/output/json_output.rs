// 该文件是 Mangguo （芒果） 项目的一部分。
// src/output/json_output.rs - JSON 行记录输出
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
  fs::{File, OpenOptions},
  io::{BufWriter, Write},
  path::{Path, PathBuf},
  sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
  },
};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::Detection,
  output::{DetectionSummary, Render},
};

#[derive(Error, Debug)]
pub enum JsonOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Record<'a> {
  cycle: u64,
  width: u32,
  height: u32,
  summary: DetectionSummary,
  detections: &'a [Detection],
}

/// 每个周期追加一行 JSON 记录
pub struct JsonOutput {
  path: PathBuf,
  writer: Mutex<BufWriter<File>>,
  cycles: AtomicU64,
}

impl FromUrlWithScheme for JsonOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonOutput {
  type Error = JsonOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonOutputError::SchemeMismatch);
    }
    Self::create(url.path())
  }
}

impl JsonOutput {
  pub fn create(path: impl AsRef<Path>) -> Result<Self, JsonOutputError> {
    let path = path.as_ref().to_path_buf();
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    info!("检测记录写入: {}", path.display());
    Ok(Self {
      path,
      writer: Mutex::new(BufWriter::new(file)),
      cycles: AtomicU64::new(0),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Render<Frame, Vec<Detection>> for JsonOutput {
  type Error = JsonOutputError;

  fn render_result(&self, frame: &Frame, result: &Vec<Detection>) -> Result<(), Self::Error> {
    let record = Record {
      cycle: self.cycles.fetch_add(1, Ordering::Relaxed),
      width: frame.width(),
      height: frame.height(),
      summary: DetectionSummary::of(result),
      detections: result,
    };

    let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
    serde_json::to_writer(&mut *writer, &record)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
  }
}
