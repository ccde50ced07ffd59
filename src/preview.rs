// 该文件是 Shanan （山南西风） 项目的一部分。
// src/preview.rs - 临时预览句柄
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

//! 预览句柄在 `Drop` 时释放且仅释放一次，无论所在流程以何种方式结束
//! （替换、移除、出错、放弃或成功）。

use std::sync::{
  Arc,
  atomic::{AtomicU64, AtomicUsize, Ordering},
};

use tracing::debug;

#[derive(Debug, Default)]
struct RegistryInner {
  live: AtomicUsize,
  issued: AtomicU64,
}

/// 统计存活中的预览句柄，克隆后共享同一计数
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
  inner: Arc<RegistryInner>,
}

impl PreviewRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn acquire(&self, label: impl Into<String>) -> PreviewHandle {
    let id = self.inner.issued.fetch_add(1, Ordering::Relaxed) + 1;
    self.inner.live.fetch_add(1, Ordering::AcqRel);
    let label = label.into();
    debug!("获取预览句柄 #{} ({})", id, label);
    PreviewHandle {
      id,
      label,
      registry: Arc::clone(&self.inner),
    }
  }

  /// 当前尚未释放的句柄数
  pub fn live(&self) -> usize {
    self.inner.live.load(Ordering::Acquire)
  }

  pub fn issued(&self) -> u64 {
    self.inner.issued.load(Ordering::Relaxed)
  }
}

#[derive(Debug)]
pub struct PreviewHandle {
  id: u64,
  label: String,
  registry: Arc<RegistryInner>,
}

impl PreviewHandle {
  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn label(&self) -> &str {
    &self.label
  }

  pub fn release(self) {}
}

impl Drop for PreviewHandle {
  fn drop(&mut self) {
    self.registry.live.fetch_sub(1, Ordering::AcqRel);
    debug!("释放预览句柄 #{} ({})", self.id, self.label);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn handles_release_once_on_drop() {
    let registry = PreviewRegistry::new();
    let a = registry.acquire("standing.jpg");
    let b = registry.acquire("flexion.jpg");
    assert_eq!(registry.live(), 2);
    assert_ne!(a.id(), b.id());

    a.release();
    assert_eq!(registry.live(), 1);
    drop(b);
    assert_eq!(registry.live(), 0);
    assert_eq!(registry.issued(), 2);
  }

  #[test]
  fn replacing_a_handle_releases_the_old_one() {
    let registry = PreviewRegistry::new();
    let mut slot = Some(registry.acquire("first"));
    assert_eq!(slot.as_ref().map(|h| h.label()), Some("first"));
    slot = Some(registry.acquire("second"));
    assert_eq!(registry.live(), 1);
    assert_eq!(slot.as_ref().map(|h| h.label()), Some("second"));
    slot.take();
    assert_eq!(registry.live(), 0);
  }

  #[test]
  fn clones_share_the_count() {
    let registry = PreviewRegistry::new();
    let shared = registry.clone();
    let handle = shared.acquire("x");
    assert_eq!(registry.live(), 1);
    std::thread::spawn(move || drop(handle)).join().unwrap();
    assert_eq!(registry.live(), 0);
  }
}
