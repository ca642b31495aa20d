//! Size-classed register pool (spec.md §4.7): a call acquires a
//! [`RegisterFile`] sized to its `Procedure`'s metrics and returns it on
//! exit, rounded up to the next power of two so the free lists stay small
//! and reuse across differently-sized calls still hits.
//!
//! Grounded on `examples/jprochazk-hebi/src/value/object/frame.rs`'s
//! `Stack` (a single growable register array reused frame-to-frame);
//! here each call gets its own `RegisterFile` rather than a shared stack
//! slice, since array/hash registers (`ArraySlot`/`HashSlot`) carry
//! non-`Copy` payloads that must be reset between reuses, not just
//! length-truncated.

use std::sync::Mutex;

use crate::value::object::procedure::RegisterMetrics;
use crate::value::{Av, Hv, Scalar};

use super::{ArraySlot, HashSlot};

fn size_class(n: u16) -> u16 {
  if n == 0 {
    return 0;
  }
  n.next_power_of_two()
}

#[derive(Default)]
pub struct RegisterFile {
  pub scalars: Vec<Scalar>,
  pub arrays: Vec<ArraySlot>,
  pub hashes: Vec<HashSlot>,
}

impl RegisterFile {
  fn reset(&mut self, metrics: RegisterMetrics) {
    self.scalars.clear();
    self.scalars.resize(metrics.scalars as usize, Scalar::Null);
    self.arrays.clear();
    self.arrays.resize_with(metrics.arrays as usize, || ArraySlot::Local(Av::new()));
    self.hashes.clear();
    self.hashes.resize_with(metrics.hashes as usize, || HashSlot::Local(Hv::new()));
  }
}

#[derive(Default)]
struct Bucket {
  files: Vec<RegisterFile>,
}

/// 10 size classes cover `1..=512`; a `Procedure` bigger than that falls
/// back to a freshly allocated, never-pooled `RegisterFile`.
const SIZE_CLASSES: usize = 10;

#[derive(Default)]
pub struct RegisterPool {
  buckets: Mutex<Vec<Bucket>>,
}

fn class_index(metrics: RegisterMetrics) -> Option<usize> {
  let widest = metrics.scalars.max(metrics.arrays).max(metrics.hashes);
  let class = size_class(widest);
  if class == 0 {
    return Some(0);
  }
  let idx = class.trailing_zeros() as usize;
  (idx < SIZE_CLASSES).then_some(idx)
}

impl RegisterPool {
  pub fn new() -> Self {
    let mut buckets = Vec::with_capacity(SIZE_CLASSES);
    buckets.resize_with(SIZE_CLASSES, Bucket::default);
    RegisterPool { buckets: Mutex::new(buckets) }
  }

  pub fn acquire(&self, metrics: RegisterMetrics) -> RegisterFile {
    if let Some(idx) = class_index(metrics) {
      let mut buckets = self.buckets.lock().unwrap();
      if let Some(mut file) = buckets[idx].files.pop() {
        file.reset(metrics);
        return file;
      }
    }
    let mut file = RegisterFile::default();
    file.reset(metrics);
    file
  }

  pub fn release(&self, metrics: RegisterMetrics, file: RegisterFile) {
    if let Some(idx) = class_index(metrics) {
      self.buckets.lock().unwrap()[idx].files.push(file);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn acquired_file_is_sized_and_cleared() {
    let pool = RegisterPool::new();
    let metrics = RegisterMetrics { scalars: 3, arrays: 1, hashes: 0 };
    let file = pool.acquire(metrics);
    assert_eq!(file.scalars.len(), 3);
    assert_eq!(file.arrays.len(), 1);
    assert!(matches!(file.scalars[0], Scalar::Null));
  }

  #[test]
  fn released_file_is_reused_on_next_acquire_of_same_class() {
    let pool = RegisterPool::new();
    let metrics = RegisterMetrics { scalars: 3, arrays: 0, hashes: 0 };
    let mut file = pool.acquire(metrics);
    file.scalars[0] = Scalar::Int(7);
    pool.release(metrics, file);
    let file2 = pool.acquire(metrics);
    assert!(matches!(file2.scalars[0], Scalar::Null));
  }
}
