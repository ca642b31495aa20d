//! AV — array value (spec.md §3): an ordered, 0-indexed sequence of
//! [`Scalar`], null-padded on out-of-range writes.

use crate::value::slot::ScalarSlot;
use crate::value::Scalar;

#[derive(Clone, Debug, Default)]
pub struct Av {
  items: Vec<Scalar>,
}

impl Av {
  pub fn new() -> Self {
    Av::default()
  }

  pub fn from_vec(items: Vec<Scalar>) -> Self {
    Av { items }
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Read past the end yields `Null` (spec.md §3).
  pub fn fetch(&self, index: i64) -> Scalar {
    match usize::try_from(index) {
      Ok(i) => self.items.get(i).cloned().unwrap_or(Scalar::Null),
      Err(_) => Scalar::Null,
    }
  }

  fn ensure_len(&mut self, len: usize) {
    if self.items.len() < len {
      self.items.resize(len, Scalar::Null);
    }
  }

  /// Write past the end zero-fills (Null-fills) intermediate slots.
  pub fn store(&mut self, index: i64, value: Scalar) {
    let Ok(i) = usize::try_from(index) else { return };
    self.ensure_len(i + 1);
    self.items[i] = value;
  }

  /// A mutable handle into this array's backing storage. Grounded on
  /// `examples/original_source/values/array.go`'s `Store`, which grows the
  /// backing slice *before* handing out the slot so the returned handle
  /// never aliases pre-growth storage (the bug flagged in spec.md §9).
  pub fn slot(&mut self, index: i64) -> ScalarSlot {
    let Ok(i) = usize::try_from(index) else {
      return ScalarSlot::none();
    };
    self.ensure_len(i + 1);
    ScalarSlot::av(self, i)
  }

  pub fn push(&mut self, value: Scalar) {
    self.items.push(value);
  }

  pub fn pop(&mut self) -> Scalar {
    self.items.pop().unwrap_or(Scalar::Null)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Scalar> {
    self.items.iter()
  }

  pub fn as_slice(&self) -> &[Scalar] {
    &self.items
  }

  pub fn clear(&mut self) {
    self.items.clear();
  }

  pub(crate) fn raw_mut(&mut self, index: usize) -> &mut Scalar {
    &mut self.items[index]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn read_past_end_is_null() {
    let av = Av::new();
    assert!(matches!(av.fetch(5), Scalar::Null));
  }

  #[test]
  fn write_past_end_pads_with_null() {
    let mut av = Av::new();
    av.store(2, Scalar::Int(9));
    assert_eq!(av.len(), 3);
    assert!(matches!(av.fetch(0), Scalar::Null));
    assert!(matches!(av.fetch(1), Scalar::Null));
    assert_eq!(av.fetch(2).as_int(), 9);
  }

  #[test]
  fn slot_after_growth_targets_new_storage() {
    let mut av = Av::new();
    {
      let mut slot = av.slot(3);
      slot.set(Scalar::Int(7));
    }
    assert_eq!(av.fetch(3).as_int(), 7);
  }
}
