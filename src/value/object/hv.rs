//! HV — hash value (spec.md §3): a mapping from a *keyed* Scalar to Scalar.
//!
//! Keys are derived through [`hash_key`], grounded directly on
//! `examples/original_source/values/hash.go`'s `Hv_Key`/`Hv_Curate`: buffers
//! are curated to text before being used as a key, so later mutation of the
//! source buffer can never move an entry to a different bucket.

use indexmap::IndexMap;

use crate::value::slot::ScalarSlot;
use crate::value::Scalar;

/// The immutable projection of a `Scalar` used as a map key. `Buf` curates
/// to `Str` ("should not happen" otherwise, per the original's comment);
/// `Ref` keys by identity so two references to distinct cells never collide.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum HashKey {
  Null,
  Int(i64),
  Float(u64),
  Str(Box<str>),
  Ref(u64),
  Module(Box<str>),
}

pub fn hash_key(s: &Scalar) -> HashKey {
  match s {
    Scalar::Null => HashKey::Null,
    Scalar::Int(n) => HashKey::Int(*n),
    Scalar::Float(f) => HashKey::Float(f.to_bits()),
    Scalar::Str(s) => HashKey::Str(s.as_ref().into()),
    Scalar::Buf(b) => HashKey::Str(String::from_utf8_lossy(b).into_owned().into_boxed_str()),
    Scalar::Ref(r) => HashKey::Ref(r.id()),
    Scalar::Module(m) => HashKey::Module(m.name.as_ref().into()),
  }
}

/// `Hv_Curate`: the scalar actually stored as a key's "value half", with
/// buffers curated to `Str` so the stored key scalar matches what iteration
/// hands back.
fn curate(s: Scalar) -> Scalar {
  match s {
    Scalar::Buf(b) => Scalar::Str(String::from_utf8_lossy(&b).into_owned().into()),
    other => other,
  }
}

#[derive(Clone, Debug, Default)]
pub struct Hv {
  entries: IndexMap<HashKey, (Scalar, Scalar)>,
}

impl Hv {
  pub fn new() -> Self {
    Hv::default()
  }

  pub fn get(&self, key: &Scalar) -> Scalar {
    self
      .entries
      .get(&hash_key(key))
      .map(|(_, v)| v.clone())
      .unwrap_or(Scalar::Null)
  }

  /// Mutable handle into the value half of an entry, auto-creating it.
  pub fn slot(&mut self, key: &Scalar) -> ScalarSlot {
    let hk = hash_key(key);
    self
      .entries
      .entry(hk)
      .or_insert_with(|| (curate(key.clone()), Scalar::Null));
    ScalarSlot::hv(self, hash_key(key))
  }

  pub fn put(&mut self, key: Scalar, value: Scalar) {
    let hk = hash_key(&key);
    self.entries.insert(hk, (curate(key), value));
  }

  pub fn delete(&mut self, key: &Scalar) {
    self.entries.shift_remove(&hash_key(key));
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Flattened `[k0,v0,k1,v1,...]`, per spec.md §3's `iterate-to-AV`.
  pub fn to_av(&self) -> crate::value::Av {
    let mut out = Vec::with_capacity(self.entries.len() * 2);
    for (k, v) in self.entries.values() {
      out.push(k.clone());
      out.push(v.clone());
    }
    crate::value::Av::from_vec(out)
  }

  /// Consumes pairs from an AV; an odd tail element pairs with `Null`.
  pub fn from_av(av: &crate::value::Av) -> Hv {
    let mut hv = Hv::new();
    let items = av.as_slice();
    let mut i = 0;
    while i < items.len() {
      let k = items[i].clone();
      let v = items.get(i + 1).cloned().unwrap_or(Scalar::Null);
      hv.put(k, v);
      i += 2;
    }
    hv
  }

  pub(crate) fn raw_mut(&mut self, key: &HashKey) -> &mut Scalar {
    &mut self.entries.get_mut(key).expect("slot key must exist").1
  }

  pub fn get_by_hash_key(&self, key: &HashKey) -> Scalar {
    self.entries.get(key).map(|(_, v)| v.clone()).unwrap_or(Scalar::Null)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trip_av() {
    let mut hv = Hv::new();
    hv.put(Scalar::str("a"), Scalar::Int(1));
    hv.put(Scalar::str("b"), Scalar::Int(2));
    let av = hv.to_av();
    let back = Hv::from_av(&av);
    assert_eq!(back.get(&Scalar::str("a")).as_int(), 1);
    assert_eq!(back.get(&Scalar::str("b")).as_int(), 2);
    assert_eq!(back.len(), hv.len());
  }

  #[test]
  fn buffer_keys_with_equal_bytes_collide() {
    let mut hv = Hv::new();
    hv.put(Scalar::buf(b"x".to_vec()), Scalar::Int(1));
    assert_eq!(hv.get(&Scalar::buf(b"x".to_vec())).as_int(), 1);
    assert_eq!(hv.get(&Scalar::str("x")).as_int(), 1);
  }

  #[test]
  fn mutating_source_buffer_does_not_move_entry() {
    let mut hv = Hv::new();
    let key_bytes: Vec<u8> = b"stable".to_vec();
    hv.put(Scalar::buf(key_bytes.clone()), Scalar::Int(5));
    drop(key_bytes);
    assert_eq!(hv.get(&Scalar::str("stable")).as_int(), 5);
  }
}
