//! ScalarSlot — a polymorphic mutable handle (spec.md §3).
//!
//! Sources: a register, a named global, an AV index, an HV key, or a
//! dereferenced Scalar-cell. A sentinel "non-slot" exists; `set` on it is a
//! no-op, matching spec.md §3's invariant for slots with nowhere to write.

use std::sync::Arc;

use crate::value::object::hv::HashKey;
use crate::value::object::module::Module;
use crate::value::object::reference::Payload;
use crate::value::{Av, Hv, Reference, Scalar};

pub enum ScalarSlot<'a> {
  None,
  Register(&'a mut Scalar),
  Global(Arc<Module>, Arc<str>),
  RefScalar(Reference),
  RefAv(Reference, i64),
  RefHv(Reference, Scalar),
  Av(&'a mut Av, usize),
  Hv(&'a mut Hv, HashKey),
}

impl<'a> ScalarSlot<'a> {
  pub fn none() -> Self {
    ScalarSlot::None
  }

  pub fn register(r: &'a mut Scalar) -> Self {
    ScalarSlot::Register(r)
  }

  pub fn global(module: Arc<Module>, name: Arc<str>) -> Self {
    ScalarSlot::Global(module, name)
  }

  pub fn av(av: &'a mut Av, index: usize) -> Self {
    ScalarSlot::Av(av, index)
  }

  pub fn hv(hv: &'a mut Hv, key: HashKey) -> Self {
    ScalarSlot::Hv(hv, key)
  }

  pub fn get(&self) -> Scalar {
    match self {
      ScalarSlot::None => Scalar::Null,
      ScalarSlot::Register(r) => (**r).clone(),
      ScalarSlot::Global(module, name) => module.get_scalar(name),
      ScalarSlot::RefScalar(r) => r.get_scalar().unwrap_or(Scalar::Null),
      ScalarSlot::RefAv(r, idx) => r.with_payload(|p| match p {
        Payload::Av(av) => av.fetch(*idx),
        _ => Scalar::Null,
      }),
      ScalarSlot::RefHv(r, key) => r.with_payload(|p| match p {
        Payload::Hv(hv) => hv.get(key),
        _ => Scalar::Null,
      }),
      ScalarSlot::Av(av, idx) => av.as_slice().get(*idx).cloned().unwrap_or(Scalar::Null),
      ScalarSlot::Hv(hv, key) => hv.get_by_hash_key(key),
    }
  }

  pub fn set(&mut self, value: Scalar) {
    match self {
      ScalarSlot::None => {}
      ScalarSlot::Register(r) => **r = value,
      ScalarSlot::Global(module, name) => module.set_scalar(name.clone(), value),
      ScalarSlot::RefScalar(r) => {
        r.set_scalar(value);
      }
      ScalarSlot::RefAv(r, idx) => {
        r.with_payload_mut(|p| {
          if let Payload::Av(av) = p {
            av.store(*idx, value);
          }
        });
      }
      ScalarSlot::RefHv(r, key) => {
        r.with_payload_mut(|p| {
          if let Payload::Hv(hv) = p {
            hv.put(key.clone(), value);
          }
        });
      }
      ScalarSlot::Av(av, idx) => *av.raw_mut(*idx) = value,
      ScalarSlot::Hv(hv, key) => *hv.raw_mut(key) = value,
    }
  }
}
