//! Procedure — register metrics plus an instruction vector (spec.md §3).

use std::sync::Arc;

use crate::op::Instruction;
use crate::value::Scalar;

/// Register-count metrics a `Procedure` was compiled against; a
/// `RegisterSet` sized to these is acquired from the pool on entry
/// (spec.md §4.7).
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisterMetrics {
  pub scalars: u16,
  pub arrays: u16,
  pub hashes: u16,
}

#[derive(Debug)]
pub struct Procedure {
  pub name: Arc<str>,
  pub metrics: RegisterMetrics,
  pub instructions: Vec<Instruction>,
  /// Literal pool `op::Const` indexes into; compiled once, shared by every
  /// `ThreadState` executing this procedure.
  pub constants: Vec<Scalar>,
}

impl Procedure {
  pub fn new(
    name: impl Into<Arc<str>>,
    metrics: RegisterMetrics,
    instructions: Vec<Instruction>,
    constants: Vec<Scalar>,
  ) -> Self {
    Procedure {
      name: name.into(),
      metrics,
      instructions,
      constants,
    }
  }

  pub fn constant(&self, idx: u32) -> &Scalar {
    &self.constants[idx as usize]
  }
}
