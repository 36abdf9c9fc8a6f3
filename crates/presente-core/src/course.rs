//! Course — the directory-owned entity attendance rows hang off.
//!
//! The core never creates, updates, or deletes courses; it only resolves
//! them through the [`Directory`](crate::store::Directory) trait and joins
//! on `school_code` to scope statistics to one school.

use serde::{Deserialize, Serialize};

/// A course as the directory reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
  pub course_id:   i64,
  /// The CUE-style code of the owning school; the scoping key for every
  /// aggregate query.
  pub school_code: String,
  pub name:        String,
  /// School year the course belongs to (ciclo lectivo).
  pub cycle:       i32,
  pub division:    String,
}

impl Course {
  /// Display label used in per-course statistics rows, e.g. `"7mo B (2024)"`.
  pub fn label(&self) -> String {
    format!("{} {} ({})", self.name, self.division, self.cycle)
  }
}
