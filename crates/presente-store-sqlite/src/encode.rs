//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Dates are stored as ISO-8601 strings (`YYYY-MM-DD`), statuses as the same
//! Spanish tags the wire uses.

use chrono::NaiveDate;
use presente_core::{
  course::Course,
  record::{AttendanceRecord, AttendanceStatus},
  store::ScopedRecord,
};

use crate::{Error, Result};

// ─── Date ────────────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Status ──────────────────────────────────────────────────────────────────

pub fn encode_status(s: AttendanceStatus) -> &'static str {
  match s {
    AttendanceStatus::Presente => "Presente",
    AttendanceStatus::Ausente => "Ausente",
    AttendanceStatus::Tarde => "Tarde",
  }
}

pub fn decode_status(s: &str) -> Result<AttendanceStatus> {
  match s {
    "Presente" => Ok(AttendanceStatus::Presente),
    "Ausente" => Ok(AttendanceStatus::Ausente),
    "Tarde" => Ok(AttendanceStatus::Tarde),
    other => Err(Error::UnknownStatus(other.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `attendance` row.
pub struct RawRecord {
  pub course_id:  i64,
  pub student_id: i64,
  pub date:       String,
  pub status:     String,
  pub rain:       bool,
}

impl RawRecord {
  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      course_id:  self.course_id,
      student_id: self.student_id,
      date:       decode_date(&self.date)?,
      status:     decode_status(&self.status)?,
      rain:       self.rain,
    })
  }
}

/// Raw values from an `attendance` row joined with its `courses` row.
pub struct RawScoped {
  pub record:      RawRecord,
  pub school_code: String,
  pub name:        String,
  pub cycle:       i32,
  pub division:    String,
}

impl RawScoped {
  pub fn into_scoped(self) -> Result<ScopedRecord> {
    let record = self.record.into_record()?;
    Ok(ScopedRecord {
      course: Course {
        course_id:   record.course_id,
        school_code: self.school_code,
        name:        self.name,
        cycle:       self.cycle,
        division:    self.division,
      },
      record,
    })
  }
}
