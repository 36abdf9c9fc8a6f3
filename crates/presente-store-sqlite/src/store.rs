//! [`SqliteStore`] — the SQLite implementation of [`Directory`] and
//! [`AttendanceStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, types::Value};

use presente_core::{
  course::Course,
  record::AttendanceRecord,
  store::{AttendanceStore, Directory, ScopedRecord, StatsScope},
};

use crate::{
  Error, Result,
  encode::{RawRecord, RawScoped, encode_date, encode_status},
  schema::SCHEMA,
};

const UPSERT_SQL: &str = "INSERT INTO attendance (course_id, student_id, date, status, rain)
   VALUES (?1, ?2, ?3, ?4, ?5)
   ON CONFLICT (course_id, student_id, date) DO UPDATE SET
     status = excluded.status,
     rain   = excluded.rain";

const SELECT_ONE_SQL: &str = "SELECT course_id, student_id, date, status, rain
   FROM attendance
   WHERE course_id = ?1 AND student_id = ?2 AND date = ?3";

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
  Ok(RawRecord {
    course_id:  row.get(0)?,
    student_id: row.get(1)?,
    date:       row.get(2)?,
    status:     row.get(3)?,
    rain:       row.get(4)?,
  })
}

/// `?1, ?2, ..` placeholder list for an IN clause, starting at `first`.
fn placeholders(first: usize, count: usize) -> String {
  (first..first + count)
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An attendance store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All writes
/// funnel through the one connection thread, which is what serialises
/// concurrent upserts to the same key (last commit wins).
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Directory provisioning ────────────────────────────────────────────
  //
  // The directory tables are owned by the (out-of-scope) administration
  // system; these hooks exist for it and for tests.

  /// Insert or replace a course row.
  pub async fn add_course(&self, course: Course) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO courses (course_id, school_code, name, cycle, division)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            course.course_id,
            course.school_code,
            course.name,
            course.cycle,
            course.division,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert a student row if absent.
  pub async fn add_student(&self, student_id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO students (student_id) VALUES (?1)",
          rusqlite::params![student_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Directory impl ──────────────────────────────────────────────────────────

impl Directory for SqliteStore {
  type Error = Error;

  async fn get_course(&self, course_id: i64) -> Result<Option<Course>> {
    let course = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT course_id, school_code, name, cycle, division
               FROM courses WHERE course_id = ?1",
              rusqlite::params![course_id],
              |row| {
                Ok(Course {
                  course_id:   row.get(0)?,
                  school_code: row.get(1)?,
                  name:        row.get(2)?,
                  cycle:       row.get(3)?,
                  division:    row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(course)
  }

  async fn student_exists(&self, student_id: i64) -> Result<bool> {
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM students WHERE student_id = ?1",
              rusqlite::params![student_id],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;
    Ok(exists)
  }

  async fn missing_students(&self, ids: &[i64]) -> Result<Vec<i64>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids = ids.to_vec();

    let missing = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT student_id FROM students WHERE student_id IN ({})",
          placeholders(1, ids.len()),
        );
        let mut stmt = conn.prepare(&sql)?;
        let existing = stmt
          .query_map(
            rusqlite::params_from_iter(ids.iter().copied()),
            |row| row.get::<_, i64>(0),
          )?
          .collect::<rusqlite::Result<std::collections::HashSet<_>>>()?;

        Ok(
          ids
            .into_iter()
            .filter(|id| !existing.contains(id))
            .collect::<Vec<_>>(),
        )
      })
      .await?;
    Ok(missing)
  }
}

// ─── AttendanceStore impl ────────────────────────────────────────────────────

impl AttendanceStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────

  async fn upsert(&self, record: AttendanceRecord) -> Result<AttendanceRecord> {
    let date_str = encode_date(record.date);
    let status_str = encode_status(record.status);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          UPSERT_SQL,
          rusqlite::params![
            record.course_id,
            record.student_id,
            date_str,
            status_str,
            record.rain,
          ],
        )?;
        let raw = conn.query_row(
          SELECT_ONE_SQL,
          rusqlite::params![record.course_id, record.student_id, date_str],
          read_raw,
        )?;
        Ok(raw)
      })
      .await?;

    raw.into_record()
  }

  async fn upsert_many(
    &self,
    records: Vec<AttendanceRecord>,
  ) -> Result<Vec<AttendanceRecord>> {
    let raws = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut out = Vec::with_capacity(records.len());
        {
          let mut upsert = tx.prepare(UPSERT_SQL)?;
          let mut select = tx.prepare(SELECT_ONE_SQL)?;
          for record in &records {
            let date_str = encode_date(record.date);
            upsert.execute(rusqlite::params![
              record.course_id,
              record.student_id,
              date_str,
              encode_status(record.status),
              record.rain,
            ])?;
            out.push(select.query_row(
              rusqlite::params![record.course_id, record.student_id, date_str],
              read_raw,
            )?);
          }
        }
        tx.commit()?;
        Ok(out)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  async fn get(
    &self,
    course_id: i64,
    student_id: i64,
    date: chrono::NaiveDate,
  ) -> Result<Option<AttendanceRecord>> {
    let date_str = encode_date(date);
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              SELECT_ONE_SQL,
              rusqlite::params![course_id, student_id, date_str],
              read_raw,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawRecord::into_record).transpose()
  }

  async fn list_by_course_and_date(
    &self,
    course_id: i64,
    date: chrono::NaiveDate,
  ) -> Result<Vec<AttendanceRecord>> {
    let date_str = encode_date(date);
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT course_id, student_id, date, status, rain
           FROM attendance
           WHERE course_id = ?1 AND date = ?2
           ORDER BY student_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![course_id, date_str], read_raw)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn list_by_course(
    &self,
    course_id: i64,
    offset: u64,
    limit: u64,
  ) -> Result<Vec<AttendanceRecord>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT course_id, student_id, date, status, rain
           FROM attendance
           WHERE course_id = ?1
           ORDER BY date DESC, student_id
           LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![course_id, limit as i64, offset as i64],
            read_raw,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn list_by_student(
    &self,
    student_id: i64,
    offset: u64,
    limit: u64,
  ) -> Result<Vec<AttendanceRecord>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT course_id, student_id, date, status, rain
           FROM attendance
           WHERE student_id = ?1
           ORDER BY date DESC, course_id
           LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![student_id, limit as i64, offset as i64],
            read_raw,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn list_by_course_and_student(
    &self,
    course_id: i64,
    student_id: i64,
    year: Option<i32>,
    offset: u64,
    limit: u64,
  ) -> Result<Vec<AttendanceRecord>> {
    let raws = self
      .conn
      .call(move |conn| {
        let rows = if let Some(year) = year {
          let mut stmt = conn.prepare(
            "SELECT course_id, student_id, date, status, rain
             FROM attendance
             WHERE course_id = ?1 AND student_id = ?2
               AND date >= ?3 AND date <= ?4
             ORDER BY date DESC
             LIMIT ?5 OFFSET ?6",
          )?;
          stmt
            .query_map(
              rusqlite::params![
                course_id,
                student_id,
                format!("{year:04}-01-01"),
                format!("{year:04}-12-31"),
                limit as i64,
                offset as i64,
              ],
              read_raw,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(
            "SELECT course_id, student_id, date, status, rain
             FROM attendance
             WHERE course_id = ?1 AND student_id = ?2
             ORDER BY date DESC
             LIMIT ?3 OFFSET ?4",
          )?;
          stmt
            .query_map(
              rusqlite::params![
                course_id,
                student_id,
                limit as i64,
                offset as i64,
              ],
              read_raw,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn load_scope(&self, scope: &StatsScope) -> Result<Vec<ScopedRecord>> {
    // WHERE clause is assembled dynamically; every value is still bound.
    let mut conditions = vec![
      "c.school_code = ?1".to_owned(),
      "a.date >= ?2".to_owned(),
      "a.date <= ?3".to_owned(),
    ];
    let mut values: Vec<Value> = vec![
      Value::Text(scope.school_code.clone()),
      Value::Text(encode_date(scope.from)),
      Value::Text(encode_date(scope.to)),
    ];

    if let Some(course_ids) = &scope.course_ids {
      conditions.push(format!(
        "a.course_id IN ({})",
        placeholders(values.len() + 1, course_ids.len()),
      ));
      values.extend(course_ids.iter().map(|&id| Value::Integer(id)));
    }
    if let Some(rain) = scope.only_rain {
      conditions.push(format!("a.rain = ?{}", values.len() + 1));
      values.push(Value::Integer(i64::from(rain)));
    }

    let sql = format!(
      "SELECT a.course_id, a.student_id, a.date, a.status, a.rain,
              c.school_code, c.name, c.cycle, c.division
       FROM attendance a
       JOIN courses c ON c.course_id = a.course_id
       WHERE {}
       ORDER BY a.date, a.course_id, a.student_id",
      conditions.join(" AND "),
    );

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(values), |row| {
            Ok(RawScoped {
              record:      read_raw(row)?,
              school_code: row.get(5)?,
              name:        row.get(6)?,
              cycle:       row.get(7)?,
              division:    row.get(8)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawScoped::into_scoped).collect()
  }
}
