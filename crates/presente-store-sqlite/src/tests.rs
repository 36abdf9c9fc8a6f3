//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use presente_core::{
  course::Course,
  record::{AttendanceRecord, AttendanceStatus},
  store::{AttendanceStore, Directory, StatsScope},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn course(id: i64, school_code: &str) -> Course {
  Course {
    course_id:   id,
    school_code: school_code.into(),
    name:        format!("Curso {id}"),
    cycle:       2024,
    division:    "A".into(),
  }
}

async fn seed(s: &SqliteStore, courses: &[(i64, &str)], students: &[i64]) {
  for &(id, code) in courses {
    s.add_course(course(id, code)).await.unwrap();
  }
  for &id in students {
    s.add_student(id).await.unwrap();
  }
}

fn d(day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, day).unwrap() }

fn rec(
  course_id: i64,
  student_id: i64,
  date: NaiveDate,
  status: AttendanceStatus,
  rain: bool,
) -> AttendanceRecord {
  AttendanceRecord { course_id, student_id, date, status, rain }
}

use AttendanceStatus::{Ausente, Presente, Tarde};

// ─── Directory ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_course_resolves_seeded_course() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[]).await;

  let found = s.get_course(1).await.unwrap().unwrap();
  assert_eq!(found.school_code, "A01");
  assert_eq!(found.label(), "Curso 1 A (2024)");

  assert!(s.get_course(2).await.unwrap().is_none());
}

#[tokio::test]
async fn student_existence_lookups() {
  let s = store().await;
  seed(&s, &[], &[10, 11]).await;

  assert!(s.student_exists(10).await.unwrap());
  assert!(!s.student_exists(12).await.unwrap());

  let missing = s.missing_students(&[10, 11, 12, 13]).await.unwrap();
  assert_eq!(missing, [12, 13]);

  assert!(s.missing_students(&[]).await.unwrap().is_empty());
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_inserts_and_reads_back() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1]).await;

  let written = s.upsert(rec(1, 1, d(1), Presente, true)).await.unwrap();
  assert_eq!(written, rec(1, 1, d(1), Presente, true));

  let fetched = s.get(1, 1, d(1)).await.unwrap().unwrap();
  assert_eq!(fetched, written);
}

#[tokio::test]
async fn upsert_overwrites_without_duplicating() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1]).await;

  s.upsert(rec(1, 1, d(1), Presente, false)).await.unwrap();
  let updated = s.upsert(rec(1, 1, d(1), Ausente, true)).await.unwrap();
  assert_eq!(updated.status, Ausente);
  assert!(updated.rain);

  let rows = s.list_by_course_and_date(1, d(1)).await.unwrap();
  assert_eq!(rows.len(), 1, "one row per composite key");
  assert_eq!(rows[0], updated);
}

#[tokio::test]
async fn get_missing_key_returns_none() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1]).await;
  assert!(s.get(1, 1, d(1)).await.unwrap().is_none());
}

// ─── Batch upsert ────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_many_returns_rows_in_input_order() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1, 2, 3]).await;

  let batch = vec![
    rec(1, 3, d(1), Tarde, false),
    rec(1, 1, d(1), Presente, false),
    rec(1, 2, d(1), Ausente, false),
  ];
  let out = s.upsert_many(batch.clone()).await.unwrap();
  assert_eq!(out, batch);
}

#[tokio::test]
async fn upsert_many_rolls_back_on_constraint_failure() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1]).await;

  // The second row violates the students foreign key; the whole
  // transaction must roll back, including the valid first row.
  let batch = vec![
    rec(1, 1, d(1), Presente, false),
    rec(1, 999, d(1), Presente, false),
  ];
  assert!(s.upsert_many(batch).await.is_err());

  let rows = s.list_by_course(1, 0, 10).await.unwrap();
  assert!(rows.is_empty(), "no partial batch may survive");
}

#[tokio::test]
async fn upsert_many_last_entry_wins_for_duplicate_keys() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1]).await;

  let batch = vec![
    rec(1, 1, d(1), Presente, false),
    rec(1, 1, d(1), Ausente, true),
  ];
  s.upsert_many(batch).await.unwrap();

  let rows = s.list_by_course_and_date(1, d(1)).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].status, Ausente);
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_by_course_orders_by_date_descending() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1]).await;
  for day in [3, 1, 2] {
    s.upsert(rec(1, 1, d(day), Presente, false)).await.unwrap();
  }

  let rows = s.list_by_course(1, 0, 10).await.unwrap();
  let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
  assert_eq!(dates, [d(3), d(2), d(1)]);
}

#[tokio::test]
async fn list_by_course_applies_offset_and_limit() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1]).await;
  for day in 1..=5 {
    s.upsert(rec(1, 1, d(day), Presente, false)).await.unwrap();
  }

  let rows = s.list_by_course(1, 1, 2).await.unwrap();
  let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
  assert_eq!(dates, [d(4), d(3)]);
}

#[tokio::test]
async fn list_by_student_spans_courses() {
  let s = store().await;
  seed(&s, &[(1, "A01"), (2, "A01")], &[1]).await;
  s.upsert(rec(1, 1, d(1), Presente, false)).await.unwrap();
  s.upsert(rec(2, 1, d(2), Ausente, false)).await.unwrap();

  let rows = s.list_by_student(1, 0, 10).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].date, d(2));
}

#[tokio::test]
async fn list_by_course_and_student_year_filter_is_inclusive() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1]).await;

  let dec31 = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
  let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
  let dec31_24 = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
  for date in [dec31, jan1, dec31_24] {
    s.upsert(rec(1, 1, date, Presente, false)).await.unwrap();
  }

  let rows = s
    .list_by_course_and_student(1, 1, Some(2024), 0, 10)
    .await
    .unwrap();
  let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
  assert_eq!(dates, [dec31_24, jan1]);
}

// ─── Scope loading ───────────────────────────────────────────────────────────

#[tokio::test]
async fn load_scope_filters_by_school_code() {
  let s = store().await;
  seed(&s, &[(1, "A01"), (2, "B02")], &[1]).await;
  s.upsert(rec(1, 1, d(1), Presente, false)).await.unwrap();
  s.upsert(rec(2, 1, d(1), Ausente, false)).await.unwrap();

  let scope = StatsScope::new("A01", d(1), d(31));
  let rows = s.load_scope(&scope).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].record.course_id, 1);
  assert_eq!(rows[0].course.school_code, "A01");
}

#[tokio::test]
async fn load_scope_date_range_is_inclusive() {
  let s = store().await;
  seed(&s, &[(1, "A01")], &[1]).await;
  for day in [1, 2, 3] {
    s.upsert(rec(1, 1, d(day), Presente, false)).await.unwrap();
  }

  let scope = StatsScope::new("A01", d(1), d(2));
  let rows = s.load_scope(&scope).await.unwrap();
  let dates: Vec<_> = rows.iter().map(|r| r.record.date).collect();
  assert_eq!(dates, [d(1), d(2)]);
}

#[tokio::test]
async fn load_scope_narrows_by_course_list_and_rain() {
  let s = store().await;
  seed(&s, &[(1, "A01"), (2, "A01"), (3, "A01")], &[1]).await;
  s.upsert(rec(1, 1, d(1), Presente, true)).await.unwrap();
  s.upsert(rec(2, 1, d(1), Presente, false)).await.unwrap();
  s.upsert(rec(3, 1, d(1), Ausente, true)).await.unwrap();

  let mut scope = StatsScope::new("A01", d(1), d(31));
  scope.course_ids = Some(vec![1, 2]);
  let rows = s.load_scope(&scope).await.unwrap();
  assert_eq!(rows.len(), 2);

  scope.only_rain = Some(true);
  let rows = s.load_scope(&scope).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].record.course_id, 1);

  scope.only_rain = Some(false);
  let rows = s.load_scope(&scope).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].record.course_id, 2);
}

#[tokio::test]
async fn load_scope_with_no_matching_school_is_empty_not_an_error() {
  let s = store().await;
  let scope = StatsScope::new("Z99", d(1), d(31));
  assert!(s.load_scope(&scope).await.unwrap().is_empty());
}
