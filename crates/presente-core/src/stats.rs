//! The Statistics Engine — pure aggregation over scoped attendance rows.
//!
//! Every function here takes the rows a store already loaded for a
//! [`StatsScope`](crate::store::StatsScope) and folds them into the report
//! shapes the front-end binds to. Field names on the wire (`kpis`,
//! `topCursosAusentismo`, `rango`, `lluvia`/`sinLluvia`, ...) are part of
//! the contract and must not drift.
//!
//! One business rule runs through everything: `Tarde` counts toward the
//! presence percentage AND is reported as its own tally. Only `Ausente`
//! feeds absence-based risk metrics.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{record::AttendanceStatus, store::ScopedRecord};

/// Default at-risk threshold: absences at or above this count flag a
/// student.
pub const DEFAULT_RISK_THRESHOLD: u32 = 20;

/// Default inasistencia distribution ranges; the final bucket is open-ended.
pub const DEFAULT_BUCKETS: &[(u32, Option<u32>)] = &[
  (0, Some(10)),
  (11, Some(20)),
  (21, Some(30)),
  (31, Some(44)),
  (45, Some(56)),
  (57, None),
];

// ─── Bucketing ───────────────────────────────────────────────────────────────

/// Calendar grouping for [`series`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
  #[default]
  Day,
  Week,
  Month,
}

impl GroupBy {
  /// The string key for a date's bucket. All three formats sort
  /// lexicographically in calendar order.
  pub fn key(self, date: NaiveDate) -> String {
    match self {
      Self::Day => date.format("%Y-%m-%d").to_string(),
      Self::Week => {
        let week = date.iso_week();
        format!("{:04}-W{:02}", week.year(), week.week())
      }
      Self::Month => date.format("%Y-%m").to_string(),
    }
  }
}

// ─── Tally ───────────────────────────────────────────────────────────────────

/// Running counts for one slice of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
  pub presentes: u64,
  pub ausentes:  u64,
  pub tardes:    u64,
  pub total:     u64,
}

impl Tally {
  pub fn observe(&mut self, status: AttendanceStatus) {
    self.total += 1;
    if status.is_present_equivalent() {
      self.presentes += 1;
    }
    if status.is_absent() {
      self.ausentes += 1;
    }
    if status.is_late() {
      self.tardes += 1;
    }
  }

  pub fn asistencia_pct(&self) -> f64 { pct(self.presentes, self.total) }

  pub fn ausentismo_pct(&self) -> f64 { pct(self.ausentes, self.total) }
}

/// `round(n / d * 100, 2)`, or `0.0` when the denominator is zero.
pub fn pct(n: u64, d: u64) -> f64 {
  if d == 0 {
    return 0.0;
  }
  let raw = n as f64 / d as f64 * 100.0;
  (raw * 100.0).round() / 100.0
}

// ─── Report types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryKpis {
  pub presentes:         u64,
  pub ausentes:          u64,
  pub tardes:            u64,
  pub total_registros:   u64,
  pub asistencia_pct:    f64,
  pub alumnos_distintos: u64,
  pub alumnos_riesgo:    u64,
  pub riesgo_pct:        f64,
}

/// One course in the top-ausentismo list.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseAbsenceRow {
  pub id_curso:       i64,
  /// `"{name} {division} ({cycle})"`.
  pub curso:          String,
  pub ausentes:       u64,
  pub tardes:         u64,
  pub total:          u64,
  pub ausentismo_pct: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
  pub desde: NaiveDate,
  pub hasta: NaiveDate,
  pub kpis:  SummaryKpis,
  pub top_cursos_ausentismo: Vec<CourseAbsenceRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesBucket {
  pub bucket:         String,
  pub presentes:      u64,
  pub ausentes:       u64,
  pub tardes:         u64,
  pub total:          u64,
  pub asistencia_pct: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DistributionBucket {
  /// `"0-10"` .. `"57+"`.
  pub rango:   String,
  pub alumnos: u64,
  pub pct:     f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionReport {
  pub total_alumnos: u64,
  pub distribucion:  Vec<DistributionBucket>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseRiskRow {
  pub id_curso:       i64,
  pub curso:          String,
  pub alumnos_riesgo: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RainKpis {
  pub total:          u64,
  pub presentes:      u64,
  pub ausentes:       u64,
  pub tardes:         u64,
  pub asistencia_pct: f64,
  pub ausentismo_pct: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RainComparison {
  pub lluvia:     RainKpis,
  pub sin_lluvia: RainKpis,
}

// ─── Summary ─────────────────────────────────────────────────────────────────

/// Global KPIs plus the five courses with the worst ausentismo percentage.
pub fn summary(
  rows: &[ScopedRecord],
  desde: NaiveDate,
  hasta: NaiveDate,
  umbral_riesgo: u32,
) -> SummaryReport {
  let mut global = Tally::default();
  let mut students: HashSet<i64> = HashSet::new();
  let mut absences_by_student: HashMap<i64, u64> = HashMap::new();

  struct CourseAgg {
    label: String,
    tally: Tally,
  }
  let mut by_course: HashMap<i64, CourseAgg> = HashMap::new();

  for row in rows {
    let status = row.record.status;
    global.observe(status);
    students.insert(row.record.student_id);
    if status.is_absent() {
      *absences_by_student.entry(row.record.student_id).or_default() += 1;
    }

    by_course
      .entry(row.record.course_id)
      .or_insert_with(|| CourseAgg {
        label: row.course.label(),
        tally: Tally::default(),
      })
      .tally
      .observe(status);
  }

  let alumnos_distintos = students.len() as u64;
  let alumnos_riesgo = absences_by_student
    .values()
    .filter(|&&faltas| faltas >= u64::from(umbral_riesgo))
    .count() as u64;

  let mut top: Vec<CourseAbsenceRow> = by_course
    .into_iter()
    .map(|(id, agg)| CourseAbsenceRow {
      id_curso:       id,
      curso:          agg.label,
      ausentes:       agg.tally.ausentes,
      tardes:         agg.tally.tardes,
      total:          agg.tally.total,
      ausentismo_pct: agg.tally.ausentismo_pct(),
    })
    .collect();
  top.sort_by(|a, b| {
    b.ausentismo_pct
      .total_cmp(&a.ausentismo_pct)
      .then(a.id_curso.cmp(&b.id_curso))
  });
  top.truncate(5);

  SummaryReport {
    desde,
    hasta,
    kpis: SummaryKpis {
      presentes:         global.presentes,
      ausentes:          global.ausentes,
      tardes:            global.tardes,
      total_registros:   global.total,
      asistencia_pct:    global.asistencia_pct(),
      alumnos_distintos,
      alumnos_riesgo,
      riesgo_pct:        pct(alumnos_riesgo, alumnos_distintos),
    },
    top_cursos_ausentismo: top,
  }
}

// ─── Series ──────────────────────────────────────────────────────────────────

/// Time series bucketed by day, ISO week, or month, ascending by bucket key.
pub fn series(rows: &[ScopedRecord], group_by: GroupBy) -> Vec<SeriesBucket> {
  let mut buckets: BTreeMap<String, Tally> = BTreeMap::new();
  for row in rows {
    buckets
      .entry(group_by.key(row.record.date))
      .or_default()
      .observe(row.record.status);
  }

  buckets
    .into_iter()
    .map(|(bucket, tally)| SeriesBucket {
      bucket,
      presentes:      tally.presentes,
      ausentes:       tally.ausentes,
      tardes:         tally.tardes,
      total:          tally.total,
      asistencia_pct: tally.asistencia_pct(),
    })
    .collect()
}

// ─── Distribution ────────────────────────────────────────────────────────────

/// Distribution of students over absence-count ranges. A student with no
/// absences in scope still counts (they fall in the lowest bucket), because
/// every student observed in scope is part of the population.
pub fn distribution(
  rows: &[ScopedRecord],
  buckets: &[(u32, Option<u32>)],
) -> DistributionReport {
  let mut absences_by_student: HashMap<i64, u64> = HashMap::new();
  for row in rows {
    let faltas = absences_by_student.entry(row.record.student_id).or_default();
    if row.record.status.is_absent() {
      *faltas += 1;
    }
  }

  let total_alumnos = absences_by_student.len() as u64;
  let distribucion = buckets
    .iter()
    .map(|&(low, high)| {
      let low = u64::from(low);
      let (rango, alumnos) = match high {
        Some(high) => {
          let high = u64::from(high);
          let n = absences_by_student
            .values()
            .filter(|&&f| f >= low && f <= high)
            .count() as u64;
          (format!("{low}-{high}"), n)
        }
        None => {
          let n =
            absences_by_student.values().filter(|&&f| f >= low).count() as u64;
          (format!("{low}+"), n)
        }
      };
      DistributionBucket {
        rango,
        alumnos,
        pct: pct(alumnos, total_alumnos),
      }
    })
    .collect();

  DistributionReport { total_alumnos, distribucion }
}

// ─── Risk by course ──────────────────────────────────────────────────────────

/// Per course, how many students meet or exceed `umbral` absences within the
/// scope. Courses with no at-risk students are omitted; output is sorted by
/// at-risk count descending.
pub fn risk_by_course(rows: &[ScopedRecord], umbral: u32) -> Vec<CourseRiskRow> {
  let mut absences: HashMap<(i64, i64), u64> = HashMap::new();
  let mut labels: HashMap<i64, String> = HashMap::new();

  for row in rows {
    let key = (row.record.course_id, row.record.student_id);
    let faltas = absences.entry(key).or_default();
    if row.record.status.is_absent() {
      *faltas += 1;
    }
    labels
      .entry(row.record.course_id)
      .or_insert_with(|| row.course.label());
  }

  let mut at_risk: HashMap<i64, u64> = HashMap::new();
  for (&(course_id, _student_id), &faltas) in &absences {
    if faltas >= u64::from(umbral) {
      *at_risk.entry(course_id).or_default() += 1;
    }
  }

  let mut out: Vec<CourseRiskRow> = at_risk
    .into_iter()
    .map(|(id, n)| CourseRiskRow {
      id_curso:       id,
      curso:          labels.get(&id).cloned().unwrap_or_default(),
      alumnos_riesgo: n,
    })
    .collect();
  out.sort_by(|a, b| {
    b.alumnos_riesgo
      .cmp(&a.alumnos_riesgo)
      .then(a.id_curso.cmp(&b.id_curso))
  });
  out
}

// ─── Rain comparison ─────────────────────────────────────────────────────────

/// The KPI tally computed twice: rainy-day rows vs dry-day rows.
pub fn rain_comparison(rows: &[ScopedRecord]) -> RainComparison {
  fn kpis(rows: &[ScopedRecord], rain: bool) -> RainKpis {
    let mut tally = Tally::default();
    for row in rows.iter().filter(|r| r.record.rain == rain) {
      tally.observe(row.record.status);
    }
    RainKpis {
      total:          tally.total,
      presentes:      tally.presentes,
      ausentes:       tally.ausentes,
      tardes:         tally.tardes,
      asistencia_pct: tally.asistencia_pct(),
      ausentismo_pct: tally.ausentismo_pct(),
    }
  }

  RainComparison {
    lluvia:     kpis(rows, true),
    sin_lluvia: kpis(rows, false),
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{course::Course, record::AttendanceRecord};

  fn course(id: i64) -> Course {
    Course {
      course_id:   id,
      school_code: "A01".into(),
      name:        format!("Curso {id}"),
      cycle:       2024,
      division:    "B".into(),
    }
  }

  fn row(
    course_id: i64,
    student_id: i64,
    day: u32,
    status: AttendanceStatus,
    rain: bool,
  ) -> ScopedRecord {
    ScopedRecord {
      record: AttendanceRecord {
        course_id,
        student_id,
        date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
        status,
        rain,
      },
      course: course(course_id),
    }
  }

  fn d(day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(2024, 3, day).unwrap() }

  use AttendanceStatus::{Ausente, Presente, Tarde};

  // ── summary ──────────────────────────────────────────────────────────────

  #[test]
  fn summary_counts_late_as_present_and_separately() {
    // 5 Presente, 3 Ausente, 2 Tarde across one course.
    let mut rows = vec![];
    for s in 1..=5 {
      rows.push(row(1, s, 1, Presente, false));
    }
    for s in 6..=8 {
      rows.push(row(1, s, 1, Ausente, false));
    }
    for s in 9..=10 {
      rows.push(row(1, s, 1, Tarde, false));
    }

    let report = summary(&rows, d(1), d(1), DEFAULT_RISK_THRESHOLD);
    assert_eq!(report.kpis.presentes, 7);
    assert_eq!(report.kpis.ausentes, 3);
    assert_eq!(report.kpis.tardes, 2);
    assert_eq!(report.kpis.total_registros, 10);
    assert_eq!(report.kpis.asistencia_pct, 70.0);
    assert_eq!(report.kpis.alumnos_distintos, 10);
  }

  #[test]
  fn summary_over_empty_scope_is_all_zero() {
    let report = summary(&[], d(1), d(31), DEFAULT_RISK_THRESHOLD);
    assert_eq!(report.kpis.total_registros, 0);
    assert_eq!(report.kpis.asistencia_pct, 0.0);
    assert_eq!(report.kpis.riesgo_pct, 0.0);
    assert!(report.top_cursos_ausentismo.is_empty());
  }

  #[test]
  fn risk_threshold_is_inclusive() {
    // Student 1 accumulates exactly the threshold in absences.
    let mut rows = vec![];
    for day in 1..=20 {
      rows.push(row(1, 1, day, Ausente, false));
    }
    // Student 2 stays one below.
    for day in 1..=19 {
      rows.push(row(1, 2, day, Ausente, false));
    }
    let report = summary(&rows, d(1), d(31), 20);
    assert_eq!(report.kpis.alumnos_riesgo, 1);
    assert_eq!(report.kpis.riesgo_pct, 50.0);
  }

  #[test]
  fn summary_top_courses_sorted_by_ausentismo_and_capped_at_five() {
    let mut rows = vec![];
    // Courses 1..=6: course N gets N absences and (6 - N) presents.
    for c in 1..=6 {
      for s in 0..c {
        rows.push(row(c, s, 1, Ausente, false));
      }
      for s in c..6 {
        rows.push(row(c, 100 + s, 1, Presente, false));
      }
    }
    let report = summary(&rows, d(1), d(1), DEFAULT_RISK_THRESHOLD);
    let top = &report.top_cursos_ausentismo;
    assert_eq!(top.len(), 5);
    // Course 6 is 100% absent, course 2 (the fifth entry) beats course 1.
    assert_eq!(top[0].id_curso, 6);
    assert_eq!(top[0].ausentismo_pct, 100.0);
    assert_eq!(top[4].id_curso, 2);
    assert!(
      top.windows(2).all(|w| w[0].ausentismo_pct >= w[1].ausentismo_pct)
    );
  }

  #[test]
  fn course_label_includes_division_and_cycle() {
    let rows = vec![row(3, 1, 1, Ausente, false)];
    let report = summary(&rows, d(1), d(1), DEFAULT_RISK_THRESHOLD);
    assert_eq!(report.top_cursos_ausentismo[0].curso, "Curso 3 B (2024)");
  }

  // ── series ───────────────────────────────────────────────────────────────

  #[test]
  fn series_by_day_orders_buckets_ascending() {
    let rows = vec![
      row(1, 1, 2, Presente, false),
      row(1, 1, 1, Ausente, false),
      row(1, 2, 2, Tarde, false),
    ];
    let buckets = series(&rows, GroupBy::Day);
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].bucket, "2024-03-01");
    assert_eq!(buckets[0].ausentes, 1);
    assert_eq!(buckets[1].bucket, "2024-03-02");
    assert_eq!(buckets[1].presentes, 2);
    assert_eq!(buckets[1].tardes, 1);
    assert_eq!(buckets[1].asistencia_pct, 100.0);
  }

  #[test]
  fn series_week_keys_use_iso_week() {
    // 2024-03-01 is a Friday in ISO week 9; 2024-03-04 a Monday in week 10.
    let rows = vec![row(1, 1, 1, Presente, false), row(1, 1, 4, Presente, false)];
    let buckets = series(&rows, GroupBy::Week);
    let keys: Vec<_> = buckets.iter().map(|b| b.bucket.as_str()).collect();
    assert_eq!(keys, ["2024-W09", "2024-W10"]);
  }

  #[test]
  fn series_month_collapses_a_month_to_one_bucket() {
    let rows = vec![
      row(1, 1, 1, Presente, false),
      row(1, 1, 15, Ausente, false),
      row(1, 1, 28, Tarde, false),
    ];
    let buckets = series(&rows, GroupBy::Month);
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].bucket, "2024-03");
    assert_eq!(buckets[0].total, 3);
  }

  // ── distribution ─────────────────────────────────────────────────────────

  #[test]
  fn distribution_buckets_are_exclusive_and_exhaustive() {
    let mut rows = vec![];
    // Student 1: 0 absences (present every day) → bucket 0-10.
    rows.push(row(1, 1, 1, Presente, false));
    // Student 2: 11 absences → bucket 11-20.
    for day in 1..=11 {
      rows.push(row(1, 2, day, Ausente, false));
    }
    // Student 3: 60 absences... use 2 courses to exceed day range.
    for day in 1..=30 {
      rows.push(row(1, 3, day, Ausente, false));
      rows.push(row(2, 3, day, Ausente, false));
    }

    let report = distribution(&rows, DEFAULT_BUCKETS);
    assert_eq!(report.total_alumnos, 3);

    let counted: u64 = report.distribucion.iter().map(|b| b.alumnos).sum();
    assert_eq!(counted, 3, "every student falls in exactly one bucket");

    let by_label: std::collections::HashMap<_, _> = report
      .distribucion
      .iter()
      .map(|b| (b.rango.as_str(), b.alumnos))
      .collect();
    assert_eq!(by_label["0-10"], 1);
    assert_eq!(by_label["11-20"], 1);
    assert_eq!(by_label["57+"], 1);
  }

  #[test]
  fn distribution_boundaries_are_inclusive() {
    let mut rows = vec![];
    for day in 1..=10 {
      rows.push(row(1, 1, day, Ausente, false)); // exactly 10 → 0-10
    }
    for day in 1..=21 {
      rows.push(row(2, 2, day, Ausente, false)); // exactly 21 → 21-30
    }
    let report = distribution(&rows, DEFAULT_BUCKETS);
    let by_label: std::collections::HashMap<_, _> = report
      .distribucion
      .iter()
      .map(|b| (b.rango.as_str(), b.alumnos))
      .collect();
    assert_eq!(by_label["0-10"], 1);
    assert_eq!(by_label["21-30"], 1);
    assert_eq!(by_label["11-20"], 0);
  }

  #[test]
  fn distribution_of_empty_scope_reports_zero_population() {
    let report = distribution(&[], DEFAULT_BUCKETS);
    assert_eq!(report.total_alumnos, 0);
    assert!(report.distribucion.iter().all(|b| b.alumnos == 0 && b.pct == 0.0));
  }

  // ── risk by course ───────────────────────────────────────────────────────

  #[test]
  fn risk_by_course_counts_per_course_and_sorts_descending() {
    let mut rows = vec![];
    // Course 1: students 1 and 2 at threshold.
    for s in [1, 2] {
      for day in 1..=20 {
        rows.push(row(1, s, day, Ausente, false));
      }
    }
    // Course 2: student 3 at threshold.
    for day in 1..=20 {
      rows.push(row(2, 3, day, Ausente, false));
    }
    // Course 3: nobody at risk.
    rows.push(row(3, 4, 1, Ausente, false));

    let out = risk_by_course(&rows, 20);
    assert_eq!(out.len(), 2, "course with no at-risk students is omitted");
    assert_eq!(out[0].id_curso, 1);
    assert_eq!(out[0].alumnos_riesgo, 2);
    assert_eq!(out[1].id_curso, 2);
    assert_eq!(out[1].alumnos_riesgo, 1);
  }

  #[test]
  fn risk_by_course_keeps_per_course_sums_separate() {
    // 10 absences in each of two courses must not merge into one 20.
    let mut rows = vec![];
    for day in 1..=10 {
      rows.push(row(1, 1, day, Ausente, false));
      rows.push(row(2, 1, day, Ausente, false));
    }
    assert!(risk_by_course(&rows, 20).is_empty());
  }

  // ── rain comparison ──────────────────────────────────────────────────────

  #[test]
  fn rain_comparison_partitions_by_flag() {
    let rows = vec![
      row(1, 1, 1, Ausente, false),
      row(1, 1, 2, Presente, true),
    ];
    let cmp = rain_comparison(&rows);
    assert_eq!(cmp.lluvia.total, 1);
    assert_eq!(cmp.lluvia.presentes, 1);
    assert_eq!(cmp.lluvia.asistencia_pct, 100.0);
    assert_eq!(cmp.sin_lluvia.total, 1);
    assert_eq!(cmp.sin_lluvia.ausentes, 1);
    assert_eq!(cmp.sin_lluvia.ausentismo_pct, 100.0);
  }

  #[test]
  fn rain_comparison_serialises_with_contract_field_names() {
    let json = serde_json::to_value(rain_comparison(&[])).unwrap();
    assert!(json.get("lluvia").is_some());
    assert!(json.get("sinLluvia").is_some());
  }

  // ── helpers ──────────────────────────────────────────────────────────────

  #[test]
  fn pct_rounds_to_two_decimals_and_guards_zero() {
    assert_eq!(pct(1, 3), 33.33);
    assert_eq!(pct(2, 3), 66.67);
    assert_eq!(pct(0, 0), 0.0);
  }

  #[test]
  fn summary_json_field_names_match_the_front_end_contract() {
    let rows = vec![row(1, 1, 1, Tarde, false)];
    let json =
      serde_json::to_value(summary(&rows, d(1), d(1), 20)).unwrap();
    assert_eq!(json["kpis"]["totalRegistros"], 1);
    assert_eq!(json["kpis"]["asistenciaPct"], 100.0);
    assert_eq!(json["kpis"]["alumnosDistintos"], 1);
    assert!(json["topCursosAusentismo"].is_array());
  }
}
