use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{PromotionCriteria, RosterSnapshot, ScoreEntry, Student, Subject, Term};
use crate::store::{read_score_rows, RecordStore, ScoreQuery, ScoreRow};

const STUDENT_COLUMNS: &str = "s.id, s.admission_no, s.full_name, s.class_name, \
     s.guardian_name, s.guardian_phone, s.guardian_email";

const ENTRY_COLUMNS: &str =
    "e.student_id, e.subject_id, e.term, e.year, e.class_score, e.exam_score";

const SUBJECTS_QUERY: &str = "SELECT id, name FROM school_scoring.subjects ORDER BY seq";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let pupils = [
        ("HA-001", "Ama Mensah", "Mrs. Akosua Mensah", "+233201111111"),
        ("HA-002", "Kofi Boateng", "Mr. Kwame Boateng", "+233202222222"),
        ("HA-003", "Esi Owusu", "Mrs. Abena Owusu", "+233203333333"),
        ("HA-004", "Yaw Darko", "Mr. Kojo Darko", "+233204444444"),
    ];
    let subjects = ["Mathematics", "English Language", "Integrated Science", "Social Studies"];
    let scores: [[(f64, f64); 4]; 4] = [
        [(38.0, 41.0), (34.0, 36.0), (42.0, 41.0), (37.0, 37.0)],
        [(20.0, 48.0), (22.0, 45.0), (25.0, 47.0), (21.0, 46.0)],
        [(30.0, 28.0), (35.0, 31.0), (29.0, 27.0), (33.0, 30.0)],
        [(18.0, 15.0), (21.0, 19.0), (16.0, 14.0), (22.0, 20.0)],
    ];

    let mut tx = pool.begin().await?;
    let mut written = 0usize;

    for ((admission_no, full_name, guardian_name, guardian_phone), rows) in
        pupils.iter().zip(scores)
    {
        for (subject, (class_score, exam_score)) in subjects.iter().zip(rows) {
            let row = ScoreRow {
                admission_no: admission_no.to_string(),
                full_name: full_name.to_string(),
                class_name: "JHS 2".to_string(),
                guardian_name: guardian_name.to_string(),
                guardian_phone: guardian_phone.to_string(),
                guardian_email: String::new(),
                subject: subject.to_string(),
                term: 1,
                year: "2025/2026".to_string(),
                class_score,
                exam_score,
            };
            upsert_row(&mut tx, &row, Term::First).await?;
            written += 1;
        }
    }

    let defaults = PromotionCriteria::default();
    sqlx::query(
        r#"
        INSERT INTO school_scoring.settings
        (id, minimum_average, minimum_subjects_passed, total_subjects)
        VALUES (1, $1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(defaults.minimum_average)
    .bind(i32::try_from(defaults.minimum_subjects_passed)?)
    .bind(i32::try_from(defaults.total_subjects)?)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(written)
}

/// Upserts the student by admission number, the subject by name and the
/// score entry by (student, subject, term, year).
async fn upsert_row(conn: &mut PgConnection, row: &ScoreRow, term: Term) -> anyhow::Result<()> {
    let student_id: Uuid = sqlx::query(
        r#"
        INSERT INTO school_scoring.students
        (id, admission_no, full_name, class_name, guardian_name, guardian_phone, guardian_email)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (admission_no) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            class_name = EXCLUDED.class_name,
            guardian_name = EXCLUDED.guardian_name,
            guardian_phone = EXCLUDED.guardian_phone,
            guardian_email = EXCLUDED.guardian_email
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(row.admission_no.trim())
    .bind(&row.full_name)
    .bind(&row.class_name)
    .bind(&row.guardian_name)
    .bind(&row.guardian_phone)
    .bind(&row.guardian_email)
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    let subject_id: Uuid = sqlx::query(
        r#"
        INSERT INTO school_scoring.subjects (id, name)
        VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(row.subject.trim())
    .fetch_one(&mut *conn)
    .await?
    .get("id");

    sqlx::query(
        r#"
        INSERT INTO school_scoring.score_entries
        (id, student_id, subject_id, term, year, class_score, exam_score)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (student_id, subject_id, term, year) DO UPDATE
        SET class_score = EXCLUDED.class_score,
            exam_score = EXCLUDED.exam_score,
            updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(subject_id)
    .bind(term.number())
    .bind(&row.year)
    .bind(row.class_score)
    .bind(row.exam_score)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Imports a score file in one transaction. A bad row aborts the import.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_score_rows(file)?;

    let mut tx = pool.begin().await?;
    for (row, term) in rows.iter() {
        upsert_row(&mut tx, row, *term).await?;
    }
    tx.commit().await?;

    info!(rows = rows.len(), path = %csv_path.display(), "imported score rows");
    Ok(rows.len())
}

fn student_from_row(row: &PgRow) -> Student {
    Student {
        id: row.get("id"),
        admission_no: row.get("admission_no"),
        full_name: row.get("full_name"),
        class_name: row.get("class_name"),
        guardian_name: row.get("guardian_name"),
        guardian_phone: row.get("guardian_phone"),
        guardian_email: row.get("guardian_email"),
    }
}

fn subject_from_row(row: &PgRow) -> Subject {
    Subject {
        id: row.get("id"),
        name: row.get("name"),
    }
}

fn entry_from_row(row: &PgRow) -> anyhow::Result<ScoreEntry> {
    Ok(ScoreEntry {
        student_id: row.get("student_id"),
        subject_id: row.get("subject_id"),
        term: Term::try_from(row.get::<i16, _>("term"))?,
        year: row.get("year"),
        class_score: row.get("class_score"),
        exam_score: row.get("exam_score"),
    })
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn students(&self, class_name: Option<&str>) -> anyhow::Result<Vec<Student>> {
        let mut query = format!("SELECT {STUDENT_COLUMNS} FROM school_scoring.students s");
        if class_name.is_some() {
            query.push_str(" WHERE s.class_name = $1");
        }
        query.push_str(" ORDER BY s.seq");

        let mut rows = sqlx::query(&query);
        if let Some(value) = class_name {
            rows = rows.bind(value);
        }

        let records = rows.fetch_all(&self.pool).await?;
        Ok(records.iter().map(student_from_row).collect())
    }

    async fn student(&self, student_id: Uuid) -> anyhow::Result<Option<Student>> {
        let query =
            format!("SELECT {STUDENT_COLUMNS} FROM school_scoring.students s WHERE s.id = $1");
        let record = sqlx::query(&query)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.as_ref().map(student_from_row))
    }

    async fn subjects(&self) -> anyhow::Result<Vec<Subject>> {
        let records = sqlx::query(SUBJECTS_QUERY).fetch_all(&self.pool).await?;
        Ok(records.iter().map(subject_from_row).collect())
    }

    async fn score_entries(&self, filter: &ScoreQuery<'_>) -> anyhow::Result<Vec<ScoreEntry>> {
        let mut query = format!(
            "SELECT {ENTRY_COLUMNS} FROM school_scoring.score_entries e \
             JOIN school_scoring.students s ON s.id = e.student_id \
             WHERE e.year = $1"
        );
        let mut next = 2;
        if filter.student_id.is_some() {
            query.push_str(&format!(" AND e.student_id = ${next}"));
            next += 1;
        }
        if filter.class_name.is_some() {
            query.push_str(&format!(" AND s.class_name = ${next}"));
            next += 1;
        }
        if filter.term.is_some() {
            query.push_str(&format!(" AND e.term = ${next}"));
        }
        query.push_str(" ORDER BY e.seq");

        let mut rows = sqlx::query(&query).bind(filter.year);
        if let Some(value) = filter.student_id {
            rows = rows.bind(value);
        }
        if let Some(value) = filter.class_name {
            rows = rows.bind(value);
        }
        if let Some(value) = filter.term {
            rows = rows.bind(value.number());
        }

        let records = rows.fetch_all(&self.pool).await?;
        records.iter().map(entry_from_row).collect()
    }

    async fn promotion_criteria(&self) -> anyhow::Result<Option<PromotionCriteria>> {
        let record = sqlx::query(
            "SELECT minimum_average, minimum_subjects_passed, total_subjects \
             FROM school_scoring.settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = record else {
            return Ok(None);
        };
        Ok(Some(PromotionCriteria {
            minimum_average: row.get("minimum_average"),
            minimum_subjects_passed: usize::try_from(row.get::<i32, _>("minimum_subjects_passed"))
                .context("minimum_subjects_passed is negative")?,
            total_subjects: usize::try_from(row.get::<i32, _>("total_subjects"))
                .context("total_subjects is negative")?,
        }))
    }

    /// Reads roster, entries and subjects in one read-only repeatable-read
    /// transaction so concurrent score writes cannot split the snapshot.
    async fn class_snapshot(
        &self,
        class_name: &str,
        year: &str,
    ) -> anyhow::Result<RosterSnapshot> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let students = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM school_scoring.students s \
             WHERE s.class_name = $1 ORDER BY s.seq"
        ))
        .bind(class_name)
        .fetch_all(&mut *tx)
        .await?;

        let entries = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM school_scoring.score_entries e \
             JOIN school_scoring.students s ON s.id = e.student_id \
             WHERE s.class_name = $1 AND e.year = $2 \
             ORDER BY e.seq"
        ))
        .bind(class_name)
        .bind(year)
        .fetch_all(&mut *tx)
        .await?;

        let subjects = sqlx::query(SUBJECTS_QUERY).fetch_all(&mut *tx).await?;

        tx.commit().await?;

        let snapshot = RosterSnapshot {
            class_name: class_name.to_string(),
            year: year.to_string(),
            students: students.iter().map(student_from_row).collect(),
            entries: entries
                .iter()
                .map(entry_from_row)
                .collect::<anyhow::Result<Vec<_>>>()?,
            subjects: subjects.iter().map(subject_from_row).collect(),
        };
        debug!(class = class_name, year, entries = snapshot.entries.len(), "loaded snapshot");
        Ok(snapshot)
    }
}
