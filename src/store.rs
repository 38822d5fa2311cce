use std::io::Read;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{PromotionCriteria, RosterSnapshot, ScoreEntry, Student, Subject, Term};

pub const MAX_COMPONENT_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Default)]
pub struct ScoreQuery<'a> {
    pub student_id: Option<Uuid>,
    pub class_name: Option<&'a str>,
    pub term: Option<Term>,
    pub year: &'a str,
}

/// Read side of the school's record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Students in insertion order, optionally limited to one class.
    async fn students(&self, class_name: Option<&str>) -> anyhow::Result<Vec<Student>>;

    async fn student(&self, student_id: Uuid) -> anyhow::Result<Option<Student>>;

    async fn subjects(&self) -> anyhow::Result<Vec<Subject>>;

    async fn score_entries(&self, query: &ScoreQuery<'_>) -> anyhow::Result<Vec<ScoreEntry>>;

    /// `None` when the school has not configured criteria.
    async fn promotion_criteria(&self) -> anyhow::Result<Option<PromotionCriteria>>;

    /// The class roster, every entry for the year and the subject list.
    /// Stores that can read at a single point in time should override this.
    async fn class_snapshot(&self, class_name: &str, year: &str) -> anyhow::Result<RosterSnapshot> {
        let students = self.students(Some(class_name)).await?;
        let entries = self
            .score_entries(&ScoreQuery {
                class_name: Some(class_name),
                year,
                ..ScoreQuery::default()
            })
            .await?;
        let subjects = self.subjects().await?;

        Ok(RosterSnapshot {
            class_name: class_name.to_string(),
            year: year.to_string(),
            students,
            entries,
            subjects,
        })
    }
}

/// One line of a score import file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRow {
    pub admission_no: String,
    pub full_name: String,
    pub class_name: String,
    #[serde(default)]
    pub guardian_name: String,
    #[serde(default)]
    pub guardian_phone: String,
    #[serde(default)]
    pub guardian_email: String,
    pub subject: String,
    pub term: i16,
    pub year: String,
    pub class_score: f64,
    pub exam_score: f64,
}

impl ScoreRow {
    /// Score entry is where out-of-range values get rejected; nothing
    /// downstream re-checks them.
    pub fn validate(&self) -> anyhow::Result<Term> {
        for (label, value) in [("class_score", self.class_score), ("exam_score", self.exam_score)] {
            if !(0.0..=MAX_COMPONENT_SCORE).contains(&value) {
                anyhow::bail!(
                    "{label} {value} for {} ({}) is outside 0-{MAX_COMPONENT_SCORE}",
                    self.full_name,
                    self.subject
                );
            }
        }
        if self.admission_no.trim().is_empty() {
            anyhow::bail!("missing admission_no for {}", self.full_name);
        }
        Term::try_from(self.term)
    }
}

pub fn read_score_rows<R: Read>(reader: R) -> anyhow::Result<Vec<(ScoreRow, Term)>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<ScoreRow>().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = result.with_context(|| format!("malformed score row on line {line}"))?;
        let term = row
            .validate()
            .with_context(|| format!("invalid score row on line {line}"))?;
        rows.push((row, term));
    }

    Ok(rows)
}

/// Keeps everything in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    students: Vec<Student>,
    subjects: Vec<Subject>,
    entries: Vec<ScoreEntry>,
    criteria: Option<PromotionCriteria>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_csv(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut store = Self::new();
        for (row, term) in read_score_rows(file)? {
            store.apply_row(&row, term);
        }
        Ok(store)
    }

    pub fn with_criteria(mut self, criteria: PromotionCriteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn add_student(&mut self, student: Student) {
        self.students.push(student);
    }

    pub fn add_subject(&mut self, subject: Subject) {
        self.subjects.push(subject);
    }

    /// Replaces an existing entry for the same student, subject and period.
    pub fn upsert_entry(&mut self, entry: ScoreEntry) {
        let existing = self.entries.iter_mut().find(|current| {
            current.student_id == entry.student_id
                && current.subject_id == entry.subject_id
                && current.term == entry.term
                && current.year == entry.year
        });
        match existing {
            Some(current) => *current = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn apply_row(&mut self, row: &ScoreRow, term: Term) {
        let admission_no = row.admission_no.trim();
        let student_id = match self
            .students
            .iter_mut()
            .find(|student| student.admission_no == admission_no)
        {
            Some(student) => {
                student.full_name = row.full_name.clone();
                student.class_name = row.class_name.clone();
                student.guardian_name = row.guardian_name.clone();
                student.guardian_phone = row.guardian_phone.clone();
                student.guardian_email = row.guardian_email.clone();
                student.id
            }
            None => {
                let id = Uuid::new_v4();
                self.add_student(Student {
                    id,
                    admission_no: admission_no.to_string(),
                    full_name: row.full_name.clone(),
                    class_name: row.class_name.clone(),
                    guardian_name: row.guardian_name.clone(),
                    guardian_phone: row.guardian_phone.clone(),
                    guardian_email: row.guardian_email.clone(),
                });
                id
            }
        };

        let subject_name = row.subject.trim();
        let subject_id = match self.subjects.iter().find(|s| s.name == subject_name) {
            Some(subject) => subject.id,
            None => {
                let id = Uuid::new_v4();
                self.add_subject(Subject {
                    id,
                    name: subject_name.to_string(),
                });
                id
            }
        };

        self.upsert_entry(ScoreEntry {
            student_id,
            subject_id,
            term,
            year: row.year.clone(),
            class_score: row.class_score,
            exam_score: row.exam_score,
        });
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn students(&self, class_name: Option<&str>) -> anyhow::Result<Vec<Student>> {
        Ok(self
            .students
            .iter()
            .filter(|student| class_name.map_or(true, |class| student.class_name == class))
            .cloned()
            .collect())
    }

    async fn student(&self, student_id: Uuid) -> anyhow::Result<Option<Student>> {
        Ok(self.students.iter().find(|s| s.id == student_id).cloned())
    }

    async fn subjects(&self) -> anyhow::Result<Vec<Subject>> {
        Ok(self.subjects.clone())
    }

    async fn score_entries(&self, query: &ScoreQuery<'_>) -> anyhow::Result<Vec<ScoreEntry>> {
        let in_class = |student_id: Uuid| match query.class_name {
            Some(class) => self
                .students
                .iter()
                .any(|s| s.id == student_id && s.class_name == class),
            None => true,
        };

        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.year == query.year)
            .filter(|entry| query.term.map_or(true, |term| entry.term == term))
            .filter(|entry| query.student_id.map_or(true, |id| entry.student_id == id))
            .filter(|entry| in_class(entry.student_id))
            .cloned()
            .collect())
    }

    async fn promotion_criteria(&self) -> anyhow::Result<Option<PromotionCriteria>> {
        Ok(self.criteria.clone())
    }
}
