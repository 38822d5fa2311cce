use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grading::Grade;
use crate::ranking::RankingMetric;

pub const UNKNOWN_SUBJECT: &str = "Unknown Subject";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    First,
    Second,
    Third,
}

impl Term {
    pub const ALL: [Term; 3] = [Term::First, Term::Second, Term::Third];

    pub fn number(self) -> i16 {
        match self {
            Term::First => 1,
            Term::Second => 2,
            Term::Third => 3,
        }
    }
}

impl TryFrom<i16> for Term {
    type Error = anyhow::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Term::First),
            2 => Ok(Term::Second),
            3 => Ok(Term::Third),
            other => anyhow::bail!("term must be 1, 2 or 3, got {other}"),
        }
    }
}

impl FromStr for Term {
    type Err = anyhow::Error;

    /// Accepts "1", "term 1" and "Term 1".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("Term")
            .or_else(|| trimmed.strip_prefix("term"))
            .unwrap_or(trimmed)
            .trim();
        let number: i16 = digits
            .parse()
            .map_err(|_| anyhow::anyhow!("unrecognised term: {s}"))?;
        Term::try_from(number)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Term {}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub admission_no: String,
    pub full_name: String,
    pub class_name: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub guardian_email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
}

/// One subject's class and exam score for a student in a term. Both halves
/// are out of 50 and are validated by whoever writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub term: Term,
    pub year: String,
    pub class_score: f64,
    pub exam_score: f64,
}

impl ScoreEntry {
    pub fn total_score(&self) -> f64 {
        self.class_score + self.exam_score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectSummary {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub class_score: f64,
    pub exam_score: f64,
    pub total_score: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentAggregate {
    pub student_id: Uuid,
    pub term: Term,
    pub year: String,
    pub subjects: Vec<SubjectSummary>,
    pub total_exam_score: f64,
    /// Zero when there is no data; check `has_data` before showing it.
    pub overall_average: u32,
    pub overall_grade: Option<Grade>,
}

impl StudentAggregate {
    pub fn has_data(&self) -> bool {
        !self.subjects.is_empty()
    }

    pub fn total_exam_score_doubled(&self) -> f64 {
        self.total_exam_score * 2.0
    }

    pub fn passed_subjects(&self, pass_mark: f64) -> usize {
        self.subjects
            .iter()
            .filter(|subject| subject.total_score >= pass_mark)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassPosition {
    pub position: usize,
    pub class_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionCriteria {
    pub minimum_average: f64,
    pub minimum_subjects_passed: usize,
    pub total_subjects: usize,
}

impl Default for PromotionCriteria {
    fn default() -> Self {
        Self {
            minimum_average: 50.0,
            minimum_subjects_passed: 5,
            total_subjects: 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromotionStatus {
    Promote,
    Review,
    Retain,
    NoScores,
}

impl PromotionStatus {
    pub fn label(self) -> &'static str {
        match self {
            PromotionStatus::Promote => "promote",
            PromotionStatus::Review => "review",
            PromotionStatus::Retain => "retain",
            PromotionStatus::NoScores => "no-scores",
        }
    }
}

impl fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionResult {
    pub student_id: Uuid,
    pub overall_average: u32,
    pub passed_subjects: usize,
    pub status: PromotionStatus,
}

/// Everything the ranking step needs for one class and period, read at a
/// single point in time.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    pub class_name: String,
    pub year: String,
    /// In store order, which is also the ranking tie order.
    pub students: Vec<Student>,
    pub entries: Vec<ScoreEntry>,
    pub subjects: Vec<Subject>,
}

impl RosterSnapshot {
    pub fn student(&self, student_id: Uuid) -> Option<&Student> {
        self.students.iter().find(|student| student.id == student_id)
    }

    pub fn entries_for(&self, student_id: Uuid, term: Term) -> Vec<ScoreEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                entry.student_id == student_id && entry.term == term && entry.year == self.year
            })
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcademicSummary {
    pub student_id: Uuid,
    pub student_name: String,
    pub class_name: String,
    pub school_name: String,
    pub term: Term,
    pub year: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub guardian_email: String,
    pub subjects: Vec<SubjectSummary>,
    pub has_data: bool,
    pub total_exam_score: f64,
    pub total_exam_score_doubled: f64,
    pub overall_average: u32,
    /// Four-band grade, printed on report cards.
    pub overall_grade: Option<Grade>,
    /// Six-band grade, used in guardian notifications.
    pub actual_grade: Option<Grade>,
    pub position: Option<ClassPosition>,
    pub ranked_by: RankingMetric,
    pub performance: String,
    pub promotion: Option<PromotionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub student_id: Uuid,
    pub student_name: String,
    pub class_name: String,
    pub year: String,
    pub terms: Vec<AcademicSummary>,
    /// Rounded mean of the per-term averages; `None` when no term has scores.
    pub cumulative_average: Option<u32>,
    pub cumulative_grade: Option<Grade>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_parses_common_spellings() {
        assert_eq!("1".parse::<Term>().unwrap(), Term::First);
        assert_eq!("Term 2".parse::<Term>().unwrap(), Term::Second);
        assert_eq!("term 3".parse::<Term>().unwrap(), Term::Third);
        assert!("4".parse::<Term>().is_err());
        assert!("spring".parse::<Term>().is_err());
    }

    #[test]
    fn term_displays_with_number() {
        assert_eq!(Term::Third.to_string(), "Term 3");
        assert_eq!(Term::try_from(2).unwrap(), Term::Second);
    }

    #[test]
    fn snapshot_filters_entries_by_student_term_and_year() {
        let student_id = Uuid::new_v4();
        let subject_id = Uuid::new_v4();
        let entry = |term: Term, year: &str| ScoreEntry {
            student_id,
            subject_id,
            term,
            year: year.to_string(),
            class_score: 30.0,
            exam_score: 40.0,
        };
        let snapshot = RosterSnapshot {
            class_name: "JHS 2".to_string(),
            year: "2025/2026".to_string(),
            students: Vec::new(),
            entries: vec![
                entry(Term::First, "2025/2026"),
                entry(Term::Second, "2025/2026"),
                entry(Term::First, "2024/2025"),
            ],
            subjects: Vec::new(),
        };

        let first = snapshot.entries_for(student_id, Term::First);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].total_score(), 70.0);
        assert!(snapshot.entries_for(Uuid::new_v4(), Term::First).is_empty());
    }
}
