use std::collections::HashMap;

use uuid::Uuid;

use crate::grading::GradingScheme;
use crate::models::{
    RosterSnapshot, ScoreEntry, Subject, SubjectSummary, StudentAggregate, Term, UNKNOWN_SUBJECT,
};

/// Half-up rounding to a whole percentage: `floor(x + 0.5)`.
pub fn round_half_up(x: f64) -> u32 {
    (x + 0.5).floor().clamp(0.0, f64::from(u32::MAX)) as u32
}

/// Builds one student's aggregate for a period. `entries` must already be
/// filtered to that student, term and year; subject rows keep their order.
pub fn compute_aggregate(
    student_id: Uuid,
    term: Term,
    year: &str,
    entries: &[ScoreEntry],
    subjects: &[Subject],
) -> StudentAggregate {
    let names: HashMap<Uuid, &str> = subjects
        .iter()
        .map(|subject| (subject.id, subject.name.as_str()))
        .collect();

    let summaries: Vec<SubjectSummary> = entries
        .iter()
        .map(|entry| {
            let total_score = entry.total_score();
            SubjectSummary {
                subject_id: entry.subject_id,
                subject_name: names
                    .get(&entry.subject_id)
                    .copied()
                    .unwrap_or(UNKNOWN_SUBJECT)
                    .to_string(),
                class_score: entry.class_score,
                exam_score: entry.exam_score,
                total_score,
                grade: GradingScheme::FourBand.classify(total_score),
            }
        })
        .collect();

    let total_exam_score = summaries.iter().map(|s| s.exam_score).sum();

    let (overall_average, overall_grade) = if summaries.is_empty() {
        (0, None)
    } else {
        let sum: f64 = summaries.iter().map(|s| s.total_score).sum();
        let average = round_half_up(sum / summaries.len() as f64);
        (
            average,
            Some(GradingScheme::FourBand.classify(f64::from(average))),
        )
    };

    StudentAggregate {
        student_id,
        term,
        year: year.to_string(),
        subjects: summaries,
        total_exam_score,
        overall_average,
        overall_grade,
    }
}

/// Aggregates for every student enrolled in the snapshot's class, in roster
/// order. Students without entries are included as no-data aggregates.
pub fn class_aggregates(snapshot: &RosterSnapshot, term: Term) -> Vec<StudentAggregate> {
    snapshot
        .students
        .iter()
        .filter(|student| student.class_name == snapshot.class_name)
        .map(|student| {
            let entries = snapshot.entries_for(student.id, term);
            compute_aggregate(student.id, term, &snapshot.year, &entries, &snapshot.subjects)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Grade;

    fn entries_for(
        student_id: Uuid,
        subjects: &[Subject],
        scores: &[(f64, f64)],
    ) -> Vec<ScoreEntry> {
        subjects
            .iter()
            .zip(scores)
            .map(|(subject, (class_score, exam_score))| ScoreEntry {
                student_id,
                subject_id: subject.id,
                term: Term::First,
                year: "2025/2026".to_string(),
                class_score: *class_score,
                exam_score: *exam_score,
            })
            .collect()
    }

    fn subjects(names: &[&str]) -> Vec<Subject> {
        names
            .iter()
            .map(|name| Subject {
                id: Uuid::new_v4(),
                name: name.to_string(),
            })
            .collect()
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_half_up(76.5), 77);
        assert_eq!(round_half_up(76.49), 76);
        assert_eq!(round_half_up(0.0), 0);
        assert_eq!(round_half_up(100.0), 100);
    }

    #[test]
    fn aggregates_subject_totals_and_exam_sum() {
        let student_id = Uuid::new_v4();
        let subjects = subjects(&["Mathematics", "English", "Science", "Social Studies"]);
        let entries = entries_for(
            student_id,
            &subjects,
            &[(38.0, 41.0), (34.0, 36.0), (42.0, 41.0), (37.0, 37.0)],
        );

        let aggregate =
            compute_aggregate(student_id, Term::First, "2025/2026", &entries, &subjects);

        let totals: Vec<f64> = aggregate.subjects.iter().map(|s| s.total_score).collect();
        assert_eq!(totals, vec![79.0, 70.0, 83.0, 74.0]);
        assert_eq!(aggregate.overall_average, 77);
        assert_eq!(aggregate.overall_grade, Some(Grade::B));
        assert_eq!(aggregate.total_exam_score, 155.0);
        assert_eq!(aggregate.total_exam_score_doubled(), 310.0);
        assert_eq!(aggregate.subjects[0].subject_name, "Mathematics");
        assert_eq!(aggregate.subjects[0].grade, Grade::B);
        assert_eq!(aggregate.subjects[2].grade, Grade::A);
    }

    #[test]
    fn empty_entries_are_no_data_not_zero() {
        let aggregate = compute_aggregate(Uuid::new_v4(), Term::Second, "2025/2026", &[], &[]);
        assert!(!aggregate.has_data());
        assert_eq!(aggregate.overall_average, 0);
        assert_eq!(aggregate.overall_grade, None);
        assert_eq!(aggregate.total_exam_score, 0.0);
    }

    #[test]
    fn unknown_subject_gets_fallback_label() {
        let student_id = Uuid::new_v4();
        let orphan = subjects(&["Orphan"]);
        let entries = entries_for(student_id, &orphan, &[(20.0, 25.0)]);

        let aggregate = compute_aggregate(student_id, Term::First, "2025/2026", &entries, &[]);

        assert_eq!(aggregate.subjects[0].subject_name, UNKNOWN_SUBJECT);
        assert_eq!(aggregate.overall_average, 45);
    }

    #[test]
    fn aggregation_is_repeatable() {
        let student_id = Uuid::new_v4();
        let subjects = subjects(&["Mathematics", "English"]);
        let entries = entries_for(student_id, &subjects, &[(30.5, 40.0), (25.0, 33.5)]);

        let first = compute_aggregate(student_id, Term::First, "2025/2026", &entries, &subjects);
        let second = compute_aggregate(student_id, Term::First, "2025/2026", &entries, &subjects);
        assert_eq!(first, second);
    }
}
