use std::fmt;

use crate::aggregate::{class_aggregates, compute_aggregate, round_half_up};
use crate::grading::{GradingScheme, PerformanceBand, NO_SCORES_NARRATIVE};
use crate::models::{
    AcademicSummary, PromotionCriteria, RosterSnapshot, Student, StudentAggregate, Term,
    Transcript,
};
use crate::promotion;
use crate::ranking::{position_of, RankingMetric};

/// The document a summary is built for. It decides which ranking basis the
/// position is computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DocumentKind {
    ReportCard,
    Transcript,
    Notification,
}

impl DocumentKind {
    pub fn ranking_metric(self) -> RankingMetric {
        match self {
            DocumentKind::ReportCard | DocumentKind::Transcript => RankingMetric::Average,
            DocumentKind::Notification => RankingMetric::ExamDoubled,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::ReportCard => f.write_str("report-card"),
            DocumentKind::Transcript => f.write_str("transcript"),
            DocumentKind::Notification => f.write_str("notification"),
        }
    }
}

pub fn performance_narrative(aggregate: &StudentAggregate) -> &'static str {
    if aggregate.has_data() {
        PerformanceBand::for_average(aggregate.overall_average).narrative()
    } else {
        NO_SCORES_NARRATIVE
    }
}

/// Builds the summary for `student` from one roster snapshot. The snapshot
/// must be the student's class for the same year, so the position is
/// relative to the peers read alongside the student's own scores.
pub fn build_summary(
    student: &Student,
    snapshot: &RosterSnapshot,
    term: Term,
    kind: DocumentKind,
    school_name: &str,
    criteria: &PromotionCriteria,
) -> AcademicSummary {
    let peers = class_aggregates(snapshot, term);
    let aggregate = match peers.iter().find(|a| a.student_id == student.id) {
        Some(aggregate) => aggregate.clone(),
        None => {
            let entries = snapshot.entries_for(student.id, term);
            compute_aggregate(student.id, term, &snapshot.year, &entries, &snapshot.subjects)
        }
    };

    let metric = kind.ranking_metric();
    let position = position_of(&peers, student.id, metric);
    let actual_grade = aggregate
        .has_data()
        .then(|| GradingScheme::SixBand.classify(f64::from(aggregate.overall_average)));
    let promotion =
        (term == Term::Third).then(|| promotion::classify(&aggregate, criteria).status);

    AcademicSummary {
        student_id: student.id,
        student_name: student.full_name.clone(),
        class_name: student.class_name.clone(),
        school_name: school_name.to_string(),
        term,
        year: snapshot.year.clone(),
        guardian_name: student.guardian_name.clone(),
        guardian_phone: student.guardian_phone.clone(),
        guardian_email: student.guardian_email.clone(),
        has_data: aggregate.has_data(),
        total_exam_score: aggregate.total_exam_score,
        total_exam_score_doubled: aggregate.total_exam_score_doubled(),
        overall_average: aggregate.overall_average,
        overall_grade: aggregate.overall_grade,
        actual_grade,
        position,
        ranked_by: metric,
        performance: performance_narrative(&aggregate).to_string(),
        promotion,
        subjects: aggregate.subjects,
    }
}

/// One report-card style summary per term that has scores, plus the rounded
/// mean of those term averages.
pub fn build_transcript(
    student: &Student,
    snapshot: &RosterSnapshot,
    school_name: &str,
    criteria: &PromotionCriteria,
) -> Transcript {
    let terms: Vec<AcademicSummary> = Term::ALL
        .iter()
        .map(|term| {
            build_summary(
                student,
                snapshot,
                *term,
                DocumentKind::Transcript,
                school_name,
                criteria,
            )
        })
        .filter(|summary| summary.has_data)
        .collect();

    let cumulative_average = if terms.is_empty() {
        None
    } else {
        let sum: u32 = terms.iter().map(|summary| summary.overall_average).sum();
        Some(round_half_up(f64::from(sum) / terms.len() as f64))
    };

    Transcript {
        student_id: student.id,
        student_name: student.full_name.clone(),
        class_name: student.class_name.clone(),
        year: snapshot.year.clone(),
        terms,
        cumulative_average,
        cumulative_grade: cumulative_average
            .map(|average| GradingScheme::FourBand.classify(f64::from(average))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Grade;
    use crate::models::{ClassPosition, PromotionStatus, ScoreEntry, Subject};
    use uuid::Uuid;

    const YEAR: &str = "2025/2026";

    fn student(name: &str) -> Student {
        Student {
            id: Uuid::new_v4(),
            admission_no: format!("ADM-{}", name.len()),
            full_name: name.to_string(),
            class_name: "JHS 2".to_string(),
            guardian_name: format!("Guardian of {name}"),
            guardian_phone: "+233200000000".to_string(),
            guardian_email: "guardian@example.com".to_string(),
        }
    }

    fn entries(
        student: &Student,
        subjects: &[Subject],
        term: Term,
        scores: &[(f64, f64)],
    ) -> Vec<ScoreEntry> {
        subjects
            .iter()
            .zip(scores)
            .map(|(subject, (class_score, exam_score))| ScoreEntry {
                student_id: student.id,
                subject_id: subject.id,
                term,
                year: YEAR.to_string(),
                class_score: *class_score,
                exam_score: *exam_score,
            })
            .collect()
    }

    /// Ama: steady class work. Kofi: weaker class work, stronger exams.
    fn class_snapshot() -> (RosterSnapshot, Student, Student, Student) {
        let subjects: Vec<Subject> = ["Mathematics", "English", "Science", "Social Studies"]
            .iter()
            .map(|name| Subject {
                id: Uuid::new_v4(),
                name: name.to_string(),
            })
            .collect();
        let ama = student("Ama Mensah");
        let kofi = student("Kofi Boateng");
        let esi = student("Esi Owusu");

        let mut all = entries(
            &ama,
            &subjects,
            Term::First,
            &[(38.0, 41.0), (34.0, 36.0), (42.0, 41.0), (37.0, 37.0)],
        );
        all.extend(entries(
            &kofi,
            &subjects,
            Term::First,
            &[(20.0, 48.0), (22.0, 45.0), (25.0, 47.0), (21.0, 46.0)],
        ));

        let snapshot = RosterSnapshot {
            class_name: "JHS 2".to_string(),
            year: YEAR.to_string(),
            students: vec![ama.clone(), kofi.clone(), esi.clone()],
            entries: all,
            subjects,
        };
        (snapshot, ama, kofi, esi)
    }

    #[test]
    fn report_card_ranks_by_average() {
        let (snapshot, ama, _, _) = class_snapshot();

        let summary = build_summary(
            &ama,
            &snapshot,
            Term::First,
            DocumentKind::ReportCard,
            "Hillside Academy",
            &PromotionCriteria::default(),
        );

        assert!(summary.has_data);
        assert_eq!(summary.overall_average, 77);
        assert_eq!(summary.overall_grade, Some(Grade::B));
        assert_eq!(summary.actual_grade, Some(Grade::BPlus));
        assert_eq!(summary.total_exam_score, 155.0);
        assert_eq!(summary.total_exam_score_doubled, 310.0);
        assert_eq!(
            summary.position,
            Some(ClassPosition {
                position: 1,
                class_size: 2
            })
        );
        assert_eq!(summary.ranked_by, RankingMetric::Average);
        assert_eq!(summary.promotion, None);
        assert_eq!(summary.school_name, "Hillside Academy");
        let names: Vec<&str> = summary.subjects.iter().map(|s| s.subject_name.as_str()).collect();
        assert_eq!(names, vec!["Mathematics", "English", "Science", "Social Studies"]);
    }

    #[test]
    fn notification_ranks_by_doubled_exam_total() {
        let (snapshot, ama, kofi, _) = class_snapshot();
        let criteria = PromotionCriteria::default();

        let notification = |student: &Student| {
            build_summary(
                student,
                &snapshot,
                Term::First,
                DocumentKind::Notification,
                "",
                &criteria,
            )
        };
        let ama_note = notification(&ama);
        let kofi_note = notification(&kofi);

        assert_eq!(ama_note.position.map(|p| p.position), Some(2));
        assert_eq!(kofi_note.position.map(|p| p.position), Some(1));
        assert_eq!(kofi_note.total_exam_score_doubled, 372.0);
        assert_eq!(kofi_note.ranked_by, RankingMetric::ExamDoubled);
    }

    #[test]
    fn student_without_scores_is_unranked_no_data() {
        let (snapshot, _, _, esi) = class_snapshot();

        let summary = build_summary(
            &esi,
            &snapshot,
            Term::First,
            DocumentKind::ReportCard,
            "",
            &PromotionCriteria::default(),
        );

        assert!(!summary.has_data);
        assert_eq!(summary.position, None);
        assert_eq!(summary.overall_grade, None);
        assert_eq!(summary.actual_grade, None);
        assert_eq!(summary.performance, NO_SCORES_NARRATIVE);
    }

    #[test]
    fn third_term_summary_carries_promotion() {
        let (snapshot, ama, _, _) = class_snapshot();

        let summary = build_summary(
            &ama,
            &snapshot,
            Term::Third,
            DocumentKind::ReportCard,
            "",
            &PromotionCriteria::default(),
        );

        assert_eq!(summary.promotion, Some(PromotionStatus::NoScores));
    }

    #[test]
    fn narrative_follows_average_band() {
        let (snapshot, ama, _, _) = class_snapshot();
        let summary = build_summary(
            &ama,
            &snapshot,
            Term::First,
            DocumentKind::Notification,
            "",
            &PromotionCriteria::default(),
        );
        assert_eq!(summary.performance, PerformanceBand::Good.narrative());
    }

    #[test]
    fn transcript_skips_empty_terms_and_averages_the_rest() {
        let (mut snapshot, ama, _, _) = class_snapshot();
        let subjects = snapshot.subjects.clone();
        snapshot.entries.extend(entries(
            &ama,
            &subjects,
            Term::Second,
            &[(45.0, 45.0), (40.0, 40.0), (44.0, 46.0), (40.0, 40.0)],
        ));

        let transcript = build_transcript(&ama, &snapshot, "", &PromotionCriteria::default());

        assert_eq!(transcript.terms.len(), 2);
        assert_eq!(transcript.terms[0].term, Term::First);
        assert_eq!(transcript.terms[1].overall_average, 85);
        assert_eq!(transcript.cumulative_average, Some(81));
        assert_eq!(transcript.cumulative_grade, Some(Grade::A));
    }

    #[test]
    fn transcript_without_scores_has_no_average() {
        let (snapshot, _, _, esi) = class_snapshot();
        let transcript = build_transcript(&esi, &snapshot, "", &PromotionCriteria::default());
        assert!(transcript.terms.is_empty());
        assert_eq!(transcript.cumulative_average, None);
    }
}
