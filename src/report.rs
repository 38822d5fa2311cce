use std::collections::HashMap;
use std::fmt::Write;

use chrono::Utc;
use uuid::Uuid;

use crate::aggregate::{class_aggregates, round_half_up};
use crate::models::{PromotionCriteria, RosterSnapshot, StudentAggregate, Term};
use crate::promotion::{self, PromotionTally};
use crate::ranking::{ranked_order, RankingMetric};
use crate::template::{format_score, NOT_AVAILABLE};

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectAverage {
    pub subject_name: String,
    pub average: u32,
    pub student_count: usize,
}

/// Mean subject total across the students who sat it, in order of first
/// appearance.
pub fn subject_averages(aggregates: &[StudentAggregate]) -> Vec<SubjectAverage> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut totals: HashMap<Uuid, (String, f64, usize)> = HashMap::new();

    for subject in aggregates.iter().flat_map(|aggregate| aggregate.subjects.iter()) {
        let entry = totals.entry(subject.subject_id).or_insert_with(|| {
            order.push(subject.subject_id);
            (subject.subject_name.clone(), 0.0, 0)
        });
        entry.1 += subject.total_score;
        entry.2 += 1;
    }

    order
        .into_iter()
        .filter_map(|subject_id| totals.remove(&subject_id))
        .map(|(subject_name, sum, count)| SubjectAverage {
            subject_name,
            average: round_half_up(sum / count as f64),
            student_count: count,
        })
        .collect()
}

pub fn build_report(
    school_name: &str,
    snapshot: &RosterSnapshot,
    term: Term,
    criteria: &PromotionCriteria,
) -> String {
    let aggregates = class_aggregates(snapshot, term);
    let ranked = ranked_order(&aggregates, RankingMetric::Average);
    let by_id: HashMap<Uuid, &StudentAggregate> =
        aggregates.iter().map(|a| (a.student_id, a)).collect();
    let name_of = |student_id: Uuid| {
        snapshot
            .student(student_id)
            .map(|student| student.full_name.as_str())
            .unwrap_or("Unknown Student")
    };

    let mut output = String::new();

    let _ = writeln!(output, "# {} Class Report: {}", school_name, snapshot.class_name);
    let _ = writeln!(
        output,
        "{} {}, generated {}",
        term,
        snapshot.year,
        Utc::now().date_naive()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Class Ranking");

    if ranked.is_empty() {
        let _ = writeln!(output, "No scores recorded for this term.");
    } else {
        let _ = writeln!(output, "| Position | Student | Average | Grade | Exam Total |");
        let _ = writeln!(output, "|---|---|---|---|---|");
        for entry in ranked.iter() {
            let Some(aggregate) = by_id.get(&entry.student_id) else {
                continue;
            };
            let grade = aggregate
                .overall_grade
                .map(|grade| grade.label())
                .unwrap_or(NOT_AVAILABLE);
            let _ = writeln!(
                output,
                "| {} of {} | {} | {}% | {} | {} |",
                entry.position,
                ranked.len(),
                name_of(entry.student_id),
                aggregate.overall_average,
                grade,
                format_score(aggregate.total_exam_score)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subject Averages");

    let averages = subject_averages(&aggregates);
    if averages.is_empty() {
        let _ = writeln!(output, "No subjects scored for this term.");
    } else {
        for average in averages.iter() {
            let _ = writeln!(
                output,
                "- {}: {}% across {} students",
                average.subject_name, average.average, average.student_count
            );
        }
    }

    if term == Term::Third {
        let results: Vec<_> = aggregates
            .iter()
            .map(|aggregate| promotion::classify(aggregate, criteria))
            .collect();
        let tally = PromotionTally::from_results(&results);
        let _ = writeln!(output);
        let _ = writeln!(output, "## Promotion");
        let _ = writeln!(
            output,
            "Criteria: average of at least {}% with {} of {} subjects passed",
            format_score(criteria.minimum_average),
            criteria.minimum_subjects_passed,
            criteria.total_subjects
        );
        let _ = writeln!(output, "- promote: {}", tally.promote);
        let _ = writeln!(output, "- review: {}", tally.review);
        let _ = writeln!(output, "- retain: {}", tally.retain);
        let _ = writeln!(output, "- no scores: {}", tally.no_scores);
    }

    let missing: Vec<&str> = aggregates
        .iter()
        .filter(|aggregate| !aggregate.has_data())
        .map(|aggregate| name_of(aggregate.student_id))
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Without Scores");

    if missing.is_empty() {
        let _ = writeln!(output, "Every enrolled student has scores for this term.");
    } else {
        for name in missing {
            let _ = writeln!(output, "- {}", name);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScoreEntry, Student, Subject};

    const YEAR: &str = "2025/2026";

    fn snapshot(term: Term) -> RosterSnapshot {
        let subjects = vec![
            Subject {
                id: Uuid::new_v4(),
                name: "Mathematics".to_string(),
            },
            Subject {
                id: Uuid::new_v4(),
                name: "English".to_string(),
            },
        ];
        let students: Vec<Student> = ["Ama Mensah", "Kofi Boateng", "Esi Owusu"]
            .iter()
            .enumerate()
            .map(|(i, name)| Student {
                id: Uuid::new_v4(),
                admission_no: format!("A00{i}"),
                full_name: name.to_string(),
                class_name: "JHS 2".to_string(),
                guardian_name: String::new(),
                guardian_phone: String::new(),
                guardian_email: String::new(),
            })
            .collect();

        let scores = [
            (0, [(40.0, 45.0), (35.0, 40.0)]),
            (1, [(20.0, 25.0), (30.0, 30.0)]),
        ];
        let mut entries = Vec::new();
        for (student, rows) in scores {
            for (subject, (class_score, exam_score)) in subjects.iter().zip(rows) {
                entries.push(ScoreEntry {
                    student_id: students[student].id,
                    subject_id: subject.id,
                    term,
                    year: YEAR.to_string(),
                    class_score,
                    exam_score,
                });
            }
        }

        RosterSnapshot {
            class_name: "JHS 2".to_string(),
            year: YEAR.to_string(),
            students,
            entries,
            subjects,
        }
    }

    #[test]
    fn subject_averages_follow_first_appearance() {
        let snapshot = snapshot(Term::First);
        let averages = subject_averages(&class_aggregates(&snapshot, Term::First));

        assert_eq!(
            averages,
            vec![
                SubjectAverage {
                    subject_name: "Mathematics".to_string(),
                    average: 65,
                    student_count: 2,
                },
                SubjectAverage {
                    subject_name: "English".to_string(),
                    average: 68,
                    student_count: 2,
                },
            ]
        );
    }

    #[test]
    fn report_lists_ranking_and_missing_students() {
        let snapshot = snapshot(Term::First);
        let report = build_report(
            "Hillside Academy",
            &snapshot,
            Term::First,
            &PromotionCriteria::default(),
        );

        assert!(report.contains("# Hillside Academy Class Report: JHS 2"));
        assert!(report.contains("| 1 of 2 | Ama Mensah | 80% | A | 85 |"));
        assert!(report.contains("| 2 of 2 | Kofi Boateng | 53% | D | 55 |"));
        assert!(report.contains("- Esi Owusu"));
        assert!(!report.contains("## Promotion"));
    }

    #[test]
    fn third_term_report_includes_promotion_mix() {
        let snapshot = snapshot(Term::Third);
        let criteria = PromotionCriteria {
            minimum_average: 50.0,
            minimum_subjects_passed: 2,
            total_subjects: 2,
        };

        let report = build_report("Hillside Academy", &snapshot, Term::Third, &criteria);

        assert!(report.contains("## Promotion"));
        assert!(report.contains("- promote: 1"));
        assert!(report.contains("- retain: 1"));
        assert!(report.contains("- no scores: 1"));
    }

    #[test]
    fn empty_term_reports_no_scores() {
        let snapshot = snapshot(Term::First);
        let report = build_report(
            "Hillside Academy",
            &snapshot,
            Term::Second,
            &PromotionCriteria::default(),
        );

        assert!(report.contains("No scores recorded for this term."));
        assert!(report.contains("No subjects scored for this term."));
    }

    #[test]
    fn ranking_table_prints_the_aggregate_grade() {
        let snapshot = snapshot(Term::First);
        let report = build_report("", &snapshot, Term::First, &PromotionCriteria::default());

        for aggregate in class_aggregates(&snapshot, Term::First)
            .iter()
            .filter(|aggregate| aggregate.has_data())
        {
            let grade = aggregate.overall_grade.expect("scored students have a grade");
            let cells = format!("| {}% | {} |", aggregate.overall_average, grade);
            assert!(report.contains(&cells), "missing {cells}");
        }
    }
}
