use std::fmt::Write;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::models::AcademicSummary;

pub const NOT_AVAILABLE: &str = "N/A";

pub const DEFAULT_NOTIFICATION_TEMPLATE: &str = "Dear {GUARDIAN_NAME},

{SCHOOL_NAME} {TERM} results ({YEAR}) for {STUDENT_NAME}, {CLASS}:

{SUBJECTS}

Total score: {TOTAL_SCORE}
Average: {AVERAGE}% (Grade {GRADE})
Position: {POSITION} out of {CLASS_SIZE}

{PERFORMANCE}
";

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([A-Z_]+)\}").expect("placeholder pattern is valid"))
}

/// Whole scores print without decimals, others with one.
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// One line per subject, in aggregation order.
pub fn subject_lines(summary: &AcademicSummary) -> String {
    if summary.subjects.is_empty() {
        return "No scores recorded.".to_string();
    }

    let mut output = String::new();
    for (index, subject) in summary.subjects.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        let _ = write!(
            output,
            "- {}: class {}, exam {}, total {} ({})",
            subject.subject_name,
            format_score(subject.class_score),
            format_score(subject.exam_score),
            format_score(subject.total_score),
            subject.grade
        );
    }
    output
}

fn placeholder_value(name: &str, summary: &AcademicSummary) -> Option<String> {
    let or_na = |value: Option<String>| value.unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let value = match name {
        "STUDENT_NAME" => summary.student_name.clone(),
        "SCHOOL_NAME" => summary.school_name.clone(),
        "CLASS" => summary.class_name.clone(),
        "TERM" => summary.term.to_string(),
        "YEAR" => summary.year.clone(),
        "GUARDIAN_NAME" => summary.guardian_name.clone(),
        "GUARDIAN_PHONE" => summary.guardian_phone.clone(),
        "SUBJECTS" => subject_lines(summary),
        "EXAM_TOTAL" => format_score(summary.total_exam_score),
        "TOTAL_SCORE" => format_score(summary.total_exam_score_doubled),
        "AVERAGE" => or_na(summary.has_data.then(|| summary.overall_average.to_string())),
        "OVERALL_GRADE" => or_na(summary.overall_grade.map(|grade| grade.to_string())),
        "GRADE" => or_na(summary.actual_grade.map(|grade| grade.to_string())),
        "POSITION" => or_na(summary.position.map(|p| p.position.to_string())),
        "CLASS_SIZE" => or_na(summary.position.map(|p| p.class_size.to_string())),
        "PERFORMANCE" => summary.performance.clone(),
        "PROMOTION_STATUS" => or_na(summary.promotion.map(|status| status.to_string())),
        _ => return None,
    };
    Some(value)
}

/// Replaces every recognised `{NAME}` token with the matching summary field.
/// Unknown tokens are kept as written.
pub fn render(template: &str, summary: &AcademicSummary) -> String {
    placeholder_pattern()
        .replace_all(template, |caps: &Captures| {
            placeholder_value(&caps[1], summary).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
