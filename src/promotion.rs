use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::models::{PromotionCriteria, PromotionResult, PromotionStatus, StudentAggregate};

/// A subject counts as passed at this total, whatever the configured criteria say.
pub const SUBJECT_PASS_MARK: f64 = 50.0;

/// Below either of these floors a student is retained rather than reviewed.
pub const REVIEW_FLOOR_AVERAGE: u32 = 40;
pub const REVIEW_FLOOR_SUBJECTS_PASSED: usize = 3;

pub fn validate_criteria(criteria: &PromotionCriteria) -> EngineResult<()> {
    if !(0.0..=100.0).contains(&criteria.minimum_average) {
        return Err(EngineError::InvalidCriteria(format!(
            "minimum average {} is outside 0-100",
            criteria.minimum_average
        )));
    }
    if criteria.total_subjects == 0 {
        return Err(EngineError::InvalidCriteria(
            "total subjects must be at least 1".to_string(),
        ));
    }
    if criteria.minimum_subjects_passed > criteria.total_subjects {
        return Err(EngineError::InvalidCriteria(format!(
            "minimum subjects passed ({}) exceeds total subjects ({})",
            criteria.minimum_subjects_passed, criteria.total_subjects
        )));
    }
    Ok(())
}

/// Classifies an end-of-year aggregate. Criteria are assumed valid; see
/// `validate_criteria`.
pub fn classify(aggregate: &StudentAggregate, criteria: &PromotionCriteria) -> PromotionResult {
    let passed_subjects = aggregate.passed_subjects(SUBJECT_PASS_MARK);
    let average = aggregate.overall_average;

    let status = if !aggregate.has_data() {
        PromotionStatus::NoScores
    } else if f64::from(average) >= criteria.minimum_average
        && passed_subjects >= criteria.minimum_subjects_passed
    {
        PromotionStatus::Promote
    } else if average >= REVIEW_FLOOR_AVERAGE && passed_subjects >= REVIEW_FLOOR_SUBJECTS_PASSED {
        PromotionStatus::Review
    } else {
        PromotionStatus::Retain
    };

    PromotionResult {
        student_id: aggregate.student_id,
        overall_average: average,
        passed_subjects,
        status,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionTally {
    pub promote: usize,
    pub review: usize,
    pub retain: usize,
    pub no_scores: usize,
}

impl PromotionTally {
    pub fn from_results(results: &[PromotionResult]) -> Self {
        let mut counts: HashMap<PromotionStatus, usize> = HashMap::new();
        for result in results {
            *counts.entry(result.status).or_insert(0) += 1;
        }
        let count = |status: PromotionStatus| counts.get(&status).copied().unwrap_or(0);
        Self {
            promote: count(PromotionStatus::Promote),
            review: count(PromotionStatus::Review),
            retain: count(PromotionStatus::Retain),
            no_scores: count(PromotionStatus::NoScores),
        }
    }
}
