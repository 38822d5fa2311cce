use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{ClassPosition, StudentAggregate};

/// What a class is ordered by. Report cards rank on the 0-100 average;
/// guardian notifications rank on twice the exam total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RankingMetric {
    Average,
    ExamDoubled,
}

impl RankingMetric {
    pub fn value(self, aggregate: &StudentAggregate) -> f64 {
        match self {
            RankingMetric::Average => f64::from(aggregate.overall_average),
            RankingMetric::ExamDoubled => aggregate.total_exam_score_doubled(),
        }
    }
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingMetric::Average => f.write_str("average"),
            RankingMetric::ExamDoubled => f.write_str("exam-doubled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedStudent {
    pub student_id: Uuid,
    pub value: f64,
    pub position: usize,
}

/// Orders the class by `metric`, best first. Only aggregates with data are
/// ranked. The sort is stable, so equal values keep the order they came in.
pub fn ranked_order(aggregates: &[StudentAggregate], metric: RankingMetric) -> Vec<RankedStudent> {
    let mut ranked: Vec<(Uuid, f64)> = aggregates
        .iter()
        .filter(|aggregate| aggregate.has_data())
        .map(|aggregate| (aggregate.student_id, metric.value(aggregate)))
        .collect();

    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    ranked
        .into_iter()
        .enumerate()
        .map(|(index, (student_id, value))| RankedStudent {
            student_id,
            value,
            position: index + 1,
        })
        .collect()
}

pub fn rank_class(
    aggregates: &[StudentAggregate],
    metric: RankingMetric,
) -> HashMap<Uuid, ClassPosition> {
    let ranked = ranked_order(aggregates, metric);
    let class_size = ranked.len();
    ranked
        .into_iter()
        .map(|entry| {
            (
                entry.student_id,
                ClassPosition {
                    position: entry.position,
                    class_size,
                },
            )
        })
        .collect()
}

/// `None` when the student has no scores for the period and so is not ranked.
pub fn position_of(
    aggregates: &[StudentAggregate],
    student_id: Uuid,
    metric: RankingMetric,
) -> Option<ClassPosition> {
    rank_class(aggregates, metric).remove(&student_id)
}
