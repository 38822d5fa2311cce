use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::{class_aggregates, compute_aggregate};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AcademicSummary, ClassPosition, PromotionCriteria, PromotionResult, RosterSnapshot, Student,
    StudentAggregate, Term, Transcript,
};
use crate::promotion;
use crate::ranking::{rank_class, RankingMetric};
use crate::report;
use crate::store::{RecordStore, ScoreQuery};
use crate::summary::{self, DocumentKind};
use crate::template;

#[derive(Debug, Clone)]
pub struct SchoolSettings {
    pub school_name: String,
    /// Used when the store has no criteria configured.
    pub default_criteria: PromotionCriteria,
}

/// Read-only scoring operations over a record store. Every call re-reads what
/// it needs; nothing derived is cached or written back.
pub struct ScoringEngine<S> {
    store: S,
    settings: SchoolSettings,
}

impl<S: RecordStore> ScoringEngine<S> {
    pub fn new(store: S, settings: SchoolSettings) -> Self {
        Self { store, settings }
    }

    pub async fn student(&self, student_id: Uuid) -> EngineResult<Student> {
        self.store
            .student(student_id)
            .await?
            .ok_or(EngineError::StudentNotFound(student_id))
    }

    /// Ranking and summaries read the class in one snapshot so the target
    /// student and their peers come from the same point in time.
    async fn snapshot(&self, class_name: &str, year: &str) -> EngineResult<RosterSnapshot> {
        let snapshot = self.store.class_snapshot(class_name, year).await?;
        debug!(
            class = class_name,
            year,
            students = snapshot.students.len(),
            entries = snapshot.entries.len(),
            "read class snapshot"
        );
        Ok(snapshot)
    }

    pub async fn class_roster(&self, class_name: &str) -> EngineResult<Vec<Student>> {
        Ok(self.store.students(Some(class_name)).await?)
    }

    /// The store's criteria, or the configured default, validated either way.
    pub async fn promotion_criteria(&self) -> EngineResult<PromotionCriteria> {
        let criteria = match self.store.promotion_criteria().await? {
            Some(criteria) => criteria,
            None => {
                debug!("store has no promotion criteria, using configured default");
                self.settings.default_criteria.clone()
            }
        };
        promotion::validate_criteria(&criteria)?;
        Ok(criteria)
    }

    pub async fn compute_aggregate(
        &self,
        student_id: Uuid,
        term: Term,
        year: &str,
    ) -> EngineResult<StudentAggregate> {
        self.student(student_id).await?;
        let entries = self
            .store
            .score_entries(&ScoreQuery {
                student_id: Some(student_id),
                term: Some(term),
                year,
                ..ScoreQuery::default()
            })
            .await?;
        let subjects = self.store.subjects().await?;

        let aggregate = compute_aggregate(student_id, term, year, &entries, &subjects);
        if !aggregate.has_data() {
            warn!(%student_id, %term, year, "no score entries for period");
        }
        Ok(aggregate)
    }

    pub async fn compute_ranking(
        &self,
        class_name: &str,
        term: Term,
        year: &str,
        metric: RankingMetric,
    ) -> EngineResult<HashMap<Uuid, ClassPosition>> {
        let snapshot = self.snapshot(class_name, year).await?;
        let aggregates = class_aggregates(&snapshot, term);
        let ranking = rank_class(&aggregates, metric);
        info!(
            class = class_name,
            %term,
            year,
            %metric,
            ranked = ranking.len(),
            enrolled = aggregates.len(),
            "ranked class"
        );
        Ok(ranking)
    }

    pub async fn classify_promotion(
        &self,
        student_id: Uuid,
        term: Term,
        year: &str,
        criteria: &PromotionCriteria,
    ) -> EngineResult<PromotionResult> {
        promotion::validate_criteria(criteria)?;
        let aggregate = self.compute_aggregate(student_id, term, year).await?;
        Ok(promotion::classify(&aggregate, criteria))
    }

    /// End-of-year promotion status for every student in the class, in roster
    /// order, using the store's criteria.
    pub async fn class_promotions(
        &self,
        class_name: &str,
        year: &str,
    ) -> EngineResult<Vec<(Student, PromotionResult)>> {
        let criteria = self.promotion_criteria().await?;
        let snapshot = self.snapshot(class_name, year).await?;

        let results: Vec<(Student, PromotionResult)> = snapshot
            .students
            .iter()
            .filter(|student| student.class_name == class_name)
            .map(|student| {
                let entries = snapshot.entries_for(student.id, Term::Third);
                let aggregate = compute_aggregate(
                    student.id,
                    Term::Third,
                    year,
                    &entries,
                    &snapshot.subjects,
                );
                (student.clone(), promotion::classify(&aggregate, &criteria))
            })
            .collect();
        info!(class = class_name, year, students = results.len(), "classified promotions");
        Ok(results)
    }

    pub async fn build_summary(
        &self,
        student_id: Uuid,
        term: Term,
        year: &str,
        kind: DocumentKind,
    ) -> EngineResult<AcademicSummary> {
        let student = self.student(student_id).await?;
        let criteria = self.promotion_criteria().await?;
        let snapshot = self.snapshot(&student.class_name, year).await?;

        let summary = summary::build_summary(
            &student,
            &snapshot,
            term,
            kind,
            &self.settings.school_name,
            &criteria,
        );
        debug!(%student_id, %term, year, %kind, has_data = summary.has_data, "built summary");
        Ok(summary)
    }

    pub async fn build_transcript(&self, student_id: Uuid, year: &str) -> EngineResult<Transcript> {
        let student = self.student(student_id).await?;
        let criteria = self.promotion_criteria().await?;
        let snapshot = self.snapshot(&student.class_name, year).await?;
        Ok(summary::build_transcript(
            &student,
            &snapshot,
            &self.settings.school_name,
            &criteria,
        ))
    }

    pub fn render_template(&self, template: &str, summary: &AcademicSummary) -> String {
        template::render(template, summary)
    }

    pub async fn class_report(
        &self,
        class_name: &str,
        term: Term,
        year: &str,
    ) -> EngineResult<String> {
        let criteria = self.promotion_criteria().await?;
        let snapshot = self.snapshot(class_name, year).await?;
        Ok(report::build_report(
            &self.settings.school_name,
            &snapshot,
            term,
            &criteria,
        ))
    }
}
