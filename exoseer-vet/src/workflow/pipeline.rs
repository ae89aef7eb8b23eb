//! Pipeline orchestrator
//!
//! Exposes each stage as an independently callable operation and composes
//! them in dependency order for a full analysis.
//!
//! # Error Handling
//! - No operation fails: every stage returns a value of its declared shape
//! - Graceful degradation: a failed stage contributes its named default and
//!   the analysis continues
//! - Degraded stages are reported in the result and via `PipelineEvent`
//!
//! # Example
//! ```rust,ignore
//! let pipeline = Pipeline::new(PipelineConfig::default()).with_events(tx);
//! let report = pipeline.run(&series, &candidate).await;
//! ```

use super::{AnalysisReport, TransitReport};
use crate::advisor::{Advisor, AdvisorSession};
use crate::stages::centroid::{self, CentroidEstimator, SimulatedCentroidEstimator};
use crate::stages::ensemble::{self, EnsembleInputs};
use crate::stages::{physics_validator, refiner, transit_fitter, uncertainty};
use crate::types::{
    Candidate, CandidateParameters, CentroidAnalysis, EnsembleResult, LightCurveSeries,
    PhysicsValidation, RefinedParameters, SeriesMeta, StageDegradation, StageOutcome,
    TransitAnalysis, TransitFit, UncertaintyQuantification,
};
use exoseer_common::config::{Thresholds, TomlConfig};
use exoseer_common::events::{PipelineEvent, Stage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub thresholds: Thresholds,
    /// Upper bound for each advisor call
    pub advisor_timeout: Duration,
    pub advisor_temperature: f32,
    /// Fixed seed for the simulated centroid estimator (entropy when absent)
    pub centroid_seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            advisor_timeout: Duration::from_secs(30),
            advisor_temperature: 0.3,
            centroid_seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(config: &TomlConfig) -> Self {
        Self {
            thresholds: config.thresholds.clone(),
            advisor_timeout: config.advisor.timeout(),
            advisor_temperature: config.advisor.temperature,
            centroid_seed: config.centroid.seed,
        }
    }
}

/// Analysis pipeline
pub struct Pipeline {
    config: PipelineConfig,
    advisor: Option<AdvisorSession>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl Pipeline {
    /// Create pipeline without advisor or event channel
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            advisor: None,
            event_tx: None,
        }
    }

    /// Consult `advisor` in the refinement, uncertainty and ensemble stages
    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisor = Some(AdvisorSession::new(
            advisor,
            self.config.advisor_timeout,
            self.config.advisor_temperature,
        ));
        self
    }

    /// Report progress over `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Advisor session shared with other services
    pub fn advisor(&self) -> Option<&AdvisorSession> {
        self.advisor.as_ref()
    }

    // ------------------------------------------------------------------
    // Stage operations
    // ------------------------------------------------------------------

    pub fn fit(&self, series: &LightCurveSeries, expected_period: Option<f64>) -> StageOutcome<TransitFit> {
        transit_fitter::fit(series, expected_period, &self.config.thresholds.fitter)
    }

    pub async fn refine(
        &self,
        fit: &TransitFit,
        candidate: &CandidateParameters,
        meta: &SeriesMeta,
    ) -> StageOutcome<RefinedParameters> {
        refiner::refine(fit, candidate, meta, self.advisor.as_ref()).await
    }

    pub fn validate(&self, refined: &RefinedParameters) -> StageOutcome<PhysicsValidation> {
        physics_validator::validate(refined, &self.config.thresholds.physics)
    }

    /// Centroid analysis with the configured simulated estimator
    pub fn analyze_centroid(
        &self,
        series: &LightCurveSeries,
        period: f64,
        depth: f64,
    ) -> StageOutcome<CentroidAnalysis> {
        match self.config.centroid_seed {
            Some(seed) => self.analyze_centroid_with(
                series,
                period,
                depth,
                &mut SimulatedCentroidEstimator::seeded(seed),
            ),
            None => self.analyze_centroid_with(
                series,
                period,
                depth,
                &mut SimulatedCentroidEstimator::from_entropy(),
            ),
        }
    }

    /// Centroid analysis with a caller-supplied estimator
    pub fn analyze_centroid_with(
        &self,
        series: &LightCurveSeries,
        period: f64,
        depth: f64,
        estimator: &mut dyn CentroidEstimator,
    ) -> StageOutcome<CentroidAnalysis> {
        centroid::analyze(series, period, depth, estimator, &self.config.thresholds.centroid)
    }

    pub async fn quantify(
        &self,
        transit: &TransitAnalysis,
        centroid: &CentroidAnalysis,
        candidate: &CandidateParameters,
    ) -> StageOutcome<UncertaintyQuantification> {
        uncertainty::quantify(
            transit,
            centroid,
            candidate,
            self.advisor.as_ref(),
            &self.config.thresholds.reliability,
        )
        .await
    }

    pub async fn decide(
        &self,
        inputs: &EnsembleInputs<'_>,
        candidate: &Candidate,
    ) -> StageOutcome<EnsembleResult> {
        ensemble::decide(inputs, candidate, self.advisor.as_ref()).await
    }

    // ------------------------------------------------------------------
    // Compositions
    // ------------------------------------------------------------------

    async fn refine_and_validate(
        &self,
        fit: &TransitFit,
        candidate: &CandidateParameters,
        meta: &SeriesMeta,
    ) -> (StageOutcome<RefinedParameters>, StageOutcome<PhysicsValidation>) {
        let refined = self.refine(fit, candidate, meta).await;
        let physics = self.validate(refined.value());
        (refined, physics)
    }

    /// Fit, refine and validate a series
    pub async fn analyze_transit(
        &self,
        series: &LightCurveSeries,
        candidate: &CandidateParameters,
    ) -> TransitReport {
        let mut degradations = Vec::new();

        let fit = self.fit(series, candidate.orbital_period);
        self.record(None, Stage::TransitFit, &fit, &mut degradations);

        let (refined, physics) = self
            .refine_and_validate(fit.value(), candidate, &series.meta())
            .await;
        self.record(None, Stage::Refinement, &refined, &mut degradations);
        self.record(None, Stage::PhysicsValidation, &physics, &mut degradations);

        TransitReport {
            transit_analysis: TransitAnalysis::from_stages(refined.into_value(), physics.into_value()),
            degradations,
        }
    }

    /// Run every stage in dependency order and assemble the report
    pub async fn run(&self, series: &LightCurveSeries, candidate: &Candidate) -> AnalysisReport {
        let analysis_id = Uuid::new_v4();
        let target_name = if candidate.name.is_empty() {
            series.target_name.clone()
        } else {
            candidate.name.clone()
        };

        info!(
            analysis_id = %analysis_id,
            target_name = %target_name,
            samples = series.time.len(),
            advisor = self.advisor.as_ref().map(|a| a.name()).unwrap_or("none"),
            "Analysis started"
        );
        self.emit(PipelineEvent::AnalysisStarted {
            analysis_id,
            target_name: target_name.clone(),
            sample_count: series.time.len(),
            timestamp: chrono::Utc::now(),
        });

        let id = Some(analysis_id);
        let mut degradations = Vec::new();
        let parameters = &candidate.parameters;

        let fit = self.fit(series, parameters.orbital_period);
        self.record(id, Stage::TransitFit, &fit, &mut degradations);
        let fit = fit.into_value();
        let meta = series.meta();

        // Centroid analysis only needs the fit, so it runs alongside refinement
        let ((refined, physics), centroid) = tokio::join!(
            self.refine_and_validate(&fit, parameters, &meta),
            async { self.analyze_centroid(series, fit.period, fit.depth) },
        );
        self.record(id, Stage::Refinement, &refined, &mut degradations);
        self.record(id, Stage::PhysicsValidation, &physics, &mut degradations);
        self.record(id, Stage::CentroidMotion, &centroid, &mut degradations);

        let transit_analysis = TransitAnalysis::from_stages(refined.into_value(), physics.into_value());
        let centroid_analysis = centroid.into_value();

        let uncertainty = self
            .quantify(&transit_analysis, &centroid_analysis, parameters)
            .await;
        self.record(id, Stage::UncertaintyQuantification, &uncertainty, &mut degradations);
        let uncertainty_analysis = uncertainty.into_value();

        let inputs = EnsembleInputs {
            transit_analysis: &transit_analysis,
            centroid_analysis: &centroid_analysis,
            uncertainty_analysis: &uncertainty_analysis,
        };
        let ensemble = self.decide(&inputs, candidate).await;
        self.record(id, Stage::EnsembleDecision, &ensemble, &mut degradations);
        let ensemble_predictions = ensemble.into_value();

        info!(
            analysis_id = %analysis_id,
            decision = %ensemble_predictions.decision,
            overall_confidence = ensemble_predictions.overall_confidence,
            degraded_stages = degradations.len(),
            "Analysis complete"
        );
        self.emit(PipelineEvent::AnalysisCompleted {
            analysis_id,
            decision: ensemble_predictions.decision.to_string(),
            overall_confidence: ensemble_predictions.overall_confidence,
            timestamp: chrono::Utc::now(),
        });

        AnalysisReport {
            analysis_id,
            target_name,
            timestamp: chrono::Utc::now(),
            candidate: candidate.clone(),
            transit_analysis,
            centroid_analysis,
            uncertainty_analysis,
            ensemble_predictions,
            degradations,
        }
    }

    /// Note a stage result; emits a progress event when part of a run
    fn record<T>(
        &self,
        analysis_id: Option<Uuid>,
        stage: Stage,
        outcome: &StageOutcome<T>,
        degradations: &mut Vec<StageDegradation>,
    ) {
        let reason = outcome.reason().map(str::to_string);
        if let Some(reason) = &reason {
            debug!(stage = %stage, reason = %reason, "Stage degraded");
            degradations.push(StageDegradation {
                stage,
                reason: reason.clone(),
            });
        }

        if let Some(analysis_id) = analysis_id {
            self.emit(PipelineEvent::StageCompleted {
                analysis_id,
                stage,
                degraded: reason.is_some(),
                reason,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    /// Emit progress event without ever blocking the analysis
    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.try_send(event) {
                debug!(error = %e, "Dropped pipeline event");
            }
        }
    }
}
