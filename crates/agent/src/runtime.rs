use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use jarvis_core::config::AnalysisConfig;
use jarvis_core::errors::{ApplicationError, DomainError};
use jarvis_core::features::FeatureTable;
use jarvis_core::ml::SalesModel;
use jarvis_core::simulation::SimulationEngine;
use jarvis_db::{RepositoryError, SalesRepository};

use crate::intent::{classify, extract_parameters, Intent, QuestionParameters};
use crate::policy::{AnswerDecision, AnswerPolicy};
use crate::responses;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Answer {
    pub intent: Intent,
    pub text: String,
    pub correlation_id: String,
}

/// Answers one question at a time against shared, read-only handles.
///
/// The model and feature table are loaded once by the caller. Scenarios fork
/// the table per request, so concurrent `answer` calls never observe each
/// other's perturbations.
pub struct AgentRuntime {
    sales: Arc<dyn SalesRepository>,
    model: Arc<dyn SalesModel>,
    features: Arc<FeatureTable>,
    analysis: AnalysisConfig,
    policy: AnswerPolicy,
}

impl AgentRuntime {
    pub fn new(
        sales: Arc<dyn SalesRepository>,
        model: Arc<dyn SalesModel>,
        features: Arc<FeatureTable>,
        analysis: AnalysisConfig,
    ) -> Self {
        let policy = AnswerPolicy::from(&analysis);
        Self { sales, model, features, analysis, policy }
    }

    pub fn with_policy(mut self, policy: AnswerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn answer(&self, question: &str) -> String {
        self.answer_detailed(question).await.text
    }

    pub async fn answer_detailed(&self, question: &str) -> Answer {
        let correlation_id = Uuid::new_v4().to_string();
        let intent = classify(question);
        info!(
            event_name = "agent.question.classified",
            correlation_id = %correlation_id,
            intent = intent.as_str(),
            "question classified"
        );

        let text = match self.policy.evaluate(intent) {
            AnswerDecision::Fallback { reason_code } => {
                info!(
                    event_name = "agent.answer.fallback",
                    correlation_id = %correlation_id,
                    intent = intent.as_str(),
                    reason_code,
                    "answering with fallback"
                );
                responses::fallback()
            }
            AnswerDecision::Answer => {
                let parameters = extract_parameters(question);
                match self.dispatch(intent, parameters).await {
                    Ok(text) => {
                        info!(
                            event_name = "agent.answer.completed",
                            correlation_id = %correlation_id,
                            intent = intent.as_str(),
                            "answer produced"
                        );
                        text
                    }
                    Err(error) => {
                        let interface = error.into_interface(correlation_id.clone());
                        warn!(
                            event_name = "agent.answer.failed",
                            correlation_id = %correlation_id,
                            intent = intent.as_str(),
                            error = %interface,
                            "answer could not be computed"
                        );
                        interface.user_message().to_string()
                    }
                }
            }
        };

        Answer { intent, text, correlation_id }
    }

    async fn dispatch(
        &self,
        intent: Intent,
        parameters: QuestionParameters,
    ) -> Result<String, ApplicationError> {
        let engine = SimulationEngine::new(self.model.as_ref(), self.features.as_ref());
        let drop_pct = parameters.percent.unwrap_or(self.analysis.stock_drop_pct);

        let text = match intent {
            Intent::SalesSummary => {
                let year = parameters.year.unwrap_or(self.analysis.summary_year);
                let total = self.sales.total_units(Some(year)).await.map_err(repository_error)?;
                responses::sales_summary(year, total)
            }
            Intent::TopCategory => {
                responses::top_category(&self.sales.top_category().await.map_err(repository_error)?)
            }
            Intent::RegionPerformance => responses::region_performance(
                &self.sales.top_region().await.map_err(repository_error)?,
            ),
            Intent::PromoEffect => {
                responses::promo_effect(&self.sales.promo_effect().await.map_err(repository_error)?)
            }
            Intent::ExpectedSales | Intent::ForecastSales => {
                responses::expected_sales(&engine.expected_sales()?)
            }
            Intent::StockDrop => {
                responses::stock_drop(drop_pct, &engine.simulate_stock_drop(drop_pct)?)
            }
            Intent::PromoStockInteraction => responses::promo_stock_interaction(
                &engine.simulate_promo_stock_interaction(drop_pct)?,
            ),
            Intent::PromoOff => responses::promo_off(&engine.simulate_promo_off()?),
            Intent::KeyDrivers => {
                responses::key_drivers(&engine.key_drivers(self.analysis.top_drivers)?)
            }
            Intent::Unknown => responses::fallback(),
        };
        Ok(text)
    }
}

fn repository_error(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::NoData(message) => ApplicationError::Domain(DomainError::NoData(message)),
        RepositoryError::InvalidTableName(_) => ApplicationError::Configuration(error.to_string()),
        RepositoryError::Database(_) => {
            ApplicationError::Persistence(error.to_string())
        }
    }
}
