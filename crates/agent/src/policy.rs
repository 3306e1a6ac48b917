use jarvis_core::config::AnalysisConfig;

use crate::intent::Intent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerDecision {
    Answer,
    Fallback { reason_code: &'static str },
}

/// Switches for intents that are recognized but may be left unanswered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerPolicy {
    pub answer_forecasts: bool,
    pub answer_key_drivers: bool,
}

impl Default for AnswerPolicy {
    fn default() -> Self {
        Self { answer_forecasts: true, answer_key_drivers: true }
    }
}

impl From<&AnalysisConfig> for AnswerPolicy {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            answer_forecasts: config.answer_forecasts,
            answer_key_drivers: config.answer_key_drivers,
        }
    }
}

impl AnswerPolicy {
    pub fn evaluate(&self, intent: Intent) -> AnswerDecision {
        match intent {
            Intent::Unknown => AnswerDecision::Fallback { reason_code: "unknown_intent" },
            Intent::ForecastSales if !self.answer_forecasts => {
                AnswerDecision::Fallback { reason_code: "forecasts_disabled" }
            }
            Intent::KeyDrivers if !self.answer_key_drivers => {
                AnswerDecision::Fallback { reason_code: "key_drivers_disabled" }
            }
            _ => AnswerDecision::Answer,
        }
    }
}
