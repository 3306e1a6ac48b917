use thiserror::Error;

use crate::ml::ModelError;
use crate::simulation::SimulationError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("required column `{column}` is missing from the feature table")]
    MissingColumn { column: String },
    #[error("no data available: {0}")]
    NoData(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("model failure: {0}")]
    Model(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("cannot compute: {message}")]
    CannotCompute { message: String, correlation_id: String },
    #[error("no data: {message}")]
    NoData { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CannotCompute { .. } => {
                "I cannot compute that: the model inputs are missing data this question needs."
            }
            Self::NoData { .. } => "No data available to answer that question.",
            Self::ServiceUnavailable { .. } => {
                "The analytics backend is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::CannotCompute { correlation_id, .. }
            | Self::NoData { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::CannotCompute { correlation_id: id, .. }
            | InterfaceError::NoData { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error @ DomainError::MissingColumn { .. })
            | ApplicationError::Domain(error @ DomainError::InvalidParameter(_)) => {
                Self::CannotCompute { message: error.to_string(), correlation_id }
            }
            ApplicationError::Domain(DomainError::NoData(message)) => {
                Self::NoData { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::InvariantViolation(message))
            | ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
            ApplicationError::Persistence(message) | ApplicationError::Model(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}

impl From<SimulationError> for ApplicationError {
    fn from(value: SimulationError) -> Self {
        match value {
            SimulationError::MissingColumn { column } => {
                Self::Domain(DomainError::MissingColumn { column })
            }
            SimulationError::EmptyFeatureTable => {
                Self::Domain(DomainError::NoData("the feature table has no rows".to_owned()))
            }
            error @ SimulationError::InvalidParameter { .. } => {
                Self::Domain(DomainError::InvalidParameter(error.to_string()))
            }
            error @ SimulationError::ImportanceMismatch { .. } => {
                Self::Domain(DomainError::InvariantViolation(error.to_string()))
            }
            error @ SimulationError::NonFinitePrediction => Self::Model(error.to_string()),
            SimulationError::Model(ModelError::MissingFeature { feature }) => {
                Self::Domain(DomainError::MissingColumn { column: feature })
            }
            SimulationError::Model(error) => Self::Model(error.to_string()),
        }
    }
}
