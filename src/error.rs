//! Error types for grid construction, solving and queries.

use crate::common::defs::{Action, AgentFamily, Discrete, QueryType};
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("grid is uninitialized: the state space is empty")]
    EmptyStateSpace,

    #[error("state {x},{y} does not exist in the grid or is a boulder")]
    UnknownState { x: Discrete, y: Discrete },

    #[error("invalid action {action} for state {x},{y}")]
    InvalidAction {
        action: Action,
        x: Discrete,
        y: Discrete,
    },

    #[error("invalid query: {family} agent cannot answer {query_type} query")]
    InvalidQuery {
        family: AgentFamily,
        query_type: QueryType,
    },

    #[error("step {step} has not been recorded ({recorded} steps recorded)")]
    StepOutOfRange { step: usize, recorded: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
