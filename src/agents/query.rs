use crate::common::defs::*;
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// A question about one cell at one recorded step of a solver run.
///
/// Once answered, a query never changes again.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    x: Discrete,
    y: Discrete,
    step: usize,
    agent_family: AgentFamily,
    query_type: QueryType,
    answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rendering: Option<String>,
}

impl Query {
    pub fn new(
        x: Discrete,
        y: Discrete,
        step: usize,
        agent_family: AgentFamily,
        query_type: QueryType,
    ) -> Result<Self> {
        if agent_family == AgentFamily::Mdp && query_type == QueryType::BestQValue {
            return Err(Error::InvalidQuery {
                family: agent_family,
                query_type,
            });
        }

        Ok(Self {
            x,
            y,
            step,
            agent_family,
            query_type,
            answer: None,
            rendering: None,
        })
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.x, self.y)
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn agent_family(&self) -> AgentFamily {
        self.agent_family
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    /// Grid snapshot attached to the answer when the solver visualizes answers.
    pub fn rendering(&self) -> Option<&str> {
        self.rendering.as_deref()
    }

    /// No-op on an answered query.
    pub(crate) fn set_answer(&mut self, answer: String, rendering: Option<String>) {
        if self.is_answered() {
            return;
        }

        self.answer = Some(answer);
        self.rendering = rendering;
    }
}

/// Queries a solver has accepted, grouped by the step they are asked at.
#[derive(Debug, Clone, Default)]
pub struct QueryBook {
    queries: BTreeMap<usize, Vec<Query>>,
}

impl QueryBook {
    /// Keeps the queries addressed to `family`, drops the rest.
    pub fn register(&mut self, family: AgentFamily, queries: impl IntoIterator<Item = Query>) {
        for query in queries
            .into_iter()
            .filter(|q| q.agent_family() == family)
        {
            self.queries.entry(query.step()).or_default().push(query);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Query> {
        self.queries.values().flatten()
    }

    pub(crate) fn take(&mut self, step: usize) -> Vec<Query> {
        self.queries.remove(&step).unwrap_or_default()
    }

    pub(crate) fn restore(&mut self, step: usize, queries: Vec<Query>) {
        if !queries.is_empty() {
            self.queries.insert(step, queries);
        }
    }
}
