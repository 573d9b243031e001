pub mod query;

use crate::algos::model_based::mdp::vi::ValueIteration;
use crate::algos::model_free::q_learning::QLearning;
use crate::common::defs::*;
use crate::envs::grid_world::Environment;
use crate::error::{Error, Result};
use query::{Query, QueryBook};
use serde_json::Value;
use std::sync::Arc;

/// A solver that records one snapshot per step and answers queries against them.
pub trait QueryAnsweringAgent {
    fn agent_family(&self) -> AgentFamily;

    /// Solves the grid from scratch, recording every step and answering the queries scheduled
    /// for it as soon as it is recorded.
    fn run(&mut self) -> Result<()>;

    /// Number of snapshots recorded so far. Step `n` is answerable when `n < recorded_steps()`.
    fn recorded_steps(&self) -> usize;

    fn find_query_answer(&mut self, query: &Query) -> Result<String>;

    /// Text picture of the snapshot `query` is asked against.
    fn render(&self, query: &Query) -> Result<String>;

    fn visualize_answers(&self) -> bool;

    fn query_book(&self) -> &QueryBook;

    fn query_book_mut(&mut self) -> &mut QueryBook;

    /// Keeps the queries addressed to this solver's family.
    fn set_relevant_queries(&mut self, queries: Vec<Query>) {
        let family = self.agent_family();
        self.query_book_mut().register(family, queries);
    }

    fn answer_queries(&mut self, step: usize) -> Result<()> {
        let mut queries = self.query_book_mut().take(step);
        if queries.is_empty() {
            return Ok(());
        }

        let recorded = self.recorded_steps();
        let result: Result<()> = if step < recorded {
            queries
                .iter_mut()
                .filter(|q| !q.is_answered())
                .try_for_each(|q| {
                    let answer = self.find_query_answer(q)?;
                    let rendering = if self.visualize_answers() {
                        Some(self.render(q)?)
                    } else {
                        None
                    };
                    q.set_answer(answer, rendering);
                    Ok::<(), Error>(())
                })
        } else {
            Err(Error::StepOutOfRange { step, recorded })
        };

        self.query_book_mut().restore(step, queries);
        result
    }

    fn queries(&self) -> Vec<&Query> {
        self.query_book().iter().collect()
    }
}

/// The two solver families behind one type.
#[derive(Debug)]
pub enum Solver {
    ValueIteration(ValueIteration),
    QLearning(QLearning),
}

impl Solver {
    pub fn new(family: AgentFamily, env: Arc<Environment>) -> Result<Self> {
        match family {
            AgentFamily::Mdp => Ok(Solver::ValueIteration(ValueIteration::new(env))),
            AgentFamily::Rl => Ok(Solver::QLearning(QLearning::new(env)?)),
        }
    }

    /// Reproducible exploration for the Q-learning family. The exact solver ignores the seed.
    pub fn with_seed(self, seed: u64) -> Self {
        match self {
            Solver::QLearning(ql) => Solver::QLearning(ql.with_seed(seed)),
            vi => vi,
        }
    }

    pub fn with_visualized_answers(self, visualize: bool) -> Self {
        match self {
            Solver::ValueIteration(vi) => {
                Solver::ValueIteration(vi.with_visualized_answers(visualize))
            }
            Solver::QLearning(ql) => Solver::QLearning(ql.with_visualized_answers(visualize)),
        }
    }

    /// Completion message of the front end.
    pub fn completion_message(&self) -> &'static str {
        match self {
            Solver::ValueIteration(_) => "Value Iteration completed",
            Solver::QLearning(_) => "Q-Learning completed",
        }
    }

    /// The recorded trace in its JSON wire shape.
    pub fn iterations_json(&self) -> Result<Value> {
        match self {
            Solver::ValueIteration(vi) => Ok(serde_json::to_value(vi.iterations())?),
            Solver::QLearning(ql) => Ok(serde_json::to_value(ql.iterations())?),
        }
    }
}

impl QueryAnsweringAgent for Solver {
    fn agent_family(&self) -> AgentFamily {
        match self {
            Solver::ValueIteration(vi) => vi.agent_family(),
            Solver::QLearning(ql) => ql.agent_family(),
        }
    }

    fn run(&mut self) -> Result<()> {
        match self {
            Solver::ValueIteration(vi) => vi.run(),
            Solver::QLearning(ql) => ql.run(),
        }
    }

    fn recorded_steps(&self) -> usize {
        match self {
            Solver::ValueIteration(vi) => vi.recorded_steps(),
            Solver::QLearning(ql) => ql.recorded_steps(),
        }
    }

    fn find_query_answer(&mut self, query: &Query) -> Result<String> {
        match self {
            Solver::ValueIteration(vi) => vi.find_query_answer(query),
            Solver::QLearning(ql) => ql.find_query_answer(query),
        }
    }

    fn render(&self, query: &Query) -> Result<String> {
        match self {
            Solver::ValueIteration(vi) => vi.render(query),
            Solver::QLearning(ql) => ql.render(query),
        }
    }

    fn visualize_answers(&self) -> bool {
        match self {
            Solver::ValueIteration(vi) => vi.visualize_answers(),
            Solver::QLearning(ql) => ql.visualize_answers(),
        }
    }

    fn query_book(&self) -> &QueryBook {
        match self {
            Solver::ValueIteration(vi) => vi.query_book(),
            Solver::QLearning(ql) => ql.query_book(),
        }
    }

    fn query_book_mut(&mut self) -> &mut QueryBook {
        match self {
            Solver::ValueIteration(vi) => vi.query_book_mut(),
            Solver::QLearning(ql) => ql.query_book_mut(),
        }
    }
}
