//! Grid world MDP solved by value iteration and by Q-learning, with the full per-sweep or
//! per-episode trace kept for step by step visualization.

pub mod agents;
pub mod algos;
pub mod common;
pub mod config;
pub mod envs;
pub mod error;
pub mod ui;

pub use agents::query::{Query, QueryBook};
pub use agents::{QueryAnsweringAgent, Solver};
pub use algos::model_based::mdp::vi::ValueIteration;
pub use algos::model_based::mdp::{ValueIterationState, ValueIterationTrace, ValueTable};
pub use algos::model_free::q_learning::{
    EpisodeSnapshot, QLearning, QLearningState, QLearningTrace, QTable, DEFAULT_EPSILON,
};
pub use common::defs::*;
pub use config::GridConfig;
pub use envs::grid_world::{CellProperties, Environment, Transition};
pub use error::{Error, Result};
