pub mod vi;

use crate::common::defs::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Value of a state together with the action achieving it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueIterationState {
    pub value: Continous,
    pub best_action: Action,
}

impl ValueIterationState {
    pub fn new(value: Continous, best_action: Action) -> Self {
        Self { value, best_action }
    }
}

impl Default for ValueIterationState {
    fn default() -> Self {
        Self::new(0., Action::N)
    }
}

pub type ValueTable = BTreeMap<Coordinate, ValueIterationState>;

/// Sweep index to the value table after that sweep. Sweep 0 is the all zero table.
pub type ValueIterationTrace = BTreeMap<usize, ValueTable>;
