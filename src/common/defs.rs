use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub type Discrete = i32;
pub type Continous = f64;

/// A grid cell. Serializes as `"x,y"` so it can key JSON objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub x: Discrete,
    pub y: Discrete,
}

impl Coordinate {
    pub const fn new(x: Discrete, y: Discrete) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, (dx, dy): (Discrete, Discrete)) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<(Discrete, Discrete)> for Coordinate {
    fn from((x, y): (Discrete, Discrete)) -> Self {
        Self::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    N,
    S,
    W,
    E,
    Terminate,
}

impl Action {
    /// Movement actions in enumeration order. Value iteration breaks ties by this order.
    pub const DIRECTIONS: [Action; 4] = [Action::N, Action::S, Action::W, Action::E];

    pub fn delta(&self) -> Option<(Discrete, Discrete)> {
        match self {
            Action::N => Some((0, 1)),
            Action::S => Some((0, -1)),
            Action::W => Some((-1, 0)),
            Action::E => Some((1, 0)),
            Action::Terminate => None,
        }
    }

    pub fn opposite(&self) -> Option<Action> {
        match self {
            Action::N => Some(Action::S),
            Action::S => Some(Action::N),
            Action::W => Some(Action::E),
            Action::E => Some(Action::W),
            Action::Terminate => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::N => "Go North",
            Action::S => "Go South",
            Action::W => "Go West",
            Action::E => "Go East",
            Action::Terminate => "Terminate State Collect Reward",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::N => "N",
            Action::S => "S",
            Action::W => "W",
            Action::E => "E",
            Action::Terminate => "Terminate",
        };
        f.write_str(s)
    }
}

/// Solver family a query is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentFamily {
    /// Exact dynamic programming (value iteration).
    #[serde(rename = "MDP")]
    Mdp,
    /// Sample based reinforcement learning (Q-learning).
    #[serde(rename = "RL")]
    Rl,
}

impl fmt::Display for AgentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentFamily::Mdp => f.write_str("MDP"),
            AgentFamily::Rl => f.write_str("RL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryType {
    StateValue,
    BestPolicy,
    BestQValue,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::StateValue => f.write_str("stateValue"),
            QueryType::BestPolicy => f.write_str("bestPolicy"),
            QueryType::BestQValue => f.write_str("bestQValue"),
        }
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stateValue" => Ok(QueryType::StateValue),
            "bestPolicy" => Ok(QueryType::BestPolicy),
            "bestQValue" => Ok(QueryType::BestQValue),
            e => Err(format!("Unrecognized query type: {e}")),
        }
    }
}
