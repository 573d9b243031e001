//! Inbound grid configuration record.
//!
//! Field names follow the JSON accepted by the web front end. Every field is optional at parse
//! time so that a missing field is reported by name instead of as a generic parse failure.

use crate::common::defs::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of value iteration sweeps when the caller does not send `K`.
pub const DEFAULT_SWEEPS: Discrete = 1500;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Grid extent along x.
    #[serde(rename = "x")]
    pub rows: Option<Discrete>,
    /// Grid extent along y.
    #[serde(rename = "y")]
    pub cols: Option<Discrete>,
    /// `[x, y, reward]` triples.
    #[serde(rename = "Terminal")]
    pub terminal: Option<Vec<(Discrete, Discrete, Continous)>>,
    /// `[x, y]` pairs excluded from the state space.
    #[serde(rename = "Boulder")]
    pub boulder: Option<Vec<(Discrete, Discrete)>>,
    #[serde(rename = "RobotStartState")]
    pub robot_start_state: Option<(Discrete, Discrete)>,
    #[serde(rename = "Discount")]
    pub discount: Option<Continous>,
    #[serde(rename = "Noise")]
    pub noise: Option<Continous>,
    #[serde(rename = "TransitionCost")]
    pub transition_cost: Option<Continous>,
    #[serde(rename = "Alpha")]
    pub alpha: Option<Continous>,
    #[serde(rename = "Episodes")]
    pub episodes: Option<Discrete>,
    #[serde(rename = "K")]
    pub k: Option<Discrete>,
}

impl GridConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Fields a caller must send for the given solver family.
    pub fn required_fields(family: AgentFamily) -> &'static [&'static str] {
        match family {
            AgentFamily::Mdp => &[
                "x",
                "y",
                "Terminal",
                "Boulder",
                "RobotStartState",
                "Discount",
                "Noise",
                "TransitionCost",
            ],
            AgentFamily::Rl => &[
                "x",
                "y",
                "Terminal",
                "Boulder",
                "RobotStartState",
                "Discount",
                "Noise",
                "TransitionCost",
                "Alpha",
                "Episodes",
            ],
        }
    }

    pub fn check_required(&self, family: AgentFamily) -> Result<()> {
        match Self::required_fields(family)
            .iter()
            .find(|&&field| !self.is_present(field))
        {
            Some(&field) => Err(Error::MissingField { field }),
            None => Ok(()),
        }
    }

    /// Fills in the parameters the other solver family does not use, so the record can be turned
    /// into an environment.
    pub fn prepared_for(mut self, family: AgentFamily) -> Self {
        match family {
            AgentFamily::Mdp => {
                self.k = self.k.or(Some(DEFAULT_SWEEPS));
                self.episodes = Some(0);
                self.alpha = Some(0.0);
            }
            AgentFamily::Rl => {
                self.k = Some(0);
            }
        }

        self
    }

    fn is_present(&self, field: &str) -> bool {
        match field {
            "x" => self.rows.is_some(),
            "y" => self.cols.is_some(),
            "Terminal" => self.terminal.is_some(),
            "Boulder" => self.boulder.is_some(),
            "RobotStartState" => self.robot_start_state.is_some(),
            "Discount" => self.discount.is_some(),
            "Noise" => self.noise.is_some(),
            "TransitionCost" => self.transition_cost.is_some(),
            "Alpha" => self.alpha.is_some(),
            "Episodes" => self.episodes.is_some(),
            "K" => self.k.is_some(),
            _ => false,
        }
    }
}
