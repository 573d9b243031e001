use crate::common::defs::*;
use crate::config::GridConfig;
use crate::error::{Error, Result};
use itertools::Itertools;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::warn;

/// Static data of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellProperties {
    pub reward: Continous,
    pub is_terminal: bool,
}

/// One weighted outcome of attempting an action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub probability: Continous,
    /// Reward of the state being left.
    pub reward: Continous,
    /// `None` once the episode is over.
    pub next_state: Option<Coordinate>,
}

/// Grid world with elastic walls and noisy moves.
///
/// Built once from a [`GridConfig`] and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Environment {
    rows: Discrete,
    cols: Discrete,
    states: BTreeMap<Coordinate, CellProperties>,
    robot_start_state: Coordinate,
    k: usize,
    episodes: usize,
    alpha: Continous,
    discount: Continous,
    noise: Continous,
}

impl Environment {
    pub fn new(config: &GridConfig) -> Result<Self> {
        let rows = config.rows.ok_or(Error::MissingField { field: "x" })?;
        let cols = config.cols.ok_or(Error::MissingField { field: "y" })?;
        let k = config.k.ok_or(Error::MissingField { field: "K" })?;
        let episodes = config
            .episodes
            .ok_or(Error::MissingField { field: "Episodes" })?;
        let alpha = config.alpha.ok_or(Error::MissingField { field: "Alpha" })?;
        let discount = config
            .discount
            .ok_or(Error::MissingField { field: "Discount" })?;
        let noise = config.noise.ok_or(Error::MissingField { field: "Noise" })?;
        let robot_start_state: Coordinate = config
            .robot_start_state
            .ok_or(Error::MissingField {
                field: "RobotStartState",
            })?
            .into();

        check_unit_interval("Discount", discount)?;
        check_unit_interval("Noise", noise)?;
        check_unit_interval("Alpha", alpha)?;
        let k = usize::try_from(k)
            .map_err(|_| Error::invalid_config(format!("K is negative: {k}")))?;
        let episodes = usize::try_from(episodes)
            .map_err(|_| Error::invalid_config(format!("Episodes is negative: {episodes}")))?;

        let in_bounds = |c: &Coordinate| (0..rows).contains(&c.x) && (0..cols).contains(&c.y);
        let transition_cost = config.transition_cost.unwrap_or(0.0);
        let mut states = BTreeMap::new();

        for &(x, y, reward) in config.terminal.iter().flatten() {
            let c = Coordinate::new(x, y);
            if !in_bounds(&c) {
                return Err(Error::invalid_config(format!(
                    "terminal state {c} is outside the {rows}x{cols} grid"
                )));
            }
            states.insert(
                c,
                CellProperties {
                    reward,
                    is_terminal: true,
                },
            );
        }

        let mut boulders = HashSet::new();
        for &(x, y) in config.boulder.iter().flatten() {
            let c = Coordinate::new(x, y);
            if !in_bounds(&c) {
                return Err(Error::invalid_config(format!(
                    "boulder {c} is outside the {rows}x{cols} grid"
                )));
            }
            // TODO: Ask whether a cell listed as both terminal and boulder should be rejected.
            if states.contains_key(&c) {
                warn!(state = %c, "boulder overlaps a terminal state, keeping the terminal state");
            }
            boulders.insert(c);
        }

        for c in (0..rows).cartesian_product(0..cols).map(Coordinate::from) {
            if !boulders.contains(&c) && !states.contains_key(&c) {
                states.insert(
                    c,
                    CellProperties {
                        reward: transition_cost,
                        is_terminal: false,
                    },
                );
            }
        }

        if states.is_empty() {
            return Err(Error::EmptyStateSpace);
        }

        if !states.contains_key(&robot_start_state) {
            return Err(Error::invalid_config(format!(
                "robot start state {robot_start_state} is not a state of the grid"
            )));
        }

        Ok(Self {
            rows,
            cols,
            states,
            robot_start_state,
            k,
            episodes,
            alpha,
            discount,
            noise,
        })
    }

    pub fn rows(&self) -> Discrete {
        self.rows
    }

    pub fn cols(&self) -> Discrete {
        self.cols
    }

    /// All states in ascending `(x, y)` order.
    pub fn states(&self) -> &BTreeMap<Coordinate, CellProperties> {
        &self.states
    }

    pub fn contains(&self, s: &Coordinate) -> bool {
        self.states.contains_key(s)
    }

    pub fn robot_start_state(&self) -> Coordinate {
        self.robot_start_state
    }

    /// Maximum number of value iteration sweeps.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    pub fn alpha(&self) -> Continous {
        self.alpha
    }

    pub fn discount(&self) -> Continous {
        self.discount
    }

    /// False for coordinates outside the state space.
    pub fn is_terminal(&self, s: &Coordinate) -> bool {
        self.states.get(s).is_some_and(|p| p.is_terminal)
    }

    pub fn actions_from(&self, s: &Coordinate) -> Result<Vec<Action>> {
        let props = self.properties(s)?;
        if props.is_terminal {
            Ok(vec![Action::Terminate])
        } else {
            Ok(Action::DIRECTIONS.to_vec())
        }
    }

    pub fn reward(&self, s: &Coordinate) -> Result<Continous> {
        Ok(self.properties(s)?.reward)
    }

    /// Deterministic part of a move: where `action` leads from `s`, bouncing back off walls and
    /// boulders. Terminal states lead nowhere.
    pub fn attempt_move(&self, s: &Coordinate, action: Action) -> Result<Option<Coordinate>> {
        if self.properties(s)?.is_terminal {
            return Ok(None);
        }

        let delta = action.delta().ok_or(Error::InvalidAction {
            action,
            x: s.x,
            y: s.y,
        })?;
        let next = s.offset(delta);

        Ok(Some(if self.contains(&next) { next } else { *s }))
    }

    /// Outcomes of attempting `action` in `s`.
    ///
    /// The intended move happens with probability `1 - noise`; the two moves orthogonal to it share
    /// the noise. Moving in the opposite direction is never an outcome.
    pub fn transition_model(&self, s: &Coordinate, action: Action) -> Result<Vec<Transition>> {
        let props = self.properties(s)?;
        let reward = props.reward;

        if props.is_terminal {
            if action != Action::Terminate {
                return Err(Error::InvalidAction {
                    action,
                    x: s.x,
                    y: s.y,
                });
            }

            return Ok(vec![Transition {
                probability: 1.,
                reward,
                next_state: None,
            }]);
        }

        let opposite = action.opposite().ok_or(Error::InvalidAction {
            action,
            x: s.x,
            y: s.y,
        })?;
        let possible = Action::DIRECTIONS
            .into_iter()
            .filter(|&a| a != opposite)
            .collect::<Vec<_>>();
        let n_unintended = (possible.len() - 1) as Continous;

        possible
            .into_iter()
            .map(|a| {
                let probability = if a == action {
                    1. - self.noise
                } else {
                    self.noise / n_unintended
                };

                Ok(Transition {
                    probability,
                    reward,
                    next_state: self.attempt_move(s, a)?,
                })
            })
            .collect()
    }

    /// Whether some terminal state can be reached from the robot start by moving around.
    pub fn terminal_reachable_from_start(&self) -> bool {
        let mut seen = HashSet::from([self.robot_start_state]);
        let mut queue = VecDeque::from([self.robot_start_state]);

        while let Some(s) = queue.pop_front() {
            if self.is_terminal(&s) {
                return true;
            }

            for a in Action::DIRECTIONS {
                if let Ok(Some(next)) = self.attempt_move(&s, a) {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
        }

        false
    }

    fn properties(&self, s: &Coordinate) -> Result<&CellProperties> {
        self.states
            .get(s)
            .ok_or(Error::UnknownState { x: s.x, y: s.y })
    }
}

fn check_unit_interval(field: &str, value: Continous) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid_config(format!(
            "{field} must be within [0, 1], got {value}"
        )))
    }
}
