use crate::agents::query::{Query, QueryBook};
use crate::agents::QueryAnsweringAgent;
use crate::common::defs::*;
use crate::envs::grid_world::Environment;
use crate::error::{Error, Result};
use crate::ui::render_grid;
use rand::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Exploration rate used unless overridden.
pub const DEFAULT_EPSILON: Continous = 0.4;

/// Action values of one state.
///
/// `Terminate` only gets a value once a terminal state has been updated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QLearningState {
    #[serde(rename = "N")]
    north: Continous,
    #[serde(rename = "S")]
    south: Continous,
    #[serde(rename = "W")]
    west: Continous,
    #[serde(rename = "E")]
    east: Continous,
    #[serde(rename = "Terminate", skip_serializing_if = "Option::is_none")]
    terminate: Option<Continous>,
}

impl QLearningState {
    pub fn q_value(&self, a: Action) -> Continous {
        match a {
            Action::N => self.north,
            Action::S => self.south,
            Action::W => self.west,
            Action::E => self.east,
            Action::Terminate => self.terminate.unwrap_or(0.),
        }
    }

    pub fn update_q_value(&mut self, a: Action, q: Continous) {
        match a {
            Action::N => self.north = q,
            Action::S => self.south = q,
            Action::W => self.west = q,
            Action::E => self.east = q,
            Action::Terminate => self.terminate = Some(q),
        }
    }
}

impl fmt::Display for QLearningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[N : {:.2} S : {:.2} W : {:.2} E : {:.2}",
            self.north, self.south, self.west, self.east
        )?;
        if let Some(t) = self.terminate {
            write!(f, " Terminate : {t:.2}")?;
        }
        write!(f, "]")
    }
}

pub type QTable = BTreeMap<Coordinate, QLearningState>;

/// Q-table after an episode together with the states that episode visited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeSnapshot {
    pub q_values: QTable,
    pub sequences: Vec<Coordinate>,
}

/// Episode index to snapshot. Entry 0 is the all zero table with no trajectory, entry `e + 1`
/// holds the table after episode `e` and the trajectory of episode `e`.
pub type QLearningTrace = BTreeMap<usize, EpisodeSnapshot>;

/// Epsilon-greedy, off-policy TD control.
///
/// Ref: Sutton & Barto 2018, section 6.5.
#[derive(Debug, Clone)]
pub struct QLearning {
    env: Arc<Environment>,
    epsilon: Continous,
    rng: StdRng,
    q_values: QTable,
    iterations: QLearningTrace,
    queries: QueryBook,
    visualize_answers: bool,
}

impl QLearning {
    /// Fails when no terminal state can be reached from the robot start, as episodes would never
    /// end.
    pub fn new(env: Arc<Environment>) -> Result<Self> {
        if !env.terminal_reachable_from_start() {
            return Err(Error::invalid_config(format!(
                "no terminal state is reachable from robot start state {}",
                env.robot_start_state()
            )));
        }

        Ok(Self {
            env,
            epsilon: DEFAULT_EPSILON,
            rng: StdRng::from_entropy(),
            q_values: QTable::new(),
            iterations: QLearningTrace::new(),
            queries: QueryBook::default(),
            visualize_answers: false,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Must be within `(0, 1]`. Without exploration an episode may never reach a terminal state.
    pub fn with_epsilon(mut self, epsilon: Continous) -> Result<Self> {
        if epsilon.is_nan() || epsilon <= 0.0 || epsilon > 1.0 {
            return Err(Error::invalid_config(format!(
                "epsilon must be within (0, 1], got {epsilon}"
            )));
        }

        self.epsilon = epsilon;
        Ok(self)
    }

    pub fn with_visualized_answers(mut self, visualize: bool) -> Self {
        self.visualize_answers = visualize;
        self
    }

    pub fn epsilon(&self) -> Continous {
        self.epsilon
    }

    pub fn iterations(&self) -> &QLearningTrace {
        &self.iterations
    }

    /// Q-table after the last episode.
    pub fn q_values(&self) -> &QTable {
        &self.q_values
    }

    /// Visited states of every episode, in episode order.
    pub fn trajectories(&self) -> Vec<&[Coordinate]> {
        self.iterations
            .range(1..)
            .map(|(_, snapshot)| snapshot.sequences.as_slice())
            .collect()
    }

    /// Largest action value of `s` and the action holding it. Ties go to a random action.
    pub fn max_q_value_and_action(&mut self, s: &Coordinate) -> Result<(Continous, Action)> {
        max_q_value_and_action(&self.env, &self.q_values, &mut self.rng, s)
    }

    fn choose_action(&mut self, s: &Coordinate) -> Result<Action> {
        if self.rng.gen::<Continous>() < self.epsilon {
            let actions = self.env.actions_from(s)?;
            Ok(actions[self.rng.gen_range(0..actions.len())])
        } else {
            Ok(self.max_q_value_and_action(s)?.1)
        }
    }

    /// Blends one observed transition into the running estimate of `Q(s, a)`.
    fn receive_sample(
        &mut self,
        s: Coordinate,
        a: Action,
        next: Option<Coordinate>,
        reward: Continous,
    ) -> Result<()> {
        let q = match next {
            Some(next) if !self.env.is_terminal(&s) => {
                let (max_next, _) = self.max_q_value_and_action(&next)?;
                let sample = reward + self.env.discount() * max_next;
                let alpha = self.env.alpha();
                (1. - alpha) * self.q_value(&s, a)? + alpha * sample
            }
            _ => reward,
        };

        self.q_values
            .get_mut(&s)
            .ok_or(Error::UnknownState { x: s.x, y: s.y })?
            .update_q_value(a, q);

        Ok(())
    }

    fn q_value(&self, s: &Coordinate, a: Action) -> Result<Continous> {
        self.q_values
            .get(s)
            .map(|q| q.q_value(a))
            .ok_or(Error::UnknownState { x: s.x, y: s.y })
    }

    fn run_episode(&mut self) -> Result<Vec<Coordinate>> {
        let env = Arc::clone(&self.env);
        let start = env.robot_start_state();
        let mut sequence = vec![start];
        let mut state = Some(start);

        while let Some(s) = state {
            let action = self.choose_action(&s)?;
            let reward = env.reward(&s)?;
            let next = env.attempt_move(&s, action)?;
            self.receive_sample(s, action, next, reward)?;

            if let Some(next) = next {
                sequence.push(next);
            }
            state = next;
        }

        Ok(sequence)
    }

    fn snapshot(&self, step: usize) -> Result<&QTable> {
        self.iterations
            .get(&step)
            .map(|snapshot| &snapshot.q_values)
            .ok_or(Error::StepOutOfRange {
                step,
                recorded: self.iterations.len(),
            })
    }
}

fn max_q_value_and_action<R: Rng>(
    env: &Environment,
    q_values: &QTable,
    rng: &mut R,
    s: &Coordinate,
) -> Result<(Continous, Action)> {
    let mut actions = env.actions_from(s)?;
    actions.shuffle(rng);

    let q = q_values.get(s).ok_or(Error::UnknownState { x: s.x, y: s.y })?;
    let mut best = (Continous::NEG_INFINITY, actions[0]);
    for a in actions {
        let v = q.q_value(a);
        if v > best.0 {
            best = (v, a);
        }
    }

    Ok(best)
}

impl QueryAnsweringAgent for QLearning {
    fn agent_family(&self) -> AgentFamily {
        AgentFamily::Rl
    }

    fn run(&mut self) -> Result<()> {
        let episodes = self.env.episodes();
        info!(
            states = self.env.states().len(),
            episodes,
            epsilon = self.epsilon,
            "running q-learning"
        );

        self.q_values = self
            .env
            .states()
            .keys()
            .map(|&s| (s, QLearningState::default()))
            .collect();
        self.iterations.clear();
        self.iterations.insert(
            0,
            EpisodeSnapshot {
                q_values: self.q_values.clone(),
                sequences: vec![],
            },
        );
        self.answer_queries(0)?;

        for e in 0..episodes {
            let sequences = self.run_episode()?;
            debug!(
                episode = e,
                steps = sequences.len(),
                last = ?sequences.last(),
                "q-learning episode"
            );

            self.iterations.insert(
                e + 1,
                EpisodeSnapshot {
                    q_values: self.q_values.clone(),
                    sequences,
                },
            );
            self.answer_queries(e + 1)?;
        }

        info!(snapshots = self.iterations.len(), "q-learning done");
        Ok(())
    }

    fn recorded_steps(&self) -> usize {
        self.iterations.len()
    }

    fn find_query_answer(&mut self, query: &Query) -> Result<String> {
        let step = query.step();
        let snapshot = self
            .iterations
            .get(&step)
            .map(|snapshot| &snapshot.q_values)
            .ok_or(Error::StepOutOfRange {
                step,
                recorded: self.iterations.len(),
            })?;
        let (q, a) =
            max_q_value_and_action(&self.env, snapshot, &mut self.rng, &query.coordinate())?;

        match query.query_type() {
            QueryType::StateValue | QueryType::BestQValue => Ok(format!("{q:.2}")),
            QueryType::BestPolicy => Ok(a.label().to_string()),
        }
    }

    fn render(&self, query: &Query) -> Result<String> {
        let snapshot = self.snapshot(query.step())?;

        Ok(render_grid(&self.env, Some(query.coordinate()), |c| {
            let best = self
                .env
                .actions_from(c)
                .ok()
                .and_then(|actions| {
                    let q = snapshot.get(c)?;
                    actions
                        .into_iter()
                        .map(|a| q.q_value(a))
                        .reduce(Continous::max)
                })
                .unwrap_or(0.);
            format!("{best:.2}")
        }))
    }

    fn visualize_answers(&self) -> bool {
        self.visualize_answers
    }

    fn query_book(&self) -> &QueryBook {
        &self.queries
    }

    fn query_book_mut(&mut self) -> &mut QueryBook {
        &mut self.queries
    }
}

impl fmt::Display for QLearning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (s, q) in &self.q_values {
            writeln!(f, "[ {s} | Actions: {q} ]")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use float_eq::*;

    fn corridor(noise: Continous, alpha: Continous, episodes: Discrete) -> Arc<Environment> {
        let config = GridConfig {
            rows: Some(3),
            cols: Some(1),
            terminal: Some(vec![(2, 0, 1.)]),
            boulder: Some(vec![]),
            robot_start_state: Some((0, 0)),
            discount: Some(0.9),
            noise: Some(noise),
            transition_cost: Some(0.),
            alpha: Some(alpha),
            episodes: Some(episodes),
            k: None,
        }
        .prepared_for(AgentFamily::Rl);

        Arc::new(Environment::new(&config).unwrap())
    }

    #[test]
    fn fresh_state_has_zero_values() {
        let q = QLearningState::default();

        for a in Action::DIRECTIONS {
            assert_eq!(q.q_value(a), 0.);
        }
        assert_eq!(q.q_value(Action::Terminate), 0.);
        assert_eq!(
            serde_json::to_value(q).unwrap(),
            serde_json::json!({"N": 0.0, "S": 0.0, "W": 0.0, "E": 0.0})
        );
    }

    #[test]
    fn updating_one_state_leaves_others_alone() {
        let env = corridor(0., 0.5, 0);
        let ql = &mut QLearning::new(env).unwrap().with_seed(7);
        ql.run().unwrap();

        ql.q_values
            .get_mut(&Coordinate::new(0, 0))
            .unwrap()
            .update_q_value(Action::E, 2.);

        assert_eq!(ql.q_values[&Coordinate::new(1, 0)], QLearningState::default());
        assert_eq!(
            ql.iterations()[&0].q_values[&Coordinate::new(0, 0)],
            QLearningState::default()
        );
    }

    #[test]
    fn terminal_update_is_exact() {
        let env = corridor(0., 0.5, 0);
        let ql = &mut QLearning::new(env).unwrap().with_seed(7);
        ql.run().unwrap();

        let t = Coordinate::new(2, 0);
        ql.receive_sample(t, Action::Terminate, None, 1.).unwrap();
        assert_eq!(ql.q_values[&t].q_value(Action::Terminate), 1.);

        let s = Coordinate::new(1, 0);
        ql.receive_sample(s, Action::E, Some(t), 0.).unwrap();
        assert_float_eq!(ql.q_values[&s].q_value(Action::E), 0.45, abs <= 1e-12);
    }

    #[test]
    fn ties_are_broken_at_random() {
        let env = corridor(0., 0.5, 0);
        let ql = &mut QLearning::new(env).unwrap().with_seed(2718);
        ql.run().unwrap();

        let s = Coordinate::new(0, 0);
        let picked = (0..200)
            .map(|_| ql.max_q_value_and_action(&s).unwrap().1)
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(picked.len(), 4);
    }

    #[test]
    fn trace_shape_follows_episode_count() {
        let ql = &mut QLearning::new(corridor(0.2, 0.5, 25)).unwrap().with_seed(42);
        ql.run().unwrap();

        assert_eq!(ql.iterations().len(), 26);
        assert!(ql.iterations()[&0].sequences.is_empty());
        assert_eq!(ql.trajectories().len(), 25);
        for t in ql.trajectories() {
            assert_eq!(t[0], Coordinate::new(0, 0));
            assert_eq!(t[t.len() - 1], Coordinate::new(2, 0));
        }
    }

    #[test]
    fn learns_to_walk_east() {
        let ql = &mut QLearning::new(corridor(0., 0.5, 200)).unwrap().with_seed(1);
        ql.run().unwrap();

        // Q*(1,0,E) = 0.9 and Q*(0,0,E) = 0.81 on a noiseless corridor.
        let q = &ql.q_values;
        assert_float_eq!(q[&Coordinate::new(2, 0)].q_value(Action::Terminate), 1., abs <= 1e-12);
        assert_float_eq!(q[&Coordinate::new(1, 0)].q_value(Action::E), 0.9, abs <= 1e-3);
        assert_float_eq!(q[&Coordinate::new(0, 0)].q_value(Action::E), 0.81, abs <= 1e-2);
        assert_eq!(
            ql.max_q_value_and_action(&Coordinate::new(0, 0)).unwrap().1,
            Action::E
        );
    }

    #[test]
    fn same_seed_same_trace() {
        let a = &mut QLearning::new(corridor(0.2, 0.3, 10)).unwrap().with_seed(99);
        let b = &mut QLearning::new(corridor(0.2, 0.3, 10)).unwrap().with_seed(99);
        a.run().unwrap();
        b.run().unwrap();

        assert_eq!(a.iterations(), b.iterations());
    }

    #[test]
    fn unreachable_terminal_is_rejected() {
        let config = GridConfig {
            rows: Some(3),
            cols: Some(1),
            terminal: Some(vec![(2, 0, 1.)]),
            boulder: Some(vec![(1, 0)]),
            robot_start_state: Some((0, 0)),
            discount: Some(0.9),
            noise: Some(0.2),
            transition_cost: Some(0.),
            alpha: Some(0.5),
            episodes: Some(1),
            k: None,
        }
        .prepared_for(AgentFamily::Rl);
        let env = Arc::new(Environment::new(&config).unwrap());

        assert!(matches!(
            QLearning::new(env),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn epsilon_must_be_a_probability() {
        let ql = QLearning::new(corridor(0., 0.5, 0)).unwrap();
        assert_eq!(ql.epsilon(), DEFAULT_EPSILON);
        assert!(ql.clone().with_epsilon(1.2).is_err());
        assert!(ql.clone().with_epsilon(Continous::NAN).is_err());
        assert_eq!(ql.clone().with_epsilon(1.).unwrap().epsilon(), 1.);
    }

    #[test]
    fn greedy_only_exploration_is_rejected() {
        let ql = QLearning::new(corridor(0., 0.5, 2)).unwrap();

        assert!(matches!(
            ql.with_epsilon(0.),
            Err(Error::InvalidConfiguration { .. })
        ));
    }
}
