use super::*;
use crate::agents::query::{Query, QueryBook};
use crate::agents::QueryAnsweringAgent;
use crate::envs::grid_world::Environment;
use crate::error::{Error, Result};
use crate::ui::render_grid;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Synchronous value iteration over a grid world.
///
/// Ref: Sutton & Barto 2018, section 4.4.
#[derive(Debug, Clone)]
pub struct ValueIteration {
    env: Arc<Environment>,
    state_values: ValueTable,
    iterations: ValueIterationTrace,
    queries: QueryBook,
    visualize_answers: bool,
}

impl ValueIteration {
    pub fn new(env: Arc<Environment>) -> Self {
        Self {
            env,
            state_values: ValueTable::new(),
            iterations: ValueIterationTrace::new(),
            queries: QueryBook::default(),
            visualize_answers: false,
        }
    }

    pub fn with_visualized_answers(mut self, visualize: bool) -> Self {
        self.visualize_answers = visualize;
        self
    }

    pub fn iterations(&self) -> &ValueIterationTrace {
        &self.iterations
    }

    /// Value table after the last sweep.
    pub fn state_values(&self) -> &ValueTable {
        &self.state_values
    }

    pub fn v_star(&self, s: &Coordinate) -> Option<Continous> {
        self.state_values.get(s).map(|v| v.value)
    }

    pub fn pi_star(&self, s: &Coordinate) -> Option<Action> {
        self.state_values.get(s).map(|v| v.best_action)
    }

    pub fn q_star(&self, s: &Coordinate, a: Action) -> Result<Continous> {
        action_value(&self.env, &self.state_values, s, a)
    }

    /// Every legal action of `s` with its value under `values`, in enumeration order.
    pub fn action_values(&self, s: &Coordinate) -> Result<Vec<ValueIterationState>> {
        all_action_values(&self.env, &self.state_values, s)
    }

    fn sweep(&self) -> Result<ValueTable> {
        self.state_values
            .keys()
            .map(|s| {
                let best = all_action_values(&self.env, &self.state_values, s)?
                    .into_iter()
                    .reduce(|best, v| if v.value > best.value { v } else { best })
                    .ok_or(Error::UnknownState { x: s.x, y: s.y })?;

                Ok((*s, best))
            })
            .collect()
    }

    fn snapshot(&self, step: usize) -> Result<&ValueTable> {
        self.iterations.get(&step).ok_or(Error::StepOutOfRange {
            step,
            recorded: self.iterations.len(),
        })
    }
}

fn all_action_values(
    env: &Environment,
    values: &ValueTable,
    s: &Coordinate,
) -> Result<Vec<ValueIterationState>> {
    env.actions_from(s)?
        .into_iter()
        .map(|a| Ok(ValueIterationState::new(action_value(env, values, s, a)?, a)))
        .collect()
}

/// Bellman backup of one action. Terminal states are worth their reward.
fn action_value(
    env: &Environment,
    values: &ValueTable,
    s: &Coordinate,
    a: Action,
) -> Result<Continous> {
    let ts = env.transition_model(s, a)?;
    if env.is_terminal(s) {
        return Ok(ts[0].reward);
    }

    let gamma = env.discount();
    Ok(ts
        .iter()
        .map(|t| {
            let v_next = t
                .next_state
                .and_then(|n| values.get(&n))
                .map_or(0., |v| v.value);
            t.probability * (t.reward + gamma * v_next)
        })
        .sum())
}

impl QueryAnsweringAgent for ValueIteration {
    fn agent_family(&self) -> AgentFamily {
        AgentFamily::Mdp
    }

    fn run(&mut self) -> Result<()> {
        let k = self.env.k();
        info!(states = self.env.states().len(), sweeps = k, "running value iteration");

        self.state_values = self
            .env
            .states()
            .keys()
            .map(|&s| (s, ValueIterationState::default()))
            .collect();
        self.iterations.clear();
        self.iterations.insert(0, self.state_values.clone());
        self.answer_queries(0)?;

        for sweep in 1..=k {
            let new_values = self.sweep()?;
            let delta = new_values
                .iter()
                .map(|(s, v)| (v.value - self.state_values[s].value).abs())
                .fold(0., Continous::max);
            debug!(sweep, delta, "value iteration sweep");

            self.state_values = new_values;
            self.iterations.insert(sweep, self.state_values.clone());
            self.answer_queries(sweep)?;
        }

        info!(snapshots = self.iterations.len(), "value iteration done");
        Ok(())
    }

    fn recorded_steps(&self) -> usize {
        self.iterations.len()
    }

    fn find_query_answer(&mut self, query: &Query) -> Result<String> {
        let s = query.coordinate();
        let state = self
            .snapshot(query.step())?
            .get(&s)
            .ok_or(Error::UnknownState { x: s.x, y: s.y })?;

        match query.query_type() {
            QueryType::StateValue => Ok(format!("{:.2}", state.value)),
            QueryType::BestPolicy => Ok(state.best_action.label().to_string()),
            query_type @ QueryType::BestQValue => Err(Error::InvalidQuery {
                family: self.agent_family(),
                query_type,
            }),
        }
    }

    fn render(&self, query: &Query) -> Result<String> {
        let snapshot = self.snapshot(query.step())?;

        Ok(render_grid(&self.env, Some(query.coordinate()), |c| {
            snapshot
                .get(c)
                .map(|v| format!("{:.2} {}", v.value, v.best_action))
                .unwrap_or_default()
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

impl fmt::Display for ValueIteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (s, v) in &self.state_values {
            writeln!(
                f,
                "[ {s} ] : {:.2} | Best Action: {}",
                v.value, v.best_action
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use float_eq::*;

    fn book_grid(transition_cost: Continous, discount: Continous, k: Discrete) -> Arc<Environment> {
        let config = GridConfig {
            rows: Some(4),
            cols: Some(3),
            terminal: Some(vec![(3, 2, 1.), (3, 1, -1.)]),
            boulder: Some(vec![]),
            robot_start_state: Some((0, 0)),
            discount: Some(discount),
            noise: Some(0.2),
            transition_cost: Some(transition_cost),
            alpha: None,
            episodes: None,
            k: Some(k),
        }
        .prepared_for(AgentFamily::Mdp);

        Arc::new(Environment::new(&config).unwrap())
    }

    #[test]
    fn trace_has_one_snapshot_per_sweep_plus_initial() {
        let vi = &mut ValueIteration::new(book_grid(0., 0.9, 7));
        vi.run().unwrap();

        assert_eq!(vi.iterations().len(), 8);
        assert_eq!(
            vi.iterations().keys().copied().collect::<Vec<_>>(),
            (0..=7).collect::<Vec<_>>()
        );
        assert!(vi.iterations()[&0]
            .values()
            .all(|v| *v == ValueIterationState::default()));
    }

    #[test]
    fn first_sweep_only_terminals_change() {
        let vi = &mut ValueIteration::new(book_grid(0., 0.9, 2));
        vi.run().unwrap();

        let sweep1 = &vi.iterations()[&1];
        assert_eq!(
            sweep1[&Coordinate::new(3, 2)],
            ValueIterationState::new(1., Action::Terminate)
        );
        assert_eq!(
            sweep1[&Coordinate::new(3, 1)],
            ValueIterationState::new(-1., Action::Terminate)
        );
        assert!(sweep1
            .iter()
            .filter(|(s, _)| s.x != 3 || s.y == 0)
            .all(|(_, v)| v.value == 0.));
    }

    #[test]
    fn second_sweep_sees_terminals_one_step_away() {
        let vi = &mut ValueIteration::new(book_grid(0., 0.9, 2));
        vi.run().unwrap();

        let sweep2 = &vi.iterations()[&2];
        let v22 = sweep2[&Coordinate::new(2, 2)];
        assert_eq!(v22.best_action, Action::E);
        assert_float_eq!(v22.value, 0.72, abs <= 1e-12);

        let v21 = sweep2[&Coordinate::new(2, 1)];
        assert_eq!(v21.best_action, Action::W);
        assert_float_eq!(v21.value, 0., abs <= 1e-12);
    }

    #[test]
    fn ties_go_to_first_action() {
        let vi = &mut ValueIteration::new(book_grid(0., 0.9, 1));
        vi.run().unwrap();

        assert_eq!(vi.pi_star(&Coordinate::new(0, 0)), Some(Action::N));
        assert_eq!(vi.v_star(&Coordinate::new(0, 0)), Some(0.));
    }

    #[test]
    fn snapshots_are_independent_of_later_sweeps() {
        let vi = &mut ValueIteration::new(book_grid(-0.04, 0.9, 30));
        vi.run().unwrap();

        let first = vi.iterations()[&1].clone();
        let last = &vi.iterations()[&30];
        assert_float_eq!(first[&Coordinate::new(0, 0)].value, -0.04, abs <= 1e-12);
        assert_ne!(first[&Coordinate::new(0, 0)], last[&Coordinate::new(0, 0)]);
        assert_eq!(last, vi.state_values());
    }

    #[test]
    fn q_star_matches_best_action() {
        let vi = &mut ValueIteration::new(book_grid(-0.04, 0.9, 50));
        vi.run().unwrap();

        let s = Coordinate::new(0, 0);
        let best = vi.pi_star(&s).unwrap();
        assert_float_eq!(
            vi.q_star(&s, best).unwrap(),
            vi.v_star(&s).unwrap(),
            abs <= 1e-6
        );
        assert_eq!(vi.action_values(&s).unwrap().len(), 4);
        assert_eq!(
            vi.action_values(&Coordinate::new(3, 2)).unwrap(),
            vec![ValueIterationState::new(1., Action::Terminate)]
        );
    }

    #[test]
    fn dump_lists_every_state() {
        let vi = &mut ValueIteration::new(book_grid(0., 0.9, 1));
        vi.run().unwrap();

        let dump = vi.to_string();
        assert_eq!(dump.lines().count(), 12);
        assert!(dump.contains("[ 3,2 ] : 1.00 | Best Action: Terminate"));
    }
}
