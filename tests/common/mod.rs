use gridworld::*;
use std::sync::Arc;

/// The 4x3 grid of Russell & Norvig, chapter 17: +1 at (3,2), -1 at (3,1), boulder at (1,1).
#[allow(dead_code)]
pub fn book_grid() -> GridConfig {
    GridConfig::from_json_str(
        r#"{
            "x": 4, "y": 3,
            "Terminal": [[3, 2, 1.0], [3, 1, -1.0]],
            "Boulder": [[1, 1]],
            "RobotStartState": [0, 0],
            "Discount": 1.0, "Noise": 0.2, "TransitionCost": -0.04,
            "Alpha": 0.5, "Episodes": 50, "K": 100
        }"#,
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn environment(config: GridConfig, family: AgentFamily) -> Arc<Environment> {
    Arc::new(Environment::new(&config.prepared_for(family)).unwrap())
}

#[allow(dead_code)]
pub fn query(x: Discrete, y: Discrete, step: usize, family: AgentFamily, t: QueryType) -> Query {
    Query::new(x, y, step, family, t).unwrap()
}

#[allow(dead_code)]
pub fn answer_of(
    solver: &Solver,
    x: Discrete,
    y: Discrete,
    step: usize,
    t: QueryType,
) -> Option<String> {
    solver
        .queries()
        .into_iter()
        .find(|q| {
            q.coordinate() == Coordinate::new(x, y) && q.step() == step && q.query_type() == t
        })
        .and_then(|q| q.answer().map(str::to_string))
}
