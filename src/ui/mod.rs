//! Plain text pictures of grid snapshots, north at the top.

use crate::common::defs::*;
use crate::envs::grid_world::Environment;

const CELL_WIDTH: usize = 12;

/// Draws every cell of `env` using `cell` for the label of states. Boulders are drawn as `#`,
/// terminal states get a `*` suffix and `highlight` is wrapped in brackets.
pub fn render_grid<F>(env: &Environment, highlight: Option<Coordinate>, cell: F) -> String
where
    F: Fn(&Coordinate) -> String,
{
    let mut out = String::new();
    let width = ((CELL_WIDTH + 1) * env.rows().max(0) as usize).saturating_sub(1);
    let border = format!("+{}+\n", "-".repeat(width));

    out.push_str(&border);
    for y in (0..env.cols()).rev() {
        out.push('|');
        for x in 0..env.rows() {
            let c = Coordinate::new(x, y);
            let mut label = if env.contains(&c) {
                cell(&c)
            } else {
                "#".repeat(CELL_WIDTH - 4)
            };
            if env.is_terminal(&c) {
                label.push('*');
            }
            if highlight == Some(c) {
                label = format!("[{label}]");
            }
            out.push_str(&format!("{label:^width$}|", width = CELL_WIDTH));
        }
        out.push('\n');
    }
    out.push_str(&border);

    out
}
