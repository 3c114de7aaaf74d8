//! Goal kicks from a kick line.
//!
//! Every patch on the kick line sprouts one ball per round, aimed somewhere
//! between east and south. Balls roll until they leave the field or cross the
//! goal mouth on the bottom edge, crediting the patch they started from. The
//! best start so far is compared with the start that sees the goal mouth under
//! the widest angle. Rows left of the kick line show a histogram of how often
//! each start has scored.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use turtleworks_core::{
    AgentSet, Context, Flow, Model, PatchId, Value, World, WorldConfig, WorldResult, TURTLES,
};

const FIELD_EDGE_COLOR: f64 = 15.0;
const GOAL_COLOR: f64 = 55.0;
const KICK_LINE_COLOR: f64 = 45.0;
const ANALYTIC_COLOR: f64 = 125.0;
const BALL_COLOR: f64 = 25.0;
const BEST_BAR_COLOR: f64 = 45.0;
const BAR_COLOR: f64 = 105.0;

const INTERFACE_GLOBALS: [&str; 4] = ["kick-line", "goal-size", "goal-pos", "show-level-curves?"];
const GLOBALS: [&str; 13] = [
    "kick-line",
    "goal-size",
    "goal-pos",
    "show-level-curves?",
    "current-max",
    "col",
    "ang",
    "best-dist",
    "analytic",
    "try-line",
    "histogram-area",
    "kicks",
    "goals",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KicksParams {
    /// Column the balls are kicked from.
    pub kick_line: i32,
    /// Width of the goal mouth in patches.
    pub goal_size: i32,
    /// Leftmost column of the goal mouth.
    pub goal_pos: i32,
    /// Shade the field by the angle each patch sees the goal under.
    pub show_level_curves: bool,
}

impl Default for KicksParams {
    fn default() -> Self {
        Self {
            kick_line: 20,
            goal_size: 11,
            goal_pos: 40,
            show_level_curves: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KicksReport {
    pub rounds: u64,
    pub kicks: f64,
    pub goals: f64,
    /// Row of the most successful start, once any goal was scored.
    pub best_start: Option<f64>,
    /// Row that sees the goal mouth under the widest angle.
    pub analytic: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct Kicks {
    params: KicksParams,
}

impl Kicks {
    #[must_use]
    pub const fn new(params: KicksParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub const fn params(&self) -> &KicksParams {
        &self.params
    }

    /// A bounded 61x81 field.
    #[must_use]
    pub fn world_config(seed: Option<u64>) -> WorldConfig {
        WorldConfig {
            wrap_x: false,
            wrap_y: false,
            patch_size: 6.0,
            rng_seed: seed,
            globals: owned(&GLOBALS),
            interface_globals: owned(&INTERFACE_GLOBALS),
            turtles_own: owned(&["start-patch"]),
            patches_own: owned(&["score", "left-angle", "right-angle", "goal-angle"]),
            ..WorldConfig::with_bounds(0, 60, 0, 80)
        }
    }

    pub fn report(&self, world: &World) -> WorldResult<KicksReport> {
        let best = world.global("best-dist")?.as_number()?;
        let analytic = match world.global("analytic")? {
            Value::Number(row) => Some(*row),
            _ => None,
        };
        Ok(KicksReport {
            rounds: world.ticks().unwrap_or(0),
            kicks: world.global("kicks")?.as_number()?,
            goals: world.global("goals")?.as_number()?,
            best_start: (best >= 0.0).then_some(best),
            analytic,
        })
    }
}

impl Model for Kicks {
    fn name(&self) -> &str {
        "kicks"
    }

    fn setup(&mut self, ctx: &mut Context<'_>) -> WorldResult<()> {
        ctx.clear_all();
        let params = &self.params;
        ctx.set_global("kick-line", f64::from(params.kick_line))?;
        ctx.set_global("goal-size", f64::from(params.goal_size))?;
        ctx.set_global("goal-pos", f64::from(params.goal_pos))?;
        ctx.set_global("show-level-curves?", params.show_level_curves)?;

        setup_field(ctx, params)?;
        ctx.set_default_shape(TURTLES, "circle")?;
        kick_balls(ctx)?;
        ctx.set_global("current-max", 0.0)?;
        ctx.set_global("best-dist", -1.0)?;
        ctx.set_global("kicks", 0.0)?;
        ctx.set_global("goals", 0.0)?;
        ctx.set_global("analytic", Value::Nobody)?;
        find_analytic_solution(ctx, params)?;
        if params.show_level_curves {
            draw_level_curves(ctx, params)?;
        }
        ctx.reset_ticks();
        Ok(())
    }

    fn go(&mut self, ctx: &mut Context<'_>) -> WorldResult<Flow> {
        loop {
            let balls = ctx.turtles();
            if balls.is_empty() {
                break;
            }
            ctx.ask(&balls, true, roll)?;
        }

        let try_line = try_line(ctx)?;
        let kicks = ctx.global("kicks")?.as_number()? + try_line.len() as f64;
        ctx.set_global("kicks", kicks)?;
        let scores = ctx.of(&try_line, |ctx| ctx.get_f64("score"))?;
        let goals: f64 = scores.iter().sum();
        ctx.set_global("goals", goals)?;
        let current_max = scores.iter().copied().fold(0.0, f64::max);
        ctx.set_global("current-max", current_max)?;
        if current_max == 0.0 {
            let area = histogram_area(ctx)?;
            ctx.ask(&area, true, |ctx| ctx.set("pcolor", 0.0))?;
            info!(kicks, "no goals scored");
            return Ok(Flow::Stop);
        }

        mark_best_starts(ctx, current_max)?;
        plot_scores(ctx, current_max)?;
        kick_balls(ctx)?;
        let round = ctx.tick()?;
        debug!(round, kicks, goals, "kicks round finished");
        Ok(Flow::Continue)
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

fn try_line(ctx: &Context<'_>) -> WorldResult<AgentSet> {
    Ok(ctx.global("try-line")?.as_set()?.clone())
}

fn histogram_area(ctx: &Context<'_>) -> WorldResult<AgentSet> {
    Ok(ctx.global("histogram-area")?.as_set()?.clone())
}

fn setup_field(ctx: &mut Context<'_>, params: &KicksParams) -> WorldResult<()> {
    let bottom = f64::from(ctx.topology().min_pycor());
    let goal_from = f64::from(params.goal_pos);
    let goal_to = f64::from(params.goal_pos + params.goal_size);
    let patches = ctx.patches();
    ctx.ask(&patches, true, |ctx| {
        if ctx.neighbors()?.len() != 8 {
            ctx.set("pcolor", FIELD_EDGE_COLOR)?;
        }
        let pxcor = ctx.get_f64("pxcor")?;
        if ctx.get_f64("pycor")? == bottom && pxcor >= goal_from && pxcor < goal_to {
            ctx.set("pcolor", GOAL_COLOR)?;
        }
        Ok(())
    })?;

    let kick_line = f64::from(params.kick_line);
    let try_line = ctx.with(&patches, |ctx| {
        Ok(ctx.get_f64("pxcor")? == kick_line && ctx.get_f64("pcolor")? == 0.0)
    })?;
    ctx.ask(&try_line, true, |ctx| ctx.set("pcolor", KICK_LINE_COLOR))?;
    ctx.set_global("try-line", try_line)?;

    let area = ctx.with(&patches, |ctx| {
        Ok(ctx.get_f64("pxcor")? < kick_line && ctx.get_f64("pcolor")? == 0.0)
    })?;
    ctx.set_global("histogram-area", area)
}

/// One ball per kick-line patch, heading between east and south.
fn kick_balls(ctx: &mut Context<'_>) -> WorldResult<()> {
    let try_line = try_line(ctx)?;
    ctx.ask(&try_line, true, |ctx| {
        let balls = ctx.sprout(TURTLES, 1)?;
        ctx.ask(&balls, true, |ctx| {
            ctx.set("color", BALL_COLOR)?;
            let start = ctx.patch_here()?;
            ctx.set("start-patch", start)?;
            let heading = ctx.random_float(90.0) + 90.0;
            ctx.set_heading(heading)
        })
    })?;
    Ok(())
}

/// Advance one patch, dying on the field edge or in the goal.
///
/// Both the patch the ball crosses into next and the patch one step ahead are
/// checked, so a ball that clips the corner of a goal or edge patch is caught.
pub fn roll(ctx: &mut Context<'_>) -> WorldResult<()> {
    let max_pxcor = f64::from(ctx.topology().max_pxcor());
    let min_pycor = f64::from(ctx.topology().min_pycor());
    if ctx.get_f64("pxcor")? >= max_pxcor - 1.0 || ctx.get_f64("pycor")? >= min_pycor + 1.0 {
        let next = next_patch(ctx)?;
        if check_patch(ctx, next)? {
            return Ok(());
        }
        let ahead = ctx.patch_ahead(1.0)?;
        if check_patch(ctx, ahead)? {
            return Ok(());
        }
    }
    ctx.forward(1.0)?;
    Ok(())
}

/// The side neighbor a ball leaves its patch through, found by comparing its
/// heading with the directions of the four patch corners.
pub fn next_patch(ctx: &Context<'_>) -> WorldResult<Option<PatchId>> {
    let heading = ctx.get_f64("heading")?;
    let pxcor = ctx.get_f64("pxcor")?;
    let pycor = ctx.get_f64("pycor")?;
    let exits = [
        ((0.5, 0.5), (0.0, 1.0)),
        ((0.5, -0.5), (1.0, 0.0)),
        ((-0.5, -0.5), (0.0, -1.0)),
        ((-0.5, 0.5), (-1.0, 0.0)),
    ];
    for ((cx, cy), (dx, dy)) in exits {
        if heading < ctx.towards_xy(pxcor + cx, pycor + cy)? {
            return ctx.patch_at(dx, dy);
        }
    }
    ctx.patch_at(0.0, 1.0)
}

/// Kill the ball if `patch` is off the field, on its edge, or in the goal.
/// Goals credit the ball's start. Returns whether the ball died.
fn check_patch(ctx: &mut Context<'_>, patch: Option<PatchId>) -> WorldResult<bool> {
    let color = match patch {
        Some(patch) => ctx.get_number(patch.into(), "pcolor")?,
        None => FIELD_EDGE_COLOR,
    };
    if color == GOAL_COLOR {
        let start = ctx.get("start-patch")?;
        ctx.ask_value(&start, |ctx| {
            let score = ctx.get_f64("score")? + 1.0;
            ctx.set("score", score)
        })?;
    } else if color != FIELD_EDGE_COLOR {
        return Ok(false);
    }
    ctx.die()?;
    Ok(true)
}

/// Label the best-scoring starts two patches to their right.
fn mark_best_starts(ctx: &mut Context<'_>, current_max: f64) -> WorldResult<()> {
    let try_line = try_line(ctx)?;
    ctx.ask(&try_line, true, |ctx| {
        let label = if ctx.get_f64("score")? == current_max {
            let row = ctx.get_f64("pycor")?;
            ctx.set_global("best-dist", row)?;
            Value::from(row)
        } else if ctx.get_f64("pcolor")? != ANALYTIC_COLOR {
            Value::from("")
        } else {
            return Ok(());
        };
        if let Some(target) = ctx.patch_at(2.0, 0.0)? {
            ctx.ask_agent(target.into(), |ctx| ctx.set("plabel", label.clone()))?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Bars left of the kick line, one row per start, as long as the start's share
/// of the best score. The best starts' bars are highlighted.
fn plot_scores(ctx: &mut Context<'_>, current_max: f64) -> WorldResult<()> {
    let kick_line = ctx.global("kick-line")?.as_number()?;
    let span = kick_line - f64::from(ctx.topology().min_pxcor());
    let area = histogram_area(ctx)?;
    ctx.ask(&area, true, |ctx| {
        let pxcor = ctx.get_f64("pxcor")?;
        let score = match ctx.patch_at(kick_line - pxcor, 0.0)? {
            Some(start) => ctx.get_number(start.into(), "score")?,
            None => 0.0,
        };
        let color = if pxcor > kick_line - score * span / current_max {
            if score == current_max {
                BEST_BAR_COLOR
            } else {
                BAR_COLOR
            }
        } else {
            0.0
        };
        ctx.set("pcolor", color)
    })?;
    Ok(())
}

fn find_analytic_solution(ctx: &mut Context<'_>, params: &KicksParams) -> WorldResult<()> {
    let bottom = f64::from(ctx.topology().min_pycor());
    let left_post = f64::from(params.goal_pos) - 0.5;
    let right_post = f64::from(params.goal_pos + params.goal_size) - 0.5;
    let patches = ctx.patches();
    let above = ctx.with(&patches, |ctx| Ok(ctx.get_f64("pycor")? > bottom))?;
    ctx.ask(&above, true, |ctx| {
        let left = ctx.towards_xy(left_post, bottom + 0.5)?;
        let right = ctx.towards_xy(right_post, bottom + 0.5)?;
        ctx.set("left-angle", left)?;
        ctx.set("right-angle", right)?;
        ctx.set("goal-angle", (right - left).rem_euclid(360.0))
    })?;

    let try_line = try_line(ctx)?;
    let Some(winner) = ctx.min_one_of(&try_line, |ctx| ctx.get_f64("goal-angle"))? else {
        return Ok(());
    };
    ctx.ask_agent(winner, |ctx| {
        ctx.set("pcolor", ANALYTIC_COLOR)?;
        let row = ctx.get_f64("pycor")?;
        if let Some(target) = ctx.patch_at(2.0, 0.0)? {
            ctx.ask_agent(target.into(), |ctx| ctx.set("plabel", row))?;
        }
        Ok(())
    })?;
    let row = ctx.get_number(winner, "pycor")?;
    ctx.set_global("analytic", row)
}

fn draw_level_curves(ctx: &mut Context<'_>, params: &KicksParams) -> WorldResult<()> {
    let kick_line = f64::from(params.kick_line);
    let patches = ctx.patches();
    let field = ctx.with(&patches, |ctx| {
        Ok(ctx.get_f64("pxcor")? > kick_line && ctx.get_f64("pcolor")? < 10.0)
    })?;
    ctx.ask(&field, true, |ctx| {
        let angle = ctx.get_f64("goal-angle")?;
        if angle > 270.0 {
            ctx.set("pcolor", (360.0 - angle.rem_euclid(10.0)) * 0.8)?;
        }
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_up(params: KicksParams, seed: u64) -> (World, Kicks) {
        let mut world = World::new(Kicks::world_config(Some(seed))).expect("world");
        let mut model = Kicks::new(params);
        model
            .setup(&mut Context::new(&mut world))
            .expect("setup");
        (world, model)
    }

    #[test]
    fn setup_paints_the_field_and_kicks_one_ball_per_start() {
        let (world, _) = set_up(KicksParams::default(), 21);
        let try_line = world.global("try-line").expect("try-line").as_set().expect("set").clone();
        // Column 20 minus the two edge rows.
        assert_eq!(try_line.len(), 79);
        assert_eq!(world.count_living(), 79);
        let goal = world.patch_at_coords(45, 0).expect("goal patch");
        assert_eq!(world.get_number(goal.into(), "pcolor"), Ok(GOAL_COLOR));
        let corner = world.patch_at_coords(0, 0).expect("corner");
        assert_eq!(world.get_number(corner.into(), "pcolor"), Ok(FIELD_EDGE_COLOR));
        for ball in &world.turtles() {
            let heading = world.get_number(*ball, "heading").expect("heading");
            assert!((90.0..180.0).contains(&heading));
            let start = world.get(*ball, "start-patch").expect("start").as_agent().expect("agent");
            assert!(try_line.contains(start));
        }
    }

    #[test]
    fn widest_angle_start_sits_above_the_goal_side() {
        let (world, model) = set_up(KicksParams::default(), 22);
        let report = model.report(&world).expect("report");
        let row = report.analytic.expect("analytic row");
        assert!(row > 0.0 && row < 80.0);
        let winner = world.patch_at_coords(20, row as i32).expect("winner");
        assert_eq!(world.get_number(winner.into(), "pcolor"), Ok(ANALYTIC_COLOR));
        assert_eq!(report.best_start, None);
    }

    #[test]
    fn a_round_rolls_every_ball_out_and_scores_goals() {
        let (mut world, mut model) = set_up(KicksParams::default(), 23);
        let flow = model.go(&mut Context::new(&mut world)).expect("go");
        let report = model.report(&world).expect("report");
        assert_eq!(report.kicks, 79.0);
        assert!(report.goals > 0.0, "some of 79 kicks should score");
        assert_eq!(flow, Flow::Continue);
        assert_eq!(report.rounds, 1);
        let best = report.best_start.expect("best start") as i32;
        // The best start's bar spans the whole histogram.
        for pxcor in [1, 19] {
            let bar = world.patch_at_coords(pxcor, best).expect("bar");
            assert_eq!(world.get_number(bar.into(), "pcolor"), Ok(BEST_BAR_COLOR));
        }
        // The next round has been kicked off.
        assert_eq!(world.count_living(), 79);
    }

    #[test]
    fn next_patch_follows_the_corner_the_heading_passes() {
        let (mut world, _) = set_up(KicksParams::default(), 25);
        world.clear_turtles();
        let ball = world.create_turtles(1).expect("create").members()[0];
        let mut ctx = Context::new(&mut world);
        let mut exits = Vec::new();
        for heading in [10.0, 100.0, 200.0, 250.0, 350.0] {
            ctx.ask_agent(ball, |ctx| {
                ctx.set_xy(30.2, 30.1)?;
                ctx.set_heading(heading)?;
                exits.push(next_patch(ctx)?);
                Ok(())
            })
            .expect("ask");
        }
        let at = |x, y| ctx.patch_at_coords(x, y);
        assert_eq!(
            exits,
            vec![at(30, 31), at(31, 30), at(30, 29), at(29, 30), at(30, 31)]
        );
    }

    #[test]
    fn a_goal_out_of_reach_stops_the_run() {
        let params = KicksParams {
            goal_pos: 0,
            goal_size: 1,
            ..KicksParams::default()
        };
        let (mut world, mut model) = set_up(params, 24);
        let flow = model.go(&mut Context::new(&mut world)).expect("go");
        assert_eq!(flow, Flow::Stop);
        assert_eq!(world.count_living(), 0);
        let area = world.global("histogram-area").expect("area").as_set().expect("set").clone();
        assert_eq!(area.len(), 19 * 79);
        for patch in &area {
            assert_eq!(world.get_number(*patch, "pcolor"), Ok(0.0));
        }
        assert_eq!(model.report(&world).expect("report").goals, 0.0);
    }
}
