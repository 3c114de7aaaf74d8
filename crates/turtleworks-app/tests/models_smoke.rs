use std::process::Command;

use turtleworks_app::models::kicks::{self, Kicks, KicksParams};
use turtleworks_app::{run_demo, Demo, ModelKind, ModelReport, RunOutcome};
use turtleworks_core::{Context, Model, NullObserver, RunEnd, World};

#[test]
fn pairing_run_is_reproducible_from_its_seed() {
    let run = |seed| {
        let mut demo = Demo::new(ModelKind::Pairing);
        run_demo(&mut demo, Some(seed), 40, &mut NullObserver)
            .expect("run")
            .1
    };
    let first = run(7);
    assert_eq!(first, run(7));
    assert_eq!(first.summary.seed, 7);
    assert_eq!(first.summary.end, RunEnd::StepLimit);
    assert_eq!(first.summary.ticks, Some(40));
    match first.report {
        ModelReport::Pairing(report) => assert_eq!(report.people, 300),
        other => panic!("unexpected report {other:?}"),
    }
}

#[test]
fn kicks_run_reports_goals() {
    let mut demo = Demo::new(ModelKind::Kicks);
    let (world, outcome) = run_demo(&mut demo, Some(3), 3, &mut NullObserver).expect("run");
    let ModelReport::Kicks(report) = outcome.report else {
        panic!("expected a kicks report");
    };
    assert_eq!(report.kicks, 79.0 * outcome.summary.steps as f64);
    assert!(report.analytic.is_some());
    assert_eq!(world.count_living(), outcome.summary.turtles);
}

#[test]
fn ball_clipping_the_goal_corner_scores() {
    let mut world = World::new(Kicks::world_config(Some(9))).expect("world");
    let mut model = Kicks::new(KicksParams::default());
    model.setup(&mut Context::new(&mut world)).expect("setup");
    world.clear_turtles();
    let start = world.patch_at_coords(20, 40).expect("start");
    let ball = world.create_turtles(1).expect("create").members()[0];

    let mut ctx = Context::new(&mut world);
    // Heading down and right from the last goal column: the ball crosses into
    // the goal patch below before the edge patch one step ahead.
    ctx.ask_agent(ball, |ctx| {
        ctx.set_xy(50.3, 0.6)?;
        ctx.set_heading(120.0)?;
        ctx.set("start-patch", start)
    })
    .expect("place ball");
    ctx.ask_agent(ball, kicks::roll).expect("roll");

    assert_eq!(world.count_living(), 0);
    assert_eq!(world.get_number(start.into(), "score"), Ok(1.0));
    let goal = world.patch_at_coords(50, 0).expect("goal");
    assert_eq!(world.get_number(goal.into(), "pcolor"), Ok(55.0));
    let ahead = world.patch_at_coords(51, 0).expect("edge");
    assert_eq!(world.get_number(ahead.into(), "pcolor"), Ok(15.0));
}

#[test]
fn binary_prints_json_summary() {
    let bin = env!("CARGO_BIN_EXE_turtleworks");
    let output = Command::new(bin)
        .args(["run", "--model", "kicks", "--seed", "5", "--max-steps", "2", "--json"])
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run turtleworks binary");
    assert!(output.status.success(), "turtleworks run failed");
    let outcome: RunOutcome = serde_json::from_slice(&output.stdout).expect("json outcome");
    assert_eq!(outcome.summary.model, "kicks");
    assert_eq!(outcome.summary.seed, 5);
    assert!(matches!(outcome.report, ModelReport::Kicks(_)));
}
