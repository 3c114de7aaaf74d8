use turtleworks_core::{
    AgentKind, AgentRef, BreedSpec, Context, Flow, Model, NullObserver, RandomSource, RunEnd,
    Scheduler, Value, World, WorldConfig, WorldError, WorldResult, WorldSnapshot,
};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| (*name).to_string()).collect()
}

fn torus_3x3(seed: u64) -> World {
    World::new(WorldConfig {
        rng_seed: Some(seed),
        ..WorldConfig::with_bounds(-1, 1, -1, 1)
    })
    .expect("world")
}

/// Random walkers that recolor the patch they stand on; stops after a fixed tick.
struct Walkers {
    population: usize,
    stop_at: u64,
}

impl Model for Walkers {
    fn name(&self) -> &str {
        "walkers"
    }

    fn setup(&mut self, ctx: &mut Context<'_>) -> WorldResult<()> {
        ctx.clear_all();
        let walkers = ctx.create_turtles(self.population)?;
        ctx.ask(&walkers, true, |ctx| {
            let x = ctx.random_xcor();
            let y = ctx.random_ycor();
            ctx.set_xy(x, y)?;
            let energy = ctx.random_near(10.0);
            ctx.set("energy", energy)
        })?;
        ctx.reset_ticks();
        Ok(())
    }

    fn go(&mut self, ctx: &mut Context<'_>) -> WorldResult<Flow> {
        if ctx.ticks()? >= self.stop_at {
            return Ok(Flow::Stop);
        }
        let all = ctx.turtles();
        ctx.ask(&all, true, |ctx| {
            let turn = ctx.random_int(90) - ctx.random_int(90);
            ctx.right(turn as f64)?;
            ctx.forward(1.0)?;
            let color = ctx.get("color")?;
            ctx.patch_set("pcolor", color)?;
            let energy = ctx.get_f64("energy")? - 1.0;
            if energy < 0.0 {
                ctx.die()
            } else {
                ctx.set("energy", energy)
            }
        })?;
        ctx.tick()?;
        Ok(Flow::Continue)
    }
}

fn run_walkers(seed: u64) -> Vec<WorldSnapshot> {
    let mut world = World::new(WorldConfig {
        rng_seed: Some(seed),
        turtles_own: names(&["energy"]),
        ..WorldConfig::with_bounds(-8, 8, -8, 8)
    })
    .expect("world");
    let mut model = Walkers {
        population: 40,
        stop_at: 12,
    };
    let mut history = Vec::new();
    let mut observer = |world: &World, _: &turtleworks_core::StepReport| {
        history.push(world.snapshot());
    };
    let summary = Scheduler::with_max_steps(100)
        .run(&mut world, &mut model, &mut observer)
        .expect("run");
    assert_eq!(summary.end, RunEnd::Stopped);
    assert_eq!(summary.ticks, Some(12));
    history
}

#[test]
fn same_seed_gives_identical_tick_by_tick_state() {
    let first = run_walkers(0x5EED);
    let second = run_walkers(0x5EED);
    assert_eq!(first.len(), 13);
    assert_eq!(first, second);
    assert_ne!(first, run_walkers(0x5EED + 1));
}

#[test]
fn ask_visits_each_snapshot_member_exactly_once() {
    let mut world = torus_3x3(1);
    world.create_turtles(6).expect("create");
    let mut ctx = Context::new(&mut world);
    let all = ctx.turtles();
    let mut visited = Vec::new();
    ctx.ask(&all, true, |ctx| {
        let me = ctx.self_agent()?;
        visited.push(me);
        // Hatched turtles join the world but not this traversal.
        ctx.hatch(2)?;
        Ok(())
    })
    .expect("ask");
    assert_eq!(visited.len(), 6);
    visited.sort_by_key(|agent| ctx.get_number(*agent, "who").map(|who| who as u64).ok());
    visited.dedup();
    assert_eq!(visited.len(), 6);
    assert_eq!(ctx.count_living(), 18);
}

#[test]
fn die_twice_matches_die_once() {
    let kill = |times: usize| {
        let mut world = torus_3x3(2);
        world.create_turtles(3).expect("create");
        let target = world.turtle_by_who(1).expect("turtle");
        let mut ctx = Context::new(&mut world);
        ctx.ask_agent(target.into(), |ctx| {
            for _ in 0..times {
                ctx.die()?;
            }
            Ok(())
        })
        .expect("ask");
        world.snapshot()
    };
    assert_eq!(kill(1), kill(2));
}

#[test]
fn ticks_count_from_reset() {
    let mut world = torus_3x3(3);
    assert_eq!(world.tick(), Err(WorldError::SchedulerNotStarted));
    world.reset_ticks();
    for _ in 0..7 {
        world.tick().expect("tick");
    }
    assert_eq!(world.ticks(), Ok(7));
    world.clear_all();
    assert_eq!(world.ticks(), Err(WorldError::SchedulerNotStarted));
}

#[test]
fn near_centers_on_its_argument() {
    let mut rng = RandomSource::from_seed(99);
    let samples = 20_000;
    let center = 6.0;
    let draws: Vec<f64> = (0..samples).map(|_| rng.near(center)).collect();
    let mean = draws.iter().sum::<f64>() / samples as f64;
    // Forty draws of U[0, c) over twenty: mean c, variance 40 * (c^2 / 12) / 400.
    assert!((mean - center).abs() < 0.05, "mean {mean}");
    let variance = draws.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / samples as f64;
    let expected = 40.0 * center * center / 12.0 / 400.0;
    assert!((variance - expected).abs() < expected * 0.1, "variance {variance}");
    assert!(draws.iter().all(|d| (0.0..2.0 * center).contains(d)));
}

#[test]
fn wrapped_patch_offsets_on_a_three_by_three_torus() {
    let world = torus_3x3(4);
    let origin = AgentRef::Patch(world.patch_at_coords(0, 0).expect("origin"));
    // Span 3: +2 is -1, +3 is back home.
    assert_eq!(world.patch_at(origin, 2.0, 0.0), Ok(world.patch_at_coords(-1, 0)));
    assert_eq!(world.patch_at(origin, 3.0, 0.0), Ok(world.patch_at_coords(0, 0)));
    assert_eq!(world.patch_at(origin, -4.0, 5.0), Ok(world.patch_at_coords(-1, -1)));
    let neighbors = world.neighbors(world.patch_at_coords(1, 1).expect("corner"));
    assert_eq!(neighbors.len(), 8);
    assert!(!neighbors.contains(world.patch_at_coords(1, 1).expect("corner").into()));
}

#[test]
fn killing_one_of_five_leaves_four() {
    let mut world = torus_3x3(5);
    let created = world.create_turtles(5).expect("create");
    assert_eq!(created.kind(), AgentKind::Turtle);
    let whos: Vec<f64> = created
        .iter()
        .map(|agent| world.get_number(*agent, "who").expect("who"))
        .collect();
    assert_eq!(whos, vec![0.0, 1.0, 2.0, 3.0, 4.0]);

    let two = world.turtle_by_who(2).expect("two");
    world.kill(two.into()).expect("kill");
    assert_eq!(world.count_living(), 4);

    let mut ctx = Context::new(&mut world);
    let all = ctx.turtles();
    let seen = ctx.of(&all, |ctx| ctx.get_f64("who")).expect("of");
    assert_eq!(seen, vec![0.0, 1.0, 3.0, 4.0]);
    // The stale set still names the dead turtle, but traversals skip it.
    let mut visits = 0;
    ctx.ask(&created, false, |_| {
        visits += 1;
        Ok(())
    })
    .expect("ask");
    assert_eq!(visits, 4);
}

#[test]
fn reading_an_unregistered_breed_variable_fails() {
    let mut world = World::new(WorldConfig {
        rng_seed: Some(6),
        breeds: vec![BreedSpec {
            name: "ball".into(),
            variables: names(&["speed"]),
            default_shape: None,
        }],
        ..WorldConfig::with_bounds(-1, 1, -1, 1)
    })
    .expect("world");
    let ball = world.spawn("ball", 1, None).expect("spawn").members()[0];
    assert_eq!(world.get(ball, "speed"), Ok(Value::zero()));
    let mut ctx = Context::new(&mut world);
    let result = ctx.of_agent(ball, |ctx| ctx.get("color2"));
    assert!(matches!(
        result,
        Err(WorldError::UnknownVariable { ref key, .. }) if key == "color2"
    ));
    assert_eq!(
        ctx.world_mut().register_breed("ball", &names(&["spin"]), None),
        Err(WorldError::DuplicateBreed("ball".into()))
    );
}

#[test]
fn nobody_cannot_be_dereferenced() {
    let mut world = torus_3x3(7);
    let mut ctx = Context::new(&mut world);
    let empty = ctx.turtles();
    let nobody = Value::from(ctx.one_of(&empty));
    assert!(nobody.is_nobody());
    assert_eq!(nobody.as_agent(), Err(WorldError::NobodyReference));
    assert_eq!(
        ctx.ask_value(&nobody, |_| Ok(())),
        Err(WorldError::NobodyReference)
    );
}

#[test]
fn snapshot_serializes_to_json() {
    let mut world = torus_3x3(8);
    world.create_turtles(2).expect("create");
    let a = world.turtle_by_who(0).expect("a");
    let b = world.turtle_by_who(1).expect("b");
    world.create_link_with(a, b).expect("link");
    world.reset_ticks();
    let json = serde_json::to_value(world.snapshot()).expect("json");
    assert_eq!(json["ticks"], 0);
    assert_eq!(json["turtles"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["patches"].as_array().map(Vec::len), Some(9));
    assert_eq!(json["links"][0]["end2"], 1);
    let mut summary_world = torus_3x3(9);
    struct Idle;
    impl Model for Idle {
        fn name(&self) -> &str {
            "idle"
        }
        fn setup(&mut self, ctx: &mut Context<'_>) -> WorldResult<()> {
            ctx.reset_ticks();
            Ok(())
        }
        fn go(&mut self, ctx: &mut Context<'_>) -> WorldResult<Flow> {
            ctx.tick()?;
            Ok(Flow::Continue)
        }
    }
    let summary = Scheduler::with_max_steps(3)
        .run(&mut summary_world, &mut Idle, &mut NullObserver)
        .expect("run");
    let text = serde_json::to_string(&summary).expect("summary json");
    assert!(text.contains("\"StepLimit\""));
}
