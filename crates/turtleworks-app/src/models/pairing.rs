//! Random walkers that pair up with a neighbor, pass a carried condition to
//! their partner, and separate again.
//!
//! Each walker is either a "righty" or a "lefty". An unpaired righty looks one
//! patch to its left for an unpaired lefty and couples with it; couples sit
//! still until either partner has stayed longer than its commitment. While
//! coupled, a carrier may pass the condition on. Carriers learn of it through
//! testing or, eventually, symptoms. The run stops once every walker knows.

use serde::{Deserialize, Serialize};
use tracing::debug;
use turtleworks_core::{Context, Flow, Model, Value, World, WorldConfig, WorldResult};

const RIGHTY: &str = "person righty";
const LEFTY: &str = "person lefty";

const HEALTHY_COLOR: f64 = 55.0;
const KNOWN_COLOR: f64 = 15.0;
const UNKNOWN_COLOR: f64 = 105.0;
const COUPLED_PATCH_COLOR: f64 = 2.0;
const PLAIN_PATCH_COLOR: f64 = 0.0;

/// Fraction of the population that starts out carrying the condition.
const INITIAL_CARRIER_FRACTION: f64 = 0.025;
/// Percent chance per tick of noticing symptoms once they can show.
const SYMPTOM_CHANCE: f64 = 5.0;

const GLOBALS: [&str; 2] = ["transmission-chance", "symptoms-show"];
const TURTLES_OWN: [&str; 10] = [
    "carrier?",
    "known?",
    "carrier-length",
    "coupled?",
    "couple-length",
    "commitment",
    "coupling-tendency",
    "protection",
    "test-frequency",
    "partner",
];

/// Population averages; each walker draws its own values near these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingParams {
    pub initial_people: usize,
    /// Ticks a walker stays coupled, on average.
    pub average_commitment: f64,
    /// Out of ten: how eagerly walkers couple.
    pub average_coupling_tendency: f64,
    /// Out of ten: how often a coupled walker blocks transmission.
    pub average_protection: f64,
    /// Tests per year (52 ticks).
    pub average_test_frequency: f64,
    /// Percent chance an unprotected contact transmits.
    pub transmission_chance: f64,
    /// Ticks of carrying after which symptoms may show.
    pub symptoms_show: f64,
}

impl Default for PairingParams {
    fn default() -> Self {
        Self {
            initial_people: 300,
            average_commitment: 50.0,
            average_coupling_tendency: 5.0,
            average_protection: 0.0,
            average_test_frequency: 0.0,
            transmission_chance: 50.0,
            symptoms_show: 200.0,
        }
    }
}

/// Population counts at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingReport {
    pub people: usize,
    pub carriers: usize,
    pub known: usize,
    pub couples: usize,
    pub percent_carriers: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Pairing {
    params: PairingParams,
}

impl Pairing {
    #[must_use]
    pub const fn new(params: PairingParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub const fn params(&self) -> &PairingParams {
        &self.params
    }

    /// A 25x25 torus with the walker variables declared.
    #[must_use]
    pub fn world_config(seed: Option<u64>) -> WorldConfig {
        WorldConfig {
            rng_seed: seed,
            patch_size: 17.0,
            globals: GLOBALS.iter().map(|name| (*name).to_string()).collect(),
            turtles_own: TURTLES_OWN.iter().map(|name| (*name).to_string()).collect(),
            ..WorldConfig::with_bounds(-12, 12, -12, 12)
        }
    }

    pub fn report(&self, world: &World) -> WorldResult<PairingReport> {
        let people = world.turtles();
        let mut carriers = 0;
        let mut known = 0;
        for agent in &people {
            if world.get(*agent, "carrier?")?.as_bool()? {
                carriers += 1;
            }
            if world.get(*agent, "known?")?.as_bool()? {
                known += 1;
            }
        }
        let percent_carriers = if people.is_empty() {
            0.0
        } else {
            carriers as f64 / people.len() as f64 * 100.0
        };
        Ok(PairingReport {
            people: people.len(),
            carriers,
            known,
            couples: world.count_links(),
            percent_carriers,
        })
    }
}

impl Model for Pairing {
    fn name(&self) -> &str {
        "pairing"
    }

    fn setup(&mut self, ctx: &mut Context<'_>) -> WorldResult<()> {
        ctx.clear_all();
        let params = &self.params;
        ctx.set_global("transmission-chance", params.transmission_chance)?;
        ctx.set_global("symptoms-show", params.symptoms_show)?;

        let seeded = params.initial_people as f64 * INITIAL_CARRIER_FRACTION;
        let people = ctx.create_turtles(params.initial_people)?;
        ctx.ask(&people, true, |ctx| {
            let x = ctx.random_xcor();
            let y = ctx.random_ycor();
            ctx.set_xy(x, y)?;
            ctx.set("known?", false)?;
            ctx.set("coupled?", false)?;
            ctx.set("partner", Value::Nobody)?;
            let shape = if ctx.random_int(2) == 0 { RIGHTY } else { LEFTY };
            ctx.set("shape", shape)?;

            let carrier = ctx.get_f64("who")? < seeded;
            ctx.set("carrier?", carrier)?;
            if carrier {
                let length = ctx.random_float(params.symptoms_show);
                ctx.set("carrier-length", length)?;
            }
            for (name, average) in [
                ("commitment", params.average_commitment),
                ("coupling-tendency", params.average_coupling_tendency),
                ("protection", params.average_protection),
                ("test-frequency", params.average_test_frequency),
            ] {
                let drawn = ctx.random_near(average);
                ctx.set(name, drawn)?;
            }
            assign_color(ctx)
        })?;
        debug!(people = people.len(), "pairing population placed");
        ctx.reset_ticks();
        Ok(())
    }

    fn go(&mut self, ctx: &mut Context<'_>) -> WorldResult<Flow> {
        let people = ctx.turtles();
        if ctx.all(&people, |ctx| flag(ctx, "known?"))? {
            return Ok(Flow::Stop);
        }

        ctx.ask(&people, true, |ctx| {
            if flag(ctx, "carrier?")? {
                increment(ctx, "carrier-length")?;
            }
            if flag(ctx, "coupled?")? {
                increment(ctx, "couple-length")?;
            }
            Ok(())
        })?;
        ctx.ask(&people, true, |ctx| {
            if !flag(ctx, "coupled?")? {
                let turn = ctx.random_float(360.0);
                ctx.right(turn)?;
                ctx.forward(1.0)?;
            }
            Ok(())
        })?;
        ctx.ask(&people, true, |ctx| {
            if flag(ctx, "coupled?")? || !has_shape(ctx, RIGHTY)? {
                return Ok(());
            }
            let own_tendency = ctx.get_f64("coupling-tendency")?;
            if ctx.random_float(10.0) < own_tendency {
                couple(ctx)?;
            }
            Ok(())
        })?;
        ctx.ask(&people, true, uncouple)?;
        ctx.ask(&people, true, transmit)?;
        ctx.ask(&people, true, test)?;
        ctx.ask(&people, true, assign_color)?;
        ctx.tick()?;
        Ok(Flow::Continue)
    }
}

fn flag(ctx: &Context<'_>, name: &str) -> WorldResult<bool> {
    ctx.get(name)?.as_bool()
}

fn has_shape(ctx: &Context<'_>, shape: &str) -> WorldResult<bool> {
    Ok(ctx.get("shape")?.as_str()? == shape)
}

fn increment(ctx: &mut Context<'_>, name: &str) -> WorldResult<()> {
    let next = ctx.get_f64(name)? + 1.0;
    ctx.set(name, next)
}

fn assign_color(ctx: &mut Context<'_>) -> WorldResult<()> {
    let color = if !flag(ctx, "carrier?")? {
        HEALTHY_COLOR
    } else if flag(ctx, "known?")? {
        KNOWN_COLOR
    } else {
        UNKNOWN_COLOR
    };
    ctx.set("color", color)
}

fn paint_couple_patches(ctx: &mut Context<'_>, color: f64) -> WorldResult<()> {
    ctx.patch_set("pcolor", color)?;
    if let Some(left) = ctx.patch_at(-1.0, 0.0)? {
        ctx.ask_agent(left.into(), |ctx| ctx.set("pcolor", color))?;
    }
    Ok(())
}

/// Pair `self` with an unpaired lefty one patch to the left, if one agrees.
fn couple(ctx: &mut Context<'_>) -> WorldResult<()> {
    let left = ctx.turtles_at(-1.0, 0.0)?;
    let candidates = ctx.with(&left, |ctx| Ok(!flag(ctx, "coupled?")? && has_shape(ctx, LEFTY)?))?;
    let Some(partner) = ctx.one_of(&candidates) else {
        return Ok(());
    };
    let their_tendency = ctx.of_agent(partner, |ctx| ctx.get_f64("coupling-tendency"))?;
    if ctx.random_float(10.0) >= their_tendency {
        return Ok(());
    }

    ctx.set("partner", partner)?;
    ctx.set("coupled?", true)?;
    ctx.ask_agent(partner, |ctx| {
        ctx.set("coupled?", true)?;
        let asker = ctx.myself()?;
        ctx.set("partner", asker)
    })?;
    let here = ctx.patch_here()?;
    ctx.move_to(here.into())?;
    ctx.ask_agent(partner, |ctx| {
        let here = ctx.patch_here()?;
        ctx.move_to(here.into())
    })?;
    paint_couple_patches(ctx, COUPLED_PATCH_COLOR)?;
    if let Some(other) = partner.as_turtle() {
        ctx.create_link_with(other)?;
    }
    Ok(())
}

/// A righty ends the couple once either side has outstayed its commitment.
fn uncouple(ctx: &mut Context<'_>) -> WorldResult<()> {
    if !flag(ctx, "coupled?")? || !has_shape(ctx, RIGHTY)? {
        return Ok(());
    }
    let partner = ctx.get("partner")?.as_agent()?;
    if !restless(ctx)? && !ctx.of_agent(partner, restless)? {
        return Ok(());
    }

    ctx.set("coupled?", false)?;
    ctx.set("couple-length", 0.0)?;
    paint_couple_patches(ctx, PLAIN_PATCH_COLOR)?;
    let me = ctx.self_agent()?.as_turtle();
    if let (Some(me), Some(them)) = (me, partner.as_turtle()) {
        if let Some(link) = ctx.link_between(me, them) {
            ctx.kill(link.into())?;
        }
    }
    ctx.ask_agent(partner, |ctx| {
        ctx.set("couple-length", 0.0)?;
        ctx.set("partner", Value::Nobody)?;
        ctx.set("coupled?", false)
    })?;
    ctx.set("partner", Value::Nobody)
}

fn restless(ctx: &mut Context<'_>) -> WorldResult<bool> {
    Ok(ctx.get_f64("couple-length")? > ctx.get_f64("commitment")?)
}

/// An unaware carrier may pass the condition to its partner.
fn transmit(ctx: &mut Context<'_>) -> WorldResult<()> {
    if !flag(ctx, "coupled?")? || !flag(ctx, "carrier?")? || flag(ctx, "known?")? {
        return Ok(());
    }
    let partner = ctx.get("partner")?.as_agent()?;
    let own_protection = ctx.get_f64("protection")?;
    let their_protection = ctx.of_agent(partner, |ctx| ctx.get_f64("protection"))?;
    let exposed = ctx.random_float(11.0) > own_protection
        || ctx.random_float(11.0) > their_protection;
    if !exposed {
        return Ok(());
    }
    let chance = ctx.global("transmission-chance")?.as_number()?;
    if ctx.random_float(100.0) < chance {
        ctx.ask_agent(partner, |ctx| ctx.set("carrier?", true))?;
    }
    Ok(())
}

fn test(ctx: &mut Context<'_>) -> WorldResult<()> {
    let frequency = ctx.get_f64("test-frequency")?;
    if ctx.random_float(52.0) < frequency && flag(ctx, "carrier?")? {
        ctx.set("known?", true)?;
    }
    let symptoms_show = ctx.global("symptoms-show")?.as_number()?;
    if ctx.get_f64("carrier-length")? > symptoms_show && ctx.random_float(100.0) < SYMPTOM_CHANCE {
        ctx.set("known?", true)?;
    }
    Ok(())
}
