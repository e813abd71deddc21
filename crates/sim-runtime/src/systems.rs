//! ECS wiring of the period pipeline.

use crate::pipeline::{self, PeriodLedger};
use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use sim_core::SimulationState;

/// The simulation state held as a world resource.
#[derive(Resource)]
pub struct Sim(pub SimulationState);

pub fn apply_decisions(mut sim: ResMut<Sim>, mut ledger: ResMut<PeriodLedger>) {
    pipeline::apply_decisions(&mut sim.0, &mut ledger);
}

pub fn run_lifecycle(mut sim: ResMut<Sim>, mut ledger: ResMut<PeriodLedger>) {
    pipeline::run_lifecycle(&mut sim.0, &mut ledger);
}

pub fn run_production(mut sim: ResMut<Sim>, mut ledger: ResMut<PeriodLedger>) {
    pipeline::run_production(&mut sim.0, &mut ledger);
}

pub fn clear_markets(mut sim: ResMut<Sim>, mut ledger: ResMut<PeriodLedger>) {
    pipeline::clear_markets(&mut sim.0, &mut ledger);
}

pub fn settle_finances(mut sim: ResMut<Sim>, mut ledger: ResMut<PeriodLedger>) {
    pipeline::settle_finances(&mut sim.0, &mut ledger);
}

pub fn roll_events(mut sim: ResMut<Sim>, mut ledger: ResMut<PeriodLedger>) {
    pipeline::roll_events(&mut sim.0, &mut ledger);
}

pub fn record_results(mut sim: ResMut<Sim>, mut ledger: ResMut<PeriodLedger>) {
    pipeline::record_results(&mut sim.0, &mut ledger);
}

pub fn advance_clock(mut sim: ResMut<Sim>, mut ledger: ResMut<PeriodLedger>) {
    pipeline::advance_clock(&mut sim.0, &mut ledger);
}

/// One period: decisions, lifecycle, production, market, finance, events,
/// records, clock. Strictly sequential.
pub fn period_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            apply_decisions,
            run_lifecycle,
            run_production,
            clear_markets,
            settle_finances,
            roll_events,
            record_results,
            advance_clock,
        )
            .chain(),
    );
    schedule
}

/// World holding the simulation and an empty ledger for its current period.
pub fn init_world(state: SimulationState) -> World {
    let mut world = World::new();
    world.insert_resource(PeriodLedger::new(state.current_period));
    world.insert_resource(Sim(state));
    world
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulationFactory;

    #[test]
    fn world_creates() {
        let engine = SimulationFactory::create_demo_simulation();
        let world = init_world(engine.snapshot());
        assert_eq!(world.resource::<PeriodLedger>().period, 0);
        assert_eq!(world.resource::<Sim>().0.companies.len(), 1);
    }

    #[test]
    fn schedule_runs_one_period() {
        let engine = SimulationFactory::create_demo_simulation();
        let mut world = init_world(engine.snapshot());
        period_schedule().run(&mut world);
        let sim = &world.resource::<Sim>().0;
        assert_eq!(sim.current_period, 1);
        assert_eq!(sim.results_for(0).count(), 1);
        assert!(sim.market_condition(1).is_some());
    }
}
