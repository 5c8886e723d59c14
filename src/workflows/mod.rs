pub mod arbitrage;
pub mod contracts;
pub mod navigate;
pub mod scout;
pub mod shipyard;

use crate::errors::{Error, Result};
use crate::models::{ContainerKind, ShipFlightMode};
use crate::routing::{plan_route, ShipProfile};
use crate::ship_controller::ShipController;
use crate::supervisor::WorkflowCtx;
use std::time::Duration;

/// One container iteration. Returns the pause before the next iteration;
/// zero means the work itself is the pacing.
pub async fn run_iteration(ctx: &WorkflowCtx) -> Result<Duration> {
    match ctx.handle.kind() {
        ContainerKind::Navigate => navigate::run(ctx).await,
        ContainerKind::ScoutTour => scout::run_tour(ctx).await,
        ContainerKind::ScoutFleetAssignment => scout::run_fleet_assignment(ctx).await,
        ContainerKind::ShipyardPurchase => shipyard::run_purchase(ctx).await,
        ContainerKind::BatchPurchase => shipyard::run_batch(ctx).await,
        ContainerKind::ContractBatch => contracts::run(ctx).await,
        ContainerKind::Arbitrage => arbitrage::run(ctx).await,
    }
}

pub(crate) fn profile_of(ship: &ShipController, preferred_mode: ShipFlightMode) -> ShipProfile {
    ShipProfile {
        fuel_capacity: ship.fuel_capacity(),
        current_fuel: ship.current_fuel(),
        engine_speed: ship.engine_speed(),
        preferred_mode,
    }
}

/// Plan and fly a route to `to` within the ship's current system.
pub(crate) async fn goto_waypoint(
    ctx: &WorkflowCtx,
    ship: &ShipController,
    to: &crate::models::WaypointSymbol,
    preferred_mode: ShipFlightMode,
) -> Result<()> {
    if ship.waypoint() == *to {
        return Ok(());
    }
    let graph = ctx
        .universe
        .system_graph(&ctx.player, &ship.system(), &ctx.cancel)
        .await?;
    if graph.waypoint(&ship.waypoint()).is_none() {
        return Err(Error::EmptyWaypointCache(ship.system().to_string()));
    }
    let route = plan_route(&graph, &ship.waypoint(), to, &profile_of(ship, preferred_mode))?;
    if route.travel_steps().count() == 0 {
        return Err(Error::RouteHasNoTravelSteps);
    }
    ship.execute_route(&route).await
}
