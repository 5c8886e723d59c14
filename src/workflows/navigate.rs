use crate::errors::{Error, Result};
use crate::models::{ShipFlightMode, WaypointSymbol};
use crate::routing::plan_route;
use crate::supervisor::WorkflowCtx;
use crate::workflows::profile_of;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct NavigateConfig {
    pub to: WaypointSymbol,
    #[serde(default)]
    pub mode: Option<ShipFlightMode>,
}

/// Navigate intent: fetch the cached graph, plan, execute.
pub async fn run(ctx: &WorkflowCtx) -> Result<Duration> {
    let config: NavigateConfig = ctx.config()?;
    let ship = ctx.ship().await?;
    let system = ship.system();
    if config.to.system() != system {
        return Err(Error::InvalidParams(format!(
            "{} is not in the ship's system {}",
            config.to, system
        )));
    }

    let graph = ctx
        .universe
        .system_graph(&ctx.player, &system, &ctx.cancel)
        .await?;
    let start = ship.waypoint();
    if graph.waypoint(&start).is_none() {
        // never silently succeed with an empty route
        return Err(Error::EmptyWaypointCache(system.to_string()));
    }

    let mode = config.mode.unwrap_or(ShipFlightMode::Burn);
    let route = plan_route(&graph, &start, &config.to, &profile_of(&ship, mode))?;
    if route.is_empty() {
        ctx.log(&format!("Already at {}", config.to)).await;
        return Ok(Duration::ZERO);
    }
    ctx.log(&format!(
        "Planned {} -> {}: {} steps, {} fuel, {} s",
        start,
        config.to,
        route.steps.len(),
        route.total_fuel,
        route.total_seconds
    ))
    .await;

    ship.execute_route(&route).await?;
    ctx.log(&format!("Arrived at {}", config.to)).await;
    Ok(Duration::ZERO)
}
