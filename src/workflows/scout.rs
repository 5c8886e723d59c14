use crate::errors::{Error, Result};
use crate::models::{ContainerKind, ShipFlightMode, WaypointSymbol, ITERATIONS_INFINITE};
use crate::routing::{partition_markets, plan_tour, rotate_at, FleetShip};
use crate::supervisor::WorkflowCtx;
use crate::workflows::{goto_waypoint, profile_of};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stationary scout re-reads its market on this cadence.
const STATIONARY_PACE: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize)]
pub struct ScoutTourConfig {
    /// Empty means every market in the ship's current system.
    #[serde(default)]
    pub markets: Vec<WaypointSymbol>,
}

/// One pass of a scouting tour: visit each assigned market in optimized
/// order (rotated to wherever the ship currently is) and snapshot it.
pub async fn run_tour(ctx: &WorkflowCtx) -> Result<Duration> {
    let config: ScoutTourConfig = ctx.config()?;

    // random sleep before the first pass for a gentler fleet startup
    if ctx.handle.snapshot().current_iteration == 0 {
        let jitter = rand::random::<u64>() % 5;
        if jitter > 0 {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(Error::OperationCanceled),
                _ = tokio::time::sleep(Duration::from_secs(jitter)) => {}
            }
        }
    }

    let ship = ctx.ship().await?;
    let system = ship.system();
    let graph = ctx
        .universe
        .system_graph(&ctx.player, &system, &ctx.cancel)
        .await?;

    let markets = if config.markets.is_empty() {
        graph.market_symbols()
    } else {
        config.markets
    };
    if markets.is_empty() {
        return Err(Error::InvalidParams(format!("no markets to scout in {}", system)));
    }

    if markets.len() == 1 {
        // stationary posting: park on the market and re-read it
        let market = &markets[0];
        goto_waypoint(ctx, &ship, market, ShipFlightMode::Burn).await?;
        let snapshot = ctx
            .universe
            .refresh_market(&ctx.player, market, &ctx.cancel)
            .await?;
        ctx.log(&format!(
            "Scouted {} ({} trade goods)",
            market,
            snapshot.trade_goods.len()
        ))
        .await;
        return Ok(STATIONARY_PACE);
    }

    let tour = plan_tour(
        &graph,
        &ship.waypoint(),
        &markets,
        &profile_of(&ship, ShipFlightMode::Burn),
    )?;
    let order = rotate_at(&tour.stops, &ship.waypoint());
    ctx.log(&format!(
        "Touring {} markets, {} s optimized",
        order.len(),
        tour.total_seconds
    ))
    .await;

    for stop in &order {
        if ctx.cancel.is_cancelled() {
            return Err(Error::OperationCanceled);
        }
        if ship.waypoint() != *stop {
            goto_waypoint(ctx, &ship, stop, ShipFlightMode::Burn).await?;
        }
        let snapshot = ctx
            .universe
            .refresh_market(&ctx.player, stop, &ctx.cancel)
            .await?;
        ctx.log(&format!(
            "Scouted {} ({} trade goods)",
            stop,
            snapshot.trade_goods.len()
        ))
        .await;
    }
    // travel time paces multi-stop tours
    Ok(Duration::ZERO)
}

#[derive(Debug, Deserialize)]
pub struct FleetAssignmentConfig {
    pub ship_symbols: Vec<String>,
    #[serde(default)]
    pub markets: Vec<WaypointSymbol>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Partition markets across the fleet and spawn one scout-tour container
/// per ship. Re-running coalesces onto the live containers.
pub async fn run_fleet_assignment(ctx: &WorkflowCtx) -> Result<Duration> {
    let config: FleetAssignmentConfig = ctx.config()?;
    if config.ship_symbols.is_empty() {
        return Err(Error::InvalidParams("fleet assignment needs at least one ship".to_string()));
    }

    let gateway = ctx.universe.gateway();
    let ships = futures::future::try_join_all(config.ship_symbols.iter().map(|symbol| async {
        let ship = gateway.get_ship(&ctx.player, symbol, &ctx.cancel).await?;
        Ok::<_, Error>(FleetShip {
            symbol: ship.symbol.clone(),
            start: ship.nav.waypoint_symbol.clone(),
            profile: crate::routing::ShipProfile {
                fuel_capacity: ship.fuel.capacity,
                current_fuel: ship.fuel.current,
                engine_speed: ship.engine.speed,
                preferred_mode: ShipFlightMode::Burn,
            },
        })
    }))
    .await?;

    let system = ships[0].start.system();
    let graph = ctx
        .universe
        .system_graph(&ctx.player, &system, &ctx.cancel)
        .await?;
    let markets = if config.markets.is_empty() {
        graph.market_symbols()
    } else {
        config.markets
    };

    let assignments = partition_markets(&graph, &ships, &markets, config.seed.unwrap_or(17))?;
    for assignment in &assignments {
        if assignment.markets.is_empty() {
            continue;
        }
        let tour_config = ScoutTourConfig { markets: assignment.markets.clone() };
        let (container_id, created) = ctx
            .supervisor
            .clone()
            .launch(
                ctx.player.id,
                ContainerKind::ScoutTour,
                Some(assignment.ship_symbol.clone()),
                serde_json::to_value(&tour_config)?,
                ITERATIONS_INFINITE,
            )
            .await?;
        ctx.log(&format!(
            "{} scout container {} for {} ({} markets)",
            if created { "Spawned" } else { "Reused" },
            container_id,
            assignment.ship_symbol,
            assignment.markets.len()
        ))
        .await;
    }
    Ok(Duration::ZERO)
}
