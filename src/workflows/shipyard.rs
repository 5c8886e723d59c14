use crate::errors::{Error, Result};
use crate::models::{LedgerEntry, LedgerEntryKind, ShipFlightMode, WaypointSymbol};
use crate::ship_controller::ShipController;
use crate::supervisor::WorkflowCtx;
use crate::util;
use serde::Deserialize;
use std::time::Duration;

/// Buy one `ship_type`, navigating the purchasing ship to the nearest
/// shipyard selling it unless one was named. Returns the new ship symbol
/// and the price paid.
pub async fn purchase_ship_priced(
    ship: &ShipController,
    ship_type: &str,
    shipyard: Option<&WaypointSymbol>,
) -> Result<(String, i64)> {
    let player = ship.player().clone();
    let cancel = ship.cancel_token().clone();
    let universe = ship.universe.clone();
    let system = ship.system();

    let target = match shipyard {
        Some(symbol) => symbol.clone(),
        None => {
            // nearest shipyard selling the type, straight-line from here
            let candidates = universe
                .search_shipyards(&player, &system, ship_type, &cancel)
                .await?;
            if candidates.is_empty() {
                return Err(Error::NoShipyardFound(ship_type.to_string()));
            }
            let here = universe.get_waypoint(&player, &ship.waypoint(), &cancel).await?;
            let mut best: Option<(WaypointSymbol, f64)> = None;
            for (symbol, _price) in candidates {
                let waypoint = universe.get_waypoint(&player, &symbol, &cancel).await?;
                let distance = util::distance(&here, &waypoint);
                if best.as_ref().map(|(_, d)| distance < *d).unwrap_or(true) {
                    best = Some((symbol, distance));
                }
            }
            best.expect("candidates is non-empty").0
        }
    };

    if ship.waypoint() != target {
        let graph = universe.system_graph(&player, &system, &cancel).await?;
        if graph.waypoint(&ship.waypoint()).is_none() {
            return Err(Error::EmptyWaypointCache(system.to_string()));
        }
        let route = crate::routing::plan_route(
            &graph,
            &ship.waypoint(),
            &target,
            &crate::workflows::profile_of(ship, ShipFlightMode::Burn),
        )?;
        ship.execute_route(&route).await?;
    }
    ship.dock().await?;

    let response = ship
        .universe
        .gateway()
        .purchase_ship(&player, ship_type, &target, &cancel)
        .await
        .map_err(|e| match e {
            Error::Http4xx { status: 400, body } if body.contains("credits") => {
                Error::InsufficientCredits { required: 0, available: 0 }
            }
            Error::Http4xx { status: 400, .. } => Error::ShipTypeNotAvailable(ship_type.to_string()),
            e => e,
        })?;

    universe
        .record_ledger_entry(&LedgerEntry::new(
            player.id,
            LedgerEntryKind::ShipPurchase,
            -response.transaction.price,
            1,
            ship.container_id(),
        ))
        .await?;
    universe
        .record_player_credits(&player, response.agent.credits)
        .await?;
    Ok((response.ship.symbol, response.transaction.price))
}

pub async fn purchase_ship(
    ship: &ShipController,
    ship_type: &str,
    shipyard: Option<&WaypointSymbol>,
) -> Result<String> {
    let (symbol, _price) = purchase_ship_priced(ship, ship_type, shipyard).await?;
    Ok(symbol)
}

#[derive(Debug, Deserialize)]
pub struct ShipyardPurchaseConfig {
    pub ship_type: String,
    #[serde(default)]
    pub shipyard: Option<WaypointSymbol>,
}

pub async fn run_purchase(ctx: &WorkflowCtx) -> Result<Duration> {
    let config: ShipyardPurchaseConfig = ctx.config()?;
    let ship = ctx.ship().await?;
    let (symbol, price) =
        purchase_ship_priced(&ship, &config.ship_type, config.shipyard.as_ref()).await?;
    ctx.log(&format!("Purchased {} ({}) for {}", symbol, config.ship_type, price))
        .await;
    Ok(Duration::ZERO)
}

#[derive(Debug, Deserialize)]
pub struct BatchPurchaseConfig {
    pub ship_type: String,
    pub quantity: i64,
    #[serde(default)]
    pub max_budget: Option<i64>,
}

/// Buy up to `quantity` ships, bounded by budget and live credits. A
/// mid-batch failure is partial success: stop and report the count.
pub async fn run_batch(ctx: &WorkflowCtx) -> Result<Duration> {
    let config: BatchPurchaseConfig = ctx.config()?;
    if config.quantity <= 0 {
        return Err(Error::InvalidParams("quantity must be positive".to_string()));
    }
    let ship = ctx.ship().await?;
    let gateway = ctx.universe.gateway().clone();

    let mut purchased: i64 = 0;
    let mut spent: i64 = 0;
    while purchased < config.quantity {
        if ctx.cancel.is_cancelled() {
            return Err(Error::OperationCanceled);
        }
        if let Some(budget) = config.max_budget {
            if spent >= budget {
                ctx.log(&format!("Budget {} exhausted after {} ships", budget, purchased))
                    .await;
                break;
            }
        }
        // live credits bound the batch
        let agent = gateway.get_agent(&ctx.player, &ctx.cancel).await?;
        let asking = cheapest_listing(ctx, &ship, &config.ship_type).await?;
        if let Some(asking) = asking {
            if asking > agent.credits {
                ctx.log(&format!(
                    "Credits too low for another {} ({} < {})",
                    config.ship_type, agent.credits, asking
                ))
                .await;
                break;
            }
            if let Some(budget) = config.max_budget {
                if spent + asking > budget {
                    ctx.log(&format!("Next purchase would exceed budget {}", budget)).await;
                    break;
                }
            }
        }
        match purchase_ship_priced(&ship, &config.ship_type, None).await {
            Ok((symbol, price)) => {
                purchased += 1;
                spent += price;
                ctx.log(&format!("Purchased {} ({}/{})", symbol, purchased, config.quantity))
                    .await;
            }
            Err(e) if e.is_canceled() => return Err(e),
            Err(e) => {
                // partial progress reports as success with counts
                ctx.log(&format!(
                    "Batch stopped after {}/{}: {}",
                    purchased, config.quantity, e
                ))
                .await;
                break;
            }
        }
    }
    ctx.log(&format!("Batch purchase complete: {}/{}", purchased, config.quantity))
        .await;
    Ok(Duration::ZERO)
}

async fn cheapest_listing(
    ctx: &WorkflowCtx,
    ship: &ShipController,
    ship_type: &str,
) -> Result<Option<i64>> {
    let candidates = ctx
        .universe
        .search_shipyards(&ctx.player, &ship.system(), ship_type, &ctx.cancel)
        .await?;
    Ok(candidates.into_iter().filter_map(|(_, price)| price).min())
}
