use crate::errors::{Error, Result};
use crate::models::*;
use crate::supervisor::WorkflowCtx;
use crate::workflows::goto_waypoint;
use serde::Deserialize;
use std::time::Duration;

const IDLE_PACE: Duration = Duration::from_secs(60);
const TRADE_PACE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
pub struct ArbitrageConfig {
    /// Restrict to one trade good; empty scans everything snapshotted.
    #[serde(default)]
    pub good: Option<String>,
    /// Minimum per-unit margin worth flying for.
    #[serde(default)]
    pub min_margin: Option<i64>,
}

#[derive(Debug)]
struct Opportunity {
    good: String,
    buy_at: WaypointSymbol,
    sell_at: WaypointSymbol,
    margin: i64,
}

/// One arbitrage round: pick the widest spread from the snapshot pool, buy
/// a full hold in BURN, sell it at the high market.
pub async fn run(ctx: &WorkflowCtx) -> Result<Duration> {
    let config: ArbitrageConfig = ctx.config()?;
    let ship = ctx.ship().await?;
    let min_margin = config.min_margin.unwrap_or(1);

    let snapshots = ctx.universe.latest_market_snapshots(&ctx.player).await?;
    let opportunity = best_opportunity(&snapshots, config.good.as_deref(), min_margin);
    let Some(opportunity) = opportunity else {
        ctx.log("No profitable spread in snapshots; idling").await;
        return Ok(IDLE_PACE);
    };
    ctx.log(&format!(
        "Arbitrage {}: buy {} sell {} (margin {}/unit)",
        opportunity.good, opportunity.buy_at, opportunity.sell_at, opportunity.margin
    ))
    .await;

    goto_waypoint(ctx, &ship, &opportunity.buy_at, ShipFlightMode::Burn).await?;
    let units = ship.cargo_space_available();
    if units <= 0 {
        return Err(Error::InsufficientCargoSpace { required: 1, available: 0 });
    }
    ship.buy_goods(&opportunity.good, units).await?;

    goto_waypoint(ctx, &ship, &opportunity.sell_at, ShipFlightMode::Burn).await?;
    let held = ship.cargo_good_count(&opportunity.good);
    ship.sell_goods(&opportunity.good, held).await?;
    ctx.log(&format!("Sold {} {} at {}", held, opportunity.good, opportunity.sell_at))
        .await;
    Ok(TRADE_PACE)
}

fn best_opportunity(
    snapshots: &[MarketSnapshot],
    only_good: Option<&str>,
    min_margin: i64,
) -> Option<Opportunity> {
    let mut best: Option<Opportunity> = None;
    for buy in snapshots {
        for good in &buy.trade_goods {
            if only_good.map(|g| g != good.symbol).unwrap_or(false) {
                continue;
            }
            for sell in snapshots {
                if sell.waypoint_symbol == buy.waypoint_symbol {
                    continue;
                }
                let Some(sell_good) = sell.good(&good.symbol) else {
                    continue;
                };
                let margin = sell_good.sell_price - good.purchase_price;
                if margin < min_margin {
                    continue;
                }
                if best.as_ref().map(|b| margin > b.margin).unwrap_or(true) {
                    best = Some(Opportunity {
                        good: good.symbol.clone(),
                        buy_at: buy.waypoint_symbol.clone(),
                        sell_at: sell.waypoint_symbol.clone(),
                        margin,
                    });
                }
            }
        }
    }
    best
}
