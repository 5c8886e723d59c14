use crate::errors::{Error, Result};
use crate::models::*;
use crate::supervisor::WorkflowCtx;
use crate::workflows::goto_waypoint;
use std::time::Duration;
use tracing::debug;

/// How long to wait between market polls while no profitable source exists.
const MARKET_POLL_PACE: Duration = Duration::from_secs(60);
/// Give up the sourcing poll after this many rounds and let the supervisor
/// restart the iteration.
const MARKET_POLL_ROUNDS: u32 = 30;

/// One contract cycle: negotiate, wait for a profitable source, accept,
/// haul until delivered, fulfill.
pub async fn run(ctx: &WorkflowCtx) -> Result<Duration> {
    let ship = ctx.ship().await?;
    let gateway = ctx.universe.gateway().clone();

    ship.dock().await?;
    let contract = gateway
        .negotiate_contract(&ctx.player, &ship.ship_symbol, &ctx.cancel)
        .await?;
    ctx.universe.record_contract(&ctx.player, &contract).await?;
    let deliver = contract
        .terms
        .deliver
        .first()
        .cloned()
        .ok_or_else(|| Error::ContractNotFound(format!("{} has no delivery terms", contract.id)))?;
    ctx.log(&format!(
        "Negotiated {}: {} x{} to {}",
        contract.id, deliver.trade_symbol, deliver.units_required, deliver.destination_symbol
    ))
    .await;

    let payment = contract.terms.payment.on_accepted + contract.terms.payment.on_fulfilled;
    let buy_market = poll_for_source(ctx, &deliver, payment).await?;
    ctx.log(&format!("Sourcing {} from {}", deliver.trade_symbol, buy_market)).await;

    let accepted = gateway
        .accept_contract(&ctx.player, &contract.id, &ctx.cancel)
        .await?;
    ctx.universe.record_contract(&ctx.player, &accepted.contract).await?;
    ctx.universe
        .record_player_credits(&ctx.player, accepted.agent.credits)
        .await?;

    // haul in cargo-sized batches until everything is delivered
    let mut remaining = deliver.units_required - deliver.units_fulfilled;
    while remaining > 0 {
        if ctx.cancel.is_cancelled() {
            return Err(Error::OperationCanceled);
        }
        let batch = remaining.min(ship.cargo_capacity());
        let held = ship.cargo_good_count(&deliver.trade_symbol);
        if held < batch {
            goto_waypoint(ctx, &ship, &buy_market, ShipFlightMode::Burn).await?;
            ship.buy_goods(&deliver.trade_symbol, batch - held).await?;
        }
        goto_waypoint(ctx, &ship, &deliver.destination_symbol, ShipFlightMode::Burn).await?;
        ship.dock().await?;
        let delivered = gateway
            .deliver_contract(
                &ctx.player,
                &contract.id,
                &ship.ship_symbol,
                &deliver.trade_symbol,
                batch,
                &ctx.cancel,
            )
            .await?;
        ctx.universe.record_contract(&ctx.player, &delivered.contract).await?;
        remaining = delivered.contract.outstanding_units();
        ctx.log(&format!(
            "Delivered {} {} ({} outstanding)",
            batch, deliver.trade_symbol, remaining
        ))
        .await;
    }

    let fulfilled = gateway
        .fulfill_contract(&ctx.player, &contract.id, &ctx.cancel)
        .await?;
    ctx.universe.record_contract(&ctx.player, &fulfilled.contract).await?;
    ctx.universe
        .record_ledger_entry(&LedgerEntry::new(
            ctx.player.id,
            LedgerEntryKind::ContractReward,
            contract.terms.payment.on_fulfilled,
            deliver.units_required,
            Some(ctx.handle.id()),
        ))
        .await?;
    ctx.universe
        .record_player_credits(&ctx.player, fulfilled.agent.credits)
        .await?;
    ctx.log(&format!("Fulfilled {}", contract.id)).await;
    Ok(Duration::ZERO)
}

/// Poll market snapshots until the delivery good can be bought at a profit.
async fn poll_for_source(
    ctx: &WorkflowCtx,
    deliver: &Deliver,
    payment: i64,
) -> Result<WaypointSymbol> {
    for round in 0..MARKET_POLL_ROUNDS {
        if ctx.cancel.is_cancelled() {
            return Err(Error::OperationCanceled);
        }
        let snapshots = ctx.universe.latest_market_snapshots(&ctx.player).await?;
        let candidate = snapshots
            .iter()
            .filter_map(|snapshot| {
                snapshot
                    .good(&deliver.trade_symbol)
                    .map(|good| (snapshot.waypoint_symbol.clone(), good.purchase_price))
            })
            .min_by_key(|(_, price)| *price);
        if let Some((market, price)) = candidate {
            let cost = price * deliver.units_required;
            if cost < payment {
                return Ok(market);
            }
            debug!(
                "contract sourcing unprofitable: {} x{} at {} costs {} vs payment {}",
                deliver.trade_symbol, deliver.units_required, market, cost, payment
            );
        }
        if round + 1 < MARKET_POLL_ROUNDS {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(Error::OperationCanceled),
                _ = tokio::time::sleep(MARKET_POLL_PACE) => {}
            }
        }
    }
    Err(Error::Timeout)
}
