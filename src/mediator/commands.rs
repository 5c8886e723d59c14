use super::{Command, CommandContext};
use crate::errors::{Error, Result};
use crate::models::{Player, Ship, ShipFlightMode, WaypointSymbol};
use crate::ship_controller::ShipController;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn validate_ship_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() {
        return Err(Error::InvalidParams("ship symbol is empty".to_string()));
    }
    Ok(())
}

fn validate_units(units: i64) -> Result<()> {
    if units <= 0 {
        return Err(Error::InvalidParams(format!("units must be positive, got {}", units)));
    }
    Ok(())
}

async fn controller(
    ctx: &CommandContext,
    player: &Arc<Player>,
    ship_symbol: &str,
    cancel: &CancellationToken,
) -> Result<ShipController> {
    ShipController::load(player, &ctx.universe, ship_symbol, cancel.clone(), None).await
}

#[derive(Debug)]
pub struct DockShip {
    pub player: Arc<Player>,
    pub ship_symbol: String,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for DockShip {
    type Output = Ship;

    fn name(&self) -> &'static str {
        "DockShip"
    }

    fn validate(&self) -> Result<()> {
        validate_ship_symbol(&self.ship_symbol)
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Ship> {
        let ship = controller(ctx, &self.player, &self.ship_symbol, &self.cancel).await?;
        ship.dock().await?;
        Ok(ship.ship())
    }
}

#[derive(Debug)]
pub struct OrbitShip {
    pub player: Arc<Player>,
    pub ship_symbol: String,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for OrbitShip {
    type Output = Ship;

    fn name(&self) -> &'static str {
        "OrbitShip"
    }

    fn validate(&self) -> Result<()> {
        validate_ship_symbol(&self.ship_symbol)
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Ship> {
        let ship = controller(ctx, &self.player, &self.ship_symbol, &self.cancel).await?;
        ship.orbit().await?;
        Ok(ship.ship())
    }
}

#[derive(Debug)]
pub struct RefuelShip {
    pub player: Arc<Player>,
    pub ship_symbol: String,
    pub units: Option<i64>,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for RefuelShip {
    type Output = Ship;

    fn name(&self) -> &'static str {
        "RefuelShip"
    }

    fn validate(&self) -> Result<()> {
        validate_ship_symbol(&self.ship_symbol)?;
        if let Some(units) = self.units {
            validate_units(units)?;
        }
        Ok(())
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Ship> {
        let ship = controller(ctx, &self.player, &self.ship_symbol, &self.cancel).await?;
        ship.refuel(self.units).await?;
        Ok(ship.ship())
    }
}

#[derive(Debug)]
pub struct SetFlightMode {
    pub player: Arc<Player>,
    pub ship_symbol: String,
    pub mode: ShipFlightMode,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for SetFlightMode {
    type Output = Ship;

    fn name(&self) -> &'static str {
        "SetFlightMode"
    }

    fn validate(&self) -> Result<()> {
        validate_ship_symbol(&self.ship_symbol)
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Ship> {
        // DRIFT is accepted here; the route planner just never chooses it
        let ship = controller(ctx, &self.player, &self.ship_symbol, &self.cancel).await?;
        ship.set_flight_mode(self.mode).await?;
        Ok(ship.ship())
    }
}

#[derive(Debug)]
pub struct PurchaseCargo {
    pub player: Arc<Player>,
    pub ship_symbol: String,
    pub good: String,
    pub units: i64,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for PurchaseCargo {
    type Output = Ship;

    fn name(&self) -> &'static str {
        "PurchaseCargo"
    }

    fn validate(&self) -> Result<()> {
        validate_ship_symbol(&self.ship_symbol)?;
        validate_units(self.units)
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Ship> {
        let ship = controller(ctx, &self.player, &self.ship_symbol, &self.cancel).await?;
        ship.buy_goods(&self.good, self.units).await?;
        Ok(ship.ship())
    }
}

#[derive(Debug)]
pub struct SellCargo {
    pub player: Arc<Player>,
    pub ship_symbol: String,
    pub good: String,
    pub units: i64,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for SellCargo {
    type Output = Ship;

    fn name(&self) -> &'static str {
        "SellCargo"
    }

    fn validate(&self) -> Result<()> {
        validate_ship_symbol(&self.ship_symbol)?;
        validate_units(self.units)
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Ship> {
        let ship = controller(ctx, &self.player, &self.ship_symbol, &self.cancel).await?;
        ship.sell_goods(&self.good, self.units).await?;
        Ok(ship.ship())
    }
}

#[derive(Debug)]
pub struct JettisonCargo {
    pub player: Arc<Player>,
    pub ship_symbol: String,
    pub good: String,
    pub units: i64,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for JettisonCargo {
    type Output = Ship;

    fn name(&self) -> &'static str {
        "JettisonCargo"
    }

    fn validate(&self) -> Result<()> {
        validate_ship_symbol(&self.ship_symbol)?;
        validate_units(self.units)
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Ship> {
        // no market needed; docked or in orbit both work
        let ship = controller(ctx, &self.player, &self.ship_symbol, &self.cancel).await?;
        ship.jettison_cargo(&self.good, self.units).await?;
        Ok(ship.ship())
    }
}

#[derive(Debug)]
pub struct GetShip {
    pub player: Arc<Player>,
    pub ship_symbol: String,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for GetShip {
    type Output = Ship;

    fn name(&self) -> &'static str {
        "GetShip"
    }

    fn validate(&self) -> Result<()> {
        validate_ship_symbol(&self.ship_symbol)
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Ship> {
        ctx.universe
            .gateway()
            .get_ship(&self.player, &self.ship_symbol, &self.cancel)
            .await
    }
}

#[derive(Debug)]
pub struct ListShips {
    pub player: Arc<Player>,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for ListShips {
    type Output = Vec<Ship>;

    fn name(&self) -> &'static str {
        "ListShips"
    }

    async fn handle(self, ctx: &CommandContext) -> Result<Vec<Ship>> {
        ctx.universe
            .gateway()
            .get_all_ships(&self.player, &self.cancel)
            .await
    }
}

/// Buy one ship of `ship_type`, navigating the purchasing ship to the
/// nearest shipyard that sells it when none is given.
#[derive(Debug)]
pub struct PurchaseShip {
    pub player: Arc<Player>,
    pub ship_symbol: String,
    pub ship_type: String,
    pub shipyard: Option<WaypointSymbol>,
    pub cancel: CancellationToken,
}

#[async_trait]
impl Command for PurchaseShip {
    type Output = String;

    fn name(&self) -> &'static str {
        "PurchaseShip"
    }

    fn validate(&self) -> Result<()> {
        validate_ship_symbol(&self.ship_symbol)?;
        if self.ship_type.is_empty() {
            return Err(Error::InvalidParams("ship type is empty".to_string()));
        }
        Ok(())
    }

    async fn handle(self, ctx: &CommandContext) -> Result<String> {
        let ship = controller(ctx, &self.player, &self.ship_symbol, &self.cancel).await?;
        crate::workflows::shipyard::purchase_ship(&ship, &self.ship_type, self.shipyard.as_ref())
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;

    fn player() -> Arc<Player> {
        Arc::new(Player {
            id: 1,
            agent_symbol: "TEST_AGENT".to_string(),
            token: "token".to_string(),
            metadata: serde_json::json!({}),
            credits: 0,
            last_active: Utc::now(),
        })
    }

    #[test]
    fn test_ship_symbol_is_required() {
        let cmd = DockShip {
            player: player(),
            ship_symbol: "".to_string(),
            cancel: CancellationToken::new(),
        };
        assert_eq!(cmd.validate().unwrap_err().code(), "InvalidParams");
    }

    #[test]
    fn test_trade_units_must_be_positive() {
        let cmd = PurchaseCargo {
            player: player(),
            ship_symbol: "TEST_AGENT-1".to_string(),
            good: "FUEL".to_string(),
            units: 0,
            cancel: CancellationToken::new(),
        };
        assert_eq!(cmd.validate().unwrap_err().code(), "InvalidParams");

        let cmd = SellCargo {
            player: player(),
            ship_symbol: "TEST_AGENT-1".to_string(),
            good: "FUEL".to_string(),
            units: 5,
            cancel: CancellationToken::new(),
        };
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_refuel_accepts_full_tank_request() {
        let cmd = RefuelShip {
            player: player(),
            ship_symbol: "TEST_AGENT-1".to_string(),
            units: None,
            cancel: CancellationToken::new(),
        };
        assert!(cmd.validate().is_ok());
        let cmd = RefuelShip {
            player: player(),
            ship_symbol: "TEST_AGENT-1".to_string(),
            units: Some(-10),
            cancel: CancellationToken::new(),
        };
        assert_eq!(cmd.validate().unwrap_err().code(), "InvalidParams");
    }

    #[test]
    fn test_purchase_ship_requires_a_type() {
        let cmd = PurchaseShip {
            player: player(),
            ship_symbol: "TEST_AGENT-1".to_string(),
            ship_type: "".to_string(),
            shipyard: None,
            cancel: CancellationToken::new(),
        };
        assert_eq!(cmd.validate().unwrap_err().code(), "InvalidParams");
    }
}
