use crate::errors::{Error, Result};
use crate::gateway::ApiGateway;
use crate::models::ShipNavStatus::*;
use crate::models::*;
use crate::routing::{Route, RouteStep};
use crate::universe::Universe;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Refuel on arrival when the tank is below this fraction of capacity.
const OPPORTUNISTIC_REFUEL_THRESHOLD: f64 = 0.9;

/// Effectful per-ship operations. Holds the locally mirrored ship state and
/// pushes every mutation through the gateway.
#[derive(Clone)]
pub struct ShipController {
    pub ship_symbol: String,
    ship: Arc<Mutex<Ship>>,
    player: Arc<Player>,
    gateway: Arc<ApiGateway>,
    pub universe: Universe,
    cancel: CancellationToken,
    container_id: Option<Uuid>,
}

impl ShipController {
    pub fn new(
        player: &Arc<Player>,
        universe: &Universe,
        ship: Ship,
        cancel: CancellationToken,
        container_id: Option<Uuid>,
    ) -> ShipController {
        let gateway = universe.gateway().clone();
        gateway.record_nav(&ship.symbol, &ship.nav);
        ShipController {
            ship_symbol: ship.symbol.clone(),
            ship: Arc::new(Mutex::new(ship)),
            player: player.clone(),
            gateway,
            universe: universe.clone(),
            cancel,
            container_id,
        }
    }

    /// Load the live ship through the gateway and wrap it.
    pub async fn load(
        player: &Arc<Player>,
        universe: &Universe,
        ship_symbol: &str,
        cancel: CancellationToken,
        container_id: Option<Uuid>,
    ) -> Result<ShipController> {
        let ship = universe
            .gateway()
            .get_ship(player, ship_symbol, &cancel)
            .await?;
        Ok(ShipController::new(player, universe, ship, cancel, container_id))
    }

    pub fn ship(&self) -> Ship {
        self.ship.lock().unwrap().clone()
    }
    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
    pub fn container_id(&self) -> Option<Uuid> {
        self.container_id
    }
    pub fn nav_status(&self) -> ShipNavStatus {
        self.ship.lock().unwrap().nav.status
    }
    pub fn flight_mode(&self) -> ShipFlightMode {
        self.ship.lock().unwrap().nav.flight_mode
    }
    pub fn waypoint(&self) -> WaypointSymbol {
        self.ship.lock().unwrap().nav.waypoint_symbol.clone()
    }
    pub fn system(&self) -> SystemSymbol {
        self.ship.lock().unwrap().nav.system_symbol.clone()
    }
    pub fn engine_speed(&self) -> i64 {
        self.ship.lock().unwrap().engine.speed
    }
    pub fn fuel_capacity(&self) -> i64 {
        self.ship.lock().unwrap().fuel.capacity
    }
    pub fn current_fuel(&self) -> i64 {
        self.ship.lock().unwrap().fuel.current
    }
    pub fn cargo_capacity(&self) -> i64 {
        self.ship.lock().unwrap().cargo.capacity
    }
    pub fn cargo_units(&self) -> i64 {
        self.ship.lock().unwrap().cargo.units
    }
    pub fn cargo_space_available(&self) -> i64 {
        let ship = self.ship.lock().unwrap();
        ship.cargo.capacity - ship.cargo.units
    }
    pub fn cargo_good_count(&self, good: &str) -> i64 {
        self.ship.lock().unwrap().cargo_good_count(good)
    }

    fn update_nav(&self, nav: ShipNav) {
        self.gateway.record_nav(&self.ship_symbol, &nav);
        self.ship.lock().unwrap().nav = nav;
    }
    fn update_fuel(&self, fuel: ShipFuel) {
        self.ship.lock().unwrap().fuel = fuel;
    }
    fn update_cargo(&self, cargo: ShipCargo) {
        self.ship.lock().unwrap().cargo = cargo;
    }

    pub fn debug(&self, msg: &str) {
        debug!("[{}] {}", self.ship_symbol, msg);
    }

    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::OperationCanceled);
        }
        Ok(())
    }

    pub async fn orbit(&self) -> Result<()> {
        self.check_cancel()?;
        if self.nav_status() == InOrbit {
            return Ok(());
        }
        let nav = self
            .gateway
            .orbit_ship(&self.player, &self.ship_symbol, &self.cancel)
            .await?;
        self.update_nav(nav);
        Ok(())
    }

    pub async fn dock(&self) -> Result<()> {
        self.check_cancel()?;
        if self.nav_status() == Docked {
            return Ok(());
        }
        let nav = self
            .gateway
            .dock_ship(&self.player, &self.ship_symbol, &self.cancel)
            .await?;
        self.update_nav(nav);
        Ok(())
    }

    pub async fn set_flight_mode(&self, mode: ShipFlightMode) -> Result<()> {
        self.check_cancel()?;
        if self.flight_mode() == mode {
            return Ok(());
        }
        self.debug(&format!("Setting flight mode to {:?}", mode));
        let response = self
            .gateway
            .set_flight_mode(&self.player, &self.ship_symbol, mode, &self.cancel)
            .await?;
        self.update_nav(response.nav);
        self.update_fuel(response.fuel);
        Ok(())
    }

    /// Refuel to full (or by `units`). Docks first when needed; a no-op on a
    /// full tank. Fails when the waypoint sells no fuel.
    pub async fn refuel(&self, units: Option<i64>) -> Result<()> {
        self.check_cancel()?;
        let (current, capacity) = {
            let ship = self.ship.lock().unwrap();
            (ship.fuel.current, ship.fuel.capacity)
        };
        if current >= capacity {
            return Ok(());
        }
        let waypoint = self
            .universe
            .get_waypoint(&self.player, &self.waypoint(), &self.cancel)
            .await?;
        if !waypoint.has_fuel() {
            return Err(Error::WaypointNotFound(format!(
                "{} has no fuel for sale",
                waypoint.symbol
            )));
        }
        self.dock().await?;
        self.debug(&format!("Refueling {}/{}", current, capacity));
        let response = self
            .gateway
            .refuel_ship(&self.player, &self.ship_symbol, units, &self.cancel)
            .await?;
        self.update_fuel(response.fuel);
        self.universe
            .record_ledger_entry(&LedgerEntry::new(
                self.player.id,
                LedgerEntryKind::Refuel,
                -response.transaction.total_price,
                response.transaction.units,
                self.container_id,
            ))
            .await?;
        self.universe
            .record_player_credits(&self.player, response.agent.credits)
            .await?;
        Ok(())
    }

    pub async fn navigate(&self, mode: ShipFlightMode, waypoint: &WaypointSymbol) -> Result<()> {
        self.check_cancel()?;
        if self.waypoint() == *waypoint {
            return Ok(());
        }
        self.set_flight_mode(mode).await?;
        self.orbit().await?;
        self.debug(&format!("Navigating to waypoint: {}", waypoint));
        let response = self
            .gateway
            .navigate_ship(&self.player, &self.ship_symbol, waypoint, &self.cancel)
            .await?;
        self.update_nav(response.nav);
        self.update_fuel(response.fuel);
        self.wait_for_transit().await?;
        Ok(())
    }

    /// Sleep out the current transit, then flip the mirrored state to orbit.
    pub async fn wait_for_transit(&self) -> Result<()> {
        let arrival = { self.ship.lock().unwrap().nav.route.arrival };
        let wait = arrival - Utc::now() + chrono::Duration::seconds(1);
        if wait > chrono::Duration::zero() {
            self.debug(&format!("Waiting for transit: {} seconds", wait.num_seconds()));
            let wait = wait.to_std().unwrap_or_default();
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::OperationCanceled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
        {
            let mut ship = self.ship.lock().unwrap();
            if ship.nav.status == InTransit {
                ship.nav.status = InOrbit;
                ship.nav.waypoint_symbol = ship.nav.route.destination.symbol.clone();
            }
            self.gateway.record_nav(&self.ship_symbol, &ship.nav);
        }
        Ok(())
    }

    pub async fn buy_goods(&self, good: &str, units: i64) -> Result<()> {
        self.check_cancel()?;
        if units > self.cargo_space_available() {
            return Err(Error::InsufficientCargoSpace {
                required: units,
                available: self.cargo_space_available(),
            });
        }
        self.dock().await?;
        self.debug(&format!("Buying {} units of {}", units, good));
        let response = self
            .gateway
            .purchase_cargo(&self.player, &self.ship_symbol, good, units, &self.cancel)
            .await?;
        self.update_cargo(response.cargo);
        self.universe
            .record_ledger_entry(&LedgerEntry::new(
                self.player.id,
                LedgerEntryKind::CargoPurchase,
                -response.transaction.total_price,
                response.transaction.units,
                self.container_id,
            ))
            .await?;
        self.universe
            .record_player_credits(&self.player, response.agent.credits)
            .await?;
        Ok(())
    }

    pub async fn sell_goods(&self, good: &str, units: i64) -> Result<()> {
        self.check_cancel()?;
        self.dock().await?;
        self.debug(&format!("Selling {} units of {}", units, good));
        let response = self
            .gateway
            .sell_cargo(&self.player, &self.ship_symbol, good, units, &self.cancel)
            .await?;
        self.update_cargo(response.cargo);
        self.universe
            .record_ledger_entry(&LedgerEntry::new(
                self.player.id,
                LedgerEntryKind::CargoSale,
                response.transaction.total_price,
                response.transaction.units,
                self.container_id,
            ))
            .await?;
        self.universe
            .record_player_credits(&self.player, response.agent.credits)
            .await?;
        Ok(())
    }

    pub async fn jettison_cargo(&self, good: &str, units: i64) -> Result<()> {
        self.check_cancel()?;
        self.debug(&format!("Jettisoning {} {}", units, good));
        let response = self
            .gateway
            .jettison_cargo(&self.player, &self.ship_symbol, good, units, &self.cancel)
            .await?;
        self.update_cargo(response.cargo);
        Ok(())
    }

    /// Execute a planned route step by step. Failures carry the step index
    /// in the container log and surface the underlying error unchanged;
    /// re-planning is the caller's concern.
    pub async fn execute_route(&self, route: &Route) -> Result<()> {
        self.gateway
            .await_transit(&self.player, &self.ship_symbol, &self.cancel)
            .await?;
        for (index, step) in route.steps.iter().enumerate() {
            self.check_cancel()?;
            if let Err(e) = self.execute_step(step).await {
                self.debug(&format!("Route failed at step {}: {}", index, e.code()));
                return Err(e);
            }
        }
        Ok(())
    }

    async fn execute_step(&self, step: &RouteStep) -> Result<()> {
        match step {
            RouteStep::Refuel { .. } => {
                self.dock().await?;
                self.refuel(None).await?;
                self.orbit().await?;
            }
            RouteStep::Travel { to, mode, .. } => {
                self.orbit().await?;
                self.navigate(*mode, to).await?;
                self.debug(&format!("Arrived at waypoint: {}", to));
                self.opportunistic_refuel().await?;
            }
        }
        Ok(())
    }

    /// Unscheduled top-up after arrival: only at fuel-bearing waypoints,
    /// only below 90% of capacity.
    async fn opportunistic_refuel(&self) -> Result<()> {
        let (current, capacity) = {
            let ship = self.ship.lock().unwrap();
            (ship.fuel.current, ship.fuel.capacity)
        };
        if capacity == 0 {
            return Ok(());
        }
        if (current as f64) >= OPPORTUNISTIC_REFUEL_THRESHOLD * capacity as f64 {
            return Ok(());
        }
        let waypoint = self
            .universe
            .get_waypoint(&self.player, &self.waypoint(), &self.cancel)
            .await?;
        if !waypoint.has_fuel() {
            return Ok(());
        }
        self.dock().await?;
        self.refuel(None).await?;
        self.orbit().await?;
        Ok(())
    }
}
