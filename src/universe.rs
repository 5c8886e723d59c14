use crate::data::DataClient;
use crate::errors::{Error, Result};
use crate::gateway::ApiGateway;
use crate::models::*;
use crate::routing::SystemGraph;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use moka::future::Cache;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const WAYPOINT_TTL_HOURS: i64 = 2;

/// Layered caches over the remote API: memory first, then the database,
/// then a fetch. System graphs never expire in memory; waypoint lists
/// expire after [`WAYPOINT_TTL_HOURS`].
#[derive(Clone)]
pub struct Universe {
    gateway: Arc<ApiGateway>,
    db: Option<DataClient>,
    waypoints: Cache<String, Arc<Vec<Waypoint>>>,
    graphs: Arc<DashMap<SystemSymbol, Arc<SystemGraph>>>,
}

impl Universe {
    pub fn new(gateway: &Arc<ApiGateway>, db: Option<DataClient>) -> Universe {
        Universe {
            gateway: gateway.clone(),
            db,
            waypoints: Cache::builder()
                .time_to_live(std::time::Duration::from_secs(
                    (WAYPOINT_TTL_HOURS * 3600) as u64,
                ))
                .build(),
            graphs: Arc::new(DashMap::new()),
        }
    }

    pub fn gateway(&self) -> &Arc<ApiGateway> {
        &self.gateway
    }

    /// Waypoints for a system, syncing from the API when the cache and the
    /// stored copy are missing or stale.
    pub async fn get_system_waypoints(
        &self,
        player: &Player,
        system_symbol: &SystemSymbol,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<Waypoint>>> {
        let key = system_symbol.to_string();
        if let Some(waypoints) = self.waypoints.get(&key).await {
            return Ok(waypoints);
        }
        if let Some(db) = &self.db {
            if let Some(stored) = db.get_system_waypoints(system_symbol).await? {
                if stored.timestamp + Duration::hours(WAYPOINT_TTL_HOURS) > Utc::now() {
                    let waypoints = Arc::new(stored.data);
                    self.waypoints.insert(key, waypoints.clone()).await;
                    return Ok(waypoints);
                }
                debug!("waypoint cache for {} is stale, refetching", system_symbol);
            }
        }
        self.sync_system_waypoints(player, system_symbol, cancel).await
    }

    /// Force a fetch-and-save of a system's waypoints.
    pub async fn sync_system_waypoints(
        &self,
        player: &Player,
        system_symbol: &SystemSymbol,
        cancel: &CancellationToken,
    ) -> Result<Arc<Vec<Waypoint>>> {
        info!("syncing waypoints for {}", system_symbol);
        let fetched = self
            .gateway
            .get_system_waypoints(player, system_symbol, cancel)
            .await?;
        if fetched.is_empty() {
            return Err(Error::EmptyWaypointCache(system_symbol.to_string()));
        }
        if let Some(db) = &self.db {
            db.save_system_waypoints(system_symbol, &fetched).await?;
        }
        let waypoints = Arc::new(fetched);
        self.waypoints
            .insert(system_symbol.to_string(), waypoints.clone())
            .await;
        Ok(waypoints)
    }

    /// The routing graph for a system. Built once and kept for the life of
    /// the process; the stored copy never expires either.
    pub async fn system_graph(
        &self,
        player: &Player,
        system_symbol: &SystemSymbol,
        cancel: &CancellationToken,
    ) -> Result<Arc<SystemGraph>> {
        if let Some(graph) = self.graphs.get(system_symbol) {
            return Ok(graph.clone());
        }
        if let Some(db) = &self.db {
            if let Some(waypoints) = db.get_system_graph(system_symbol).await? {
                let graph = Arc::new(SystemGraph::new(system_symbol.clone(), waypoints));
                self.graphs.insert(system_symbol.clone(), graph.clone());
                return Ok(graph);
            }
        }
        let waypoints = self
            .get_system_waypoints(player, system_symbol, cancel)
            .await?;
        if let Some(db) = &self.db {
            db.save_system_graph(system_symbol, &waypoints).await?;
        }
        let graph = Arc::new(SystemGraph::new(
            system_symbol.clone(),
            waypoints.as_ref().clone(),
        ));
        self.graphs.insert(system_symbol.clone(), graph.clone());
        Ok(graph)
    }

    pub async fn get_waypoint(
        &self,
        player: &Player,
        symbol: &WaypointSymbol,
        cancel: &CancellationToken,
    ) -> Result<Waypoint> {
        let waypoints = self
            .get_system_waypoints(player, &symbol.system(), cancel)
            .await?;
        waypoints
            .iter()
            .find(|w| w.symbol == *symbol)
            .cloned()
            .ok_or_else(|| Error::WaypointNotFound(symbol.to_string()))
    }

    /// Fetch the live market and record a snapshot row.
    pub async fn refresh_market(
        &self,
        player: &Player,
        symbol: &WaypointSymbol,
        cancel: &CancellationToken,
    ) -> Result<MarketSnapshot> {
        let market = self.gateway.get_market(player, symbol, cancel).await?;
        let snapshot = MarketSnapshot::capture(&market);
        if let Some(db) = &self.db {
            db.insert_market_snapshot(player.id, &snapshot).await?;
        }
        Ok(snapshot)
    }

    pub async fn latest_market_snapshots(&self, player: &Player) -> Result<Vec<MarketSnapshot>> {
        match &self.db {
            Some(db) => db.latest_market_snapshots(player.id).await,
            None => Ok(vec![]),
        }
    }

    /// Shipyards in a system selling a ship type, with prices where known.
    pub async fn search_shipyards(
        &self,
        player: &Player,
        system_symbol: &SystemSymbol,
        ship_type: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<(WaypointSymbol, Option<i64>)>> {
        let waypoints = self
            .get_system_waypoints(player, system_symbol, cancel)
            .await?;
        let mut shipyards = Vec::new();
        for waypoint in waypoints.iter().filter(|w| w.is_shipyard()) {
            let shipyard = self
                .gateway
                .get_shipyard(player, &waypoint.symbol, cancel)
                .await?;
            if !shipyard.ship_types.iter().any(|t| t.ship_type == ship_type) {
                continue;
            }
            let price = shipyard
                .ships
                .iter()
                .find(|s| s.ship_type == ship_type)
                .map(|s| s.purchase_price);
            shipyards.push((waypoint.symbol.clone(), price));
        }
        Ok(shipyards)
    }

    pub async fn record_contract(&self, player: &Player, contract: &Contract) -> Result<()> {
        if let Some(db) = &self.db {
            db.upsert_contract(player.id, contract).await?;
        }
        Ok(())
    }

    pub async fn record_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        if let Some(db) = &self.db {
            db.insert_ledger_entry(entry).await?;
        }
        Ok(())
    }

    pub async fn record_player_credits(&self, player: &Player, credits: i64) -> Result<()> {
        if let Some(db) = &self.db {
            db.update_player_credits(player.id, credits).await?;
        }
        Ok(())
    }
}
