pub mod db_models;
pub mod memory;

use crate::errors::{Error, Result};
use crate::models::*;
use crate::schema::*;
use async_trait::async_trait;
use chrono::Utc;
use db_models::*;
use diesel::ExpressionMethods as _;
use diesel::OptionalExtension as _;
use diesel::QueryDsl as _;
use diesel::SelectableHelper as _;
use diesel_async::pooled_connection::deadpool::{Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::AsyncConnection as _;
use diesel_async::AsyncPgConnection;
use diesel_async::RunQueryDsl as _;
use std::str::FromStr as _;
use tracing::{debug, info};
use uuid::Uuid;

/// The slice of storage the container registry needs. The daemon uses the
/// postgres-backed [`DataClient`]; tests use [`memory::MemoryContainerStore`].
#[async_trait]
pub trait ContainerStore: Send + Sync {
    async fn insert_container(&self, record: &ContainerRecord) -> Result<()>;
    async fn update_container(&self, record: &ContainerRecord) -> Result<()>;
    async fn delete_container(&self, id: Uuid) -> Result<()>;
    async fn append_container_log(&self, id: Uuid, message: &str) -> Result<()>;
    async fn container_logs(&self, id: Uuid, limit: i64) -> Result<Vec<ContainerLogLine>>;
}

fn db_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Database(e.to_string())
}

#[derive(Clone)]
pub struct DataClient {
    db: Pool<AsyncPgConnection>,
}

impl DataClient {
    pub async fn new() -> Result<DataClient> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| db_err("DATABASE_URL must be set"))?;
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let db = Pool::builder(manager).max_size(5).build().map_err(db_err)?;
        // check the connection before handing the pool out
        {
            let mut conn = db.get().await.map_err(db_err)?;
            diesel::sql_query("SELECT 1")
                .execute(&mut conn)
                .await
                .map_err(db_err)?;
            info!("Successfully connected to database");
        }
        Ok(DataClient { db })
    }

    async fn conn(&self) -> Result<Object<AsyncPgConnection>> {
        self.db.get().await.map_err(db_err)
    }

    // players

    pub async fn load_players(&self) -> Result<Vec<Player>> {
        let rows: Vec<PlayerRow> = players::table
            .select(PlayerRow::as_select())
            .load(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|row| Player {
                id: row.id,
                agent_symbol: row.agent_symbol,
                token: row.token,
                metadata: row.metadata,
                credits: row.credits,
                last_active: row.last_active,
            })
            .collect())
    }

    pub async fn upsert_player(&self, player: &Player) -> Result<()> {
        let row = PlayerRow {
            id: player.id,
            agent_symbol: player.agent_symbol.clone(),
            token: player.token.clone(),
            metadata: player.metadata.clone(),
            credits: player.credits,
            last_active: player.last_active,
        };
        diesel::insert_into(players::table)
            .values(&row)
            .on_conflict(players::id)
            .do_update()
            .set((
                players::credits.eq(&row.credits),
                players::last_active.eq(&row.last_active),
            ))
            .execute(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn update_player_credits(&self, player_id: i64, credits: i64) -> Result<()> {
        diesel::update(players::table.filter(players::id.eq(player_id)))
            .set((
                players::credits.eq(credits),
                players::last_active.eq(Utc::now()),
            ))
            .execute(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // waypoints

    /// Replace a system's waypoint page in one transaction.
    pub async fn save_system_waypoints(
        &self,
        system_symbol: &SystemSymbol,
        waypoints: &[Waypoint],
    ) -> Result<()> {
        debug!("db save waypoints: {}", system_symbol);
        let now = Utc::now();
        let rows: Vec<WaypointRow> = waypoints
            .iter()
            .map(|w| {
                Ok(WaypointRow {
                    system_symbol: system_symbol.to_string(),
                    symbol: w.symbol.to_string(),
                    details: serde_json::to_value(w)?,
                    synced_at: now,
                })
            })
            .collect::<Result<_>>()?;
        let system = system_symbol.to_string();
        let mut conn = self.conn().await?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::delete(waypoints::table.filter(waypoints::system_symbol.eq(&system)))
                    .execute(conn)
                    .await?;
                diesel::insert_into(waypoints::table)
                    .values(&rows)
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn get_system_waypoints(
        &self,
        system_symbol: &SystemSymbol,
    ) -> Result<Option<WithTimestamp<Vec<Waypoint>>>> {
        let rows: Vec<WaypointRow> = waypoints::table
            .filter(waypoints::system_symbol.eq(system_symbol.to_string()))
            .select(WaypointRow::as_select())
            .load(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let timestamp = rows.iter().map(|r| r.synced_at).min().unwrap_or_else(Utc::now);
        let waypoints = rows
            .into_iter()
            .map(|row| serde_json::from_value(row.details).map_err(Error::from))
            .collect::<Result<Vec<Waypoint>>>()?;
        Ok(Some(WithTimestamp { timestamp, data: waypoints }))
    }

    // system graphs

    pub async fn save_system_graph(
        &self,
        system_symbol: &SystemSymbol,
        waypoints: &[Waypoint],
    ) -> Result<()> {
        let row = SystemGraphRow {
            system_symbol: system_symbol.to_string(),
            waypoints: serde_json::to_value(waypoints)?,
            created_at: Utc::now(),
        };
        diesel::insert_into(system_graphs::table)
            .values(&row)
            .on_conflict(system_graphs::system_symbol)
            .do_update()
            .set(system_graphs::waypoints.eq(&row.waypoints))
            .execute(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn get_system_graph(
        &self,
        system_symbol: &SystemSymbol,
    ) -> Result<Option<Vec<Waypoint>>> {
        let row: Option<SystemGraphRow> = system_graphs::table
            .filter(system_graphs::system_symbol.eq(system_symbol.to_string()))
            .select(SystemGraphRow::as_select())
            .first(&mut self.conn().await?)
            .await
            .optional()
            .map_err(db_err)?;
        match row {
            Some(row) => Ok(Some(serde_json::from_value(row.waypoints)?)),
            None => Ok(None),
        }
    }

    // market snapshots

    pub async fn insert_market_snapshot(
        &self,
        player_id: i64,
        snapshot: &MarketSnapshot,
    ) -> Result<()> {
        let row = MarketSnapshotRow {
            player_id,
            waypoint_symbol: snapshot.waypoint_symbol.to_string(),
            captured_at: snapshot.captured_at,
            trade_goods: serde_json::to_value(&snapshot.trade_goods)?,
        };
        diesel::insert_into(market_snapshots::table)
            .values(&row)
            .on_conflict_do_nothing()
            .execute(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Latest snapshot per waypoint for one player.
    pub async fn latest_market_snapshots(&self, player_id: i64) -> Result<Vec<MarketSnapshot>> {
        let rows: Vec<MarketSnapshotRow> = market_snapshots::table
            .filter(market_snapshots::player_id.eq(player_id))
            .order(market_snapshots::captured_at.desc())
            .select(MarketSnapshotRow::as_select())
            .load(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        let mut seen = std::collections::BTreeSet::new();
        let mut snapshots = Vec::new();
        for row in rows {
            if !seen.insert(row.waypoint_symbol.clone()) {
                continue;
            }
            snapshots.push(MarketSnapshot {
                waypoint_symbol: WaypointSymbol(row.waypoint_symbol),
                captured_at: row.captured_at,
                trade_goods: serde_json::from_value(row.trade_goods)?,
            });
        }
        Ok(snapshots)
    }

    // contracts

    pub async fn upsert_contract(&self, player_id: i64, contract: &Contract) -> Result<()> {
        let row = ContractRow {
            player_id,
            contract_id: contract.id.clone(),
            details: serde_json::to_value(contract)?,
            updated_at: Utc::now(),
        };
        diesel::insert_into(contracts::table)
            .values(&row)
            .on_conflict((contracts::player_id, contracts::contract_id))
            .do_update()
            .set((
                contracts::details.eq(&row.details),
                contracts::updated_at.eq(&row.updated_at),
            ))
            .execute(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ledger

    pub async fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let row = NewLedgerEntryRow {
            player_id: entry.player_id,
            kind: entry.kind.to_string(),
            signed_amount: entry.signed_amount,
            units: entry.units,
            related_container_id: entry.related_container_id,
            timestamp: entry.timestamp,
        };
        diesel::insert_into(ledger_entries::table)
            .values(&row)
            .execute(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn list_containers(&self, player_id: Option<i64>) -> Result<Vec<ContainerRecord>> {
        let mut query = containers::table
            .select(ContainerRow::as_select())
            .into_boxed();
        if let Some(player_id) = player_id {
            query = query.filter(containers::player_id.eq(player_id));
        }
        let rows: Vec<ContainerRow> = query
            .load(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: ContainerRow) -> Result<ContainerRecord> {
    Ok(ContainerRecord {
        id: row.id,
        player_id: row.player_id,
        kind: ContainerKind::from_str(&row.kind)
            .map_err(|_| Error::Database(format!("unknown container kind {}", row.kind)))?,
        ship_symbol: row.ship_symbol,
        config: row.config,
        status: ContainerStatus::from_str(&row.status)
            .map_err(|_| Error::Database(format!("unknown container status {}", row.status)))?,
        current_iteration: row.current_iteration,
        max_iterations: row.max_iterations,
        last_error: row.last_error,
        restart_count: row.restart_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn row_from_record(record: &ContainerRecord) -> ContainerRow {
    ContainerRow {
        id: record.id,
        player_id: record.player_id,
        kind: record.kind.to_string(),
        ship_symbol: record.ship_symbol.clone(),
        config: record.config.clone(),
        status: record.status.to_string(),
        current_iteration: record.current_iteration,
        max_iterations: record.max_iterations,
        last_error: record.last_error.clone(),
        restart_count: record.restart_count,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

#[async_trait]
impl ContainerStore for DataClient {
    async fn insert_container(&self, record: &ContainerRecord) -> Result<()> {
        let row = row_from_record(record);
        diesel::insert_into(containers::table)
            .values(&row)
            .execute(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_container(&self, record: &ContainerRecord) -> Result<()> {
        let row = row_from_record(record);
        diesel::update(containers::table.filter(containers::id.eq(record.id)))
            .set(&row)
            .execute(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_container(&self, id: Uuid) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            async move {
                diesel::delete(container_logs::table.filter(container_logs::container_id.eq(id)))
                    .execute(conn)
                    .await?;
                diesel::delete(containers::table.filter(containers::id.eq(id)))
                    .execute(conn)
                    .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn append_container_log(&self, id: Uuid, message: &str) -> Result<()> {
        let row = NewContainerLogRow {
            container_id: id,
            message: message.to_string(),
            logged_at: Utc::now(),
        };
        diesel::insert_into(container_logs::table)
            .values(&row)
            .execute(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn container_logs(&self, id: Uuid, limit: i64) -> Result<Vec<ContainerLogLine>> {
        let rows: Vec<ContainerLogRow> = container_logs::table
            .filter(container_logs::container_id.eq(id))
            .order(container_logs::logged_at.desc())
            .limit(limit)
            .select(ContainerLogRow::as_select())
            .load(&mut self.conn().await?)
            .await
            .map_err(db_err)?;
        let mut lines: Vec<ContainerLogLine> = rows
            .into_iter()
            .map(|row| ContainerLogLine {
                container_id: row.container_id,
                message: row.message,
                logged_at: row.logged_at,
            })
            .collect();
        lines.reverse();
        Ok(lines)
    }
}

pub use memory::MemoryContainerStore;
