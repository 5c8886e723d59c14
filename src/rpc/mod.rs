pub mod protocol;

use crate::errors::{Error, Result};
use crate::mediator::{commands, Mediator};
use crate::models::*;
use crate::players::PlayerRegistry;
use crate::supervisor::Supervisor;
use protocol::*;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Local stream-socket frontend. One framed JSON request per connection;
/// the handler answers as soon as the intent is accepted and closes its
/// write side without waiting for the peer.
pub struct RpcServer {
    supervisor: Arc<Supervisor>,
    mediator: Arc<Mediator>,
    players: Arc<PlayerRegistry>,
    root_cancel: CancellationToken,
}

impl RpcServer {
    pub fn new(
        supervisor: Arc<Supervisor>,
        mediator: Arc<Mediator>,
        players: Arc<PlayerRegistry>,
        root_cancel: CancellationToken,
    ) -> Arc<RpcServer> {
        Arc::new(RpcServer { supervisor, mediator, players, root_cancel })
    }

    /// Accept until the root token cancels. Connection handlers are
    /// detached tasks; shutdown never waits for them here.
    pub async fn serve(self: Arc<Self>, socket_path: &str) -> Result<()> {
        let _ = std::fs::remove_file(socket_path);
        let listener = UnixListener::bind(socket_path)
            .map_err(|e| Error::Io(format!("cannot bind {}: {}", socket_path, e)))?;
        info!("RPC frontend listening on {}", socket_path);
        loop {
            tokio::select! {
                _ = self.root_cancel.cancelled() => {
                    info!("RPC frontend stopped accepting connections");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, _addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            debug!("accept failed: {}", e);
                            continue;
                        }
                    };
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream).await {
                            debug!("connection handler: {}", e);
                        }
                    });
                }
            }
        }
    }

    async fn handle_connection(&self, stream: UnixStream) -> std::io::Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        reader.read_line(&mut line).await?;

        let response = self.dispatch_frame(&line).await;
        let mut payload = serde_json::to_vec(&response).unwrap_or_else(|_| b"{}".to_vec());
        payload.push(b'\n');
        write_half.write_all(&payload).await?;
        // half-close is enough; never await the peer's FIN
        write_half.shutdown().await?;
        Ok(())
    }

    async fn dispatch_frame(&self, line: &str) -> Value {
        let request: RpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                let err = Error::MalformedRequest(e.to_string());
                return json!({"error": {"code": err.code(), "message": err.to_string()}});
            }
        };
        match self.dispatch(request).await {
            Ok(result) => json!({ "result": result }),
            Err(e) => json!({"error": {"code": e.code(), "message": e.to_string()}}),
        }
    }

    async fn dispatch(&self, request: RpcRequest) -> Result<Value> {
        let params = request.params;
        match request.method.as_str() {
            "Navigate" => {
                let p: NavigateParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let config = json!({"to": p.to, "mode": p.mode});
                self.launch(player.id, ContainerKind::Navigate, Some(p.ship_symbol), config, 1)
                    .await
            }
            "Dock" => {
                let p: ShipParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ship = self
                    .mediator
                    .send(commands::DockShip {
                        player,
                        ship_symbol: p.ship_symbol,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(serde_json::to_value(ship)?)
            }
            "Orbit" => {
                let p: ShipParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ship = self
                    .mediator
                    .send(commands::OrbitShip {
                        player,
                        ship_symbol: p.ship_symbol,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(serde_json::to_value(ship)?)
            }
            "Refuel" => {
                let p: RefuelParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ship = self
                    .mediator
                    .send(commands::RefuelShip {
                        player,
                        ship_symbol: p.ship_symbol,
                        units: p.units,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(serde_json::to_value(ship)?)
            }
            "SetFlightMode" => {
                let p: SetFlightModeParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ship = self
                    .mediator
                    .send(commands::SetFlightMode {
                        player,
                        ship_symbol: p.ship_symbol,
                        mode: p.mode,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(serde_json::to_value(ship)?)
            }
            "PurchaseCargo" => {
                let p: CargoParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ship = self
                    .mediator
                    .send(commands::PurchaseCargo {
                        player,
                        ship_symbol: p.ship_symbol,
                        good: p.good,
                        units: p.units,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(serde_json::to_value(ship)?)
            }
            "SellCargo" => {
                let p: CargoParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ship = self
                    .mediator
                    .send(commands::SellCargo {
                        player,
                        ship_symbol: p.ship_symbol,
                        good: p.good,
                        units: p.units,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(serde_json::to_value(ship)?)
            }
            "JettisonCargo" => {
                let p: CargoParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ship = self
                    .mediator
                    .send(commands::JettisonCargo {
                        player,
                        ship_symbol: p.ship_symbol,
                        good: p.good,
                        units: p.units,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(serde_json::to_value(ship)?)
            }
            "ShipyardPurchase" => {
                // single purchase is an atomic command; only the batch form
                // runs as a container
                let p: ShipyardPurchaseParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ship_symbol = self
                    .mediator
                    .send(commands::PurchaseShip {
                        player,
                        ship_symbol: p.ship_symbol,
                        ship_type: p.ship_type,
                        shipyard: p.shipyard,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(json!({"ship_symbol": ship_symbol}))
            }
            "ShipyardBatchPurchase" => {
                let p: ShipyardBatchPurchaseParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let config = json!({
                    "ship_type": p.ship_type,
                    "quantity": p.quantity,
                    "max_budget": p.max_budget,
                });
                self.launch(
                    player.id,
                    ContainerKind::BatchPurchase,
                    Some(p.ship_symbol),
                    config,
                    1,
                )
                .await
            }
            "ScoutMarkets" => {
                let p: ScoutMarketsParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let config = json!({"markets": p.markets});
                self.launch(
                    player.id,
                    ContainerKind::ScoutTour,
                    Some(p.ship_symbol),
                    config,
                    ITERATIONS_INFINITE,
                )
                .await
            }
            "AssignScoutingFleet" => {
                let p: AssignScoutingFleetParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let config = json!({
                    "ship_symbols": p.ship_symbols,
                    "markets": p.markets,
                    "seed": p.seed,
                });
                self.launch(player.id, ContainerKind::ScoutFleetAssignment, None, config, 1)
                    .await
            }
            "ContractBatchWorkflow" => {
                let p: ContractBatchParams = parse(params)?;
                if p.count == 0 {
                    return Err(Error::InvalidParams("count must not be zero".to_string()));
                }
                let player = self.players.get_by_symbol(&p.player)?;
                self.launch(
                    player.id,
                    ContainerKind::ContractBatch,
                    Some(p.ship_symbol),
                    json!({}),
                    p.count,
                )
                .await
            }
            "Arbitrage" => {
                let p: ArbitrageParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let config = json!({"good": p.good, "min_margin": p.min_margin});
                self.launch(
                    player.id,
                    ContainerKind::Arbitrage,
                    Some(p.ship_symbol),
                    config,
                    p.iterations,
                )
                .await
            }
            "DaemonList" => {
                let p: DaemonListParams = parse(params)?;
                let player_id = match &p.player {
                    Some(symbol) => Some(self.players.get_by_symbol(symbol)?.id),
                    None => None,
                };
                let records = self.supervisor.registry().list(
                    player_id,
                    p.kind,
                    p.ship_symbol.as_deref(),
                );
                Ok(serde_json::to_value(records)?)
            }
            "DaemonInspect" => {
                let p: DaemonIdParams = parse(params)?;
                let handle = self
                    .supervisor
                    .registry()
                    .get(p.id)
                    .ok_or_else(|| Error::InvalidParams(format!("no container {}", p.id)))?;
                Ok(serde_json::to_value(handle.snapshot())?)
            }
            "DaemonStop" => {
                let p: DaemonIdParams = parse(params)?;
                self.supervisor.registry().stop(p.id)?;
                Ok(json!({"id": p.id, "stopping": true}))
            }
            "DaemonRemove" => {
                let p: DaemonIdParams = parse(params)?;
                self.supervisor.registry().remove(p.id).await?;
                Ok(json!({"id": p.id, "removed": true}))
            }
            "DaemonLogs" => {
                let p: DaemonLogsParams = parse(params)?;
                let logs = self.supervisor.registry().logs(p.id, p.limit).await?;
                Ok(serde_json::to_value(logs)?)
            }
            "ShipStatus" => {
                let p: ShipParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ship = self
                    .mediator
                    .send(commands::GetShip {
                        player,
                        ship_symbol: p.ship_symbol,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(serde_json::to_value(ship)?)
            }
            "ListShips" => {
                let p: PlayerParams = parse(params)?;
                let player = self.players.get_by_symbol(&p.player)?;
                let ships = self
                    .mediator
                    .send(commands::ListShips {
                        player,
                        cancel: self.root_cancel.child_token(),
                    })
                    .await?;
                Ok(serde_json::to_value(ships)?)
            }
            method => Err(Error::UnknownMethod(method.to_string())),
        }
    }

    async fn launch(
        &self,
        player_id: i64,
        kind: ContainerKind,
        ship_symbol: Option<String>,
        config: Value,
        max_iterations: i64,
    ) -> Result<Value> {
        let (id, created) = self
            .supervisor
            .clone()
            .launch(player_id, kind, ship_symbol, config, max_iterations)
            .await?;
        Ok(json!({"container_id": id, "created": created}))
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| Error::InvalidParams(e.to_string()))
}
