pub mod api_models;
pub mod circuit_breaker;
pub mod rate_limiter;

use crate::config::CONFIG;
use crate::errors::{Error, Result};
use crate::models::*;
use api_models::*;
use chrono::Utc;
use circuit_breaker::CircuitBreaker;
use dashmap::DashMap;
use rate_limiter::RateLimiterPool;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const PAGE_SIZE: u32 = 20;
const TRANSIT_SLACK_SECONDS: i64 = 1;

/// Every outbound call to the remote API goes through here: one token
/// bucket, one circuit breaker, retry with backoff, and the transit
/// idempotency wait, all keyed per (player, base-url).
pub struct ApiGateway {
    base_url: String,
    client: reqwest::Client,
    limiters: RateLimiterPool,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    nav_snapshots: DashMap<String, ShipNav>,
    max_retries: u32,
    retry_base_delay: Duration,
    breaker_threshold: u32,
    breaker_open_duration: Duration,
}

impl ApiGateway {
    pub fn new() -> ApiGateway {
        ApiGateway::with_settings(
            &CONFIG.api_base_url,
            CONFIG.rate_limit_per_sec,
            CONFIG.max_retries,
            Duration::from_secs(1),
            circuit_breaker::FAILURE_THRESHOLD,
            circuit_breaker::OPEN_DURATION,
        )
    }

    pub fn with_settings(
        base_url: &str,
        rate_limit_per_sec: u32,
        max_retries: u32,
        retry_base_delay: Duration,
        breaker_threshold: u32,
        breaker_open_duration: Duration,
    ) -> ApiGateway {
        let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let client = reqwest::ClientBuilder::new()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .https_only(base_url.starts_with("https"))
            .http1_only()
            .build()
            .expect("reqwest client construction cannot fail");
        ApiGateway {
            base_url: base_url.to_string(),
            client,
            limiters: RateLimiterPool::new(rate_limit_per_sec),
            breakers: DashMap::new(),
            nav_snapshots: DashMap::new(),
            max_retries,
            retry_base_delay,
            breaker_threshold,
            breaker_open_duration,
        }
    }

    fn shared_key(&self, player: &Player) -> String {
        format!("{}|{}", player.agent_symbol, self.base_url)
    }

    fn breaker(&self, key: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    self.breaker_threshold,
                    self.breaker_open_duration,
                ))
            })
            .clone()
    }

    /// Manually close the circuit for a player.
    pub fn reset_circuit(&self, player: &Player) {
        self.breaker(&self.shared_key(player)).reset();
    }

    /// One request sequence: circuit gate, then up to `max_retries + 1`
    /// attempts through the rate limiter. A sequence that exhausts its
    /// attempts counts as a single circuit failure.
    pub async fn request(
        &self,
        player: &Player,
        method: Method,
        path: &str,
        json_body: Option<&Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let key = self.shared_key(player);
        let breaker = self.breaker(&key);
        breaker.check()?;

        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;
        let mut rate_limited = false;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::OperationCanceled);
            }
            self.limiters.acquire(&key, cancel).await?;

            let mut request = self.client.request(method.clone(), &url);
            if let Some(body) = json_body {
                request = request.json(body);
            }
            request = request.header("Authorization", format!("Bearer {}", player.token));

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::OperationCanceled),
                response = request.send() => response,
            };

            let retry_delay = match response {
                Ok(response) => {
                    let status = response.status();
                    debug!("{} {} {}", status.as_u16(), method, path);
                    if status.is_success() {
                        breaker.record_success();
                        let body = response.json::<Value>().await.map_err(|e| {
                            Error::RemoteUnavailable(format!("invalid response body: {}", e))
                        })?;
                        return Ok(body);
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        rate_limited = true;
                        retry_after(&response).unwrap_or_else(|| self.backoff(attempt))
                    } else if matches!(status.as_u16(), 500 | 502 | 503 | 504) {
                        rate_limited = false;
                        self.backoff(attempt)
                    } else if status.is_client_error() {
                        // non-retryable, and not counted against the breaker
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::Http4xx { status: status.as_u16(), body });
                    } else {
                        breaker.record_failure();
                        return Err(Error::Http5xx { status: status.as_u16() });
                    }
                }
                Err(e) => {
                    debug!("transport error on {} {}: {}", method, path, e);
                    rate_limited = false;
                    self.backoff(attempt)
                }
            };

            if attempt >= self.max_retries {
                breaker.record_failure();
                if rate_limited {
                    return Err(Error::RateLimitedExhausted);
                }
                return Err(Error::MaxRetriesExceeded {
                    attempts: attempt + 1,
                    last: format!("{} {}", method, path),
                });
            }
            warn!(
                "retrying {} {} in {:.1}s (attempt {}/{})",
                method,
                path,
                retry_delay.as_secs_f64(),
                attempt + 1,
                self.max_retries
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::OperationCanceled),
                _ = tokio::time::sleep(retry_delay) => {}
            }
            attempt += 1;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay * 2u32.saturating_pow(attempt)
    }

    pub async fn get<T>(&self, player: &Player, path: &str, cancel: &CancellationToken) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let body = self.request(player, Method::GET, path, None, cancel).await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn post<T, U>(
        &self,
        player: &Player,
        path: &str,
        json_body: &U,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        U: Serialize,
    {
        let body = serde_json::to_value(json_body)?;
        let body = self
            .request(player, Method::POST, path, Some(&body), cancel)
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn patch<T, U>(
        &self,
        player: &Player,
        path: &str,
        json_body: &U,
        cancel: &CancellationToken,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        U: Serialize,
    {
        let body = serde_json::to_value(json_body)?;
        let body = self
            .request(player, Method::PATCH, path, Some(&body), cancel)
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    pub async fn get_all_pages<T>(
        &self,
        player: &Player,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut page = 1;
        let mut vec = Vec::new();
        loop {
            let response: PaginatedList<T> = self
                .get(
                    player,
                    &format!("{}?page={}&limit={}", path, page, PAGE_SIZE),
                    cancel,
                )
                .await?;
            vec.extend(response.data);
            if response.meta.page * PAGE_SIZE >= response.meta.total {
                break;
            }
            page += 1;
        }
        Ok(vec)
    }
}

/// Typed endpoints
impl ApiGateway {
    pub async fn get_agent(&self, player: &Player, cancel: &CancellationToken) -> Result<Agent> {
        let response: Data<Agent> = self.get(player, "/my/agent", cancel).await?;
        Ok(response.data)
    }

    pub async fn get_ship(
        &self,
        player: &Player,
        ship_symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<Ship> {
        let response: Result<Data<Ship>> = self
            .get(player, &format!("/my/ships/{}", ship_symbol), cancel)
            .await;
        match response {
            Ok(response) => {
                self.record_nav(&response.data.symbol, &response.data.nav);
                Ok(response.data)
            }
            Err(Error::Http4xx { status: 404, .. }) => {
                Err(Error::ShipNotFound(ship_symbol.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_all_ships(
        &self,
        player: &Player,
        cancel: &CancellationToken,
    ) -> Result<Vec<Ship>> {
        self.get_all_pages(player, "/my/ships", cancel).await
    }

    pub async fn get_system_waypoints(
        &self,
        player: &Player,
        system_symbol: &SystemSymbol,
        cancel: &CancellationToken,
    ) -> Result<Vec<Waypoint>> {
        self.get_all_pages(
            player,
            &format!("/systems/{}/waypoints", system_symbol),
            cancel,
        )
        .await
    }

    pub async fn get_market(
        &self,
        player: &Player,
        symbol: &WaypointSymbol,
        cancel: &CancellationToken,
    ) -> Result<Market> {
        let response: Data<Market> = self
            .get(
                player,
                &format!("/systems/{}/waypoints/{}/market", symbol.system(), symbol),
                cancel,
            )
            .await?;
        Ok(response.data)
    }

    pub async fn get_shipyard(
        &self,
        player: &Player,
        symbol: &WaypointSymbol,
        cancel: &CancellationToken,
    ) -> Result<Shipyard> {
        let response: Result<Data<Shipyard>> = self
            .get(
                player,
                &format!("/systems/{}/waypoints/{}/shipyard", symbol.system(), symbol),
                cancel,
            )
            .await;
        match response {
            Ok(response) => Ok(response.data),
            Err(Error::Http4xx { status: 404, .. }) => {
                Err(Error::ShipyardNotFound(symbol.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_contracts(
        &self,
        player: &Player,
        cancel: &CancellationToken,
    ) -> Result<Vec<Contract>> {
        self.get_all_pages(player, "/my/contracts", cancel).await
    }

    pub async fn dock_ship(
        &self,
        player: &Player,
        ship_symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<ShipNav> {
        self.await_transit(player, ship_symbol, cancel).await?;
        let response: Data<NavStatusResponse> = self
            .post(
                player,
                &format!("/my/ships/{}/dock", ship_symbol),
                &json!({}),
                cancel,
            )
            .await?;
        self.record_nav(ship_symbol, &response.data.nav);
        Ok(response.data.nav)
    }

    pub async fn orbit_ship(
        &self,
        player: &Player,
        ship_symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<ShipNav> {
        self.await_transit(player, ship_symbol, cancel).await?;
        let response: Data<NavStatusResponse> = self
            .post(
                player,
                &format!("/my/ships/{}/orbit", ship_symbol),
                &json!({}),
                cancel,
            )
            .await?;
        self.record_nav(ship_symbol, &response.data.nav);
        Ok(response.data.nav)
    }

    pub async fn navigate_ship(
        &self,
        player: &Player,
        ship_symbol: &str,
        to: &WaypointSymbol,
        cancel: &CancellationToken,
    ) -> Result<NavigateResponse> {
        self.await_transit(player, ship_symbol, cancel).await?;
        let response: Data<NavigateResponse> = self
            .post(
                player,
                &format!("/my/ships/{}/navigate", ship_symbol),
                &json!({ "waypointSymbol": to }),
                cancel,
            )
            .await?;
        self.record_nav(ship_symbol, &response.data.nav);
        Ok(response.data)
    }

    pub async fn set_flight_mode(
        &self,
        player: &Player,
        ship_symbol: &str,
        mode: ShipFlightMode,
        cancel: &CancellationToken,
    ) -> Result<FlightModeResponse> {
        self.await_transit(player, ship_symbol, cancel).await?;
        let response: Data<FlightModeResponse> = self
            .patch(
                player,
                &format!("/my/ships/{}/nav", ship_symbol),
                &json!({ "flightMode": mode }),
                cancel,
            )
            .await?;
        self.record_nav(ship_symbol, &response.data.nav);
        Ok(response.data)
    }

    pub async fn refuel_ship(
        &self,
        player: &Player,
        ship_symbol: &str,
        units: Option<i64>,
        cancel: &CancellationToken,
    ) -> Result<RefuelResponse> {
        self.await_transit(player, ship_symbol, cancel).await?;
        let body = match units {
            Some(units) => json!({ "units": units }),
            None => json!({}),
        };
        let response: Data<RefuelResponse> = self
            .post(
                player,
                &format!("/my/ships/{}/refuel", ship_symbol),
                &body,
                cancel,
            )
            .await?;
        Ok(response.data)
    }

    pub async fn purchase_cargo(
        &self,
        player: &Player,
        ship_symbol: &str,
        good: &str,
        units: i64,
        cancel: &CancellationToken,
    ) -> Result<TradeResponse> {
        let response: Data<TradeResponse> = self
            .post(
                player,
                &format!("/my/ships/{}/purchase", ship_symbol),
                &json!({ "symbol": good, "units": units }),
                cancel,
            )
            .await?;
        Ok(response.data)
    }

    pub async fn sell_cargo(
        &self,
        player: &Player,
        ship_symbol: &str,
        good: &str,
        units: i64,
        cancel: &CancellationToken,
    ) -> Result<TradeResponse> {
        let response: Data<TradeResponse> = self
            .post(
                player,
                &format!("/my/ships/{}/sell", ship_symbol),
                &json!({ "symbol": good, "units": units }),
                cancel,
            )
            .await?;
        Ok(response.data)
    }

    pub async fn jettison_cargo(
        &self,
        player: &Player,
        ship_symbol: &str,
        good: &str,
        units: i64,
        cancel: &CancellationToken,
    ) -> Result<JettisonResponse> {
        let response: Data<JettisonResponse> = self
            .post(
                player,
                &format!("/my/ships/{}/jettison", ship_symbol),
                &json!({ "symbol": good, "units": units }),
                cancel,
            )
            .await?;
        Ok(response.data)
    }

    pub async fn purchase_ship(
        &self,
        player: &Player,
        ship_type: &str,
        shipyard: &WaypointSymbol,
        cancel: &CancellationToken,
    ) -> Result<PurchaseShipResponse> {
        let response: Data<PurchaseShipResponse> = self
            .post(
                player,
                "/my/ships",
                &json!({ "shipType": ship_type, "waypointSymbol": shipyard }),
                cancel,
            )
            .await?;
        Ok(response.data)
    }

    pub async fn negotiate_contract(
        &self,
        player: &Player,
        ship_symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<Contract> {
        let response: Data<NegotiateContractResponse> = self
            .post(
                player,
                &format!("/my/ships/{}/negotiate/contract", ship_symbol),
                &json!({}),
                cancel,
            )
            .await?;
        Ok(response.data.contract)
    }

    pub async fn accept_contract(
        &self,
        player: &Player,
        contract_id: &str,
        cancel: &CancellationToken,
    ) -> Result<AcceptContractResponse> {
        let response: Result<Data<AcceptContractResponse>> = self
            .post(
                player,
                &format!("/my/contracts/{}/accept", contract_id),
                &json!({}),
                cancel,
            )
            .await;
        match response {
            Ok(response) => Ok(response.data),
            Err(Error::Http4xx { status: 404, .. }) => {
                Err(Error::ContractNotFound(contract_id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn deliver_contract(
        &self,
        player: &Player,
        contract_id: &str,
        ship_symbol: &str,
        good: &str,
        units: i64,
        cancel: &CancellationToken,
    ) -> Result<DeliverContractResponse> {
        let response: Data<DeliverContractResponse> = self
            .post(
                player,
                &format!("/my/contracts/{}/deliver", contract_id),
                &json!({ "shipSymbol": ship_symbol, "tradeSymbol": good, "units": units }),
                cancel,
            )
            .await?;
        Ok(response.data)
    }

    pub async fn fulfill_contract(
        &self,
        player: &Player,
        contract_id: &str,
        cancel: &CancellationToken,
    ) -> Result<FulfillContractResponse> {
        let response: Data<FulfillContractResponse> = self
            .post(
                player,
                &format!("/my/contracts/{}/fulfill", contract_id),
                &json!({}),
                cancel,
            )
            .await?;
        Ok(response.data)
    }
}

/// Transit idempotency
impl ApiGateway {
    pub fn record_nav(&self, ship_symbol: &str, nav: &ShipNav) {
        self.nav_snapshots.insert(ship_symbol.to_string(), nav.clone());
    }

    pub fn last_known_nav(&self, ship_symbol: &str) -> Option<ShipNav> {
        self.nav_snapshots.get(ship_symbol).map(|e| e.value().clone())
    }

    /// If the last known state says the ship is mid-transit, reconcile with
    /// the live state and sleep out the remaining travel time before letting
    /// the command through.
    pub async fn await_transit(
        &self,
        player: &Player,
        ship_symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cached_in_transit = self
            .nav_snapshots
            .get(ship_symbol)
            .map(|nav| nav.status == ShipNavStatus::InTransit)
            .unwrap_or(false);
        if !cached_in_transit {
            return Ok(());
        }

        let ship = self.get_ship(player, ship_symbol, cancel).await?;
        if ship.nav.status != ShipNavStatus::InTransit {
            // already arrived: snapshot was stale, proceed immediately
            return Ok(());
        }

        let wait = ship.nav.route.arrival - Utc::now()
            + chrono::Duration::seconds(TRANSIT_SLACK_SECONDS);
        if wait > chrono::Duration::zero() {
            debug!(
                "[{}] waiting {}s for transit to {}",
                ship_symbol,
                wait.num_seconds(),
                ship.nav.route.destination.symbol
            );
            let wait = wait.to_std().unwrap_or_default();
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::OperationCanceled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
        self.get_ship(player, ship_symbol, cancel).await?;
        Ok(())
    }
}

impl Default for ApiGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
    use tokio::net::TcpListener;

    #[derive(Clone)]
    struct StubResponse {
        status: u16,
        body: String,
        retry_after: Option<u64>,
    }

    fn status(code: u16) -> StubResponse {
        StubResponse { status: code, body: "{}".to_string(), retry_after: None }
    }

    fn ok(body: &str) -> StubResponse {
        StubResponse { status: 200, body: body.to_string(), retry_after: None }
    }

    struct StubRemote {
        base_url: String,
        hits: Arc<AtomicUsize>,
    }

    impl StubRemote {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    /// Minimal http/1.1 responder playing a scripted sequence of responses,
    /// one connection per request (`connection: close`).
    async fn spawn_stub(script: Vec<StubResponse>) -> StubRemote {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        let hits_counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                hits_counter.fetch_add(1, Ordering::SeqCst);
                let response = script
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| ok("{}"));
                tokio::spawn(async move {
                    let mut buf = [0u8; 8192];
                    let _ = stream.read(&mut buf).await;
                    let mut head = format!(
                        "HTTP/1.1 {} STUB\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
                        response.status,
                        response.body.len()
                    );
                    if let Some(seconds) = response.retry_after {
                        head.push_str(&format!("retry-after: {}\r\n", seconds));
                    }
                    head.push_str("\r\n");
                    let _ = stream.write_all(head.as_bytes()).await;
                    let _ = stream.write_all(response.body.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });
        StubRemote { base_url: format!("http://{}", addr), hits }
    }

    fn gateway(base_url: &str, max_retries: u32, breaker_threshold: u32) -> ApiGateway {
        ApiGateway::with_settings(
            base_url,
            100, // keep test rate limiting out of the way
            max_retries,
            Duration::from_millis(10),
            breaker_threshold,
            Duration::from_secs(60),
        )
    }

    fn player() -> Player {
        Player {
            id: 1,
            agent_symbol: "TEST_AGENT".to_string(),
            token: "test-token".to_string(),
            metadata: serde_json::json!({}),
            credits: 0,
            last_active: Utc::now(),
        }
    }

    fn ship_body(status: &str, arrival_in_ms: i64) -> String {
        let arrival = Utc::now() + chrono::Duration::milliseconds(arrival_in_ms);
        serde_json::json!({
            "data": {
                "symbol": "TEST_AGENT-1",
                "nav": {
                    "systemSymbol": "X1-S1",
                    "waypointSymbol": "X1-S1-A1",
                    "route": {
                        "origin": {"symbol": "X1-S1-A1", "type": "PLANET", "systemSymbol": "X1-S1", "x": 0, "y": 0},
                        "destination": {"symbol": "X1-S1-B2", "type": "PLANET", "systemSymbol": "X1-S1", "x": 100, "y": 0},
                        "arrival": arrival.to_rfc3339(),
                        "departureTime": Utc::now().to_rfc3339()
                    },
                    "status": status,
                    "flightMode": "CRUISE"
                },
                "fuel": {"current": 400, "capacity": 400},
                "engine": {"symbol": "ENGINE_ION_DRIVE_II", "speed": 30},
                "cargo": {"capacity": 40, "units": 0, "inventory": []}
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_retries_transient_errors_then_succeeds() {
        let stub = spawn_stub(vec![status(503), status(502), ok(r#"{"ok":true}"#)]).await;
        let gw = gateway(&stub.base_url, 3, 5);
        let cancel = CancellationToken::new();
        let body = gw
            .request(&player(), Method::GET, "/test", None, &cancel)
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(stub.hits(), 3);
    }

    #[tokio::test]
    async fn test_4xx_is_terminal_and_not_retried() {
        let stub = spawn_stub(vec![status(404), ok("{}")]).await;
        let gw = gateway(&stub.base_url, 3, 5);
        let cancel = CancellationToken::new();
        let err = gw
            .request(&player(), Method::GET, "/missing", None, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "Http4xx");
        assert_eq!(stub.hits(), 1);
        // and it did not count toward the breaker
        gw.request(&player(), Method::GET, "/test", None, &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_max_retries_exceeded() {
        let stub = spawn_stub(vec![status(503); 4]).await;
        let gw = gateway(&stub.base_url, 3, 5);
        let cancel = CancellationToken::new();
        let err = gw
            .request(&player(), Method::GET, "/test", None, &cancel)
            .await
            .unwrap_err();
        match err {
            Error::MaxRetriesExceeded { attempts, .. } => assert_eq!(attempts, 4),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(stub.hits(), 4);
    }

    #[tokio::test]
    async fn test_retry_after_header_drives_the_delay() {
        let stub = spawn_stub(vec![
            StubResponse { status: 429, body: "{}".to_string(), retry_after: Some(0) },
            ok("{}"),
        ])
        .await;
        let gw = gateway(&stub.base_url, 3, 5);
        let cancel = CancellationToken::new();
        gw.request(&player(), Method::GET, "/test", None, &cancel)
            .await
            .unwrap();
        assert_eq!(stub.hits(), 2);
    }

    #[tokio::test]
    async fn test_circuit_opens_after_failed_sequences() {
        // each sequence is a single attempt; five of them open the circuit
        let stub = spawn_stub(vec![status(503); 5]).await;
        let gw = gateway(&stub.base_url, 0, 5);
        let cancel = CancellationToken::new();
        let p = player();
        for _ in 0..5 {
            let err = gw
                .request(&p, Method::GET, "/test", None, &cancel)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "MaxRetriesExceeded");
        }
        assert_eq!(stub.hits(), 5);

        let start = Instant::now();
        let err = gw
            .request(&p, Method::GET, "/test", None, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CircuitOpen");
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(stub.hits(), 5, "open circuit must not touch the socket");

        gw.reset_circuit(&p);
        gw.request(&p, Method::GET, "/test", None, &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_stops_the_retry_loop() {
        let stub = spawn_stub(vec![status(503); 10]).await;
        let gw = ApiGateway::with_settings(
            &stub.base_url,
            100,
            5,
            Duration::from_secs(5),
            5,
            Duration::from_secs(60),
        );
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let start = Instant::now();
        let err = gw
            .request(&player(), Method::GET, "/test", None, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_canceled());
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(stub.hits(), 1);
    }

    #[tokio::test]
    async fn test_await_transit_sleeps_until_arrival() {
        let stub = spawn_stub(vec![
            ok(&ship_body("IN_TRANSIT", 300)),
            ok(&ship_body("IN_ORBIT", 0)),
        ])
        .await;
        let gw = gateway(&stub.base_url, 0, 5);
        let cancel = CancellationToken::new();
        let p = player();

        // seed the snapshot with a stale in-transit state
        let stale: Data<Ship> =
            serde_json::from_str(&ship_body("IN_TRANSIT", 300)).unwrap();
        gw.record_nav("TEST_AGENT-1", &stale.data.nav);

        let start = Instant::now();
        gw.await_transit(&p, "TEST_AGENT-1", &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(stub.hits(), 2);
    }

    #[tokio::test]
    async fn test_await_transit_proceeds_when_already_arrived() {
        let stub = spawn_stub(vec![ok(&ship_body("DOCKED", 0))]).await;
        let gw = gateway(&stub.base_url, 0, 5);
        let cancel = CancellationToken::new();
        let p = player();

        let stale: Data<Ship> =
            serde_json::from_str(&ship_body("IN_TRANSIT", 5000)).unwrap();
        gw.record_nav("TEST_AGENT-1", &stale.data.nav);

        let start = Instant::now();
        gw.await_transit(&p, "TEST_AGENT-1", &cancel).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(stub.hits(), 1);
    }
}
